// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way. Also houses the lexical path
//! helpers that every other module leans on, because symlink targets and
//! tracking entries are compared lexically, never by traversal.

use std::{
    env,
    ffi::OsStr,
    path::{Component, Path, PathBuf},
};

/// Name of the project, used for the repository and settings locations.
pub const PROJECT: &str = "lnk";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine base configuration directory.
///
/// Uses `$XDG_CONFIG_HOME` when it is set and non-empty, falling back to
/// `$HOME/.config` otherwise.
fn config_base() -> Option<PathBuf> {
    match env::var_os("XDG_CONFIG_HOME") {
        Some(xdg) if !xdg.is_empty() => Some(PathBuf::from(xdg)),
        _ => dirs::home_dir().map(|home| home.join(".config")),
    }
}

/// Determine default absolute path to the dotfile repository.
///
/// Uses `$XDG_CONFIG_HOME/lnk`, then `$HOME/.config/lnk`. If the home
/// directory cannot be determined either, the repository lives at `./lnk`
/// relative to the current directory. Does not check if the path returned
/// actually exists.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_repo_dir() -> PathBuf {
    match config_base() {
        Some(base) => base.join(PROJECT),
        None => PathBuf::from(".").join(PROJECT),
    }
}

/// Determine default absolute path to the settings file.
///
/// Settings live next to the repository, never inside it, so they are not
/// committed with the user's dotfiles.
pub fn default_settings_path() -> PathBuf {
    match config_base() {
        Some(base) => base.join(format!("{PROJECT}.toml")),
        None => PathBuf::from(format!("{PROJECT}.toml")),
    }
}

/// Make path absolute against current directory, then normalize it.
///
/// Relative paths are joined onto the current working directory. No
/// filesystem access beyond querying the current directory is performed.
///
/// # Errors
///
/// - Return [`std::io::Error`] if current directory cannot be determined.
pub fn absolutize(path: impl AsRef<Path>) -> std::io::Result<PathBuf> {
    let path = path.as_ref();
    if path.is_absolute() {
        return Ok(normalize(path));
    }

    Ok(normalize(env::current_dir()?.join(path)))
}

/// Lexically normalize a path.
///
/// Removes `.` components, and folds `..` into its parent where a parent
/// exists. Leading `..` components of a relative path are preserved, and a
/// `..` at the root of an absolute path is dropped.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => continue,
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }

    out
}

/// Compute path of target relative to base directory.
///
/// Both paths must be absolute and normalized. Returns `None` if either is
/// relative, or if they do not share the same root.
pub fn relative_to(base: impl AsRef<Path>, target: impl AsRef<Path>) -> Option<PathBuf> {
    let base = base.as_ref();
    let target = target.as_ref();
    if !base.is_absolute() || !target.is_absolute() {
        return None;
    }

    let mut base_parts = base.components().peekable();
    let mut target_parts = target.components().peekable();

    // INVARIANT: Both paths must agree on their root before diverging.
    if base_parts.next() != target_parts.next() {
        return None;
    }

    while let (Some(lhs), Some(rhs)) = (base_parts.peek(), target_parts.peek()) {
        if lhs != rhs {
            break;
        }
        base_parts.next();
        target_parts.next();
    }

    let mut relative = PathBuf::new();
    for _ in base_parts {
        relative.push("..");
    }
    for part in target_parts {
        relative.push(part.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }

    Some(relative)
}

/// Compute home-relative form of an absolute path.
///
/// - Paths under home become relative to home.
/// - Home itself becomes `.`.
/// - Everything else keeps its absolute form with the leading separator
///   stripped, e.g., `/etc/foo` becomes `etc/foo`.
pub fn home_relative(home: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
    let home = normalize(home);
    let path = normalize(path);

    if path == home {
        return PathBuf::from(".");
    }

    if let Ok(stripped) = path.strip_prefix(&home) {
        return stripped.to_path_buf();
    }

    path.components()
        .filter(|part| !matches!(part, Component::RootDir | Component::Prefix(_)))
        .collect()
}

/// Check if a tracked relative path is malformed.
///
/// Malformed paths are empty, absolute, or still contain `..` components
/// after normalization, thus escaping whatever root they get joined onto.
pub fn is_malformed(rel: impl AsRef<Path>) -> bool {
    let rel = rel.as_ref();
    if rel.as_os_str().is_empty() || rel.has_root() {
        return true;
    }

    normalize(rel)
        .components()
        .any(|part| matches!(part, Component::ParentDir | Component::Prefix(_)))
}

/// Final component of a path as displayable text.
pub fn basename(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_name()
        .map(OsStr::to_string_lossy)
        .map(|name| name.into_owned())
        .unwrap_or_else(|| path.as_ref().display().to_string())
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
