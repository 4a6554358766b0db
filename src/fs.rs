// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem primitives.
//!
//! Small, single-purpose operations that the manager composes into
//! transactions: validating candidates, moving content into and out of the
//! repository, and creating the relative symlinks that point back at it.
//!
//! Moves are always renames. Content is never copied, so moving across
//! filesystems fails with the underlying error instead of half-succeeding.

use crate::path::{normalize, relative_to};

use std::{
    fs::{self, Metadata},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Kind of filesystem object captured before a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

/// Information captured about a path before it gets moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub kind: FileKind,
    pub len: u64,
}

impl From<&Metadata> for FileInfo {
    fn from(metadata: &Metadata) -> Self {
        let file_type = metadata.file_type();
        let kind = if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_dir() {
            FileKind::Directory
        } else {
            FileKind::File
        };

        Self {
            kind,
            len: metadata.len(),
        }
    }
}

/// Capture information about a path without following symlinks.
///
/// # Errors
///
/// - Return [`FsError::NotFound`] if path does not exist.
/// - Return [`FsError::Access`] if path cannot be inspected.
pub fn stat(path: impl AsRef<Path>) -> Result<FileInfo> {
    lstat(path.as_ref()).map(|metadata| FileInfo::from(&metadata))
}

/// Validate that path can be added.
///
/// Only regular files, and directories qualify. Symlinks are not followed,
/// so a symlink is rejected as well, even if it points at a regular file.
///
/// # Errors
///
/// - Return [`FsError::NotFound`] if path does not exist.
/// - Return [`FsError::Access`] if path cannot be inspected.
/// - Return [`FsError::UnsupportedType`] if path is anything else than a
///   regular file or directory.
pub fn validate_for_add(path: impl AsRef<Path>) -> Result<FileInfo> {
    let path = path.as_ref();
    let metadata = lstat(path)?;
    let file_type = metadata.file_type();

    if file_type.is_file() || file_type.is_dir() {
        return Ok(FileInfo::from(&metadata));
    }

    Err(FsError::UnsupportedType {
        path: path.to_path_buf(),
        kind: describe_type(&metadata),
    })
}

/// Validate that path is a symlink pointing into the repository.
///
/// The symlink itself is never followed. Its stored target is resolved
/// against the canonical form of its parent directory, and then compared
/// lexically against the canonical repository root. A target that walks out
/// of the repository, and back in through another symlink, is rejected.
///
/// Returns the absolute resolved target on success.
///
/// # Errors
///
/// - Return [`FsError::NotFound`] if path does not exist.
/// - Return [`FsError::Access`] if path cannot be inspected.
/// - Return [`FsError::NotManaged`] if path is not a symlink, or if its
///   target is outside of the repository.
pub fn validate_symlink_for_remove(
    path: impl AsRef<Path>,
    repo_root: impl AsRef<Path>,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let metadata = lstat(path)?;
    if !metadata.file_type().is_symlink() {
        return Err(FsError::NotManaged {
            path: path.to_path_buf(),
        });
    }

    let target = resolve_link(path)?;
    let repo_root = canonical_or_normal(repo_root.as_ref());
    let target = match target.parent() {
        Some(parent) => match target.file_name() {
            Some(name) => canonical_or_normal(parent).join(name),
            None => canonical_or_normal(&target),
        },
        None => target,
    };

    if !target.starts_with(&repo_root) {
        debug!(
            "symlink {:?} points at {:?} outside of {:?}",
            path.display(),
            target.display(),
            repo_root.display()
        );
        return Err(FsError::NotManaged {
            path: path.to_path_buf(),
        });
    }

    Ok(target)
}

/// Resolve absolute target of a symlink without following it further.
///
/// Relative targets are resolved against the canonical parent directory of
/// the link, then lexically normalized.
///
/// # Errors
///
/// - Return [`FsError::Io`] if link cannot be read.
pub fn resolve_link(link: impl AsRef<Path>) -> Result<PathBuf> {
    let link = link.as_ref();
    let target = fs::read_link(link).map_err(|source| FsError::Io {
        op: "readlink",
        path: link.to_path_buf(),
        source,
    })?;

    if target.is_absolute() {
        return Ok(normalize(target));
    }

    let parent = link.parent().unwrap_or(Path::new("/"));
    Ok(normalize(canonical_or_normal(parent).join(target)))
}

/// Check if link is a symlink resolving to target.
///
/// Only one level of indirection is resolved. Both sides are compared after
/// canonicalizing their parent directories, so a link is still recognized
/// when home or the repository sits behind a symlinked prefix.
pub fn points_to(link: impl AsRef<Path>, target: impl AsRef<Path>) -> bool {
    let link = link.as_ref();
    let is_symlink = fs::symlink_metadata(link)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false);
    if !is_symlink {
        return false;
    }

    let Ok(resolved) = resolve_link(link) else {
        return false;
    };

    canonical_parent_join(&resolved) == canonical_parent_join(target.as_ref())
}

/// Move path by renaming it.
///
/// Creates the parent directory of the destination if missing. Renames work
/// for files and directories alike. Permissions travel with the content.
///
/// # Errors
///
/// - Return [`FsError::Io`] if parent directory cannot be created, or rename
///   fails, e.g., when crossing filesystems.
pub fn move_path(src: impl AsRef<Path>, dst: impl AsRef<Path>, info: &FileInfo) -> Result<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }

    debug!(
        "move {:?} {:?} to {:?}",
        info.kind,
        src.display(),
        dst.display()
    );
    fs::rename(src, dst).map_err(|source| FsError::Io {
        op: "rename",
        path: src.to_path_buf(),
        source,
    })
}

/// Create a relative symlink at link pointing to target.
///
/// The stored target is computed from the canonical parent of the link to
/// the canonical location of the target, so the link survives moving home,
/// and the repository together to another absolute location.
///
/// # Errors
///
/// - Return [`FsError::Path`] if relative path cannot be computed.
/// - Return [`FsError::Io`] if symlink cannot be created.
pub fn create_relative_symlink(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
    let target = target.as_ref();
    let link = link.as_ref();
    let link_parent = link.parent().ok_or_else(|| FsError::Path {
        base: link.to_path_buf(),
        target: target.to_path_buf(),
    })?;

    let base = canonical_or_normal(link_parent);
    let absolute_target = canonical_parent_join(target);
    let relative = relative_to(&base, &absolute_target).ok_or_else(|| FsError::Path {
        base: base.clone(),
        target: absolute_target.clone(),
    })?;

    debug!("symlink {:?} -> {:?}", link.display(), relative.display());
    symlink(&relative, link).map_err(|source| FsError::Io {
        op: "symlink",
        path: link.to_path_buf(),
        source,
    })
}

/// Create directory and any missing parents with mode 0755.
///
/// Returns the topmost directory that had to be created, if any.
///
/// # Errors
///
/// - Return [`FsError::Io`] if directory cannot be created.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<Option<PathBuf>> {
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(None);
    }

    let first_missing = path
        .ancestors()
        .take_while(|ancestor| !ancestor.as_os_str().is_empty() && !exists(ancestor))
        .last()
        .map(Path::to_path_buf);

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }

    builder.create(path).map_err(|source| FsError::Io {
        op: "mkdir",
        path: path.to_path_buf(),
        source,
    })?;

    Ok(first_missing)
}

/// Remove whatever exists at path.
///
/// Symlinks are removed themselves, never their targets. Directories are
/// removed recursively. A missing path is not an error.
///
/// # Errors
///
/// - Return [`FsError::Io`] if removal fails.
pub fn remove_any(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(FsError::Io {
                op: "lstat",
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let result = if metadata.file_type().is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|source| FsError::Io {
        op: "remove",
        path: path.to_path_buf(),
        source,
    })
}

/// Check if anything exists at path, including dangling symlinks.
pub fn exists(path: impl AsRef<Path>) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn lstat(path: &Path) -> Result<Metadata> {
    fs::symlink_metadata(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => FsError::NotFound {
            path: path.to_path_buf(),
        },
        _ => FsError::Access {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn canonical_or_normal(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| normalize(path))
}

fn canonical_parent_join(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => canonical_or_normal(parent).join(name),
        _ => canonical_or_normal(path),
    }
}

fn describe_type(metadata: &Metadata) -> &'static str {
    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        return "symlink";
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if file_type.is_fifo() {
            return "fifo";
        }
        if file_type.is_socket() {
            return "socket";
        }
        if file_type.is_block_device() || file_type.is_char_device() {
            return "device";
        }
    }

    "special file"
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    let absolute = link.parent().map(|parent| parent.join(target));
    match absolute {
        Some(absolute) if absolute.is_dir() => std::os::windows::fs::symlink_dir(target, link),
        _ => std::os::windows::fs::symlink_file(target, link),
    }
}

/// Filesystem primitive error types.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// Path does not exist.
    #[error("{:?} does not exist", path.display())]
    NotFound { path: PathBuf },

    /// Path exists, but cannot be inspected.
    #[error("cannot access {:?}", path.display())]
    Access {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Path is neither a regular file, nor a directory.
    #[error("{:?} is a {kind}, only regular files and directories can be managed", path.display())]
    UnsupportedType { path: PathBuf, kind: &'static str },

    /// Path is not a symlink into the repository.
    #[error("{:?} is not managed", path.display())]
    NotManaged { path: PathBuf },

    /// Relative path between two locations cannot be computed.
    #[error("cannot compute path of {:?} relative to {:?}", target.display(), base.display())]
    Path { base: PathBuf, target: PathBuf },

    /// Generic filesystem operation fails.
    #[error("failed to {op} {:?}", path.display())]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = FsError> = std::result::Result<T, E>;
