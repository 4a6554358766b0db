// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bootstrap script runner.
//!
//! A repository may ship a script at its top-level that installs whatever
//! the dotfiles need on a fresh machine. The script is run with the
//! repository root as its working directory, and inherits the standard
//! streams of the current process so it can talk to the user.

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};
use tracing::{info, instrument};

/// Default name of bootstrap script.
pub const DEFAULT_SCRIPT: &str = "bootstrap.sh";

/// Locate bootstrap script at top-level of repository.
///
/// Returns `None` if there is no such file.
pub fn find_script(repo_root: impl AsRef<Path>, name: &str) -> Option<PathBuf> {
    let script = repo_root.as_ref().join(name);
    script.is_file().then_some(script)
}

/// Run bootstrap script at top-level of repository.
///
/// # Errors
///
/// - Return [`BootstrapError::NotFound`] if script does not exist.
/// - Return [`BootstrapError::NotExecutable`] if script lacks execute
///   permission.
/// - Return [`BootstrapError::Spawn`] if script cannot be started.
/// - Return [`BootstrapError::Failed`] if script exits unsuccessfully.
#[instrument(skip(repo_root), level = "debug")]
pub fn run_script(repo_root: impl AsRef<Path>, name: &str) -> Result<()> {
    let repo_root = repo_root.as_ref();
    let script = find_script(repo_root, name).ok_or_else(|| BootstrapError::NotFound {
        script: repo_root.join(name),
    })?;

    if !is_executable(&script) {
        return Err(BootstrapError::NotExecutable { script });
    }

    info!("run bootstrap script {:?}", script.display());
    let status = Command::new(&script)
        .current_dir(repo_root)
        .spawn()
        .and_then(|mut child| child.wait())
        .map_err(|source| BootstrapError::Spawn {
            source,
            script: script.clone(),
        })?;

    if !status.success() {
        return Err(BootstrapError::Failed { script, status });
    }

    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|metadata| metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}

/// Bootstrap error types.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Bootstrap script does not exist.
    #[error("bootstrap script not found at {:?}", script.display())]
    NotFound { script: PathBuf },

    /// Bootstrap script lacks execute permission.
    #[error("bootstrap script {:?} is not executable", script.display())]
    NotExecutable { script: PathBuf },

    /// Bootstrap script cannot be started.
    #[error("failed to start bootstrap script {:?}", script.display())]
    Spawn {
        #[source]
        source: std::io::Error,
        script: PathBuf,
    },

    /// Bootstrap script exits unsuccessfully.
    #[error("bootstrap script {:?} failed with {status}", script.display())]
    Failed { script: PathBuf, status: ExitStatus },
}

/// Friendly result alias :3
pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;
