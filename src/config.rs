// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for the optional settings file that lnk reads on
//! startup. Settings live outside of the dotfile repository, so they are
//! specific to the machine they are on and never get committed.

use crate::{bootstrap::DEFAULT_SCRIPT, vcs::DEFAULT_REMOTE};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Settings layout.
///
/// Every field is optional in the file itself. Missing fields fall back to
/// their defaults.
///
/// # General Layout
///
/// ```toml
/// repository = "$HOME/dotfiles"
/// host = "work"
/// remote = "origin"
/// bootstrap = "bootstrap.sh"
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Repository location overriding the default one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<PathBuf>,

    /// Host profile to use when none is given on the command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Name of remote to synchronize with.
    pub remote: String,

    /// Name of bootstrap script at top-level of repository.
    pub bootstrap: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repository: None,
            host: None,
            remote: DEFAULT_REMOTE.into(),
            bootstrap: DEFAULT_SCRIPT.into(),
        }
    }
}

impl Settings {
    /// Load settings from file.
    ///
    /// A missing file yields the default settings.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists, but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file content is invalid.
    /// - Return [`ConfigError::ShellExpansion`] if repository path cannot be
    ///   expanded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(content) => content.parse(),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.to_path_buf(),
            }),
        }
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on repository field.
        if let Some(repository) = settings.repository.take() {
            let expanded = shellexpand::full(repository.to_string_lossy().as_ref())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned();
            settings.repository = Some(PathBuf::from(expanded));
        }

        // INVARIANT: Blank host means common profile.
        if settings.host.as_deref().is_some_and(|host| host.trim().is_empty()) {
            settings.host = None;
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read settings file.
    #[error("failed to read settings file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
