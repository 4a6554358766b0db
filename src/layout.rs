// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository layout by profile.
//!
//! One repository hosts the __common__ profile, shared by every machine, and
//! any number of __host__ profiles that only apply on a named host. The
//! profile decides where managed content is stored and which tracking file
//! lists it:
//!
//! ```text
//! <repo_root>/
//!   .lnk                 # common tracking file
//!   .lnk.<host>          # host tracking file
//!   <path...>            # common managed content
//!   <host>.lnk/<path...> # host managed content
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

/// Base name of every tracking file.
pub const TRACKING_FILE: &str = ".lnk";

/// Suffix of every host storage directory.
const HOST_STORAGE_SUFFIX: &str = ".lnk";

/// Selector for common versus host-specific configuration.
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Profile(String);

impl Profile {
    /// Profile shared across all machines.
    pub fn common() -> Self {
        Self::default()
    }

    /// Profile applied only on the named host.
    ///
    /// An empty name yields the common profile.
    ///
    /// # Errors
    ///
    /// - Return [`LayoutError::InvalidProfile`] if name contains a path
    ///   separator.
    pub fn host(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.contains('/') || name.contains('\\') || name.contains(std::path::MAIN_SEPARATOR) {
            return Err(LayoutError::InvalidProfile { profile: name });
        }

        Ok(Self(name))
    }

    /// Check if this is the common profile.
    pub fn is_common(&self) -> bool {
        self.0.is_empty()
    }

    /// Name of the profile, empty for common.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Profile {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.is_common() {
            fmt.write_str("common")
        } else {
            fmt.write_str(self.as_str())
        }
    }
}

/// Storage layout of a profile inside a repository.
///
/// Pure path arithmetic. Nothing here touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    repo_root: PathBuf,
    profile: Profile,
}

impl Layout {
    /// Construct new layout for profile rooted at repository path.
    pub fn new(repo_root: impl Into<PathBuf>, profile: Profile) -> Self {
        Self {
            repo_root: repo_root.into(),
            profile,
        }
    }

    /// Root of the repository working tree.
    pub fn repo_root(&self) -> &Path {
        self.repo_root.as_path()
    }

    /// Profile this layout resolves for.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Name of tracking file relative to repository root.
    pub fn tracking_name(&self) -> String {
        if self.profile.is_common() {
            TRACKING_FILE.to_string()
        } else {
            format!("{TRACKING_FILE}.{}", self.profile.as_str())
        }
    }

    /// Absolute path to tracking file of profile.
    pub fn tracking_path(&self) -> PathBuf {
        self.repo_root.join(self.tracking_name())
    }

    /// Directory holding managed content of profile.
    pub fn storage_root(&self) -> PathBuf {
        if self.profile.is_common() {
            self.repo_root.clone()
        } else {
            self.repo_root.join(self.host_storage_name())
        }
    }

    /// Absolute storage path of home-relative entry.
    pub fn storage_path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.storage_root().join(rel)
    }

    /// Path of home-relative entry as seen by the VCS.
    pub fn vcs_path(&self, rel: impl AsRef<Path>) -> PathBuf {
        if self.profile.is_common() {
            rel.as_ref().to_path_buf()
        } else {
            PathBuf::from(self.host_storage_name()).join(rel)
        }
    }

    fn host_storage_name(&self) -> String {
        format!("{}{HOST_STORAGE_SUFFIX}", self.profile.as_str())
    }
}

/// Layout error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum LayoutError {
    /// Profile name cannot be used as a path component.
    #[error("invalid host profile {profile:?}: must not contain a path separator")]
    InvalidProfile { profile: String },
}

/// Friendly result alias :3
pub type Result<T, E = LayoutError> = std::result::Result<T, E>;
