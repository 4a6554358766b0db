// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile manager.
//!
//! The __manager__ makes configuration files portable across machines. Each
//! managed item is moved into a versioned repository, and its original
//! location is replaced with a relative symlink pointing at the copy inside
//! of the repository. Version control then carries the repository between
//! hosts.
//!
//! # Managed Entries
//!
//! A __managed entry__ is a home-relative path tracked by a profile. For
//! every managed entry:
//!
//! - The tracking file of its profile lists it exactly once.
//! - Its content lives at the same relative path under the storage root of
//!   its profile.
//! - Its home location is a relative symlink to that content.
//!
//! The tracking file decides membership. Content lying around in storage
//! does not make an entry managed. Only the doctor reconciles drift between
//! the two; everything else leaves tracking alone.
//!
//! # Transactions
//!
//! The filesystem offers no multi-file transactions. Adding and removing
//! entries therefore records a compensating action for every side effect on
//! a rollback stack, and unwinds that stack in reverse whenever a later step
//! fails. Once the commit is written the stack is discarded.
//!
//! # See Also
//!
//! 1. [`Layout`](crate::layout::Layout)
//! 2. [`Tracker`](crate::tracker::Tracker)
//! 3. [`Vcs`](crate::vcs::Vcs)

pub mod add;
pub mod doctor;
pub mod remove;
pub mod restore;
pub mod rollback;

pub use add::{Progress, PROGRESS_THRESHOLD};
pub use doctor::DoctorReport;

use crate::{
    bootstrap::{self, BootstrapError, DEFAULT_SCRIPT},
    fs::{self as lnk_fs, FsError},
    layout::{Layout, LayoutError, Profile, TRACKING_FILE},
    path::{self, NoWayHome},
    tracker::{Tracker, TrackerError},
    vcs::{Git, SyncStatus, Vcs, VcsError, COMMIT_PREFIX, DEFAULT_REMOTE},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Manager of dotfiles for one profile of a repository.
#[derive(Debug)]
pub struct Manager<V = Git>
where
    V: Vcs,
{
    pub(crate) layout: Layout,
    pub(crate) home_dir: PathBuf,
    pub(crate) vcs: V,
    remote: String,
    bootstrap_script: String,
}

impl Manager<Git> {
    /// Construct new manager backed by Git.
    pub fn new(
        repo_root: impl Into<PathBuf>,
        home_dir: impl Into<PathBuf>,
        profile: Profile,
    ) -> Self {
        let repo_root = repo_root.into();
        let vcs = Git::new(repo_root.clone());
        Self::with_vcs(repo_root, home_dir, profile, vcs)
    }

    /// Construct new manager for default repository, and home directory.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::NoWayHome`] if home directory cannot be
    ///   determined.
    /// - Return [`ManagerError::Absolutize`] if current directory cannot be
    ///   determined.
    pub fn open_default(profile: Profile) -> Result<Self> {
        let repo_root = absolutize(path::default_repo_dir())?;
        Ok(Self::new(repo_root, path::home_dir()?, profile))
    }
}

impl<V> Manager<V>
where
    V: Vcs,
{
    /// Construct new manager with given version control driver.
    pub fn with_vcs(
        repo_root: impl Into<PathBuf>,
        home_dir: impl Into<PathBuf>,
        profile: Profile,
        vcs: V,
    ) -> Self {
        Self {
            layout: Layout::new(path::normalize(repo_root.into()), profile),
            home_dir: path::normalize(home_dir.into()),
            vcs,
            remote: DEFAULT_REMOTE.into(),
            bootstrap_script: DEFAULT_SCRIPT.into(),
        }
    }

    /// Attach remotes under given name instead of the default one.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Look for bootstrap script under given name instead of the default one.
    pub fn with_bootstrap_script(mut self, name: impl Into<String>) -> Self {
        self.bootstrap_script = name.into();
        self
    }

    /// Root of the repository.
    pub fn repo_root(&self) -> &Path {
        self.layout.repo_root()
    }

    /// Home directory that entries are relative to.
    pub fn home_dir(&self) -> &Path {
        self.home_dir.as_path()
    }

    /// Storage layout of active profile.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Version control driver.
    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Tracker of active profile.
    pub fn tracker(&self) -> Tracker {
        Tracker::new(self.layout.tracking_path())
    }

    /// Initialize a new repository.
    ///
    /// Initializing a repository that the manager already owns does
    /// nothing. A repository is owned if it carries any tracking file, or if
    /// all of its commits were written by the manager.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::ExistingForeignRepo`] if repository exists,
    ///   but is not owned by the manager. Nothing gets modified.
    /// - Return [`ManagerError::Vcs`] if repository cannot be created.
    #[instrument(skip(self), level = "debug")]
    pub fn init(&self) -> Result<()> {
        if self.vcs.is_repository() {
            if !self.list_profiles()?.is_empty() || self.vcs.is_managed_repository() {
                info!(
                    "repository {:?} already initialized",
                    self.repo_root().display()
                );
                return Ok(());
            }

            return Err(ManagerError::ExistingForeignRepo {
                repo: self.repo_root().to_path_buf(),
            });
        }

        lnk_fs::ensure_dir(self.repo_root())?;
        self.vcs.init()?;

        Ok(())
    }

    /// Initialize repository by cloning it from a remote.
    ///
    /// If the repository already exists, and is owned by the manager without
    /// tracking anything, the remote is attached to it instead. Forcing the
    /// operation replaces whatever exists at the repository location.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::ManagedFilesExist`] if any profile tracks
    ///   entries, and force is off.
    /// - Return [`ManagerError::ExistingForeignRepo`] if repository location
    ///   holds anything the manager does not own, and force is off.
    /// - Return [`ManagerError::Vcs`] if cloning fails.
    #[instrument(skip(self), level = "debug")]
    pub fn init_with_remote(&self, url: &str, force: bool) -> Result<()> {
        let repo = self.repo_root().to_path_buf();
        if !force && self.has_managed_entries()? {
            return Err(ManagerError::ManagedFilesExist { repo });
        }

        if !is_empty_dir(&repo)? {
            if force {
                warn!("replace existing repository at {:?}", repo.display());
                lnk_fs::remove_any(&repo)?;
            } else if self.vcs.is_managed_repository() {
                info!("repository already initialized, attach remote {url}");
                self.vcs.add_remote(&self.remote, url)?;
                return Ok(());
            } else {
                return Err(ManagerError::ExistingForeignRepo { repo });
            }
        }

        if let Some(parent) = repo.parent() {
            lnk_fs::ensure_dir(parent)?;
        }
        self.vcs.clone_remote(url)?;

        Ok(())
    }

    /// List entries tracked by active profile in byte order.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::NotInitialized`] if repository does not exist.
    /// - Return [`ManagerError::Tracker`] if tracking file cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        self.ensure_initialized()?;
        Ok(self.tracker().load()?.into_iter().collect())
    }

    /// List every profile that has a tracking file in the repository.
    ///
    /// The common profile comes first, followed by host profiles in name
    /// order.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::Glob`] if repository path cannot be used as a
    ///   search pattern.
    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut profiles = Vec::new();
        if self.repo_root().join(TRACKING_FILE).is_file() {
            profiles.push(Profile::common());
        }

        let pattern = format!(
            "{}/{TRACKING_FILE}.*",
            glob::Pattern::escape(&self.repo_root().to_string_lossy())
        );
        let mut hosts = Vec::new();
        for entry in glob::glob(&pattern)?.flatten() {
            let Some(name) = entry.file_name().map(|name| name.to_string_lossy()) else {
                continue;
            };
            let Some(host) = name.strip_prefix(&format!("{TRACKING_FILE}.")) else {
                continue;
            };
            match Profile::host(host) {
                Ok(profile) if !profile.is_common() && entry.is_file() => hosts.push(profile),
                _ => debug!("skip {:?}", entry.display()),
            }
        }
        hosts.sort();
        profiles.extend(hosts);

        Ok(profiles)
    }

    /// Synchronization state of the repository.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::NotInitialized`] if repository does not exist.
    /// - Return [`ManagerError::Vcs`] if status cannot be determined.
    pub fn status(&self) -> Result<SyncStatus> {
        self.ensure_initialized()?;
        Ok(self.vcs.status()?)
    }

    /// Uncommitted changes of the repository.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::NotInitialized`] if repository does not exist.
    /// - Return [`ManagerError::Vcs`] if diff cannot be produced.
    pub fn diff(&self, color: bool) -> Result<String> {
        self.ensure_initialized()?;
        Ok(self.vcs.diff(color)?)
    }

    /// Commit every pending change with message, then push.
    ///
    /// Nothing gets committed if the repository is clean.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::NotInitialized`] if repository does not exist.
    /// - Return [`ManagerError::Vcs`] if staging, committing, or pushing fails.
    #[instrument(skip(self), level = "debug")]
    pub fn push(&self, message: &str) -> Result<()> {
        self.ensure_initialized()?;
        if self.vcs.has_changes()? {
            self.vcs.add_all()?;
            self.vcs.commit(message)?;
        } else {
            debug!("nothing to commit before push");
        }
        self.vcs.push()?;

        Ok(())
    }

    /// Pull from remote, then restore symlinks of active profile.
    ///
    /// Returns the entries whose symlinks had to be restored.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::NotInitialized`] if repository does not exist.
    /// - Return [`ManagerError::Vcs`] if pulling fails.
    /// - Return [`ManagerError::Fs`] if a symlink cannot be restored.
    #[instrument(skip(self), level = "debug")]
    pub fn pull(&self) -> Result<Vec<String>> {
        self.ensure_initialized()?;
        self.vcs.pull()?;
        self.restore_symlinks()
    }

    /// Locate bootstrap script of repository.
    pub fn find_bootstrap(&self) -> Option<PathBuf> {
        bootstrap::find_script(self.repo_root(), &self.bootstrap_script)
    }

    /// Run bootstrap script of repository.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::NotInitialized`] if repository does not exist.
    /// - Return [`ManagerError::Bootstrap`] if script is missing, not
    ///   executable, or fails.
    pub fn run_bootstrap(&self) -> Result<()> {
        self.ensure_initialized()?;
        Ok(bootstrap::run_script(
            self.repo_root(),
            &self.bootstrap_script,
        )?)
    }

    pub(crate) fn ensure_initialized(&self) -> Result<()> {
        if self.vcs.is_repository() {
            return Ok(());
        }

        Err(ManagerError::NotInitialized {
            repo: self.repo_root().to_path_buf(),
        })
    }

    fn has_managed_entries(&self) -> Result<bool> {
        for profile in self.list_profiles()? {
            let layout = Layout::new(self.repo_root(), profile);
            if !Tracker::new(layout.tracking_path()).load()?.is_empty() {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Home-relative tracking entry for an absolute path.
    pub(crate) fn entry_of(&self, path: &Path) -> Result<String> {
        let rel = path::home_relative(&self.home_dir, path);
        rel.to_str()
            .map(str::to_owned)
            .ok_or_else(|| ManagerError::Fs(FsError::UnsupportedType {
                path: path.to_path_buf(),
                kind: "path that is not valid UTF-8",
            }))
    }

    /// Path of tracking file as seen by the VCS.
    pub(crate) fn tracking_vcs_path(&self) -> PathBuf {
        PathBuf::from(self.layout.tracking_name())
    }
}

/// Compose commit message with the manager's prefix.
pub(crate) fn commit_message(body: impl Display) -> String {
    format!("{COMMIT_PREFIX} {body}")
}

pub(crate) fn absolutize(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    path::absolutize(path).map_err(|source| ManagerError::Absolutize {
        path: path.to_path_buf(),
        source,
    })
}

fn is_empty_dir(path: &Path) -> Result<bool> {
    match fs::read_dir(path) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(source) => Err(ManagerError::Fs(FsError::Io {
            op: "read directory",
            path: path.to_path_buf(),
            source,
        })),
    }
}

/// Kind of a manager error.
///
/// Groups the many concrete errors into the handful of situations a caller
/// has to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Access,
    UnsupportedType,
    NotManaged,
    AlreadyManaged,
    NotInitialized,
    ExistingForeignRepo,
    ManagedFilesExist,
    EmptyInput,
    Bootstrap,
    Path,
    Io,
    Vcs,
    Config,
}

impl Display for ErrorKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::NotFound => "not-found",
            Self::Access => "access",
            Self::UnsupportedType => "unsupported-type",
            Self::NotManaged => "not-managed",
            Self::AlreadyManaged => "already-managed",
            Self::NotInitialized => "not-initialized",
            Self::ExistingForeignRepo => "existing-foreign-repo",
            Self::ManagedFilesExist => "managed-files-exist",
            Self::EmptyInput => "empty-input",
            Self::Bootstrap => "bootstrap",
            Self::Path => "path",
            Self::Io => "io",
            Self::Vcs => "vcs",
            Self::Config => "config",
        };
        fmt.write_str(name)
    }
}

/// All possible error types for manager operations.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// Profile cannot be laid out.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// Tracking file cannot be read or written.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Filesystem primitive fails.
    #[error(transparent)]
    Fs(#[from] FsError),

    /// Version control fails.
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// Bootstrap script fails.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// Home directory cannot be determined.
    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),

    /// Repository path cannot be turned into a search pattern.
    #[error(transparent)]
    Glob(#[from] glob::PatternError),

    /// Path cannot be made absolute.
    #[error("cannot make {:?} absolute", path.display())]
    Absolutize {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Directory cannot be walked.
    #[error("failed to walk {:?}", path.display())]
    Walk {
        #[source]
        source: ignore::Error,
        path: PathBuf,
    },

    /// Path is not tracked by active profile.
    #[error("{:?} is not managed", path.display())]
    NotManaged { path: PathBuf },

    /// Path is already tracked, or conflicts with stored content.
    #[error("{:?} is already managed", path.display())]
    AlreadyManaged { path: PathBuf },

    /// Repository does not exist yet.
    #[error("repository {:?} is not initialized", repo.display())]
    NotInitialized { repo: PathBuf },

    /// Repository exists, but is not owned by the manager.
    #[error("{:?} contains a repository not managed by lnk", repo.display())]
    ExistingForeignRepo { repo: PathBuf },

    /// Initializing from remote would clobber managed entries.
    #[error("repository {:?} already manages files", repo.display())]
    ManagedFilesExist { repo: PathBuf },

    /// Nothing to operate on.
    #[error("no files to add")]
    EmptyInput,

    /// Operation on a specific path fails, after rolling back.
    #[error("failed to add {:?}", path.display())]
    Failed {
        #[source]
        source: Box<ManagerError>,
        path: PathBuf,
    },
}

impl ManagerError {
    /// Kind of error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Layout(_) => ErrorKind::Path,
            Self::Tracker(_) => ErrorKind::Io,
            Self::Fs(err) => match err {
                FsError::NotFound { .. } => ErrorKind::NotFound,
                FsError::Access { .. } => ErrorKind::Access,
                FsError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
                FsError::NotManaged { .. } => ErrorKind::NotManaged,
                FsError::Path { .. } => ErrorKind::Path,
                FsError::Io { .. } => ErrorKind::Io,
            },
            Self::Vcs(_) => ErrorKind::Vcs,
            Self::Bootstrap(_) => ErrorKind::Bootstrap,
            Self::NoWayHome(_) => ErrorKind::Config,
            Self::Glob(_) => ErrorKind::Path,
            Self::Absolutize { .. } => ErrorKind::Io,
            Self::Walk { .. } => ErrorKind::Io,
            Self::NotManaged { .. } => ErrorKind::NotManaged,
            Self::AlreadyManaged { .. } => ErrorKind::AlreadyManaged,
            Self::NotInitialized { .. } => ErrorKind::NotInitialized,
            Self::ExistingForeignRepo { .. } => ErrorKind::ExistingForeignRepo,
            Self::ManagedFilesExist { .. } => ErrorKind::ManagedFilesExist,
            Self::EmptyInput => ErrorKind::EmptyInput,
            Self::Failed { source, .. } => source.kind(),
        }
    }

    /// Suggestion on how to get past the error, if there is one.
    pub fn hint(&self) -> Option<&'static str> {
        match self.kind() {
            ErrorKind::NotManaged => Some("use `lnk add` to start managing it"),
            ErrorKind::AlreadyManaged => Some("use `lnk list` to see managed files"),
            ErrorKind::NotInitialized => Some("run `lnk init` first"),
            ErrorKind::ExistingForeignRepo => {
                Some("move the existing repository away, or point lnk elsewhere")
            }
            ErrorKind::ManagedFilesExist => {
                Some("use `lnk pull` to update, or pass --force to replace them")
            }
            ErrorKind::UnsupportedType => Some("only regular files and directories can be added"),
            ErrorKind::EmptyInput => Some("the directory contains no files"),
            _ => None,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = ManagerError> = std::result::Result<T, E>;
