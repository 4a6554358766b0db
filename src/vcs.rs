// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control driver.
//!
//! The manager only ever talks to version control through the narrow
//! [`Vcs`] trait. The [`Git`] driver implements it: local repository work
//! goes through libgit2, cloning goes through libgit2 with interactive
//! authentication, and network synchronization shells out to the Git binary
//! so the user's own transport configuration applies.
//!
//! # Commit Conventions
//!
//! Every commit the manager writes on its own carries the [`COMMIT_PREFIX`].
//! A repository whose history consists only of such commits is considered to
//! be managed, see [`Vcs::is_managed_repository`].

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::RepoBuilder, BranchType, Commit, Config, DiffFormat, DiffOptions, ErrorCode,
    FetchOptions, IndexAddOption, ObjectType, RemoteCallbacks, Repository, RepositoryInitOptions, Signature,
    StatusOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    ffi::{OsStr, OsString},
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
    process::Command,
    time,
};
use tracing::{debug, info, instrument, warn};

/// Prefix of every commit message written by the manager.
pub const COMMIT_PREFIX: &str = "lnk:";

/// Default name of the remote to synchronize with.
pub const DEFAULT_REMOTE: &str = "origin";

/// Synchronization state of a repository.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    /// Commits on the local branch missing from its upstream.
    pub ahead: usize,

    /// Commits on the upstream missing from the local branch.
    pub behind: usize,

    /// Upstream branch, e.g., "origin/main", if one is configured.
    pub remote: Option<String>,

    /// Working tree, or index differ from HEAD.
    pub dirty: bool,
}

/// Narrow interface over a version control tool.
///
/// All paths handed to the driver are relative to the repository root.
pub trait Vcs {
    /// Create a new repository.
    fn init(&self) -> Result<()>;

    /// Clone remote repository into the repository directory.
    fn clone_remote(&self, url: &str) -> Result<()>;

    /// Register a remote, doing nothing if it already points at url.
    fn add_remote(&self, name: &str, url: &str) -> Result<()>;

    /// Stage path, recursing into directories.
    fn add(&self, path: &Path) -> Result<()>;

    /// Unstage path from the index only, keeping the working copy.
    fn rm(&self, path: &Path) -> Result<()>;

    /// Restore index entry of path from HEAD, or drop it without HEAD.
    fn reset(&self, path: &Path) -> Result<()>;

    /// Commit whatever is staged.
    fn commit(&self, message: &str) -> Result<()>;

    /// Stage every change in the working tree, deletions included.
    fn add_all(&self) -> Result<()>;

    /// Push current branch to the remote.
    fn push(&self) -> Result<()>;

    /// Pull current branch from the remote.
    fn pull(&self) -> Result<()>;

    /// Check if the repository directory is a repository.
    fn is_repository(&self) -> bool;

    /// Check if repository exists, and every commit carries the manager's
    /// commit prefix. A repository without commits counts as managed.
    fn is_managed_repository(&self) -> bool {
        if !self.is_repository() {
            return false;
        }

        match self.get_commits() {
            Ok(commits) => commits
                .iter()
                .all(|message| message.starts_with(COMMIT_PREFIX)),
            Err(_) => false,
        }
    }

    /// Check if working tree, or index differ from HEAD.
    fn has_changes(&self) -> Result<bool>;

    /// Synchronization state relative to upstream.
    fn status(&self) -> Result<SyncStatus>;

    /// Patch of uncommitted changes, optionally with ANSI colors.
    fn diff(&self, color: bool) -> Result<String>;

    /// Commit messages reachable from HEAD, newest first.
    fn get_commits(&self) -> Result<Vec<String>>;

    /// Name of the branch HEAD points at, born or not.
    fn current_branch(&self) -> Result<String>;
}

/// Version control through Git.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    remote: String,
}

impl Git {
    /// Construct new Git driver for repository directory.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            remote: DEFAULT_REMOTE.into(),
        }
    }

    /// Synchronize with named remote instead of the default one.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Path to repository directory.
    pub fn workdir(&self) -> &Path {
        self.workdir.as_path()
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(&self.workdir).map_err(|source| VcsError::Git2 { op: "open", source })
    }

    fn signature(repo: &Repository) -> Result<Signature<'static>> {
        match repo.signature() {
            Ok(signature) => Ok(signature.to_owned()),
            Err(_) => {
                warn!("no git identity configured, committing as lnk <lnk@localhost>");
                Signature::now("lnk", "lnk@localhost")
                    .map_err(|source| VcsError::Git2 { op: "commit", source })
            }
        }
    }

    fn branch_of(repo: &Repository) -> Result<String> {
        let head = match repo.find_reference("HEAD") {
            Ok(head) => head,
            Err(source) => return Err(VcsError::Git2 { op: "head", source }),
        };

        // INVARIANT: Unborn HEAD still names its branch symbolically.
        match head.symbolic_target() {
            Some(target) => Ok(target
                .strip_prefix("refs/heads/")
                .unwrap_or(target)
                .to_string()),
            None => Err(VcsError::DetachedHead),
        }
    }

    /// Check if HEAD has no commit to point at yet.
    fn is_unborn(repo: &Repository) -> Result<bool> {
        match repo.head() {
            Ok(_) => Ok(false),
            Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(true)
            }
            Err(source) => Err(VcsError::Git2 { op: "head", source }),
        }
    }

    fn gitcall(&self, args: &[&str]) -> Result<String> {
        let mut bin_args: Vec<OsString> = vec!["-C".into(), self.workdir.clone().into_os_string()];
        bin_args.extend(args.iter().map(OsString::from));
        syscall_non_interactive("git", bin_args)
    }
}

impl Vcs for Git {
    #[instrument(skip(self), level = "debug")]
    fn init(&self) -> Result<()> {
        info!("initialize repository at {:?}", self.workdir.display());
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        opts.mkpath(true);
        Repository::init_opts(&self.workdir, &opts)
            .map_err(|source| VcsError::Git2 { op: "init", source })?;
        Ok(())
    }

    /// Clone remote repository.
    ///
    /// The progress of the clone is displayed through a progress bar. If any
    /// credentials are required for the clone to continue, then the user will
    /// be prompted for that information accordingly. The progress bar will be
    /// blocked for user input.
    #[instrument(skip(self), level = "debug")]
    fn clone_remote(&self, url: &str) -> Result<()> {
        info!("clone {url} into {:?}", self.workdir.display());
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);
        bar.set_message(url.to_string());
        bar.enable_steady_tick(time::Duration::from_millis(100));

        let prompter = IndicatifPrompter::new(bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter);
        let config =
            Config::open_default().map_err(|source| VcsError::Git2 { op: "clone", source })?;

        let mut throttle = time::Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|progress| {
            if throttle.elapsed() > time::Duration::from_millis(10) {
                throttle = time::Instant::now();
                bar.set_length(progress.total_objects() as u64);
                bar.set_position(progress.received_objects() as u64);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        let result = RepoBuilder::new()
            .fetch_options(fo)
            .clone(url, &self.workdir);
        bar.finish_and_clear();
        result.map_err(|source| VcsError::Git2 { op: "clone", source })?;

        Ok(())
    }

    fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        let repo = self.open()?;
        if let Ok(remote) = repo.find_remote(name) {
            return match remote.url() {
                Some(existing) if existing == url => Ok(()),
                existing => Err(VcsError::RemoteExists {
                    name: name.into(),
                    url: existing.unwrap_or_default().into(),
                }),
            };
        }

        repo.remote(name, url)
            .map_err(|source| VcsError::Git2 { op: "remote add", source })?;
        Ok(())
    }

    fn add(&self, path: &Path) -> Result<()> {
        debug!("stage {:?}", path.display());
        let repo = self.open()?;
        let mut index = repo
            .index()
            .map_err(|source| VcsError::Git2 { op: "add", source })?;
        // INVARIANT: Explicitly named paths are staged even if ignored.
        index
            .add_all([path], IndexAddOption::FORCE, None)
            .and_then(|_| index.write())
            .map_err(|source| VcsError::Git2 { op: "add", source })?;

        let staged = index.get_path(path, 0).is_some()
            || index.iter().any(|entry| {
                Path::new(OsStr::from_bytes(&entry.path)).starts_with(path)
            });
        if !staged {
            return Err(VcsError::NotStaged {
                path: path.to_path_buf(),
            });
        }

        Ok(())
    }

    fn rm(&self, path: &Path) -> Result<()> {
        debug!("unstage {:?}", path.display());
        let repo = self.open()?;
        let mut index = repo
            .index()
            .map_err(|source| VcsError::Git2 { op: "rm", source })?;
        index
            .remove_all([path], None)
            .and_then(|_| index.write())
            .map_err(|source| VcsError::Git2 { op: "rm", source })
    }

    fn reset(&self, path: &Path) -> Result<()> {
        debug!("reset index entry {:?}", path.display());
        let repo = self.open()?;
        let head = repo.head().and_then(|head| head.peel(ObjectType::Commit));
        match head {
            Ok(commit) => repo
                .reset_default(Some(&commit), [path])
                .map_err(|source| VcsError::Git2 { op: "reset", source }),
            Err(_) => self.rm(path),
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn commit(&self, message: &str) -> Result<()> {
        let repo = self.open()?;
        let git_err = |source| VcsError::Git2 { op: "commit", source };

        // INVARIANT: Always use new tree produced by current index.
        let mut index = repo.index().map_err(git_err)?;
        let tree_oid = index.write_tree().map_err(git_err)?;
        let tree = repo.find_tree(tree_oid).map_err(git_err)?;

        // INVARIANT: Always append to HEAD when it exists.
        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit().map_err(git_err)?),
            Err(_) => None,
        };
        let parents = parent.iter().collect::<Vec<&Commit>>();

        let signature = Self::signature(&repo)?;
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(git_err)?;
        info!("commit {message:?}");

        Ok(())
    }

    fn add_all(&self) -> Result<()> {
        let repo = self.open()?;
        let mut index = repo
            .index()
            .map_err(|source| VcsError::Git2 { op: "add", source })?;
        index
            .add_all(["*"], IndexAddOption::DEFAULT, None)
            .and_then(|_| index.update_all(["*"], None))
            .and_then(|_| index.write())
            .map_err(|source| VcsError::Git2 { op: "add", source })
    }

    #[instrument(skip(self), level = "debug")]
    fn push(&self) -> Result<()> {
        let repo = self.open()?;
        let branch = Self::branch_of(&repo)?;
        let output = self.gitcall(&["push", "-u", self.remote.as_str(), branch.as_str()])?;
        info!("{output}");
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn pull(&self) -> Result<()> {
        let repo = self.open()?;
        let branch = Self::branch_of(&repo)?;
        let output = self.gitcall(&["pull", self.remote.as_str(), branch.as_str()])?;
        info!("{output}");
        Ok(())
    }

    fn is_repository(&self) -> bool {
        Repository::open(&self.workdir).is_ok()
    }

    fn has_changes(&self) -> Result<bool> {
        let repo = self.open()?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let statuses = repo
            .statuses(Some(&mut opts))
            .map_err(|source| VcsError::Git2 { op: "status", source })?;
        Ok(!statuses.is_empty())
    }

    fn status(&self) -> Result<SyncStatus> {
        let repo = self.open()?;
        let mut status = SyncStatus {
            dirty: self.has_changes()?,
            ..SyncStatus::default()
        };

        let Ok(branch_name) = Self::branch_of(&repo) else {
            return Ok(status);
        };
        let git_err = |source| VcsError::Git2 { op: "status", source };
        let Ok(branch) = repo.find_branch(&branch_name, BranchType::Local) else {
            debug!("branch {branch_name} has no commits yet");
            return Ok(status);
        };
        let Ok(upstream) = branch.upstream() else {
            debug!("branch {branch_name} has no upstream");
            return Ok(status);
        };

        status.remote = upstream.name().ok().flatten().map(str::to_owned);
        if let (Some(local), Some(remote)) = (branch.get().target(), upstream.get().target()) {
            let (ahead, behind) = repo.graph_ahead_behind(local, remote).map_err(git_err)?;
            status.ahead = ahead;
            status.behind = behind;
        }

        Ok(status)
    }

    fn diff(&self, color: bool) -> Result<String> {
        let repo = self.open()?;
        let git_err = |source| VcsError::Git2 { op: "diff", source };
        let head_tree = repo.head().ok().and_then(|head| head.peel_to_tree().ok());

        let mut opts = DiffOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .show_untracked_content(true);
        let diff = repo
            .diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))
            .map_err(git_err)?;

        let mut out = String::new();
        diff.print(DiffFormat::Patch, |_, _, line| {
            let content = String::from_utf8_lossy(line.content());
            let (origin, paint) = match line.origin() {
                '+' => ("+", "\x1b[32m"),
                '-' => ("-", "\x1b[31m"),
                ' ' => (" ", ""),
                'H' => ("", "\x1b[36m"),
                'F' => ("", "\x1b[1m"),
                _ => ("", ""),
            };

            if color && !paint.is_empty() {
                out.push_str(paint);
                out.push_str(origin);
                out.push_str(content.trim_end_matches('\n'));
                out.push_str("\x1b[0m\n");
            } else {
                out.push_str(origin);
                out.push_str(&content);
            }
            true
        })
        .map_err(git_err)?;

        Ok(out)
    }

    fn get_commits(&self) -> Result<Vec<String>> {
        let repo = self.open()?;
        let git_err = |source| VcsError::Git2 { op: "log", source };
        if Self::is_unborn(&repo)? {
            return Ok(Vec::new());
        }

        let mut walk = repo.revwalk().map_err(git_err)?;
        walk.push_head().map_err(git_err)?;

        let mut messages = Vec::new();
        for oid in walk {
            let commit = repo.find_commit(oid.map_err(git_err)?).map_err(git_err)?;
            messages.push(commit.message().unwrap_or_default().trim_end().to_string());
        }

        Ok(messages)
    }

    fn current_branch(&self) -> Result<String> {
        let repo = self.open()?;
        Self::branch_of(&repo)
    }
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let args = args
        .into_iter()
        .map(|arg| arg.as_ref().to_os_string())
        .collect::<Vec<_>>();
    let op = args
        .iter()
        .skip(2)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");

    let output = Command::new(cmd.as_ref())
        .args(&args)
        .output()
        .map_err(|source| VcsError::Spawn {
            cmd: cmd.as_ref().to_string_lossy().into_owned(),
            source,
        })?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(VcsError::Command { op, output: message });
    }

    Ok(message)
}

/// Version control error types.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Operation from libgit2 fails.
    #[error("git {op} failed")]
    Git2 {
        op: &'static str,
        #[source]
        source: git2::Error,
    },

    /// Git binary cannot be spawned.
    #[error("failed to run {cmd:?}")]
    Spawn {
        cmd: String,
        #[source]
        source: std::io::Error,
    },

    /// Git binary exits unsuccessfully.
    #[error("git {op} failed:\n{output}")]
    Command { op: String, output: String },

    /// Path matched nothing to stage.
    #[error("nothing staged for {path:?}")]
    NotStaged { path: PathBuf },

    /// HEAD does not point at a branch.
    #[error("HEAD is detached, cannot determine current branch")]
    DetachedHead,

    /// Remote already exists with another URL.
    #[error("remote {name:?} already exists with url {url:?}")]
    RemoteExists { name: String, url: String },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = VcsError> = std::result::Result<T, E>;
