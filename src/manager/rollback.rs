// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Compensating actions for failed transactions.

use crate::{
    fs::{self as lnk_fs, FileInfo},
    tracker::Tracker,
    vcs::Vcs,
};

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Action that undoes one side effect of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Undo {
    /// Move content back to where it came from.
    MoveBack {
        from: PathBuf,
        to: PathBuf,
        info: FileInfo,
    },

    /// Remove a symlink that was created.
    RemoveLink { link: PathBuf },

    /// Re-create a symlink that was removed.
    Relink { target: PathBuf, link: PathBuf },

    /// Drop entry that was tracked.
    Untrack { entry: String },

    /// Track entry that was dropped.
    Retrack { entry: String },

    /// Restore index entry of path to its committed state.
    Unstage { path: PathBuf },

    /// Remove directories created from top down to deepest, if still empty.
    RemoveEmptyDirs { top: PathBuf, deepest: PathBuf },
}

/// Stack of compensating actions.
///
/// Actions are undone in reverse order of recording. Failure to undo one
/// action is logged, and does not stop the remaining ones.
#[derive(Debug, Default)]
pub struct Rollback {
    stack: Vec<Undo>,
}

impl Rollback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record compensating action for side effect that just happened.
    pub fn push(&mut self, undo: Undo) {
        debug!("record {undo:?}");
        self.stack.push(undo);
    }

    /// Recorded actions in order of recording.
    pub fn actions(&self) -> &[Undo] {
        self.stack.as_slice()
    }

    /// Forget every recorded action after successful commit.
    pub fn discard(mut self) {
        self.stack.clear();
    }

    /// Undo every recorded action in reverse.
    pub fn run(mut self, tracker: &Tracker, vcs: &impl Vcs) {
        while let Some(undo) = self.stack.pop() {
            debug!("undo {undo:?}");
            if let Err(err) = undo.apply(tracker, vcs) {
                warn!("rollback step {undo:?} failed: {err}");
            }
        }
    }
}

impl Undo {
    fn apply(&self, tracker: &Tracker, vcs: &impl Vcs) -> anyhow::Result<()> {
        match self {
            Self::MoveBack { from, to, info } => lnk_fs::move_path(from, to, info)?,
            Self::RemoveLink { link } => lnk_fs::remove_any(link)?,
            Self::Relink { target, link } => lnk_fs::create_relative_symlink(target, link)?,
            Self::Untrack { entry } => tracker.remove(entry)?,
            Self::Retrack { entry } => tracker.add(entry.as_str())?,
            Self::Unstage { path } => vcs.reset(path)?,
            Self::RemoveEmptyDirs { top, deepest } => remove_empty_dirs(top, deepest),
        }

        Ok(())
    }
}

fn remove_empty_dirs(top: &Path, deepest: &Path) {
    for dir in deepest.ancestors() {
        // INVARIANT: Only remove directories that are empty.
        if fs::remove_dir(dir).is_err() {
            break;
        }

        if dir == top {
            break;
        }
    }
}
