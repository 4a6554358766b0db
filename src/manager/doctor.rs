// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reconcile tracking with storage and home.
//!
//! Tracking, storage, and home drift apart whenever the user edits one of
//! them behind the manager's back. The doctor is the only place that
//! changes tracking to match what is actually on disk.

use super::{commit_message, Manager, Result};
use crate::{fs as lnk_fs, path, vcs::Vcs};

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{info, instrument, warn};

/// Problems found in a profile.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DoctorReport {
    /// Entries without stored content, or escaping the storage root.
    pub invalid_entries: Vec<String>,

    /// Entries with stored content, but no symlink pointing at it.
    pub broken_symlinks: Vec<String>,
}

impl DoctorReport {
    /// Check if nothing needs fixing.
    pub fn is_healthy(&self) -> bool {
        self.invalid_entries.is_empty() && self.broken_symlinks.is_empty()
    }
}

impl Display for DoctorReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.is_healthy() {
            return writeln!(fmt, "no problems found");
        }

        for entry in &self.invalid_entries {
            writeln!(fmt, "invalid entry: {entry}")?;
        }

        for entry in &self.broken_symlinks {
            writeln!(fmt, "broken symlink: {entry}")?;
        }

        Ok(())
    }
}

impl<V> Manager<V>
where
    V: Vcs,
{
    /// Diagnose active profile without changing anything.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::NotInitialized`](super::ManagerError::NotInitialized)
    ///   if repository does not exist.
    /// - Return [`ManagerError::Tracker`](super::ManagerError::Tracker) if
    ///   tracking file cannot be read.
    pub fn doctor_preview(&self) -> Result<DoctorReport> {
        self.ensure_initialized()?;
        let mut report = DoctorReport::default();

        for entry in self.tracker().load()? {
            if path::is_malformed(&entry) {
                report.invalid_entries.push(entry);
                continue;
            }

            let stored = self.layout.storage_path(&entry);
            if !lnk_fs::exists(&stored) {
                report.invalid_entries.push(entry);
                continue;
            }

            if !lnk_fs::points_to(self.home_dir.join(&entry), &stored) {
                report.broken_symlinks.push(entry);
            }
        }

        Ok(report)
    }

    /// Diagnose active profile, then fix what was found.
    ///
    /// Broken symlinks are restored first. Invalid entries are then dropped
    /// from tracking in one commit. A failure midway keeps whatever got
    /// fixed so far.
    ///
    /// Returns what was found before fixing.
    ///
    /// # Errors
    ///
    /// - Return any error of [`Manager::doctor_preview`].
    /// - Return [`ManagerError::Fs`](super::ManagerError::Fs) if a symlink
    ///   cannot be restored.
    /// - Return [`ManagerError::Vcs`](super::ManagerError::Vcs) if committing
    ///   fails.
    #[instrument(skip(self), level = "debug")]
    pub fn doctor_fix(&self) -> Result<DoctorReport> {
        let report = self.doctor_preview()?;

        if !report.broken_symlinks.is_empty() {
            self.restore_symlinks()?;
        }

        if !report.invalid_entries.is_empty() {
            self.tracker()
                .edit(|entries| entries.remove_entries(&report.invalid_entries))?;
            for entry in &report.invalid_entries {
                if path::is_malformed(entry) {
                    continue;
                }

                if let Err(err) = self.vcs.rm(&self.layout.vcs_path(entry)) {
                    warn!("cannot unstage {entry:?}: {err}");
                }
            }
            self.vcs.add(&self.tracking_vcs_path())?;

            let count = report.invalid_entries.len();
            let noun = if count == 1 { "entry" } else { "entries" };
            let message = commit_message(format!("cleaned {count} invalid {noun}"));
            self.vcs.commit(&message)?;
            info!("{message}");
        }

        Ok(report)
    }
}
