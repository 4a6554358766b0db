// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tracking file handling.
//!
//! Every profile lists the paths it manages in a __tracking file__ at the
//! top-level of the repository. The tracking file is the single source of
//! truth for which entries are managed. Storage content alone does not make
//! an entry managed.
//!
//! # Tracking File Layout
//!
//! The tracking file is plain UTF-8 text holding one home-relative path per
//! line. Lines are LF terminated, sorted by byte value, and free of
//! duplicates. An empty file and a missing file both mean that nothing is
//! tracked.
//!
//! Reads are lenient: surrounding whitespace is trimmed, and blank lines are
//! skipped. Path syntax is not validated here. Writes always rewrite the
//! whole file in sorted order, so any duplicate lines left behind by a hand
//! edit disappear on the next write.
//!
//! There is no in-memory cache. Each operation re-reads the file, so the
//! file on disk stays the authority even if it gets edited between steps.

use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{metadata, read_to_string, Permissions},
    io::{ErrorKind, Write},
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::debug;

/// Mode of a freshly created tracking file.
const TRACKING_FILE_MODE: u32 = 0o644;

/// Manage entries of a tracking file.
///
/// Provides methods to read, and atomically rewrite the tracking file.
#[derive(Clone, Debug)]
pub struct Tracker {
    tracking_path: PathBuf,
}

impl Tracker {
    /// Construct new tracker for tracking file at target path.
    ///
    /// The tracking file does not need to exist yet.
    pub fn new(tracking_path: impl Into<PathBuf>) -> Self {
        Self {
            tracking_path: tracking_path.into(),
        }
    }

    /// Path to tracking file.
    pub fn path(&self) -> &Path {
        self.tracking_path.as_path()
    }

    /// Load current entry set.
    ///
    /// # Errors
    ///
    /// - Return [`TrackerError::Read`] if tracking file exists but cannot be
    ///   read.
    pub fn load(&self) -> Result<BTreeSet<String>> {
        Ok(self.read()?.entries)
    }

    /// Check if entry is tracked.
    ///
    /// # Errors
    ///
    /// - Return [`TrackerError::Read`] if tracking file cannot be read.
    pub fn contains(&self, rel: impl AsRef<str>) -> Result<bool> {
        Ok(self.load()?.contains(rel.as_ref()))
    }

    /// Track an entry.
    ///
    /// Tracking an entry twice is a no-op.
    ///
    /// # Errors
    ///
    /// - Return [`TrackerError::Read`] if tracking file cannot be read.
    /// - Return [`TrackerError::Write`] if tracking file cannot be written.
    pub fn add(&self, rel: impl Into<String>) -> Result<()> {
        self.edit(|entries| entries.insert_entry(rel))
    }

    /// Stop tracking an entry.
    ///
    /// # Errors
    ///
    /// - Return [`TrackerError::Read`] if tracking file cannot be read.
    /// - Return [`TrackerError::Write`] if tracking file cannot be written.
    pub fn remove(&self, rel: impl AsRef<str>) -> Result<()> {
        self.edit(|entries| entries.remove_entry(rel))
    }

    /// Replace entire entry set.
    ///
    /// # Errors
    ///
    /// - Return [`TrackerError::Write`] if tracking file cannot be written.
    pub fn overwrite(&self, entries: impl IntoIterator<Item = impl Into<String>>) -> Result<()> {
        let mut edit = TrackEdit::new();
        edit.insert_entries(entries);
        self.write(&edit)
    }

    /// Edit tracked entries.
    ///
    /// Read current entry set into [`TrackEdit`] instance, and directly edit
    /// each entry before writing the results back into the tracking file.
    /// Nothing is written if the editor did not change anything, unless the
    /// file on disk is not in canonical form.
    ///
    /// # Errors
    ///
    /// - Return [`TrackerError::Read`] if tracking file cannot be read.
    /// - Return [`TrackerError::Write`] if tracking file cannot be written.
    pub fn edit<E>(&self, editor: E) -> Result<()>
    where
        E: FnOnce(&mut TrackEdit),
    {
        let mut entries = self.read()?;
        editor(&mut entries);

        if !entries.changed {
            return Ok(());
        }

        self.write(&entries)
    }

    fn read(&self) -> Result<TrackEdit> {
        match read_to_string(&self.tracking_path) {
            Ok(content) => Ok(TrackEdit::from(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(TrackEdit::new()),
            Err(err) => Err(TrackerError::Read {
                source: err,
                tracking_path: self.tracking_path.clone(),
            }),
        }
    }

    fn write(&self, entries: &TrackEdit) -> Result<()> {
        let write_err = |source| TrackerError::Write {
            source,
            tracking_path: self.tracking_path.clone(),
        };

        // INVARIANT: Temporary file must be a sibling so the rename stays on
        // one filesystem.
        let parent = self
            .tracking_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;

        // INVARIANT: Rewrites keep the mode of the tracking file, which is
        // 0644 when it is new.
        let permissions = match metadata(&self.tracking_path) {
            Ok(existing) => existing.permissions(),
            Err(_) => Permissions::from_mode(TRACKING_FILE_MODE),
        };
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(write_err)?;
        tmp.write_all(entries.to_string().as_bytes())
            .map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.tracking_path)
            .map_err(|err| write_err(err.error))?;

        debug!(
            "wrote {} entries to {:?}",
            entries.len(),
            self.tracking_path.display()
        );

        Ok(())
    }
}

/// Tracked entry editor.
///
/// # Invariant
///
/// - No duplicate entries.
/// - Entries render in byte order, one per line, with a trailing newline.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrackEdit {
    entries: BTreeSet<String>,
    changed: bool,
}

impl TrackEdit {
    /// Construct new empty entry editor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry.
    pub fn insert_entry(&mut self, entry: impl Into<String>) {
        if self.entries.insert(entry.into()) {
            self.changed = true;
        }
    }

    /// Insert a listing of entries.
    pub fn insert_entries(&mut self, entries: impl IntoIterator<Item = impl Into<String>>) {
        for entry in entries {
            self.insert_entry(entry);
        }
    }

    /// Remove an entry.
    pub fn remove_entry(&mut self, entry: impl AsRef<str>) {
        if self.entries.remove(entry.as_ref()) {
            self.changed = true;
        }
    }

    /// Remove a listing of entries.
    pub fn remove_entries(&mut self, entries: impl IntoIterator<Item = impl AsRef<str>>) {
        for entry in entries {
            self.remove_entry(entry);
        }
    }

    /// Check if entry is present.
    pub fn contains(&self, entry: impl AsRef<str>) -> bool {
        self.entries.contains(entry.as_ref())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Display for TrackEdit {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        for entry in &self.entries {
            fmt.write_str(entry)?;
            fmt.write_str("\n")?;
        }

        Ok(())
    }
}

impl From<String> for TrackEdit {
    fn from(content: String) -> Self {
        Self::from(content.as_str())
    }
}

impl From<&str> for TrackEdit {
    fn from(content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect::<BTreeSet<_>>();

        // INVARIANT: Content not in canonical form counts as a change, so
        // the next edit rewrites it sorted and deduplicated.
        let mut edit = Self {
            entries,
            changed: false,
        };
        edit.changed = edit.to_string() != content;
        edit
    }
}

/// Tracking file error types.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Tracking file cannot be read from.
    #[error("failed to read from tracking file at {:?}", tracking_path.display())]
    Read {
        #[source]
        source: std::io::Error,
        tracking_path: PathBuf,
    },

    /// Tracking file cannot be written to.
    #[error("failed to write to tracking file at {:?}", tracking_path.display())]
    Write {
        #[source]
        source: std::io::Error,
        tracking_path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = TrackerError> = std::result::Result<T, E>;
