// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use super::{Manager, Result};
use crate::{fs as lnk_fs, path, vcs::Vcs};

use tracing::{debug, info, instrument, warn};

impl<V> Manager<V>
where
    V: Vcs,
{
    /// Re-create missing or wrong symlinks of every tracked entry.
    ///
    /// Entries whose content is absent from storage are skipped, and so are
    /// entries that would escape home. Anything occupying a link location
    /// that does not point at stored content gets replaced.
    ///
    /// Returns the entries whose symlinks were created.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::NotInitialized`](super::ManagerError::NotInitialized)
    ///   if repository does not exist.
    /// - Return [`ManagerError::Fs`](super::ManagerError::Fs) if a symlink
    ///   cannot be created.
    #[instrument(skip(self), level = "debug")]
    pub fn restore_symlinks(&self) -> Result<Vec<String>> {
        self.ensure_initialized()?;
        let mut restored = Vec::new();

        for entry in self.tracker().load()? {
            if path::is_malformed(&entry) {
                warn!("skip malformed entry {entry:?}");
                continue;
            }

            let stored = self.layout.storage_path(&entry);
            if !lnk_fs::exists(&stored) {
                debug!("skip {entry:?}, nothing stored");
                continue;
            }

            let link = self.home_dir.join(&entry);
            if lnk_fs::points_to(&link, &stored) {
                continue;
            }

            if let Some(parent) = link.parent() {
                lnk_fs::ensure_dir(parent)?;
            }
            if lnk_fs::exists(&link) {
                warn!("replace {:?}", link.display());
                lnk_fs::remove_any(&link)?;
            }
            lnk_fs::create_relative_symlink(&stored, &link)?;
            info!("restored {entry}");
            restored.push(entry);
        }

        Ok(restored)
    }
}
