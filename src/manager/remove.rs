// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use super::{
    absolutize, commit_message,
    rollback::{Rollback, Undo},
    Manager, ManagerError, Result,
};
use crate::{
    fs::{self as lnk_fs, FileKind},
    path,
    vcs::Vcs,
};

use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

impl<V> Manager<V>
where
    V: Vcs,
{
    /// Stop managing path, and put its content back in place of the symlink.
    ///
    /// Everything up to the commit is rolled back on failure. Moving the
    /// content back happens after the commit, so a failure there leaves the
    /// removal committed and the content sitting in storage.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::NotInitialized`] if repository does not exist.
    /// - Return [`ManagerError::Fs`] if path is not a symlink into the
    ///   repository.
    /// - Return [`ManagerError::NotManaged`] if path is not tracked.
    /// - Return [`ManagerError::Vcs`] if unstaging or committing fails.
    #[instrument(skip(self), level = "debug")]
    pub fn remove(&self, path: impl AsRef<Path> + std::fmt::Debug) -> Result<()> {
        self.ensure_initialized()?;
        let link = absolutize(path)?;
        let target = lnk_fs::validate_symlink_for_remove(&link, self.repo_root())?;
        let entry = self.entry_of(&link)?;

        let tracker = self.tracker();
        if !tracker.contains(&entry)? {
            return Err(ManagerError::NotManaged { path: link });
        }
        let info = lnk_fs::stat(&target)?;

        let mut rollback = Rollback::new();
        let message = commit_message(format!("removed {}", path::basename(&entry)));
        if let Err(err) = self.unmanage(&link, &target, &entry, &message, &mut rollback) {
            rollback.run(&tracker, &self.vcs);
            return Err(err);
        }
        rollback.discard();

        lnk_fs::move_path(&target, &link, &info)?;
        info!("{message}");

        Ok(())
    }

    /// Stop managing path whose symlink the user already deleted.
    ///
    /// Stored content gets deleted instead of being moved back. Nothing is
    /// rolled back on failure, since the state is already inconsistent.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::NotInitialized`] if repository does not exist.
    /// - Return [`ManagerError::NotManaged`] if path is not tracked.
    /// - Return [`ManagerError::Vcs`] if committing fails.
    #[instrument(skip(self), level = "debug")]
    pub fn remove_force(&self, path: impl AsRef<Path> + std::fmt::Debug) -> Result<()> {
        self.ensure_initialized()?;
        let link = absolutize(path)?;
        let entry = self.entry_of(&link)?;

        let tracker = self.tracker();
        if !tracker.contains(&entry)? {
            return Err(ManagerError::NotManaged { path: link });
        }

        // INVARIANT: Only ever delete a symlink at the home location, never
        // content the user put back in its place.
        match lnk_fs::stat(&link) {
            Ok(info) if info.kind == FileKind::Symlink => {
                if let Err(err) = lnk_fs::remove_any(&link) {
                    warn!("cannot remove symlink: {err}");
                }
            }
            Ok(_) => warn!("keep {:?}, it is not a symlink", link.display()),
            Err(_) => {}
        }

        tracker.remove(&entry)?;
        if let Err(err) = self.vcs.rm(&self.layout.vcs_path(&entry)) {
            warn!("cannot unstage {entry:?}: {err}");
        }
        self.vcs.add(&self.tracking_vcs_path())?;
        let message = commit_message(format!("force removed {}", path::basename(&entry)));
        self.vcs.commit(&message)?;

        let stored = self.layout.storage_path(&entry);
        if lnk_fs::exists(&stored) {
            lnk_fs::remove_any(&stored)?;
        }
        info!("{message}");

        Ok(())
    }

    fn unmanage(
        &self,
        link: &Path,
        target: &Path,
        entry: &str,
        message: &str,
        rollback: &mut Rollback,
    ) -> Result<()> {
        lnk_fs::remove_any(link)?;
        rollback.push(Undo::Relink {
            target: target.to_path_buf(),
            link: link.to_path_buf(),
        });

        self.tracker().remove(entry)?;
        rollback.push(Undo::Retrack {
            entry: entry.into(),
        });

        let staged: PathBuf = self.layout.vcs_path(entry);
        rollback.push(Undo::Unstage {
            path: staged.clone(),
        });
        self.vcs.rm(&staged)?;

        let tracking = self.tracking_vcs_path();
        rollback.push(Undo::Unstage {
            path: tracking.clone(),
        });
        self.vcs.add(&tracking)?;
        self.vcs.commit(message)?;

        Ok(())
    }
}
