// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bring paths under management.
//!
//! Adding runs in three phases. First every input is validated without
//! touching anything. Then each input is moved into storage, symlinked
//! back, and tracked. Finally everything is staged and committed as one
//! unit. Any failure after validation unwinds the rollback stack, leaving
//! home, storage, tracking, and the index as they were.

use super::{
    absolutize, commit_message,
    rollback::{Rollback, Undo},
    Manager, ManagerError, Result,
};
use crate::{
    fs::{self as lnk_fs, FileInfo, FileKind, FsError},
    path,
    vcs::Vcs,
};

use ignore::WalkBuilder;
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Progress callback receiving current index, total count, and basename.
pub type Progress<'a> = &'a mut dyn FnMut(usize, usize, &str);

/// Recursive adds beyond this many files report progress, and summarize the
/// commit message.
pub const PROGRESS_THRESHOLD: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    source: PathBuf,
    entry: String,
    info: FileInfo,
}

/// Input to validation.
#[derive(Debug, Clone)]
struct Input {
    path: PathBuf,

    // INVARIANT: Walked inputs came out of directory expansion, and may be
    // symlinks themselves.
    walked: bool,
}

impl<V> Manager<V>
where
    V: Vcs,
{
    /// Bring single path under management.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::NotInitialized`] if repository does not exist.
    /// - Return [`ManagerError::AlreadyManaged`] if path is already tracked.
    /// - Return [`ManagerError::Fs`] if path is missing, inaccessible, or of
    ///   unsupported type.
    /// - Return [`ManagerError::Failed`] if moving, linking, tracking, or
    ///   committing fails. Every side effect is rolled back.
    #[instrument(skip(self), level = "debug")]
    pub fn add(&self, path: impl AsRef<Path> + std::fmt::Debug) -> Result<()> {
        let inputs = vec![Input {
            path: path.as_ref().to_path_buf(),
            walked: false,
        }];
        self.add_inputs(inputs, None, false)
    }

    /// Bring every path under management as one atomic unit.
    ///
    /// Either all paths end up managed in one commit, or none of them do.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::EmptyInput`] if no paths are given.
    /// - Return any error of [`Manager::add`] for the first offending path.
    pub fn add_multiple<P>(&self, paths: &[P], progress: Option<Progress<'_>>) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let inputs = paths
            .iter()
            .map(|path| Input {
                path: path.as_ref().to_path_buf(),
                walked: false,
            })
            .collect();
        self.add_inputs(inputs, progress, false)
    }

    /// Bring every file below given paths under management.
    ///
    /// Directories are expanded into the files and symlinks they contain.
    /// Symlinks that already point into the repository are skipped, so
    /// re-adding a partially managed directory only picks up the new files.
    ///
    /// # Errors
    ///
    /// - Return [`ManagerError::EmptyInput`] if expansion yields no files.
    /// - Return [`ManagerError::Walk`] if a directory cannot be walked.
    /// - Return any error of [`Manager::add_multiple`].
    pub fn add_recursive<P>(&self, paths: &[P], progress: Option<Progress<'_>>) -> Result<()>
    where
        P: AsRef<Path>,
    {
        self.ensure_initialized()?;
        let inputs = self.expand(paths)?;
        if inputs.len() > PROGRESS_THRESHOLD {
            self.add_inputs(inputs, progress, true)
        } else {
            self.add_inputs(inputs, None, false)
        }
    }

    /// Report which paths an add would bring under management.
    ///
    /// Runs validation only. Nothing on disk or in the repository changes.
    ///
    /// # Errors
    ///
    /// - Return any validation error that the add itself would return.
    pub fn preview_add<P>(&self, paths: &[P], recursive: bool) -> Result<Vec<PathBuf>>
    where
        P: AsRef<Path>,
    {
        self.ensure_initialized()?;
        let inputs = if recursive {
            self.expand(paths)?
        } else {
            paths
                .iter()
                .map(|path| Input {
                    path: path.as_ref().to_path_buf(),
                    walked: false,
                })
                .collect()
        };

        if inputs.is_empty() {
            return Err(ManagerError::EmptyInput);
        }

        Ok(self
            .validate(&inputs)?
            .into_iter()
            .map(|candidate| candidate.source)
            .collect())
    }

    fn add_inputs(
        &self,
        inputs: Vec<Input>,
        progress: Option<Progress<'_>>,
        summarize: bool,
    ) -> Result<()> {
        self.ensure_initialized()?;
        if inputs.is_empty() {
            return Err(ManagerError::EmptyInput);
        }

        let candidates = self.validate(&inputs)?;
        let message = match candidates.as_slice() {
            [single] if !summarize => {
                commit_message(format!("added {}", path::basename(&single.source)))
            }
            _ if summarize => {
                commit_message(format!("added {} files recursively", candidates.len()))
            }
            _ => commit_message(format!("added {} files", candidates.len())),
        };

        let tracker = self.tracker();
        let mut rollback = Rollback::new();
        let result = self
            .apply(&candidates, &mut rollback, progress)
            .and_then(|_| self.stage_and_commit(&candidates, &mut rollback, &message));

        match result {
            Ok(_) => {
                rollback.discard();
                info!("{message}");
                Ok(())
            }
            Err(err) => {
                rollback.run(&tracker, &self.vcs);
                Err(err)
            }
        }
    }

    /// Validate every input without side effects.
    fn validate(&self, inputs: &[Input]) -> Result<Vec<Candidate>> {
        let tracked = self.tracker().load()?;
        let repo_root = self.repo_root();
        let mut seen = BTreeSet::new();
        let mut candidates = Vec::with_capacity(inputs.len());

        for input in inputs {
            let source = absolutize(&input.path)?;

            // INVARIANT: Tracked paths are reported as managed before their
            // symlink gets rejected as an unsupported type.
            let entry = self.entry_of(&source)?;
            if tracked.contains(&entry) || !seen.insert(entry.clone()) {
                return Err(ManagerError::AlreadyManaged { path: source });
            }

            let info = if input.walked {
                lnk_fs::stat(&source)?
            } else {
                lnk_fs::validate_for_add(&source)?
            };

            if source == self.home_dir {
                return Err(unsupported(&source, "home directory"));
            }

            if source.starts_with(repo_root) || repo_root.starts_with(&source) {
                return Err(unsupported(&source, "path overlapping the repository"));
            }

            // INVARIANT: Never clobber content already sitting in storage.
            if lnk_fs::exists(self.layout.storage_path(&entry)) {
                debug!("storage already holds {entry:?}");
                return Err(ManagerError::AlreadyManaged { path: source });
            }

            candidates.push(Candidate {
                source,
                entry,
                info,
            });
        }

        Ok(candidates)
    }

    /// Move, link, and track each candidate, recording how to undo it.
    fn apply(
        &self,
        candidates: &[Candidate],
        rollback: &mut Rollback,
        mut progress: Option<Progress<'_>>,
    ) -> Result<()> {
        let tracker = self.tracker();
        let total = candidates.len();

        for (index, candidate) in candidates.iter().enumerate() {
            if let Some(report) = progress.as_mut() {
                report(index + 1, total, &path::basename(&candidate.source));
            }

            let failed = |source: ManagerError| ManagerError::Failed {
                source: Box::new(source),
                path: candidate.source.clone(),
            };

            let dest = self.layout.storage_path(&candidate.entry);
            if let Some(parent) = dest.parent() {
                if let Some(top) = lnk_fs::ensure_dir(parent).map_err(|err| failed(err.into()))? {
                    rollback.push(Undo::RemoveEmptyDirs {
                        top,
                        deepest: parent.to_path_buf(),
                    });
                }
            }

            lnk_fs::move_path(&candidate.source, &dest, &candidate.info)
                .map_err(|err| failed(err.into()))?;
            rollback.push(Undo::MoveBack {
                from: dest.clone(),
                to: candidate.source.clone(),
                info: candidate.info.clone(),
            });

            lnk_fs::create_relative_symlink(&dest, &candidate.source)
                .map_err(|err| failed(err.into()))?;
            rollback.push(Undo::RemoveLink {
                link: candidate.source.clone(),
            });

            tracker
                .add(candidate.entry.as_str())
                .map_err(|err| failed(err.into()))?;
            rollback.push(Undo::Untrack {
                entry: candidate.entry.clone(),
            });
        }

        Ok(())
    }

    fn stage_and_commit(
        &self,
        candidates: &[Candidate],
        rollback: &mut Rollback,
        message: &str,
    ) -> Result<()> {
        for candidate in candidates {
            let staged = self.layout.vcs_path(&candidate.entry);
            rollback.push(Undo::Unstage {
                path: staged.clone(),
            });
            self.vcs.add(&staged).map_err(|err| ManagerError::Failed {
                source: Box::new(err.into()),
                path: candidate.source.clone(),
            })?;
        }

        let tracking = self.tracking_vcs_path();
        rollback.push(Undo::Unstage {
            path: tracking.clone(),
        });
        self.vcs.add(&tracking)?;
        self.vcs.commit(message)?;

        Ok(())
    }

    /// Expand directories into the files and symlinks below them.
    fn expand<P>(&self, paths: &[P]) -> Result<Vec<Input>>
    where
        P: AsRef<Path>,
    {
        let mut seen = BTreeSet::new();
        let mut inputs = Vec::new();

        for path in paths {
            let root = absolutize(path)?;
            let info = lnk_fs::validate_for_add(&root)?;
            if info.kind != FileKind::Directory {
                if seen.insert(root.clone()) {
                    inputs.push(Input {
                        path: root,
                        walked: false,
                    });
                }
                continue;
            }

            let repo_root = self.repo_root().to_path_buf();
            let walker = WalkBuilder::new(&root)
                .standard_filters(false)
                .follow_links(false)
                .sort_by_file_name(|a, b| a.cmp(b))
                .filter_entry(move |entry| !entry.path().starts_with(&repo_root))
                .build();

            for entry in walker {
                let entry = entry.map_err(|source| ManagerError::Walk {
                    source,
                    path: root.clone(),
                })?;
                let Some(file_type) = entry.file_type() else {
                    continue;
                };
                if !(file_type.is_file() || file_type.is_symlink()) {
                    continue;
                }

                let path = entry.into_path();
                if file_type.is_symlink()
                    && lnk_fs::validate_symlink_for_remove(&path, self.repo_root()).is_ok()
                {
                    debug!("skip already managed {:?}", path.display());
                    continue;
                }

                if seen.insert(path.clone()) {
                    inputs.push(Input { path, walked: true });
                }
            }
        }

        if inputs.is_empty() {
            return Err(ManagerError::EmptyInput);
        }

        Ok(inputs)
    }
}

fn unsupported(path: &Path, kind: &'static str) -> ManagerError {
    ManagerError::Fs(FsError::UnsupportedType {
        path: path.to_path_buf(),
        kind,
    })
}
