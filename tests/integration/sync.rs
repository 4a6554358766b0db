// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{assert_relative_link, Sandbox};

use anyhow::Result;
use git2::Repository;
use lnk::{Git, SyncStatus, Vcs};
use pretty_assertions::assert_eq;
use std::{fs, path::Path};

fn sibling(sandbox: &Sandbox, name: &str) -> std::path::PathBuf {
    sandbox
        .home()
        .parent()
        .map(|root| root.join(name))
        .unwrap_or_else(|| sandbox.home().join(name))
}

#[test]
fn push_commits_pending_changes() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    let bashrc = sandbox.write(".bashrc", "bash")?;
    manager.add(&bashrc)?;

    let remote = sibling(&sandbox, "remote.git");
    Repository::init_bare(&remote)?;
    manager
        .vcs()
        .add_remote("origin", &remote.to_string_lossy())?;

    manager.push("lnk: sync configuration files")?;
    assert_eq!(
        manager.status()?,
        SyncStatus {
            ahead: 0,
            behind: 0,
            remote: Some("origin/main".into()),
            dirty: false,
        }
    );

    fs::write(&bashrc, "bash\nexport EDITOR=vi\n")?;
    assert!(manager.status()?.dirty);
    assert!(manager.diff(false)?.contains("+export EDITOR=vi"));

    manager.push("lnk: sync configuration files")?;
    assert_eq!(
        sandbox.commits()?,
        vec![
            "lnk: sync configuration files".to_string(),
            "lnk: added .bashrc".to_string()
        ]
    );
    assert!(!manager.status()?.dirty);
    Ok(())
}

#[test]
fn pull_restores_new_entries() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let upstream = sibling(&sandbox, "upstream");
    let git = Git::new(&upstream);
    git.init()?;
    fs::write(upstream.join(".bashrc"), "bash")?;
    fs::write(upstream.join(".lnk"), ".bashrc\n")?;
    git.add(Path::new(".bashrc"))?;
    git.add(Path::new(".lnk"))?;
    git.commit("lnk: added .bashrc")?;

    let manager = sandbox.manager();
    manager.init_with_remote(&upstream.to_string_lossy(), false)?;
    assert_eq!(manager.restore_symlinks()?, vec![".bashrc".to_string()]);

    fs::write(upstream.join(".vimrc"), "vim")?;
    fs::write(upstream.join(".lnk"), ".bashrc\n.vimrc\n")?;
    git.add(Path::new(".vimrc"))?;
    git.add(Path::new(".lnk"))?;
    git.commit("lnk: added .vimrc")?;

    let restored = manager.pull()?;

    assert_eq!(restored, vec![".vimrc".to_string()]);
    assert_relative_link(&sandbox.home().join(".vimrc"), &sandbox.repo().join(".vimrc"))?;
    assert_eq!(fs::read_to_string(sandbox.home().join(".vimrc"))?, "vim");
    Ok(())
}
