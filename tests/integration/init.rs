// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{assert_relative_link, Sandbox};

use anyhow::Result;
use lnk::{ErrorKind, Git, Profile, Vcs};
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{fs, path::Path};

/// Create a repository with one managed file to clone from.
fn upstream(sandbox: &Sandbox) -> Result<String> {
    let path = sandbox
        .home()
        .parent()
        .map(|root| root.join("upstream"))
        .unwrap_or_else(|| sandbox.home().join("upstream"));
    let git = Git::new(&path);
    git.init()?;
    fs::write(path.join(".bashrc"), "remote bash")?;
    fs::write(path.join(".lnk"), ".bashrc\n")?;
    git.add(Path::new(".bashrc"))?;
    git.add(Path::new(".lnk"))?;
    git.commit("lnk: added .bashrc")?;

    Ok(path.to_string_lossy().into_owned())
}

#[test]
fn init_is_idempotent() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;

    manager.init()?;

    assert!(sandbox.repo().join(".git").is_dir());
    assert!(sandbox.commits()?.is_empty());
    Ok(())
}

fn init_twice() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.manager();

    manager.init()?;
    manager.init()?;

    assert!(manager.vcs().is_managed_repository());
    assert_eq!(manager.vcs().current_branch()?, "main");
    assert!(sandbox.commits()?.is_empty());
    Ok(())
}

#[sealed_test(env = [
    ("HOME", "/nonexistent/lnk-home"),
    ("XDG_CONFIG_HOME", "/nonexistent/lnk-config"),
    ("GIT_CONFIG_NOSYSTEM", "1")
])]
fn init_is_idempotent_without_global_git_config() {
    if let Err(error) = init_twice() {
        panic!("{error:?}");
    }
}

#[test]
fn init_refuses_foreign_repository() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let git = Git::new(sandbox.repo());
    git.init()?;
    fs::write(sandbox.repo().join("README"), "mine")?;
    git.add(Path::new("README"))?;
    git.commit("initial commit")?;

    let result = sandbox.manager().init();

    assert_eq!(
        result.map_err(|err| err.kind()),
        Err(ErrorKind::ExistingForeignRepo)
    );
    assert_eq!(sandbox.commits()?, vec!["initial commit".to_string()]);
    Ok(())
}

#[test]
fn init_accepts_repository_with_tracking_file() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let git = Git::new(sandbox.repo());
    git.init()?;
    fs::write(sandbox.repo().join(".lnk.work"), "")?;
    git.add(Path::new(".lnk.work"))?;
    git.commit("initial commit")?;

    sandbox.manager().init()?;

    assert_eq!(
        sandbox.manager().list_profiles()?,
        vec![Profile::host("work")?]
    );
    Ok(())
}

#[test]
fn list_profiles_orders_common_first() -> Result<()> {
    let sandbox = Sandbox::new()?;
    sandbox.init()?;
    for name in [".lnk.zeta", ".lnk", ".lnk.alpha"] {
        fs::write(sandbox.repo().join(name), "")?;
    }

    let profiles = sandbox.manager().list_profiles()?;

    assert_eq!(
        profiles,
        vec![
            Profile::common(),
            Profile::host("alpha")?,
            Profile::host("zeta")?
        ]
    );
    Ok(())
}

#[test]
fn init_with_remote_clones_repository() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let url = upstream(&sandbox)?;
    let manager = sandbox.manager();

    manager.init_with_remote(&url, false)?;

    assert_eq!(manager.list()?, vec![".bashrc".to_string()]);
    assert_eq!(manager.restore_symlinks()?, vec![".bashrc".to_string()]);
    assert_relative_link(&sandbox.home().join(".bashrc"), &sandbox.repo().join(".bashrc"))?;
    assert_eq!(
        fs::read_to_string(sandbox.home().join(".bashrc"))?,
        "remote bash"
    );
    Ok(())
}

#[test]
fn init_with_remote_protects_managed_files() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let url = upstream(&sandbox)?;
    let manager = sandbox.init()?;
    manager.add(sandbox.write(".vimrc", "vim")?)?;

    let result = manager.init_with_remote(&url, false);

    assert_eq!(
        result.map_err(|err| err.kind()),
        Err(ErrorKind::ManagedFilesExist)
    );
    assert_eq!(manager.list()?, vec![".vimrc".to_string()]);

    manager.init_with_remote(&url, true)?;
    assert_eq!(manager.list()?, vec![".bashrc".to_string()]);
    Ok(())
}

#[test]
fn init_with_remote_attaches_remote_to_empty_repository() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let url = upstream(&sandbox)?;
    let manager = sandbox.init()?;

    manager.init_with_remote(&url, false)?;

    let repo = git2::Repository::open(sandbox.repo())?;
    let remote = repo.find_remote("origin")?;
    assert_eq!(remote.url(), Some(url.as_str()));
    Ok(())
}

#[test]
fn operations_require_repository() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.manager();

    assert_eq!(
        manager.list().map_err(|err| err.kind()),
        Err(ErrorKind::NotInitialized)
    );
    assert_eq!(
        manager.status().map_err(|err| err.kind()),
        Err(ErrorKind::NotInitialized)
    );
    assert_eq!(
        manager.doctor_preview().map_err(|err| err.kind()),
        Err(ErrorKind::NotInitialized)
    );
    assert_eq!(
        manager.push("lnk: sync").map_err(|err| err.kind()),
        Err(ErrorKind::NotInitialized)
    );
    Ok(())
}
