// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{assert_relative_link, Sandbox};

use anyhow::Result;
use git2::Repository;
use lnk::ErrorKind;
use pretty_assertions::assert_eq;
use std::{fs, path::PathBuf};

#[test]
fn add_single_file() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    let bashrc = sandbox.write(".bashrc", "X")?;

    manager.add(&bashrc)?;

    assert_relative_link(&bashrc, &sandbox.repo().join(".bashrc"))?;
    assert_eq!(fs::read_to_string(sandbox.repo().join(".bashrc"))?, "X");
    assert_eq!(sandbox.tracking(".lnk")?, ".bashrc\n");
    assert_eq!(sandbox.commits()?, vec!["lnk: added .bashrc".to_string()]);
    assert_eq!(manager.list()?, vec![".bashrc".to_string()]);
    Ok(())
}

#[test]
fn add_directory_as_single_entry() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    sandbox.write(".vim/vimrc", "set nu")?;
    sandbox.write(".vim/colors/dark.vim", "hi Normal")?;

    manager.add(sandbox.home().join(".vim"))?;

    assert_relative_link(&sandbox.home().join(".vim"), &sandbox.repo().join(".vim"))?;
    assert_eq!(
        fs::read_to_string(sandbox.home().join(".vim/colors/dark.vim"))?,
        "hi Normal"
    );
    assert_eq!(sandbox.tracking(".lnk")?, ".vim\n");
    assert_eq!(sandbox.commits()?, vec!["lnk: added .vim".to_string()]);
    Ok(())
}

#[test]
fn add_multiple_is_atomic_on_conflict() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    let a = sandbox.write("a", "a")?;
    let b = sandbox.write("b", "b")?;
    let c = sandbox.write("c", "c")?;
    manager.add(&b)?;

    let result = manager.add_multiple(&[&a, &b, &c], None);

    assert_eq!(result.map_err(|err| err.kind()), Err(ErrorKind::AlreadyManaged));
    assert_eq!(fs::read_to_string(&a)?, "a");
    assert_eq!(fs::read_to_string(&c)?, "c");
    assert!(!fs::symlink_metadata(&a)?.file_type().is_symlink());
    assert!(!fs::symlink_metadata(&c)?.file_type().is_symlink());
    assert_eq!(sandbox.commits()?, vec!["lnk: added b".to_string()]);
    Ok(())
}

#[test]
fn add_multiple_rolls_back_on_commit_failure() -> Result<()> {
    let sandbox = Sandbox::new()?;
    sandbox.init()?;
    let manager = sandbox.failing_manager();
    let a = sandbox.write("a", "a")?;
    let b = sandbox.write("nested/deeper/b", "b")?;
    manager.vcs().fail_commits();

    let result = manager.add_multiple(&[&a, &b], None);

    assert_eq!(result.map_err(|err| err.kind()), Err(ErrorKind::Vcs));
    assert_eq!(fs::read_to_string(&a)?, "a");
    assert_eq!(fs::read_to_string(&b)?, "b");
    assert!(!fs::symlink_metadata(&a)?.file_type().is_symlink());
    assert!(!fs::symlink_metadata(&b)?.file_type().is_symlink());
    assert!(!sandbox.repo().join("a").exists());
    assert!(!sandbox.repo().join("nested").exists());
    assert!(manager.list()?.is_empty());
    assert!(Repository::open(sandbox.repo())?.index()?.is_empty());
    assert!(sandbox.commits()?.is_empty());
    Ok(())
}

#[test]
fn add_multiple_rolls_back_when_later_move_fails() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    let bashrc = sandbox.write(".bashrc", "X")?;
    let b = sandbox.write("sub/b", "b")?;

    // Storage parent of the second path is a file, so its move cannot happen.
    fs::write(sandbox.repo().join("sub"), "blocker")?;

    let result = manager.add_multiple(&[&bashrc, &b], None);

    assert_eq!(result.map_err(|err| err.kind()), Err(ErrorKind::Io));
    assert!(fs::symlink_metadata(&bashrc)?.is_file());
    assert_eq!(fs::read_to_string(&bashrc)?, "X");
    assert_eq!(fs::read_to_string(&b)?, "b");
    assert!(!sandbox.repo().join(".bashrc").exists());
    assert_eq!(fs::read_to_string(sandbox.repo().join("sub"))?, "blocker");
    assert!(manager.list()?.is_empty());
    assert!(sandbox.commits()?.is_empty());
    Ok(())
}

#[test]
fn add_ignored_file_commits_its_content() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    fs::write(sandbox.repo().join(".gitignore"), "*.local\n")?;
    let local = sandbox.write(".bashrc.local", "local")?;

    manager.add(&local)?;

    let repo = Repository::open(sandbox.repo())?;
    let tree = repo.head()?.peel_to_tree()?;
    assert!(tree.get_path(std::path::Path::new(".bashrc.local")).is_ok());
    assert!(tree.get_path(std::path::Path::new(".lnk")).is_ok());
    assert_eq!(
        sandbox.commits()?,
        vec!["lnk: added .bashrc.local".to_string()]
    );
    Ok(())
}

#[test]
fn add_multiple_commits_once() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    let paths = vec![
        sandbox.write(".bashrc", "bash")?,
        sandbox.write(".config/git/config", "git")?,
    ];
    let mut seen = Vec::new();
    let mut report = |current: usize, total: usize, name: &str| {
        seen.push((current, total, name.to_string()));
    };

    manager.add_multiple(&paths, Some(&mut report))?;

    assert_eq!(
        seen,
        vec![(1, 2, ".bashrc".to_string()), (2, 2, "config".to_string())]
    );
    assert_eq!(sandbox.commits()?, vec!["lnk: added 2 files".to_string()]);
    assert_eq!(sandbox.tracking(".lnk")?, ".bashrc\n.config/git/config\n");
    Ok(())
}

#[test]
fn add_recursive_reports_progress_past_threshold() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    let mut files = Vec::new();
    for index in 0..15 {
        files.push(sandbox.write(format!("dots/file{index:02}"), "x")?);
    }
    let mut seen = Vec::new();
    let mut report = |current: usize, total: usize, _: &str| seen.push((current, total));

    manager.add_recursive(&[sandbox.home().join("dots")], Some(&mut report))?;

    assert_eq!(seen, (1..=15).map(|current| (current, 15)).collect::<Vec<_>>());
    assert_eq!(
        sandbox.commits()?,
        vec!["lnk: added 15 files recursively".to_string()]
    );
    for file in &files {
        let rel = file.strip_prefix(sandbox.home())?;
        assert_relative_link(file, &sandbox.repo().join(rel))?;
    }
    Ok(())
}

#[test]
fn add_recursive_below_threshold() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    sandbox.write("dots/a", "a")?;
    sandbox.write("dots/sub/b", "b")?;
    let mut calls = 0;
    let mut report = |_: usize, _: usize, _: &str| calls += 1;

    manager.add_recursive(&[sandbox.home().join("dots")], Some(&mut report))?;

    assert_eq!(calls, 0);
    assert_eq!(sandbox.commits()?, vec!["lnk: added 2 files".to_string()]);
    assert_eq!(sandbox.tracking(".lnk")?, "dots/a\ndots/sub/b\n");
    assert!(fs::symlink_metadata(sandbox.home().join("dots"))?.is_dir());
    Ok(())
}

#[test]
fn add_recursive_skips_managed_symlinks() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    let a = sandbox.write("dots/a", "a")?;
    sandbox.write("dots/b", "b")?;
    manager.add(&a)?;

    manager.add_recursive(&[sandbox.home().join("dots")], None)?;

    assert_eq!(
        sandbox.commits()?,
        vec!["lnk: added b".to_string(), "lnk: added a".to_string()]
    );
    assert_eq!(sandbox.tracking(".lnk")?, "dots/a\ndots/b\n");
    Ok(())
}

#[test]
fn add_recursive_empty_directory() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    fs::create_dir_all(sandbox.home().join("empty/nested"))?;

    let result = manager.add_recursive(&[sandbox.home().join("empty")], None);

    assert_eq!(result.map_err(|err| err.kind()), Err(ErrorKind::EmptyInput));
    assert!(sandbox.commits()?.is_empty());
    Ok(())
}

#[test]
fn preview_add_changes_nothing() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    sandbox.write("dots/a", "a")?;
    sandbox.write("dots/b", "b")?;

    let result = manager.preview_add(&[sandbox.home().join("dots")], true)?;

    assert_eq!(
        result,
        vec![sandbox.home().join("dots/a"), sandbox.home().join("dots/b")]
    );
    assert!(!fs::symlink_metadata(sandbox.home().join("dots/a"))?.is_symlink());
    assert!(manager.list()?.is_empty());
    assert!(sandbox.commits()?.is_empty());
    Ok(())
}

#[test]
fn host_profile_is_isolated() -> Result<()> {
    let sandbox = Sandbox::new()?;
    sandbox.init()?;
    let manager = sandbox.host_manager("work")?;
    let gitconfig = sandbox.write(".gitconfig", "Y")?;

    manager.add(&gitconfig)?;

    let stored = sandbox.repo().join("work.lnk/.gitconfig");
    assert_eq!(fs::read_to_string(&stored)?, "Y");
    assert_relative_link(&gitconfig, &stored)?;
    assert_eq!(sandbox.tracking(".lnk.work")?, ".gitconfig\n");
    assert!(!sandbox.repo().join(".lnk").exists());
    assert!(sandbox.manager().list()?.is_empty());
    Ok(())
}

#[test]
fn same_basename_in_different_directories() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    let first = sandbox.write(".config/alacritty/config", "first")?;
    let second = sandbox.write(".config/kitty/config", "second")?;

    manager.add_multiple(&[&first, &second], None)?;

    assert_eq!(
        fs::read_to_string(sandbox.repo().join(".config/alacritty/config"))?,
        "first"
    );
    assert_eq!(
        fs::read_to_string(sandbox.repo().join(".config/kitty/config"))?,
        "second"
    );
    assert_eq!(fs::read_to_string(&first)?, "first");
    assert_eq!(fs::read_to_string(&second)?, "second");
    Ok(())
}

#[test]
fn add_path_outside_home() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    let outside = sandbox
        .home()
        .parent()
        .map(|root| root.join("etc/foo"))
        .unwrap_or_else(|| PathBuf::from("/nowhere"));
    fs::create_dir_all(outside.parent().unwrap_or(sandbox.home()))?;
    fs::write(&outside, "foo")?;

    manager.add(&outside)?;

    let entry = outside.strip_prefix("/")?;
    assert_eq!(manager.list()?, vec![entry.to_string_lossy().into_owned()]);
    assert_relative_link(&outside, &sandbox.repo().join(entry))?;

    manager.remove(&outside)?;
    assert!(!fs::symlink_metadata(&outside)?.is_symlink());
    assert_eq!(fs::read_to_string(&outside)?, "foo");
    Ok(())
}

#[test]
fn add_rejects_invalid_paths() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    let target = sandbox.write("target", "t")?;
    let link = sandbox.home().join("link");
    std::os::unix::fs::symlink(&target, &link)?;

    let kind = |path: PathBuf| manager.add(path).map_err(|err| err.kind());
    assert_eq!(kind(sandbox.home().join("missing")), Err(ErrorKind::NotFound));
    assert_eq!(kind(link), Err(ErrorKind::UnsupportedType));
    assert_eq!(kind(sandbox.home().to_path_buf()), Err(ErrorKind::UnsupportedType));
    assert_eq!(
        kind(sandbox.repo().to_path_buf()),
        Err(ErrorKind::UnsupportedType)
    );
    assert!(sandbox.commits()?.is_empty());
    Ok(())
}

#[test]
fn add_already_managed() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    let bashrc = sandbox.write(".bashrc", "X")?;
    manager.add(&bashrc)?;

    let result = manager.add(&bashrc);

    assert_eq!(result.map_err(|err| err.kind()), Err(ErrorKind::AlreadyManaged));
    assert_eq!(sandbox.tracking(".lnk")?, ".bashrc\n");
    Ok(())
}

#[test]
fn add_without_repository() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let bashrc = sandbox.write(".bashrc", "X")?;

    let result = sandbox.manager().add(&bashrc);

    assert_eq!(result.map_err(|err| err.kind()), Err(ErrorKind::NotInitialized));
    assert_eq!(fs::read_to_string(&bashrc)?, "X");
    Ok(())
}
