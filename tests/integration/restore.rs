// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{assert_relative_link, Sandbox};

use anyhow::Result;
use lnk::ErrorKind;
use pretty_assertions::assert_eq;
use std::fs;

#[test]
fn restore_after_simulated_pull() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    fs::write(sandbox.repo().join(".bashrc"), "X")?;
    fs::write(sandbox.repo().join(".lnk"), ".bashrc\n")?;

    let restored = manager.restore_symlinks()?;

    assert_eq!(restored, vec![".bashrc".to_string()]);
    assert_relative_link(&sandbox.home().join(".bashrc"), &sandbox.repo().join(".bashrc"))?;
    assert!(manager.restore_symlinks()?.is_empty());
    Ok(())
}

#[test]
fn restore_creates_parents_and_replaces_clutter() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    fs::create_dir_all(sandbox.repo().join(".config/nvim"))?;
    fs::write(sandbox.repo().join(".config/nvim/init.lua"), "lua")?;
    fs::write(sandbox.repo().join(".gitconfig"), "git")?;
    fs::write(sandbox.repo().join(".lnk"), ".config/nvim/init.lua\n.gitconfig\n")?;
    sandbox.write(".gitconfig", "stale")?;

    let restored = manager.restore_symlinks()?;

    assert_eq!(
        restored,
        vec![".config/nvim/init.lua".to_string(), ".gitconfig".to_string()]
    );
    assert_relative_link(
        &sandbox.home().join(".config/nvim/init.lua"),
        &sandbox.repo().join(".config/nvim/init.lua"),
    )?;
    assert_eq!(fs::read_to_string(sandbox.home().join(".gitconfig"))?, "git");
    Ok(())
}

#[test]
fn restore_skips_missing_and_malformed_entries() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let manager = sandbox.init()?;
    fs::write(sandbox.repo().join(".lnk"), "../../etc/passwd\n.missing\n")?;

    let restored = manager.restore_symlinks()?;

    assert!(restored.is_empty());
    assert!(!sandbox.home().join(".missing").exists());
    assert_eq!(
        manager.list()?,
        vec!["../../etc/passwd".to_string(), ".missing".to_string()]
    );
    Ok(())
}

#[test]
fn restore_only_touches_active_profile() -> Result<()> {
    let sandbox = Sandbox::new()?;
    sandbox.init()?;
    fs::create_dir_all(sandbox.repo().join("work.lnk"))?;
    fs::write(sandbox.repo().join("work.lnk/.gitconfig"), "work")?;
    fs::write(sandbox.repo().join(".lnk.work"), ".gitconfig\n")?;

    assert!(sandbox.manager().restore_symlinks()?.is_empty());
    assert!(!sandbox.home().join(".gitconfig").exists());

    let restored = sandbox.host_manager("work")?.restore_symlinks()?;
    assert_eq!(restored, vec![".gitconfig".to_string()]);
    assert_relative_link(
        &sandbox.home().join(".gitconfig"),
        &sandbox.repo().join("work.lnk/.gitconfig"),
    )?;
    Ok(())
}

#[test]
fn restore_without_repository() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let result = sandbox.manager().restore_symlinks();
    assert_eq!(result.map_err(|err| err.kind()), Err(ErrorKind::NotInitialized));
    Ok(())
}
