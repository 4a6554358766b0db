// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Move dotfiles into a Git repository, and symlink them back home.
//!
//! Files handed to lnk are moved into a repository. Their original
//! locations become relative symlinks into that repository. Version control
//! carries the repository to other machines, where the symlinks are
//! restored after every pull.
//!
//! Configuration can be shared by every machine through the common
//! profile, or kept to a single machine through a host profile.
//!
//! # See Also
//!
//! 1. [`Manager`]

pub mod bootstrap;
pub mod config;
pub mod fs;
pub mod layout;
pub mod manager;
pub mod path;
pub mod tracker;
pub mod vcs;

pub use layout::{Layout, Profile};
pub use manager::{DoctorReport, ErrorKind, Manager, ManagerError};
pub use vcs::{Git, SyncStatus, Vcs};
