//! Sudo grant management.
//!
//! A grant travels leaf-first through this module:
//! - `command` turns operator input into absolute executable paths
//! - `render` turns a grant into the exact grant file text
//! - `validate` runs the policy syntax checker on a fragment or the live tree
//! - `install` backs up, installs, re-validates and rolls back
//! - `admin` keeps the administrative group's full-privilege line in place

pub mod admin;
pub mod command;
pub mod install;
pub mod render;
pub mod validate;

pub use admin::AdminOutcome;
pub use command::{CommandRef, CommandSet, Resolver};
pub use install::{InstallReport, Installer, Stage};
pub use render::{render, Grant, PolicyText};
pub use validate::{PolicyChecker, Verdict, Visudo};

/// Mode of every grant file (and backup) labctl writes.
pub const GRANT_MODE: u32 = 0o440;
