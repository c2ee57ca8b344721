//! labctl library.
//!
//! Provisions lab hosts: security groups, per-group shared directories and
//! transactional sudo grants. The binary in `main.rs` is a thin CLI over
//! these modules; integration tests drive them directly.

pub mod config;
pub mod error;
pub mod identity;
pub mod lock;
pub mod policy;
pub mod preflight;
pub mod process;
pub mod provision;
pub mod status;

pub use error::{Error, Result};
