//! Error kinds for the provisioning core.
//!
//! Caller-input errors (`InvalidIdentity`, `EmptyCommandSet`,
//! `UnresolvedCommand`, `UnsafeCommandPath`, `MissingGroupName`,
//! `AdminGroupGrant`) are raised before anything is written. `CompositeSyntax`
//! always carries the outcome of the rollback that followed it; a rollback that itself failed is reported as
//! `RollbackFailed` instead, which is the only fatal kind.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// What the rollback routine did to the grant file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollback {
    /// Prior content was written back over the target.
    Restored { target: PathBuf, backup: PathBuf },
    /// No prior file existed; the newly installed file was removed.
    Removed { target: PathBuf },
}

impl fmt::Display for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rollback::Restored { target, backup } => write!(
                f,
                "restored {} from {}",
                target.display(),
                backup.display()
            ),
            Rollback::Removed { target } => write!(f, "removed {}", target.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid group name '{name}': {reason}")]
    InvalidIdentity { name: String, reason: &'static str },

    #[error("grant for group '{group}' has no commands")]
    EmptyCommandSet { group: String },

    #[error("command '{name}' could not be resolved to an executable")]
    UnresolvedCommand { name: String },

    #[error("command path '{}' contains characters that are not allowed in a sudoers command list", path.display())]
    UnsafeCommandPath { path: PathBuf },

    #[error("policy fragment rejected by syntax check:\n{diagnostics}")]
    IsolatedSyntax { diagnostics: String },

    #[error("installed policy tree rejected by syntax check ({rollback}):\n{diagnostics}")]
    CompositeSyntax {
        diagnostics: String,
        rollback: Rollback,
    },

    #[error(
        "ROLLBACK FAILED for {} ({}): {source}. The live policy tree may be in an unknown state; \
         manual intervention is required. Original failure:\n{diagnostics}",
        target.display(),
        path.display()
    )]
    RollbackFailed {
        target: PathBuf,
        path: PathBuf,
        diagnostics: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to {op} {}: {source}", path.display())]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "group '{group}' holds full administrative privilege; a command grant would replace it"
    )]
    AdminGroupGrant { group: String },

    #[error("group name is missing")]
    MissingGroupName,

    #[error("group '{name}' does not exist")]
    UnknownGroup { name: String },

    #[error("{tool}: {message}")]
    Tool { tool: String, message: String },

    #[error("another labctl instance holds the host lock {}", path.display())]
    Locked { path: PathBuf },

    #[error("invalid configuration for {key}: {message}")]
    Config { key: &'static str, message: String },
}

impl Error {
    pub fn fs(op: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Filesystem {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn tool(tool: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: err.to_string(),
        }
    }

    /// A fatal error leaves the host in a state that needs an operator.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::RollbackFailed { .. })
    }

    /// Caller-input errors are raised before anything on disk is touched.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidIdentity { .. }
                | Error::EmptyCommandSet { .. }
                | Error::UnresolvedCommand { .. }
                | Error::UnsafeCommandPath { .. }
                | Error::MissingGroupName
                | Error::AdminGroupGrant { .. }
        )
    }
}
