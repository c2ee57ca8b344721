//! Policy validation.
//!
//! Two checks, both read-only with respect to the live policy:
//! - [`validate`] parses a candidate fragment alone, from a scratch file
//!   outside the policy directory.
//! - [`validate_composite`] parses the whole effective tree (main sudoers
//!   file plus everything it includes) as it stands on disk.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::process::Cmd;

use super::render::PolicyText;
use super::GRANT_MODE;

/// Outcome of a syntax check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// Rejected, with the checker's diagnostics verbatim.
    Invalid(String),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

/// The privilege-policy syntax checker.
///
/// `Err` means the checker could not give a verdict at all (not installed,
/// killed); a policy it dislikes is `Ok(Verdict::Invalid(..))`.
pub trait PolicyChecker {
    /// Check a single file in isolation.
    fn check_file(&self, path: &Path) -> Result<Verdict>;

    /// Check the live policy tree.
    fn check_tree(&self) -> Result<Verdict>;
}

impl<C: PolicyChecker + ?Sized> PolicyChecker for &C {
    fn check_file(&self, path: &Path) -> Result<Verdict> {
        (**self).check_file(path)
    }

    fn check_tree(&self) -> Result<Verdict> {
        (**self).check_tree()
    }
}

/// `visudo -c` as the policy checker.
#[derive(Debug, Clone)]
pub struct Visudo {
    binary: String,
    sudoers_file: PathBuf,
}

impl Visudo {
    pub fn new(binary: impl Into<String>, sudoers_file: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            sudoers_file: sudoers_file.into(),
        }
    }

    fn check(&self, path: &Path) -> Result<Verdict> {
        let result = Cmd::new(&self.binary)
            .args(["-c", "-f"])
            .arg_path(path)
            .allow_fail()
            .run()
            .map_err(|e| Error::tool(&self.binary, format!("{:#}", e)))?;

        // Exit 1 is a parse failure; anything else (signal, usage error) is not a verdict
        match result.code() {
            0 => Ok(Verdict::Valid),
            1 => Ok(Verdict::Invalid(result.diagnostics())),
            code => Err(Error::tool(
                &self.binary,
                format!("exited with code {}: {}", code, result.diagnostics()),
            )),
        }
    }
}

impl PolicyChecker for Visudo {
    fn check_file(&self, path: &Path) -> Result<Verdict> {
        self.check(path)
    }

    fn check_tree(&self) -> Result<Verdict> {
        self.check(&self.sudoers_file)
    }
}

/// Check a candidate fragment alone, never touching the live policy.
pub fn validate(checker: &dyn PolicyChecker, text: &PolicyText) -> Result<Verdict> {
    let scratch = tempfile::Builder::new()
        .prefix("labctl-fragment.")
        .tempdir()
        .map_err(|e| Error::fs("create scratch directory in", std::env::temp_dir(), e))?;
    let fragment = scratch.path().join("fragment");

    let mut file = fs::File::create(&fragment).map_err(|e| Error::fs("create", &fragment, e))?;
    file.write_all(text.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| Error::fs("write", &fragment, e))?;
    drop(file);
    // visudo complains about fragments that are writable
    fs::set_permissions(&fragment, fs::Permissions::from_mode(GRANT_MODE))
        .map_err(|e| Error::fs("chmod", &fragment, e))?;

    let verdict = checker.check_file(&fragment)?;
    debug!(fragment = %fragment.display(), valid = verdict.is_valid(), "isolated check");
    Ok(verdict)
}

/// Check the whole installed policy tree.
pub fn validate_composite(checker: &dyn PolicyChecker) -> Result<Verdict> {
    let verdict = checker.check_tree()?;
    debug!(valid = verdict.is_valid(), "composite check");
    Ok(verdict)
}
