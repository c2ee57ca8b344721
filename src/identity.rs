//! Group identities.
//!
//! A [`GroupName`] is the only way a group reaches the policy renderer or the
//! provisioner, so every path and sudoers line built from one is safe to
//! interpolate: no `/`, no whitespace, no `.` (sudo's `#includedir` skips
//! files containing a dot, so a dotted group would get a grant file sudo
//! never reads).

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};

/// Longest group name `groupadd` accepts.
pub const MAX_GROUP_NAME_LEN: usize = 32;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_-]*$").expect("static regex is valid"))
}

/// A validated group name matching `^[a-z_][a-z0-9_-]*$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GroupName(pub(crate) String);

impl GroupName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidIdentity {
                name,
                reason: "name is empty",
            });
        }
        if name.len() > MAX_GROUP_NAME_LEN {
            return Err(Error::InvalidIdentity {
                name,
                reason: "name is longer than 32 characters",
            });
        }
        if !pattern().is_match(&name) {
            return Err(Error::InvalidIdentity {
                name,
                reason: "must start with a lowercase letter or '_' and contain only [a-z0-9_-]",
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GroupName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for GroupName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_lab_group_names() {
        for name in ["blue-team", "_svc", "team_x", "lab-admins", "g1"] {
            assert!(GroupName::new(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_rejects_malformed_names() {
        for name in [
            "",
            "Blue",
            "1team",
            "-team",
            "team.x",
            "team x",
            "../etc",
            "team/x",
            "équipe",
        ] {
            let err = GroupName::new(name).unwrap_err();
            assert!(
                matches!(err, Error::InvalidIdentity { .. }),
                "{:?} should be rejected as InvalidIdentity, got {:?}",
                name,
                err
            );
        }
    }

    #[test]
    fn test_rejects_overlong_names() {
        let name = "a".repeat(MAX_GROUP_NAME_LEN + 1);
        assert!(GroupName::new(name).is_err());
        assert!(GroupName::new("a".repeat(MAX_GROUP_NAME_LEN)).is_ok());
    }
}
