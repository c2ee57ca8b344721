//! Group database access.

use tracing::debug;

use crate::error::{Error, Result};
use crate::identity::GroupName;
use crate::process::Cmd;

/// `groupadd` exit status for "group already exists".
const GROUPADD_EXISTS: i32 = 9;

/// `getent` exit status for "key not found".
const GETENT_NOT_FOUND: i32 = 2;

/// The OS group database.
pub trait GroupDatabase {
    /// GID of `name`, or `None` if no such group exists.
    fn lookup(&self, name: &GroupName) -> Result<Option<u32>>;

    /// Create `name`. Creating a group that already exists is not an error.
    fn create(&self, name: &GroupName) -> Result<()>;
}

impl<G: GroupDatabase + ?Sized> GroupDatabase for &G {
    fn lookup(&self, name: &GroupName) -> Result<Option<u32>> {
        (**self).lookup(name)
    }

    fn create(&self, name: &GroupName) -> Result<()> {
        (**self).create(name)
    }
}

/// `getent group` / `groupadd`, so NSS-backed groups are seen too.
#[derive(Debug, Clone, Default)]
pub struct SystemGroups;

impl GroupDatabase for SystemGroups {
    fn lookup(&self, name: &GroupName) -> Result<Option<u32>> {
        let result = Cmd::new("getent")
            .args(["group", name.as_str()])
            .allow_fail()
            .run()
            .map_err(|e| Error::tool("getent", format!("{:#}", e)))?;

        match result.code() {
            0 => parse_group_entry(result.stdout_trimmed(), name).map(Some),
            GETENT_NOT_FOUND => Ok(None),
            code => Err(Error::tool(
                "getent",
                format!("exited with code {}: {}", code, result.stderr_trimmed()),
            )),
        }
    }

    fn create(&self, name: &GroupName) -> Result<()> {
        let result = Cmd::new("groupadd")
            .arg(name.as_str())
            .allow_fail()
            .run()
            .map_err(|e| Error::tool("groupadd", format!("{:#}", e)))?;

        match result.code() {
            0 => Ok(()),
            // Someone else created it between our lookup and now
            GROUPADD_EXISTS => {
                debug!(group = %name, "groupadd reports group already exists");
                Ok(())
            }
            code => Err(Error::tool(
                "groupadd",
                format!("exited with code {}: {}", code, result.stderr_trimmed()),
            )),
        }
    }
}

/// Parse the GID out of a `name:x:gid:members` line.
pub fn parse_group_entry(line: &str, name: &GroupName) -> Result<u32> {
    let parts: Vec<&str> = line.split(':').collect();
    if parts.len() < 3 || parts[0] != name.as_str() {
        return Err(Error::tool(
            "getent",
            format!("unexpected group entry for '{}': {}", name, line),
        ));
    }
    parts[2].parse().map_err(|_| {
        Error::tool(
            "getent",
            format!("invalid GID '{}' for group '{}'", parts[2], name),
        )
    })
}
