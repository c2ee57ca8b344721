//! Shared group directories and their default ACLs.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::identity::GroupName;
use crate::process::{self, Cmd};

/// setgid + rwx for owner and group, nothing for others.
pub const SHARED_DIR_MODE: u32 = 0o2770;

/// Mode of the directory holding all shared directories.
pub const SHARED_ROOT_MODE: u32 = 0o755;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclOutcome {
    Applied,
    /// The host cannot carry default ACLs here; the directory still works,
    /// new files just inherit less.
    Unsupported(String),
}

/// Applies default ACL entries.
pub trait AclTool {
    /// Give `group` rwx on everything created inside `dir` from now on.
    fn set_default_group_rwx(&self, dir: &Path, group: &GroupName) -> Result<AclOutcome>;
}

impl<A: AclTool + ?Sized> AclTool for &A {
    fn set_default_group_rwx(&self, dir: &Path, group: &GroupName) -> Result<AclOutcome> {
        (**self).set_default_group_rwx(dir, group)
    }
}

/// `setfacl -d -m g:<group>:rwx <dir>`
#[derive(Debug, Clone)]
pub struct Setfacl {
    binary: String,
}

impl Setfacl {
    pub fn new() -> Self {
        Self::with_binary("setfacl")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for Setfacl {
    fn default() -> Self {
        Self::new()
    }
}

impl AclTool for Setfacl {
    fn set_default_group_rwx(&self, dir: &Path, group: &GroupName) -> Result<AclOutcome> {
        let is_path = self.binary.contains('/');
        if (is_path && !Path::new(&self.binary).exists()) || (!is_path && !process::exists(&self.binary)) {
            return Ok(AclOutcome::Unsupported(format!("{} is not installed", self.binary)));
        }

        let result = Cmd::new(&self.binary)
            .args(["-d", "-m", &format!("g:{}:rwx", group)])
            .arg_path(dir)
            .allow_fail()
            .run()
            .map_err(|e| Error::tool(&self.binary, format!("{:#}", e)))?;

        if result.success() {
            return Ok(AclOutcome::Applied);
        }
        let stderr = result.stderr_trimmed();
        if stderr.contains("Operation not supported") {
            return Ok(AclOutcome::Unsupported(stderr.to_string()));
        }
        Err(Error::tool(
            &self.binary,
            format!("exited with code {}: {}", result.code(), stderr),
        ))
    }
}

/// What `ensure_shared_directory` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryReport {
    pub path: PathBuf,
    pub created: bool,
    pub acl: AclOutcome,
}

/// Create `root` with mode 755 if it does not exist yet.
///
/// An existing root is left alone: it may be a mount point an operator
/// configured on purpose.
pub(crate) fn ensure_root(root: &Path) -> Result<()> {
    if root.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(root).map_err(|e| Error::fs("create", root, e))?;
    fs::set_permissions(root, fs::Permissions::from_mode(SHARED_ROOT_MODE))
        .map_err(|e| Error::fs("chmod", root, e))?;
    info!("created {}", root.display());
    Ok(())
}

/// Create `path` if needed, then re-apply group, mode and default ACL.
pub(crate) fn ensure_dir(
    path: &Path,
    group: &GroupName,
    gid: u32,
    acl: &dyn AclTool,
) -> Result<DirectoryReport> {
    let created = match fs::create_dir(path) {
        Ok(()) => {
            info!("created {}", path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => false,
        Err(e) => return Err(Error::fs("create", path, e)),
    };

    std::os::unix::fs::chown(path, None, Some(gid)).map_err(|e| Error::fs("chown", path, e))?;
    // chown clears setgid on some systems, so mode goes second
    fs::set_permissions(path, fs::Permissions::from_mode(SHARED_DIR_MODE))
        .map_err(|e| Error::fs("chmod", path, e))?;

    let acl = acl.set_default_group_rwx(path, group)?;
    if let AclOutcome::Unsupported(reason) = &acl {
        warn!("default ACL not applied to {}: {}", path.display(), reason);
    }

    Ok(DirectoryReport {
        path: path.to_path_buf(),
        created,
        acl,
    })
}
