//! Group and shared directory provisioning.
//!
//! Every operation here is idempotent: running it twice leaves the host in
//! the same state as running it once, and a second run repairs ownership,
//! mode and ACL drift introduced by hand in between.

pub mod directory;
pub mod groups;

use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::identity::GroupName;

pub use directory::{AclOutcome, AclTool, DirectoryReport, Setfacl, SHARED_DIR_MODE, SHARED_ROOT_MODE};
pub use groups::{GroupDatabase, SystemGroups};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    Created { gid: u32 },
    Existing { gid: u32 },
}

impl GroupOutcome {
    pub fn gid(&self) -> u32 {
        match self {
            GroupOutcome::Created { gid } | GroupOutcome::Existing { gid } => *gid,
        }
    }
}

/// Outcome of provisioning one group end to end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub group: GroupName,
    pub outcome: GroupOutcome,
    pub directory: Option<DirectoryReport>,
}

pub struct Provisioner<G, A> {
    config: Config,
    groups: G,
    acl: A,
}

impl<G: GroupDatabase, A: AclTool> Provisioner<G, A> {
    pub fn new(config: Config, groups: G, acl: A) -> Self {
        Self {
            config,
            groups,
            acl,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create the group unless it already exists.
    pub fn ensure_group(&self, name: &GroupName) -> Result<GroupOutcome> {
        if let Some(gid) = self.groups.lookup(name)? {
            return Ok(GroupOutcome::Existing { gid });
        }

        self.groups.create(name)?;
        let gid = self.groups.lookup(name)?.ok_or_else(|| {
            Error::tool(
                "groupadd",
                format!("group '{}' still missing after creation", name),
            )
        })?;
        info!("created group {} (gid {})", name, gid);
        Ok(GroupOutcome::Created { gid })
    }

    /// Create `<shared_root>/<group>` if needed and re-apply ownership,
    /// mode 2770 and the default ACL.
    pub fn ensure_shared_directory(&self, group: &str) -> Result<DirectoryReport> {
        if group.trim().is_empty() {
            return Err(Error::MissingGroupName);
        }
        let group = GroupName::new(group.trim())?;

        // Re-read right before acting; the group may have been removed since the last step
        let gid = self
            .groups
            .lookup(&group)?
            .ok_or_else(|| Error::UnknownGroup {
                name: group.to_string(),
            })?;

        directory::ensure_root(&self.config.shared_root)?;
        directory::ensure_dir(&self.config.shared_dir(&group), &group, gid, &self.acl)
    }

    /// `ensure_group`, then optionally `ensure_shared_directory`.
    pub fn provision(&self, group: &GroupName, with_directory: bool) -> Result<ProvisionReport> {
        let outcome = self.ensure_group(group)?;
        let directory = if with_directory {
            Some(self.ensure_shared_directory(group.as_str())?)
        } else {
            None
        };
        Ok(ProvisionReport {
            group: group.clone(),
            outcome,
            directory,
        })
    }

    /// Provision every predefined group from the configuration, in order.
    pub fn bootstrap(&self) -> Result<Vec<ProvisionReport>> {
        self.config
            .groups
            .iter()
            .map(|group| self.provision(group, true))
            .collect()
    }
}
