//! Group command - creates a group and its shared directory.

use anyhow::{Context, Result};

use labctl::config::Config;
use labctl::identity::GroupName;
use labctl::provision::ProvisionReport;

/// Execute the group command.
pub fn cmd_group(config: &Config, name: &str, no_dir: bool) -> Result<()> {
    let group = GroupName::new(name)?;
    let report = super::provisioner(config)
        .provision(&group, !no_dir)
        .with_context(|| format!("Failed to provision group '{}'", group))?;
    print_report(&report);
    Ok(())
}

pub(super) fn print_report(report: &ProvisionReport) {
    use labctl::provision::{AclOutcome, GroupOutcome};

    match &report.outcome {
        GroupOutcome::Created { gid } => println!("Created group {} (gid {}).", report.group, gid),
        GroupOutcome::Existing { gid } => println!("Group {} exists (gid {}).", report.group, gid),
    }
    if let Some(dir) = &report.directory {
        let verb = if dir.created { "Created" } else { "Updated" };
        println!("  {} {}", verb, dir.path.display());
        match &dir.acl {
            AclOutcome::Applied => println!("  Default ACL: g:{}:rwx", report.group),
            AclOutcome::Unsupported(reason) => println!("  Default ACL: skipped ({})", reason),
        }
    }
}
