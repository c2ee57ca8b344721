//! Admin command - ensures the full-privilege line for the admin group.

use anyhow::{Context, Result};

use labctl::config::Config;
use labctl::identity::GroupName;
use labctl::policy::AdminOutcome;

/// Execute the admin command.
pub fn cmd_admin(config: &Config, group: Option<&str>) -> Result<()> {
    let group = match group {
        Some(name) => GroupName::new(name)?,
        None => config.admin_group.clone(),
    };

    let outcome = super::installer(config)
        .ensure_full_admin(&group)
        .with_context(|| format!("Failed to grant full privilege to '{}'", group))?;

    match outcome {
        AdminOutcome::AlreadyPresent { path } => {
            println!("{} already has full privilege ({}).", group, path.display());
        }
        AdminOutcome::Installed(report) => {
            println!("Granted full privilege to {}.", group);
            println!("  File: {}", report.target.display());
            println!("  Line: {}", report.line);
            if let Some(backup) = &report.backup {
                println!("  Backup: {}", backup.display());
            }
        }
    }
    Ok(())
}
