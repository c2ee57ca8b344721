//! Grant command - installs a group's sudo grant.

use anyhow::{Context, Result};

use labctl::config::Config;
use labctl::identity::GroupName;
use labctl::policy::{Grant, Resolver};

/// Execute the grant command.
pub fn cmd_grant(
    config: &Config,
    group: &str,
    commands: &[String],
    nopasswd: bool,
    passwd: bool,
) -> Result<()> {
    let group = GroupName::new(group)?;
    let commands = Resolver::new().resolve_all(commands)?;
    let grant = Grant::new(
        group,
        commands,
        super::require_password(config, nopasswd, passwd),
    );

    let report = super::installer(config)
        .install_grant(&grant)
        .with_context(|| format!("Failed to install grant for group '{}'", grant.group))?;

    if report.unchanged {
        println!("Grant for {} unchanged (reinstalled and re-validated).", report.group);
    } else {
        println!("Installed grant for {}.", report.group);
    }
    println!("  File: {}", report.target.display());
    println!("  Line: {}", report.line);
    if let Some(backup) = &report.backup {
        println!("  Backup: {}", backup.display());
    }
    Ok(())
}
