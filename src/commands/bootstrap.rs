//! Bootstrap command - provisions the admin group and every configured group.

use anyhow::{Context, Result};

use labctl::config::Config;
use labctl::policy::AdminOutcome;

/// Execute the bootstrap command.
///
/// The admin group gets a group and its full-privilege line but no shared
/// directory; each entry of `LABCTL_GROUPS` gets a group and a directory.
pub fn cmd_bootstrap(config: &Config) -> Result<()> {
    let provisioner = super::provisioner(config);

    let admin = provisioner
        .provision(&config.admin_group, false)
        .with_context(|| format!("Failed to provision admin group '{}'", config.admin_group))?;
    super::group::print_report(&admin);

    match super::installer(config)
        .ensure_full_admin(&config.admin_group)
        .context("Failed to grant full privilege to the admin group")?
    {
        AdminOutcome::AlreadyPresent { path } => {
            println!("  Full privilege already in {}", path.display())
        }
        AdminOutcome::Installed(report) => {
            println!("  Full privilege installed in {}", report.target.display())
        }
    }

    if config.groups.is_empty() {
        println!("No predefined groups configured (LABCTL_GROUPS).");
        return Ok(());
    }

    let reports = provisioner
        .bootstrap()
        .context("Failed to provision predefined groups")?;
    for report in &reports {
        super::group::print_report(report);
    }
    println!("\nBootstrapped {} group(s).", reports.len());
    Ok(())
}
