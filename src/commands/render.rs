//! Render command - prints grant file text without touching the host.

use anyhow::Result;

use labctl::config::Config;
use labctl::identity::GroupName;
use labctl::policy::{Grant, Resolver};

/// Execute the render command.
pub fn cmd_render(
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

    let path = config.grant_path(&grant.group);
    let text = grant.render()?;
    println!("# would be written to {}", path.display());
    print!("{}", text);
    Ok(())
}
