//! Show command - displays configuration and installed grants.

use anyhow::Result;

use labctl::config::Config;
use labctl::status;

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// Show installed grants and their backups
    Grants,
}

/// Execute the show command.
pub fn cmd_show(config: &Config, target: ShowTarget, json: bool) -> Result<()> {
    match target {
        ShowTarget::Config => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                config.print();
            }
        }
        ShowTarget::Grants => {
            let grants = status::scan_grants(config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&grants)?);
            } else {
                status::print(&grants);
            }
        }
    }
    Ok(())
}
