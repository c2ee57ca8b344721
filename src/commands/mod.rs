//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `grant` - Install a sudo grant for a group
//! - `render` - Print the grant file a `grant` would install
//! - `admin` - Ensure the admin group's full-privilege line
//! - `group` - Create a group and its shared directory
//! - `bootstrap` - Provision every configured group
//! - `show` - Display configuration and installed grants
//! - `preflight` - Run preflight checks

mod admin;
mod bootstrap;
mod grant;
mod group;
mod preflight;
mod render;
pub mod show;

pub use admin::cmd_admin;
pub use bootstrap::cmd_bootstrap;
pub use grant::cmd_grant;
pub use group::cmd_group;
pub use preflight::cmd_preflight;
pub use render::cmd_render;
pub use show::cmd_show;

use labctl::config::Config;
use labctl::policy::{Installer, Visudo};
use labctl::provision::{Provisioner, Setfacl, SystemGroups};

/// Installer wired to the host's `visudo`.
fn installer(config: &Config) -> Installer<Visudo> {
    let checker = Visudo::new(config.visudo.clone(), config.sudoers_file.clone());
    Installer::new(config.clone(), checker)
}

/// Provisioner wired to `getent`/`groupadd` and `setfacl`.
fn provisioner(config: &Config) -> Provisioner<SystemGroups, Setfacl> {
    Provisioner::new(config.clone(), SystemGroups, Setfacl::new())
}

/// Explicit `--nopasswd`/`--passwd` flags override the configured default.
fn require_password(config: &Config, nopasswd: bool, passwd: bool) -> bool {
    if nopasswd {
        false
    } else if passwd {
        true
    } else {
        config.require_password
    }
}
