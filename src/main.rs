//! labctl - lab host provisioning.
//!
//! Creates security groups and their shared directories, and installs
//! per-group sudo grants that are syntax-checked before and after they go
//! live, with automatic rollback.

mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use labctl::config::Config;
use labctl::lock::HostLock;

/// Exit status for a failed rollback: the policy tree needs an operator.
const EXIT_FATAL: u8 = 2;

#[derive(Parser)]
#[command(name = "labctl")]
#[command(about = "Lab host provisioning: groups, shared directories and sudo grants")]
#[command(
    after_help = "QUICK START:\n  labctl preflight                       Check the host\n  labctl bootstrap                       Create configured groups and the admin grant\n  labctl grant blue-team systemctl tcpdump  Install a grant\n  labctl show grants                     List installed grants"
)]
struct Cli {
    /// Log debug output (overrides LABCTL_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install (or replace) the sudo grant for a group
    Grant {
        /// Group receiving the grant
        group: String,
        /// Commands, as absolute paths or names looked up in PATH
        #[arg(required = true)]
        commands: Vec<String>,
        /// Do not ask for a password
        #[arg(long, conflicts_with = "passwd")]
        nopasswd: bool,
        /// Ask for a password (default unless LABCTL_REQUIRE_PASSWORD=false)
        #[arg(long)]
        passwd: bool,
    },

    /// Print the grant file `grant` would install, without installing it
    Render {
        group: String,
        #[arg(required = true)]
        commands: Vec<String>,
        #[arg(long, conflicts_with = "passwd")]
        nopasswd: bool,
        #[arg(long)]
        passwd: bool,
    },

    /// Give the admin group full sudo privilege if it does not have it yet
    Admin {
        /// Group to use instead of LABCTL_ADMIN_GROUP
        #[arg(long)]
        group: Option<String>,
    },

    /// Create a group and its shared directory
    Group {
        name: String,
        /// Only create the group
        #[arg(long)]
        no_dir: bool,
    },

    /// Provision the admin group and every group in LABCTL_GROUPS
    Bootstrap,

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
        /// Print JSON
        #[arg(long, global = true)]
        json: bool,
    },

    /// Check the host is ready for labctl
    Preflight {
        /// Exit non-zero if any check fails
        #[arg(long)]
        strict: bool,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Commands that write to the host run under the host lock.
    fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Grant { .. } | Commands::Admin { .. } | Commands::Group { .. } | Commands::Bootstrap
        )
    }
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show effective configuration
    Config,
    /// Show installed grants and their backups
    Grants,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load .env if present
    dotenvy::dotenv().ok();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let fatal = err
                .downcast_ref::<labctl::Error>()
                .map(labctl::Error::is_fatal)
                .unwrap_or(false);
            if fatal {
                eprintln!("FATAL: {:#}", err);
                ExitCode::from(EXIT_FATAL)
            } else {
                eprintln!("Error: {:#}", err);
                ExitCode::FAILURE
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("LABCTL_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    let _lock = if cli.command.mutates() {
        Some(HostLock::acquire(&config.lock_file)?)
    } else {
        None
    };

    match cli.command {
        Commands::Grant {
            group,
            commands: names,
            nopasswd,
            passwd,
        } => commands::cmd_grant(&config, &group, &names, nopasswd, passwd)?,

        Commands::Render {
            group,
            commands: names,
            nopasswd,
            passwd,
        } => commands::cmd_render(&config, &group, &names, nopasswd, passwd)?,

        Commands::Admin { group } => commands::cmd_admin(&config, group.as_deref())?,

        Commands::Group { name, no_dir } => commands::cmd_group(&config, &name, no_dir)?,

        Commands::Bootstrap => commands::cmd_bootstrap(&config)?,

        Commands::Show { what, json } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Grants => commands::show::ShowTarget::Grants,
            };
            commands::cmd_show(&config, show_target, json)?;
        }

        Commands::Preflight { strict, json } => commands::cmd_preflight(&config, strict, json)?,
    }

    Ok(())
}
