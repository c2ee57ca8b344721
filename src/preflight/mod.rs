//! Preflight checks for a labctl host.
//!
//! Verifies the tools and paths the installer and provisioner depend on
//! before anything is changed. Run with `labctl preflight`.

mod environment;
mod host_tools;
mod types;

use anyhow::{bail, Result};
use tracing::info;

use crate::config::Config;

pub use types::{Category, CheckResult, CheckStatus, PreflightReport, Tally};

/// Run all preflight checks.
pub fn run_preflight(config: &Config) -> PreflightReport {
    let mut checks = Vec::new();

    info!("checking host tools");
    checks.extend(host_tools::check_host_tools(config));

    info!("checking policy and directory layout");
    checks.extend(environment::check_environment(config));

    PreflightReport { checks }
}

/// Run preflight and bail if any checks fail.
pub fn run_preflight_or_fail(config: &Config) -> Result<()> {
    let report = run_preflight(config);
    report.print();

    if !report.all_passed() {
        bail!(
            "Preflight failed: {} check(s) failed. Fix the issues above before provisioning.",
            report.fail_count()
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}
