//! Preflight command - runs preflight checks.

use anyhow::Result;

use labctl::config::Config;
use labctl::preflight;

/// Execute the preflight command.
pub fn cmd_preflight(config: &Config, strict: bool, json: bool) -> Result<()> {
    if json {
        let report = preflight::run_preflight(config);
        println!("{}", serde_json::to_string_pretty(&report)?);
        if strict && !report.all_passed() {
            anyhow::bail!("Preflight failed: {} check(s) failed.", report.fail_count());
        }
        return Ok(());
    }

    if strict {
        preflight::run_preflight_or_fail(config)?;
    } else {
        let report = preflight::run_preflight(config);
        report.print();
        if !report.all_passed() {
            println!("Some checks failed. Use --strict to exit non-zero.");
        }
    }
    Ok(())
}
