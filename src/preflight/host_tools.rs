//! Host tool availability checks.

use std::path::Path;

use crate::config::Config;
use crate::process;

use super::types::{Category, CheckResult};

/// Check host tools are installed.
pub fn check_host_tools(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();

    results.push(check_tool_exists(
        &config.visudo,
        "sudo",
        "Required to syntax-check sudo policy",
        true,
    ));

    let required_tools = [
        ("getent", "glibc-common", "Required to look up groups"),
        ("groupadd", "shadow-utils", "Required to create groups"),
    ];
    for (tool, package, purpose) in required_tools {
        results.push(check_tool_exists(tool, package, purpose, true));
    }

    // Shared directories still work without default ACLs
    results.push(check_tool_exists(
        "setfacl",
        "acl",
        "Needed for default ACLs on shared directories",
        false,
    ));

    results
}

/// Check if a tool exists, either at an explicit path or in PATH.
pub(super) fn check_tool_exists(
    tool: &str,
    package: &str,
    purpose: &str,
    required: bool,
) -> CheckResult {
    let found = if tool.contains('/') {
        Path::new(tool).is_file().then(|| tool.to_string())
    } else {
        process::which(tool)
    };

    match found {
        Some(path) => CheckResult::pass(Category::Tools, tool).detail(path),
        None => {
            let msg = format!("Not found. Install '{}' package. {}", package, purpose);
            if required {
                CheckResult::fail(Category::Tools, tool, msg)
            } else {
                CheckResult::warn(Category::Tools, tool, msg)
            }
        }
    }
}
