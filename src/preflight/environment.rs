//! Policy tree, group and host checks.

use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::process::Cmd;
use crate::provision::{GroupDatabase, SystemGroups};

use super::types::{Category, CheckResult};

/// Check the sudo policy layout, shared root, admin group and privileges.
pub fn check_environment(config: &Config) -> Vec<CheckResult> {
    vec![
        check_sudoers_file(&config.sudoers_file),
        check_sudoers_dir(&config.sudoers_dir),
        check_includedir(&config.sudoers_file, &config.sudoers_dir),
        check_writable("backup dir", &config.backup_dir),
        check_shared_root(&config.shared_root),
        check_admin_group(config),
        check_root(),
    ]
}

fn check_sudoers_file(path: &Path) -> CheckResult {
    if path.is_file() {
        CheckResult::pass(Category::Policy, "sudoers file").detail(path.display().to_string())
    } else {
        CheckResult::fail(
            Category::Policy,
            "sudoers file",
            format!("{} not found. Is sudo installed?", path.display()),
        )
    }
}

fn check_sudoers_dir(path: &Path) -> CheckResult {
    if path.is_dir() {
        CheckResult::pass(Category::Policy, "sudoers dir").detail(path.display().to_string())
    } else {
        CheckResult::fail(
            Category::Policy,
            "sudoers dir",
            format!("{} is not a directory", path.display()),
        )
    }
}

/// The main file must pull in the grant directory or grants have no effect.
fn check_includedir(sudoers_file: &Path, sudoers_dir: &Path) -> CheckResult {
    let content = match fs::read_to_string(sudoers_file) {
        Ok(content) => content,
        Err(e) => {
            return CheckResult::skip(
                Category::Policy,
                "includedir",
                format!("cannot read {}: {}", sudoers_file.display(), e),
            )
        }
    };

    if includes_dir(&content, sudoers_dir) {
        CheckResult::pass(Category::Policy, "includedir")
    } else {
        CheckResult::warn(
            Category::Policy,
            "includedir",
            format!(
                "{} does not include {}; installed grants will not take effect",
                sudoers_file.display(),
                sudoers_dir.display()
            ),
        )
    }
}

/// True if `content` has `#includedir <dir>` or `@includedir <dir>`.
pub(super) fn includes_dir(content: &str, dir: &Path) -> bool {
    let wanted = dir.to_string_lossy();
    let wanted = wanted.trim_end_matches('/');
    content.lines().any(|line| {
        let mut words = line.split_whitespace();
        matches!(words.next(), Some("#includedir") | Some("@includedir"))
            && words
                .next()
                .map(|d| d.trim_end_matches('/') == wanted)
                .unwrap_or(false)
    })
}

fn check_writable(name: &str, dir: &Path) -> CheckResult {
    if !dir.is_dir() {
        return CheckResult::fail(
            Category::Policy,
            name,
            format!("{} is not a directory", dir.display()),
        );
    }
    // Leading dot keeps sudo from ever reading the temp file
    match tempfile::Builder::new()
        .prefix(".labctl-preflight")
        .tempfile_in(dir)
    {
        Ok(_) => CheckResult::pass(Category::Policy, name).detail(dir.display().to_string()),
        Err(e) => CheckResult::fail(
            Category::Policy,
            name,
            format!("cannot write to {}: {}", dir.display(), e),
        ),
    }
}

fn check_shared_root(root: &Path) -> CheckResult {
    let name = "shared root";
    if root.is_dir() {
        return CheckResult::pass(Category::Groups, name).detail(root.display().to_string());
    }
    if root.exists() {
        return CheckResult::fail(
            Category::Groups,
            name,
            format!("{} exists but is not a directory", root.display()),
        );
    }
    match root.parent() {
        Some(parent) if parent.is_dir() => CheckResult::pass(Category::Groups, name)
            .detail(format!("{} will be created", root.display())),
        _ => CheckResult::fail(
            Category::Groups,
            name,
            format!("parent of {} does not exist", root.display()),
        ),
    }
}

fn check_admin_group(config: &Config) -> CheckResult {
    let group = &config.admin_group;
    match SystemGroups.lookup(group) {
        Ok(Some(gid)) => CheckResult::pass(Category::Groups, "admin group")
            .detail(format!("{} (gid {})", group, gid)),
        Ok(None) => CheckResult::warn(
            Category::Groups,
            "admin group",
            format!("'{}' does not exist yet; `labctl bootstrap` creates it", group),
        ),
        Err(e) => CheckResult::skip(Category::Groups, "admin group", e.to_string()),
    }
}

fn check_root() -> CheckResult {
    let name = "running as root";
    match Cmd::new("id").arg("-u").run() {
        Ok(result) if result.stdout_trimmed() == "0" => CheckResult::pass(Category::Host, name),
        Ok(result) => CheckResult::warn(
            Category::Host,
            name,
            format!(
                "uid {}; installing grants and creating groups needs root",
                result.stdout_trimmed()
            ),
        ),
        Err(e) => CheckResult::skip(Category::Host, name, format!("{:#}", e)),
    }
}
