//! Configuration management for labctl.
//!
//! Reads configuration from the process environment. `main` loads a `.env`
//! file first with dotenvy, so variables set in the real environment take
//! precedence over the file. Everything the installer and provisioner touch
//! on disk comes from here; nothing in the core hard-codes a system path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::identity::GroupName;

pub const DEFAULT_SUDOERS_DIR: &str = "/etc/sudoers.d";
pub const DEFAULT_SUDOERS_FILE: &str = "/etc/sudoers";
pub const DEFAULT_GRANT_PREFIX: &str = "grp-";
pub const DEFAULT_SHARED_ROOT: &str = "/srv/lab/groups";
pub const DEFAULT_ADMIN_GROUP: &str = "lab-admins";
pub const DEFAULT_LOCK_FILE: &str = "/run/labctl.lock";
pub const DEFAULT_VISUDO: &str = "visudo";

/// labctl configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding grant files (default: /etc/sudoers.d)
    pub sudoers_dir: PathBuf,
    /// Main sudoers file, the root of the composite policy tree
    pub sudoers_file: PathBuf,
    /// Grant file name prefix; a group's grant lives at `<sudoers_dir>/<prefix><group>`
    pub grant_prefix: String,
    /// Where backup artifacts are written (default: same as sudoers_dir)
    pub backup_dir: PathBuf,
    /// Parent of the per-group shared directories
    pub shared_root: PathBuf,
    /// Group that receives the fixed full-privilege line
    pub admin_group: GroupName,
    /// Whether new grants require a password unless told otherwise
    pub require_password: bool,
    /// Groups provisioned by `labctl bootstrap`
    pub groups: Vec<GroupName>,
    /// Advisory lock file held around mutating commands
    pub lock_file: PathBuf,
    /// Policy syntax checker binary
    pub visudo: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build configuration from an explicit variable map, applying defaults.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let sudoers_dir = get("LABCTL_SUDOERS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SUDOERS_DIR));

        let sudoers_file = get("LABCTL_SUDOERS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SUDOERS_FILE));

        // Set but empty means no prefix, so it bypasses `get`
        let grant_prefix = vars
            .get("LABCTL_GRANT_PREFIX")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| DEFAULT_GRANT_PREFIX.to_string());

        // Backups default to living next to the grant files they protect
        let backup_dir = get("LABCTL_BACKUP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| sudoers_dir.clone());

        let shared_root = get("LABCTL_SHARED_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHARED_ROOT));

        let admin_group = GroupName::new(
            get("LABCTL_ADMIN_GROUP").unwrap_or_else(|| DEFAULT_ADMIN_GROUP.to_string()),
        )
        .map_err(|e| Error::Config {
            key: "LABCTL_ADMIN_GROUP",
            message: e.to_string(),
        })?;

        let require_password = match get("LABCTL_REQUIRE_PASSWORD") {
            None => true,
            Some(value) => parse_bool(&value).ok_or_else(|| Error::Config {
                key: "LABCTL_REQUIRE_PASSWORD",
                message: format!("expected true/false, got '{}'", value),
            })?,
        };

        let groups = get("LABCTL_GROUPS")
            .map(|list| parse_group_list(&list))
            .transpose()?
            .unwrap_or_default();

        let lock_file = get("LABCTL_LOCK_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCK_FILE));

        let visudo = get("LABCTL_VISUDO").unwrap_or_else(|| DEFAULT_VISUDO.to_string());

        let config = Self {
            sudoers_dir,
            sudoers_file,
            grant_prefix,
            backup_dir,
            shared_root,
            admin_group,
            require_password,
            groups,
            lock_file,
            visudo,
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration rooted in `base` instead of the real system paths.
    ///
    /// Used by tests and by operators rehearsing against a scratch tree.
    pub fn rooted_at(base: &Path) -> Self {
        let sudoers_dir = base.join("sudoers.d");
        Self {
            sudoers_file: base.join("sudoers"),
            grant_prefix: DEFAULT_GRANT_PREFIX.to_string(),
            backup_dir: sudoers_dir.clone(),
            sudoers_dir,
            shared_root: base.join("groups"),
            admin_group: GroupName(DEFAULT_ADMIN_GROUP.to_string()),
            require_password: true,
            groups: Vec::new(),
            lock_file: base.join("labctl.lock"),
            visudo: DEFAULT_VISUDO.to_string(),
        }
    }

    /// Reject values that would make the installer write files sudo ignores
    /// or write relative to whatever directory labctl happened to start in.
    pub fn validate(&self) -> Result<()> {
        if self.grant_prefix.contains(['.', '~', '/']) {
            return Err(Error::Config {
                key: "LABCTL_GRANT_PREFIX",
                message: format!(
                    "'{}' contains '.', '~' or '/'; sudo's #includedir skips such files",
                    self.grant_prefix
                ),
            });
        }

        let dirs: [(&'static str, &Path); 5] = [
            ("LABCTL_SUDOERS_DIR", &self.sudoers_dir),
            ("LABCTL_SUDOERS_FILE", &self.sudoers_file),
            ("LABCTL_BACKUP_DIR", &self.backup_dir),
            ("LABCTL_SHARED_ROOT", &self.shared_root),
            ("LABCTL_LOCK_FILE", &self.lock_file),
        ];
        for (key, path) in dirs {
            if !path.is_absolute() {
                return Err(Error::Config {
                    key,
                    message: format!("'{}' must be an absolute path", path.display()),
                });
            }
        }
        Ok(())
    }

    /// Deterministic grant file path for a group.
    pub fn grant_path(&self, group: &GroupName) -> PathBuf {
        self.sudoers_dir.join(format!("{}{}", self.grant_prefix, group))
    }

    /// Shared directory path for a group.
    pub fn shared_dir(&self, group: &GroupName) -> PathBuf {
        self.shared_root.join(group.as_str())
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  LABCTL_SUDOERS_DIR: {}", self.sudoers_dir.display());
        println!("  LABCTL_SUDOERS_FILE: {}", self.sudoers_file.display());
        println!("  LABCTL_GRANT_PREFIX: {}", self.grant_prefix);
        println!("  LABCTL_BACKUP_DIR: {}", self.backup_dir.display());
        println!("  LABCTL_SHARED_ROOT: {}", self.shared_root.display());
        println!("  LABCTL_ADMIN_GROUP: {}", self.admin_group);
        println!("  LABCTL_REQUIRE_PASSWORD: {}", self.require_password);
        let groups: Vec<&str> = self.groups.iter().map(GroupName::as_str).collect();
        println!("  LABCTL_GROUPS: {}", groups.join(","));
        println!("  LABCTL_LOCK_FILE: {}", self.lock_file.display());
        println!("  LABCTL_VISUDO: {}", self.visudo);
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a comma-separated group list, keeping first occurrence order.
fn parse_group_list(list: &str) -> Result<Vec<GroupName>> {
    let mut groups: Vec<GroupName> = Vec::new();
    for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let group = GroupName::new(raw).map_err(|e| Error::Config {
            key: "LABCTL_GROUPS",
            message: e.to_string(),
        })?;
        if !groups.contains(&group) {
            groups.push(group);
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config.sudoers_dir, PathBuf::from("/etc/sudoers.d"));
        assert_eq!(config.backup_dir, config.sudoers_dir);
        assert_eq!(config.grant_prefix, "grp-");
        assert_eq!(config.admin_group.as_str(), "lab-admins");
        assert!(config.require_password);
        assert!(config.groups.is_empty());
    }

    #[test]
    fn test_grant_path_uses_prefix() {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        let group = GroupName::new("blue-team").unwrap();
        assert_eq!(
            config.grant_path(&group),
            PathBuf::from("/etc/sudoers.d/grp-blue-team")
        );
    }

    #[test]
    fn test_group_list_is_deduplicated_in_order() {
        let config =
            Config::from_vars(&vars(&[("LABCTL_GROUPS", "red-team, blue-team,red-team,")])).unwrap();
        let names: Vec<&str> = config.groups.iter().map(GroupName::as_str).collect();
        assert_eq!(names, vec!["red-team", "blue-team"]);
    }

    #[test]
    fn test_grant_prefix_is_trimmed_but_may_be_empty() {
        let config = Config::from_vars(&vars(&[("LABCTL_GRANT_PREFIX", " lab- ")])).unwrap();
        assert_eq!(config.grant_prefix, "lab-");

        let config = Config::from_vars(&vars(&[("LABCTL_GRANT_PREFIX", "")])).unwrap();
        assert_eq!(config.grant_prefix, "");
    }

    #[test]
    fn test_rejects_prefix_sudo_would_skip() {
        for prefix in ["grp.", "grp~", "a/b"] {
            let err = Config::from_vars(&vars(&[("LABCTL_GRANT_PREFIX", prefix)])).unwrap_err();
            assert!(matches!(err, Error::Config { key: "LABCTL_GRANT_PREFIX", .. }));
        }
    }

    #[test]
    fn test_rejects_relative_paths() {
        let err = Config::from_vars(&vars(&[("LABCTL_SHARED_ROOT", "groups")])).unwrap_err();
        assert!(matches!(err, Error::Config { key: "LABCTL_SHARED_ROOT", .. }));
    }

    #[test]
    fn test_rejects_bad_password_flag_and_groups() {
        assert!(Config::from_vars(&vars(&[("LABCTL_REQUIRE_PASSWORD", "maybe")])).is_err());
        assert!(Config::from_vars(&vars(&[("LABCTL_GROUPS", "ok,Not-Ok")])).is_err());

        let config = Config::from_vars(&vars(&[("LABCTL_REQUIRE_PASSWORD", "no")])).unwrap();
        assert!(!config.require_password);
    }

    #[test]
    #[serial]
    fn test_load_reads_process_environment() {
        std::env::set_var("LABCTL_SUDOERS_DIR", "/tmp/labctl-test-sudoers.d");
        std::env::set_var("LABCTL_ADMIN_GROUP", "wheel");
        let config = Config::load();
        std::env::remove_var("LABCTL_SUDOERS_DIR");
        std::env::remove_var("LABCTL_ADMIN_GROUP");

        let config = config.unwrap();
        assert_eq!(config.sudoers_dir, PathBuf::from("/tmp/labctl-test-sudoers.d"));
        assert_eq!(config.backup_dir, PathBuf::from("/tmp/labctl-test-sudoers.d"));
        assert_eq!(config.admin_group.as_str(), "wheel");
    }
}
