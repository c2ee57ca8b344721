//! Shared test utilities for labctl tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use labctl::config::Config;
use labctl::identity::GroupName;
use labctl::policy::admin::included_files;
use labctl::policy::{PolicyChecker, Verdict};
use labctl::provision::{AclOutcome, AclTool, GroupDatabase};
use labctl::{Error, Result};
use tempfile::TempDir;

/// Test environment with a scratch policy tree and shared root.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Configuration pointing every path into the temp dir
    pub config: Config,
    /// Directory holding mock executables
    pub bin_dir: PathBuf,
}

impl TestEnv {
    /// Create a policy tree with an empty `sudoers.d` and a main file including it.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = Config::rooted_at(temp_dir.path());

        fs::create_dir_all(&config.sudoers_dir).expect("Failed to create sudoers.d");
        fs::write(
            &config.sudoers_file,
            format!(
                "Defaults env_reset\nroot ALL=(ALL:ALL) ALL\n#includedir {}\n",
                config.sudoers_dir.display()
            ),
        )
        .expect("Failed to create sudoers");

        let bin_dir = temp_dir.path().join("bin");
        fs::create_dir_all(&bin_dir).expect("Failed to create bin dir");

        Self {
            _temp_dir: temp_dir,
            config,
            bin_dir,
        }
    }

    /// GID the test process can chown to without privileges.
    pub fn own_gid(&self) -> u32 {
        fs::metadata(self._temp_dir.path())
            .expect("Failed to stat temp dir")
            .gid()
    }

    pub fn grant_path(&self, group: &str) -> PathBuf {
        self.config.grant_path(&group_name(group))
    }

    /// Create an executable named `name` in `bin_dir` and return its path.
    pub fn mock_command(&self, name: &str) -> PathBuf {
        let path = self.bin_dir.join(name);
        create_mock_binary(&path);
        path
    }

    /// Files in the policy directory whose names contain `.bak.`.
    pub fn backups(&self) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = fs::read_dir(&self.config.backup_dir)
            .expect("Failed to read backup dir")
            .map(|e| e.expect("Failed to read entry").path())
            .filter(|p| p.to_string_lossy().contains(".bak."))
            .collect();
        found.sort();
        found
    }

    /// Every entry name in the policy directory, sorted.
    pub fn policy_dir_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.config.sudoers_dir)
            .expect("Failed to read sudoers dir")
            .map(|e| {
                e.expect("Failed to read entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }
}

pub fn group_name(name: &str) -> GroupName {
    GroupName::new(name).expect("valid group name")
}

/// Create a mock executable file.
pub fn create_mock_binary(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir for binary");
    }
    fs::write(path, "#!/bin/sh\necho mock\n").expect("Failed to create mock binary");

    let mut perms = fs::metadata(path).expect("Failed to get metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("Failed to set permissions");
}

/// Permission bits of `path`, setgid/sticky included.
pub fn mode_of(path: &Path) -> u32 {
    fs::metadata(path)
        .unwrap_or_else(|e| panic!("Failed to stat {}: {}", path.display(), e))
        .permissions()
        .mode()
        & 0o7777
}

/// Assert that a file contains expected content.
pub fn assert_file_contains(path: &Path, expected: &str) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));
    assert!(
        content.contains(expected),
        "File {} does not contain expected content.\nExpected to find: {}\nActual content: {}",
        path.display(),
        expected,
        content
    );
}

// =============================================================================
// Policy checker fakes
// =============================================================================

/// Line-level stand-in for `visudo -c`.
///
/// A line is accepted if it is blank, a comment, a `Defaults` entry, an
/// include directive, or a user/group spec of the form `<who> <host>=...`.
/// The tree check reads the main file plus every file `#includedir` would.
pub struct LintChecker {
    sudoers_file: PathBuf,
    sudoers_dir: PathBuf,
    /// Fragments containing any of these substrings are rejected.
    deny_fragments: Vec<String>,
    /// `check_tree` fails to run instead of giving a verdict.
    pub tree_unavailable: Cell<bool>,
    pub file_checks: Cell<usize>,
    pub tree_checks: Cell<usize>,
    /// Runs inside `check_tree` before linting, to simulate tampering.
    on_tree_check: RefCell<Option<Box<dyn FnMut()>>>,
}

impl LintChecker {
    pub fn new(config: &Config) -> Self {
        Self {
            sudoers_file: config.sudoers_file.clone(),
            sudoers_dir: config.sudoers_dir.clone(),
            deny_fragments: Vec::new(),
            tree_unavailable: Cell::new(false),
            file_checks: Cell::new(0),
            tree_checks: Cell::new(0),
            on_tree_check: RefCell::new(None),
        }
    }

    pub fn deny_fragments_containing(mut self, needle: &str) -> Self {
        self.deny_fragments.push(needle.to_string());
        self
    }

    pub fn on_tree_check(self, hook: impl FnMut() + 'static) -> Self {
        *self.on_tree_check.borrow_mut() = Some(Box::new(hook));
        self
    }

    fn lint(path: &Path, content: &str) -> Verdict {
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            let accepted = line.is_empty()
                || line.starts_with("#includedir")
                || line.starts_with("@includedir")
                || line.starts_with('#')
                || line.starts_with("Defaults")
                || is_user_spec(line);
            if !accepted {
                return Verdict::Invalid(format!(
                    "{}:{}: syntax error near line {}",
                    path.display(),
                    number + 1,
                    number + 1
                ));
            }
        }
        Verdict::Valid
    }
}

fn is_user_spec(line: &str) -> bool {
    let mut parts = line.splitn(2, char::is_whitespace);
    let who = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim_start();
    !who.is_empty() && rest.split_whitespace().next().map_or(false, |h| h.contains('='))
}

impl PolicyChecker for LintChecker {
    fn check_file(&self, path: &Path) -> Result<Verdict> {
        self.file_checks.set(self.file_checks.get() + 1);
        let content = fs::read_to_string(path).map_err(|e| Error::fs("read", path, e))?;
        if let Some(needle) = self.deny_fragments.iter().find(|n| content.contains(n.as_str())) {
            return Ok(Verdict::Invalid(format!(
                "{}: rejected fragment containing '{}'",
                path.display(),
                needle
            )));
        }
        Ok(Self::lint(path, &content))
    }

    fn check_tree(&self) -> Result<Verdict> {
        self.tree_checks.set(self.tree_checks.get() + 1);
        if let Some(hook) = self.on_tree_check.borrow_mut().as_mut() {
            hook();
        }
        if self.tree_unavailable.get() {
            return Err(Error::tool("visudo", "killed by signal 9"));
        }

        let mut files = vec![self.sudoers_file.clone()];
        files.extend(included_files(&self.sudoers_dir)?);
        for path in files {
            let content = fs::read_to_string(&path).map_err(|e| Error::fs("read", &path, e))?;
            if let Verdict::Invalid(diagnostics) = Self::lint(&path, &content) {
                return Ok(Verdict::Invalid(diagnostics));
            }
        }
        Ok(Verdict::Valid)
    }
}

// =============================================================================
// Group database and ACL fakes
// =============================================================================

/// In-memory group database. Created groups get `gid`.
pub struct FakeGroups {
    groups: RefCell<HashMap<String, u32>>,
    gid: u32,
    pub creates: Cell<usize>,
}

impl FakeGroups {
    pub fn new(gid: u32) -> Self {
        Self {
            groups: RefCell::new(HashMap::new()),
            gid,
            creates: Cell::new(0),
        }
    }

    pub fn with_group(self, name: &str, gid: u32) -> Self {
        self.groups.borrow_mut().insert(name.to_string(), gid);
        self
    }

    pub fn remove(&self, name: &str) {
        self.groups.borrow_mut().remove(name);
    }
}

impl GroupDatabase for FakeGroups {
    fn lookup(&self, name: &GroupName) -> Result<Option<u32>> {
        Ok(self.groups.borrow().get(name.as_str()).copied())
    }

    fn create(&self, name: &GroupName) -> Result<()> {
        self.creates.set(self.creates.get() + 1);
        self.groups
            .borrow_mut()
            .entry(name.to_string())
            .or_insert(self.gid);
        Ok(())
    }
}

/// Records every default-ACL request and answers with a fixed outcome.
pub struct RecordingAcl {
    pub calls: RefCell<Vec<(PathBuf, String)>>,
    outcome: AclOutcome,
}

impl RecordingAcl {
    pub fn applied() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            outcome: AclOutcome::Applied,
        }
    }

    pub fn unsupported() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            outcome: AclOutcome::Unsupported("Operation not supported".to_string()),
        }
    }
}

impl AclTool for RecordingAcl {
    fn set_default_group_rwx(&self, dir: &Path, group: &GroupName) -> Result<AclOutcome> {
        self.calls
            .borrow_mut()
            .push((dir.to_path_buf(), group.to_string()));
        Ok(self.outcome.clone())
    }
}
