//! Transactional grant installation.
//!
//! ```text
//! Proposed -> IsolatedValidated -> BackedUp -> Installed -> CompositeValidated
//!                                     |            |
//!                                     +------------+--> RolledBack
//! ```
//!
//! The [`Transaction`] value carries everything needed to undo the install
//! (prior content or its absence, the backup path, the target, the staged
//! temp file) and [`Transaction::abort`] is the one exit for every failure
//! after the backup step. An isolated-check failure never reaches it: nothing
//! has been written at that point.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result, Rollback};
use crate::identity::GroupName;

use super::render::{Grant, PolicyText};
use super::validate::{validate, validate_composite, PolicyChecker, Verdict};
use super::GRANT_MODE;

/// Separator between a grant file name and its backup timestamp.
pub const BACKUP_MARKER: &str = ".bak.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Proposed,
    IsolatedValidated,
    BackedUp,
    Installed,
    CompositeValidated,
    RolledBack,
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub group: GroupName,
    pub target: PathBuf,
    /// Backup of the previous grant file, if there was one.
    pub backup: Option<PathBuf>,
    /// The policy line now in effect.
    pub line: String,
    /// The previous grant file already had exactly this content.
    pub unchanged: bool,
}

#[derive(Debug)]
enum Prior {
    Absent,
    Saved { backup: PathBuf, content: Vec<u8> },
}

/// Why a transaction is being aborted.
enum Failure {
    /// The composite check rejected the installed tree.
    Composite(String),
    /// Anything else: a filesystem step or the checker itself failed.
    Other(Error),
}

#[derive(Debug)]
struct FsFailure {
    op: &'static str,
    path: PathBuf,
    source: io::Error,
}

impl From<FsFailure> for Error {
    fn from(f: FsFailure) -> Self {
        Error::Filesystem {
            op: f.op,
            path: f.path,
            source: f.source,
        }
    }
}

#[derive(Debug)]
struct Transaction {
    target: PathBuf,
    prior: Prior,
    staged: Option<PathBuf>,
    stage: Stage,
}

impl Transaction {
    fn propose(target: PathBuf) -> Self {
        Self {
            target,
            prior: Prior::Absent,
            staged: None,
            stage: Stage::Proposed,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!(file = %self.target.display(), from = ?self.stage, to = ?next, "transaction");
        self.stage = next;
    }

    /// Copy the current grant file aside. No file means nothing to back up.
    fn back_up(&mut self, backup_dir: &Path) -> Result<()> {
        let content = match fs::read(&self.target) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(file = %self.target.display(), "no prior grant file");
                self.prior = Prior::Absent;
                self.advance(Stage::BackedUp);
                return Ok(());
            }
            Err(e) => return Err(Error::fs("read", &self.target, e)),
        };

        fs::create_dir_all(backup_dir).map_err(|e| Error::fs("create", backup_dir, e))?;
        let backup = write_backup(backup_dir, &self.target, &content)?;
        info!("backed up {} to {}", self.target.display(), backup.display());

        self.prior = Prior::Saved { backup, content };
        self.advance(Stage::BackedUp);
        Ok(())
    }

    fn prior_matches(&self, content: &[u8]) -> bool {
        matches!(&self.prior, Prior::Saved { content: prior, .. } if prior.as_slice() == content)
    }

    fn backup(&self) -> Option<&Path> {
        match &self.prior {
            Prior::Saved { backup, .. } => Some(backup),
            Prior::Absent => None,
        }
    }

    fn install(&mut self, content: &[u8]) -> Result<()> {
        let mut staged_slot = None;
        let result = write_atomically(&self.target, content, |path| {
            staged_slot = Some(path.to_path_buf());
        });
        self.staged = staged_slot;
        let staged = result?;
        info!("installed {}", self.target.display());
        debug!(staged = %staged.display(), "renamed into place");
        self.advance(Stage::Installed);
        Ok(())
    }

    /// Put the target back the way it was before this transaction.
    fn roll_back(&mut self) -> std::result::Result<Rollback, FsFailure> {
        let rollback = match &self.prior {
            Prior::Saved { backup, content } => {
                write_atomically(&self.target, content, |_| {})?;
                Rollback::Restored {
                    target: self.target.clone(),
                    backup: backup.clone(),
                }
            }
            Prior::Absent => {
                match fs::remove_file(&self.target) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(source) => {
                        return Err(FsFailure {
                            op: "remove",
                            path: self.target.clone(),
                            source,
                        })
                    }
                }
                Rollback::Removed {
                    target: self.target.clone(),
                }
            }
        };
        self.advance(Stage::RolledBack);
        Ok(rollback)
    }

    /// Single failure exit once the backup step has run.
    fn abort(&mut self, failure: Failure) -> Error {
        debug_assert!(self.stage != Stage::Proposed && self.stage != Stage::IsolatedValidated);

        match self.roll_back() {
            Ok(rollback) => {
                warn!("rolled back: {}", rollback);
                match failure {
                    Failure::Composite(diagnostics) => Error::CompositeSyntax {
                        diagnostics,
                        rollback,
                    },
                    Failure::Other(err) => err,
                }
            }
            Err(f) => {
                let diagnostics = match failure {
                    Failure::Composite(diagnostics) => diagnostics,
                    Failure::Other(err) => err.to_string(),
                };
                error!(
                    file = %self.target.display(),
                    path = %f.path.display(),
                    staged = ?self.staged,
                    "rollback failed: {}; manual intervention required",
                    f.source
                );
                Error::RollbackFailed {
                    target: self.target.clone(),
                    path: f.path,
                    diagnostics,
                    source: f.source,
                }
            }
        }
    }
}

/// Write `content` next to `target` under a dotted temporary name, then
/// rename it over `target`. The target never holds partial content.
///
/// `on_staged` sees the temporary path before anything is written to it.
fn write_atomically(
    target: &Path,
    content: &[u8],
    on_staged: impl FnOnce(&Path),
) -> std::result::Result<PathBuf, FsFailure> {
    let dir = target.parent().unwrap_or_else(|| Path::new("/"));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Leading dot and embedded dots: sudo's #includedir never reads it
    let mut staged = tempfile::Builder::new()
        .prefix(&format!(".{}.", name))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|source| FsFailure {
            op: "create temporary file in",
            path: dir.to_path_buf(),
            source,
        })?;
    let staged_path = staged.path().to_path_buf();
    on_staged(&staged_path);

    staged
        .write_all(content)
        .and_then(|_| staged.as_file().sync_all())
        .map_err(|source| FsFailure {
            op: "write",
            path: staged_path.clone(),
            source,
        })?;
    staged
        .as_file()
        .set_permissions(fs::Permissions::from_mode(GRANT_MODE))
        .map_err(|source| FsFailure {
            op: "chmod",
            path: staged_path.clone(),
            source,
        })?;

    staged.persist(target).map_err(|e| FsFailure {
        op: "rename",
        path: staged_path.clone(),
        source: e.error,
    })?;
    Ok(staged_path)
}

/// Write a new `<name>.bak.<timestamp>[-N]` file; never overwrites an older backup.
fn write_backup(backup_dir: &Path, target: &Path, content: &[u8]) -> Result<PathBuf> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Local::now().format("%Y%m%d%H%M%S").to_string();

    for attempt in 0u32.. {
        let candidate = if attempt == 0 {
            backup_dir.join(format!("{}{}{}", name, BACKUP_MARKER, stamp))
        } else {
            backup_dir.join(format!("{}{}{}-{}", name, BACKUP_MARKER, stamp, attempt))
        };

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(GRANT_MODE)
            .open(&candidate)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(Error::fs("create backup", &candidate, e)),
        };

        if let Err(e) = file.write_all(content).and_then(|_| file.sync_all()) {
            // A truncated backup is worse than none: it would be restored as-is
            drop(file);
            let _ = fs::remove_file(&candidate);
            return Err(Error::fs("write backup", &candidate, e));
        }
        return Ok(candidate);
    }
    Err(Error::fs(
        "create backup in",
        backup_dir,
        io::Error::new(io::ErrorKind::AlreadyExists, "no free backup name"),
    ))
}

/// Runs grants through validate, back up, install, re-validate.
pub struct Installer<C> {
    config: Config,
    checker: C,
}

impl<C: PolicyChecker> Installer<C> {
    pub fn new(config: Config, checker: C) -> Self {
        Self { config, checker }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn checker(&self) -> &C {
        &self.checker
    }

    /// Render and install a grant.
    ///
    /// A group holding full privilege through labctl (the configured admin
    /// group, or any group whose grant file carries the full-privilege line)
    /// is refused with `AdminGroupGrant` before anything is checked or written.
    pub fn install_grant(&self, grant: &Grant) -> Result<InstallReport> {
        self.refuse_full_admin_overwrite(&grant.group)?;
        let text = grant.render()?;
        self.install(&grant.group, &text)
    }

    /// Install already-rendered text as the grant file for `group`.
    ///
    /// Identical content is still re-validated and reinstalled; the report's
    /// `unchanged` flag tells the caller it happened.
    pub fn install(&self, group: &GroupName, text: &PolicyText) -> Result<InstallReport> {
        let mut tx = Transaction::propose(self.config.grant_path(group));

        match validate(&self.checker, text)? {
            Verdict::Valid => tx.advance(Stage::IsolatedValidated),
            Verdict::Invalid(diagnostics) => {
                warn!(group = %group, "fragment rejected by isolated check; nothing written");
                return Err(Error::IsolatedSyntax { diagnostics });
            }
        }

        tx.back_up(&self.config.backup_dir)?;
        let unchanged = tx.prior_matches(text.as_bytes());

        if let Err(err) = tx.install(text.as_bytes()) {
            return Err(tx.abort(Failure::Other(err)));
        }

        match validate_composite(&self.checker) {
            Ok(Verdict::Valid) => tx.advance(Stage::CompositeValidated),
            Ok(Verdict::Invalid(diagnostics)) => {
                return Err(tx.abort(Failure::Composite(diagnostics)))
            }
            // No verdict on the live tree is not a pass
            Err(err) => return Err(tx.abort(Failure::Other(err))),
        }

        Ok(InstallReport {
            group: group.clone(),
            backup: tx.backup().map(Path::to_path_buf),
            target: tx.target,
            line: text.line().to_string(),
            unchanged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomically_sets_mode_and_leaves_no_temp() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("grp-blue-team");

        let staged = write_atomically(&target, b"%blue-team ALL=(root) /usr/bin/id\n", |_| {})
            .unwrap();

        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "%blue-team ALL=(root) /usr/bin/id\n"
        );
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o440, "grant file mode should be 440, got {:o}", mode);
        assert!(!staged.exists());

        let name = staged.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".grp-blue-team."));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_backup_names_never_collide() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("grp-blue-team");

        let first = write_backup(temp.path(), &target, b"one").unwrap();
        let second = write_backup(temp.path(), &target, b"two").unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read(&first).unwrap(), b"one");
        assert_eq!(fs::read(&second).unwrap(), b"two");
        for backup in [&first, &second] {
            let name = backup.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("grp-blue-team.bak."), "unexpected name {}", name);
        }
    }

    #[test]
    fn test_roll_back_without_prior_removes_target() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("grp-x");
        let mut tx = Transaction::propose(target.clone());
        tx.advance(Stage::IsolatedValidated);
        tx.back_up(temp.path()).unwrap();
        tx.install(b"%x ALL=(root) /usr/bin/id\n").unwrap();
        assert!(target.exists());

        let rollback = tx.roll_back().unwrap();
        assert_eq!(rollback, Rollback::Removed { target: target.clone() });
        assert!(!target.exists());
        assert_eq!(tx.stage, Stage::RolledBack);
    }

    #[test]
    fn test_roll_back_restores_prior_bytes() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("grp-x");
        fs::write(&target, b"%x ALL=(root) /usr/bin/id\n").unwrap();

        let mut tx = Transaction::propose(target.clone());
        tx.advance(Stage::IsolatedValidated);
        tx.back_up(temp.path()).unwrap();
        assert!(tx.backup().is_some());
        tx.install(b"%x ALL=(root) /usr/bin/whoami\n").unwrap();

        match tx.roll_back().unwrap() {
            Rollback::Restored { backup, .. } => assert!(backup.exists()),
            other => panic!("expected restore, got {:?}", other),
        }
        assert_eq!(fs::read(&target).unwrap(), b"%x ALL=(root) /usr/bin/id\n");
    }

    #[test]
    fn test_install_into_missing_directory_names_the_path() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("missing/grp-x");
        let mut tx = Transaction::propose(target);

        match tx.install(b"x\n").unwrap_err() {
            Error::Filesystem { path, .. } => assert!(path.ends_with("missing")),
            other => panic!("expected filesystem error, got {:?}", other),
        }
    }
}
