//! Full administrative privilege for the designated admin group.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::identity::GroupName;

use super::install::{InstallReport, Installer};
use super::render::{full_admin_line, render_full_admin};
use super::validate::PolicyChecker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminOutcome {
    /// The line is already in effect; nothing was written.
    AlreadyPresent { path: PathBuf },
    Installed(InstallReport),
}

impl<C: PolicyChecker> Installer<C> {
    /// Make sure `%<group> ALL=(ALL:ALL) ALL` is in effect.
    ///
    /// Looks in the main sudoers file and in every file sudo reads from the
    /// policy directory. If the line is missing it goes through the normal
    /// install pipeline as the group's grant file.
    pub fn ensure_full_admin(&self, group: &GroupName) -> Result<AdminOutcome> {
        let line = full_admin_line(group);
        if let Some(path) = find_policy_line(
            &self.config().sudoers_file,
            &self.config().sudoers_dir,
            &line,
        )? {
            info!("{} already present in {}", line, path.display());
            return Ok(AdminOutcome::AlreadyPresent { path });
        }

        let report = self.install(group, &render_full_admin(group))?;
        Ok(AdminOutcome::Installed(report))
    }

    /// Refuse a command grant that would replace a full-privilege grant file.
    ///
    /// Both live at `<prefix><group>`, so installing one over the other
    /// would silently strip the group of full privilege.
    pub(super) fn refuse_full_admin_overwrite(&self, group: &GroupName) -> Result<()> {
        if group == &self.config().admin_group {
            return Err(Error::AdminGroupGrant {
                group: group.to_string(),
            });
        }

        let path = self.config().grant_path(group);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::fs("read", &path, e)),
        };
        let wanted = normalize(&full_admin_line(group));
        if content.lines().any(|l| normalize(l) == wanted) {
            return Err(Error::AdminGroupGrant {
                group: group.to_string(),
            });
        }
        Ok(())
    }
}

/// Files in `dir` that sudo's `#includedir` would read.
///
/// sudo skips names ending in `~` or containing a `.`, which is also what
/// keeps backups and staged temp files out of the live policy.
pub fn included_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let source = e
                .into_io_error()
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "directory walk failed"));
            Error::fs("list", dir, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.ends_with('~') || name.contains('.') {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

/// Find a file containing `line` (compared with whitespace collapsed).
fn find_policy_line(sudoers_file: &Path, sudoers_dir: &Path, line: &str) -> Result<Option<PathBuf>> {
    let wanted = normalize(line);

    let mut candidates = Vec::new();
    if sudoers_file.is_file() {
        candidates.push(sudoers_file.to_path_buf());
    }
    candidates.extend(included_files(sudoers_dir)?);

    for path in candidates {
        let content = fs::read_to_string(&path).map_err(|e| Error::fs("read", &path, e))?;
        if content.lines().any(|l| normalize(l) == wanted) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn normalize(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}
