//! Installed grant inventory for `labctl show grants`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::policy::install::BACKUP_MARKER;

/// One installed grant file and its backups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantStatus {
    pub group: String,
    pub path: PathBuf,
    /// First non-comment line of the file, if any.
    pub line: Option<String>,
    pub backups: usize,
    pub latest_backup: Option<PathBuf>,
}

/// List every `<prefix><group>` file in the policy directory.
pub fn scan_grants(config: &Config) -> Result<Vec<GrantStatus>> {
    let backups = list_backups(&config.backup_dir)?;

    let mut grants = Vec::new();
    for path in list_dir(&config.sudoers_dir)? {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let Some(group) = name.strip_prefix(&config.grant_prefix) else {
            continue;
        };
        if group.is_empty() || name.contains('.') {
            continue;
        }

        let content = fs::read_to_string(&path).map_err(|e| Error::fs("read", &path, e))?;
        let line = content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string);

        let marker = format!("{}{}", name, BACKUP_MARKER);
        let mut own: Vec<(BackupOrder, &PathBuf)> = backups
            .iter()
            .filter_map(|b| {
                let file_name = b.file_name()?.to_string_lossy();
                let stamp = file_name.strip_prefix(&marker)?;
                Some((backup_order(stamp), b))
            })
            .collect();
        own.sort();

        grants.push(GrantStatus {
            group: group.to_string(),
            line,
            backups: own.len(),
            latest_backup: own.last().map(|(_, p)| (*p).clone()),
            path,
        });
    }
    Ok(grants)
}

type BackupOrder = (String, u32);

/// Sort key for `<stamp>[-N]`; a same-second collision suffix counts numerically.
fn backup_order(stamp: &str) -> BackupOrder {
    match stamp.split_once('-') {
        Some((time, n)) => (time.to_string(), n.parse().unwrap_or(0)),
        None => (stamp.to_string(), 0),
    }
}

fn list_backups(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(list_dir(dir)?
        .into_iter()
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().contains(BACKUP_MARKER))
                .unwrap_or(false)
        })
        .collect())
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
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
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Print a human-readable table.
pub fn print(grants: &[GrantStatus]) {
    if grants.is_empty() {
        println!("No labctl grants installed.");
        return;
    }
    for grant in grants {
        println!("{} ({})", grant.group, grant.path.display());
        match &grant.line {
            Some(line) => println!("  {}", line),
            None => println!("  (no policy line)"),
        }
        match &grant.latest_backup {
            Some(latest) => println!("  {} backup(s), latest {}", grant.backups, latest.display()),
            None => println!("  no backups"),
        }
    }
}
