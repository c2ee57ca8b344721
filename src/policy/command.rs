//! Command resolution.
//!
//! Operators type command names; grants store absolute paths. Resolution
//! happens once, when the grant is built, so the installed policy never
//! depends on whatever `PATH` sudo happens to see later.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Characters that are structural in a sudoers command list.
const UNSAFE_CHARS: &[char] = &[',', ':', '=', '\\', '#', '"', '!', '(', ')'];

/// An absolute path to an executable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandRef(PathBuf);

impl CommandRef {
    /// Wrap an absolute path.
    ///
    /// The path is not checked for existence; it is checked for being
    /// absolute and for not containing characters that would change the
    /// meaning of the rendered grant line.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(Error::UnresolvedCommand {
                name: path.to_string_lossy().into_owned(),
            });
        }
        let text = path.to_string_lossy();
        if text.chars().any(|c| c.is_whitespace() || c.is_control() || UNSAFE_CHARS.contains(&c)) {
            return Err(Error::UnsafeCommandPath { path });
        }
        Ok(Self(path))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for CommandRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Ordered set of commands: insertion order is kept, repeats are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSet {
    order: Vec<CommandRef>,
    seen: HashSet<CommandRef>,
}

impl CommandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command unless it is already present. Returns true if added.
    pub fn insert(&mut self, command: CommandRef) -> bool {
        if self.seen.contains(&command) {
            return false;
        }
        self.seen.insert(command.clone());
        self.order.push(command);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandRef> {
        self.order.iter()
    }
}

impl FromIterator<CommandRef> for CommandSet {
    fn from_iter<I: IntoIterator<Item = CommandRef>>(iter: I) -> Self {
        let mut set = CommandSet::new();
        for command in iter {
            set.insert(command);
        }
        set
    }
}

/// Maps command names to absolute executable paths.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    /// Explicit search path; `None` means the process `PATH`.
    search_path: Option<OsString>,
}

impl Resolver {
    /// Resolver over the process `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver over an explicit `PATH`-style search list.
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    /// Resolve a name or absolute path to a [`CommandRef`].
    ///
    /// Absolute paths pass through unchanged. Anything else is looked up on
    /// the search path; a name that contains a `/` but is not absolute is
    /// refused rather than resolved against the current directory.
    pub fn resolve(&self, name: &str) -> Result<CommandRef> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::UnresolvedCommand {
                name: name.to_string(),
            });
        }

        let candidate = Path::new(name);
        if candidate.is_absolute() {
            return CommandRef::new(candidate);
        }
        if name.contains('/') {
            return Err(Error::UnresolvedCommand {
                name: name.to_string(),
            });
        }

        let search_path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))
            .unwrap_or_default();

        let found = which::which_in(name, Some(search_path), "/").map_err(|_| {
            Error::UnresolvedCommand {
                name: name.to_string(),
            }
        })?;
        CommandRef::new(found)
    }

    /// Resolve every name, failing on the first unresolved one.
    pub fn resolve_all<I, S>(&self, names: I) -> Result<CommandSet>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = CommandSet::new();
        for name in names {
            set.insert(self.resolve(name.as_ref())?);
        }
        Ok(set)
    }
}
