//! Resolver targets and registration state.

use std::fmt;
use std::path::{Path, PathBuf};

/// The kind of configuration surface a target is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetKind {
    /// A per-suffix file under a resolver directory (`/etc/resolver/<suffix>`).
    /// Scoped to the suffix only.
    ResolverDirectoryEntry,
    /// Lines in the shared hosts file. Global: a bad edit affects every
    /// lookup on the machine.
    HostsFileEntry,
}

impl TargetKind {
    /// Returns `true` for mechanisms shared by all hostnames.
    #[must_use]
    pub const fn is_global(self) -> bool {
        matches!(self, Self::HostsFileEntry)
    }

    /// Short name used in logs and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResolverDirectoryEntry => "resolver",
            Self::HostsFileEntry => "hosts",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configuration file participating in name resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolverTarget {
    /// What the file is.
    pub kind: TargetKind,
    /// Where it lives.
    pub path: PathBuf,
}

impl ResolverTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(kind: TargetKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Returns the target path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ResolverTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.kind)
    }
}

/// Whether one target carries the suffix entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Every configured line is there (for a resolver file: nothing else).
    Present,
    /// Nothing in the target routes the suffix.
    Absent,
    /// The target still routes the suffix, but not with the configured
    /// entry: a hostname line from an earlier `--host`, or a resolver file
    /// written with another address or port.
    Stale,
}

impl EntryState {
    /// Lower-case name used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Stale => "stale",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration state across every target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// No target carries the entry.
    Absent,
    /// Every target carries the entry.
    Present,
    /// Targets disagree. Never a valid end state.
    Partial,
}

impl RegistrationState {
    /// Classifies a set of per-target states.
    ///
    /// An empty set is `Absent`. Any [`EntryState::Stale`] target makes the
    /// set `Partial`: it is neither registered nor cleanly removed.
    pub fn classify(states: impl IntoIterator<Item = EntryState>) -> Self {
        let (mut present, mut absent) = (false, false);
        for state in states {
            match state {
                EntryState::Present => present = true,
                EntryState::Absent => absent = true,
                EntryState::Stale => return Self::Partial,
            }
        }
        match (present, absent) {
            (true, true) => Self::Partial,
            (true, false) => Self::Present,
            (false, _) => Self::Absent,
        }
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Absent => "absent",
            Self::Present => "present",
            Self::Partial => "partial",
        })
    }
}
