//! Detection of the active resolver mechanism.
//!
//! The resolver directory is always preferred over the hosts file: it is
//! scoped to one suffix, while a hosts edit is visible to every lookup.

use crate::config::RegistrationConfig;
use crate::entry::{ManagedEntry, read_target};
use crate::error::{ResolverError, Result};
use crate::suffix::Suffix;
use crate::target::{EntryState, ResolverTarget, TargetKind};

/// Operating system family, used to pick reload commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// macOS: resolver caches are flushed through `mDNSResponder`.
    MacOs,
    /// Linux: files are read on the next lookup, nothing to reload.
    Linux,
    /// Any other unix. Treated like Linux.
    Other,
}

impl Platform {
    /// The platform this binary was built for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::Other
        }
    }
}

/// Finds the resolver targets to edit and reads their current state.
#[derive(Debug, Clone)]
pub struct PlatformProbe {
    config: RegistrationConfig,
}

impl PlatformProbe {
    /// Creates a probe over the paths in `config`.
    #[must_use]
    pub const fn new(config: RegistrationConfig) -> Self {
        Self { config }
    }

    /// Returns the targets for `suffix`, resolver directory first.
    ///
    /// The hosts file is used when no resolver directory exists, or in
    /// addition to it when `hosts_alongside` is set. A configured kind
    /// filter is applied last.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::UnsupportedPlatform`] if no target remains.
    pub fn detect_targets(&self, suffix: &Suffix) -> Result<Vec<ResolverTarget>> {
        let mut targets = Vec::with_capacity(2);

        let resolver_dir = &self.config.resolver_dir;
        let has_resolver_dir = resolver_dir.is_dir();
        if has_resolver_dir {
            targets.push(ResolverTarget::new(
                TargetKind::ResolverDirectoryEntry,
                resolver_dir.join(suffix.as_str()),
            ));
        }

        let hosts_file = &self.config.hosts_file;
        if hosts_file.is_file() && (!has_resolver_dir || self.config.hosts_alongside) {
            if !has_resolver_dir {
                tracing::warn!(
                    path = %hosts_file.display(),
                    "No resolver directory, falling back to the hosts file (affects all hostnames)"
                );
            }
            targets.push(ResolverTarget::new(TargetKind::HostsFileEntry, hosts_file));
        }

        if let Some(kind) = self.config.kind {
            targets.retain(|t| t.kind == kind);
        }

        if targets.is_empty() {
            return Err(ResolverError::UnsupportedPlatform);
        }
        tracing::debug!(suffix = %suffix, count = targets.len(), "Detected resolver targets");
        Ok(targets)
    }

    /// Reports whether `target` currently carries the entry for `suffix`.
    ///
    /// A missing file is [`EntryState::Absent`]. A target that still routes
    /// the suffix with other hostnames, another address or another port is
    /// [`EntryState::Stale`].
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::MalformedExistingContent`] for non-text
    /// files, or the I/O error hit while reading.
    pub fn read_current_entry(
        &self,
        target: &ResolverTarget,
        suffix: &Suffix,
    ) -> Result<EntryState> {
        let entry = ManagedEntry::new(target.kind, suffix, &self.config);
        Ok(read_target(&target.path)?
            .map_or(EntryState::Absent, |content| entry.state_in(&content)))
    }
}
