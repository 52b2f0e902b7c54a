//! # dottest
//!
//! Route a custom top-level domain such as `.test` to localhost for local
//! development, without hand-editing system files.
//!
//! The crate registers the suffix with the operating system's resolver
//! configuration and removes it again cleanly. Two mechanisms are supported,
//! detected in a fixed order:
//!
//! 1. **Resolver directory** (`/etc/resolver/<suffix>`): one file per suffix
//!    containing `nameserver 127.0.0.1`. Scoped to the suffix; preferred.
//! 2. **Hosts file** (`/etc/hosts`): `127.0.0.1 <suffix>` lines appended to
//!    the shared file. Global, used only when no resolver directory exists
//!    (or when explicitly requested in addition).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use dottest::{RegistrationConfig, RegistrationEngine, Suffix};
//!
//! let engine = RegistrationEngine::new(RegistrationConfig::new());
//! let suffix = Suffix::parse("test")?;
//!
//! // Requires root.
//! let report = engine.install(&suffix)?;
//! assert_eq!(engine.status(&suffix)?.state, dottest::RegistrationState::Present);
//!
//! engine.uninstall(&suffix)?;
//! ```
//!
//! ## Guarantees
//!
//! - Installing twice, or uninstalling an absent suffix, writes nothing.
//! - Edits replace files atomically through a temp file and `rename`; a
//!   failed write never truncates the original.
//! - Only whole lines managed by this crate are added or removed.
//!   `127.0.0.1 nottest.example` is never mistaken for the `test` entry.
//! - Install followed by uninstall leaves every file byte-identical.
//! - Uninstall removes every two-token loopback line for the suffix or a
//!   name under it, and any resolver file of `nameserver`/`port` lines
//!   pointing at loopback, whatever flags were used to install.
//! - After every edit the targets are re-read. A target that does not show
//!   the intended state fails the call with
//!   [`ResolverError::VerificationMismatch`], carrying the per-target report.
//!
//! ## Verification
//!
//! On macOS the resolver cache is flushed after an edit (`dscacheutil
//! -flushcache`, `killall -HUP mDNSResponder`). Check the result with:
//!
//! ```bash
//! scutil --dns
//! dscacheutil -q host -a name app.test
//! ```
//!
//! ## Permissions
//!
//! Writing `/etc/resolver/` or `/etc/hosts` requires root. Cache flush
//! commands are run through `sudo` when the process is not already root.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod command;
pub mod config;
pub mod editor;
pub(crate) mod entry;
pub mod engine;
pub mod error;
pub mod probe;
pub mod reload;
pub mod suffix;
pub mod target;
pub mod util;

pub use command::{CommandOutput, CommandRequest, CommandRunner, SystemRunner};
pub use config::RegistrationConfig;
pub use editor::{ConfigEditor, EditResult};
pub use engine::{Action, Phase, RegistrationEngine, RegistrationReport, StatusReport, TargetReport};
pub use error::{ResolverError, Result};
pub use probe::{Platform, PlatformProbe};
pub use reload::{ReloadOutcome, ServiceReloader};
pub use suffix::Suffix;
pub use target::{EntryState, RegistrationState, ResolverTarget, TargetKind};
