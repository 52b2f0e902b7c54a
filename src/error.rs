//! Error types.

use crate::engine::RegistrationReport;
use crate::target::{RegistrationState, TargetKind};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias for registration operations.
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Errors returned by registration operations.
///
/// None of these are retried: every operation is safe to re-run once the
/// underlying condition is fixed.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Neither a resolver directory nor a hosts file was found.
    #[error("unsupported platform: no resolver directory or hosts file found")]
    UnsupportedPlatform,

    /// The suffix is not a single DNS label.
    #[error("invalid suffix {suffix:?}: {reason}")]
    InvalidSuffix {
        /// The rejected input.
        suffix: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The directory that should hold a target file does not exist.
    #[error("target directory missing: {}", .path.display())]
    TargetDirectoryMissing {
        /// The missing directory.
        path: PathBuf,
    },

    /// Insufficient rights to read or replace a target file.
    #[error("permission denied: {} (re-run with elevated rights)", .path.display())]
    PermissionDenied {
        /// The file that could not be written.
        path: PathBuf,
    },

    /// Any other filesystem failure.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The target exists but is not line-oriented text.
    #[error("malformed content in {}: {reason}", .path.display())]
    MalformedExistingContent {
        /// The unreadable file.
        path: PathBuf,
        /// What made it unparseable.
        reason: String,
    },

    /// A resolver file for the suffix exists with content this crate did not
    /// write.
    #[error("resolver file not managed by dottest: {}", .path.display())]
    ForeignResolverFile {
        /// The foreign file.
        path: PathBuf,
    },

    /// A cache-flush command failed after a successful edit.
    #[error("reload failed for {kind} ({command}): {reason}")]
    ReloadFailed {
        /// The target kind whose reload failed.
        kind: TargetKind,
        /// The command line that was run.
        command: String,
        /// Exit status and captured stderr, or the spawn error.
        reason: String,
    },

    /// Re-reading the targets after the edit did not show the intended state.
    /// The report carries the state each target was found in.
    #[error("verification mismatch: expected {expected}, observed {observed}")]
    VerificationMismatch {
        /// The state the operation drove towards.
        expected: RegistrationState,
        /// The state actually found on disk.
        observed: RegistrationState,
        /// Per-target edits, reloads and re-read states.
        report: Box<RegistrationReport>,
    },

    /// At least one target could not be edited. The report lists every
    /// target's result so the remaining ones can be completed by hand.
    #[error(
        "failed to update {} of {} resolver targets",
        .0.failed_count(),
        .0.targets.len()
    )]
    EditFailed(Box<RegistrationReport>),
}

impl ResolverError {
    /// Wraps an I/O error, promoting `PermissionDenied` to its own variant.
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Returns `true` if a target could not be accessed for lack of rights.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::PermissionDenied { .. } => true,
            Self::Io { source, .. } => {
                source.kind() == std::io::ErrorKind::PermissionDenied
            }
            Self::EditFailed(report) => report.failures().any(Self::is_permission_denied),
            _ => false,
        }
    }

    /// The per-target report, for errors raised after targets were edited.
    #[must_use]
    pub fn report(&self) -> Option<&RegistrationReport> {
        match self {
            Self::EditFailed(report) | Self::VerificationMismatch { report, .. } => {
                Some(&**report)
            }
            _ => None,
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidSuffix { .. } => 2,
            Self::VerificationMismatch { .. } => 3,
            Self::ReloadFailed { .. } => 4,
            _ => 1,
        }
    }
}
