//! Install/uninstall orchestration.
//!
//! One invocation walks `Probing → Checking → Editing → Reloading →
//! Verifying → Done`, or stops in `Failed`. Nothing is kept between
//! invocations: the configuration files are the only state.

use crate::command::{CommandRunner, SystemRunner};
use crate::config::RegistrationConfig;
use crate::editor::{ConfigEditor, EditResult};
use crate::error::{ResolverError, Result};
use crate::probe::{Platform, PlatformProbe};
use crate::reload::{ReloadOutcome, ServiceReloader};
use crate::suffix::Suffix;
use crate::target::{EntryState, RegistrationState, ResolverTarget, TargetKind};
use std::collections::BTreeSet;
use std::fmt;

/// What an invocation is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Route the suffix on every target.
    Install,
    /// Remove every trace of the suffix from every target.
    Uninstall,
}

impl Action {
    /// The registration state the action drives towards.
    #[must_use]
    pub const fn intended_state(self) -> RegistrationState {
        match self {
            Self::Install => RegistrationState::Present,
            Self::Uninstall => RegistrationState::Absent,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
        })
    }
}

/// Steps of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Detecting which targets exist.
    Probing,
    /// Reading each target's current entry.
    Checking,
    /// Writing or removing entries.
    Editing,
    /// Flushing resolver caches for edited kinds.
    Reloading,
    /// Re-reading the targets.
    Verifying,
    /// Terminal: the intended state was observed.
    Done,
    /// Terminal: an error was returned.
    Failed,
}

/// Result for a single target.
#[derive(Debug)]
pub struct TargetReport {
    /// The edited target.
    pub target: ResolverTarget,
    /// State found during checking.
    pub before: EntryState,
    /// What the editor did.
    pub edit: EditResult,
    /// `None` when the target was not edited or its kind was already
    /// reloaded for another target.
    pub reload: Option<ReloadOutcome>,
    /// State found when the targets were re-read. `None` if they could not
    /// be.
    pub after: Option<EntryState>,
}

/// Per-target results of an install or uninstall.
#[derive(Debug)]
pub struct RegistrationReport {
    /// The requested action.
    pub action: Action,
    /// The suffix acted on.
    pub suffix: Suffix,
    /// One entry per detected target, in detection order.
    pub targets: Vec<TargetReport>,
    /// State observed after the last step that ran.
    pub state: RegistrationState,
}

impl RegistrationReport {
    /// Errors of failed edits.
    pub fn failures(&self) -> impl Iterator<Item = &ResolverError> {
        self.targets.iter().filter_map(|t| match &t.edit {
            EditResult::Failed(e) => Some(e),
            _ => None,
        })
    }

    /// Errors of failed reloads.
    pub fn reload_failures(&self) -> impl Iterator<Item = &ResolverError> {
        self.targets.iter().filter_map(|t| match &t.reload {
            Some(ReloadOutcome::Failed(e)) => Some(e),
            _ => None,
        })
    }

    /// Number of failed edits.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// `true` if no target was written.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.targets
            .iter()
            .all(|t| matches!(t.edit, EditResult::Unchanged))
    }

    /// `true` when every edit and every reload succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none() && self.reload_failures().next().is_none()
    }

    /// Targets whose re-read state is not the one the action intended.
    pub fn drifted(&self) -> impl Iterator<Item = &TargetReport> {
        let wanted = match self.action {
            Action::Install => EntryState::Present,
            Action::Uninstall => EntryState::Absent,
        };
        self.targets
            .iter()
            .filter(move |t| t.after.is_some_and(|state| state != wanted))
    }

    /// Targets on a global mechanism (the hosts file).
    pub fn global_targets(&self) -> impl Iterator<Item = &ResolverTarget> {
        self.targets
            .iter()
            .map(|t| &t.target)
            .filter(|t| t.kind.is_global())
    }
}

impl fmt::Display for RegistrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} .{}: {}", self.action, self.suffix, self.state)?;
        for t in &self.targets {
            write!(
                f,
                "  {:<8} {}  {}",
                t.target.kind,
                t.target.path.display(),
                t.edit
            )?;
            if let Some(reload) = &t.reload {
                write!(f, ", {reload}")?;
            }
            if let Some(after) = t.after {
                write!(f, ", now {after}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for EditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => f.write_str("unchanged"),
            Self::Applied => f.write_str("applied"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

impl fmt::Display for ReloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reloaded => f.write_str("reloaded"),
            Self::NotRequired => f.write_str("no reload needed"),
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

/// Current state of a suffix, without changing anything.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// The suffix inspected.
    pub suffix: Suffix,
    /// Each detected target with its current entry state.
    pub targets: Vec<(ResolverTarget, EntryState)>,
    /// The classified state across targets.
    pub state: RegistrationState,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ".{}: {}", self.suffix, self.state)?;
        for (target, state) in &self.targets {
            writeln!(f, "  {:<8} {}  {state}", target.kind, target.path.display())?;
        }
        Ok(())
    }
}

/// Registers and unregisters a suffix across every detected target.
///
/// # Example
///
/// ```rust,ignore
/// use dottest::{RegistrationConfig, RegistrationEngine, Suffix};
///
/// let engine = RegistrationEngine::new(RegistrationConfig::new());
/// let suffix = Suffix::parse("test")?;
///
/// // Requires root to write /etc/resolver or /etc/hosts.
/// let report = engine.install(&suffix)?;
/// println!("{report}");
///
/// engine.uninstall(&suffix)?;
/// ```
#[derive(Debug, Clone)]
pub struct RegistrationEngine<R = SystemRunner> {
    probe: PlatformProbe,
    editor: ConfigEditor,
    reloader: ServiceReloader<R>,
}

impl RegistrationEngine<SystemRunner> {
    /// Creates an engine for the current platform running real commands.
    #[must_use]
    pub fn new(config: RegistrationConfig) -> Self {
        Self::with_runner(config, SystemRunner, Platform::current())
    }
}

impl<R: CommandRunner> RegistrationEngine<R> {
    /// Creates an engine with a custom command runner and platform.
    pub fn with_runner(config: RegistrationConfig, runner: R, platform: Platform) -> Self {
        Self {
            probe: PlatformProbe::new(config.clone()),
            editor: ConfigEditor::new(config),
            reloader: ServiceReloader::new(runner, platform),
        }
    }

    /// Routes `suffix` to localhost on every detected target.
    ///
    /// Targets that already carry the entry are left untouched, so running
    /// this twice reports [`EditResult::Unchanged`] for every target.
    ///
    /// # Errors
    ///
    /// [`ResolverError::UnsupportedPlatform`] when nothing can be edited,
    /// [`ResolverError::EditFailed`] with the per-target report when any
    /// edit fails, [`ResolverError::VerificationMismatch`] when the files do
    /// not show the entry afterwards, or the error hit while reading a
    /// target. A failed reload is recorded in the report, not returned.
    pub fn install(&self, suffix: &Suffix) -> Result<RegistrationReport> {
        self.run(Action::Install, suffix)
    }

    /// Removes the entry for `suffix` from every detected target.
    ///
    /// Every hosts line routing a name under the suffix goes, as does a
    /// resolver file of ours written with any address or port, so the flags
    /// used to install need not be repeated.
    ///
    /// # Errors
    ///
    /// Same as [`install`](Self::install).
    pub fn uninstall(&self, suffix: &Suffix) -> Result<RegistrationReport> {
        self.run(Action::Uninstall, suffix)
    }

    /// Reads the current registration state of `suffix`.
    ///
    /// # Errors
    ///
    /// [`ResolverError::UnsupportedPlatform`] or a read error.
    pub fn status(&self, suffix: &Suffix) -> Result<StatusReport> {
        let targets = self.probe.detect_targets(suffix)?;
        let states = self.observe(&targets, suffix)?;
        let state = RegistrationState::classify(states.iter().copied());
        Ok(StatusReport {
            suffix: suffix.clone(),
            targets: targets.into_iter().zip(states).collect(),
            state,
        })
    }

    fn run(&self, action: Action, suffix: &Suffix) -> Result<RegistrationReport> {
        let result = self.drive(action, suffix);
        match &result {
            Ok(report) => {
                enter(Phase::Done, action, suffix);
                if !report.is_clean() {
                    tracing::warn!(%action, %suffix, "Finished with failed reloads");
                }
            }
            Err(e) => {
                enter(Phase::Failed, action, suffix);
                tracing::error!(%action, %suffix, error = %e, "Registration failed");
            }
        }
        result
    }

    fn drive(&self, action: Action, suffix: &Suffix) -> Result<RegistrationReport> {
        enter(Phase::Probing, action, suffix);
        let targets = self.probe.detect_targets(suffix)?;

        enter(Phase::Checking, action, suffix);
        let before = self.observe(&targets, suffix)?;
        let initial = RegistrationState::classify(before.iter().copied());
        tracing::debug!(%action, %suffix, state = %initial, "Current registration state");

        enter(Phase::Editing, action, suffix);
        let mut reports: Vec<TargetReport> = targets
            .into_iter()
            .zip(before)
            .map(|(target, before)| {
                let edit = match (action, before) {
                    (Action::Install, EntryState::Present)
                    | (Action::Uninstall, EntryState::Absent) => EditResult::Unchanged,
                    (Action::Install, _) => self.editor.apply_entry(&target, suffix),
                    (Action::Uninstall, _) => self.editor.remove_entry(&target, suffix),
                };
                TargetReport {
                    target,
                    before,
                    edit,
                    reload: None,
                    after: None,
                }
            })
            .collect();

        if reports.iter().any(|r| r.edit.is_failed()) {
            let state = match self.record_after(&mut reports, suffix) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(
                        %action,
                        %suffix,
                        error = %e,
                        "Could not re-read targets after a failed edit"
                    );
                    initial
                }
            };
            return Err(ResolverError::EditFailed(Box::new(RegistrationReport {
                action,
                suffix: suffix.clone(),
                targets: reports,
                state,
            })));
        }

        enter(Phase::Reloading, action, suffix);
        let mut reloaded: BTreeSet<TargetKind> = BTreeSet::new();
        for report in &mut reports {
            if matches!(report.edit, EditResult::Applied) && reloaded.insert(report.target.kind) {
                report.reload = Some(self.reloader.reload(report.target.kind));
            }
        }

        enter(Phase::Verifying, action, suffix);
        let observed = self.record_after(&mut reports, suffix)?;
        let report = RegistrationReport {
            action,
            suffix: suffix.clone(),
            targets: reports,
            state: observed,
        };
        let expected = action.intended_state();
        if observed != expected {
            for t in report.drifted() {
                tracing::warn!(
                    kind = %t.target.kind,
                    path = %t.target.path.display(),
                    state = %t.after.map_or("unknown", EntryState::as_str),
                    "Target does not show the intended state"
                );
            }
            return Err(ResolverError::VerificationMismatch {
                expected,
                observed,
                report: Box::new(report),
            });
        }

        Ok(report)
    }

    /// Re-reads every target into its report and classifies the result.
    fn record_after(
        &self,
        reports: &mut [TargetReport],
        suffix: &Suffix,
    ) -> Result<RegistrationState> {
        let states = self.observe(reports.iter().map(|r| &r.target), suffix)?;
        for (report, state) in reports.iter_mut().zip(&states) {
            report.after = Some(*state);
        }
        Ok(RegistrationState::classify(states))
    }

    fn observe<'a>(
        &self,
        targets: impl IntoIterator<Item = &'a ResolverTarget>,
        suffix: &Suffix,
    ) -> Result<Vec<EntryState>> {
        targets
            .into_iter()
            .map(|target| self.probe.read_current_entry(target, suffix))
            .collect()
    }
}

fn enter(phase: Phase, action: Action, suffix: &Suffix) {
    tracing::debug!(?phase, %action, %suffix, "Entering phase");
}
