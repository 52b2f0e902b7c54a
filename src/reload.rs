//! Making resolution changes take effect immediately.

use crate::command::{CommandRequest, CommandRunner};
use crate::error::ResolverError;
use crate::probe::Platform;
use crate::target::TargetKind;

/// Outcome of a reload.
#[derive(Debug)]
pub enum ReloadOutcome {
    /// Every command of the plan exited with status 0.
    Reloaded,
    /// The kind is picked up on the next lookup without a signal.
    NotRequired,
    /// A command failed; the edit stands and the cache expires on its own.
    Failed(ResolverError),
}

impl ReloadOutcome {
    /// Returns `true` for [`ReloadOutcome::Failed`].
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Signals the OS resolver cache after an edit.
///
/// Commands are never retried: repeatedly signalling system daemons does
/// more harm than a stale cache.
#[derive(Debug, Clone)]
pub struct ServiceReloader<R> {
    runner: R,
    platform: Platform,
}

impl<R: CommandRunner> ServiceReloader<R> {
    /// Creates a reloader for `platform`.
    pub const fn new(runner: R, platform: Platform) -> Self {
        Self { runner, platform }
    }

    /// Commands needed after editing a target of `kind`. Empty when the
    /// change is visible on the next lookup.
    #[must_use]
    pub fn plan(&self, kind: TargetKind) -> Vec<CommandRequest> {
        match (self.platform, kind) {
            // mDNSResponder caches both /etc/hosts and /etc/resolver answers.
            (Platform::MacOs, _) => vec![
                CommandRequest::new("dscacheutil").args(["-flushcache"]).elevated(),
                CommandRequest::new("killall").args(["-HUP", "mDNSResponder"]).elevated(),
            ],
            (Platform::Linux | Platform::Other, _) => Vec::new(),
        }
    }

    /// Runs the reload plan for `kind`, stopping at the first failure.
    pub fn reload(&self, kind: TargetKind) -> ReloadOutcome {
        let plan = self.plan(kind);
        if plan.is_empty() {
            tracing::debug!(kind = %kind, "No reload required");
            return ReloadOutcome::NotRequired;
        }

        for request in &plan {
            let reason = match self.runner.run(request) {
                Ok(output) if output.success() => continue,
                Ok(output) => {
                    let status = output.status.map_or_else(
                        || "killed by signal".to_string(),
                        |c| format!("exit status {c}"),
                    );
                    let stderr = output.stderr.trim();
                    if stderr.is_empty() {
                        status
                    } else {
                        format!("{status}: {stderr}")
                    }
                }
                Err(e) => format!("could not start: {e}"),
            };
            tracing::warn!(kind = %kind, command = %request, reason = %reason, "Reload failed");
            return ReloadOutcome::Failed(ResolverError::ReloadFailed {
                kind,
                command: request.to_string(),
                reason,
            });
        }

        tracing::info!(kind = %kind, "Flushed resolver cache");
        ReloadOutcome::Reloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use std::cell::RefCell;
    use std::io;

    /// Records requests and fails the program named in `fail`.
    struct FakeRunner {
        seen: RefCell<Vec<CommandRequest>>,
        fail: Option<&'static str>,
    }

    impl FakeRunner {
        fn new(fail: Option<&'static str>) -> Self {
            Self {
                seen: RefCell::new(Vec::new()),
                fail,
            }
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, request: &CommandRequest) -> io::Result<CommandOutput> {
            self.seen.borrow_mut().push(request.clone());
            let failed = self.fail == Some(request.program.as_str());
            Ok(CommandOutput {
                status: Some(i32::from(failed)),
                stdout: String::new(),
                stderr: if failed { "no such process\n".into() } else { String::new() },
            })
        }
    }

    #[test]
    fn linux_needs_no_reload() {
        let runner = FakeRunner::new(None);
        let reloader = ServiceReloader::new(&runner, Platform::Linux);
        assert!(matches!(reloader.reload(TargetKind::HostsFileEntry), ReloadOutcome::NotRequired));
        assert!(runner.seen.borrow().is_empty());
    }

    #[test]
    fn macos_flushes_cache_elevated() {
        let runner = FakeRunner::new(None);
        let reloader = ServiceReloader::new(&runner, Platform::MacOs);
        assert!(matches!(
            reloader.reload(TargetKind::ResolverDirectoryEntry),
            ReloadOutcome::Reloaded
        ));

        let seen = runner.seen.borrow();
        let commands: Vec<String> = seen.iter().map(ToString::to_string).collect();
        assert_eq!(commands, ["dscacheutil -flushcache", "killall -HUP mDNSResponder"]);
        assert!(seen.iter().all(|r| r.elevated));
    }

    #[test]
    fn nonzero_exit_fails_without_retry() {
        let runner = FakeRunner::new(Some("dscacheutil"));
        let reloader = ServiceReloader::new(&runner, Platform::MacOs);

        match reloader.reload(TargetKind::HostsFileEntry) {
            ReloadOutcome::Failed(ResolverError::ReloadFailed { kind, command, reason }) => {
                assert_eq!(kind, TargetKind::HostsFileEntry);
                assert_eq!(command, "dscacheutil -flushcache");
                assert_eq!(reason, "exit status 1: no such process");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(runner.seen.borrow().len(), 1);
    }
}
