//! Boundary to OS commands.
//!
//! The engine never spawns processes itself. It hands a [`CommandRequest`] to
//! a [`CommandRunner`], which makes the reloader testable with a fake.

use crate::util::is_root;
use std::fmt;
use std::io;
use std::process::Command;

/// A command to run, optionally with elevated rights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Executable name, looked up on `PATH`.
    pub program: String,
    /// Arguments, passed without a shell.
    pub args: Vec<String>,
    /// Run as root. The runner decides how; it never prompts on its own.
    pub elevated: bool,
}

impl CommandRequest {
    /// Creates an unprivileged request.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            elevated: false,
        }
    }

    /// Appends arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Marks the request as requiring root.
    #[must_use]
    pub const fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }
}

impl fmt::Display for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` if the process was killed by a signal.
    pub status: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` for a zero exit code.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }
}

/// Runs commands synchronously.
pub trait CommandRunner {
    /// Runs `request` to completion.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be started. A nonzero
    /// exit is reported through [`CommandOutput::status`].
    fn run(&self, request: &CommandRequest) -> io::Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, request: &CommandRequest) -> io::Result<CommandOutput> {
        (**self).run(request)
    }
}

/// Runs commands on the host, through `sudo` when elevation is requested
/// and the process is not already root.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, request: &CommandRequest) -> io::Result<CommandOutput> {
        let mut command = if request.elevated && !is_root() {
            let mut sudo = Command::new("sudo");
            sudo.arg(&request.program);
            sudo
        } else {
            Command::new(&request.program)
        };
        command.args(&request.args);

        tracing::debug!(command = %request, elevated = request.elevated, "Running command");
        let output = command.output()?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
