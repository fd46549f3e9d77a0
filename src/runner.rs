//! Subprocess execution abstraction for tool checks and project tasks.

use std::ffi::OsString;
use std::process::Command;

use camino::Utf8Path;
use shell_escape::unix::escape;
use thiserror::Error;

/// Errors raised while spawning external commands.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RunnerError {
    /// Raised when the command cannot be started.
    #[error("failed to start {program}: {message}")]
    Spawn {
        /// Program name as passed to the runner.
        program: String,
        /// Human-readable error message.
        message: String,
    },
}

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// When `cwd` is provided the command runs with that working directory.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Spawn`] if the command cannot be started.
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        cwd: Option<&Utf8Path>,
    ) -> Result<CommandOutput, RunnerError>;
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        cwd: Option<&Utf8Path>,
    ) -> Result<CommandOutput, RunnerError> {
        let mut command = Command::new(program);
        command.args(args);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|err| RunnerError::Spawn {
            program: program.to_owned(),
            message: err.to_string(),
        })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Renders a program invocation as a shell-escaped display string.
#[must_use]
pub fn display_command(program: &str, args: &[OsString]) -> String {
    let mut rendered = String::from(program);
    for arg in args {
        rendered.push(' ');
        let text = arg.to_string_lossy();
        let escaped = escape(text.as_ref().into());
        rendered.push_str(escaped.as_ref());
    }
    rendered
}

/// Builds an argument vector from string literals.
#[must_use]
pub fn os_args<const N: usize>(args: [&str; N]) -> Vec<OsString> {
    args.into_iter().map(OsString::from).collect()
}

/// Renders an exit status for progress and error messages.
#[must_use]
pub fn status_text(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => String::from("no exit status"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_command_escapes_arguments() {
        let args = os_args(["run", "build script"]);
        let rendered = display_command("npm", &args);

        assert_eq!(rendered, "npm run 'build script'");
    }

    #[test]
    fn process_runner_reports_missing_program() {
        let runner = ProcessCommandRunner;
        let result = runner.run("dh-definitely-not-a-real-binary", &[], None);

        let Err(RunnerError::Spawn { program, .. }) = result else {
            panic!("missing binary should fail to spawn");
        };
        assert_eq!(program, "dh-definitely-not-a-real-binary");
    }
}
