//! Local tool availability checks.

use std::ffi::OsString;

use crate::runner::CommandRunner;

/// Probes `program --version` and returns the first line of its output.
///
/// Returns `None` when the program cannot be started or exits with a
/// failure, which callers treat as "tool not installed".
#[must_use]
pub fn tool_version<R: CommandRunner>(runner: &R, program: &str) -> Option<String> {
    let args = [OsString::from("--version")];
    let output = runner.run(program, &args, None).ok()?;
    if !output.is_success() {
        return None;
    }

    let text = if output.stdout.trim().is_empty() {
        &output.stderr
    } else {
        &output.stdout
    };
    Some(text.trim().lines().next().unwrap_or_default().to_owned())
}
