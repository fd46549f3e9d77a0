//! Progress reporting capability injected into workflows.
//!
//! Components never write to the console directly; they report through this
//! trait so behaviour stays observable in tests without capturing stdout.

use std::io::{self, Write};

/// Sink for user-facing progress messages.
pub trait Reporter {
    /// Announces a numbered workflow step.
    fn step(&self, number: usize, message: &str);
    /// Reports a completed action.
    fn success(&self, message: &str);
    /// Reports a non-fatal problem.
    fn warning(&self, message: &str);
    /// Reports a fatal problem.
    fn error(&self, message: &str);
    /// Reports supplementary information.
    fn info(&self, message: &str);
}

/// Reporter that writes progress to stdout and problems to stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Creates a console reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reporter for ConsoleReporter {
    fn step(&self, number: usize, message: &str) {
        writeln!(io::stdout(), "[{number}] {message}").ok();
    }

    fn success(&self, message: &str) {
        writeln!(io::stdout(), "ok: {message}").ok();
    }

    fn warning(&self, message: &str) {
        writeln!(io::stderr(), "warning: {message}").ok();
    }

    fn error(&self, message: &str) {
        writeln!(io::stderr(), "error: {message}").ok();
    }

    fn info(&self, message: &str) {
        writeln!(io::stdout(), "{message}").ok();
    }
}

impl<R: Reporter + ?Sized> Reporter for &R {
    fn step(&self, number: usize, message: &str) {
        (**self).step(number, message);
    }

    fn success(&self, message: &str) {
        (**self).success(message);
    }

    fn warning(&self, message: &str) {
        (**self).warning(message);
    }

    fn error(&self, message: &str) {
        (**self).error(message);
    }

    fn info(&self, message: &str) {
        (**self).info(message);
    }
}
