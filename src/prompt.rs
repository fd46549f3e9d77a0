//! Interactive terminal prompts.

use std::io::{self, BufRead, Write};

use thiserror::Error;

/// Errors raised while prompting for input.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PromptError {
    /// Raised when terminal input or output fails.
    #[error("prompt failed: {message}")]
    Io {
        /// Human-readable error message.
        message: String,
    },
}

/// Abstraction over interactive prompts to support fakes in tests.
pub trait Prompter {
    /// Asks a yes/no question. Empty input selects `default`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when the terminal cannot be read.
    fn confirm(&self, message: &str, default: bool) -> Result<bool, PromptError>;

    /// Asks for one line of text. Empty input selects `default` when one
    /// is given.
    ///
    /// Sensitive prompts never display the default value.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when the terminal cannot be read.
    fn text(
        &self,
        message: &str,
        default: Option<&str>,
        sensitive: bool,
    ) -> Result<String, PromptError>;
}

/// Prompter backed by the process terminal.
///
/// Prompts are written to stderr so that captured stdout stays clean.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn ask(prompt: &str) -> Result<String, PromptError> {
        let mut stderr = io::stderr();
        write!(stderr, "{prompt}").map_err(io_error)?;
        stderr.flush().map_err(io_error)?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).map_err(io_error)?;
        Ok(line.trim().to_owned())
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str, default: bool) -> Result<bool, PromptError> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        let answer = Self::ask(&format!("{message} {hint} "))?;
        Ok(match answer.to_lowercase().as_str() {
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => default,
        })
    }

    fn text(
        &self,
        message: &str,
        default: Option<&str>,
        sensitive: bool,
    ) -> Result<String, PromptError> {
        let prompt = match default {
            Some(value) if !sensitive && !value.is_empty() => format!("{message} [{value}]: "),
            _ => format!("{message}: "),
        };
        let answer = Self::ask(&prompt)?;
        if answer.is_empty() {
            return Ok(default.unwrap_or_default().to_owned());
        }
        Ok(answer)
    }
}

fn io_error(err: io::Error) -> PromptError {
    PromptError::Io {
        message: err.to_string(),
    }
}
