//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::migrate::{SqlExecutor, SqlFuture, SqlTarget};
use crate::prompt::{PromptError, Prompter};
use crate::provider::{DirectoryFuture, GrantOutcome, UserDirectory, UserRecord};
use crate::report::Reporter;
use crate::runner::{CommandOutput, CommandRunner, RunnerError};

const NO_RESPONSE: &str = "no scripted response available";

/// Error returned by scripted doubles when a seeded failure is popped.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{0}")]
pub struct ScriptedError(pub String);

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Working directory requested for the invocation, if any.
    pub cwd: Option<Utf8PathBuf>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning
/// processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a specific exit code.
    pub fn push_exit_code(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(&self, code: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        cwd: Option<&Utf8Path>,
    ) -> Result<CommandOutput, RunnerError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            cwd: cwd.map(Utf8Path::to_path_buf),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| RunnerError::Spawn {
                program: program.to_owned(),
                message: String::from(NO_RESPONSE),
            })
    }
}

/// Scripted SQL executor recording every batch it is asked to run.
///
/// Shared state lives behind `Arc` so the boxed executor futures stay
/// `Send`.
#[derive(Clone, Debug, Default)]
pub struct ScriptedExecutor {
    results: Arc<Mutex<VecDeque<Result<(), ScriptedError>>>>,
    calls: Arc<Mutex<Vec<(SqlTarget, String)>>>,
}

impl ScriptedExecutor {
    /// Creates a new executor with no queued results.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful execution.
    pub fn push_success(&self) {
        lock(&self.results).push_back(Ok(()));
    }

    /// Queues a failing execution with the given message.
    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.results).push_back(Err(ScriptedError(message.into())));
    }

    /// Returns the SQL text of every batch executed so far.
    #[must_use]
    pub fn executed_sql(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|(_, sql)| sql.clone()).collect()
    }

    /// Returns the connection targets of every batch executed so far.
    #[must_use]
    pub fn targets(&self) -> Vec<SqlTarget> {
        lock(&self.calls)
            .iter()
            .map(|(target, _)| target.clone())
            .collect()
    }
}

impl SqlExecutor for ScriptedExecutor {
    type Error = ScriptedError;

    fn execute_batch<'a>(
        &'a self,
        target: &'a SqlTarget,
        sql: &'a str,
    ) -> SqlFuture<'a, (), Self::Error> {
        Box::pin(async move {
            lock(&self.calls).push((target.clone(), sql.to_owned()));
            lock(&self.results)
                .pop_front()
                .unwrap_or_else(|| Err(ScriptedError(String::from(NO_RESPONSE))))
        })
    }
}

/// Builds a user record for scripted listings.
#[must_use]
pub fn user_record(id: &str, email: Option<&str>) -> UserRecord {
    UserRecord {
        id: id.to_owned(),
        email: email.map(str::to_owned),
    }
}

/// Scripted user directory returning pre-seeded listings and grant
/// outcomes in FIFO order.
#[derive(Clone, Debug, Default)]
pub struct ScriptedDirectory {
    listings: Arc<Mutex<VecDeque<Result<Vec<UserRecord>, ScriptedError>>>>,
    grants: Arc<Mutex<VecDeque<Result<GrantOutcome, ScriptedError>>>>,
    granted_ids: Arc<Mutex<Vec<String>>>,
}

impl ScriptedDirectory {
    /// Creates a new directory with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one user listing.
    pub fn push_listing(&self, users: Vec<UserRecord>) {
        lock(&self.listings).push_back(Ok(users));
    }

    /// Queues a failing user listing.
    pub fn push_listing_error(&self, message: impl Into<String>) {
        lock(&self.listings).push_back(Err(ScriptedError(message.into())));
    }

    /// Queues one grant outcome.
    pub fn push_grant(&self, outcome: GrantOutcome) {
        lock(&self.grants).push_back(Ok(outcome));
    }

    /// Queues a failing grant.
    pub fn push_grant_error(&self, message: impl Into<String>) {
        lock(&self.grants).push_back(Err(ScriptedError(message.into())));
    }

    /// Returns every user identifier passed to the insert call so far.
    #[must_use]
    pub fn granted_ids(&self) -> Vec<String> {
        lock(&self.granted_ids).clone()
    }
}

impl UserDirectory for ScriptedDirectory {
    type Error = ScriptedError;

    fn list_users(&self) -> DirectoryFuture<'_, Vec<UserRecord>, Self::Error> {
        Box::pin(async move {
            lock(&self.listings)
                .pop_front()
                .unwrap_or_else(|| Err(ScriptedError(String::from(NO_RESPONSE))))
        })
    }

    fn insert_allowed_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> DirectoryFuture<'a, GrantOutcome, Self::Error> {
        Box::pin(async move {
            lock(&self.granted_ids).push(user_id.to_owned());
            lock(&self.grants)
                .pop_front()
                .unwrap_or_else(|| Err(ScriptedError(String::from(NO_RESPONSE))))
        })
    }
}

/// Scripted prompter answering confirmations and text prompts from
/// seeded queues.
#[derive(Clone, Debug, Default)]
pub struct ScriptedPrompter {
    confirms: Rc<RefCell<VecDeque<bool>>>,
    texts: Rc<RefCell<VecDeque<String>>>,
    messages: Rc<RefCell<Vec<String>>>,
}

impl ScriptedPrompter {
    /// Creates a new prompter with no queued answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a confirmation answer.
    pub fn push_confirm(&self, answer: bool) {
        self.confirms.borrow_mut().push_back(answer);
    }

    /// Queues a text answer.
    pub fn push_text(&self, answer: impl Into<String>) {
        self.texts.borrow_mut().push_back(answer.into());
    }

    /// Returns every prompt message shown so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, message: &str, _default: bool) -> Result<bool, PromptError> {
        self.messages.borrow_mut().push(message.to_owned());
        self.confirms
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| PromptError::Io {
                message: String::from(NO_RESPONSE),
            })
    }

    fn text(
        &self,
        message: &str,
        default: Option<&str>,
        _sensitive: bool,
    ) -> Result<String, PromptError> {
        self.messages.borrow_mut().push(message.to_owned());
        match self.texts.borrow_mut().pop_front() {
            Some(answer) if answer.is_empty() => Ok(default.unwrap_or_default().to_owned()),
            Some(answer) => Ok(answer),
            None => Err(PromptError::Io {
                message: String::from(NO_RESPONSE),
            }),
        }
    }
}

/// Severity recorded by [`RecordingReporter`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReportLevel {
    /// Numbered workflow step.
    Step,
    /// Success message.
    Success,
    /// Warning message.
    Warning,
    /// Error message.
    Error,
    /// Informational message.
    Info,
}

/// Reporter that records every message instead of printing it.
#[derive(Clone, Debug, Default)]
pub struct RecordingReporter {
    messages: Arc<Mutex<Vec<(ReportLevel, String)>>>,
}

impl RecordingReporter {
    /// Creates a reporter with an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded message with its level.
    #[must_use]
    pub fn messages(&self) -> Vec<(ReportLevel, String)> {
        lock(&self.messages).clone()
    }

    /// Returns `true` when any recorded message of `level` contains
    /// `fragment`.
    #[must_use]
    pub fn contains(&self, level: ReportLevel, fragment: &str) -> bool {
        lock(&self.messages)
            .iter()
            .any(|(recorded, message)| *recorded == level && message.contains(fragment))
    }

    fn record(&self, level: ReportLevel, message: &str) {
        lock(&self.messages).push((level, message.to_owned()));
    }
}

impl Reporter for RecordingReporter {
    fn step(&self, number: usize, message: &str) {
        self.record(ReportLevel::Step, &format!("[{number}] {message}"));
    }

    fn success(&self, message: &str) {
        self.record(ReportLevel::Success, message);
    }

    fn warning(&self, message: &str) {
        self.record(ReportLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.record(ReportLevel::Error, message);
    }

    fn info(&self, message: &str) {
        self.record(ReportLevel::Info, message);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
