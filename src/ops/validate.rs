//! Environment validation.
//!
//! Validation never mutates anything. It inspects tools, dependencies,
//! and configuration, reports findings as it goes, and returns the
//! collected issues so the caller can decide the exit status.

use camino::Utf8Path;
use thiserror::Error;

use crate::config::Config;
use crate::config_store::{ConfigStore, ConfigStoreError};
use crate::endpoint::DatabaseEndpoint;
use crate::probe::ConnectivityProbe;
use crate::report::Reporter;
use crate::runner::CommandRunner;
use crate::supabase::SupabaseDirectory;
use crate::tools::tool_version;
use crate::workspace::{Workspace, WorkspaceError, path_exists};

/// Errors that stop validation before any check can run.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// Raised when configuration cannot be loaded.
    #[error(transparent)]
    Config(#[from] ConfigStoreError),
    /// Raised when the workspace cannot be inspected.
    #[error("workspace inspection failed: {0}")]
    Workspace(#[from] WorkspaceError),
}

/// Workflow behind `dh validate`.
pub struct ValidateWorkflow<Run, R> {
    store: ConfigStore,
    runner: Run,
    reporter: R,
}

impl<Run, R> ValidateWorkflow<Run, R>
where
    Run: CommandRunner,
    R: Reporter,
{
    /// Builds the workflow.
    pub const fn new(store: ConfigStore, runner: Run, reporter: R) -> Self {
        Self {
            store,
            runner,
            reporter,
        }
    }

    /// Runs every check and returns the collected issues.
    ///
    /// An empty list means the environment is ready.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError`] when configuration or the workspace
    /// cannot be inspected at all; individual check failures become
    /// issues instead of errors.
    pub async fn run(&self) -> Result<Vec<String>, ValidateError> {
        let config = self.store.load()?;
        let workspace = Workspace::detect(self.store.root(), &config)?;

        let mut issues = Vec::new();
        if workspace.is_empty() {
            issues.push(String::from(
                "no frontend or backend project detected; run from the project root \
                 or set paths in dh.toml",
            ));
        }
        if let Some(frontend) = &workspace.frontend {
            self.check_frontend(frontend, &mut issues);
        }
        if let Some(backend) = &workspace.backend {
            self.check_backend(backend, &mut issues);
        }
        if tool_version(&self.runner, "docker").is_none() {
            self.reporter
                .warning("docker not found; container commands will be unavailable");
        }
        self.check_database(&config, &mut issues).await;

        if issues.is_empty() {
            self.reporter.success("all checks passed");
        } else {
            for issue in &issues {
                self.reporter.error(issue);
            }
        }
        Ok(issues)
    }

    fn check_frontend(&self, dir: &Utf8Path, issues: &mut Vec<String>) {
        self.reporter.info(&format!("frontend: {dir}"));
        self.check_tool("node", issues);
        self.check_tool("npm", issues);
        if !path_exists(&dir.join("package.json")) {
            issues.push(format!("package.json missing in {dir}"));
        }
        if !path_exists(&dir.join("node_modules")) {
            issues.push(format!("node_modules missing in {dir}; run npm install"));
        }
    }

    fn check_backend(&self, dir: &Utf8Path, issues: &mut Vec<String>) {
        self.reporter.info(&format!("backend: {dir}"));
        self.check_tool("python3", issues);
        self.check_tool("uv", issues);
        if !path_exists(&dir.join("pyproject.toml")) {
            issues.push(format!("pyproject.toml missing in {dir}"));
        }
        if !path_exists(&dir.join(".venv")) {
            issues.push(format!(".venv missing in {dir}; run uv sync"));
        }
    }

    fn check_tool(&self, program: &str, issues: &mut Vec<String>) {
        match tool_version(&self.runner, program) {
            Some(version) => self.reporter.info(&format!("{program} {version}")),
            None => issues.push(format!("{program} is not installed")),
        }
    }

    async fn check_database(&self, config: &Config, issues: &mut Vec<String>) {
        let Some(url) = config.db.url.clone() else {
            issues.push(String::from("database is not configured; run 'dh setup'"));
            return;
        };
        let Some(secret_key) = config.db.secret_key.clone() else {
            issues.push(String::from(
                "db.secret_key is not set in the local configuration file",
            ));
            return;
        };

        let endpoint = DatabaseEndpoint::new(
            url,
            secret_key,
            config.db.password.clone(),
            config.db.project_ref.clone(),
        );
        let directory = match SupabaseDirectory::new(&endpoint) {
            Ok(directory) => directory,
            Err(err) => {
                issues.push(err.to_string());
                return;
            }
        };
        let probe = ConnectivityProbe::new(directory, &self.reporter);
        if !probe.test_connection().await {
            issues.push(String::from("database connection failed"));
        }
    }
}
