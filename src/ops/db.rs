//! Database workflows: migrations, seeding, resets, status, and the
//! allow-list sync.
//!
//! Credential and path requirements are resolved up front by free
//! functions, so each workflow method receives a ready endpoint and
//! concrete paths instead of raw configuration.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

use crate::config::Config;
use crate::endpoint::{DatabaseEndpoint, derive_project_ref};
use crate::migrate::{MigrateError, MigrationFile, MigrationRunner, SqlExecutor, list_migrations};
use crate::prompt::{PromptError, Prompter};
use crate::provider::UserDirectory;
use crate::report::Reporter;
use crate::user_sync::{SyncStats, UserSyncEngine};
use crate::workspace::{Workspace, path_exists};

const MIGRATIONS_SUBDIR: &str = "supabase/migrations";
const SEED_SUBDIR: &str = "supabase/seed/seed.sql";

/// Errors raised when database credentials are incomplete.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DbConfigError {
    /// Raised when no database URL is configured.
    #[error("database is not configured; run 'dh setup' first")]
    NotConfigured,
    /// Raised when the secret key is absent.
    #[error("db.secret_key is not set in the local configuration file")]
    MissingSecretKey,
}

/// Errors raised when required project paths are unavailable.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DbPathError {
    /// Raised when no frontend project is present.
    #[error(
        "no frontend project detected; database files live under the \
         frontend's supabase directory"
    )]
    FrontendMissing,
}

/// Errors raised while reading the allow-list file.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum AllowListError {
    /// Raised when the file does not exist.
    #[error("allow-list file {path} not found")]
    NotFound {
        /// Path that was expected to exist.
        path: Utf8PathBuf,
    },
    /// Raised when the file cannot be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path that could not be read.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// Errors raised by the SQL-executing database workflows.
#[derive(Debug, Error)]
pub enum DbOpError<ExecError>
where
    ExecError: std::error::Error + 'static,
{
    /// Raised when migration discovery or execution fails.
    #[error(transparent)]
    Migrate(#[from] MigrateError<ExecError>),
    /// Raised when the reset confirmation cannot be read.
    #[error(transparent)]
    Prompt(#[from] PromptError),
    /// Raised when the seed file is missing.
    #[error("seed file {path} not found")]
    SeedMissing {
        /// Path that was expected to exist.
        path: Utf8PathBuf,
    },
}

/// Result of a reset request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResetOutcome {
    /// The schema was dropped and migrations reapplied.
    Completed {
        /// Number of migration files applied after the reset.
        applied: usize,
    },
    /// The user declined the confirmation prompt.
    Declined,
}

/// Extracts a usable endpoint from merged configuration.
///
/// # Errors
///
/// Returns [`DbConfigError`] when the URL or secret key is missing or
/// blank.
pub fn require_endpoint(config: &Config) -> Result<DatabaseEndpoint, DbConfigError> {
    let url = config
        .db
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or(DbConfigError::NotConfigured)?;
    let secret_key = config
        .db
        .secret_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(DbConfigError::MissingSecretKey)?;
    Ok(DatabaseEndpoint::new(
        url,
        secret_key,
        config.db.password.clone(),
        config.db.project_ref.clone(),
    ))
}

/// Returns the migrations directory under the frontend project.
///
/// # Errors
///
/// Returns [`DbPathError::FrontendMissing`] when no frontend was
/// detected.
pub fn migrations_dir(workspace: &Workspace) -> Result<Utf8PathBuf, DbPathError> {
    workspace
        .frontend
        .as_deref()
        .map(|dir| dir.join(MIGRATIONS_SUBDIR))
        .ok_or(DbPathError::FrontendMissing)
}

/// Returns the seed file path under the frontend project.
///
/// # Errors
///
/// Returns [`DbPathError::FrontendMissing`] when no frontend was
/// detected.
pub fn seed_file(workspace: &Workspace) -> Result<Utf8PathBuf, DbPathError> {
    workspace
        .frontend
        .as_deref()
        .map(|dir| dir.join(SEED_SUBDIR))
        .ok_or(DbPathError::FrontendMissing)
}

/// Workflow behind the `dh db` subcommands that execute SQL.
pub struct DbWorkflows<E, P, R> {
    runner: MigrationRunner<E, R>,
    prompter: P,
    reporter: R,
}

impl<E, P, R> DbWorkflows<E, P, R>
where
    E: SqlExecutor,
    P: Prompter,
    R: Reporter + Clone,
{
    /// Builds the workflow around an executor and its collaborators.
    pub fn new(executor: E, prompter: P, reporter: R) -> Self {
        Self {
            runner: MigrationRunner::new(executor, reporter.clone()),
            prompter,
            reporter,
        }
    }

    /// Applies all pending migrations in filename order.
    ///
    /// # Errors
    ///
    /// Returns [`DbOpError::Migrate`] when discovery or execution fails.
    pub async fn migrate(
        &self,
        endpoint: &DatabaseEndpoint,
        dir: &Utf8Path,
    ) -> Result<usize, DbOpError<E::Error>> {
        let applied = self.runner.apply_all(endpoint, dir).await?;
        if applied > 0 {
            self.reporter
                .success(&format!("applied {applied} migration file(s)"));
        }
        Ok(applied)
    }

    /// Runs the seed file against the database.
    ///
    /// # Errors
    ///
    /// Returns [`DbOpError::SeedMissing`] when the file does not exist
    /// and [`DbOpError::Migrate`] when execution fails.
    pub async fn seed(
        &self,
        endpoint: &DatabaseEndpoint,
        path: &Utf8Path,
    ) -> Result<(), DbOpError<E::Error>> {
        let file = seed_migration(path)?;
        self.runner.apply_one(endpoint, &file).await?;
        self.reporter.success("seed data loaded");
        Ok(())
    }

    /// Applies migrations and, when present, the seed file.
    ///
    /// A missing seed file is skipped rather than treated as an error.
    ///
    /// # Errors
    ///
    /// Returns [`DbOpError::Migrate`] when any step fails.
    pub async fn setup(
        &self,
        endpoint: &DatabaseEndpoint,
        migrations: &Utf8Path,
        seed: &Utf8Path,
    ) -> Result<(), DbOpError<E::Error>> {
        self.migrate(endpoint, migrations).await?;
        if path_exists(seed) {
            self.seed(endpoint, seed).await?;
        } else {
            self.reporter.info(&format!("no seed file at {seed}; skipping"));
        }
        Ok(())
    }

    /// Drops the public schema and reapplies every migration, after an
    /// explicit confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`DbOpError::Prompt`] when the confirmation cannot be
    /// read and [`DbOpError::Migrate`] when the reset or reapply fails.
    pub async fn reset(
        &self,
        endpoint: &DatabaseEndpoint,
        dir: &Utf8Path,
    ) -> Result<ResetOutcome, DbOpError<E::Error>> {
        let confirmed = self.prompter.confirm(
            "This drops the public schema and re-runs every migration. Continue?",
            false,
        )?;
        if !confirmed {
            self.reporter.info("reset cancelled");
            return Ok(ResetOutcome::Declined);
        }
        self.runner.reset_schema(endpoint).await?;
        let applied = self.runner.apply_all(endpoint, dir).await?;
        Ok(ResetOutcome::Completed { applied })
    }
}

/// Prints a summary of database configuration and local migration
/// state. Secret values are reported by presence only.
pub fn status_report<R: Reporter>(config: &Config, workspace: &Workspace, reporter: &R) {
    match config.db.url.as_deref() {
        Some(url) => reporter.info(&format!("url: {url}")),
        None => reporter.warning("url: not set"),
    }
    report_presence(reporter, "secret key", config.db.secret_key.is_some());
    report_presence(reporter, "publishable key", config.db.anon_key.is_some());
    report_presence(reporter, "password", config.db.password.is_some());

    let project_ref = config
        .db
        .project_ref
        .clone()
        .or_else(|| config.db.url.as_deref().and_then(derive_project_ref));
    match project_ref {
        Some(reference) => reporter.info(&format!("project ref: {reference}")),
        None => reporter.warning("project ref: not derivable from the configured url"),
    }

    match migrations_dir(workspace) {
        Ok(dir) => match list_migrations(&dir) {
            Ok(files) => reporter.info(&format!("migrations: {} file(s) in {dir}", files.len())),
            Err(err) => reporter.warning(&err.to_string()),
        },
        Err(err) => reporter.warning(&err.to_string()),
    }
    if let Ok(path) = seed_file(workspace) {
        if path_exists(&path) {
            reporter.info(&format!("seed file: {path}"));
        } else {
            reporter.info("seed file: none");
        }
    }
}

/// Reads an allow-list file and grants access to each listed email.
///
/// Blank lines and `#` comments are skipped by the engine.
///
/// # Errors
///
/// Returns [`AllowListError`] when the file cannot be read; individual
/// sync failures are counted in the returned stats instead.
pub async fn sync_users_from_file<D, R>(
    engine: &UserSyncEngine<D, R>,
    path: &Utf8Path,
) -> Result<SyncStats, AllowListError>
where
    D: UserDirectory,
    R: Reporter,
{
    let contents = read_allow_list(path)?;
    Ok(engine.sync_emails(contents.lines()).await)
}

fn report_presence<R: Reporter>(reporter: &R, label: &str, present: bool) {
    if present {
        reporter.info(&format!("{label}: set"));
    } else {
        reporter.warning(&format!("{label}: not set"));
    }
}

fn seed_migration<ExecError>(path: &Utf8Path) -> Result<MigrationFile, DbOpError<ExecError>>
where
    ExecError: std::error::Error + 'static,
{
    if !path_exists(path) {
        return Err(DbOpError::SeedMissing {
            path: path.to_path_buf(),
        });
    }
    let sort_key = path.file_name().unwrap_or("seed.sql").to_owned();
    Ok(MigrationFile {
        path: path.to_path_buf(),
        sort_key,
    })
}

fn read_allow_list(path: &Utf8Path) -> Result<String, AllowListError> {
    let file_name = path.file_name().ok_or_else(|| AllowListError::NotFound {
        path: path.to_path_buf(),
    })?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };

    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(AllowListError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(err) => {
            return Err(AllowListError::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            });
        }
    };
    match dir.read_to_string(file_name) {
        Ok(contents) => Ok(contents),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(AllowListError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(err) => Err(AllowListError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
    }
}
