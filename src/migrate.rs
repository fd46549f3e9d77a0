//! SQL migration discovery and sequential execution.
//!
//! Migration files are applied in lexicographic filename order, one
//! scoped connection per file. The batch stops at the first failure;
//! files already applied stay applied, and nothing is rolled back
//! across files.

use std::future::Future;
use std::io;
use std::pin::Pin;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, Connection, Executor};
use thiserror::Error;
use tracing::debug;

use crate::endpoint::{DB_NAME, DB_PORT, DB_USER, DatabaseEndpoint, EndpointError};
use crate::report::Reporter;

/// One discovered migration file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MigrationFile {
    /// Full path of the file.
    pub path: Utf8PathBuf,
    /// File name, which doubles as the ordering key.
    pub sort_key: String,
}

/// Errors raised while listing migration files.
#[derive(Debug, Error)]
pub enum MigrationDiscoveryError {
    /// Raised when the migrations directory does not exist.
    #[error("migrations directory {path} does not exist")]
    DirectoryNotFound {
        /// Directory that was expected to exist.
        path: Utf8PathBuf,
    },
    /// Raised when directory entries cannot be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// Path that could not be read.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// Errors raised while applying migrations.
#[derive(Debug, Error)]
pub enum MigrateError<ExecError>
where
    ExecError: std::error::Error + 'static,
{
    /// Raised when the database password is not configured.
    #[error(
        "database password is not configured; set db.password in the \
         local configuration file"
    )]
    MissingPassword,
    /// Raised when no database host can be resolved.
    #[error("cannot resolve database host: {0}")]
    Host(#[from] EndpointError),
    /// Raised when migration files cannot be listed.
    #[error("{0}")]
    Discovery(#[from] MigrationDiscoveryError),
    /// Raised when a migration file cannot be read.
    #[error("failed to read {path}: {message}")]
    Io {
        /// File that could not be read.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when a migration file fails to execute.
    #[error("migration {file_name} failed: {source}")]
    Execution {
        /// File that failed.
        file_name: String,
        /// Error reported by the executor.
        #[source]
        source: ExecError,
    },
    /// Raised when the schema reset statement fails.
    #[error("schema reset failed: {0}")]
    Reset(#[source] ExecError),
}

/// Connection details for one direct database session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SqlTarget {
    /// Host to connect to.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Database user.
    pub user: String,
    /// Password for the user.
    pub password: String,
}

/// Future returned by executor operations.
pub type SqlFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Minimal interface for running SQL batches against a host.
pub trait SqlExecutor {
    /// Driver specific error type returned by the executor.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Connects to `target`, executes `sql` as one batch, and closes the
    /// connection before returning, on both success and failure paths.
    fn execute_batch<'a>(
        &'a self,
        target: &'a SqlTarget,
        sql: &'a str,
    ) -> SqlFuture<'a, (), Self::Error>;
}

/// Executor that opens a real Postgres connection per call.
#[derive(Clone, Copy, Debug, Default)]
pub struct PgExecutor;

impl SqlExecutor for PgExecutor {
    type Error = sqlx::Error;

    fn execute_batch<'a>(
        &'a self,
        target: &'a SqlTarget,
        sql: &'a str,
    ) -> SqlFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let options = PgConnectOptions::new()
                .host(&target.host)
                .port(target.port)
                .database(&target.database)
                .username(&target.user)
                .password(&target.password);
            let mut connection = options.connect().await?;
            let outcome = connection.execute(sqlx::raw_sql(sql)).await;
            let closed = connection.close().await;
            outcome?;
            closed?;
            Ok(())
        })
    }
}

const RESET_SQL: &str = "DROP SCHEMA IF EXISTS public CASCADE; CREATE SCHEMA public;";

/// Lists `.sql` files in `dir`, sorted by filename.
///
/// An empty directory yields an empty list, not an error.
///
/// # Errors
///
/// Returns [`MigrationDiscoveryError::DirectoryNotFound`] when the
/// directory is missing and [`MigrationDiscoveryError::Io`] when entries
/// cannot be read.
pub fn list_migrations(dir: &Utf8Path) -> Result<Vec<MigrationFile>, MigrationDiscoveryError> {
    let handle = match Dir::open_ambient_dir(dir, ambient_authority()) {
        Ok(handle) => handle,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(MigrationDiscoveryError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }
        Err(err) => {
            return Err(MigrationDiscoveryError::Io {
                path: dir.to_path_buf(),
                message: err.to_string(),
            });
        }
    };

    let entries = handle.entries().map_err(|err| MigrationDiscoveryError::Io {
        path: dir.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| MigrationDiscoveryError::Io {
            path: dir.to_path_buf(),
            message: err.to_string(),
        })?;
        let file_type = entry.file_type().map_err(|err| MigrationDiscoveryError::Io {
            path: dir.to_path_buf(),
            message: err.to_string(),
        })?;
        if !file_type.is_file() {
            continue;
        }
        let file_name = entry.file_name().map_err(|err| MigrationDiscoveryError::Io {
            path: dir.to_path_buf(),
            message: err.to_string(),
        })?;
        if !file_name.ends_with(".sql") {
            continue;
        }
        files.push(MigrationFile {
            path: dir.join(&file_name),
            sort_key: file_name,
        });
    }

    files.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));
    debug!(count = files.len(), dir = %dir, "discovered migration files");
    Ok(files)
}

/// Applies migration files through an injected executor.
#[derive(Clone, Debug)]
pub struct MigrationRunner<E, R> {
    executor: E,
    reporter: R,
}

impl<E, R> MigrationRunner<E, R>
where
    E: SqlExecutor,
    R: Reporter,
{
    /// Builds a runner from an executor and a reporter.
    pub const fn new(executor: E, reporter: R) -> Self {
        Self { executor, reporter }
    }

    /// Applies a single migration file over a scoped connection.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MissingPassword`] when the endpoint has no
    /// password, [`MigrateError::Host`] when no host can be resolved, and
    /// [`MigrateError::Execution`] when the file fails to run.
    pub async fn apply_one(
        &self,
        endpoint: &DatabaseEndpoint,
        file: &MigrationFile,
    ) -> Result<(), MigrateError<E::Error>> {
        let target = Self::target_for(endpoint)?;
        self.apply_to_target(&target, file).await
    }

    /// Applies every migration in `dir` in filename order, stopping at
    /// the first failure. Returns the number of files applied.
    ///
    /// An empty directory is a success with zero files applied; a
    /// missing directory is an error.
    ///
    /// # Errors
    ///
    /// Returns the first [`MigrateError`] encountered; files after the
    /// failing one are not executed.
    pub async fn apply_all(
        &self,
        endpoint: &DatabaseEndpoint,
        dir: &Utf8Path,
    ) -> Result<usize, MigrateError<E::Error>> {
        let files = list_migrations(dir)?;
        if files.is_empty() {
            self.reporter
                .warning(&format!("no migration files found in {dir}"));
            return Ok(0);
        }

        let target = Self::target_for(endpoint)?;
        for file in &files {
            self.apply_to_target(&target, file).await?;
        }
        Ok(files.len())
    }

    /// Drops and recreates the public schema.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::Reset`] when the statement fails, plus the
    /// same credential errors as [`MigrationRunner::apply_one`].
    pub async fn reset_schema(
        &self,
        endpoint: &DatabaseEndpoint,
    ) -> Result<(), MigrateError<E::Error>> {
        let target = Self::target_for(endpoint)?;
        self.executor
            .execute_batch(&target, RESET_SQL)
            .await
            .map_err(MigrateError::Reset)?;
        self.reporter.success("schema reset");
        Ok(())
    }

    async fn apply_to_target(
        &self,
        target: &SqlTarget,
        file: &MigrationFile,
    ) -> Result<(), MigrateError<E::Error>> {
        self.reporter
            .info(&format!("applying {}", file.sort_key));
        let sql = read_migration(&file.path)?;
        self.executor
            .execute_batch(target, &sql)
            .await
            .map_err(|err| MigrateError::Execution {
                file_name: file.sort_key.clone(),
                source: err,
            })?;
        self.reporter
            .success(&format!("applied {}", file.sort_key));
        Ok(())
    }

    fn target_for(endpoint: &DatabaseEndpoint) -> Result<SqlTarget, MigrateError<E::Error>> {
        let password = endpoint
            .password()
            .map(str::trim)
            .filter(|password| !password.is_empty())
            .ok_or(MigrateError::MissingPassword)?;
        let host = endpoint.resolve_host()?;
        Ok(SqlTarget {
            host,
            port: DB_PORT,
            database: DB_NAME.to_owned(),
            user: DB_USER.to_owned(),
            password: password.to_owned(),
        })
    }
}

fn read_migration<E>(path: &Utf8Path) -> Result<String, MigrateError<E>>
where
    E: std::error::Error + 'static,
{
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| MigrateError::Io {
        path: path.to_path_buf(),
        message: String::from("migration path is missing a filename"),
    })?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| MigrateError::Io {
        path: parent.to_path_buf(),
        message: err.to_string(),
    })?;

    dir.read_to_string(file_name).map_err(|err| MigrateError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}
