//! Core library for the dh developer experience tool.
//!
//! The crate backs a small CLI that takes the recurring chores out of a
//! Next.js + FastAPI + Supabase webapp: layered TOML configuration with
//! a git-ignored credentials file, environment validation, sequential
//! SQL migrations, and an allow-list sync for Supabase users.

pub mod config;
pub mod config_store;
pub mod endpoint;
pub mod migrate;
pub mod ops;
pub mod probe;
pub mod prompt;
pub mod provider;
pub mod report;
pub mod runner;
pub mod supabase;
pub mod test_support;
pub mod tools;
pub mod user_sync;
pub mod workspace;

pub use config::{Config, DbConfig, PreferencesConfig, ProjectConfig, RawConfig};
pub use config_store::{ConfigStore, ConfigStoreError, PROJECT_FILE_NAME, SECRETS_FILE_NAME};
pub use endpoint::{DatabaseEndpoint, EndpointError};
pub use migrate::{
    MigrateError, MigrationDiscoveryError, MigrationFile, MigrationRunner, PgExecutor, SqlExecutor,
    SqlTarget,
};
pub use ops::{
    AllowListError, DbConfigError, DbOpError, DbPathError, DbWorkflows, ProjectTasks, ResetOutcome,
    SetupError, SetupWorkflow, TaskError, ValidateError, ValidateWorkflow,
};
pub use probe::ConnectivityProbe;
pub use prompt::{PromptError, Prompter, TerminalPrompter};
pub use provider::{GrantOutcome, UserDirectory, UserRecord};
pub use report::{ConsoleReporter, Reporter};
pub use runner::{CommandOutput, CommandRunner, ProcessCommandRunner, RunnerError};
pub use supabase::{SupabaseDirectory, SupabaseError};
pub use user_sync::{SyncStats, UserSyncEngine};
pub use workspace::{Workspace, WorkspaceError};
