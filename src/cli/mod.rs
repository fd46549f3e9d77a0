//! Command-line interface definitions for the `dh` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{ArgAction, Parser, Subcommand};

/// Top-level CLI for the `dh` binary.
#[derive(Debug, Parser)]
#[command(
    name = "dh",
    about = "CLI tool to improve devX for webapps",
    version,
    disable_version_flag = true,
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Print the dh version and exit.
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    pub(crate) version: (),
    /// Requested operation.
    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Operations exposed by the `dh` binary.
#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// One-time setup of the development environment.
    #[command(
        name = "setup",
        about = "Detect projects, check tools, and configure credentials"
    )]
    Setup,
    /// Install project dependencies for detected projects.
    #[command(name = "install", about = "Install project dependencies")]
    Install,
    /// Check that the environment is properly configured.
    #[command(name = "validate", about = "Check environment health")]
    Validate,
    /// Build detected projects for production.
    #[command(name = "build", about = "Build projects for production")]
    Build(BuildCommand),
    /// Run project containers.
    #[command(name = "run", about = "Run project Docker containers")]
    Run,
    /// Remove build artifacts and caches.
    #[command(name = "clean", about = "Remove build artifacts")]
    Clean,
    /// Database operations against the configured backend.
    #[command(subcommand, name = "db", about = "Database operations")]
    Db(DbCommands),
}

/// Arguments for the `dh build` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct BuildCommand {
    /// Build Docker images instead of running native build steps.
    #[arg(long)]
    pub(crate) docker: bool,
}

/// Database subcommands under `dh db`.
#[derive(Debug, Subcommand)]
pub(crate) enum DbCommands {
    /// Initialise database tables by running all migrations.
    #[command(name = "setup", about = "Run all migrations to initialise tables")]
    Setup,
    /// Apply pending migrations.
    #[command(name = "migrate", about = "Apply pending migrations")]
    Migrate,
    /// Load seed data into the database.
    #[command(name = "seed", about = "Apply the seed SQL file")]
    Seed,
    /// Drop and recreate the public schema, then re-run migrations.
    #[command(name = "reset", about = "Reset the database schema")]
    Reset,
    /// Report database configuration and connectivity.
    #[command(name = "status", about = "Check database connectivity")]
    Status,
    /// Reconcile an e-mail allow-list against the auth provider.
    #[command(name = "sync-users", about = "Sync allowed users from a file")]
    SyncUsers(SyncUsersCommand),
}

/// Arguments for the `dh db sync-users` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct SyncUsersCommand {
    /// File listing one e-mail per line; `#` starts a comment.
    #[arg(value_name = "FILE", default_value = "allowed_users.txt")]
    pub(crate) file: String,
}
