//! Binary entry point for the dh CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use dh::config::Config;
use dh::config_store::{ConfigStore, ConfigStoreError};
use dh::endpoint::DatabaseEndpoint;
use dh::migrate::PgExecutor;
use dh::ops::{
    self, DbWorkflows, ProjectTasks, SetupError, SetupWorkflow, TaskError, ValidateError,
    ValidateWorkflow,
};
use dh::probe::ConnectivityProbe;
use dh::prompt::TerminalPrompter;
use dh::report::{ConsoleReporter, Reporter};
use dh::runner::ProcessCommandRunner;
use dh::supabase::{SupabaseDirectory, SupabaseError};
use dh::user_sync::UserSyncEngine;
use dh::workspace::{Workspace, WorkspaceError};

mod cli;

use cli::{Cli, Commands, DbCommands};

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Setup(#[from] SetupError),
    #[error("{0}")]
    Validate(#[from] ValidateError),
    #[error("{0}")]
    Task(#[from] TaskError),
    #[error("{0}")]
    Config(#[from] ConfigStoreError),
    #[error("{0}")]
    Workspace(#[from] WorkspaceError),
    #[error("{0}")]
    DbConfig(#[from] ops::DbConfigError),
    #[error("{0}")]
    DbPath(#[from] ops::DbPathError),
    #[error("{0}")]
    AllowList(#[from] ops::AllowListError),
    #[error("{0}")]
    Supabase(#[from] SupabaseError),
    #[error("{0}")]
    Db(#[from] ops::DbOpError<sqlx::Error>),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    let store = ConfigStore::new(".");
    let reporter = ConsoleReporter::new();

    match cli.command {
        Commands::Setup => {
            SetupWorkflow::new(store, ProcessCommandRunner, TerminalPrompter, reporter).run()?;
            Ok(0)
        }
        Commands::Install => {
            ProjectTasks::new(store, ProcessCommandRunner, reporter).install()?;
            Ok(0)
        }
        Commands::Validate => {
            let issues = ValidateWorkflow::new(store, ProcessCommandRunner, reporter)
                .run()
                .await?;
            Ok(if issues.is_empty() { 0 } else { 1 })
        }
        Commands::Build(args) => {
            ProjectTasks::new(store, ProcessCommandRunner, reporter).build(args.docker)?;
            Ok(0)
        }
        Commands::Run => {
            ProjectTasks::new(store, ProcessCommandRunner, reporter).run()?;
            Ok(0)
        }
        Commands::Clean => {
            ProjectTasks::new(store, ProcessCommandRunner, reporter).clean()?;
            Ok(0)
        }
        Commands::Db(command) => dispatch_db(command, &store, reporter).await,
    }
}

async fn dispatch_db(
    command: DbCommands,
    store: &ConfigStore,
    reporter: ConsoleReporter,
) -> Result<i32, CliError> {
    let config = store.load()?;
    let workspace = Workspace::detect(store.root(), &config)?;

    match command {
        DbCommands::Status => db_status(&config, &workspace, reporter).await,
        DbCommands::Setup => {
            let (endpoint, flows) = db_context(&config, reporter)?;
            let migrations = ops::migrations_dir(&workspace)?;
            let seed = ops::seed_file(&workspace)?;
            flows.setup(&endpoint, &migrations, &seed).await?;
            Ok(0)
        }
        DbCommands::Migrate => {
            let (endpoint, flows) = db_context(&config, reporter)?;
            let migrations = ops::migrations_dir(&workspace)?;
            flows.migrate(&endpoint, &migrations).await?;
            Ok(0)
        }
        DbCommands::Seed => {
            let (endpoint, flows) = db_context(&config, reporter)?;
            let seed = ops::seed_file(&workspace)?;
            flows.seed(&endpoint, &seed).await?;
            Ok(0)
        }
        DbCommands::Reset => {
            let (endpoint, flows) = db_context(&config, reporter)?;
            let migrations = ops::migrations_dir(&workspace)?;
            flows.reset(&endpoint, &migrations).await?;
            Ok(0)
        }
        DbCommands::SyncUsers(args) => {
            let endpoint = ops::require_endpoint(&config)?;
            let directory = SupabaseDirectory::new(&endpoint)?;
            let engine = UserSyncEngine::new(directory, reporter);
            let path = Utf8PathBuf::from(args.file);
            let stats = ops::sync_users_from_file(&engine, &path).await?;
            reporter.success(&format!(
                "sync complete: {} added, {} skipped, {} not found, {} lookup failure(s)",
                stats.added, stats.skipped, stats.not_found, stats.lookup_errors
            ));
            Ok(0)
        }
    }
}

type PgWorkflows = DbWorkflows<PgExecutor, TerminalPrompter, ConsoleReporter>;

fn db_context(
    config: &Config,
    reporter: ConsoleReporter,
) -> Result<(DatabaseEndpoint, PgWorkflows), CliError> {
    let endpoint = ops::require_endpoint(config)?;
    let flows = DbWorkflows::new(PgExecutor, TerminalPrompter, reporter);
    Ok((endpoint, flows))
}

async fn db_status(
    config: &Config,
    workspace: &Workspace,
    reporter: ConsoleReporter,
) -> Result<i32, CliError> {
    ops::status_report(config, workspace, &reporter);
    match ops::require_endpoint(config) {
        Ok(endpoint) => {
            let directory = SupabaseDirectory::new(&endpoint)?;
            let probe = ConnectivityProbe::new(directory, reporter);
            Ok(if probe.test_connection().await { 0 } else { 1 })
        }
        Err(err) => {
            reporter.warning(&err.to_string());
            Ok(1)
        }
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error: {err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_renders_the_failure() {
        let mut buf = Vec::new();
        let err = CliError::DbConfig(ops::DbConfigError::NotConfigured);

        write_error(&mut buf, &err);

        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(rendered.contains("database is not configured"));
    }

    #[test]
    fn sync_users_defaults_to_the_allow_list_file() {
        let cli = Cli::try_parse_from(["dh", "db", "sync-users"]).expect("parse should succeed");

        let Commands::Db(DbCommands::SyncUsers(args)) = cli.command else {
            panic!("expected the sync-users command");
        };
        assert_eq!(args.file, "allowed_users.txt");
    }

    #[test]
    fn build_accepts_the_docker_flag() {
        let cli = Cli::try_parse_from(["dh", "build", "--docker"]).expect("parse should succeed");

        let Commands::Build(args) = cli.command else {
            panic!("expected the build command");
        };
        assert!(args.docker);
    }

    #[test]
    fn bare_invocation_is_rejected() {
        assert!(Cli::try_parse_from(["dh"]).is_err());
    }
}
