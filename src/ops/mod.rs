//! Command workflows wired to the command-line surface.
//!
//! Each submodule owns one family of commands. Workflows take their
//! collaborators through the crate's traits, so tests drive them with
//! scripted doubles instead of real processes and connections.

mod db;
mod setup;
mod tasks;
mod validate;

pub use db::{
    AllowListError, DbConfigError, DbOpError, DbPathError, DbWorkflows, ResetOutcome,
    migrations_dir, require_endpoint, seed_file, status_report, sync_users_from_file,
};
pub use setup::{SetupError, SetupWorkflow};
pub use tasks::{ProjectTasks, TaskError};
pub use validate::{ValidateError, ValidateWorkflow};
