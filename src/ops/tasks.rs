//! Day-to-day project tasks: install, build, run, and clean.
//!
//! Every task shells out through [`CommandRunner`], so the commands a
//! task would execute are observable in tests without touching real
//! tools.

use std::ffi::OsString;

use camino::Utf8Path;
use thiserror::Error;

use crate::config_store::{ConfigStore, ConfigStoreError};
use crate::report::Reporter;
use crate::runner::{CommandRunner, RunnerError, display_command, os_args, status_text};
use crate::tools::tool_version;
use crate::workspace::{Workspace, WorkspaceError, path_exists};

const FRONTEND_IMAGE: &str = "dh-frontend";
const BACKEND_IMAGE: &str = "dh-backend";
const FRONTEND_PORT: &str = "3000:3000";
const BACKEND_PORT: &str = "8000:8000";
const FRONTEND_ARTEFACTS: [&str; 4] = ["node_modules", ".next", "out", ".turbo"];

/// Errors raised by project tasks.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Raised when neither project could be found.
    #[error(
        "no frontend or backend project detected; run from the project root \
         or set paths in dh.toml"
    )]
    NoProjects,
    /// Raised when docker is needed but not installed.
    #[error("docker is required for this command but was not found")]
    DockerMissing,
    /// Raised when an external command exits unsuccessfully.
    #[error("{command} failed with {status}")]
    CommandFailed {
        /// Rendered command line.
        command: String,
        /// Rendered exit status.
        status: String,
    },
    /// Raised when a command cannot be started.
    #[error(transparent)]
    Runner(#[from] RunnerError),
    /// Raised when configuration cannot be loaded.
    #[error(transparent)]
    Config(#[from] ConfigStoreError),
    /// Raised when the workspace cannot be inspected.
    #[error("workspace inspection failed: {0}")]
    Workspace(#[from] WorkspaceError),
}

/// Workflow behind `dh install`, `dh build`, `dh run`, and `dh clean`.
pub struct ProjectTasks<Run, R> {
    store: ConfigStore,
    runner: Run,
    reporter: R,
}

impl<Run, R> ProjectTasks<Run, R>
where
    Run: CommandRunner,
    R: Reporter,
{
    /// Builds the task workflow.
    pub const fn new(store: ConfigStore, runner: Run, reporter: R) -> Self {
        Self {
            store,
            runner,
            reporter,
        }
    }

    /// Installs dependencies for every detected project.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NoProjects`] when nothing was detected and
    /// [`TaskError::CommandFailed`] when an install command fails.
    pub fn install(&self) -> Result<(), TaskError> {
        let workspace = self.detect()?;
        if let Some(frontend) = &workspace.frontend {
            self.run_checked("npm", &os_args(["install"]), Some(frontend))?;
        }
        if let Some(backend) = &workspace.backend {
            self.run_checked("uv", &os_args(["sync", "--dev"]), Some(backend))?;
        }
        self.reporter.success("dependencies installed");
        Ok(())
    }

    /// Builds both projects, or container images when `docker` is set.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::DockerMissing`] for container builds without
    /// docker and [`TaskError::CommandFailed`] when a build fails.
    pub fn build(&self, docker: bool) -> Result<(), TaskError> {
        let workspace = self.detect()?;
        if docker {
            return self.build_images(&workspace);
        }
        if let Some(frontend) = &workspace.frontend {
            self.run_checked("npm", &os_args(["run", "build"]), Some(frontend))?;
            self.reporter.success("frontend built");
        }
        if let Some(backend) = &workspace.backend {
            self.run_checked("uv", &os_args(["sync", "--dev"]), Some(backend))?;
            self.reporter.success("backend dependencies synced");
        }
        Ok(())
    }

    /// Starts the built container images on their development ports.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::DockerMissing`] when docker is absent and
    /// [`TaskError::CommandFailed`] when a container fails to start.
    pub fn run(&self) -> Result<(), TaskError> {
        let workspace = self.detect()?;
        self.require_docker()?;
        if workspace.frontend.is_some() {
            self.run_checked(
                "docker",
                &os_args(["run", "--rm", "-d", "-p", FRONTEND_PORT, FRONTEND_IMAGE]),
                None,
            )?;
            self.reporter
                .success("frontend listening on http://localhost:3000");
        }
        if workspace.backend.is_some() {
            self.run_checked(
                "docker",
                &os_args(["run", "--rm", "-d", "-p", BACKEND_PORT, BACKEND_IMAGE]),
                None,
            )?;
            self.reporter
                .success("backend listening on http://localhost:8000");
        }
        Ok(())
    }

    /// Removes build artefacts and caches from both projects.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::CommandFailed`] when a removal command
    /// fails.
    pub fn clean(&self) -> Result<(), TaskError> {
        let workspace = self.detect()?;
        let mut cleaned = false;
        if let Some(frontend) = &workspace.frontend {
            for name in FRONTEND_ARTEFACTS {
                let target = frontend.join(name);
                if path_exists(&target) {
                    self.run_checked("rm", &removal_args(&target), None)?;
                    cleaned = true;
                }
            }
        }
        if let Some(backend) = &workspace.backend {
            self.run_checked("find", &find_pycache_args(backend), None)?;
            cleaned = true;
        }
        if cleaned {
            self.reporter.success("workspace cleaned");
        } else {
            self.reporter.info("nothing to clean");
        }
        Ok(())
    }

    fn build_images(&self, workspace: &Workspace) -> Result<(), TaskError> {
        self.require_docker()?;
        if let Some(frontend) = &workspace.frontend {
            self.run_checked("docker", &docker_build_args(FRONTEND_IMAGE), Some(frontend))?;
            self.reporter.success(&format!("built {FRONTEND_IMAGE}"));
        }
        if let Some(backend) = &workspace.backend {
            self.run_checked("docker", &docker_build_args(BACKEND_IMAGE), Some(backend))?;
            self.reporter.success(&format!("built {BACKEND_IMAGE}"));
        }
        Ok(())
    }

    fn detect(&self) -> Result<Workspace, TaskError> {
        let config = self.store.load()?;
        let workspace = Workspace::detect(self.store.root(), &config)?;
        if workspace.is_empty() {
            return Err(TaskError::NoProjects);
        }
        Ok(workspace)
    }

    fn require_docker(&self) -> Result<(), TaskError> {
        if tool_version(&self.runner, "docker").is_none() {
            return Err(TaskError::DockerMissing);
        }
        Ok(())
    }

    fn run_checked(
        &self,
        program: &str,
        args: &[OsString],
        cwd: Option<&Utf8Path>,
    ) -> Result<(), TaskError> {
        let rendered = display_command(program, args);
        self.reporter.info(&format!("running {rendered}"));
        let output = self.runner.run(program, args, cwd)?;
        if output.is_success() {
            return Ok(());
        }
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            self.reporter.error(stderr);
        }
        Err(TaskError::CommandFailed {
            command: rendered,
            status: status_text(output.code),
        })
    }
}

fn removal_args(target: &Utf8Path) -> Vec<OsString> {
    vec![OsString::from("-rf"), OsString::from(target.as_str())]
}

fn find_pycache_args(dir: &Utf8Path) -> Vec<OsString> {
    let mut args = vec![OsString::from(dir.as_str())];
    args.extend(os_args([
        "-name",
        "__pycache__",
        "-type",
        "d",
        "-exec",
        "rm",
        "-rf",
        "{}",
        "+",
    ]));
    args
}

fn docker_build_args(image: &str) -> Vec<OsString> {
    os_args(["build", "-t", image, "."])
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::{Utf8Path, Utf8PathBuf};
    use tempfile::TempDir;

    use crate::test_support::{RecordingReporter, ReportLevel, ScriptedRunner};

    use super::*;

    fn workspace_root() -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
            .unwrap_or_else(|err| panic!("temp path should be utf8: {}", err.display()));
        (tmp, root)
    }

    fn add_frontend(root: &Utf8Path) -> Utf8PathBuf {
        let dir = root.join("web");
        fs::create_dir(dir.as_std_path()).expect("mkdir");
        fs::write(dir.join("package.json").as_std_path(), "{}").expect("write package.json");
        fs::write(dir.join("next.config.ts").as_std_path(), "export default {};")
            .expect("write next config");
        dir
    }

    fn add_backend(root: &Utf8Path) -> Utf8PathBuf {
        let dir = root.join("api");
        fs::create_dir(dir.as_std_path()).expect("mkdir");
        fs::write(dir.join("pyproject.toml").as_std_path(), "[project]\nname = \"api\"\n")
            .expect("write pyproject");
        fs::write(dir.join("main.py").as_std_path(), "app = None\n").expect("write main.py");
        dir
    }

    fn tasks_with(
        root: &Utf8Path,
    ) -> (
        ProjectTasks<ScriptedRunner, RecordingReporter>,
        ScriptedRunner,
        RecordingReporter,
    ) {
        let runner = ScriptedRunner::new();
        let reporter = RecordingReporter::new();
        let tasks = ProjectTasks::new(
            ConfigStore::new(root.to_path_buf()),
            runner.clone(),
            reporter.clone(),
        );
        (tasks, runner, reporter)
    }

    #[test]
    fn build_runs_npm_in_the_frontend_directory() {
        let (_tmp, root) = workspace_root();
        let frontend = add_frontend(&root);
        let (tasks, runner, _reporter) = tasks_with(&root);
        runner.push_success();

        tasks.build(false).expect("build should succeed");

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].command_string(), "npm run build");
        assert_eq!(invocations[0].cwd.as_deref(), Some(frontend.as_path()));
    }

    #[test]
    fn build_covers_both_projects() {
        let (_tmp, root) = workspace_root();
        let frontend = add_frontend(&root);
        let backend = add_backend(&root);
        let (tasks, runner, _reporter) = tasks_with(&root);
        runner.push_success();
        runner.push_success();

        tasks.build(false).expect("build should succeed");

        let invocations = runner.invocations();
        assert_eq!(invocations[0].command_string(), "npm run build");
        assert_eq!(invocations[0].cwd.as_deref(), Some(frontend.as_path()));
        assert_eq!(invocations[1].command_string(), "uv sync --dev");
        assert_eq!(invocations[1].cwd.as_deref(), Some(backend.as_path()));
    }

    #[test]
    fn build_with_docker_builds_both_images() {
        let (_tmp, root) = workspace_root();
        let frontend = add_frontend(&root);
        let backend = add_backend(&root);
        let (tasks, runner, _reporter) = tasks_with(&root);
        runner.push_output(Some(0), "Docker version 27.3.1", "");
        runner.push_success();
        runner.push_success();

        tasks.build(true).expect("docker build should succeed");

        let invocations = runner.invocations();
        assert_eq!(
            invocations[1].command_string(),
            "docker build -t dh-frontend ."
        );
        assert_eq!(invocations[1].cwd.as_deref(), Some(frontend.as_path()));
        assert_eq!(
            invocations[2].command_string(),
            "docker build -t dh-backend ."
        );
        assert_eq!(invocations[2].cwd.as_deref(), Some(backend.as_path()));
    }

    #[test]
    fn build_with_docker_requires_docker() {
        let (_tmp, root) = workspace_root();
        add_frontend(&root);
        let (tasks, runner, _reporter) = tasks_with(&root);
        runner.push_exit_code(127);

        let err = tasks.build(true).expect_err("missing docker should fail");

        assert!(matches!(err, TaskError::DockerMissing));
        assert_eq!(runner.invocations().len(), 1, "no build may start");
    }

    #[test]
    fn tasks_need_a_detected_project() {
        let (_tmp, root) = workspace_root();
        let (tasks, _runner, _reporter) = tasks_with(&root);

        let err = tasks.build(false).expect_err("empty workspace should fail");

        assert!(matches!(err, TaskError::NoProjects));
    }

    #[test]
    fn install_covers_both_projects() {
        let (_tmp, root) = workspace_root();
        let frontend = add_frontend(&root);
        let backend = add_backend(&root);
        let (tasks, runner, _reporter) = tasks_with(&root);
        runner.push_success();
        runner.push_success();

        tasks.install().expect("install should succeed");

        let invocations = runner.invocations();
        assert_eq!(invocations[0].command_string(), "npm install");
        assert_eq!(invocations[0].cwd.as_deref(), Some(frontend.as_path()));
        assert_eq!(invocations[1].command_string(), "uv sync --dev");
        assert_eq!(invocations[1].cwd.as_deref(), Some(backend.as_path()));
    }

    #[test]
    fn clean_removes_only_existing_artefacts() {
        let (_tmp, root) = workspace_root();
        let frontend = add_frontend(&root);
        let backend = add_backend(&root);
        fs::create_dir(frontend.join("node_modules").as_std_path()).expect("mkdir");
        fs::create_dir(frontend.join(".next").as_std_path()).expect("mkdir");
        let (tasks, runner, _reporter) = tasks_with(&root);
        runner.push_success();
        runner.push_success();
        runner.push_success();

        tasks.clean().expect("clean should succeed");

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 3);
        assert_eq!(
            invocations[0].command_string(),
            format!("rm -rf {}", frontend.join("node_modules"))
        );
        assert_eq!(
            invocations[1].command_string(),
            format!("rm -rf {}", frontend.join(".next"))
        );
        assert_eq!(invocations[2].program, "find");
        assert!(invocations[2].command_string().contains(backend.as_str()));
    }

    #[test]
    fn failed_commands_surface_stderr_and_status() {
        let (_tmp, root) = workspace_root();
        add_frontend(&root);
        let (tasks, runner, reporter) = tasks_with(&root);
        runner.push_output(Some(1), "", "build exploded\n");

        let err = tasks.build(false).expect_err("failed build should error");

        let TaskError::CommandFailed { command, status } = err else {
            panic!("expected command failure, got {err:?}");
        };
        assert_eq!(command, "npm run build");
        assert_eq!(status, "status 1");
        assert!(reporter.contains(ReportLevel::Error, "build exploded"));
    }

    #[test]
    fn run_starts_containers_on_their_ports() {
        let (_tmp, root) = workspace_root();
        add_frontend(&root);
        add_backend(&root);
        let (tasks, runner, _reporter) = tasks_with(&root);
        runner.push_output(Some(0), "Docker version 27.3.1", "");
        runner.push_success();
        runner.push_success();

        tasks.run().expect("containers should start");

        let invocations = runner.invocations();
        assert_eq!(
            invocations[1].command_string(),
            "docker run --rm -d -p 3000:3000 dh-frontend"
        );
        assert_eq!(
            invocations[2].command_string(),
            "docker run --rm -d -p 8000:8000 dh-backend"
        );
    }
}
