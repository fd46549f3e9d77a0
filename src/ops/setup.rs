//! Interactive first-run setup.
//!
//! Setup walks a fixed sequence of numbered steps: detect the project
//! layout, check local tooling, capture database credentials, install
//! dependencies, and write the configuration files. Credentials always
//! land in the git-ignored local file; the checked-in file only ever
//! receives project paths and preferences.

use std::ffi::OsString;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use tracing::debug;

use crate::config::{Config, DbConfig};
use crate::config_store::{ConfigStore, ConfigStoreError, SECRETS_FILE_NAME};
use crate::endpoint::derive_project_ref;
use crate::prompt::{PromptError, Prompter};
use crate::report::Reporter;
use crate::runner::{CommandRunner, display_command, os_args, status_text};
use crate::tools::tool_version;
use crate::workspace::{Workspace, WorkspaceError};

const GITIGNORE_FILE_NAME: &str = ".gitignore";
const GITIGNORE_HEADER: &str = "# dh";
const UV_INSTALL_HINT: &str = "install uv: curl -LsSf https://astral.sh/uv/install.sh | sh";

/// Errors that abort the setup workflow.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Raised when neither project role is detected.
    #[error("no projects detected in the workspace")]
    NoProjects,
    /// Raised when project detection fails.
    #[error("workspace inspection failed: {0}")]
    Workspace(#[from] WorkspaceError),
    /// Raised when configuration files cannot be read or written.
    #[error(transparent)]
    Config(#[from] ConfigStoreError),
    /// Raised when the terminal cannot be read.
    #[error(transparent)]
    Prompt(#[from] PromptError),
    /// Raised when required tools are not installed.
    #[error("missing required tools: {}", .tools.join(", "))]
    MissingTools {
        /// Names of the tools that could not be found.
        tools: Vec<String>,
    },
    /// Raised when project files cannot be updated.
    #[error("failed to update {path}: {message}")]
    Io {
        /// File that could not be updated.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// Workflow behind `dh setup`.
pub struct SetupWorkflow<Run, P, R> {
    store: ConfigStore,
    runner: Run,
    prompter: P,
    reporter: R,
}

impl<Run, P, R> SetupWorkflow<Run, P, R>
where
    Run: CommandRunner,
    P: Prompter,
    R: Reporter,
{
    /// Builds the workflow around a configuration store and its
    /// collaborators.
    pub const fn new(store: ConfigStore, runner: Run, prompter: P, reporter: R) -> Self {
        Self {
            store,
            runner,
            prompter,
            reporter,
        }
    }

    /// Runs the full setup sequence.
    ///
    /// Dependency installation failures only produce warnings; the
    /// configuration files are still written.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::NoProjects`] when nothing is detected,
    /// [`SetupError::MissingTools`] when a required tool is absent, and
    /// the underlying error when detection, prompting, or file writes
    /// fail.
    pub fn run(&self) -> Result<(), SetupError> {
        let config = self.store.load()?;

        self.reporter.step(1, "Detecting project layout");
        let workspace = Workspace::detect(self.store.root(), &config)?;
        self.report_detection(&workspace, config.preferences.disable_detection_warnings);
        if workspace.is_empty() {
            self.reporter
                .info("expected frontend markers: package.json plus a next.config file");
            self.reporter
                .info("expected backend markers: pyproject.toml and main.py");
            return Err(SetupError::NoProjects);
        }

        self.reporter.step(2, "Checking local tools");
        self.check_tools(&workspace)?;

        self.reporter.step(3, "Configuring database access");
        self.configure_database(&config.db)?;

        self.reporter.step(4, "Installing dependencies");
        if config.preferences.auto_install_dependencies {
            self.install_dependencies(&workspace);
        } else {
            self.reporter
                .info("dependency installation disabled in preferences");
        }

        self.reporter.step(5, "Writing project files");
        self.finalise(&config)?;

        self.reporter
            .info("next: run 'dh validate' to verify the environment");
        Ok(())
    }

    fn report_detection(&self, workspace: &Workspace, quiet: bool) {
        if let Some(frontend) = &workspace.frontend {
            self.reporter.success(&format!("frontend found at {frontend}"));
        } else if !quiet {
            self.reporter.warning("no frontend project detected");
        }
        if let Some(backend) = &workspace.backend {
            self.reporter.success(&format!("backend found at {backend}"));
        } else if !quiet {
            self.reporter.warning("no backend project detected");
        }
    }

    fn check_tools(&self, workspace: &Workspace) -> Result<(), SetupError> {
        let mut required = Vec::new();
        if workspace.frontend.is_some() {
            required.extend(["node", "npm"]);
        }
        if workspace.backend.is_some() {
            required.push("uv");
        }

        let mut missing = Vec::new();
        for tool in required {
            match tool_version(&self.runner, tool) {
                Some(version) => self.reporter.info(&format!("{tool} {version}")),
                None => {
                    if tool == "uv" {
                        self.reporter.info(UV_INSTALL_HINT);
                    }
                    missing.push(tool.to_owned());
                }
            }
        }

        match tool_version(&self.runner, "docker") {
            Some(version) => self.reporter.info(&format!("docker {version}")),
            None => self
                .reporter
                .warning("docker not found; container commands will be unavailable"),
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SetupError::MissingTools { tools: missing })
        }
    }

    fn configure_database(&self, current: &DbConfig) -> Result<(), SetupError> {
        if !self
            .prompter
            .confirm("Configure Supabase credentials now?", true)?
        {
            debug!("credential capture skipped");
            self.reporter.info("keeping existing database configuration");
            return Ok(());
        }

        let mut db = current.clone();
        db.url = self.prompt_field("Supabase project URL", db.url.as_deref(), false)?;
        db.secret_key = self.prompt_field(
            "Secret key (sb_secret_... or service_role JWT)",
            db.secret_key.as_deref(),
            true,
        )?;
        db.anon_key = self.prompt_field("Publishable key", db.anon_key.as_deref(), false)?;
        db.password = self.prompt_field("Database password", db.password.as_deref(), true)?;

        if db.project_ref.is_none()
            && let Some(url) = db.url.as_deref()
        {
            db.project_ref = derive_project_ref(url);
        }

        let path = self.store.save_secrets(&db)?;
        self.reporter
            .success(&format!("credentials saved to {path}"));
        Ok(())
    }

    fn prompt_field(
        &self,
        message: &str,
        current: Option<&str>,
        sensitive: bool,
    ) -> Result<Option<String>, SetupError> {
        let answer = self.prompter.text(message, current, sensitive)?;
        let trimmed = answer.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_owned()))
        }
    }

    fn install_dependencies(&self, workspace: &Workspace) {
        if let Some(frontend) = &workspace.frontend {
            self.run_install(frontend, "npm", &os_args(["install"]));
        }
        if let Some(backend) = &workspace.backend {
            self.run_install(backend, "uv", &os_args(["sync", "--dev"]));
        }
    }

    fn run_install(&self, dir: &Utf8Path, program: &str, args: &[OsString]) {
        let rendered = display_command(program, args);
        self.reporter.info(&format!("running {rendered} in {dir}"));
        match self.runner.run(program, args, Some(dir)) {
            Ok(output) if output.is_success() => {
                self.reporter.success(&format!("{rendered} finished"));
            }
            Ok(output) => self.reporter.warning(&format!(
                "{rendered} exited with {}; install dependencies manually",
                status_text(output.code)
            )),
            Err(err) => self.reporter.warning(&err.to_string()),
        }
    }

    fn finalise(&self, config: &Config) -> Result<(), SetupError> {
        if ensure_gitignore_entry(self.store.root())? {
            self.reporter
                .success(&format!("{SECRETS_FILE_NAME} added to {GITIGNORE_FILE_NAME}"));
        } else {
            self.reporter
                .info(&format!("{SECRETS_FILE_NAME} already ignored"));
        }

        let path = self
            .store
            .save_project(&config.project, &config.preferences)?;
        self.reporter
            .success(&format!("project settings saved to {path}"));
        Ok(())
    }
}

/// Appends the credentials file to `.gitignore` unless already listed.
/// Returns `true` when an entry was added.
fn ensure_gitignore_entry(root: &Utf8Path) -> Result<bool, SetupError> {
    let dir = Dir::open_ambient_dir(root, ambient_authority()).map_err(|err| SetupError::Io {
        path: root.to_path_buf(),
        message: err.to_string(),
    })?;

    let current = match dir.read_to_string(GITIGNORE_FILE_NAME) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(SetupError::Io {
                path: root.join(GITIGNORE_FILE_NAME),
                message: err.to_string(),
            });
        }
    };

    if current.lines().any(|line| line.trim() == SECRETS_FILE_NAME) {
        return Ok(false);
    }

    let mut updated = current;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    if !updated.is_empty() {
        updated.push('\n');
    }
    updated.push_str(GITIGNORE_HEADER);
    updated.push('\n');
    updated.push_str(SECRETS_FILE_NAME);
    updated.push('\n');

    dir.write(GITIGNORE_FILE_NAME, updated)
        .map_err(|err| SetupError::Io {
            path: root.join(GITIGNORE_FILE_NAME),
            message: err.to_string(),
        })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::{Utf8Path, Utf8PathBuf};
    use tempfile::TempDir;

    use crate::test_support::{RecordingReporter, ReportLevel, ScriptedPrompter, ScriptedRunner};

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

    fn setup_with(
        root: &Utf8Path,
    ) -> (
        SetupWorkflow<ScriptedRunner, ScriptedPrompter, RecordingReporter>,
        ScriptedRunner,
        ScriptedPrompter,
        RecordingReporter,
    ) {
        let runner = ScriptedRunner::new();
        let prompter = ScriptedPrompter::new();
        let reporter = RecordingReporter::new();
        let workflow = SetupWorkflow::new(
            ConfigStore::new(root.to_path_buf()),
            runner.clone(),
            prompter.clone(),
            reporter.clone(),
        );
        (workflow, runner, prompter, reporter)
    }

    #[test]
    fn setup_saves_credentials_and_writes_project_files() {
        let (_tmp, root) = workspace_root();
        let frontend = add_frontend(&root);
        let (workflow, runner, prompter, _reporter) = setup_with(&root);
        runner.push_output(Some(0), "v22.11.0\n", "");
        runner.push_output(Some(0), "10.9.2\n", "");
        runner.push_exit_code(1);
        runner.push_success();
        prompter.push_confirm(true);
        prompter.push_text("https://abc123.supabase.co");
        prompter.push_text("sb_secret_k");
        prompter.push_text("anon_k");
        prompter.push_text("db_pw");

        workflow.run().expect("setup should succeed");

        let secrets =
            fs::read_to_string(root.join(".dh.local.toml").as_std_path()).expect("secrets file");
        assert!(secrets.contains("url = \"https://abc123.supabase.co\""));
        assert!(secrets.contains("secret_key = \"sb_secret_k\""));
        assert!(secrets.contains("project_ref = \"abc123\""));
        let gitignore =
            fs::read_to_string(root.join(".gitignore").as_std_path()).expect("gitignore");
        assert!(gitignore.contains(".dh.local.toml"));
        assert!(root.join("dh.toml").as_std_path().exists());
        let invocations = runner.invocations();
        let install = invocations.last().expect("npm install should run");
        assert_eq!(install.command_string(), "npm install");
        assert_eq!(install.cwd.as_deref(), Some(frontend.as_path()));
    }

    #[test]
    fn setup_stops_when_required_tools_are_missing() {
        let (_tmp, root) = workspace_root();
        add_frontend(&root);
        let (workflow, runner, prompter, _reporter) = setup_with(&root);
        runner.push_exit_code(127);
        runner.push_exit_code(127);
        runner.push_output(Some(0), "Docker version 27.3.1", "");

        let err = workflow.run().expect_err("missing tools should abort setup");

        let SetupError::MissingTools { tools } = err else {
            panic!("expected missing tools, got {err:?}");
        };
        assert_eq!(tools, ["node", "npm"]);
        assert!(
            prompter.messages().is_empty(),
            "credentials must not be requested"
        );
    }

    #[test]
    fn setup_keeps_existing_credentials_when_declined() {
        let (_tmp, root) = workspace_root();
        add_frontend(&root);
        let (workflow, runner, prompter, reporter) = setup_with(&root);
        runner.push_output(Some(0), "v22.11.0", "");
        runner.push_output(Some(0), "10.9.2", "");
        runner.push_output(Some(0), "Docker version 27.3.1", "");
        runner.push_success();
        prompter.push_confirm(false);

        workflow.run().expect("setup should succeed");

        assert!(!root.join(".dh.local.toml").as_std_path().exists());
        assert!(root.join("dh.toml").as_std_path().exists());
        assert!(reporter.contains(ReportLevel::Warning, "no backend project detected"));
    }

    #[test]
    fn setup_fails_when_nothing_is_detected() {
        let (_tmp, root) = workspace_root();
        let (workflow, _runner, prompter, reporter) = setup_with(&root);

        let err = workflow.run().expect_err("empty workspace should abort setup");

        assert!(matches!(err, SetupError::NoProjects));
        assert!(reporter.contains(ReportLevel::Info, "package.json"));
        assert!(
            prompter.messages().is_empty(),
            "credentials must not be requested"
        );
    }

    #[test]
    fn setup_reports_the_uv_install_hint() {
        let (_tmp, root) = workspace_root();
        add_backend(&root);
        let (workflow, runner, _prompter, reporter) = setup_with(&root);
        runner.push_exit_code(127);
        runner.push_output(Some(0), "Docker version 27.3.1", "");

        let err = workflow.run().expect_err("missing uv should abort setup");

        let SetupError::MissingTools { tools } = err else {
            panic!("expected missing tools, got {err:?}");
        };
        assert_eq!(tools, ["uv"]);
        assert!(reporter.contains(ReportLevel::Info, "astral.sh/uv"));
    }

    #[test]
    fn setup_does_not_duplicate_gitignore_entries() {
        let (_tmp, root) = workspace_root();
        add_frontend(&root);
        fs::write(
            root.join(".gitignore").as_std_path(),
            "node_modules\n\n# dh\n.dh.local.toml\n",
        )
        .expect("write gitignore");
        let (workflow, runner, prompter, _reporter) = setup_with(&root);
        runner.push_output(Some(0), "v22.11.0", "");
        runner.push_output(Some(0), "10.9.2", "");
        runner.push_output(Some(0), "Docker version 27.3.1", "");
        runner.push_success();
        prompter.push_confirm(false);

        workflow.run().expect("setup should succeed");

        let gitignore =
            fs::read_to_string(root.join(".gitignore").as_std_path()).expect("gitignore");
        assert_eq!(gitignore.matches(".dh.local.toml").count(), 1);
    }

    #[test]
    fn setup_honours_the_install_preference() {
        let (_tmp, root) = workspace_root();
        add_frontend(&root);
        fs::write(
            root.join("dh.toml").as_std_path(),
            "[preferences]\nauto_install_dependencies = false\n",
        )
        .expect("write dh.toml");
        let (workflow, runner, prompter, reporter) = setup_with(&root);
        runner.push_output(Some(0), "v22.11.0", "");
        runner.push_output(Some(0), "10.9.2", "");
        runner.push_output(Some(0), "Docker version 27.3.1", "");
        prompter.push_confirm(false);

        workflow.run().expect("setup should succeed");

        assert_eq!(
            runner.invocations().len(),
            3,
            "no install commands should run"
        );
        assert!(reporter.contains(ReportLevel::Info, "disabled"));
    }
}
