//! Helpers for unit testing detect and build functions without real processes.

use crate::context::Context;
use crate::exec::{CommandRunner, CommandSpec, ExecError, ExecResult};
use crate::metrics::MetricsRegistry;
use crate::Env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempDir;

/// A [`CommandRunner`] that returns scripted results and records every command it receives.
///
/// Results are matched by command line prefix, the first registered match wins. Commands without
/// a matching script succeed with empty output. Clones share their scripts and recordings, so a
/// clone can be kept for assertions after the runner was moved into a [`Context`].
///
/// ```
/// use libbuildpack::exec::{CommandRunner, CommandSpec};
/// use libbuildpack::testing::ScriptedRunner;
/// use libbuildpack::Env;
///
/// let runner = ScriptedRunner::new().stdout("python3 --version", "Python 3.13.1");
///
/// let result = runner
///     .run(&CommandSpec {
///         program: String::from("python3"),
///         args: vec![String::from("--version")],
///         env: Env::new(),
///         current_dir: std::env::temp_dir(),
///         stream_output: false,
///     })
///     .unwrap();
///
/// assert_eq!(result.stdout, "Python 3.13.1");
/// assert_eq!(runner.command_lines(), vec!["python3 --version"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    scripts: Arc<Mutex<Vec<(String, ExecResult)>>>,
    commands: Arc<Mutex<Vec<CommandSpec>>>,
}

impl ScriptedRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the full result for commands starting with `prefix`.
    #[must_use]
    pub fn result(self, prefix: impl Into<String>, result: ExecResult) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((prefix.into(), result));
        self
    }

    /// Scripts a successful result with the given stdout.
    #[must_use]
    pub fn stdout(self, prefix: impl Into<String>, stdout: impl Into<String>) -> Self {
        let stdout = stdout.into();
        self.result(
            prefix,
            ExecResult {
                combined: stdout.clone(),
                stdout,
                ..ExecResult::default()
            },
        )
    }

    /// Scripts a failed result with the given exit code and output.
    #[must_use]
    pub fn failure(self, prefix: impl Into<String>, exit_code: i32, output: impl Into<String>) -> Self {
        let output = output.into();
        self.result(
            prefix,
            ExecResult {
                stdout: output.clone(),
                combined: output,
                exit_code,
                ..ExecResult::default()
            },
        )
    }

    /// All commands run so far.
    #[must_use]
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The command lines of all commands run so far.
    #[must_use]
    pub fn command_lines(&self) -> Vec<String> {
        self.commands()
            .iter()
            .map(CommandSpec::command_line)
            .collect()
    }

    /// Returns the first recorded command whose command line starts with `prefix`.
    #[must_use]
    pub fn find(&self, prefix: &str) -> Option<CommandSpec> {
        self.commands()
            .into_iter()
            .find(|command| command.command_line().starts_with(prefix))
    }

    #[must_use]
    pub fn ran(&self, prefix: &str) -> bool {
        self.find(prefix).is_some()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &CommandSpec) -> Result<ExecResult, ExecError> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.clone());

        let command_line = command.command_line();
        Ok(self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(prefix, _)| command_line.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }
}

/// A [`Context`] over temporary directories, together with the runner it uses.
pub struct TestContext {
    pub context: Context,
    pub runner: ScriptedRunner,
    pub metrics: Arc<MetricsRegistry>,
    app_dir: TempDir,
    layers_dir: TempDir,
    buildpack_dir: TempDir,
}

impl TestContext {
    #[must_use]
    pub fn app_dir(&self) -> &Path {
        self.app_dir.path()
    }

    #[must_use]
    pub fn layers_dir(&self) -> &Path {
        self.layers_dir.path()
    }

    #[must_use]
    pub fn buildpack_dir(&self) -> &Path {
        self.buildpack_dir.path()
    }

    /// Writes a file below the application directory, creating parent directories.
    ///
    /// # Panics
    ///
    /// Panics if the file can't be written.
    pub fn write_app_file(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
        write_file(self.app_dir.path(), path.as_ref(), contents.as_ref());
    }
}

/// Builds a [`TestContext`].
///
/// ```
/// use libbuildpack::testing::{ScriptedRunner, TestContextBuilder};
///
/// let test = TestContextBuilder::new()
///     .file("requirements.txt", "flask\n")
///     .env("GOOGLE_RUNTIME", "python")
///     .runner(ScriptedRunner::new().stdout("python3 --version", "Python 3.13.1"))
///     .build();
///
/// assert!(test.context.file_exists("requirements.txt"));
/// assert_eq!(test.context.env_var("GOOGLE_RUNTIME").as_deref(), Some("python"));
/// ```
#[derive(Default)]
pub struct TestContextBuilder {
    files: Vec<(PathBuf, Vec<u8>)>,
    buildpack_files: Vec<(PathBuf, Vec<u8>)>,
    env: Vec<(String, String)>,
    stack_id: Option<String>,
    runner: ScriptedRunner,
    buildpack_id: Option<String>,
    buildpack_version: Option<String>,
}

impl TestContextBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file to the application directory.
    #[must_use]
    pub fn file(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push((path.into(), contents.into()));
        self
    }

    /// Adds a file to the buildpack directory.
    #[must_use]
    pub fn buildpack_file(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.buildpack_files.push((path.into(), contents.into()));
        self
    }

    #[must_use]
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn stack_id(mut self, stack_id: impl Into<String>) -> Self {
        self.stack_id = Some(stack_id.into());
        self
    }

    #[must_use]
    pub fn runner(mut self, runner: ScriptedRunner) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn buildpack(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.buildpack_id = Some(id.into());
        self.buildpack_version = Some(version.into());
        self
    }

    /// # Panics
    ///
    /// Panics if the temporary directories or files can't be created.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn build(self) -> TestContext {
        let app_dir = tempfile::tempdir().expect("Couldn't create temporary app directory");
        let layers_dir = tempfile::tempdir().expect("Couldn't create temporary layers directory");
        let buildpack_dir =
            tempfile::tempdir().expect("Couldn't create temporary buildpack directory");

        for (path, contents) in &self.files {
            write_file(app_dir.path(), path, contents);
        }
        for (path, contents) in &self.buildpack_files {
            write_file(buildpack_dir.path(), path, contents);
        }

        let env: Env = self.env.into_iter().collect();
        let metrics = Arc::new(MetricsRegistry::new());

        let mut builder = Context::builder(app_dir.path())
            .layers_dir(layers_dir.path())
            .buildpack_dir(buildpack_dir.path())
            .buildpack(
                self.buildpack_id
                    .unwrap_or_else(|| String::from("google.python.test")),
                self.buildpack_version
                    .unwrap_or_else(|| String::from("0.0.1")),
            )
            .env(env)
            .runner(self.runner.clone())
            .metrics(Arc::clone(&metrics));
        if let Some(stack_id) = self.stack_id {
            builder = builder.stack_id(stack_id);
        }

        TestContext {
            context: builder.build(),
            runner: self.runner,
            metrics,
            app_dir,
            layers_dir,
            buildpack_dir,
        }
    }
}

#[allow(clippy::expect_used)]
fn write_file(root: &Path, path: &Path, contents: &[u8]) {
    let path = root.join(path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Couldn't create parent directory of test file");
    }
    fs::write(path, contents).expect("Couldn't write test file");
}
