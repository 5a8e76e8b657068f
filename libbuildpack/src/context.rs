// This lint triggers when both layer_dir and layers_dir are present which are quite common.
#![allow(clippy::similar_names)]

use crate::config::{self, FeatureGates, ReleaseTrack};
use crate::data::launch::{Launch, Process};
use crate::data::layer_content_metadata::LayerTypes;
use crate::exec::{CommandRunner, CommandSpec, ExecError, ExecResult, SystemCommandRunner};
use crate::layer::{self, Layer};
use crate::log::log_info;
use crate::metrics::MetricsRegistry;
use crate::{BuildpackError, Env, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Options for [`Context::exec`].
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    env: Vec<(String, String)>,
    dir: Option<PathBuf>,
    user_attribution: bool,
}

impl ExecOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an environment variable for this command only, on top of the context env.
    #[must_use]
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    /// Runs the command in `dir` instead of the application directory.
    #[must_use]
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Marks failures of this command as fixable by the user and streams its output to the log.
    #[must_use]
    pub fn user_attribution(mut self) -> Self {
        self.user_attribution = true;
        self
    }
}

/// Everything a detect or build function can do with the outside world.
///
/// Detect functions receive a shared reference and can only inspect. Build functions receive a
/// mutable reference and can additionally change the env of later commands and add launch
/// processes.
pub struct Context {
    app_dir: PathBuf,
    layers_dir: PathBuf,
    buildpack_dir: PathBuf,
    buildpack_id: String,
    buildpack_version: String,
    stack_id: String,
    env: Env,
    runner: Box<dyn CommandRunner>,
    metrics: Arc<MetricsRegistry>,
    launch: Launch,
    warnings: Mutex<Vec<String>>,
    debug: bool,
}

impl Context {
    pub fn builder(app_dir: impl Into<PathBuf>) -> ContextBuilder {
        ContextBuilder::new(app_dir)
    }

    #[must_use]
    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    #[must_use]
    pub fn layers_dir(&self) -> &Path {
        &self.layers_dir
    }

    #[must_use]
    pub fn buildpack_dir(&self) -> &Path {
        &self.buildpack_dir
    }

    #[must_use]
    pub fn buildpack_id(&self) -> &str {
        &self.buildpack_id
    }

    #[must_use]
    pub fn buildpack_version(&self) -> &str {
        &self.buildpack_version
    }

    #[must_use]
    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    #[must_use]
    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Returns the value of an environment variable. Empty values are treated as unset.
    #[must_use]
    pub fn env_var(&self, name: &str) -> Option<String> {
        self.env.non_empty(name)
    }

    /// Sets an environment variable for all commands this context runs afterwards.
    pub fn set_env(&mut self, name: impl Into<OsString>, value: impl Into<OsString>) {
        self.env.insert(name, value);
    }

    #[must_use]
    pub fn release_track(&self) -> ReleaseTrack {
        ReleaseTrack::from_env(&self.env)
    }

    #[must_use]
    pub fn feature_gates(&self) -> FeatureGates {
        FeatureGates::for_track(self.release_track())
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    #[must_use]
    pub fn launch(&self) -> &Launch {
        &self.launch
    }

    /// Adds a launch process. A process of the same type is replaced.
    pub fn add_process(&mut self, process: Process) {
        if let Some(replaced) = self.launch.upsert_process(process) {
            self.debug(format!("Replacing launch process {:?}", replaced.r#type.as_str()));
        }
    }

    /// Returns true if a file or directory exists. Relative paths are resolved against the
    /// application directory.
    #[must_use]
    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.app_dir.join(path).exists()
    }

    /// Reads a file as UTF-8. Relative paths are resolved against the application directory.
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<String> {
        Ok(fs::read_to_string(self.app_dir.join(path))?)
    }

    pub fn read_bytes(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        Ok(fs::read(self.app_dir.join(path))?)
    }

    /// Runs a command and fails if it exits with a non-zero code.
    ///
    /// The error is a user error when the options carry user attribution.
    pub fn exec<I, S>(&self, args: I, options: &ExecOptions) -> Result<ExecResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let command = self.command_spec(args, options)?;
        let result = self.run(&command, options)?;

        if result.success() {
            Ok(result)
        } else {
            Err(BuildpackError::Exec {
                source: ExecError::NonZeroExit {
                    command: command.command_line(),
                    result,
                },
                user_attributed: options.user_attribution,
            })
        }
    }

    /// Runs a command and returns its result regardless of the exit code.
    pub fn exec_unchecked<I, S>(&self, args: I, options: &ExecOptions) -> Result<ExecResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let command = self.command_spec(args, options)?;
        self.run(&command, options)
    }

    fn command_spec<I, S>(&self, args: I, options: &ExecOptions) -> Result<CommandSpec>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.into_iter().map(|arg| arg.as_ref().to_string());
        let program = args
            .next()
            .ok_or_else(|| BuildpackError::internal("Cannot run an empty command"))?;

        let mut env = self.env.clone();
        for (name, value) in &options.env {
            env.insert(name, value);
        }

        Ok(CommandSpec {
            program,
            args: args.collect(),
            env,
            current_dir: options.dir.clone().unwrap_or_else(|| self.app_dir.clone()),
            stream_output: options.user_attribution || self.debug,
        })
    }

    fn run(&self, command: &CommandSpec, options: &ExecOptions) -> Result<ExecResult> {
        let command_line = command.command_line();
        tracing::info!(command = %command_line, "running command");
        if options.user_attribution || self.debug {
            log_info(format!("Running {command_line:?}"));
        }

        let result = self.runner.run(command)?;
        tracing::debug!(
            command = %command_line,
            exit_code = result.exit_code,
            "command finished"
        );

        Ok(result)
    }

    /// Opens a layer in the layers directory with the given types. Metadata and env of an
    /// existing layer are restored.
    pub fn layer(&self, name: &str, types: LayerTypes) -> Result<Layer> {
        Ok(layer::open_layer(&self.layers_dir, name, types)?)
    }

    /// Removes all contents, metadata and env of a layer.
    pub fn clear_layer(&self, layer: &mut Layer) -> Result<()> {
        self.debug(format!("Clearing layer {:?}", layer.name().as_str()));
        Ok(layer::clear_layer(&self.layers_dir, layer)?)
    }

    /// Persists a layer's types, metadata and env.
    pub fn write_layer(&self, layer: &Layer) -> Result<()> {
        Ok(layer::write_layer(&self.layers_dir, layer)?)
    }

    pub fn log(&self, message: impl AsRef<str>) {
        log_info(message);
    }

    /// Logs a warning. Warnings never fail the build.
    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::warn!("{message}");
        log_info(format!("WARNING: {message}"));
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }

    /// Logs a message only when debug output is enabled.
    pub fn debug(&self, message: impl AsRef<str>) {
        tracing::debug!("{}", message.as_ref());
        if self.debug {
            log_info(format!("DEBUG: {}", message.as_ref()));
        }
    }

    /// The warnings logged so far.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cache_hit(&self, layer_name: &str) {
        tracing::info!(layer = layer_name, cache = "hit");
        log_info(format!("Cache hit: {layer_name:?}"));
    }

    pub fn cache_miss(&self, layer_name: &str) {
        tracing::info!(layer = layer_name, cache = "miss");
        log_info(format!("Cache miss: {layer_name:?}"));
    }
}

/// Builds [`Context`] values.
///
/// ```
/// use libbuildpack::{Context, Env};
///
/// let mut env = Env::new();
/// env.insert("CNB_STACK_ID", "google.24");
///
/// let context = Context::builder("/workspace")
///     .layers_dir("/layers/google.python.pip")
///     .buildpack("google.python.pip", "0.9.1")
///     .env(env)
///     .build();
///
/// assert_eq!(context.stack_id(), "google.24");
/// assert!(context.file_exists("/"));
/// ```
pub struct ContextBuilder {
    app_dir: PathBuf,
    layers_dir: PathBuf,
    buildpack_dir: PathBuf,
    buildpack_id: String,
    buildpack_version: String,
    stack_id: Option<String>,
    env: Env,
    runner: Box<dyn CommandRunner>,
    metrics: Arc<MetricsRegistry>,
}

impl ContextBuilder {
    fn new(app_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_dir: app_dir.into(),
            layers_dir: PathBuf::new(),
            buildpack_dir: PathBuf::new(),
            buildpack_id: String::new(),
            buildpack_version: String::new(),
            stack_id: None,
            env: Env::new(),
            runner: Box::new(SystemCommandRunner),
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    #[must_use]
    pub fn layers_dir(mut self, layers_dir: impl Into<PathBuf>) -> Self {
        self.layers_dir = layers_dir.into();
        self
    }

    #[must_use]
    pub fn buildpack_dir(mut self, buildpack_dir: impl Into<PathBuf>) -> Self {
        self.buildpack_dir = buildpack_dir.into();
        self
    }

    #[must_use]
    pub fn buildpack(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.buildpack_id = id.into();
        self.buildpack_version = version.into();
        self
    }

    /// Sets the stack id. Defaults to the value of `CNB_STACK_ID` in the env.
    #[must_use]
    pub fn stack_id(mut self, stack_id: impl Into<String>) -> Self {
        self.stack_id = Some(stack_id.into());
        self
    }

    #[must_use]
    pub fn env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn build(self) -> Context {
        let debug = self
            .env
            .non_empty(config::env::DEBUG)
            .is_some_and(|value| {
                config::parse_bool(config::env::DEBUG, &value).unwrap_or_else(|error| {
                    tracing::warn!("{error}");
                    false
                })
            });

        let stack_id = self
            .stack_id
            .or_else(|| self.env.non_empty(config::env::STACK_ID))
            .unwrap_or_default();

        Context {
            app_dir: self.app_dir,
            layers_dir: self.layers_dir,
            buildpack_dir: self.buildpack_dir,
            buildpack_id: self.buildpack_id,
            buildpack_version: self.buildpack_version,
            stack_id,
            env: self.env,
            runner: self.runner,
            metrics: self.metrics,
            launch: Launch::new(),
            warnings: Mutex::new(Vec::new()),
            debug,
        }
    }
}
