//! Wires a detect and a build function up to the CNB `bin/detect` and `bin/build` executables.

use crate::config;
use crate::context::Context;
use crate::data::buildpack::BuildpackToml;
use crate::detect::{DetectResult, InnerDetectResult};
use crate::exit_code;
use crate::log::{log_error, log_info};
use crate::metrics::MetricsError;
use crate::{BuildpackError, Env, ErrorKind};
use libbuildpack_common::toml_file::{read_toml_file, write_toml_file, TomlFileError};
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::exit;

pub type DetectFn = fn(&Context) -> crate::Result<DetectResult>;
pub type BuildFn = fn(&mut Context) -> crate::Result<()>;

/// The file, relative to the layers directory, that receives the builder metrics.
pub const METRICS_FILE_NAME: &str = "builder-metrics.json";

#[derive(thiserror::Error, Debug)]
enum RuntimeError {
    #[error("Could not determine app directory: {0}")]
    CannotDetermineAppDirectory(std::io::Error),

    #[error("Could not determine buildpack directory: {0}")]
    CannotDetermineBuildpackDirectory(env::VarError),

    #[error("Cannot read buildpack descriptor (buildpack.toml): {0}")]
    CannotReadBuildpackDescriptor(TomlFileError),

    #[error("Cannot write build plan: {0}")]
    CannotWriteBuildPlan(TomlFileError),

    #[error("Cannot write launch.toml: {0}")]
    CannotWriteLaunch(TomlFileError),

    #[error("Cannot write builder metrics: {0}")]
    CannotWriteMetrics(String),

    #[error(transparent)]
    Buildpack(#[from] BuildpackError),
}

impl From<MetricsError> for RuntimeError {
    fn from(error: MetricsError) -> Self {
        Self::CannotWriteMetrics(error.to_string())
    }
}

/// Generates a main function for the given detect and build functions.
///
/// ```no_run
/// use libbuildpack::detect::{DetectResult, DetectResultBuilder};
/// use libbuildpack::{buildpack_main, Context};
///
/// fn detect(_ctx: &Context) -> libbuildpack::Result<DetectResult> {
///     Ok(DetectResultBuilder::pass("always").build())
/// }
///
/// fn build(ctx: &mut Context) -> libbuildpack::Result<()> {
///     ctx.log("Nothing to do");
///     Ok(())
/// }
///
/// buildpack_main!(detect, build);
/// ```
#[macro_export]
macro_rules! buildpack_main {
    ($detect:expr, $build:expr) => {
        fn main() {
            ::libbuildpack::runtime::buildpack_main($detect, $build);
        }
    };
}

/// Main entry point for this framework.
///
/// A single binary serves both phases. The filename it is invoked with (`detect` or `build`,
/// usually symlinks) selects the phase.
pub fn buildpack_main(detect: DetectFn, build: BuildFn) {
    // `args` instead of `current_exe` since the latter resolves symlinks on some platforms.
    let current_exe = env::args().next();
    let current_exe_file_name = current_exe
        .as_ref()
        .map(Path::new)
        .and_then(Path::file_name)
        .and_then(OsStr::to_str);

    let result = match current_exe_file_name {
        Some("detect") => run_detect(detect),
        Some("build") => run_build(build),
        other => {
            eprintln!(
                "Error: Expected the name of this executable to be 'detect' or 'build', but it was '{}'",
                other.unwrap_or("<unknown>")
            );
            eprintln!("The executable name is used to determine the current buildpack phase.");
            exit(exit_code::GENERIC_UNEXPECTED_EXECUTABLE_NAME_ERROR)
        }
    };

    match result {
        Ok(code) => exit(code),
        Err(error) => {
            let header = match &error {
                RuntimeError::Buildpack(buildpack_error)
                    if buildpack_error.kind() == ErrorKind::User =>
                {
                    "Build failed"
                }
                _ => "Internal buildpack error",
            };
            tracing::error!("{error}");
            log_error(header, error.to_string());
            exit(exit_code::GENERIC_UNSPECIFIED_ERROR)
        }
    }
}

fn run_detect(detect: DetectFn) -> Result<i32, RuntimeError> {
    let args: Vec<String> = env::args().collect();
    let [_, _platform_dir, build_plan_path] = args.as_slice() else {
        eprintln!("Usage: detect <platform_dir> <buildplan>");
        return Ok(exit_code::GENERIC_UNSPECIFIED_ERROR);
    };

    let context = new_context(None)?;

    match detect(&context)?.0 {
        InnerDetectResult::Fail { reason } => {
            log_info(format!("Opting out: {reason}"));
            Ok(exit_code::DETECT_DETECTION_FAILED)
        }
        InnerDetectResult::Pass { reason, build_plan } => {
            log_info(format!("Opting in: {reason}"));
            if let Some(build_plan) = build_plan {
                write_toml_file(&build_plan, build_plan_path)
                    .map_err(RuntimeError::CannotWriteBuildPlan)?;
            }
            Ok(exit_code::DETECT_DETECTION_PASSED)
        }
    }
}

fn run_build(build: BuildFn) -> Result<i32, RuntimeError> {
    let args: Vec<String> = env::args().collect();
    let [_, layers_dir, _platform_dir, _buildpack_plan_path] = args.as_slice() else {
        eprintln!("Usage: build <layers> <platform> <plan>");
        return Ok(exit_code::GENERIC_UNSPECIFIED_ERROR);
    };
    let layers_dir = PathBuf::from(layers_dir);

    let mut context = new_context(Some(&layers_dir))?;
    build(&mut context)?;
    write_build_output(&context)?;

    Ok(exit_code::GENERIC_SUCCESS)
}

fn new_context(layers_dir: Option<&Path>) -> Result<Context, RuntimeError> {
    let app_dir = env::current_dir().map_err(RuntimeError::CannotDetermineAppDirectory)?;
    let buildpack_dir = env::var(config::env::BUILDPACK_DIR)
        .map(PathBuf::from)
        .map_err(RuntimeError::CannotDetermineBuildpackDirectory)?;
    let descriptor: BuildpackToml = read_toml_file(buildpack_dir.join("buildpack.toml"))
        .map_err(RuntimeError::CannotReadBuildpackDescriptor)?;

    let mut builder = Context::builder(app_dir)
        .buildpack_dir(buildpack_dir)
        .buildpack(
            descriptor.buildpack.id.to_string(),
            descriptor.buildpack.version,
        )
        .env(Env::from_current());
    if let Some(layers_dir) = layers_dir {
        builder = builder.layers_dir(layers_dir);
    }

    Ok(builder.build())
}

/// Writes `launch.toml` and the builder metrics of a finished build.
fn write_build_output(context: &Context) -> Result<(), RuntimeError> {
    if !context.launch().is_empty() {
        write_toml_file(context.launch(), context.layers_dir().join("launch.toml"))
            .map_err(RuntimeError::CannotWriteLaunch)?;
    }

    if !context.metrics().is_empty() {
        fs::write(
            context.layers_dir().join(METRICS_FILE_NAME),
            context.metrics().to_json()?,
        )
        .map_err(|error| RuntimeError::CannotWriteMetrics(error.to_string()))?;
    }

    Ok(())
}
