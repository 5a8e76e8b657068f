//! Installing dependencies with pip, uv and poetry.

use crate::manifest::RequirementsFiles;
use crate::runtime_version::python_version;
use libbuildpack::config::env;
use libbuildpack::context::ExecOptions;
use libbuildpack::layer::Layer;
use libbuildpack::layer_env::PATH_LIST_SEPARATOR;
use libbuildpack::metrics::MetricId;
use libbuildpack::{BuildpackError, Context, Result};
use std::path::{Path, PathBuf};

pub mod pip;
pub mod poetry;
pub mod tool;
pub mod uv;

/// Installs `requirements.txt` files into a layer.
///
/// The pip buildpack is constructed with one of these. [`pip::UserSitePipInstaller`] is the
/// default, [`pip::TargetDirPipInstaller`] is used where dependencies have to end up in the
/// application directory.
pub trait PipInstaller {
    fn install(
        &self,
        context: &mut Context,
        layer: &mut Layer,
        requirements: &RequirementsFiles,
    ) -> Result<()>;
}

/// Converts a command given as string slices to owned arguments that can be extended.
pub(crate) fn command(args: &[&str]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

/// `python3 -m pip install` arguments shared by all requirements file installs.
pub(crate) fn base_pip_install_args(requirements_file: &Path) -> Vec<String> {
    let mut args = command(&["python3", "-m", "pip", "install", "--requirement"]);
    args.push(requirements_file.to_string_lossy().into_owned());
    args.extend(command(&[
        "--upgrade",
        "--upgrade-strategy",
        "only-if-needed",
        // bin is added to PATH at launch by the lifecycle.
        "--no-warn-script-location",
        // Conflicts are reported by a separate check after all files are installed.
        "--no-warn-conflicts",
        // Later requirements files override earlier ones.
        "--force-reinstall",
        // Bytecode is compiled deterministically afterwards.
        "--no-compile",
        "--disable-pip-version-check",
    ]));
    args
}

/// Makes pip, uv and poetry install from the vendored dependency directory instead of an
/// index, if `GOOGLE_VENDOR_PIP_DEPENDENCIES` is set.
pub(crate) fn append_vendoring_flags(context: &Context, args: &mut Vec<String>) {
    // An empty value still opts in and means the application directory.
    if let Some(vendor_dir) = context
        .env()
        .get_string_lossy(env::VENDOR_PIP_DEPENDENCIES)
    {
        context
            .metrics()
            .counter(MetricId::VendorPipDependenciesUses)
            .increment(1);
        args.extend([String::from("--no-index"), String::from("--find-links"), vendor_dir]);
    }
}

/// Generates hash-based pycs (PEP 552) that are not validated at startup.
pub(crate) fn compile_bytecode(context: &Context, path: &Path) -> Result<()> {
    let path = path.to_string_lossy();
    let result = context.exec_unchecked(
        [
            "python3",
            "-m",
            "compileall",
            "--invalidation-mode",
            "unchecked-hash",
            "-qq",
            &*path,
        ],
        &ExecOptions::new().user_attribution(),
    )?;

    // Exit code 1 means some files didn't compile, pip ignores those as well.
    match result.exit_code {
        0 | 1 => Ok(()),
        _ => Err(BuildpackError::user(format!(
            "compileall: {}",
            result.combined
        ))),
    }
}

/// Runs `check_command` (`pip check` or `uv pip check`) and fails the build on incompatible
/// dependencies. Python 3.7 only gets a warning.
pub(crate) fn check_incompatible_dependencies(
    context: &Context,
    check_command: &[&str],
    options: &ExecOptions,
) -> Result<()> {
    context.log("Checking for incompatible dependencies.");
    let result = context.exec_unchecked(check_command, &options.clone().user_attribution())?;
    if result.success() {
        return Ok(());
    }

    if python_version(context)?.starts_with("Python 3.7") {
        context.warn(format!(
            "Found incompatible dependencies: {:?}",
            result.stdout
        ));
        return Ok(());
    }

    Err(BuildpackError::user(format!(
        "found incompatible dependencies: {:?}",
        result.stdout
    )))
}

/// The absolute paths of those `files` that exist in the application directory.
pub(crate) fn existing_app_files(context: &Context, files: &[&str]) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|file| context.file_exists(file))
        .map(|file| context.app_dir().join(file))
        .collect()
}

/// Strips the `Python ` prefix from the output of `python3 --version`.
pub(crate) fn bare_python_version(version: &str) -> &str {
    version.strip_prefix("Python ").unwrap_or(version)
}

/// Puts `dir` in front of `PATH` for the commands the context runs afterwards.
pub(crate) fn prepend_context_path(context: &mut Context, dir: &Path) {
    let path = match context.env().get_string_lossy("PATH") {
        Some(path) if !path.is_empty() => {
            format!("{}{PATH_LIST_SEPARATOR}{path}", dir.display())
        }
        _ => dir.display().to_string(),
    };
    context.set_env("PATH", path);
}
