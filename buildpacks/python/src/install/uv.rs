//! Installing dependencies with uv, from `pyproject.toml` and `uv.lock` or from requirements
//! files.

use super::tool::{ensure_lockfile, install_tool, ToolProvider};
use super::{
    append_vendoring_flags, bare_python_version, check_incompatible_dependencies, command,
    existing_app_files,
};
use crate::dependencies::{prepare_dependencies_layer, refresh_layer};
use crate::manifest::RequirementsFiles;
use crate::pyproject::{Pyproject, PYPROJECT_TOML, UV_LOCK};
use crate::runtime_version::python_version;
use libbuildpack::context::ExecOptions;
use libbuildpack::layer::Layer;
use libbuildpack::layer_env::Scope;
use libbuildpack::{Context, Result};
use libbuildpack_commons::cache::CacheInput;
use std::path::{Path, PathBuf};

const UV: &str = "uv";
const UV_LAYER: &str = "uv";
const VENV_DIR: &str = ".venv";

/// The `required-version` of `[tool.uv]`, if the application has a `pyproject.toml`.
pub fn requested_uv_version(context: &Context) -> Result<Option<String>> {
    if !context.file_exists(PYPROJECT_TOML) {
        return Ok(None);
    }

    Ok(Pyproject::read(context)?
        .uv_version_constraint()
        .map(String::from))
}

/// Whether a working `uv` is already on `PATH`.
#[must_use]
pub fn is_uv_installed(context: &Context) -> bool {
    match context.exec_unchecked(["uv", "--version"], &ExecOptions::new()) {
        Ok(result) if result.success() => true,
        Ok(result) => {
            context.debug(format!("uv --version exited with code {}", result.exit_code));
            false
        }
        Err(error) => {
            context.debug(format!("uv --version failed with error: {error}"));
            false
        }
    }
}

/// Installs uv into its own layer, unless no particular version is requested and the image
/// already has one.
pub fn install_uv(context: &mut Context) -> Result<()> {
    let constraint = requested_uv_version(context)?;
    if constraint.is_none() && is_uv_installed(context) {
        return Ok(());
    }

    install_tool(
        context,
        ToolProvider::Pip,
        UV,
        UV_LAYER,
        constraint.as_deref(),
    )
}

/// Runs `uv lock` if the application has no `uv.lock`.
pub fn ensure_uv_lockfile(context: &Context) -> Result<()> {
    let mut lock_command = command(&["uv", "lock"]);
    append_vendoring_flags(context, &mut lock_command);
    ensure_lockfile(context, UV, UV_LOCK, &lock_command)
}

/// Installs the dependencies of a `pyproject.toml` project with `uv sync` into a virtual
/// environment inside `layer`.
///
/// Returns the path of the virtual environment. Its `bin` directory is put on `PATH` even
/// when the cached environment is reused.
pub fn uv_install_pyproject(context: &Context, layer: &mut Layer) -> Result<PathBuf> {
    let version = python_version(context)?;
    let inputs = [
        CacheInput::files(existing_app_files(context, &[PYPROJECT_TOML, UV_LOCK])),
        CacheInput::strings([version.as_str(), UV]),
    ];
    let venv_dir = layer.path().join(VENV_DIR);

    if refresh_layer(context, layer, &inputs, &version)? {
        let python = bare_python_version(&version);
        create_venv(context, &venv_dir, python)?;

        let mut sync_command = command(&[
            "uv",
            "sync",
            "--active",
            "--link-mode=copy",
            "--python",
            python,
        ]);
        append_vendoring_flags(context, &mut sync_command);

        context.log("Installing dependencies with `uv sync` into the virtual environment...");
        context
            .exec(&sync_command, &venv_options(&venv_dir).user_attribution())
            .map_err(|error| error.wrap("failed to sync dependencies with uv"))?;
        context.log(format!(
            "Dependencies installed to virtual environment at {}",
            venv_dir.display()
        ));
    } else {
        context.log("Dependencies cached and not expired. Skipping installation.");
    }

    layer
        .env_mut()
        .prepend_path(Scope::Shared, "PATH", venv_dir.join("bin"));
    Ok(venv_dir)
}

/// Installs requirements files with `uv pip install` into a virtual environment inside
/// `layer`, then checks the environment for incompatible dependencies.
pub fn uv_install_requirements(
    context: &Context,
    layer: &mut Layer,
    requirements: &RequirementsFiles,
) -> Result<()> {
    if !prepare_dependencies_layer(context, layer, UV, requirements)? {
        if !requirements.is_empty() {
            context.log("Application dependencies are up to date, skipping installation.");
            prepend_venv_path(layer);
        }
        return Ok(());
    }

    context.log("Installing application dependencies.");
    let version = python_version(context)?;
    let venv_dir = layer.path().join(VENV_DIR);
    create_venv(context, &venv_dir, bare_python_version(&version))?;

    let options = venv_options(&venv_dir);
    for requirements_file in requirements {
        let mut install_command = command(&["uv", "pip", "install", "--requirement"]);
        install_command.push(requirements_file.to_string_lossy().into_owned());
        install_command.push(String::from("--link-mode=copy"));
        append_vendoring_flags(context, &mut install_command);

        context.exec(&install_command, &options.clone().user_attribution())?;
    }

    check_incompatible_dependencies(context, &["uv", "pip", "check"], &options)?;
    prepend_venv_path(layer);
    Ok(())
}

fn create_venv(context: &Context, venv_dir: &Path, python: &str) -> Result<()> {
    context.log(format!(
        "Creating virtual environment at {} with Python {python}",
        venv_dir.display()
    ));
    context
        .exec(
            ["uv", "venv", &*venv_dir.to_string_lossy(), "--python", python],
            &ExecOptions::new().user_attribution(),
        )
        .map(|_| ())
        .map_err(|error| error.wrap("failed to create virtual environment with uv"))
}

fn venv_options(venv_dir: &Path) -> ExecOptions {
    ExecOptions::new().env("VIRTUAL_ENV", venv_dir.to_string_lossy())
}

fn prepend_venv_path(layer: &mut Layer) {
    let bin_dir = layer.path().join(VENV_DIR).join("bin");
    layer.env_mut().prepend_path(Scope::Shared, "PATH", bin_dir);
}
