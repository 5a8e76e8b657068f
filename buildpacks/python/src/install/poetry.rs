//! Installing dependencies of Poetry projects.

use super::tool::{ensure_lockfile, install_tool, ToolProvider};
use super::{command, existing_app_files};
use crate::dependencies::refresh_layer;
use crate::pyproject::{Pyproject, POETRY_LOCK, PYPROJECT_TOML};
use crate::runtime_version::python_version;
use libbuildpack::context::ExecOptions;
use libbuildpack::layer::Layer;
use libbuildpack::layer_env::Scope;
use libbuildpack::{BuildpackError, Context, Result};
use libbuildpack_commons::cache::CacheInput;
use std::path::PathBuf;

const POETRY: &str = "poetry";
const POETRY_LAYER: &str = "poetry";
const UV_LAYER: &str = "uv";

const POETRY_INSTALL: [&str; 7] = [
    "poetry",
    "install",
    "--no-interaction",
    "--sync",
    "--only",
    "main",
    "--no-root",
];
const POETRY_ENV_INFO: [&str; 4] = ["poetry", "env", "info", "--path"];
const POETRY_LOCK_COMMAND: [&str; 3] = ["poetry", "lock", "--no-interaction"];

/// The `requires-poetry` constraint of `[tool.poetry]`.
pub fn requested_poetry_version(context: &Context) -> Result<Option<String>> {
    if !context.file_exists(PYPROJECT_TOML) {
        return Ok(None);
    }

    Ok(Pyproject::read(context)?
        .poetry_version_constraint()
        .map(String::from))
}

/// Installs the Poetry CLI. uv is used to speed up the install and is removed again
/// afterwards.
pub fn install_poetry(context: &mut Context) -> Result<()> {
    install_tool(context, ToolProvider::Pip, "uv", UV_LAYER, None)
        .map_err(|error| error.wrap("installing uv"))?;

    let constraint = requested_poetry_version(context)?;
    install_tool(
        context,
        ToolProvider::Uv,
        POETRY,
        POETRY_LAYER,
        constraint.as_deref(),
    )
    .map_err(|error| error.wrap("installing poetry with uv"))?;

    context.log("Uninstalling uv to remove it from the final image.");
    if let Err(error) = context.exec(
        ["python3", "-m", "pip", "uninstall", "-y", "uv"],
        &ExecOptions::new(),
    ) {
        context.warn(format!(
            "Failed to uninstall uv, it may remain in the final image: {error}"
        ));
    }

    Ok(())
}

/// Runs `poetry lock` if the application has no `poetry.lock`.
pub fn ensure_poetry_lockfile(context: &Context) -> Result<()> {
    ensure_lockfile(context, POETRY, POETRY_LOCK, &command(&POETRY_LOCK_COMMAND))
}

/// Installs the main dependencies of the project into a Poetry-managed virtual environment
/// inside `layer` and puts the environment on `PATH`.
///
/// Returns the path of the virtual environment.
pub fn poetry_install(context: &Context, layer: &mut Layer) -> Result<PathBuf> {
    let version = python_version(context)?;
    let inputs = [
        CacheInput::files(existing_app_files(context, &[PYPROJECT_TOML, POETRY_LOCK])),
        CacheInput::strings([version.as_str(), POETRY]),
    ];

    let options = ExecOptions::new()
        .env("POETRY_VIRTUALENVS_PATH", layer.path().to_string_lossy())
        .env("POETRY_VIRTUALENVS_CREATE", "true")
        .env("POETRY_VIRTUALENVS_IN_PROJECT", "false")
        .user_attribution();

    if refresh_layer(context, layer, &inputs, &version)? {
        context.log(format!(
            "Installing application dependencies into {}...",
            layer.path().display()
        ));
        let result = context.exec_unchecked(POETRY_INSTALL, &options)?;
        if !result.success() {
            return Err(BuildpackError::user(format!(
                "poetry install failed with exit code {}: {}",
                result.exit_code, result.stderr
            )));
        }
        context.log("Poetry install successful.");
    } else {
        context.log("Dependencies cached and not expired. Skipping installation.");
    }

    let result = context.exec_unchecked(POETRY_ENV_INFO, &options)?;
    if !result.success() {
        return Err(BuildpackError::user(format!(
            "poetry env info --path failed with exit code {}: {}",
            result.exit_code, result.stderr
        )));
    }
    let venv_dir = result.stdout.trim();
    if venv_dir.is_empty() {
        return Err(BuildpackError::internal(
            "could not determine poetry virtual environment path",
        ));
    }
    context.log(format!(
        "Located Poetry virtual environment at: {venv_dir}"
    ));

    let venv_dir = PathBuf::from(venv_dir);
    layer
        .env_mut()
        .prepend_path(Scope::Shared, "PATH", venv_dir.join("bin"));
    Ok(venv_dir)
}
