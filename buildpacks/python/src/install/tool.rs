//! Installing the uv and poetry command line tools into their own layers.

use super::{command, prepend_context_path};
use libbuildpack::context::ExecOptions;
use libbuildpack::data::layer_content_metadata::LayerTypes;
use libbuildpack::layer_env::Scope;
use libbuildpack::{BuildpackError, Context, Result};
use libbuildpack_commons::version::{self, ResolveOptions, VersionError};
use std::fmt::{self, Display, Formatter};

const AVAILABLE_VERSIONS_PREFIX: &str = "Available versions:";

/// The installer used to install a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolProvider {
    Pip,
    Uv,
}

impl Display for ToolProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToolProvider::Pip => "pip",
            ToolProvider::Uv => "uv",
        })
    }
}

/// Installs `tool` with `provider` into the build and cache layer `layer_name` and puts its
/// `bin` directory on `PATH` for this and later buildpacks.
///
/// A PEP 440 `constraint` is resolved against the versions available on the package index.
pub fn install_tool(
    context: &mut Context,
    provider: ToolProvider,
    tool: &str,
    layer_name: &str,
    constraint: Option<&str>,
) -> Result<()> {
    let mut layer = context.layer(layer_name, LayerTypes::build().cache())?;

    let requirement = match constraint {
        Some(constraint) => {
            context.log(format!("Using {tool} version constraint: {constraint}"));
            resolve_requirement(context, tool, constraint)?
        }
        None => {
            context.log(format!(
                "No {tool} version constraint found, installing latest"
            ));
            tool.to_string()
        }
    };

    let install_command = match provider {
        ToolProvider::Pip => command(&["python3", "-m", "pip", "install", &requirement]),
        ToolProvider::Uv => command(&[
            "uv",
            "pip",
            "install",
            "--system",
            "--link-mode=copy",
            "-q",
            &requirement,
        ]),
    };
    context.log(format!(
        "Installing {requirement} into {} using {provider}",
        layer.path().display()
    ));

    let options = ExecOptions::new()
        .env("PYTHONUSERBASE", layer.path().to_string_lossy())
        .user_attribution();
    if let Err(error) = context.exec(&install_command, &options) {
        return Err(match constraint {
            None => BuildpackError::internal(format!(
                "failed to install {tool} with {provider}: {error}"
            )),
            Some(constraint) => {
                error.wrap(format!("installing {tool} with version constraint {constraint}"))
            }
        });
    }
    context.log(format!("{tool} installed successfully."));

    let bin_dir = layer.path().join("bin");
    layer
        .env_mut()
        .prepend_path(Scope::Build, "PATH", &bin_dir);
    prepend_context_path(context, &bin_dir);
    context.write_layer(&layer)
}

/// Turns a PEP 440 constraint into the requirement to install, pinning the highest matching
/// version when the constraint can be expressed as a semver range.
fn resolve_requirement(context: &Context, tool: &str, constraint: &str) -> Result<String> {
    let verbatim = format!("{tool}{constraint}");

    let Some(semver_constraint) = pep440_to_semver(constraint) else {
        context.debug(format!(
            "{constraint:?} can't be expressed as a semver range, passing it to the installer"
        ));
        return Ok(verbatim);
    };

    let versions = match available_versions(context, tool) {
        Ok(versions) if !versions.is_empty() => versions,
        Ok(_) => return Ok(verbatim),
        Err(error) => {
            context.debug(format!("Could not list the versions of {tool}: {error}"));
            return Ok(verbatim);
        }
    };

    match version::resolve_version(
        &semver_constraint,
        &versions,
        ResolveOptions::without_sanitization(),
    ) {
        Ok(resolved) => Ok(format!("{tool}=={resolved}")),
        Err(VersionError::NoMatchingVersion { .. }) => Err(BuildpackError::user(format!(
            "no version of {tool} matches the constraint {constraint:?}, available versions: {}",
            versions.join(", ")
        ))),
        Err(error @ VersionError::Pattern { .. }) => Err(BuildpackError::internal(format!(
            "resolving the version of {tool}: {error}"
        ))),
        Err(error) => {
            context.debug(format!("Could not resolve {constraint:?}: {error}"));
            Ok(verbatim)
        }
    }
}

/// Lists the versions of `tool` on the package index, newest first.
fn available_versions(context: &Context, tool: &str) -> Result<Vec<String>> {
    let result = context.exec(
        ["python3", "-m", "pip", "index", "versions", tool],
        &ExecOptions::new(),
    )?;

    Ok(result
        .stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix(AVAILABLE_VERSIONS_PREFIX))
        .map(|versions| {
            versions
                .split(',')
                .map(str::trim)
                .filter(|version| !version.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default())
}

/// Translates the PEP 440 specifiers of `constraint` to an equivalent semver range.
///
/// Returns `None` for specifiers without a semver counterpart, such as arbitrary equality
/// (`===`) or compatible releases of a single segment (`~=2`).
pub(crate) fn pep440_to_semver(constraint: &str) -> Option<String> {
    constraint
        .split(',')
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(|clause| {
            if clause.starts_with("===") {
                None
            } else if let Some(version) = clause.strip_prefix("~=") {
                let version = version.trim();
                match version.matches('.').count() {
                    1 => Some(format!("^{version}")),
                    2 => Some(format!("~{version}")),
                    _ => None,
                }
            } else if let Some(version) = clause.strip_prefix("==") {
                Some(format!("={}", version.trim()))
            } else if [">=", "<=", "!=", ">", "<"]
                .iter()
                .any(|operator| clause.starts_with(operator))
            {
                Some(clause.replace(' ', ""))
            } else {
                None
            }
        })
        .collect::<Option<Vec<_>>>()
        .filter(|clauses| !clauses.is_empty())
        .map(|clauses| clauses.join(", "))
}

/// Generates `lock_file` with `lock_command` unless the application already has one.
pub fn ensure_lockfile(
    context: &Context,
    tool: &str,
    lock_file: &str,
    lock_command: &[String],
) -> Result<()> {
    if context.file_exists(lock_file) {
        context.log(format!("Using existing {lock_file}."));
        return Ok(());
    }

    context.log(format!(
        "{lock_file} not found, generating it using `{}`...",
        lock_command.join(" ")
    ));
    context
        .exec(lock_command, &ExecOptions::new().user_attribution())
        .map_err(|error| error.wrap(format!("failed to generate {lock_file} with {tool}")))?;
    context.log(format!("{lock_file} generated successfully."));
    Ok(())
}
