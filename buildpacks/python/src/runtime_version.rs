//! The Python version an application asks for and the version that is actually installed.

use libbuildpack::config::{self, env};
use libbuildpack::context::ExecOptions;
use libbuildpack::{BuildpackError, Context, Result};
use libbuildpack_commons::version;

/// File in the application root that pins the Python version.
pub const VERSION_FILE: &str = ".python-version";

/// Returns the output of `python3 --version`, for example `Python 3.13.1`.
pub fn python_version(context: &Context) -> Result<String> {
    let result = context.exec(["python3", "--version"], &ExecOptions::new())?;
    Ok(result.stdout.trim().to_string())
}

/// Returns the Python version constraint requested for the application.
///
/// Explicit environment variables win over the `.python-version` file, which wins over the
/// latest version available for the stack. Other runtimes get `*`.
pub fn runtime_version(context: &Context) -> Result<String> {
    if let Some(runtime) = context.env_var(env::RUNTIME) {
        if !runtime.starts_with("python") {
            return Ok(String::from("*"));
        }
    }

    for name in [env::PYTHON_VERSION, env::RUNTIME_VERSION] {
        if let Some(version) = context.env_var(name) {
            context.log(format!("Using Python version from {name}: {version}"));
            return Ok(version);
        }
    }

    if let Some(version) = version_from_file(context)? {
        return Ok(version);
    }

    let os = config::stack_os(context.stack_id()).ok_or_else(|| {
        BuildpackError::user(format!(
            "invalid stack for Python runtime: {:?}",
            context.stack_id()
        ))
    })?;
    let version = match os {
        "ubuntu1804" => "3.9.*",
        "ubuntu2204" => "3.13.*",
        _ => "3.14.*",
    };

    context.log(format!(
        "Python version not specified, using the latest available Python runtime for the stack {os:?}"
    ));
    Ok(String::from(version))
}

fn version_from_file(context: &Context) -> Result<Option<String>> {
    if !context.file_exists(VERSION_FILE) {
        return Ok(None);
    }

    let version = context.read_file(VERSION_FILE)?.trim().to_string();
    if version.is_empty() {
        return Err(BuildpackError::user(format!(
            "{VERSION_FILE} exists but does not specify a version"
        )));
    }

    context.log(format!("Using Python version from {VERSION_FILE}: {version}"));
    Ok(Some(version))
}

/// Returns true if the requested runtime version is at least `minimum`, for example `3.13.0`.
///
/// Wildcards count as `0` and release candidates of the minimum version itself qualify.
/// Failing to determine the version is an error, an unparseable version is not.
pub fn runtime_version_at_least(context: &Context, minimum: &str) -> Result<bool> {
    let requested = runtime_version(context)?;
    Ok(version_matches_minimum(context, minimum, &requested))
}

/// Like [`runtime_version_at_least`], but treats any failure as `false`.
#[must_use]
pub fn version_at_least(context: &Context, minimum: &str) -> bool {
    runtime_version_at_least(context, minimum).unwrap_or_else(|error| {
        context.debug(format!("Could not determine the Python version: {error}"));
        false
    })
}

fn version_matches_minimum(context: &Context, minimum: &str, requested: &str) -> bool {
    let candidate = normalize_version(requested);
    if candidate.is_empty() {
        return false;
    }

    let constraint = format!(">={minimum}-0");
    match version::satisfies(&constraint, &candidate) {
        Ok(true) => true,
        Ok(false) => {
            context.debug(format!(
                "Python version {candidate:?} does not match the semver constraint {constraint:?}"
            ));
            false
        }
        Err(error) => {
            context.debug(format!("Invalid Python version {candidate:?}: {error}"));
            false
        }
    }
}

/// Replaces wildcards with `0` and turns Python release candidates (`3.14.0rc1`) into semver
/// prereleases (`3.14.0-rc1`).
fn normalize_version(version: &str) -> String {
    let version = version.trim().replace('*', "0");

    let is_release_candidate =
        version.matches('.').count() == 2 && version.matches("rc").count() == 1;
    if is_release_candidate && !version.contains("-rc") {
        version.replacen("rc", "-rc", 1)
    } else {
        version
    }
}
