//! Environment driven configuration: well-known variable names, release tracks and the
//! features each track enables.

use crate::Env;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Names of the environment variables the buildpacks read or write.
pub mod env {
    /// Overrides the Python package manager (`pip`, `poetry` or `uv`).
    pub const PYTHON_PACKAGE_MANAGER: &str = "GOOGLE_PYTHON_PACKAGE_MANAGER";
    pub const ENTRYPOINT: &str = "GOOGLE_ENTRYPOINT";
    pub const FUNCTION_TARGET: &str = "GOOGLE_FUNCTION_TARGET";
    /// File holding the function, relative to the application root. Defaults to `main.py`.
    pub const FUNCTION_SOURCE: &str = "GOOGLE_FUNCTION_SOURCE";
    pub const FUNCTION_SIGNATURE_TYPE: &str = "GOOGLE_FUNCTION_SIGNATURE_TYPE";
    /// Fails builds of functions that would need the functions framework added to them.
    pub const SKIP_FRAMEWORK_INJECTION: &str = "GOOGLE_SKIP_FRAMEWORK_INJECTION";
    pub const RUNTIME: &str = "GOOGLE_RUNTIME";
    pub const RUNTIME_VERSION: &str = "GOOGLE_RUNTIME_VERSION";
    pub const PYTHON_VERSION: &str = "GOOGLE_PYTHON_VERSION";
    pub const RELEASE_TRACK: &str = "X_GOOGLE_RELEASE_TRACK";
    /// Directory with vendored wheels that pip, uv and poetry install from instead of an index.
    pub const VENDOR_PIP_DEPENDENCIES: &str = "GOOGLE_VENDOR_PIP_DEPENDENCIES";
    pub const PIP_TARGET_DIR: &str = "GOOGLE_PIP_TARGET_DIR";
    /// `:`-separated requirements files contributed by earlier buildpacks.
    pub const INTERNAL_REQUIREMENTS_FILES: &str = "GOOGLE_INTERNAL_REQUIREMENTS_FILES";
    pub const DEBUG: &str = "GOOGLE_DEBUG";
    pub const STACK_ID: &str = "CNB_STACK_ID";
    pub const BUILDPACK_DIR: &str = "CNB_BUILDPACK_DIR";
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown release track: {0:?}")]
    UnknownReleaseTrack(String),

    #[error("Invalid boolean value for {name}: {value:?}")]
    InvalidBool { name: String, value: String },
}

/// The release track a builder runs on. Features graduate from `Alpha` over `Beta` to `Ga`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseTrack {
    Alpha,
    Beta,
    #[default]
    Ga,
}

impl ReleaseTrack {
    /// Reads the track from [`env::RELEASE_TRACK`]. Unset or unknown values mean GA.
    #[must_use]
    pub fn from_env(environment: &Env) -> Self {
        match environment.non_empty(env::RELEASE_TRACK) {
            None => Self::Ga,
            Some(value) => value.parse().unwrap_or_else(|error| {
                tracing::warn!("{error}, using the GA release track");
                Self::Ga
            }),
        }
    }
}

impl FromStr for ReleaseTrack {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "ALPHA" => Ok(Self::Alpha),
            "BETA" => Ok(Self::Beta),
            "GA" => Ok(Self::Ga),
            _ => Err(ConfigError::UnknownReleaseTrack(value.to_string())),
        }
    }
}

impl Display for ReleaseTrack {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Alpha => "ALPHA",
            Self::Beta => "BETA",
            Self::Ga => "GA",
        })
    }
}

/// Which gated features are available on a release track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct FeatureGates {
    pub poetry: bool,
    /// `pyproject.toml` support for Python versions below 3.13.
    pub pyproject_below_3_13: bool,
    /// `pyproject.toml` support for Python 3.13 and later.
    pub pyproject: bool,
    /// uv instead of pip for `requirements.txt` projects on Python 3.14 and later.
    pub uv_default_for_requirements: bool,
    /// Framework aware default entrypoints on Python 3.13 and later.
    pub smart_default_entrypoint: bool,
}

impl FeatureGates {
    #[must_use]
    pub fn for_track(track: ReleaseTrack) -> Self {
        Self {
            poetry: track == ReleaseTrack::Alpha,
            pyproject_below_3_13: track != ReleaseTrack::Ga,
            pyproject: true,
            uv_default_for_requirements: true,
            smart_default_entrypoint: true,
        }
    }
}

/// Parses boolean flags the way `GOOGLE_DEBUG` and friends are documented.
pub fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Maps a CNB stack id to the operating system of its images.
#[must_use]
pub fn stack_os(stack_id: &str) -> Option<&'static str> {
    match stack_id {
        "google" | "google.gae.18" | "google.18" | "google.min.18" | "google.18.full" => {
            Some("ubuntu1804")
        }
        "google.gae.22" | "google.22" | "google.min.22" | "google.22.full" => Some("ubuntu2204"),
        "google.24" | "google.min.24" | "google.24.full" => Some("ubuntu2404"),
        _ => None,
    }
}
