//! The parts of `package.json` the buildpack reads.

use libbuildpack::{BuildpackError, Context};
use serde::Deserialize;

pub const PACKAGE_JSON: &str = "package.json";

#[derive(thiserror::Error, Debug)]
pub enum PackageJsonError {
    #[error("reading {PACKAGE_JSON}: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse {PACKAGE_JSON}: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<PackageJsonError> for BuildpackError {
    fn from(error: PackageJsonError) -> Self {
        match error {
            PackageJsonError::Io(io_error) => BuildpackError::Io(io_error),
            PackageJsonError::Parse(_) => BuildpackError::user(error.to_string()),
        }
    }
}

/// A parsed `package.json`. Unknown keys are ignored.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PackageJson {
    pub name: Option<String>,
    /// The Corepack `packageManager` field, for example `pnpm@9.0.0`.
    pub package_manager: Option<String>,
}

impl PackageJson {
    /// Reads `package.json` from the application directory.
    pub fn read(context: &Context) -> Result<Self, PackageJsonError> {
        let contents = std::fs::read_to_string(context.app_dir().join(PACKAGE_JSON))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, PackageJsonError> {
        Ok(serde_json::from_str(contents)?)
    }
}
