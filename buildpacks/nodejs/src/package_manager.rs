//! Decides which package manager installs the dependencies of a Node.js application.

use crate::package_json::{PackageJson, PACKAGE_JSON};
use libbuildpack::metrics::MetricId;
use libbuildpack::{BuildpackError, Context, Result};
use std::fmt::{Display, Formatter};
use std::fs;

pub const PNPM_LOCK: &str = "pnpm-lock.yaml";
pub const YARN_LOCK: &str = "yarn.lock";
pub const NPM_SHRINKWRAP: &str = "npm-shrinkwrap.json";
pub const PACKAGE_LOCK: &str = "package-lock.json";
pub const BUN_LOCK: &str = "bun.lock";
pub const BUN_LOCKB: &str = "bun.lockb";

/// Lockfiles in order of precedence.
const LOCKFILES: [(&str, NodePackageManager); 4] = [
    (PNPM_LOCK, NodePackageManager::Pnpm),
    (YARN_LOCK, NodePackageManager::Yarn),
    (NPM_SHRINKWRAP, NodePackageManager::Npm),
    (PACKAGE_LOCK, NodePackageManager::Npm),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePackageManager {
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

impl NodePackageManager {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
            Self::Bun => "bun",
        }
    }

    /// The usage counter of the package manager.
    #[must_use]
    pub fn usage_metric(self) -> MetricId {
        match self {
            Self::Npm => MetricId::NpmUsage,
            Self::Yarn => MetricId::YarnUsage,
            Self::Pnpm => MetricId::PnpmUsage,
            Self::Bun => MetricId::BunUsage,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "npm" => Some(Self::Npm),
            "yarn" => Some(Self::Yarn),
            "pnpm" => Some(Self::Pnpm),
            "bun" => Some(Self::Bun),
            _ => None,
        }
    }
}

impl Display for NodePackageManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The package manager of an application, with the reason it was picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDetection {
    pub package_manager: NodePackageManager,
    /// The version requested in the `packageManager` field, if any.
    pub version: Option<String>,
    pub reason: String,
}

/// Picks the package manager for an application.
///
/// The `packageManager` field of `package.json` wins, followed by the first non-empty
/// lockfile and then bun lockfiles. Applications without any of these use npm.
pub fn detect_node_package_manager(context: &Context) -> Result<NodeDetection> {
    if context.file_exists(PACKAGE_JSON) {
        if let Some(field) = PackageJson::read(context)?.package_manager {
            let (package_manager, version) = parse_package_manager_field(&field)?;
            return Ok(NodeDetection {
                package_manager,
                version: Some(version.to_string()),
                reason: format!("found packageManager {field:?} in {PACKAGE_JSON}"),
            });
        }
    }

    for (lockfile, package_manager) in LOCKFILES {
        if is_valid_lockfile(context, lockfile) {
            return Ok(NodeDetection {
                package_manager,
                version: None,
                reason: format!("found {lockfile}"),
            });
        }
    }

    for lockfile in [BUN_LOCK, BUN_LOCKB] {
        if context.file_exists(lockfile) {
            return Ok(NodeDetection {
                package_manager: NodePackageManager::Bun,
                version: None,
                reason: format!("found {lockfile}"),
            });
        }
    }

    Ok(NodeDetection {
        package_manager: NodePackageManager::Npm,
        version: None,
        reason: String::from("no lockfile found, using npm as default package manager"),
    })
}

/// Splits a `name@version` field.
fn parse_package_manager_field(field: &str) -> Result<(NodePackageManager, &str)> {
    let parts: Vec<&str> = field.split('@').collect();
    let [name, version] = parts.as_slice() else {
        return Err(BuildpackError::user(format!(
            "parsing packageManager {PACKAGE_JSON} field: expected name@version, got {field:?}"
        )));
    };

    NodePackageManager::from_name(name)
        .map(|package_manager| (package_manager, *version))
        .ok_or_else(|| {
            BuildpackError::user(format!(
                "unsupported package manager {name:?} in the packageManager {PACKAGE_JSON} field"
            ))
        })
}

/// A lockfile counts if it exists and isn't empty.
fn is_valid_lockfile(context: &Context, lockfile: &str) -> bool {
    fs::metadata(context.app_dir().join(lockfile)).is_ok_and(|metadata| metadata.len() > 0)
}
