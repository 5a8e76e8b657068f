//! Decides which package manager installs an application's dependencies.
//!
//! All functions here only inspect files and the environment. They never run processes, so
//! they are safe to call from detect.

use crate::manifest::REQUIREMENTS_TXT;
use crate::pyproject::{Pyproject, PyprojectError, POETRY_LOCK, PYPROJECT_TOML, UV_LOCK};
use crate::runtime_version::version_at_least;
use libbuildpack::config::env;
use libbuildpack::{BuildpackError, Context, Result};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Pip,
    Poetry,
    Uv,
}

impl PackageManager {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pip => "pip",
            Self::Poetry => "poetry",
            Self::Uv => "uv",
        }
    }
}

impl Display for PackageManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unsupported package manager {0:?}, expected one of \"pip\", \"poetry\" or \"uv\"")]
pub struct UnknownPackageManager(String);

impl FromStr for PackageManager {
    type Err = UnknownPackageManager;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pip" => Ok(Self::Pip),
            "poetry" => Ok(Self::Poetry),
            "uv" => Ok(Self::Uv),
            _ => Err(UnknownPackageManager(value.to_string())),
        }
    }
}

/// The answer of a single predicate, with the reason detect reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub matches: bool,
    pub reason: String,
}

impl Decision {
    fn yes(reason: impl Into<String>) -> Self {
        Self {
            matches: true,
            reason: reason.into(),
        }
    }

    fn no(reason: impl Into<String>) -> Self {
        Self {
            matches: false,
            reason: reason.into(),
        }
    }
}

/// The package manager of an application, or `None` if there is nothing to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub package_manager: Option<PackageManager>,
    pub reason: String,
}

/// Returns the package manager requested with `GOOGLE_PYTHON_PACKAGE_MANAGER`.
pub fn package_manager_override(context: &Context) -> Result<Option<PackageManager>> {
    context
        .env_var(env::PYTHON_PACKAGE_MANAGER)
        .map(|value| {
            value.parse().map_err(|error: UnknownPackageManager| {
                BuildpackError::user(format!("{}: {error}", env::PYTHON_PACKAGE_MANAGER))
            })
        })
        .transpose()
}

fn is_package_manager_configured(context: &Context, package_manager: PackageManager) -> bool {
    context
        .env_var(env::PYTHON_PACKAGE_MANAGER)
        .is_some_and(|value| value.eq_ignore_ascii_case(package_manager.as_str()))
}

fn is_package_manager_empty(context: &Context) -> bool {
    context.env_var(env::PYTHON_PACKAGE_MANAGER).is_none()
}

/// `requirements.txt` wins over `pyproject.toml` when an application has both.
fn has_pyproject_and_requirements(context: &Context) -> bool {
    context.file_exists(PYPROJECT_TOML) && context.file_exists(REQUIREMENTS_TXT)
}

pub fn is_poetry_project(context: &Context) -> Result<Decision> {
    if context.file_exists(POETRY_LOCK) {
        return Ok(Decision::yes(format!("found {POETRY_LOCK}")));
    }
    if !context.file_exists(PYPROJECT_TOML) {
        return Ok(Decision::no(format!("{PYPROJECT_TOML} not found")));
    }

    match Pyproject::read(context) {
        Ok(pyproject) if pyproject.has_poetry_table() => Ok(Decision::yes(format!(
            "found [tool.poetry] in {PYPROJECT_TOML}"
        ))),
        Ok(_) => Ok(Decision::no(format!(
            "neither {POETRY_LOCK} nor [tool.poetry] found"
        ))),
        Err(PyprojectError::Io(error)) => Err(error.into()),
        Err(error) => {
            context.warn(format!("Could not parse {PYPROJECT_TOML}: {error}"));
            Ok(Decision::no(format!("could not parse {PYPROJECT_TOML}")))
        }
    }
}

pub fn is_uv_pyproject(context: &Context) -> Result<Decision> {
    if has_pyproject_and_requirements(context) {
        return Ok(Decision::no(format!(
            "{PYPROJECT_TOML} and {REQUIREMENTS_TXT} found, prefer {REQUIREMENTS_TXT}"
        )));
    }
    if !context.file_exists(PYPROJECT_TOML) {
        return Ok(Decision::no(format!("{PYPROJECT_TOML} not found")));
    }
    if context.file_exists(UV_LOCK) {
        return Ok(Decision::yes(format!("found {PYPROJECT_TOML} and {UV_LOCK}")));
    }

    let variable = env::PYTHON_PACKAGE_MANAGER;
    Ok(if is_package_manager_configured(context, PackageManager::Uv) {
        Decision::yes(format!(
            "found {PYPROJECT_TOML}, using uv because {variable} is set to 'uv'"
        ))
    } else if is_package_manager_empty(context) {
        Decision::yes(format!(
            "found {PYPROJECT_TOML} and {variable} is not set, using uv as default package manager"
        ))
    } else {
        Decision::no(format!(
            "found {PYPROJECT_TOML}, but {variable} is not set to 'uv'"
        ))
    })
}

/// Whether a `requirements.txt` application is installed with uv instead of pip.
///
/// Either because it was asked for, or because uv is the default for Python 3.14 and later.
pub fn is_uv_requirements(context: &Context) -> Result<Decision> {
    if !context.file_exists(REQUIREMENTS_TXT) {
        return Ok(Decision::no(format!("{REQUIREMENTS_TXT} not found")));
    }

    let variable = env::PYTHON_PACKAGE_MANAGER;
    if is_package_manager_configured(context, PackageManager::Uv) {
        return Ok(Decision::yes(format!(
            "found {REQUIREMENTS_TXT}, using uv because {variable} is set to 'uv'"
        )));
    }

    if is_package_manager_empty(context)
        && context.feature_gates().uv_default_for_requirements
        && version_at_least(context, "3.14.0")
    {
        return Ok(Decision::yes(format!(
            "found {REQUIREMENTS_TXT} and Python 3.14 or later, using uv as default package manager"
        )));
    }

    Ok(Decision::no(format!(
        "found {REQUIREMENTS_TXT}, but {variable} is not set to 'uv'"
    )))
}

/// Whether `pyproject.toml` applications are supported for the requested Python version.
#[must_use]
pub fn is_pyproject_enabled(context: &Context) -> bool {
    if !context.file_exists(PYPROJECT_TOML) || has_pyproject_and_requirements(context) {
        return false;
    }

    let gates = context.feature_gates();
    gates.pyproject_below_3_13 || (gates.pyproject && version_at_least(context, "3.13.0"))
}

/// Whether a `pyproject.toml` application asked to be installed with pip.
#[must_use]
pub fn is_pip_pyproject(context: &Context) -> bool {
    !has_pyproject_and_requirements(context)
        && is_package_manager_configured(context, PackageManager::Pip)
        && is_pyproject_enabled(context)
}

/// Picks the package manager for an application.
///
/// An explicit override wins, followed by poetry projects, enabled `pyproject.toml` projects
/// (uv) and finally `requirements.txt`. Poetry is skipped, even when requested, on release
/// tracks without the poetry buildpack.
pub fn detect_package_manager(context: &Context) -> Result<Detection> {
    let poetry_enabled = context.feature_gates().poetry;

    if let Some(package_manager) = package_manager_override(context)?
        .filter(|package_manager| poetry_enabled || *package_manager != PackageManager::Poetry)
    {
        return Ok(Detection {
            package_manager: Some(package_manager),
            reason: format!(
                "{} is set to '{package_manager}'",
                env::PYTHON_PACKAGE_MANAGER
            ),
        });
    }

    if poetry_enabled {
        let poetry = is_poetry_project(context)?;
        if poetry.matches {
            return Ok(Detection {
                package_manager: Some(PackageManager::Poetry),
                reason: poetry.reason,
            });
        }
    }

    if is_pyproject_enabled(context) {
        let uv = is_uv_pyproject(context)?;
        if uv.matches {
            return Ok(Detection {
                package_manager: Some(PackageManager::Uv),
                reason: uv.reason,
            });
        }
    }

    if context.file_exists(REQUIREMENTS_TXT) {
        let uv = is_uv_requirements(context)?;
        return Ok(if uv.matches {
            Detection {
                package_manager: Some(PackageManager::Uv),
                reason: uv.reason,
            }
        } else {
            Detection {
                package_manager: Some(PackageManager::Pip),
                reason: format!("found {REQUIREMENTS_TXT}"),
            }
        });
    }

    Ok(Detection {
        package_manager: None,
        reason: format!("neither {REQUIREMENTS_TXT} nor {PYPROJECT_TOML} found"),
    })
}

#[cfg(test)]
mod tests {
    use super::{
        detect_package_manager, is_pip_pyproject, is_poetry_project, is_pyproject_enabled,
        is_uv_pyproject, is_uv_requirements, PackageManager,
    };
    use libbuildpack::testing::{TestContext, TestContextBuilder};
    use libbuildpack::ErrorKind;

    fn detected(test: &TestContext) -> Option<PackageManager> {
        detect_package_manager(&test.context)
            .unwrap()
            .package_manager
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("UV".parse(), Ok(PackageManager::Uv));
        assert_eq!("Poetry".parse(), Ok(PackageManager::Poetry));
        assert_eq!(" pip ".parse(), Ok(PackageManager::Pip));
        assert!("conda".parse::<PackageManager>().is_err());
    }

    #[test]
    fn override_wins() {
        let test = TestContextBuilder::new()
            .file("requirements.txt", "flask\n")
            .file("poetry.lock", "")
            .env("GOOGLE_PYTHON_PACKAGE_MANAGER", "UV")
            .build();

        let detection = detect_package_manager(&test.context).unwrap();
        assert_eq!(detection.package_manager, Some(PackageManager::Uv));
        assert_eq!(
            detection.reason,
            "GOOGLE_PYTHON_PACKAGE_MANAGER is set to 'uv'"
        );
    }

    #[test]
    fn unsupported_override_is_a_user_error() {
        let test = TestContextBuilder::new()
            .file("requirements.txt", "flask\n")
            .env("GOOGLE_PYTHON_PACKAGE_MANAGER", "conda")
            .build();

        let error = detect_package_manager(&test.context).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::User);
    }

    #[test]
    fn poetry_lock_selects_poetry() {
        let test = TestContextBuilder::new()
            .file("requirements.txt", "flask\n")
            .file("poetry.lock", "")
            .env("GOOGLE_PYTHON_VERSION", "3.12.4")
            .env("X_GOOGLE_RELEASE_TRACK", "ALPHA")
            .build();

        assert_eq!(detected(&test), Some(PackageManager::Poetry));
    }

    #[test]
    fn poetry_needs_an_alpha_track() {
        let lockfile = TestContextBuilder::new()
            .file("requirements.txt", "flask\n")
            .file("poetry.lock", "")
            .env("GOOGLE_PYTHON_VERSION", "3.12.4")
            .build();
        let requested = TestContextBuilder::new()
            .file("requirements.txt", "flask\n")
            .env("GOOGLE_PYTHON_PACKAGE_MANAGER", "poetry")
            .env("GOOGLE_PYTHON_VERSION", "3.12.4")
            .env("X_GOOGLE_RELEASE_TRACK", "BETA")
            .build();

        let detection = detect_package_manager(&lockfile.context).unwrap();
        assert_eq!(detection.package_manager, Some(PackageManager::Pip));
        assert_eq!(detection.reason, "found requirements.txt");
        assert_eq!(detected(&requested), Some(PackageManager::Pip));
    }

    #[test]
    fn poetry_table_selects_poetry() {
        let test = TestContextBuilder::new()
            .file("pyproject.toml", "[tool.poetry]\nname = \"app\"\n")
            .build();

        let decision = is_poetry_project(&test.context).unwrap();
        assert!(decision.matches);
        assert_eq!(decision.reason, "found [tool.poetry] in pyproject.toml");
    }

    #[test]
    fn unparseable_pyproject_is_not_poetry() {
        let test = TestContextBuilder::new()
            .file("pyproject.toml", "[tool.poetry\n")
            .build();

        let decision = is_poetry_project(&test.context).unwrap();
        assert!(!decision.matches);
        assert_eq!(decision.reason, "could not parse pyproject.toml");
        assert_eq!(test.context.warnings().len(), 1);
    }

    #[test]
    fn uv_pyproject_reasons() {
        let reason = |files: &[&str], package_manager: Option<&str>| {
            let mut builder = TestContextBuilder::new();
            for file in files {
                builder = builder.file(*file, "");
            }
            if let Some(package_manager) = package_manager {
                builder = builder.env("GOOGLE_PYTHON_PACKAGE_MANAGER", package_manager);
            }
            let test = builder.build();
            let decision = is_uv_pyproject(&test.context).unwrap();
            (decision.matches, decision.reason)
        };

        assert_eq!(
            reason(&["pyproject.toml", "requirements.txt"], None),
            (
                false,
                String::from("pyproject.toml and requirements.txt found, prefer requirements.txt")
            )
        );
        assert_eq!(
            reason(&[], None),
            (false, String::from("pyproject.toml not found"))
        );
        assert_eq!(
            reason(&["pyproject.toml", "uv.lock"], Some("pip")),
            (true, String::from("found pyproject.toml and uv.lock"))
        );
        assert_eq!(
            reason(&["pyproject.toml"], Some("uv")),
            (
                true,
                String::from(
                    "found pyproject.toml, using uv because GOOGLE_PYTHON_PACKAGE_MANAGER is set to 'uv'"
                )
            )
        );
        assert_eq!(
            reason(&["pyproject.toml"], None),
            (
                true,
                String::from(
                    "found pyproject.toml and GOOGLE_PYTHON_PACKAGE_MANAGER is not set, using uv as default package manager"
                )
            )
        );
        assert_eq!(
            reason(&["pyproject.toml"], Some("pip")),
            (
                false,
                String::from(
                    "found pyproject.toml, but GOOGLE_PYTHON_PACKAGE_MANAGER is not set to 'uv'"
                )
            )
        );
    }

    #[test]
    fn pyproject_gating_by_track_and_version() {
        let enabled = |track: &str, version: &str| {
            let test = TestContextBuilder::new()
                .file("pyproject.toml", "[project]\nname = \"app\"\n")
                .env("X_GOOGLE_RELEASE_TRACK", track)
                .env("GOOGLE_PYTHON_VERSION", version)
                .build();
            is_pyproject_enabled(&test.context)
        };

        assert!(enabled("GA", "3.13.1"));
        assert!(enabled("GA", "3.14.*"));
        assert!(!enabled("GA", "3.12.8"));
        assert!(enabled("BETA", "3.12.8"));
        assert!(enabled("ALPHA", "3.10"));
    }

    #[test]
    fn requirements_prevent_pyproject() {
        let test = TestContextBuilder::new()
            .file("pyproject.toml", "")
            .file("requirements.txt", "flask\n")
            .env("GOOGLE_PYTHON_VERSION", "3.13.1")
            .env("GOOGLE_PYTHON_PACKAGE_MANAGER", "pip")
            .build();

        assert!(!is_pyproject_enabled(&test.context));
        assert!(!is_pip_pyproject(&test.context));
    }

    #[test]
    fn pip_pyproject() {
        let test = TestContextBuilder::new()
            .file("pyproject.toml", "[project]\nname = \"app\"\n")
            .env("GOOGLE_PYTHON_VERSION", "3.13.1")
            .env("GOOGLE_PYTHON_PACKAGE_MANAGER", "Pip")
            .build();

        assert!(is_pip_pyproject(&test.context));
        assert_eq!(detected(&test), Some(PackageManager::Pip));
    }

    #[test]
    fn pyproject_defaults_to_uv() {
        let test = TestContextBuilder::new()
            .file("pyproject.toml", "[project]\nname = \"app\"\n")
            .env("GOOGLE_PYTHON_VERSION", "3.13.1")
            .build();

        assert_eq!(detected(&test), Some(PackageManager::Uv));
    }

    #[test]
    fn disabled_pyproject_has_nothing_to_install() {
        let test = TestContextBuilder::new()
            .file("pyproject.toml", "[project]\nname = \"app\"\n")
            .env("GOOGLE_PYTHON_VERSION", "3.12.1")
            .build();

        assert_eq!(detected(&test), None);
    }

    #[test]
    fn requirements_default_to_pip_below_3_14() {
        let test = TestContextBuilder::new()
            .file("requirements.txt", "flask\n")
            .env("GOOGLE_PYTHON_VERSION", "3.13.1")
            .build();

        let detection = detect_package_manager(&test.context).unwrap();
        assert_eq!(detection.package_manager, Some(PackageManager::Pip));
        assert_eq!(detection.reason, "found requirements.txt");
    }

    #[test]
    fn requirements_default_to_uv_from_3_14() {
        let test = TestContextBuilder::new()
            .file("requirements.txt", "flask\n")
            .env("GOOGLE_PYTHON_VERSION", "3.14.0rc2")
            .build();

        assert!(is_uv_requirements(&test.context).unwrap().matches);
        assert_eq!(detected(&test), Some(PackageManager::Uv));
    }

    #[test]
    fn requirements_with_pip_override_stay_on_pip() {
        let test = TestContextBuilder::new()
            .file("requirements.txt", "flask\n")
            .env("GOOGLE_PYTHON_VERSION", "3.14.0")
            .env("GOOGLE_PYTHON_PACKAGE_MANAGER", "pip")
            .build();

        assert!(!is_uv_requirements(&test.context).unwrap().matches);
        assert_eq!(detected(&test), Some(PackageManager::Pip));
    }

    #[test]
    fn empty_application() {
        let test = TestContextBuilder::new().file("main.py", "").build();

        assert_eq!(detected(&test), None);
    }
}
