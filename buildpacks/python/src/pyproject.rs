//! The parts of `pyproject.toml` the buildpacks read.

use libbuildpack::{BuildpackError, Context};
use serde::Deserialize;
use std::collections::BTreeMap;

pub const PYPROJECT_TOML: &str = "pyproject.toml";
pub const POETRY_LOCK: &str = "poetry.lock";
pub const UV_LOCK: &str = "uv.lock";

#[derive(thiserror::Error, Debug)]
pub enum PyprojectError {
    #[error("reading {PYPROJECT_TOML}: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse {PYPROJECT_TOML}: {0}")]
    Parse(#[from] toml::de::Error),
}

impl From<PyprojectError> for BuildpackError {
    fn from(error: PyprojectError) -> Self {
        match error {
            PyprojectError::Io(io_error) => BuildpackError::Io(io_error),
            PyprojectError::Parse(_) => BuildpackError::user(error.to_string()),
        }
    }
}

/// A parsed `pyproject.toml`. Unknown keys are ignored.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Pyproject {
    project: Project,
    tool: Tool,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
struct Project {
    dependencies: Vec<String>,
    scripts: BTreeMap<String, toml::Value>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
struct Tool {
    poetry: Option<Poetry>,
    uv: Uv,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
struct Poetry {
    requires_poetry: Option<String>,
    dependencies: toml::Table,
    scripts: BTreeMap<String, toml::Value>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
struct Uv {
    required_version: Option<String>,
}

impl Pyproject {
    /// Reads `pyproject.toml` from the application directory.
    pub fn read(context: &Context) -> Result<Self, PyprojectError> {
        let contents = std::fs::read_to_string(context.app_dir().join(PYPROJECT_TOML))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, PyprojectError> {
        Ok(toml::from_str(contents)?)
    }

    /// Whether the file has a `[tool.poetry]` table, even an empty one.
    #[must_use]
    pub fn has_poetry_table(&self) -> bool {
        self.tool.poetry.is_some()
    }

    /// The `requires-poetry` constraint of `[tool.poetry]`.
    #[must_use]
    pub fn poetry_version_constraint(&self) -> Option<&str> {
        self.tool
            .poetry
            .as_ref()
            .and_then(|poetry| poetry.requires_poetry.as_deref())
            .filter(|constraint| !constraint.is_empty())
    }

    /// The `required-version` constraint of `[tool.uv]`.
    #[must_use]
    pub fn uv_version_constraint(&self) -> Option<&str> {
        self.tool
            .uv
            .required_version
            .as_deref()
            .filter(|constraint| !constraint.is_empty())
    }

    /// The PEP 621 dependency specifiers of `[project]`.
    #[must_use]
    pub fn project_dependencies(&self) -> &[String] {
        &self.project.dependencies
    }

    /// The package names of `[tool.poetry.dependencies]`.
    pub fn poetry_dependency_names(&self) -> impl Iterator<Item = &str> {
        self.tool
            .poetry
            .iter()
            .flat_map(|poetry| poetry.dependencies.keys())
            .map(String::as_str)
    }

    /// The script to start the application with.
    ///
    /// Poetry scripts are preferred over `[project.scripts]`. Within a table, a single script
    /// is picked regardless of its name, otherwise only a script called `start` qualifies.
    #[must_use]
    pub fn script_command(&self) -> Option<&str> {
        self.tool
            .poetry
            .as_ref()
            .and_then(|poetry| start_script(&poetry.scripts))
            .or_else(|| start_script(&self.project.scripts))
    }
}

fn start_script(scripts: &BTreeMap<String, toml::Value>) -> Option<&str> {
    match scripts.len() {
        0 => None,
        1 => scripts.keys().next().map(String::as_str),
        _ => scripts.get_key_value("start").map(|(name, _)| name.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::{Pyproject, PyprojectError};
    use indoc::indoc;
    use libbuildpack::{BuildpackError, ErrorKind};

    #[test]
    fn poetry_project() {
        let pyproject = Pyproject::parse(indoc! {r#"
            [tool.poetry]
            name = "app"
            requires-poetry = ">=2.0"

            [tool.poetry.dependencies]
            python = "^3.13"
            gunicorn = "^23.0"

            [tool.poetry.scripts]
            serve = "app.main:run"
        "#})
        .unwrap();

        assert!(pyproject.has_poetry_table());
        assert_eq!(pyproject.poetry_version_constraint(), Some(">=2.0"));
        assert_eq!(pyproject.uv_version_constraint(), None);
        assert_eq!(
            pyproject.poetry_dependency_names().collect::<Vec<_>>(),
            vec!["gunicorn", "python"]
        );
        assert_eq!(pyproject.script_command(), Some("serve"));
    }

    #[test]
    fn pep_621_project() {
        let pyproject = Pyproject::parse(indoc! {r#"
            [project]
            name = "app"
            dependencies = ["fastapi[standard]>=0.115", "httpx"]

            [project.scripts]
            start = "app:main"
            migrate = "app:migrate"

            [tool.uv]
            required-version = "~=0.6.0"
        "#})
        .unwrap();

        assert!(!pyproject.has_poetry_table());
        assert_eq!(pyproject.uv_version_constraint(), Some("~=0.6.0"));
        assert_eq!(
            pyproject.project_dependencies(),
            &["fastapi[standard]>=0.115", "httpx"]
        );
        assert_eq!(pyproject.poetry_dependency_names().count(), 0);
        assert_eq!(pyproject.script_command(), Some("start"));
    }

    #[test]
    fn ambiguous_scripts() {
        let pyproject = Pyproject::parse(indoc! {r#"
            [project.scripts]
            serve = "app:serve"
            migrate = "app:migrate"
        "#})
        .unwrap();

        assert_eq!(pyproject.script_command(), None);
    }

    #[test]
    fn poetry_scripts_win() {
        let pyproject = Pyproject::parse(indoc! {r#"
            [project.scripts]
            web = "app:web"

            [tool.poetry.scripts]
            start = { reference = "app:start", type = "console" }
        "#})
        .unwrap();

        assert_eq!(pyproject.script_command(), Some("start"));
    }

    #[test]
    fn empty_poetry_table() {
        let pyproject = Pyproject::parse("[tool.poetry]\n").unwrap();

        assert!(pyproject.has_poetry_table());
        assert_eq!(pyproject.poetry_version_constraint(), None);
    }

    #[test]
    fn parse_errors_are_user_errors() {
        let error = Pyproject::parse("[project\nname = 1").unwrap_err();
        assert!(matches!(error, PyprojectError::Parse(_)));

        let error = BuildpackError::from(error);
        assert_eq!(error.kind(), ErrorKind::User);
        assert!(error
            .to_string()
            .starts_with("could not parse pyproject.toml: "));
    }
}
