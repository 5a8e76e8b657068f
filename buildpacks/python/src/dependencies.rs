//! Reuse of installed dependencies across builds, and lookups of declared dependencies.

use crate::manifest::{RequirementsFiles, REQUIREMENTS_TXT};
use crate::package_manager::is_pyproject_enabled;
use crate::pyproject::{Pyproject, PyprojectError, PYPROJECT_TOML};
use crate::runtime_version::python_version;
use chrono::{Duration, Utc};
use libbuildpack::layer::Layer;
use libbuildpack::{BuildpackError, Context, Result};
use libbuildpack_commons::cache::{self, CacheInput};

pub const DEPENDENCY_HASH_KEY: &str = "dependency_hash";
pub const PYTHON_VERSION_KEY: &str = "python_version";
pub const EXPIRY_TIMESTAMP_KEY: &str = "expiry_timestamp";

/// How long installed dependencies are reused. Unpinned dependencies pick up new releases
/// once this has passed.
pub const CACHE_TTL_HOURS: i64 = 24;

/// Decides whether the dependencies in `layer` have to be installed again.
///
/// Returns `false` when the layer still holds dependencies installed from the same `inputs`
/// within the last day. Otherwise the layer is cleared, its metadata is set for the upcoming
/// install and `true` is returned. The metadata only reaches the disk once the caller writes
/// the layer after a successful install.
pub fn refresh_layer(
    context: &Context,
    layer: &mut Layer,
    inputs: &[CacheInput],
    python_version: &str,
) -> Result<bool> {
    let (hash, cached) = cache::hash_and_check(context, layer, DEPENDENCY_HASH_KEY, inputs)?;
    let expired = cache::cache_expired(context, layer, EXPIRY_TIMESTAMP_KEY);
    let layer_name = layer.name().as_str().to_string();

    if cached && !expired {
        context.cache_hit(&layer_name);
        return Ok(false);
    }

    context.cache_miss(&layer_name);
    if expired {
        context.debug("Dependencies cache expired, clearing layer.");
    }

    context.clear_layer(layer)?;
    cache::add(layer, DEPENDENCY_HASH_KEY, hash);
    layer.set_metadata(PYTHON_VERSION_KEY, python_version);
    layer.set_metadata(
        EXPIRY_TIMESTAMP_KEY,
        cache::expiry_timestamp(Utc::now(), Duration::hours(CACHE_TTL_HOURS)),
    );

    Ok(true)
}

/// [`refresh_layer`] for requirements files installed by `installer`.
///
/// An empty list clears the layer and never needs an install.
pub fn prepare_dependencies_layer(
    context: &Context,
    layer: &mut Layer,
    installer: &str,
    requirements: &RequirementsFiles,
) -> Result<bool> {
    if requirements.is_empty() {
        context.debug("No requirements files to install, clearing layer.");
        context.clear_layer(layer)?;
        return Ok(false);
    }

    let python_version = python_version(context)?;
    refresh_layer(
        context,
        layer,
        &[
            CacheInput::files(requirements.iter()),
            CacheInput::strings([python_version.as_str(), installer]),
        ],
        &python_version,
    )
}

/// Returns true if `contents`, a requirements file or a list of PEP 508 specifiers, declares
/// the package `name`.
///
/// Names followed by `-` don't count, so `gunicorn-extras` does not declare `gunicorn`.
pub fn contains_package(contents: &str, name: &str) -> Result<bool> {
    let escaped = fancy_regex::escape(name);
    let boundary = if name.ends_with(|c: char| c.is_alphanumeric() || c == '_') {
        r"\b"
    } else {
        ""
    };

    for pattern in [
        format!(r"(?m)^{escaped}{boundary}([^-]|$)"),
        format!(r"(?m)#egg={escaped}$"),
    ] {
        let matched = fancy_regex::Regex::new(&pattern)
            .and_then(|regex| regex.is_match(contents))
            .map_err(|error| {
                BuildpackError::internal(format!("matching package {name:?}: {error}"))
            })?;
        if matched {
            return Ok(true);
        }
    }

    Ok(false)
}

/// The packages an application declares, read once for repeated lookups.
///
/// `requirements.txt` is used if it exists. Otherwise the `[project]` and
/// `[tool.poetry]` dependencies of an enabled `pyproject.toml` are used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredPackages {
    specifiers: String,
    names: Vec<String>,
}

impl DeclaredPackages {
    pub fn read(context: &Context) -> Result<Self> {
        if context.file_exists(REQUIREMENTS_TXT) {
            return Ok(Self {
                specifiers: context.read_file(REQUIREMENTS_TXT)?,
                names: Vec::new(),
            });
        }
        if !is_pyproject_enabled(context) {
            return Ok(Self::default());
        }

        match Pyproject::read(context) {
            Ok(pyproject) => Ok(Self {
                specifiers: pyproject.project_dependencies().join("\n"),
                names: pyproject
                    .poetry_dependency_names()
                    .map(String::from)
                    .collect(),
            }),
            Err(PyprojectError::Io(error)) => Err(error.into()),
            Err(error) => {
                context.warn(format!("Could not parse {PYPROJECT_TOML}: {error}"));
                Ok(Self::default())
            }
        }
    }

    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.names.iter().any(|n| n == name) || contains_package(&self.specifiers, name)?)
    }
}

/// Returns true if the application declares the package `name`.
pub fn package_present(context: &Context, name: &str) -> Result<bool> {
    DeclaredPackages::read(context)?.contains(name)
}

#[cfg(test)]
mod tests {
    use super::{
        contains_package, package_present, prepare_dependencies_layer, DEPENDENCY_HASH_KEY,
        EXPIRY_TIMESTAMP_KEY, PYTHON_VERSION_KEY,
    };
    use crate::manifest::RequirementsFiles;
    use indoc::indoc;
    use libbuildpack::data::layer_content_metadata::LayerTypes;
    use libbuildpack::testing::{ScriptedRunner, TestContext, TestContextBuilder};
    use std::fs;

    fn python_app() -> TestContext {
        TestContextBuilder::new()
            .file("requirements.txt", "flask==3.1.0\n")
            .runner(ScriptedRunner::new().stdout("python3 --version", "Python 3.13.1\n"))
            .build()
    }

    /// Runs one build of the cache engine and persists the layer like an install would.
    fn prepare(test: &TestContext, installer: &str) -> bool {
        let requirements = RequirementsFiles::discover(&test.context);
        let mut layer = test.context.layer("pip", LayerTypes::all()).unwrap();
        let install = prepare_dependencies_layer(&test.context, &mut layer, installer, &requirements)
            .unwrap();
        test.context.write_layer(&layer).unwrap();
        install
    }

    #[test]
    fn unchanged_inputs_are_reused() {
        let test = python_app();

        assert!(prepare(&test, "pip"));
        assert!(!prepare(&test, "pip"));
    }

    #[test]
    fn metadata_is_set_for_the_install() {
        let test = python_app();
        prepare(&test, "pip");

        let layer = test.context.layer("pip", LayerTypes::all()).unwrap();
        assert_eq!(layer.metadata(PYTHON_VERSION_KEY), Some("Python 3.13.1"));
        assert_eq!(layer.metadata(DEPENDENCY_HASH_KEY).map(str::len), Some(64));
        assert!(layer.metadata(EXPIRY_TIMESTAMP_KEY).is_some());
    }

    #[test]
    fn changed_requirements_are_installed() {
        let test = python_app();
        prepare(&test, "pip");

        test.write_app_file("requirements.txt", "flask==3.1.1\n");

        assert!(prepare(&test, "pip"));
    }

    #[test]
    fn changed_installer_is_installed() {
        let test = python_app();
        prepare(&test, "pip");

        assert!(prepare(&test, "uv"));
    }

    #[test]
    fn changed_python_version_is_installed() {
        let test = python_app();
        prepare(&test, "pip");

        let upgraded = TestContextBuilder::new()
            .file("requirements.txt", "flask==3.1.0\n")
            .runner(ScriptedRunner::new().stdout("python3 --version", "Python 3.13.2\n"))
            .build();
        let mut layer = upgraded.context.layer("pip", LayerTypes::all()).unwrap();
        for key in [DEPENDENCY_HASH_KEY, PYTHON_VERSION_KEY, EXPIRY_TIMESTAMP_KEY] {
            let previous = test.context.layer("pip", LayerTypes::all()).unwrap();
            layer.set_metadata(key, previous.metadata(key).unwrap());
        }
        let requirements = RequirementsFiles::discover(&upgraded.context);

        assert!(
            prepare_dependencies_layer(&upgraded.context, &mut layer, "pip", &requirements)
                .unwrap()
        );
    }

    #[test]
    fn expired_layers_are_cleared() {
        let test = python_app();
        prepare(&test, "pip");

        let mut layer = test.context.layer("pip", LayerTypes::all()).unwrap();
        layer.set_metadata(EXPIRY_TIMESTAMP_KEY, "2020-01-01T00:00:00.000000000Z");
        test.context.write_layer(&layer).unwrap();
        fs::write(layer.path().join("stale"), "").unwrap();

        assert!(prepare(&test, "pip"));
        assert!(!layer.path().join("stale").exists());
    }

    #[test]
    fn missing_expiry_counts_as_expired() {
        let test = python_app();
        prepare(&test, "pip");

        let mut layer = test.context.layer("pip", LayerTypes::all()).unwrap();
        let hash = layer.metadata(DEPENDENCY_HASH_KEY).unwrap().to_string();
        test.context.clear_layer(&mut layer).unwrap();
        layer.set_metadata(DEPENDENCY_HASH_KEY, hash);
        test.context.write_layer(&layer).unwrap();

        assert!(prepare(&test, "pip"));
    }

    #[test]
    fn failed_install_after_a_clear_is_not_reused() {
        let test = python_app();
        assert!(prepare(&test, "pip"));

        test.write_app_file("requirements.txt", "flask==3.1.1\n");
        let requirements = RequirementsFiles::discover(&test.context);
        let mut layer = test.context.layer("pip", LayerTypes::all()).unwrap();
        // The install fails, so the layer is never written.
        assert!(
            prepare_dependencies_layer(&test.context, &mut layer, "pip", &requirements).unwrap()
        );

        test.write_app_file("requirements.txt", "flask==3.1.0\n");

        assert!(prepare(&test, "pip"));
    }

    #[test]
    fn nothing_to_install_clears_the_layer() {
        let test = TestContextBuilder::new().file("main.py", "").build();
        let mut layer = test.context.layer("pip", LayerTypes::all()).unwrap();
        layer.set_metadata(DEPENDENCY_HASH_KEY, "abc");
        fs::write(layer.path().join("old"), "").unwrap();

        let install =
            prepare_dependencies_layer(&test.context, &mut layer, "pip", &RequirementsFiles::new())
                .unwrap();

        assert!(!install);
        assert_eq!(layer.metadata(DEPENDENCY_HASH_KEY), None);
        assert!(!layer.path().join("old").exists());
        assert!(test.runner.command_lines().is_empty());
    }

    #[test]
    fn package_matching() {
        let requirements = indoc! {"
            gunicorn-extras==1.0
            Flask>=3
            uvicorn[standard]==0.34
            fastapi[standard]
            git+https://github.com/benoitc/gunicorn.git#egg=gunicorn
        "};

        assert!(contains_package(requirements, "uvicorn").unwrap());
        assert!(contains_package(requirements, "fastapi[standard]").unwrap());
        assert!(contains_package(requirements, "gunicorn").unwrap());
        assert!(!contains_package("gunicorn-extras==1.0\n", "gunicorn").unwrap());
        assert!(!contains_package(requirements, "streamlit").unwrap());
        assert!(!contains_package("fastapi\n", "fastapi[standard]").unwrap());
        assert!(contains_package("streamlit", "streamlit").unwrap());
    }

    #[test]
    fn requirements_win_over_pyproject() {
        let test = TestContextBuilder::new()
            .file("requirements.txt", "flask\n")
            .file("pyproject.toml", "[project]\ndependencies = [\"gunicorn\"]\n")
            .build();

        assert!(!package_present(&test.context, "gunicorn").unwrap());
        assert!(package_present(&test.context, "flask").unwrap());
    }

    #[test]
    fn pyproject_dependencies() {
        let test = TestContextBuilder::new()
            .file(
                "pyproject.toml",
                indoc! {r#"
                    [project]
                    dependencies = ["streamlit>=1.40", "httpx"]

                    [tool.poetry.dependencies]
                    gradio = "^5.0"
                "#},
            )
            .env("GOOGLE_PYTHON_VERSION", "3.13.1")
            .build();

        assert!(package_present(&test.context, "streamlit").unwrap());
        assert!(package_present(&test.context, "gradio").unwrap());
        assert!(!package_present(&test.context, "gunicorn").unwrap());
    }

    #[test]
    fn disabled_pyproject_declares_nothing() {
        let test = TestContextBuilder::new()
            .file("pyproject.toml", "[project]\ndependencies = [\"streamlit\"]\n")
            .env("GOOGLE_PYTHON_VERSION", "3.12.1")
            .build();

        assert!(!package_present(&test.context, "streamlit").unwrap());
    }

    #[test]
    fn unparseable_pyproject_warns() {
        let test = TestContextBuilder::new()
            .file("pyproject.toml", "[project\n")
            .env("GOOGLE_PYTHON_VERSION", "3.13.1")
            .build();

        assert!(!package_present(&test.context, "streamlit").unwrap());
        assert_eq!(test.context.warnings().len(), 1);
    }
}
