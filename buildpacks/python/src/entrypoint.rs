//! Default entrypoints for applications that don't configure one.

use crate::dependencies::DeclaredPackages;
use crate::package_manager::{is_poetry_project, is_pyproject_enabled, is_uv_pyproject};
use crate::pyproject::{Pyproject, PyprojectError, PYPROJECT_TOML};
use crate::runtime_version::runtime_version_at_least;
use libbuildpack::config::env;
use libbuildpack::data::layer_content_metadata::LayerTypes;
use libbuildpack::layer_env::{ModificationBehavior, Scope};
use libbuildpack::{BuildpackError, Context, Result};

pub const PROCFILE: &str = "Procfile";
pub const GRADIO_ENV_LAYER: &str = "gradio-env-var";

/// Framework aware entrypoints need at least this Python version.
const SMART_DEFAULT_MIN_VERSION: &str = "3.13.0";

const GOOGLE_ADK: &str = "google-adk";
const STREAMLIT: &str = "streamlit";
const GRADIO: &str = "gradio";
const UVICORN: &str = "uvicorn";
const FASTAPI_STANDARD: &str = "fastapi[standard]";

/// The command the `web` process runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrypoint {
    pub command: Vec<String>,
    /// Gradio apps read their listen address from the environment, see
    /// [`add_gradio_env_layer`].
    pub gradio_env: bool,
}

impl Entrypoint {
    fn new(command: &[&str]) -> Self {
        Self {
            command: command.iter().map(ToString::to_string).collect(),
            gradio_env: false,
        }
    }

    /// The command as a single line, for logs.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}

/// Whether the application configures its own entrypoint, with `GOOGLE_ENTRYPOINT` or a
/// `Procfile`.
#[must_use]
pub fn entrypoint_configured(context: &Context) -> bool {
    context.env_var(env::ENTRYPOINT).is_some() || context.file_exists(PROCFILE)
}

/// Whether the requested Python version gets framework aware entrypoints.
pub fn supports_smart_default_entrypoint(context: &Context) -> Result<bool> {
    if !context.feature_gates().smart_default_entrypoint {
        return Ok(false);
    }
    runtime_version_at_least(context, SMART_DEFAULT_MIN_VERSION)
}

/// Picks the entrypoint of an application from its files and declared packages.
///
/// The module is `main` if there is a `main.py`, otherwise `app`. From Python 3.13 on, a
/// declared web framework selects its own launcher, and a script of an enabled
/// `pyproject.toml` wins over everything else. The fallback is gunicorn.
pub fn infer_entrypoint(context: &Context) -> Result<Entrypoint> {
    let has_main = context.file_exists("main.py");
    let has_app = context.file_exists("app.py");
    let (module, file) = if has_main {
        ("main:app", "main.py")
    } else {
        ("app:app", "app.py")
    };

    let smart_default = supports_smart_default_entrypoint(context)?;
    let packages = if smart_default {
        DeclaredPackages::read(context)?
    } else {
        DeclaredPackages::default()
    };
    let adk_present = packages.contains(GOOGLE_ADK)?;

    let pyproject_enabled = is_pyproject_enabled(context);
    let script = if pyproject_enabled {
        script_command(context)?
    } else {
        None
    };

    if script.is_none() && !has_main && !has_app && !adk_present {
        return Err(BuildpackError::user(if pyproject_enabled {
            format!(
                "for Python with {PYPROJECT_TOML}, provide a main.py or app.py file or a script command in {PYPROJECT_TOML} or set an entrypoint with {:?} env var or by creating a {PROCFILE:?} file",
                env::ENTRYPOINT
            )
        } else {
            format!(
                "for Python, provide a main.py or app.py file or set an entrypoint with {:?} env var or by creating a {PROCFILE:?} file",
                env::ENTRYPOINT
            )
        }));
    }

    if let Some(script) = script {
        let command = if is_poetry_project(context)?.matches {
            Entrypoint::new(&["poetry", "run", script.as_str()])
        } else if is_uv_pyproject(context)?.matches {
            Entrypoint::new(&["uv", "run", script.as_str()])
        } else {
            Entrypoint::new(&[script.as_str()])
        };
        return Ok(command);
    }

    if smart_default {
        framework_entrypoint(&packages, module, file)
    } else {
        Ok(Entrypoint::new(&["gunicorn", "-b", ":8080", module]))
    }
}

fn framework_entrypoint(
    packages: &DeclaredPackages,
    module: &str,
    file: &str,
) -> Result<Entrypoint> {
    Ok(if packages.contains(GOOGLE_ADK)? {
        Entrypoint::new(&["adk", "api_server", "--port", "8080", "--host", "0.0.0.0"])
    } else if packages.contains(STREAMLIT)? {
        Entrypoint::new(&[
            "streamlit",
            "run",
            file,
            "--server.address",
            "0.0.0.0",
            "--server.port",
            "8080",
        ])
    } else if packages.contains(GRADIO)? {
        Entrypoint {
            gradio_env: true,
            ..Entrypoint::new(&["python", file])
        }
    } else if packages.contains(FASTAPI_STANDARD)? || packages.contains(UVICORN)? {
        Entrypoint::new(&["uvicorn", module, "--port", "8080", "--host", "0.0.0.0"])
    } else {
        // Also covers a declared gunicorn.
        Entrypoint::new(&["gunicorn", "-b", ":8080", module])
    })
}

/// The script of `pyproject.toml` to start the application with. An unparseable file only
/// warns.
fn script_command(context: &Context) -> Result<Option<String>> {
    match Pyproject::read(context) {
        Ok(pyproject) => Ok(pyproject.script_command().map(String::from)),
        Err(PyprojectError::Io(error)) => Err(error.into()),
        Err(error) => {
            context.warn(format!("Could not parse {PYPROJECT_TOML}: {error}"));
            Ok(None)
        }
    }
}

/// Makes Gradio listen on all interfaces on port 8080 at launch, unless configured otherwise.
pub fn add_gradio_env_layer(context: &Context) -> Result<()> {
    let mut layer = context.layer(GRADIO_ENV_LAYER, LayerTypes::default().cache().launch())?;
    let layer_env = layer.env_mut();
    layer_env.insert(
        Scope::Launch,
        ModificationBehavior::Default,
        "GRADIO_SERVER_NAME",
        "0.0.0.0",
    );
    layer_env.insert(
        Scope::Launch,
        ModificationBehavior::Default,
        "GRADIO_SERVER_PORT",
        "8080",
    );
    context.write_layer(&layer)
}
