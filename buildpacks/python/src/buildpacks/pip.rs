//! Installs dependencies with pip, from `requirements.txt` files or a `pyproject.toml`.

use super::requirements_plan;
use crate::install::pip::{pip_install_pyproject, UserSitePipInstaller};
use crate::install::PipInstaller;
use crate::manifest::{RequirementsFiles, REQUIREMENTS_TXT};
use crate::package_manager::{detect_package_manager, is_pip_pyproject, PackageManager};
use libbuildpack::config::env;
use libbuildpack::data::layer_content_metadata::LayerTypes;
use libbuildpack::detect::{DetectResult, DetectResultBuilder};
use libbuildpack::metrics::MetricId;
use libbuildpack::{BuildpackError, Context, Result};
use std::time::Instant;

pub const LAYER_NAME: &str = "pip";

pub fn detect(context: &Context) -> Result<DetectResult> {
    let detection = detect_package_manager(context)?;
    match detection.package_manager {
        Some(package_manager @ (PackageManager::Poetry | PackageManager::Uv)) => {
            Ok(DetectResultBuilder::fail(format!(
                "{}, dependencies are installed with {package_manager}",
                detection.reason
            ))
            .build())
        }
        _ if is_pip_pyproject(context) => Ok(DetectResultBuilder::pass(format!(
            "found pyproject.toml, using pip because {} is set to 'pip'",
            env::PYTHON_PACKAGE_MANAGER
        ))
        .build()),
        // Always passes, other buildpacks may contribute requirements files.
        _ => Ok(DetectResultBuilder::pass(detection.reason)
            .build_plan(requirements_plan(context.file_exists(REQUIREMENTS_TXT)))
            .build()),
    }
}

pub fn build(context: &mut Context) -> Result<()> {
    build_with(context, &UserSitePipInstaller)
}

/// The build of the pip buildpack with the given requirements installer.
pub fn build_with(context: &mut Context, installer: &dyn PipInstaller) -> Result<()> {
    context.metrics().counter(MetricId::PipUsage).increment(1);
    let mut layer = context.layer(LAYER_NAME, LayerTypes::all())?;

    if is_pip_pyproject(context) {
        tracing::info!(config_file = "pyproject.toml", "installing with pip");
        pip_install_pyproject(context, &mut layer).map_err(|error| {
            BuildpackError::user(format!(
                "installing dependencies from pyproject.toml: {error}"
            ))
        })?;
    } else {
        tracing::info!(config_file = REQUIREMENTS_TXT, "installing with pip");
        let requirements = RequirementsFiles::discover(context);

        let start = Instant::now();
        installer
            .install(context, &mut layer, &requirements)
            .map_err(|error| {
                error.wrap("installing dependencies from requirements.txt and validating them")
            })?;
        context
            .metrics()
            .float_data_point(MetricId::PipInstallLatency)
            .add(start.elapsed().as_secs_f64());
    }

    context.write_layer(&layer)
}
