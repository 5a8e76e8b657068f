//! Installs dependencies with uv, for `pyproject.toml` projects and for `requirements.txt`
//! applications that opted in.

use super::requirements_plan;
use crate::install::uv::{
    ensure_uv_lockfile, install_uv, uv_install_pyproject, uv_install_requirements,
};
use crate::manifest::{RequirementsFiles, REQUIREMENTS_TXT};
use crate::package_manager::{detect_package_manager, is_pyproject_enabled, PackageManager};
use libbuildpack::data::layer_content_metadata::LayerTypes;
use libbuildpack::detect::{DetectResult, DetectResultBuilder};
use libbuildpack::metrics::MetricId;
use libbuildpack::{Context, Result};

pub const LAYER_NAME: &str = "uv-dependencies";

pub fn detect(context: &Context) -> Result<DetectResult> {
    let detection = detect_package_manager(context)?;
    let result = match detection.package_manager {
        Some(PackageManager::Uv) if is_pyproject_enabled(context) => {
            DetectResultBuilder::pass(detection.reason).build()
        }
        Some(PackageManager::Uv) if context.file_exists(REQUIREMENTS_TXT) => {
            DetectResultBuilder::pass(detection.reason)
                .build_plan(requirements_plan(true))
                .build()
        }
        Some(PackageManager::Uv) => DetectResultBuilder::fail(
            "Python UV Buildpack is not supported in the current release track.",
        )
        .build(),
        Some(package_manager) => DetectResultBuilder::fail(format!(
            "{}, dependencies are installed with {package_manager}",
            detection.reason
        ))
        .build(),
        None => DetectResultBuilder::fail(detection.reason).build(),
    };

    Ok(result)
}

pub fn build(context: &mut Context) -> Result<()> {
    context.metrics().counter(MetricId::UvUsage).increment(1);
    install_uv(context).map_err(|error| error.wrap("installing uv"))?;

    let mut layer = context.layer(LAYER_NAME, LayerTypes::all())?;
    if is_pyproject_enabled(context) {
        tracing::info!(config_file = "pyproject.toml", "installing with uv");
        ensure_uv_lockfile(context).map_err(|error| error.wrap("ensuring uv.lock file"))?;
        uv_install_pyproject(context, &mut layer)
            .map_err(|error| error.wrap("installing dependencies with uv"))?;
    } else {
        tracing::info!(config_file = REQUIREMENTS_TXT, "installing with uv");
        let requirements = RequirementsFiles::discover(context);
        uv_install_requirements(context, &mut layer, &requirements)
            .map_err(|error| error.wrap("installing dependencies with uv"))?;
    }

    context.write_layer(&layer)
}
