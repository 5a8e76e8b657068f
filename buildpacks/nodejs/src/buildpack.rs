//! The package-manager buildpack: reports and records which package manager a Node.js
//! application uses.

use crate::package_json::PACKAGE_JSON;
use crate::package_manager::detect_node_package_manager;
use libbuildpack::detect::{DetectResult, DetectResultBuilder};
use libbuildpack::{Context, Result};

pub fn detect(context: &Context) -> Result<DetectResult> {
    if !context.file_exists(PACKAGE_JSON) {
        return Ok(DetectResultBuilder::fail(format!("{PACKAGE_JSON} not found")).build());
    }

    let detection = detect_node_package_manager(context)?;
    Ok(DetectResultBuilder::pass(detection.reason).build())
}

pub fn build(context: &mut Context) -> Result<()> {
    let detection = detect_node_package_manager(context)?;
    let package_manager = detection.package_manager;

    context
        .metrics()
        .counter(package_manager.usage_metric())
        .increment(1);
    tracing::info!(%package_manager, version = ?detection.version, "selected package manager");

    match detection.version {
        Some(version) => context.log(format!(
            "Using {package_manager} {version} ({})",
            detection.reason
        )),
        None => context.log(format!("Using {package_manager} ({})", detection.reason)),
    }

    Ok(())
}
