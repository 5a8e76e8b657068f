//! Sets a default `web` process for Python applications that don't configure an entrypoint.

use crate::entrypoint::{add_gradio_env_layer, entrypoint_configured, infer_entrypoint};
use libbuildpack::config::env;
use libbuildpack::data::launch::{ProcessBuilder, ProcessType};
use libbuildpack::detect::{DetectResult, DetectResultBuilder};
use libbuildpack::{BuildpackError, Context, Result};
use std::fs;
use std::path::Path;

const RUNTIME: &str = "python";

pub fn detect(context: &Context) -> Result<DetectResult> {
    if entrypoint_configured(context) {
        return Ok(DetectResultBuilder::fail("custom entrypoint present").build());
    }

    if let Some(runtime) = context.env_var(env::RUNTIME) {
        let variable = env::RUNTIME;
        return Ok(if runtime.trim().to_lowercase().starts_with(RUNTIME) {
            DetectResultBuilder::pass(format!("{variable} matches {RUNTIME:?}")).build()
        } else {
            DetectResultBuilder::fail(format!("{variable} does not match to {RUNTIME:?}")).build()
        });
    }

    if has_python_files(context.app_dir()).map_err(|error| {
        BuildpackError::from(error).wrap("finding *.py files")
    })? {
        Ok(DetectResultBuilder::pass("found .py files").build())
    } else {
        Ok(DetectResultBuilder::fail("no .py files found").build())
    }
}

pub fn build(context: &mut Context) -> Result<()> {
    let entrypoint = infer_entrypoint(context)?;
    if entrypoint.gradio_env {
        add_gradio_env_layer(context)
            .map_err(|error| error.wrap("error adding gradio env var layer"))?;
    }

    context.warn(format!(
        "Setting default entrypoint: {:?}",
        entrypoint.command_line()
    ));
    tracing::info!(entrypoint = %entrypoint.command_line(), "default entrypoint");

    let web = "web"
        .parse::<ProcessType>()
        .map_err(|error| BuildpackError::internal(error.to_string()))?;
    context.add_process(
        ProcessBuilder::new(web, entrypoint.command)
            .default(true)
            .build(),
    );

    Ok(())
}

/// Whether `dir` has a `*.py` file, not looking into subdirectories.
fn has_python_files(dir: &Path) -> std::io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|extension| extension == "py") {
            return Ok(true);
        }
    }

    Ok(false)
}
