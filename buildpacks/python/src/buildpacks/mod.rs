//! The detect and build functions of each buildpack, one module per buildpack.

use crate::manifest::REQUIREMENTS_TXT;
use libbuildpack::data::build_plan::{BuildPlan, BuildPlanBuilder};

pub mod functions_framework;
pub mod missing_entrypoint;
pub mod pip;
pub mod poetry;
pub mod uv;
pub mod webserver;

/// A plan that requires `requirements.txt`, and provides it too if `provides` is set.
///
/// Buildpacks that only contribute requirements files (like the webserver buildpack) provide
/// `requirements.txt`, the installing buildpacks require it. Without a provider an installing
/// buildpack is removed from the build by the lifecycle.
fn requirements_plan(provides: bool) -> BuildPlan {
    let builder = BuildPlanBuilder::new();
    let builder = if provides {
        builder.provides(REQUIREMENTS_TXT)
    } else {
        builder
    };
    builder.requires(REQUIREMENTS_TXT).build()
}
