use serde as _;
use serde_json as _;
use thiserror as _;
use tracing as _;

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
#[cfg(test)]
use indoc as _;
#[cfg(test)]
use toml as _;

libbuildpack::buildpack_main!(
    nodejs_buildpacks::buildpack::detect,
    nodejs_buildpacks::buildpack::build
);
