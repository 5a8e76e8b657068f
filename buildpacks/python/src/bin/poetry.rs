// Dependencies of the library that this binary doesn't use directly.
use chrono as _;
use fancy_regex as _;
use libbuildpack_commons as _;
use serde as _;
use thiserror as _;
use toml as _;
use tracing as _;

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
#[cfg(test)]
use indoc as _;

libbuildpack::buildpack_main!(
    python_buildpacks::buildpacks::poetry::detect,
    python_buildpacks::buildpacks::poetry::build
);
