//! Detect and build logic of the Python dependency buildpacks.
//!
//! Each buildpack in [`buildpacks`] is a detect/build function pair that a binary in `src/bin`
//! hands to [`libbuildpack::buildpack_main!`]. The remaining modules hold the logic they share:
//! deciding on a package manager, keeping the dependency layers cached and running the
//! installers.

// This lint is too noisy and enforces a style that reduces readability in many cases.
#![allow(clippy::module_name_repetitions)]

pub mod buildpacks;
pub mod dependencies;
pub mod entrypoint;
pub mod install;
pub mod manifest;
pub mod package_manager;
pub mod pyproject;
pub mod runtime_version;
