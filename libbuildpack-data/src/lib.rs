//! Low-level representations for the Cloud Native Buildpack files the buildpacks in this
//! workspace produce and consume.

// Enable rustc and Clippy lints that are disabled by default.
// https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html#unused-crate-dependencies
#![warn(unused_crate_dependencies)]
// https://rust-lang.github.io/rust-clippy/stable/index.html
#![warn(clippy::pedantic)]
// This lint is too noisy and enforces a style that reduces readability in many cases.
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod build_plan;
pub mod buildpack;
pub mod launch;
pub mod layer;
pub mod layer_content_metadata;

mod newtypes;
