//! A small framework for writing Cloud Native Buildpacks that install Python dependencies.
//!
//! Every buildpack is a pair of functions: a detect function that receives a shared
//! [`Context`] and returns a [`detect::DetectResult`], and a build function that receives a
//! mutable [`Context`]. The [`runtime`] module wires such a pair up to the CNB executables.

// Enable rustc and Clippy lints that are disabled by default.
// https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html#unused-crate-dependencies
#![warn(unused_crate_dependencies)]
// https://rust-lang.github.io/rust-clippy/stable/index.html
#![warn(clippy::pedantic)]
// This lint is too noisy and enforces a style that reduces readability in many cases.
#![allow(clippy::module_name_repetitions)]
// This lint triggers when both layer_dir and layers_dir are present which are quite common.
#![allow(clippy::similar_names)]

pub mod config;
pub mod context;
pub mod detect;
pub mod exec;
pub mod layer;
pub mod layer_env;
pub mod log;
pub mod metrics;
pub mod runtime;
#[cfg(feature = "testing")]
pub mod testing;

mod env;
mod error;
mod exit_code;
mod write;

#[doc(inline)]
pub use libbuildpack_data as data;

pub use context::Context;
pub use env::*;
pub use error::*;
