//! Selects the package manager that installs the dependencies of a Node.js application.

// This lint is too noisy and enforces a style that reduces readability in many cases.
#![allow(clippy::module_name_repetitions)]

pub mod buildpack;
pub mod package_json;
pub mod package_manager;
