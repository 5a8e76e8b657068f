//! Opinionated common code for the Python dependency buildpacks.
//!
//! Contains helpers that are shared between buildpacks but are not part of the more generic
//! libbuildpack framework.

#[cfg(feature = "cache")]
pub mod cache;
#[cfg(feature = "digest")]
pub mod digest;
#[cfg(feature = "version")]
pub mod version;
