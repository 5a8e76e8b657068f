//! Layers: named directories in the layers directory that the lifecycle caches, exposes to
//! later buildpacks or adds to the application image.

// This lint triggers when both layer_dir and layers_dir are present which are quite common.
#![allow(clippy::similar_names)]

use crate::layer_env::LayerEnv;
use libbuildpack_common::toml_file::{read_toml_file_if_exists, write_toml_file, TomlFileError};
use libbuildpack_data::layer::{LayerName, LayerNameError};
use libbuildpack_data::layer_content_metadata::{LayerContentMetadata, LayerTypes};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum LayerError {
    #[error("Invalid layer name: {0}")]
    InvalidName(#[from] LayerNameError),

    #[error("Layer content metadata of {0:?} couldn't be read or written: {1}")]
    ContentMetadata(String, TomlFileError),

    #[error("Unexpected I/O error for layer {0:?}: {1}")]
    Io(String, std::io::Error),
}

/// A layer as seen during the build.
///
/// The metadata and env are restored from a previous build when the lifecycle restored the
/// layer. Changes only reach the disk with [`Context::write_layer`](crate::Context::write_layer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    name: LayerName,
    path: PathBuf,
    types: LayerTypes,
    metadata: BTreeMap<String, String>,
    env: LayerEnv,
}

impl Layer {
    #[must_use]
    pub fn name(&self) -> &LayerName {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn types(&self) -> LayerTypes {
        self.types
    }

    /// Returns the metadata value for `key`, if any.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn env(&self) -> &LayerEnv {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut LayerEnv {
        &mut self.env
    }
}

/// Opens a layer, creating its directory if it doesn't exist yet.
pub(crate) fn open_layer(
    layers_dir: &Path,
    name: &str,
    types: LayerTypes,
) -> Result<Layer, LayerError> {
    let name = name.parse::<LayerName>()?;
    let path = layers_dir.join(name.as_str());

    fs::create_dir_all(&path).map_err(|error| LayerError::Io(name.to_string(), error))?;

    let metadata = read_toml_file_if_exists::<LayerContentMetadata>(content_metadata_path(
        layers_dir, &name,
    ))
    .map_err(|error| LayerError::ContentMetadata(name.to_string(), error))?
    .map(|content_metadata| content_metadata.metadata)
    .unwrap_or_default();

    let env = LayerEnv::read_from_layer_dir(&path)
        .map_err(|error| LayerError::Io(name.to_string(), error))?;

    Ok(Layer {
        name,
        path,
        types,
        metadata,
        env,
    })
}

/// Removes all contents of the layer directory, its metadata and its env.
///
/// The persisted content metadata is removed as well, so metadata of the cleared contents can't
/// be restored by a later build.
pub(crate) fn clear_layer(layers_dir: &Path, layer: &mut Layer) -> Result<(), LayerError> {
    let io_error = |error| LayerError::Io(layer.name.to_string(), error);

    if layer.path.exists() {
        fs::remove_dir_all(&layer.path).map_err(io_error)?;
    }
    fs::create_dir_all(&layer.path).map_err(io_error)?;

    match fs::remove_file(content_metadata_path(layers_dir, &layer.name)) {
        Err(error) if error.kind() != std::io::ErrorKind::NotFound => return Err(io_error(error)),
        _ => {}
    }

    layer.metadata.clear();
    layer.env = LayerEnv::new();

    Ok(())
}

/// Persists the layer's types, metadata and env.
pub(crate) fn write_layer(layers_dir: &Path, layer: &Layer) -> Result<(), LayerError> {
    let content_metadata = LayerContentMetadata {
        types: layer.types,
        metadata: layer.metadata.clone(),
    };

    write_toml_file(
        &content_metadata,
        content_metadata_path(layers_dir, &layer.name),
    )
    .map_err(|error| LayerError::ContentMetadata(layer.name.to_string(), error))?;

    layer
        .env
        .write_to_layer_dir(&layer.path)
        .map_err(|error| LayerError::Io(layer.name.to_string(), error))
}

fn content_metadata_path(layers_dir: &Path, name: &LayerName) -> PathBuf {
    layers_dir.join(format!("{name}.toml"))
}
