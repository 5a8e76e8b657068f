use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Used to specify layer availability based on buildpack phase.
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct LayerTypes {
    /// Whether the layer is intended for launch.
    #[serde(default)]
    pub launch: bool,

    /// Whether the layer is intended for build.
    #[serde(default)]
    pub build: bool,

    /// Whether the layer is cached.
    #[serde(default)]
    pub cache: bool,
}

impl LayerTypes {
    pub fn build() -> Self {
        Self {
            build: true,
            ..Self::default()
        }
    }

    pub fn cache(mut self) -> Self {
        self.cache = true;
        self
    }

    pub fn launch(mut self) -> Self {
        self.launch = true;
        self
    }

    /// Build, cache and launch. The combination every dependency layer uses.
    pub fn all() -> Self {
        Self {
            launch: true,
            build: true,
            cache: true,
        }
    }
}

/// Contents of the `<layers>/<layer>.toml` file.
///
/// See [Cloud Native Buildpack specification](https://github.com/buildpacks/spec/blob/main/buildpack.md#layer-content-metadata-toml)
///
/// Metadata values are plain strings: cache keys, versions and timestamps. Any other value
/// type found in a file written by an older buildpack version is dropped on read.
///
/// ```
/// use libbuildpack_data::layer_content_metadata::{LayerContentMetadata, LayerTypes};
///
/// let mut layer = LayerContentMetadata::new(LayerTypes::all());
/// layer.metadata.insert(String::from("python_version"), String::from("Python 3.13.1"));
///
/// let written = toml::to_string(&layer).unwrap();
/// let read: LayerContentMetadata = toml::from_str(&written).unwrap();
/// assert_eq!(read, layer);
/// ```
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LayerContentMetadata {
    #[serde(default)]
    pub types: LayerTypes,

    #[serde(
        default,
        deserialize_with = "deserialize_string_values",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub metadata: BTreeMap<String, String>,
}

impl LayerContentMetadata {
    pub fn new(types: LayerTypes) -> Self {
        Self {
            types,
            metadata: BTreeMap::new(),
        }
    }
}

fn deserialize_string_values<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let table = toml::value::Table::deserialize(deserializer)?;

    Ok(table
        .into_iter()
        .filter_map(|(key, value)| match value {
            toml::Value::String(value) => Some((key, value)),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn layer_types_have_defaults() {
        let layer: LayerContentMetadata = toml::from_str(indoc! {"
            [types]
        "})
        .unwrap();

        assert!(layer.metadata.is_empty());
        assert_eq!(layer.types, LayerTypes::default());

        let layer: LayerContentMetadata = toml::from_str("").unwrap();
        assert_eq!(layer, LayerContentMetadata::default());
    }

    #[test]
    fn metadata_is_optional() {
        let layer: LayerContentMetadata = toml::from_str(indoc! {"
            [types]
            launch = true
            build = true
            cache = false
        "})
        .unwrap();

        assert!(layer.metadata.is_empty());
        assert!(layer.types.launch);
        assert!(layer.types.build);
        assert!(!layer.types.cache);
    }

    #[test]
    fn non_string_metadata_values_are_dropped() {
        let layer: LayerContentMetadata = toml::from_str(indoc! {r#"
            [metadata]
            dependency_hash = "abc"
            attempts = 3
        "#})
        .unwrap();

        assert_eq!(layer.metadata.len(), 1);
        assert_eq!(layer.metadata["dependency_hash"], "abc");
    }

    #[test]
    fn layer_types_builders() {
        assert_eq!(
            LayerTypes::build().cache(),
            LayerTypes {
                launch: false,
                build: true,
                cache: true
            }
        );
        assert_eq!(LayerTypes::default().cache().launch(), LayerTypes {
            launch: true,
            build: false,
            cache: true
        });
    }
}
