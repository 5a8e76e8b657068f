use crate::newtypes::validated_newtype;
use serde::Deserialize;

/// The parts of the buildpack descriptor (`buildpack.toml`) that the runtime needs.
///
/// # Examples
/// ```
/// use libbuildpack_data::buildpack::BuildpackToml;
///
/// let raw = r#"
/// api = "0.10"
///
/// [buildpack]
/// id = "google.python.pip"
/// name = "Python - pip"
/// version = "0.9.1"
///
/// [[stacks]]
/// id = "*"
/// "#;
///
/// let descriptor = toml::from_str::<BuildpackToml>(raw).unwrap();
/// assert_eq!(descriptor.buildpack.id.as_str(), "google.python.pip");
/// ```
#[derive(Deserialize, Debug, Clone)]
pub struct BuildpackToml {
    pub api: String,
    pub buildpack: Buildpack,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Buildpack {
    pub id: BuildpackId,
    #[serde(default)]
    pub name: Option<String>,
    pub version: String,
}

validated_newtype!(
    /// The ID of a buildpack.
    ///
    /// It MUST only contain numbers, letters, and the characters `.`, `/`, and `-`.
    /// It also MUST NOT be `config` or `app`.
    BuildpackId,
    BuildpackIdError,
    r"^(?!app$|config$)[[:alnum:]./-]+$"
);
