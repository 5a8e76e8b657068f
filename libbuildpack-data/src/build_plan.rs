use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use toml::value::Table;

/// The build plan a buildpack writes during detection.
///
/// The first group of provides/requires is the primary alternative, every further group is
/// written as an `[[or]]` entry.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[must_use]
pub struct BuildPlan {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<Provide>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Require>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub or: Vec<Or>,
}

impl BuildPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if any alternative of this plan provides the given dependency.
    pub fn provides_name(&self, name: &str) -> bool {
        self.provides.iter().any(|provide| provide.name == name)
            || self
                .or
                .iter()
                .any(|or| or.provides.iter().any(|provide| provide.name == name))
    }

    /// Returns true if any alternative of this plan requires the given dependency.
    pub fn requires_name(&self, name: &str) -> bool {
        self.requires.iter().any(|require| require.name == name)
            || self
                .or
                .iter()
                .any(|or| or.requires.iter().any(|require| require.name == name))
    }
}

/// Builds a [`BuildPlan`] alternative by alternative.
///
/// # Examples
/// ```
/// use libbuildpack_data::build_plan::BuildPlanBuilder;
///
/// let build_plan = BuildPlanBuilder::new()
///     .provides("requirements.txt")
///     .requires("requirements.txt")
///     .or()
///     .requires("requirements.txt")
///     .build();
///
/// assert!(build_plan.provides_name("requirements.txt"));
/// assert_eq!(build_plan.or.len(), 1);
/// ```
#[derive(Default)]
#[must_use]
pub struct BuildPlanBuilder {
    acc: VecDeque<(Vec<Provide>, Vec<Require>)>,
    current_provides: Vec<Provide>,
    current_requires: Vec<Require>,
}

impl BuildPlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provides(mut self, name: impl AsRef<str>) -> Self {
        self.current_provides.push(Provide::new(name.as_ref()));
        self
    }

    pub fn requires(mut self, require: impl Into<Require>) -> Self {
        self.current_requires.push(require.into());
        self
    }

    /// Closes the current alternative and starts a new one.
    pub fn or(mut self) -> Self {
        self.acc
            .push_back((self.current_provides, self.current_requires));
        self.current_provides = vec![];
        self.current_requires = vec![];

        self
    }

    pub fn build(self) -> BuildPlan {
        let mut builder = self.or();

        let Some((provides, requires)) = builder.acc.pop_front() else {
            return BuildPlan::new();
        };

        BuildPlan {
            provides,
            requires,
            or: builder
                .acc
                .into_iter()
                .filter(|(provides, requires)| !provides.is_empty() || !requires.is_empty())
                .map(|(provides, requires)| Or { provides, requires })
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Or {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<Provide>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Require>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Provide {
    pub name: String,
}

impl Provide {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Require {
    pub name: String,
    #[serde(default, skip_serializing_if = "Table::is_empty")]
    pub metadata: Table,
}

impl Require {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: Table::new(),
        }
    }

    /// Convert a serializable struct and store it as a TOML table for metadata.
    pub fn metadata<T: Serialize>(&mut self, metadata: T) -> Result<(), toml::ser::Error> {
        if let toml::Value::Table(table) = toml::Value::try_from(metadata)? {
            self.metadata = table;

            Ok(())
        } else {
            Err(<toml::ser::Error as serde::ser::Error>::custom(
                "Could not be serialized as a map.",
            ))
        }
    }
}

impl From<&str> for Require {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn it_writes_simple_build_plan() {
        let build_plan = BuildPlanBuilder::new()
            .provides("requirements.txt")
            .requires("requirements.txt")
            .build();

        let written = toml::to_string(&build_plan).unwrap();
        assert!(!written.contains("[[or"));

        let expected: BuildPlan = toml::from_str(indoc! {r#"
            [[provides]]
            name = "requirements.txt"

            [[requires]]
            name = "requirements.txt"
        "#})
        .unwrap();
        assert_eq!(toml::from_str::<BuildPlan>(&written).unwrap(), expected);
    }

    #[test]
    fn empty_alternatives_are_dropped() {
        let build_plan = BuildPlanBuilder::new()
            .requires("requirements.txt")
            .or()
            .or()
            .build();

        assert!(build_plan.or.is_empty());
        assert!(build_plan.requires_name("requirements.txt"));
        assert!(!build_plan.provides_name("requirements.txt"));
    }

    #[test]
    fn alternatives_are_written_as_or() {
        let build_plan = BuildPlanBuilder::new()
            .requires("python")
            .or()
            .provides("requirements.txt")
            .build();

        assert_eq!(build_plan.or.len(), 1);
        assert!(build_plan.provides_name("requirements.txt"));

        let written = toml::to_string(&build_plan).unwrap();
        let read_back: BuildPlan = toml::from_str(&written).unwrap();
        assert_eq!(read_back.or[0].provides, vec![Provide::new("requirements.txt")]);
        assert!(read_back.provides.is_empty());
    }

    #[test]
    fn it_serializes_metadata() {
        #[derive(Serialize)]
        struct Metadata {
            version: String,
        }

        let mut require = Require::new("python");
        let metadata = Metadata {
            version: String::from("3.13.*"),
        };
        let result = require.metadata(metadata);
        assert!(result.is_ok());
        assert_eq!(
            require.metadata.get("version"),
            Some(&toml::Value::String(String::from("3.13.*")))
        );
    }
}
