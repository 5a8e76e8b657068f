use crate::newtypes::validated_newtype;
use serde::{Deserialize, Serialize};

/// Data Structure for the launch.toml file.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Launch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processes: Vec<Process>,
}

impl Launch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a process, replacing any existing process of the same type.
    ///
    /// When the added process is the default one, all other processes lose their default flag
    /// since the lifecycle only accepts a single default process.
    ///
    /// Returns the process that was replaced, if any.
    pub fn upsert_process(&mut self, process: Process) -> Option<Process> {
        let replaced = self
            .processes
            .iter()
            .position(|existing| existing.r#type == process.r#type)
            .map(|index| self.processes.remove(index));

        if process.default {
            for existing in &mut self.processes {
                existing.default = false;
            }
        }

        self.processes.push(process);
        replaced
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.processes.is_empty()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Label {
    pub key: String,
    pub value: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Process {
    pub r#type: ProcessType,
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub default: bool,
}

/// A non-consuming builder for [`Process`] values.
///
/// # Examples
/// ```
/// use libbuildpack_data::launch::{ProcessBuilder, ProcessType};
///
/// let web: ProcessType = "web".parse().unwrap();
/// let process = ProcessBuilder::new(web, ["gunicorn"])
///     .args(["-b", ":8080", "main:app"])
///     .default(true)
///     .build();
///
/// assert_eq!(process.command, vec!["gunicorn"]);
/// assert!(process.default);
/// ```
pub struct ProcessBuilder {
    process: Process,
}

impl ProcessBuilder {
    /// Constructs a new `ProcessBuilder` without arguments that isn't the default process.
    pub fn new(
        r#type: ProcessType,
        command: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            process: Process {
                r#type,
                command: command.into_iter().map(Into::into).collect(),
                args: Vec::new(),
                default: false,
            },
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.process.args.push(arg.into());
        self
    }

    pub fn args(&mut self, args: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        for arg in args {
            self.arg(arg);
        }

        self
    }

    /// Sets the `default` flag on the process.
    ///
    /// Indicates that the process type should be selected as the buildpack-provided
    /// default during the export phase.
    pub fn default(&mut self, value: bool) -> &mut Self {
        self.process.default = value;
        self
    }

    #[must_use]
    pub fn build(&self) -> Process {
        self.process.clone()
    }
}

validated_newtype!(
    /// The type of a process.
    ///
    /// It MUST only contain numbers, letters, and the characters `.`, `_`, and `-`.
    ProcessType,
    ProcessTypeError,
    r"^[[:alnum:]._-]+$"
);
