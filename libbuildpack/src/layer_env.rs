//! In-memory representation of the environment variables a layer exports.

use crate::Env;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::Path;

/// Delimiter used for `PATH`-like variables.
pub const PATH_LIST_SEPARATOR: &str = ":";

/// Environment variable modifications of a layer.
///
/// A layer can modify the environment of subsequent buildpacks (the `env.build` directory),
/// of the running container (`env.launch`) or of both (`env`). The CNB lifecycle applies these
/// files, this type only keeps them as a delta in memory and reads or writes them to the layer
/// directory.
///
/// ```
/// use libbuildpack::layer_env::{LayerEnv, ModificationBehavior, Scope};
/// use libbuildpack::Env;
///
/// let mut layer_env = LayerEnv::new();
/// layer_env.prepend_path(Scope::Shared, "PATH", "/layers/uv/bin");
/// layer_env.insert(Scope::Shared, ModificationBehavior::Default, "PYTHONUSERBASE", "/layers/pip");
///
/// let mut env = Env::new();
/// env.insert("PATH", "/usr/bin");
/// env.insert("PYTHONUSERBASE", "/somewhere/else");
///
/// let modified_env = layer_env.apply(Scope::Build, &env);
/// assert_eq!(modified_env.get("PATH").unwrap(), "/layers/uv/bin:/usr/bin");
/// assert_eq!(modified_env.get("PYTHONUSERBASE").unwrap(), "/somewhere/else");
/// ```
#[derive(Eq, PartialEq, Debug, Default, Clone)]
pub struct LayerEnv {
    shared: LayerEnvDelta,
    build: LayerEnvDelta,
    launch: LayerEnvDelta,
}

impl LayerEnv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies this delta to the given [`Env`] as the lifecycle would for the given [`Scope`].
    ///
    /// Shared modifications are applied first, followed by the scope specific ones.
    #[must_use]
    pub fn apply(&self, scope: Scope, env: &Env) -> Env {
        let deltas = match scope {
            Scope::Shared => vec![&self.shared],
            Scope::Build => vec![&self.shared, &self.build],
            Scope::Launch => vec![&self.shared, &self.launch],
        };

        deltas
            .iter()
            .fold(env.clone(), |env, delta| delta.apply(&env))
    }

    #[must_use]
    pub fn apply_to_empty(&self, scope: Scope) -> Env {
        self.apply(scope, &Env::new())
    }

    /// Inserts a new entry. An existing entry with the same scope, behavior and name is
    /// replaced.
    pub fn insert(
        &mut self,
        scope: Scope,
        modification_behavior: ModificationBehavior,
        name: impl Into<OsString>,
        value: impl Into<OsString>,
    ) {
        self.delta_mut(scope)
            .insert(modification_behavior, name, value);
    }

    /// Chainable version of [`LayerEnv::insert`].
    #[must_use]
    pub fn chainable_insert(
        mut self,
        scope: Scope,
        modification_behavior: ModificationBehavior,
        name: impl Into<OsString>,
        value: impl Into<OsString>,
    ) -> Self {
        self.insert(scope, modification_behavior, name, value);
        self
    }

    /// Prepends `value` to a path list variable, using `:` as the delimiter.
    pub fn prepend_path(
        &mut self,
        scope: Scope,
        name: impl Into<OsString>,
        value: impl Into<OsString>,
    ) {
        let name = name.into();
        let delta = self.delta_mut(scope);
        delta.insert(ModificationBehavior::Prepend, name.clone(), value);
        delta.insert(ModificationBehavior::Delimiter, name, PATH_LIST_SEPARATOR);
    }

    /// Appends `value` to a variable, separated from earlier values by `delimiter`.
    pub fn append_with_delimiter(
        &mut self,
        scope: Scope,
        name: impl Into<OsString>,
        value: impl Into<OsString>,
        delimiter: impl Into<OsString>,
    ) {
        let name = name.into();
        let delta = self.delta_mut(scope);
        delta.insert(ModificationBehavior::Append, name.clone(), value);
        delta.insert(ModificationBehavior::Delimiter, name, delimiter);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.entries.is_empty()
            && self.build.entries.is_empty()
            && self.launch.entries.is_empty()
    }

    /// Reads the `env`, `env.build` and `env.launch` directories of a layer.
    ///
    /// Missing directories are treated as empty.
    pub fn read_from_layer_dir(layer_dir: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let mut result_layer_env = Self::new();

        for (dir_name, scope) in [
            ("env", Scope::Shared),
            ("env.build", Scope::Build),
            ("env.launch", Scope::Launch),
        ] {
            let env_path = layer_dir.as_ref().join(dir_name);
            if env_path.is_dir() {
                *result_layer_env.delta_mut(scope) = LayerEnvDelta::read_from_env_dir(env_path)?;
            }
        }

        Ok(result_layer_env)
    }

    /// Writes this `LayerEnv` to the given layer directory.
    ///
    /// Existing env directories of the layer are replaced. Empty scopes don't leave a directory
    /// behind.
    pub fn write_to_layer_dir(&self, layer_dir: impl AsRef<Path>) -> std::io::Result<()> {
        self.shared.write_to_env_dir(layer_dir.as_ref().join("env"))?;
        self.build
            .write_to_env_dir(layer_dir.as_ref().join("env.build"))?;
        self.launch
            .write_to_env_dir(layer_dir.as_ref().join("env.launch"))
    }

    fn delta_mut(&mut self, scope: Scope) -> &mut LayerEnvDelta {
        match scope {
            Scope::Shared => &mut self.shared,
            Scope::Build => &mut self.build,
            Scope::Launch => &mut self.launch,
        }
    }
}

/// Environment variable modification behavior.
/// ([CNB spec: Environment Variable Modification Rules](https://github.com/buildpacks/spec/blob/main/buildpack.md#environment-variable-modification-rules))
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ModificationBehavior {
    Append,
    Default,
    Delimiter,
    Override,
    Prepend,
}

impl ModificationBehavior {
    fn file_extension(self) -> &'static str {
        match self {
            ModificationBehavior::Append => "append",
            ModificationBehavior::Default => "default",
            ModificationBehavior::Delimiter => "delim",
            ModificationBehavior::Override => "override",
            ModificationBehavior::Prepend => "prepend",
        }
    }
}

impl Ord for ModificationBehavior {
    fn cmp(&self, other: &Self) -> Ordering {
        // Explicit mapping, the declaration order of the variants doesn't define the ordering.
        fn index(value: ModificationBehavior) -> i32 {
            match value {
                ModificationBehavior::Append => 0,
                ModificationBehavior::Default => 1,
                ModificationBehavior::Delimiter => 2,
                ModificationBehavior::Override => 3,
                ModificationBehavior::Prepend => 4,
            }
        }

        index(*self).cmp(&index(*other))
    }
}

impl PartialOrd for ModificationBehavior {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The scope of an environment variable modification.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Scope {
    /// Both subsequent buildpacks and the launched container (the `env` directory).
    Shared,
    Build,
    Launch,
}

#[derive(Eq, PartialEq, Debug, Default, Clone)]
struct LayerEnvDelta {
    entries: BTreeMap<(ModificationBehavior, OsString), OsString>,
}

impl LayerEnvDelta {
    fn apply(&self, env: &Env) -> Env {
        let mut result_env = env.clone();

        for ((modification_behavior, name), value) in &self.entries {
            match modification_behavior {
                ModificationBehavior::Override => {
                    result_env.insert(name, value);
                }
                ModificationBehavior::Default => {
                    if !result_env.contains_key(name) {
                        result_env.insert(name, value);
                    }
                }
                ModificationBehavior::Append => {
                    let mut new_value = result_env.get(name).cloned().unwrap_or_default();

                    if !new_value.is_empty() {
                        new_value.push(self.delimiter_for(name));
                    }
                    new_value.push(value);

                    result_env.insert(name, new_value);
                }
                ModificationBehavior::Prepend => {
                    let previous_value = result_env.get(name).cloned().unwrap_or_default();

                    let mut new_value = value.clone();
                    if !previous_value.is_empty() {
                        new_value.push(self.delimiter_for(name));
                        new_value.push(previous_value);
                    }

                    result_env.insert(name, new_value);
                }
                ModificationBehavior::Delimiter => (),
            }
        }

        result_env
    }

    fn delimiter_for(&self, key: &OsString) -> OsString {
        self.entries
            .get(&(ModificationBehavior::Delimiter, key.clone()))
            .cloned()
            .unwrap_or_default()
    }

    fn read_from_env_dir(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let mut delta = Self::default();

        for dir_entry in fs::read_dir(path.as_ref())? {
            let path = dir_entry?.path();

            // File contents are raw bytes and must not be reinterpreted.
            #[cfg(target_family = "unix")]
            let file_contents = {
                use std::os::unix::ffi::OsStringExt;
                OsString::from_vec(fs::read(&path)?)
            };
            #[cfg(not(target_family = "unix"))]
            let file_contents = OsString::from(&fs::read_to_string(&path)?);

            let Some(file_name_stem) = path.file_stem() else {
                continue;
            };

            let modification_behavior = match path.extension().map(|extension| extension.to_str())
            {
                None => Some(ModificationBehavior::Override),
                Some(Some("append")) => Some(ModificationBehavior::Append),
                Some(Some("default")) => Some(ModificationBehavior::Default),
                Some(Some("delim")) => Some(ModificationBehavior::Delimiter),
                Some(Some("override")) => Some(ModificationBehavior::Override),
                Some(Some("prepend")) => Some(ModificationBehavior::Prepend),
                // Unknown or non-UTF-8 extensions are ignored.
                Some(_) => None,
            };

            if let Some(modification_behavior) = modification_behavior {
                delta.insert(
                    modification_behavior,
                    file_name_stem.to_os_string(),
                    file_contents,
                );
            }
        }

        Ok(delta)
    }

    fn write_to_env_dir(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        if path.as_ref().exists() {
            fs::remove_dir_all(path.as_ref())?;
        }

        if self.entries.is_empty() {
            return Ok(());
        }

        fs::create_dir_all(path.as_ref())?;

        for ((modification_behavior, name), value) in &self.entries {
            let mut file_name = name.clone();
            file_name.push(".");
            file_name.push(modification_behavior.file_extension());

            let file_path = path.as_ref().join(file_name);

            #[cfg(target_family = "unix")]
            {
                use std::os::unix::ffi::OsStrExt;
                fs::write(file_path, value.as_bytes())?;
            }

            #[cfg(not(target_family = "unix"))]
            fs::write(file_path, value.to_string_lossy().as_bytes())?;
        }

        Ok(())
    }

    fn insert(
        &mut self,
        modification_behavior: ModificationBehavior,
        name: impl Into<OsString>,
        value: impl Into<OsString>,
    ) {
        self.entries
            .insert((modification_behavior, name.into()), value.into());
    }
}
