use std::collections::HashMap;
use std::env;
use std::env::VarsOs;
use std::ffi::{OsStr, OsString};

/// Generic collection of environment variables.
///
/// A [`Context`](crate::Context) keeps one of these as the environment of the build. It starts
/// as a snapshot of the process environment and is modified with
/// [`Context::set_env`](crate::Context::set_env) when a buildpack makes a tool available to the
/// commands it runs later on.
///
/// # Examples
/// ```
/// use libbuildpack::Env;
///
/// let mut env = Env::new();
/// env.insert("PYTHONUSERBASE", "/layers/pip");
/// env.insert("PATH", "/usr/bin");
///
/// assert_eq!(env.get_string_lossy("PATH"), Some(String::from("/usr/bin")));
/// assert_eq!(env.non_empty("VIRTUAL_ENV"), None);
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Env {
    inner: HashMap<OsString, OsString>,
}

impl Env {
    /// Creates a new `Env` from all the environment variables of the current process.
    ///
    /// The returned `Env` is a snapshot. Later changes to the process environment are not
    /// reflected in it.
    #[must_use]
    pub fn from_current() -> Self {
        env::vars_os().into()
    }

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key-value pair, overriding the value if `key` was already present.
    pub fn insert(&mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> &mut Self {
        self.inner.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsString> {
        self.inner.get(key.as_ref())
    }

    /// Returns the value for the given key, interpreted as Unicode data.
    ///
    /// Non-Unicode sequences are replaced with `U+FFFD REPLACEMENT CHARACTER`.
    #[must_use]
    pub fn get_string_lossy(&self, key: impl AsRef<OsStr>) -> Option<String> {
        self.get(key)
            .map(|os_string| os_string.to_string_lossy().to_string())
    }

    /// Like [`get_string_lossy`](Self::get_string_lossy), but treats an empty value the same as
    /// an unset one.
    #[must_use]
    pub fn non_empty(&self, key: impl AsRef<OsStr>) -> Option<String> {
        self.get_string_lossy(key).filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn contains_key(&self, key: impl AsRef<OsStr>) -> bool {
        self.inner.contains_key(key.as_ref())
    }

    #[must_use]
    pub fn iter(&self) -> std::collections::hash_map::Iter<'_, OsString, OsString> {
        self.inner.iter()
    }
}

impl From<VarsOs> for Env {
    fn from(vars_os: VarsOs) -> Self {
        Self {
            inner: vars_os.collect(),
        }
    }
}

impl<K: Into<OsString>, V: Into<OsString>> FromIterator<(K, V)> for Env {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Env {
    type Item = (&'a OsString, &'a OsString);
    type IntoIter = std::collections::hash_map::Iter<'a, OsString, OsString>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
