//! The ordered list of `requirements.txt` files a build installs.

use libbuildpack::config::env;
use libbuildpack::Context;
use std::path::{Path, PathBuf};

pub const REQUIREMENTS_TXT: &str = "requirements.txt";

/// Requirements files in installation order.
///
/// Later files override earlier ones: pip reinstalls every package of a later file, so a
/// version pinned by the application wins over one pinned by an earlier buildpack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementsFiles(Vec<PathBuf>);

impl RequirementsFiles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a file that overrides all files added before it.
    pub fn push(&mut self, path: impl Into<PathBuf>) {
        self.0.push(path.into());
    }

    /// Parses a `:`-separated list, ignoring empty entries.
    #[must_use]
    pub fn from_env_value(value: &str) -> Self {
        value
            .trim_matches(':')
            .split(':')
            .filter(|entry| !entry.is_empty())
            .collect()
    }

    /// The files contributed by earlier buildpacks followed by the application's own
    /// `requirements.txt`, if it has one.
    #[must_use]
    pub fn discover(context: &Context) -> Self {
        let mut files = context
            .env_var(env::INTERNAL_REQUIREMENTS_FILES)
            .map(|value| Self::from_env_value(&value))
            .unwrap_or_default();

        if !files.is_empty() {
            context.debug(format!(
                "Found requirements.txt files provided by other buildpacks: {:?}",
                files.0
            ));
        }

        if context.file_exists(REQUIREMENTS_TXT) {
            files.push(context.app_dir().join(REQUIREMENTS_TXT));
        }

        files
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[PathBuf] {
        &self.0
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for RequirementsFiles {
    fn from_iter<T: IntoIterator<Item = P>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a RequirementsFiles {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::RequirementsFiles;
    use libbuildpack::testing::TestContextBuilder;
    use std::path::{Path, PathBuf};

    #[test]
    fn env_value_parsing() {
        assert_eq!(
            RequirementsFiles::from_env_value(":/layers/a/requirements.txt::/layers/b/requirements.txt:"),
            RequirementsFiles::from_iter(["/layers/a/requirements.txt", "/layers/b/requirements.txt"])
        );
        assert!(RequirementsFiles::from_env_value("::").is_empty());
        assert!(RequirementsFiles::from_env_value("").is_empty());
    }

    #[test]
    fn application_file_comes_last() {
        let test = TestContextBuilder::new()
            .file("requirements.txt", "flask\n")
            .env(
                "GOOGLE_INTERNAL_REQUIREMENTS_FILES",
                "/layers/google.python.functions-framework/requirements.txt:/layers/google.python.webserver/requirements.txt",
            )
            .build();

        let files = RequirementsFiles::discover(&test.context);

        assert_eq!(
            files.iter().collect::<Vec<_>>(),
            vec![
                Path::new("/layers/google.python.functions-framework/requirements.txt"),
                Path::new("/layers/google.python.webserver/requirements.txt"),
                test.app_dir().join("requirements.txt").as_path(),
            ]
        );
    }

    #[test]
    fn nothing_to_install() {
        let test = TestContextBuilder::new().file("main.py", "").build();

        assert!(RequirementsFiles::discover(&test.context).is_empty());
    }

    #[test]
    fn push_appends() {
        let mut files = RequirementsFiles::new();
        files.push("a.txt");
        files.push("b.txt");

        assert_eq!(files.len(), 2);
        assert_eq!(
            files.as_slice(),
            &[PathBuf::from("a.txt"), PathBuf::from("b.txt")]
        );
    }
}
