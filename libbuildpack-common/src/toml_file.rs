use serde::{de::DeserializeOwned, Serialize};
use std::io::ErrorKind;
use std::{fs, path::Path};

/// An error that occurred during reading or writing a TOML file.
#[derive(thiserror::Error, Debug)]
pub enum TomlFileError {
    #[error("I/O error while reading/writing TOML file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML deserialization error while reading TOML file: {0}")]
    TomlDeserializationError(#[from] toml::de::Error),

    #[error("TOML serialization error while writing TOML file: {0}")]
    TomlSerializationError(#[from] toml::ser::Error),
}

/// Serializes the given value as TOML and writes it to the given file path.
///
/// Missing parent directories are created.
///
/// # Errors
///
/// Will return `Err` if the file couldn't be written or the value couldn't be serialized as a TOML string.
pub fn write_toml_file(
    value: &impl Serialize,
    path: impl AsRef<Path>,
) -> Result<(), TomlFileError> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, toml::to_string(value)?)?;

    Ok(())
}

/// Reads the file at the given path and parses it as `A`.
///
/// # Errors
///
/// Will return `Err` if the file couldn't be read or its contents couldn't be deserialized.
pub fn read_toml_file<A: DeserializeOwned>(path: impl AsRef<Path>) -> Result<A, TomlFileError> {
    let contents = fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Like [`read_toml_file`], but returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Will return `Err` if the file exists but couldn't be read or deserialized.
pub fn read_toml_file_if_exists<A: DeserializeOwned>(
    path: impl AsRef<Path>,
) -> Result<Option<A>, TomlFileError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(toml::from_str(&contents)?)),
        Err(io_error) if io_error.kind() == ErrorKind::NotFound => Ok(None),
        Err(io_error) => Err(TomlFileError::IoError(io_error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Metadata {
        dependency_hash: String,
    }

    #[test]
    fn write_creates_parent_directories() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("layers").join("pip.toml");

        write_toml_file(
            &Metadata {
                dependency_hash: String::from("abc"),
            },
            &path,
        )
        .unwrap();

        assert_eq!(
            read_toml_file::<Metadata>(&path).unwrap(),
            Metadata {
                dependency_hash: String::from("abc")
            }
        );
    }

    #[test]
    fn read_if_exists_missing_file() {
        let temp_dir = tempdir().unwrap();

        assert_eq!(
            read_toml_file_if_exists::<Metadata>(temp_dir.path().join("missing.toml")).unwrap(),
            None
        );
    }

    #[test]
    fn read_if_exists_invalid_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "dependency_hash = ").unwrap();

        assert!(matches!(
            read_toml_file_if_exists::<Metadata>(&path),
            Err(TomlFileError::TomlDeserializationError(_))
        ));
    }
}
