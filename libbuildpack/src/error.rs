use crate::exec::ExecError;
use crate::layer::LayerError;
use libbuildpack_common::toml_file::TomlFileError;

/// A specialized Result type for buildpack functions.
pub type Result<T> = std::result::Result<T, BuildpackError>;

/// Who is expected to fix a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The developer of the application can fix this, for example by changing a file.
    User,
    /// A defect of the buildpack or the platform.
    Internal,
}

/// An error that fails the current detect or build.
#[derive(thiserror::Error, Debug)]
pub enum BuildpackError {
    #[error("{0}")]
    User(String),

    #[error("{0}")]
    Internal(String),

    #[error("{source}")]
    Exec {
        #[source]
        source: ExecError,
        user_attributed: bool,
    },

    #[error("Layer error: {0}")]
    Layer(#[from] LayerError),

    #[error("Unexpected I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML file error: {0}")]
    TomlFile(#[from] TomlFileError),
}

impl BuildpackError {
    pub fn user(message: impl Into<String>) -> Self {
        Self::User(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::User(_)
            | Self::Exec {
                user_attributed: true,
                ..
            } => ErrorKind::User,
            _ => ErrorKind::Internal,
        }
    }

    /// Prefixes the message with what was being done, keeping the error's kind.
    #[must_use]
    pub fn wrap(self, doing: impl std::fmt::Display) -> Self {
        match self.kind() {
            ErrorKind::User => Self::User(format!("{doing}: {self}")),
            ErrorKind::Internal => Self::Internal(format!("{doing}: {self}")),
        }
    }
}

impl From<ExecError> for BuildpackError {
    fn from(source: ExecError) -> Self {
        Self::Exec {
            source,
            user_attributed: false,
        }
    }
}
