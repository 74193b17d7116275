use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown resource type: {0:?}")]
    UnknownKind(String),

    #[error("App error: {0}")]
    App(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Failed to persist limits at {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// True for errors caused by user-supplied limit expressions
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::Parse(_) | Error::Validation(_) | Error::UnknownKind(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
