use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for configuration, input-shape, and IO failures.
///
/// Missing or wrongly typed record fields are not errors; they degrade to
/// empty values and are only counted and logged.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("source '{source_name}' is malformed: {reason}")]
    MalformedInput { source_name: String, reason: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl MergeError {
    pub fn malformed(source_name: &str, reason: impl Into<String>) -> Self {
        MergeError::MalformedInput {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MergeError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type MergeResult<T> = Result<T, MergeError>;
