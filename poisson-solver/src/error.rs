//! Error type shared by the solver library.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SolverError>;

#[derive(Error, Debug)]
pub enum SolverError {
    /// Rejected before any field is allocated.
    #[error("{0}")]
    InvalidConfig(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed checkpoint file or mismatched field shapes.
    #[error("format error: {0}")]
    Format(String),

    /// The background checkpoint writer failed or panicked.
    #[error("checkpoint writer failed: {0}")]
    Checkpoint(String),

    #[error("render error: {0}")]
    Render(String),
}

impl SolverError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SolverError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, SolverError::InvalidConfig(_))
    }
}
