use std::path::PathBuf;

use thiserror::Error;

use crate::coordinator::State;

/// Errors surfaced by the batch operations (open, geocode, write).
///
/// Per-file problems inside a batch are logged and never show up here; an
/// [`Error`] means the whole operation could not complete.
#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    ExternalTool(#[from] ToolError),

    #[error("malformed metadata output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cannot {operation} while the coordinator is {state}")]
    NotReady {
        state: State,
        operation: &'static str,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures of the external metadata tool itself.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("could not launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata tool exited with status {code}: {stderr}")]
    Exit { code: i32, stderr: String },

    #[error("could not stage arguments for the metadata tool: {0}")]
    Staging(#[source] std::io::Error),
}

impl ToolError {
    /// Whether the tool could not be started at all, which is fatal to a whole batch.
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, Self::Launch { .. } | Self::Staging(_))
    }
}

/// Why a single reverse-geocode lookup failed.
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Provider { status: String, message: String },

    #[error("could not read JSON object from response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no location found")]
    NoResult,

    #[error("could not extract place information from response")]
    Extraction,

    #[error("lookup task failed: {0}")]
    Task(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
