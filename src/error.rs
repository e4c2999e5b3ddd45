use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Missing input caught before a job is ever handed to the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a bearer token first")]
    MissingCredential,
    #[error("Please enter a model name first")]
    MissingModel,
    #[error("Please choose an audio file first")]
    MissingFilePath,
}

/// Anything that went wrong between opening the audio file and reading the response body.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The audio file could not be opened or inspected
    #[error("failed to open {}: {source}", .path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The request did not finish within the client timeout
    #[error("request timed out after {:?}", .0)]
    Timeout(Duration),

    /// Connection, TLS, header or body failure reported by the HTTP client
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The transport implementation panicked instead of returning
    #[error("transport panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// A job is still live; the caller is expected to keep submit disabled meanwhile
    #[error("a transcription request is already running")]
    AlreadyRunning,

    #[error("transcription worker is not available")]
    WorkerUnavailable,
}
