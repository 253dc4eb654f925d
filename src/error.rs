//! Error types for the conversion pipeline.
//!
//! Nothing here is fatal to the process: every error that reaches the task
//! boundary is turned into [`ConversionState::Failed`](crate::model::ConversionState)
//! carrying the error's `Display` text.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by an external converter invocation.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// No executable could be found or extracted.
    #[error("converter not available: {0}")]
    MissingBinary(String),

    /// The process could not be launched at all.
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The process ran and reported failure.
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    /// Free-form failure, used by converters that are not processes.
    #[error("{0}")]
    Failed(String),
}

/// Why a running conversion ended in `Failed`.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error(transparent)]
    ExternalTool(#[from] ConverterError),

    #[error("could not create output directory {path:?}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not scan output directory {path:?}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file not found after conversion")]
    OutputNotFound,
}

/// Reasons `start` refuses a request. None of them change state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    #[error("source URL is empty")]
    EmptyInput,

    #[error("a conversion is already running")]
    Busy,

    #[error("previous result has not been reset")]
    NotReset,
}
