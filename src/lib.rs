//! Convert a video URL into an MP3 by driving yt-dlp from a background task.
//!
//! [`ConversionController`] owns the state (`Idle → Running → Completed |
//! Failed | Cancelled`), [`TaskHandle`] cancels a run, and any
//! [`ExternalConverter`] can stand in for yt-dlp.

pub mod config;
pub mod converter;
pub mod error;
pub mod model;
pub mod output;
pub mod progress;
pub mod task;

pub use config::Config;
pub use converter::{ExternalConverter, YtDlp};
pub use error::{ConversionError, ConverterError, StartError};
pub use model::{ConversionEvent, ConversionRequest, ConversionState};
pub use task::{ConversionController, TaskHandle};
