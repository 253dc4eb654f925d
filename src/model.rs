use std::path::{Path, PathBuf};

/// Extension of the files the converter is asked to produce.
pub const AUDIO_EXTENSION: &str = "mp3";

/// Output filename pattern handed to the converter untouched.
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// A single conversion job. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionRequest {
    source_url: String,
    output_directory: PathBuf,
    output_template: String,
}

impl ConversionRequest {
    pub fn new(
        source_url: impl Into<String>,
        output_directory: impl Into<PathBuf>,
        output_template: impl Into<String>,
    ) -> Self {
        Self {
            source_url: source_url.into().trim().to_owned(),
            output_directory: output_directory.into(),
            output_template: output_template.into(),
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn output_template(&self) -> &str {
        &self.output_template
    }

    /// `<output_directory>/<output_template>`, still unexpanded.
    pub fn output_path_template(&self) -> PathBuf {
        self.output_directory.join(&self.output_template)
    }

    pub fn has_source(&self) -> bool {
        !self.source_url.is_empty()
    }
}

/// Where the current conversion stands.
#[derive(Clone, Debug, PartialEq)]
pub enum ConversionState {
    /// Nothing started, or the last result was cleared
    Idle,
    /// The converter is working; progress in 0.0..=1.0
    Running(f32),
    /// The converter finished and this file was found in the output directory
    Completed(PathBuf),
    /// The user cancelled the run
    Cancelled,
    /// The run failed with a human-readable message
    Failed(String),
}

impl ConversionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ConversionState::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ConversionState::Running(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConversionState::Completed(_) | ConversionState::Cancelled | ConversionState::Failed(_)
        )
    }

    pub fn progress(&self) -> Option<f32> {
        match self {
            ConversionState::Running(p) => Some(*p),
            ConversionState::Completed(_) => Some(1.0),
            _ => None,
        }
    }

    pub fn output_file(&self) -> Option<&Path> {
        match self {
            ConversionState::Completed(path) => Some(path),
            _ => None,
        }
    }
}

/// Notifications for the presentation layer, one per observable happening.
#[derive(Clone, Debug, PartialEq)]
pub enum ConversionEvent {
    Started { url: String },
    /// The "is running" indicator changed
    RunningChanged(bool),
    Completed(PathBuf),
    Cancelled,
    Failed(String),
}
