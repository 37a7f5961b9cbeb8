//! Error types shared by the library and both front-ends.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// A section reference the user typed could not be understood.
    #[error("Invalid section selection: {0}")]
    InvalidSelection(String),

    #[error("No sections selected")]
    NothingSelected,

    #[error("Unknown voice: {0}")]
    UnknownVoice(String),

    #[error("Section {index} does not exist (book has {count} sections)")]
    SectionOutOfRange { index: usize, count: usize },

    #[error("Failed to generate audio for section {0}")]
    SectionFailed(usize),

    #[error("No output directory selected")]
    NoOutputDir,

    #[error("No audio files to concatenate")]
    NoArtifacts,

    #[error("Failed to load voice conversion model {}", .0.display())]
    ModelLoad(PathBuf),

    #[error("Unknown voice conversion model: {0}")]
    UnknownModel(String),

    #[error("Audio format mismatch in {}: {reason}", path.display())]
    AudioFormat { path: PathBuf, reason: String },

    #[error("{program} failed: {reason}")]
    Command { program: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
