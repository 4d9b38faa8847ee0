//! Error taxonomy for preview playback

use cue_library::{LoadError, ResolveError};
use thiserror::Error;

/// Errors surfaced by the preview engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreviewError {
    #[error("No playable file for \"{track}\" (available: {})", .candidates.join(", "))]
    NotFound {
        track: String,
        candidates: Vec<String>,
    },
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("Preview request {request} was superseded by a newer one")]
    Superseded { request: u64 },
    #[error("Playback failed: {0}")]
    Playback(String),
    #[error("Resource limit of {cap} handles reached")]
    ResourceExhausted { cap: usize },
    #[error("Playback session was closed")]
    Closed,
    #[error("IO error: {0}")]
    Io(String),
}

/// Failures starting the audio output
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("No audio output device found")]
    NoDevice,
    #[error("Failed to get audio config: {0}")]
    Config(String),
    #[error("Failed to create audio stream: {0}")]
    Stream(String),
    #[error("Audio engine failed to start: {0}")]
    Startup(String),
}

impl PreviewError {
    /// Expected control flow rather than a failure worth reporting
    pub fn is_silent(&self) -> bool {
        matches!(self, PreviewError::Superseded { .. })
    }
}

impl From<ResolveError> for PreviewError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound { name, candidates } => PreviewError::NotFound {
                track: name,
                candidates,
            },
        }
    }
}

impl From<LoadError> for PreviewError {
    fn from(err: LoadError) -> Self {
        PreviewError::Playback(err.to_string())
    }
}

impl From<std::io::Error> for PreviewError {
    fn from(err: std::io::Error) -> Self {
        PreviewError::Io(err.to_string())
    }
}
