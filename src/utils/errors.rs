use thiserror::Error;

use crate::player::resolver::AbandonReason;
use crate::player::swap::SwapPhase;
use crate::player::types::{BackendKind, ErrorKind};

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Cannot construct {kind} backend: {reason}")]
    BackendConstruction { kind: BackendKind, reason: String },

    #[error("Playback error: {0}")]
    Playback(ErrorKind),

    #[error("Seek abandoned: {0}")]
    SeekAbandoned(AbandonReason),

    #[error("Source swap already in progress ({0:?}), request ignored")]
    ReentrantSwapIgnored(SwapPhase),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Playlist index {index} out of range ({len} items)")]
    PlaylistIndex { index: usize, len: usize },

    #[error("Unknown chapter: {0}")]
    UnknownChapter(String),

    #[error("No media backend is loaded")]
    NoMedia,

    #[error("Player controller disconnected")]
    ControllerDisconnected,
}

impl PlayerError {
    /// Errors that describe a normal outcome rather than a failure
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            PlayerError::SeekAbandoned(_) | PlayerError::ReentrantSwapIgnored(_)
        )
    }
}
