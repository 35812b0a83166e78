use serde::Serialize;

use crate::player::resolver::AbandonReason;
use crate::player::swap::{SwapPhase, SwapReason};
use crate::player::types::{BackendKind, ErrorKind};

/// Event published by a player controller
#[derive(Debug, Clone, Serialize)]
pub struct PlayerEvent {
    pub id: String,
    pub event_type: EventType,
    pub payload: EventPayload,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Backend active when the event was published
    pub backend: Option<BackendKind>,
}

impl PlayerEvent {
    pub fn new(event_type: EventType, payload: EventPayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            payload,
            timestamp: chrono::Utc::now(),
            backend: None,
        }
    }

    pub fn with_backend(mut self, backend: Option<BackendKind>) -> Self {
        self.backend = backend;
        self
    }

    /// JSON form handed to page-level event hooks
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum EventType {
    Ready,
    Playing,
    Paused,
    Ended,
    TimeUpdate,
    VolumeChanged,
    RateChanged,
    SwapStarted,
    SwapCompleted,
    SwapIgnored,
    SeekAbandoned,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Source {
        generation: u64,
        duration: f64,
    },
    Playback {
        elapsed: f64,
        duration: f64,
    },
    Ended {
        playlist_index: usize,
        advancing: bool,
    },
    Volume {
        volume: f64,
        muted: bool,
    },
    Rate {
        rate: f64,
    },
    Swap {
        reason: SwapReason,
        swap_time: f64,
    },
    SwapIgnored {
        reason: SwapReason,
        phase: SwapPhase,
    },
    SeekAbandoned {
        reason: AbandonReason,
        target: f64,
    },
    Error {
        /// Absent when the failure happened before a backend existed
        kind: Option<ErrorKind>,
        message: String,
    },
}

impl EventType {
    /// Get a string representation for filtering/routing
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Ready => "player.ready",
            EventType::Playing => "player.playing",
            EventType::Paused => "player.paused",
            EventType::Ended => "player.ended",
            EventType::TimeUpdate => "player.time_update",
            EventType::VolumeChanged => "player.volume_changed",
            EventType::RateChanged => "player.rate_changed",
            EventType::SwapStarted => "swap.started",
            EventType::SwapCompleted => "swap.completed",
            EventType::SwapIgnored => "swap.ignored",
            EventType::SeekAbandoned => "seek.abandoned",
            EventType::Error => "player.error",
        }
    }
}
