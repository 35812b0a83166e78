//! Playback orchestration core for an accessible media player.
//!
//! One [`PlayerController`] per player owns the active backend (a native media
//! element, a YouTube iframe player or a Vimeo player), keeps the intent
//! record that decides what happens when a source becomes ready, swaps sources
//! for playlists and described/signed versions, and drives the caption,
//! transcript, description and chapter views on every time update.

pub mod config;
pub mod constants;
pub mod events;
pub mod logging;
pub mod player;
pub mod utils;

pub use config::Config;
pub use events::{EventBus, EventType, PlayerEvent};
pub use player::{
    BackendFactory, MediaItem, PlayerController, PlayerHandle, PlayerRegistry, PlayerSetup,
    SourceDescriptor,
};
pub use utils::PlayerError;
