//! Bindings to the three playback platforms.
//!
//! These traits describe the platform objects exactly as they behave, in their
//! own units: the native element speaks 0..1 volume and fires its own event
//! names, the YouTube player speaks 0..100 and fires no time updates, and the
//! Vimeo player answers every call asynchronously. The adapters in
//! [`super::native`], [`super::youtube`] and [`super::vimeo`] translate.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Raw events of a native media element
#[derive(Debug, Clone, PartialEq)]
pub enum ElementEvent {
    LoadedMetadata,
    DurationChange,
    Progress,
    CanPlayThrough,
    Play,
    Playing,
    Pause,
    Ended,
    TimeUpdate,
    Seeking,
    Seeked,
    VolumeChange,
    RateChange,
    /// `MediaError.code`
    Error(u16),
}

#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Resolves once the element accepted the request
    async fn play(&self) -> Result<()>;
    fn pause(&self);
    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);
    /// NaN until metadata has loaded
    fn duration(&self) -> f64;
    /// 0.0..=1.0
    fn volume(&self) -> f64;
    fn set_volume(&self, volume: f64);
    fn muted(&self) -> bool;
    fn set_muted(&self, muted: bool);
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64);
    /// Detach the source so the element stops fetching
    fn release(&self);
}

pub trait MediaElementProvider: Send + Sync {
    fn open(
        &self,
        urls: &[String],
        events: mpsc::UnboundedSender<ElementEvent>,
    ) -> Result<Arc<dyn MediaElement>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YouTubeState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl YouTubeState {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(YouTubeState::Unstarted),
            0 => Some(YouTubeState::Ended),
            1 => Some(YouTubeState::Playing),
            2 => Some(YouTubeState::Paused),
            3 => Some(YouTubeState::Buffering),
            5 => Some(YouTubeState::Cued),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum YouTubeEvent {
    Ready,
    StateChange(YouTubeState),
    PlaybackRateChange(f64),
    Error(u16),
}

pub trait YouTubeApi: Send + Sync {
    fn play_video(&self);
    fn pause_video(&self);
    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool);
    fn get_current_time(&self) -> f64;
    fn get_duration(&self) -> f64;
    /// 0..=100
    fn get_volume(&self) -> f64;
    fn set_volume(&self, volume: f64);
    fn mute(&self);
    fn unmute(&self);
    fn is_muted(&self) -> bool;
    fn set_playback_rate(&self, rate: f64);
    fn get_available_playback_rates(&self) -> Vec<f64>;
    fn destroy(&self);
}

pub trait YouTubeProvider: Send + Sync {
    /// Fails when the iframe API script could not be loaded
    fn create(
        &self,
        video_id: &str,
        events: mpsc::UnboundedSender<YouTubeEvent>,
    ) -> Result<Arc<dyn YouTubeApi>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum VimeoEvent {
    Loaded,
    Play,
    Pause,
    Ended,
    TimeUpdate { seconds: f64, duration: f64 },
    Seeked { seconds: f64 },
    /// 0.0..=1.0
    VolumeChange { volume: f64 },
    PlaybackRateChange { rate: f64 },
    Error { name: String, message: String },
}

#[async_trait]
pub trait VimeoApi: Send + Sync {
    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn set_current_time(&self, seconds: f64) -> Result<f64>;
    async fn get_current_time(&self) -> Result<f64>;
    async fn get_duration(&self) -> Result<f64>;
    /// 0.0..=1.0; confirmed later by a `volumechange` event
    async fn set_volume(&self, volume: f64) -> Result<f64>;
    async fn set_muted(&self, muted: bool) -> Result<bool>;
    async fn set_playback_rate(&self, rate: f64) -> Result<f64>;
    async fn destroy(&self) -> Result<()>;
}

pub trait VimeoProvider: Send + Sync {
    fn create(
        &self,
        video_id: &str,
        events: mpsc::UnboundedSender<VimeoEvent>,
    ) -> Result<Arc<dyn VimeoApi>>;
}
