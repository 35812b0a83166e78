use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::native::NativeBackend;
use super::platform::{MediaElementProvider, VimeoProvider, YouTubeProvider};
use super::types::{BackendEnvelope, BackendKind, SourceDescriptor};
use super::vimeo::VimeoBackend;
use super::youtube::YouTubeBackend;
use crate::constants::YOUTUBE_POLL_INTERVAL;
use crate::utils::errors::PlayerError;

/// The active playback backend; one variant per adapter
pub enum Backend {
    Native(NativeBackend),
    YouTube(YouTubeBackend),
    Vimeo(VimeoBackend),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Native(_) => BackendKind::Native,
            Backend::YouTube(_) => BackendKind::YouTube,
            Backend::Vimeo(_) => BackendKind::Vimeo,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            Backend::Native(b) => b.generation(),
            Backend::YouTube(b) => b.generation(),
            Backend::Vimeo(b) => b.generation(),
        }
    }

    pub async fn play(&self) -> Result<()> {
        match self {
            Backend::Native(b) => b.play().await,
            Backend::YouTube(b) => b.play().await,
            Backend::Vimeo(b) => b.play().await,
        }
    }

    pub async fn pause(&self) -> Result<()> {
        match self {
            Backend::Native(b) => b.pause().await,
            Backend::YouTube(b) => b.pause().await,
            Backend::Vimeo(b) => b.pause().await,
        }
    }

    pub async fn seek_to(&self, seconds: f64) -> Result<()> {
        match self {
            Backend::Native(b) => b.seek_to(seconds).await,
            Backend::YouTube(b) => b.seek_to(seconds).await,
            Backend::Vimeo(b) => b.seek_to(seconds).await,
        }
    }

    pub async fn get_elapsed(&self) -> f64 {
        match self {
            Backend::Native(b) => b.get_elapsed().await,
            Backend::YouTube(b) => b.get_elapsed().await,
            Backend::Vimeo(b) => b.get_elapsed().await,
        }
    }

    pub async fn get_duration(&self) -> f64 {
        match self {
            Backend::Native(b) => b.get_duration().await,
            Backend::YouTube(b) => b.get_duration().await,
            Backend::Vimeo(b) => b.get_duration().await,
        }
    }

    /// 0..10
    pub async fn get_volume(&self) -> f64 {
        match self {
            Backend::Native(b) => b.get_volume().await,
            Backend::YouTube(b) => b.get_volume().await,
            Backend::Vimeo(b) => b.get_volume().await,
        }
    }

    /// 0..10; confirmed later by a `VolumeChanged` event
    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        match self {
            Backend::Native(b) => b.set_volume(volume).await,
            Backend::YouTube(b) => b.set_volume(volume).await,
            Backend::Vimeo(b) => b.set_volume(volume).await,
        }
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        match self {
            Backend::Native(b) => b.set_muted(muted).await,
            Backend::YouTube(b) => b.set_muted(muted).await,
            Backend::Vimeo(b) => b.set_muted(muted).await,
        }
    }

    pub async fn set_playback_rate(&self, rate: f64) -> Result<()> {
        match self {
            Backend::Native(b) => b.set_playback_rate(rate).await,
            Backend::YouTube(b) => b.set_playback_rate(rate).await,
            Backend::Vimeo(b) => b.set_playback_rate(rate).await,
        }
    }

    pub fn available_rates(&self) -> Vec<f64> {
        match self {
            Backend::Native(b) => b.available_rates(),
            Backend::YouTube(b) => b.available_rates(),
            Backend::Vimeo(b) => b.available_rates(),
        }
    }

    pub async fn destroy(&self) {
        match self {
            Backend::Native(b) => b.destroy().await,
            Backend::YouTube(b) => b.destroy().await,
            Backend::Vimeo(b) => b.destroy().await,
        }
    }
}

/// Builds backends from the platform drivers the host registered
#[derive(Clone)]
pub struct BackendFactory {
    native: Option<Arc<dyn MediaElementProvider>>,
    youtube: Option<Arc<dyn YouTubeProvider>>,
    vimeo: Option<Arc<dyn VimeoProvider>>,
    poll_interval: Duration,
}

impl Default for BackendFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendFactory {
    pub fn new() -> Self {
        Self {
            native: None,
            youtube: None,
            vimeo: None,
            poll_interval: YOUTUBE_POLL_INTERVAL,
        }
    }

    pub fn with_native(mut self, provider: Arc<dyn MediaElementProvider>) -> Self {
        self.native = Some(provider);
        self
    }

    pub fn with_youtube(mut self, provider: Arc<dyn YouTubeProvider>) -> Self {
        self.youtube = Some(provider);
        self
    }

    pub fn with_vimeo(mut self, provider: Arc<dyn VimeoProvider>) -> Self {
        self.vimeo = Some(provider);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn supports(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Native => self.native.is_some(),
            BackendKind::YouTube => self.youtube.is_some(),
            BackendKind::Vimeo => self.vimeo.is_some(),
        }
    }

    pub fn create(
        &self,
        source: &SourceDescriptor,
        generation: u64,
        volume: f64,
        events: mpsc::UnboundedSender<BackendEnvelope>,
    ) -> Result<Backend, PlayerError> {
        let kind = source.kind();
        let construction_error = |reason: String| PlayerError::BackendConstruction { kind, reason };
        let missing = || construction_error("no platform driver registered".to_string());

        let backend = match source {
            SourceDescriptor::Native { urls } => {
                let provider = self.native.as_deref().ok_or_else(missing)?;
                info!("Creating native backend (generation {})", generation);
                NativeBackend::new(provider, urls, generation, events)
                    .map(Backend::Native)
                    .map_err(|e| construction_error(e.to_string()))?
            }
            SourceDescriptor::YouTube { video_id } => {
                let provider = self.youtube.as_deref().ok_or_else(missing)?;
                info!(
                    "Creating YouTube backend for {} (generation {})",
                    video_id, generation
                );
                YouTubeBackend::new(provider, video_id, generation, self.poll_interval, events)
                    .map(Backend::YouTube)
                    .map_err(|e| construction_error(e.to_string()))?
            }
            SourceDescriptor::Vimeo { video_id } => {
                let provider = self.vimeo.as_deref().ok_or_else(missing)?;
                info!(
                    "Creating Vimeo backend for {} (generation {})",
                    video_id, generation
                );
                VimeoBackend::new(provider, video_id, generation, volume, events)
                    .map(Backend::Vimeo)
                    .map_err(|e| construction_error(e.to_string()))?
            }
        };
        Ok(backend)
    }
}
