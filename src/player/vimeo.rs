use anyhow::Result;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::platform::{VimeoApi, VimeoEvent, VimeoProvider};
use super::types::{BackendEnvelope, BackendEvent, ErrorKind, finite_or_zero};
use crate::constants::{VIMEO_PLAYBACK_RATES, VOLUME_MAX};

/// Adapter over the promise-based Vimeo player (volume 0..1).
///
/// `get_volume` answers from the last `volumechange` the player confirmed;
/// asking the player would round-trip through the iframe for every read.
pub struct VimeoBackend {
    api: Arc<dyn VimeoApi>,
    generation: u64,
    confirmed_volume: Arc<Mutex<f64>>,
    cancel: CancellationToken,
    forwarder: JoinHandle<()>,
}

impl VimeoBackend {
    pub fn new(
        provider: &dyn VimeoProvider,
        video_id: &str,
        generation: u64,
        initial_volume: f64,
        events: mpsc::UnboundedSender<BackendEnvelope>,
    ) -> Result<Self> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let api = provider.create(video_id, raw_tx)?;
        let cancel = CancellationToken::new();
        let confirmed_volume = Arc::new(Mutex::new(initial_volume));

        let forwarder = tokio::spawn(forward_player_events(
            raw_rx,
            generation,
            confirmed_volume.clone(),
            events,
            cancel.clone(),
        ));

        debug!("Vimeo backend created for {}", video_id);
        Ok(Self {
            api,
            generation,
            confirmed_volume,
            cancel,
            forwarder,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn play(&self) -> Result<()> {
        self.api.play().await
    }

    pub async fn pause(&self) -> Result<()> {
        self.api.pause().await
    }

    pub async fn seek_to(&self, seconds: f64) -> Result<()> {
        self.api.set_current_time(seconds.max(0.0)).await?;
        Ok(())
    }

    pub async fn get_elapsed(&self) -> f64 {
        match self.api.get_current_time().await {
            Ok(seconds) => finite_or_zero(seconds),
            Err(e) => {
                debug!("Vimeo getCurrentTime failed: {}", e);
                0.0
            }
        }
    }

    pub async fn get_duration(&self) -> f64 {
        match self.api.get_duration().await {
            Ok(seconds) => finite_or_zero(seconds),
            Err(e) => {
                debug!("Vimeo getDuration failed: {}", e);
                0.0
            }
        }
    }

    pub async fn get_volume(&self) -> f64 {
        self.confirmed_volume.lock().map(|v| *v).unwrap_or(0.0)
    }

    /// Resolves when the player accepted the value; the `volumechange` event
    /// that follows carries the confirmation
    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        self.api.set_volume(volume / VOLUME_MAX).await?;
        Ok(())
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.api.set_muted(muted).await?;
        Ok(())
    }

    pub async fn set_playback_rate(&self, rate: f64) -> Result<()> {
        self.api.set_playback_rate(rate).await?;
        Ok(())
    }

    pub fn available_rates(&self) -> Vec<f64> {
        VIMEO_PLAYBACK_RATES.to_vec()
    }

    pub async fn destroy(&self) {
        self.cancel.cancel();
        self.forwarder.abort();
        if let Err(e) = self.api.destroy().await {
            warn!("Vimeo player destroy failed: {}", e);
        }
        debug!("Vimeo backend generation {} destroyed", self.generation);
    }
}

async fn forward_player_events(
    mut raw_rx: mpsc::UnboundedReceiver<VimeoEvent>,
    generation: u64,
    confirmed_volume: Arc<Mutex<f64>>,
    events: mpsc::UnboundedSender<BackendEnvelope>,
    cancel: CancellationToken,
) {
    let mut ready_sent = false;

    loop {
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            raw = raw_rx.recv() => match raw {
                Some(raw) => raw,
                None => break,
            },
        };
        trace!("Vimeo player event: {:?}", raw);

        let event = match raw {
            VimeoEvent::Loaded => {
                if ready_sent {
                    continue;
                }
                ready_sent = true;
                BackendEvent::Ready
            }
            VimeoEvent::Play => BackendEvent::Playing,
            VimeoEvent::Pause => BackendEvent::Paused,
            VimeoEvent::Ended => BackendEvent::Ended,
            VimeoEvent::TimeUpdate { seconds, duration } => BackendEvent::TimeUpdate {
                elapsed: finite_or_zero(seconds),
                duration: finite_or_zero(duration),
            },
            VimeoEvent::Seeked { .. } => BackendEvent::Seeked,
            VimeoEvent::VolumeChange { volume } => {
                let normalized = volume * VOLUME_MAX;
                if let Ok(mut confirmed) = confirmed_volume.lock() {
                    *confirmed = normalized;
                }
                BackendEvent::VolumeChanged(normalized)
            }
            VimeoEvent::PlaybackRateChange { rate } => BackendEvent::RateChanged(rate),
            VimeoEvent::Error { name, message } => {
                let kind = ErrorKind::from_vimeo_name(&name);
                warn!("Vimeo player error {}: {} ({})", name, message, kind);
                BackendEvent::Error(kind)
            }
        };

        if events.send(BackendEnvelope { generation, event }).is_err() {
            break;
        }
    }
}
