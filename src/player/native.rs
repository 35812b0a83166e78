use anyhow::{Result, anyhow};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::platform::{ElementEvent, MediaElement, MediaElementProvider};
use super::types::{BackendEnvelope, BackendEvent, ErrorKind, finite_or_zero};
use crate::constants::{NATIVE_PLAYBACK_RATES, VOLUME_MAX};

/// Adapter over a platform media element (volume 0..1)
pub struct NativeBackend {
    element: Arc<dyn MediaElement>,
    generation: u64,
    cancel: CancellationToken,
    forwarder: JoinHandle<()>,
}

impl NativeBackend {
    pub fn new(
        provider: &dyn MediaElementProvider,
        urls: &[String],
        generation: u64,
        events: mpsc::UnboundedSender<BackendEnvelope>,
    ) -> Result<Self> {
        if urls.is_empty() {
            return Err(anyhow!("native source has no URLs"));
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let element = provider.open(urls, raw_tx)?;
        let cancel = CancellationToken::new();
        let forwarder = tokio::spawn(forward_element_events(
            element.clone(),
            raw_rx,
            generation,
            events,
            cancel.clone(),
        ));

        debug!("Native backend opened {} source(s)", urls.len());
        Ok(Self {
            element,
            generation,
            cancel,
            forwarder,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn play(&self) -> Result<()> {
        self.element.play().await
    }

    pub async fn pause(&self) -> Result<()> {
        self.element.pause();
        Ok(())
    }

    pub async fn seek_to(&self, seconds: f64) -> Result<()> {
        self.element.set_current_time(seconds.max(0.0));
        Ok(())
    }

    pub async fn get_elapsed(&self) -> f64 {
        finite_or_zero(self.element.current_time())
    }

    pub async fn get_duration(&self) -> f64 {
        finite_or_zero(self.element.duration())
    }

    pub async fn get_volume(&self) -> f64 {
        self.element.volume() * VOLUME_MAX
    }

    /// Confirmed by the element's `volumechange` event
    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        self.element.set_volume(volume / VOLUME_MAX);
        Ok(())
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.element.set_muted(muted);
        Ok(())
    }

    pub async fn set_playback_rate(&self, rate: f64) -> Result<()> {
        self.element.set_playback_rate(rate);
        Ok(())
    }

    pub fn available_rates(&self) -> Vec<f64> {
        NATIVE_PLAYBACK_RATES.to_vec()
    }

    /// Stops event forwarding before releasing the element
    pub async fn destroy(&self) {
        self.cancel.cancel();
        self.forwarder.abort();
        self.element.pause();
        self.element.release();
        debug!("Native backend generation {} destroyed", self.generation);
    }
}

async fn forward_element_events(
    element: Arc<dyn MediaElement>,
    mut raw_rx: mpsc::UnboundedReceiver<ElementEvent>,
    generation: u64,
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
        trace!("Native element event: {:?}", raw);

        let event = match raw {
            ElementEvent::CanPlayThrough => {
                // Browsers repeat canplaythrough after seeks; only the first one means "loaded"
                if ready_sent {
                    continue;
                }
                ready_sent = true;
                BackendEvent::Ready
            }
            ElementEvent::TimeUpdate => BackendEvent::TimeUpdate {
                elapsed: finite_or_zero(element.current_time()),
                duration: finite_or_zero(element.duration()),
            },
            ElementEvent::LoadedMetadata | ElementEvent::DurationChange | ElementEvent::Progress => {
                BackendEvent::DurationChanged(finite_or_zero(element.duration()))
            }
            ElementEvent::Playing => BackendEvent::Playing,
            ElementEvent::Pause => BackendEvent::Paused,
            ElementEvent::Ended => BackendEvent::Ended,
            ElementEvent::Seeked => BackendEvent::Seeked,
            ElementEvent::VolumeChange => BackendEvent::VolumeChanged(element.volume() * VOLUME_MAX),
            ElementEvent::RateChange => BackendEvent::RateChanged(element.playback_rate()),
            ElementEvent::Error(code) => {
                let kind = ErrorKind::from_media_error_code(code);
                warn!("Native media error {} ({})", code, kind);
                BackendEvent::Error(kind)
            }
            // 'play' always precedes 'playing', which carries the state change
            ElementEvent::Play | ElementEvent::Seeking => continue,
        };

        if events.send(BackendEnvelope { generation, event }).is_err() {
            break;
        }
    }

    trace!("Native event forwarder for generation {} stopped", generation);
}
