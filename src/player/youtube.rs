use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::platform::{YouTubeApi, YouTubeEvent, YouTubeProvider, YouTubeState};
use super::types::{BackendEnvelope, BackendEvent, ErrorKind, finite_or_zero};
use crate::constants::{SEEK_ARRIVAL_TIMEOUT, SEEK_ARRIVAL_TOLERANCE_SECS, VOLUME_MAX};

/// Adapter over the YouTube iframe player (volume 0..100).
///
/// The iframe API never reports time updates, so this adapter runs a poll task
/// that synthesizes `TimeUpdate` every `poll_interval` and reports `Seeked`
/// once the polled position reaches a pending seek target.
pub struct YouTubeBackend {
    api: Arc<dyn YouTubeApi>,
    generation: u64,
    events: mpsc::UnboundedSender<BackendEnvelope>,
    seek_target: Arc<Mutex<Option<PendingSeek>>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// A `seekTo` the poll task has not yet seen land
#[derive(Debug, Clone, Copy)]
struct PendingSeek {
    target: f64,
    origin: f64,
    deadline: Instant,
}

impl PendingSeek {
    fn new(target: f64, origin: f64) -> Self {
        Self {
            target,
            origin,
            deadline: Instant::now() + SEEK_ARRIVAL_TIMEOUT,
        }
    }

    /// The playhead may already have played past the target when the next
    /// poll runs; a backward seek counts once the playhead left the origin
    fn has_arrived(&self, elapsed: f64) -> bool {
        if (elapsed - self.target).abs() <= SEEK_ARRIVAL_TOLERANCE_SECS {
            return true;
        }
        if elapsed < self.target {
            return false;
        }
        self.origin < self.target || elapsed < self.origin - SEEK_ARRIVAL_TOLERANCE_SECS
    }
}

impl YouTubeBackend {
    pub fn new(
        provider: &dyn YouTubeProvider,
        video_id: &str,
        generation: u64,
        poll_interval: Duration,
        events: mpsc::UnboundedSender<BackendEnvelope>,
    ) -> Result<Self> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let api = provider.create(video_id, raw_tx)?;
        let cancel = CancellationToken::new();
        let seek_target = Arc::new(Mutex::new(None));

        let forwarder = tokio::spawn(forward_player_events(
            raw_rx,
            generation,
            events.clone(),
            cancel.clone(),
        ));
        let poller = tokio::spawn(poll_time(
            api.clone(),
            poll_interval,
            generation,
            seek_target.clone(),
            events.clone(),
            cancel.clone(),
        ));

        debug!(
            "YouTube backend created for {} (poll every {:?})",
            video_id, poll_interval
        );
        Ok(Self {
            api,
            generation,
            events,
            seek_target,
            cancel,
            tasks: vec![forwarder, poller],
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn play(&self) -> Result<()> {
        self.api.play_video();
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.api.pause_video();
        Ok(())
    }

    /// Arrival is reported by the poll task as `Seeked`
    pub async fn seek_to(&self, seconds: f64) -> Result<()> {
        let target = seconds.max(0.0);
        let origin = finite_or_zero(self.api.get_current_time());
        if let Ok(mut pending) = self.seek_target.lock() {
            *pending = Some(PendingSeek::new(target, origin));
        }
        self.api.seek_to(target, true);
        Ok(())
    }

    pub async fn get_elapsed(&self) -> f64 {
        finite_or_zero(self.api.get_current_time())
    }

    pub async fn get_duration(&self) -> f64 {
        finite_or_zero(self.api.get_duration())
    }

    pub async fn get_volume(&self) -> f64 {
        self.api.get_volume() / 10.0
    }

    /// The player has no volume event, so the adapter confirms the value it
    /// handed over in native units
    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        let native = (volume * 10.0).round().clamp(0.0, VOLUME_MAX * 10.0);
        self.api.set_volume(native);
        self.emit(BackendEvent::VolumeChanged(native / 10.0));
        Ok(())
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        if muted {
            self.api.mute();
        } else {
            self.api.unmute();
        }
        Ok(())
    }

    pub async fn set_playback_rate(&self, rate: f64) -> Result<()> {
        self.api.set_playback_rate(rate);
        Ok(())
    }

    pub fn available_rates(&self) -> Vec<f64> {
        self.api.get_available_playback_rates()
    }

    /// Cancels the poll task and the event forwarder before destroying the iframe
    pub async fn destroy(&self) {
        self.cancel.cancel();
        for task in &self.tasks {
            task.abort();
        }
        self.api.destroy();
        debug!("YouTube backend generation {} destroyed", self.generation);
    }

    fn emit(&self, event: BackendEvent) {
        let _ = self.events.send(BackendEnvelope {
            generation: self.generation,
            event,
        });
    }
}

async fn forward_player_events(
    mut raw_rx: mpsc::UnboundedReceiver<YouTubeEvent>,
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
        trace!("YouTube player event: {:?}", raw);

        let event = match raw {
            YouTubeEvent::Ready => {
                if ready_sent {
                    continue;
                }
                ready_sent = true;
                BackendEvent::Ready
            }
            YouTubeEvent::StateChange(YouTubeState::Playing) => BackendEvent::Playing,
            YouTubeEvent::StateChange(YouTubeState::Paused) => BackendEvent::Paused,
            YouTubeEvent::StateChange(YouTubeState::Ended) => BackendEvent::Ended,
            YouTubeEvent::StateChange(_) => continue,
            YouTubeEvent::PlaybackRateChange(rate) => BackendEvent::RateChanged(rate),
            YouTubeEvent::Error(code) => {
                let kind = ErrorKind::from_youtube_code(code);
                warn!("YouTube player error {} ({})", code, kind);
                BackendEvent::Error(kind)
            }
        };

        if events.send(BackendEnvelope { generation, event }).is_err() {
            break;
        }
    }
}

async fn poll_time(
    api: Arc<dyn YouTubeApi>,
    poll_interval: Duration,
    generation: u64,
    seek_target: Arc<Mutex<Option<PendingSeek>>>,
    events: mpsc::UnboundedSender<BackendEnvelope>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let elapsed = finite_or_zero(api.get_current_time());
        let duration = finite_or_zero(api.get_duration());

        let arrived = match seek_target.lock() {
            Ok(mut pending) => match *pending {
                Some(seek) if seek.has_arrived(elapsed) => {
                    *pending = None;
                    true
                }
                Some(seek) if Instant::now() >= seek.deadline => {
                    debug!(
                        "Seek to {:.2}s not observed within {:?} (at {:.2}s); settling",
                        seek.target, SEEK_ARRIVAL_TIMEOUT, elapsed
                    );
                    *pending = None;
                    true
                }
                _ => false,
            },
            Err(_) => false,
        };

        let mut batch = vec![BackendEvent::TimeUpdate { elapsed, duration }];
        if arrived {
            batch.push(BackendEvent::Seeked);
        }
        for event in batch {
            if events.send(BackendEnvelope { generation, event }).is_err() {
                return;
            }
        }
    }

    trace!("YouTube poller for generation {} stopped", generation);
}
