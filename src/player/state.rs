use serde::Serialize;

use super::types::{BackendKind, clamp_volume, finite_or_zero};

/// Authoritative playback state; owned and mutated only by the controller task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    backend: Option<BackendKind>,
    playing: bool,
    paused: bool,
    started_playing: bool,
    elapsed: f64,
    duration: f64,
    volume: f64,
    last_volume: f64,
    muted: bool,
    playback_rate: f64,
}

impl PlaybackState {
    pub fn new(default_volume: f64) -> Self {
        let volume = clamp_volume(default_volume);
        Self {
            backend: None,
            playing: false,
            paused: false,
            started_playing: false,
            elapsed: 0.0,
            duration: 0.0,
            volume,
            last_volume: volume,
            muted: false,
            playback_rate: 1.0,
        }
    }

    pub fn backend(&self) -> Option<BackendKind> {
        self.backend
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn has_started(&self) -> bool {
        self.started_playing
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Volume restored by unmuting
    pub fn last_volume(&self) -> f64 {
        self.last_volume
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// A new backend starts with no known position
    pub fn set_backend(&mut self, kind: BackendKind) {
        self.backend = Some(kind);
        self.reset_times();
    }

    pub fn update_times(&mut self, elapsed: f64, duration: f64) {
        self.elapsed = finite_or_zero(elapsed);
        let duration = finite_or_zero(duration);
        if duration > 0.0 {
            self.duration = duration;
        }
    }

    pub fn set_elapsed(&mut self, elapsed: f64) {
        self.elapsed = finite_or_zero(elapsed);
    }

    pub fn reset_times(&mut self) {
        self.elapsed = 0.0;
        self.duration = 0.0;
    }

    pub fn mark_playing(&mut self) {
        self.playing = true;
        self.paused = false;
        self.started_playing = true;
    }

    pub fn mark_paused(&mut self) {
        self.playing = false;
        self.paused = true;
    }

    /// Stop after an error or at the end of the media
    pub fn halt(&mut self) {
        self.mark_paused();
    }

    /// Record a user volume request; returns the clamped value to send to the backend
    pub fn request_volume(&mut self, volume: f64) -> f64 {
        let volume = clamp_volume(volume);
        self.volume = volume;
        if volume > 0.0 {
            self.last_volume = volume;
        }
        volume
    }

    /// Backend confirmation of a volume change, already in 0..10 units
    pub fn confirm_volume(&mut self, volume: f64) -> bool {
        if self.muted {
            return false;
        }
        self.volume = clamp_volume(volume);
        if self.volume > 0.0 {
            self.last_volume = self.volume;
        }
        true
    }

    pub fn mute(&mut self) {
        if self.muted {
            return;
        }
        if self.volume > 0.0 {
            self.last_volume = self.volume;
        }
        self.volume = 0.0;
        self.muted = true;
    }

    /// Returns the restored volume
    pub fn unmute(&mut self) -> f64 {
        if self.muted {
            self.muted = false;
            self.volume = self.last_volume;
        }
        self.volume
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.playback_rate = rate;
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_VOLUME)
    }
}
