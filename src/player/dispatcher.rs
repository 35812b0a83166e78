use serde::Serialize;

use super::state::PlaybackState;
use super::traits::{ControlAspect, DescriptionRequest, ViewSync};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScrubState {
    #[default]
    Idle,
    Tracking {
        paused_before: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOutcome {
    /// The description view asked to hold playback; state is already paused
    pub pause_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrubRelease {
    pub seek_to: f64,
    pub resume: bool,
}

/// Fans time updates out to the dependent views in a fixed order:
/// transcript highlight, caption, description, chapter, metadata, timeline.
#[derive(Debug, Default)]
pub struct TimeSyncDispatcher {
    highlight_transcript: bool,
    use_chapter_times: bool,
    scrub: ScrubState,
}

impl TimeSyncDispatcher {
    pub fn new(highlight_transcript: bool, use_chapter_times: bool) -> Self {
        Self {
            highlight_transcript,
            use_chapter_times,
            scrub: ScrubState::Idle,
        }
    }

    pub fn set_highlight_transcript(&mut self, enabled: bool) {
        self.highlight_transcript = enabled;
    }

    pub fn scrub_state(&self) -> ScrubState {
        self.scrub
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.scrub, ScrubState::Tracking { .. })
    }

    pub fn on_time_update(
        &mut self,
        view: &dyn ViewSync,
        state: &mut PlaybackState,
        elapsed: f64,
        duration: f64,
    ) -> SyncOutcome {
        state.update_times(elapsed, duration);
        // The seek bar owns the views while the user drags it
        if duration <= 0.0 || self.is_tracking() {
            return SyncOutcome::default();
        }

        let elapsed = state.elapsed();
        self.sync_views(view, state, elapsed, elapsed, true)
    }

    /// Returns true when playback must be paused for the drag
    pub fn start_tracking(&mut self, state: &mut PlaybackState) -> bool {
        let paused_before = !state.is_playing();
        self.scrub = ScrubState::Tracking { paused_before };
        if paused_before {
            false
        } else {
            state.mark_paused();
            true
        }
    }

    /// Preview `position` in the views without seeking the backend.
    ///
    /// The views see a copy of the state placed at `position`; the real
    /// playhead only moves once the drag is released.
    pub fn tracking(
        &mut self,
        view: &dyn ViewSync,
        state: &PlaybackState,
        position: f64,
        chapter_offset: f64,
    ) {
        if !self.is_tracking() {
            return;
        }
        let mut preview = state.clone();
        preview.set_elapsed(position);
        let chapter_time = self.to_media_time(position, chapter_offset);
        self.sync_views(view, &mut preview, position, chapter_time, false);
    }

    pub fn stop_tracking(&mut self, position: f64, chapter_offset: f64) -> Option<ScrubRelease> {
        match std::mem::take(&mut self.scrub) {
            ScrubState::Tracking { paused_before } => Some(ScrubRelease {
                seek_to: self.to_media_time(position, chapter_offset),
                resume: !paused_before,
            }),
            ScrubState::Idle => None,
        }
    }

    fn to_media_time(&self, position: f64, chapter_offset: f64) -> f64 {
        if self.use_chapter_times {
            position + chapter_offset
        } else {
            position
        }
    }

    fn sync_views(
        &self,
        view: &dyn ViewSync,
        state: &mut PlaybackState,
        elapsed: f64,
        chapter_time: f64,
        honor_pause: bool,
    ) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        if self.highlight_transcript {
            view.highlight_transcript(elapsed);
        }
        view.update_caption(elapsed);
        if view.show_description(elapsed) == DescriptionRequest::Pause
            && honor_pause
            && state.is_playing()
        {
            state.mark_paused();
            outcome.pause_requested = true;
        }
        view.update_chapter(chapter_time);
        view.update_meta(elapsed);
        view.refresh_controls(ControlAspect::Timeline, state);

        outcome
    }
}
