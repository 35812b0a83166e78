use serde::Serialize;

use super::swap::SourceSwapContext;

/// What asked for a seek; a few triggers imply playback once the seek lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekTrigger {
    Restart,
    Chapter,
    Transcript,
    Search,
    Rewind,
    Forward,
    Previous,
    Next,
    Seekbar,
    Api,
}

impl SeekTrigger {
    pub fn implies_play(self) -> bool {
        matches!(
            self,
            SeekTrigger::Restart | SeekTrigger::Chapter | SeekTrigger::Transcript | SeekTrigger::Search
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekStatus {
    #[default]
    Idle,
    /// A resolver-issued seek was sent and has not settled yet
    Seeking,
    Complete,
}

/// The single deferred intent waiting for the next ready signal
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PendingIntent {
    #[default]
    None,
    SeekToStart(f64),
    SeekToChapter(String),
    ResumeAfterSwap(f64),
    PlaylistAutoplay,
}

/// Flags consulted by the load/seek resolver, cleared together once it resolves
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IntentRecord {
    pub seek_trigger: Option<SeekTrigger>,
    pub seek_status: SeekStatus,
    pub swapping: bool,
    pub swap_time: f64,
    pub prev_duration: f64,
    pub user_clicked_playlist: bool,
    pub ok_to_play: bool,
    pub intent: PendingIntent,
}

impl IntentRecord {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }

    /// Record a swap about to tear down the current backend
    pub fn begin_swap(&mut self, ctx: &SourceSwapContext, playlist_active: bool) {
        self.swapping = true;
        self.swap_time = ctx.swap_time();
        self.prev_duration = ctx.prior_duration;
        self.seek_status = SeekStatus::Idle;
        self.ok_to_play |= ctx.prior_playing;
        self.intent = if self.swap_time > 0.0 {
            PendingIntent::ResumeAfterSwap(self.swap_time)
        } else if playlist_active {
            PendingIntent::PlaylistAutoplay
        } else {
            PendingIntent::None
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::swap::SwapReason;

    fn swap_ctx(reason: SwapReason, elapsed: f64, playing: bool) -> SourceSwapContext {
        SourceSwapContext {
            reason,
            prior_elapsed: elapsed,
            prior_duration: 120.0,
            prior_playing: playing,
        }
    }

    #[test]
    fn test_only_navigation_triggers_imply_play() {
        assert!(SeekTrigger::Restart.implies_play());
        assert!(SeekTrigger::Search.implies_play());
        assert!(!SeekTrigger::Seekbar.implies_play());
        assert!(!SeekTrigger::Forward.implies_play());
    }

    #[test]
    fn test_description_swap_records_resume_position() {
        let mut record = IntentRecord::default();
        record.begin_swap(&swap_ctx(SwapReason::DescriptionToggle, 42.0, true), false);

        assert!(record.swapping);
        assert!(record.ok_to_play);
        assert_eq!(record.swap_time, 42.0);
        assert_eq!(record.prev_duration, 120.0);
        assert_eq!(record.intent, PendingIntent::ResumeAfterSwap(42.0));
    }

    #[test]
    fn test_playlist_swap_starts_from_zero() {
        let mut record = IntentRecord::default();
        record.begin_swap(&swap_ctx(SwapReason::Playlist { index: 2 }, 42.0, false), true);

        assert_eq!(record.swap_time, 0.0);
        assert!(!record.ok_to_play);
        assert_eq!(record.intent, PendingIntent::PlaylistAutoplay);

        record.reset();
        assert!(record.is_clear());
    }
}
