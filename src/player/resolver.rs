//! Load/seek resolver.
//!
//! Runs once per ready signal and decides, from the intent record and a
//! snapshot of playback state, whether the player should play, seek first, or
//! do nothing. The rules are checked in a fixed order and the first match wins:
//!
//! 1. re-apply a saved playback rate (never ends the turn)
//! 2. a playlist item the user clicked
//! 3. a seek whose trigger implies playback (restart, chapter, transcript, search)
//! 4. a source swap: resume at the swap position, advance a playlist, or reload
//! 5. the initial load: seek to the start time or default chapter
//! 6. a playlist source that finished loading
//! 7. anything else is a plain seek inside the current source
//!
//! Every resolved outcome clears the whole intent record at once.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use super::intent::{IntentRecord, PendingIntent, SeekStatus, SeekTrigger};
use super::playlist::PlaylistPosition;
use super::types::Chapter;
use crate::constants::{DURATION_TOLERANCE_SECS, SAME_POSITION_EPSILON};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyCause {
    /// First ready of a freshly constructed backend
    SourceLoaded,
    /// A seek reported by the backend as settled
    SeekSettled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadySignal {
    pub seq: u64,
    pub cause: ReadyCause,
}

/// Snapshot of playback state the resolver decides from
#[derive(Debug, Clone)]
pub struct ResolveContext<'a> {
    pub elapsed: f64,
    pub duration: f64,
    pub playing: bool,
    pub started_playing: bool,
    /// Saved rate to restore on the new source, when not 1x
    pub playback_rate: Option<f64>,
    pub start_time: f64,
    pub default_chapter: Option<&'a Chapter>,
    pub playlist: PlaylistPosition,
    pub has_desc_tracks: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadAction {
    ApplyPlaybackRate(f64),
    SeekTo(f64),
    Play,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    /// Description tracks are timed from 0; resuming elsewhere desynchronizes them
    DescriptionTracks,
    /// The new source is a different cut of the media
    DurationMismatch,
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbandonReason::DescriptionTracks => f.write_str("new source has description tracks"),
            AbandonReason::DurationMismatch => f.write_str("source durations differ"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "detail", rename_all = "snake_case")]
pub enum Resolution {
    UserSelection,
    TriggeredPlay(SeekTrigger),
    ResumedAfterSwap,
    SeekAbandoned(AbandonReason),
    PlaylistSwap,
    SwapReloaded,
    StartPosition,
    InitialLoad,
    PlaylistAutoplay,
    PlainSeek,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Resolved(Resolution),
    /// A resolver-issued seek is in flight; the next settled signal continues
    Waiting,
    /// Signal already handled
    Duplicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub outcome: Outcome,
    pub actions: Vec<LoadAction>,
}

impl Decision {
    pub fn plays(&self) -> bool {
        self.actions.contains(&LoadAction::Play)
    }

    pub fn seek_target(&self) -> Option<f64> {
        self.actions.iter().find_map(|a| match a {
            LoadAction::SeekTo(t) => Some(*t),
            _ => None,
        })
    }
}

/// Rounded durations differ by at most one second
pub fn durations_are_close_enough(d1: f64, d2: f64) -> bool {
    (d1.round() - d2.round()).abs() <= DURATION_TOLERANCE_SECS
}

#[derive(Debug, Default)]
pub struct LoadSeekResolver {
    intents: IntentRecord,
    last_signal: Option<u64>,
    next_seq: u64,
    resolutions: u64,
}

impl LoadSeekResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intents(&self) -> &IntentRecord {
        &self.intents
    }

    pub fn intents_mut(&mut self) -> &mut IntentRecord {
        &mut self.intents
    }

    pub fn resolutions(&self) -> u64 {
        self.resolutions
    }

    /// Allocate the next ready signal
    pub fn signal(&mut self, cause: ReadyCause) -> ReadySignal {
        self.next_seq += 1;
        ReadySignal {
            seq: self.next_seq,
            cause,
        }
    }

    /// Mark a resolver-issued seek as landed; returns false for seeks the
    /// resolver did not issue
    pub fn note_seek_settled(&mut self) -> bool {
        if self.intents.seek_status == SeekStatus::Seeking {
            self.intents.seek_status = SeekStatus::Complete;
            true
        } else {
            false
        }
    }

    /// Drop every pending intent, e.g. after a backend error
    pub fn abandon(&mut self) {
        if !self.intents.is_clear() {
            debug!("Dropping pending intents: {:?}", self.intents.intent);
        }
        self.intents.reset();
    }

    pub fn resolve(&mut self, signal: ReadySignal, ctx: &ResolveContext<'_>) -> Decision {
        if self.last_signal.is_some_and(|last| signal.seq <= last) {
            debug!("Ready signal {} already resolved", signal.seq);
            return Decision {
                outcome: Outcome::Duplicate,
                actions: Vec::new(),
            };
        }
        self.last_signal = Some(signal.seq);

        let mut actions = Vec::new();
        if signal.cause == ReadyCause::SourceLoaded
            && let Some(rate) = ctx.playback_rate
        {
            actions.push(LoadAction::ApplyPlaybackRate(rate));
        }

        if self.intents.user_clicked_playlist && (!ctx.started_playing || self.intents.ok_to_play) {
            actions.push(LoadAction::Play);
            return self.finish(Resolution::UserSelection, actions);
        }

        if let Some(trigger) = self.intents.seek_trigger
            && trigger.implies_play()
        {
            actions.push(LoadAction::Play);
            return self.finish(Resolution::TriggeredPlay(trigger), actions);
        }

        if self.intents.swapping {
            if self.intents.swap_time > 0.0 {
                let target = self.intents.swap_time;
                let prev_duration = self.intents.prev_duration;
                return self.seek_then_play(
                    target,
                    Some(prev_duration),
                    ctx,
                    Resolution::ResumedAfterSwap,
                    actions,
                );
            }
            if ctx.playlist.active {
                if ctx.playlist.should_autoplay() {
                    actions.push(LoadAction::Play);
                }
                return self.finish(Resolution::PlaylistSwap, actions);
            }
            if ctx.playing || self.intents.ok_to_play {
                actions.push(LoadAction::Play);
            }
            return self.finish(Resolution::SwapReloaded, actions);
        }

        let initial_load = signal.cause == ReadyCause::SourceLoaded
            || self.intents.seek_status != SeekStatus::Idle;
        if !ctx.started_playing && initial_load {
            let target = if ctx.start_time > 0.0 {
                Some(ctx.start_time)
            } else {
                ctx.default_chapter.map(|c| c.start)
            };
            return match target {
                Some(target) => {
                    self.seek_then_play(target, None, ctx, Resolution::StartPosition, actions)
                }
                None => {
                    if self.intents.ok_to_play {
                        actions.push(LoadAction::Play);
                    }
                    self.finish(Resolution::InitialLoad, actions)
                }
            };
        }

        if ctx.playlist.active
            && !self.intents.user_clicked_playlist
            && signal.cause == ReadyCause::SourceLoaded
        {
            if ctx.playlist.should_autoplay() {
                actions.push(LoadAction::Play);
            }
            return self.finish(Resolution::PlaylistAutoplay, actions);
        }

        self.finish(Resolution::PlainSeek, actions)
    }

    /// Seek to `target` unless already there, then play once the seek settles.
    /// `prev_duration` enables the swap restrictions.
    fn seek_then_play(
        &mut self,
        target: f64,
        prev_duration: Option<f64>,
        ctx: &ResolveContext<'_>,
        done: Resolution,
        mut actions: Vec<LoadAction>,
    ) -> Decision {
        match self.intents.seek_status {
            SeekStatus::Complete => {
                if self.intents.ok_to_play {
                    actions.push(LoadAction::Play);
                }
                self.finish(done, actions)
            }
            SeekStatus::Seeking => Decision {
                outcome: Outcome::Waiting,
                actions,
            },
            SeekStatus::Idle => {
                if (target - ctx.elapsed).abs() < SAME_POSITION_EPSILON {
                    if self.intents.ok_to_play {
                        actions.push(LoadAction::Play);
                    }
                    return self.finish(done, actions);
                }

                if let Some(prev_duration) = prev_duration {
                    let abandon = if ctx.has_desc_tracks {
                        Some(AbandonReason::DescriptionTracks)
                    } else if !durations_are_close_enough(prev_duration, ctx.duration) {
                        Some(AbandonReason::DurationMismatch)
                    } else {
                        None
                    };
                    if let Some(reason) = abandon {
                        debug!(
                            "Not resuming at {:.2}s ({}; previous {:.2}s, new {:.2}s)",
                            target, reason, prev_duration, ctx.duration
                        );
                        if self.intents.ok_to_play {
                            actions.push(LoadAction::Play);
                        }
                        return self.finish(Resolution::SeekAbandoned(reason), actions);
                    }
                }

                debug!("Seeking to {:.2}s before playback", target);
                if !matches!(self.intents.intent, PendingIntent::ResumeAfterSwap(_)) {
                    self.intents.intent = match ctx.default_chapter {
                        Some(chapter) if ctx.start_time <= 0.0 => {
                            PendingIntent::SeekToChapter(chapter.id.clone())
                        }
                        _ => PendingIntent::SeekToStart(target),
                    };
                }
                self.intents.seek_status = SeekStatus::Seeking;
                actions.push(LoadAction::SeekTo(target));
                Decision {
                    outcome: Outcome::Waiting,
                    actions,
                }
            }
        }
    }

    fn finish(&mut self, resolution: Resolution, actions: Vec<LoadAction>) -> Decision {
        debug!("Resolved ready signal: {:?} -> {:?}", resolution, actions);
        self.intents.reset();
        self.resolutions += 1;
        Decision {
            outcome: Outcome::Resolved(resolution),
            actions,
        }
    }
}
