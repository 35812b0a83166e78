use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use crate::utils::errors::PlayerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SwapReason {
    Playlist { index: usize },
    DescriptionToggle,
    SignToggle,
}

/// Playback facts captured just before the old backend is destroyed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SourceSwapContext {
    pub reason: SwapReason,
    pub prior_elapsed: f64,
    pub prior_duration: f64,
    pub prior_playing: bool,
}

impl SourceSwapContext {
    /// Position to resume at on the new source; a new playlist item starts over
    pub fn swap_time(&self) -> f64 {
        match self.reason {
            SwapReason::Playlist { .. } => 0.0,
            SwapReason::DescriptionToggle | SwapReason::SignToggle => self.prior_elapsed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapPhase {
    #[default]
    Idle,
    TearingDown,
    Loading,
    Resolving,
}

impl fmt::Display for SwapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SwapPhase::Idle => "idle",
            SwapPhase::TearingDown => "tearing down",
            SwapPhase::Loading => "loading",
            SwapPhase::Resolving => "resolving",
        };
        f.write_str(label)
    }
}

/// Tracks one source swap at a time through
/// `Idle -> TearingDown -> Loading -> Resolving -> Idle`
#[derive(Debug, Default)]
pub struct SwapOrchestrator {
    phase: SwapPhase,
    context: Option<SourceSwapContext>,
    started: u64,
    completed: u64,
    ignored: u64,
}

impl SwapOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SwapPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == SwapPhase::Idle
    }

    pub fn context(&self) -> Option<&SourceSwapContext> {
        self.context.as_ref()
    }

    pub fn begin(&mut self, context: SourceSwapContext) -> Result<(), PlayerError> {
        if self.phase != SwapPhase::Idle {
            self.ignored += 1;
            debug!(
                "Ignoring {:?} swap while another is {}",
                context.reason, self.phase
            );
            return Err(PlayerError::ReentrantSwapIgnored(self.phase));
        }

        info!(
            "Starting source swap ({:?}) at {:.2}s",
            context.reason, context.prior_elapsed
        );
        self.phase = SwapPhase::TearingDown;
        self.context = Some(context);
        self.started += 1;
        Ok(())
    }

    pub fn torn_down(&mut self) {
        if self.phase == SwapPhase::TearingDown {
            self.phase = SwapPhase::Loading;
        }
    }

    /// New backend reported ready; returns false when no swap was loading
    pub fn ready(&mut self) -> bool {
        if self.phase == SwapPhase::Loading {
            self.phase = SwapPhase::Resolving;
            true
        } else {
            false
        }
    }

    pub fn resolved(&mut self) -> Option<SourceSwapContext> {
        if self.phase != SwapPhase::Resolving {
            return None;
        }
        self.phase = SwapPhase::Idle;
        self.completed += 1;
        self.context.take()
    }

    pub fn abort(&mut self) {
        if self.phase != SwapPhase::Idle {
            debug!("Aborting source swap while {}", self.phase);
        }
        self.phase = SwapPhase::Idle;
        self.context = None;
    }

    pub fn started(&self) -> u64 {
        self.started
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn ignored(&self) -> u64 {
        self.ignored
    }
}
