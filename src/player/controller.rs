use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::dispatcher::{ScrubState, TimeSyncDispatcher};
use super::factory::{Backend, BackendFactory};
use super::intent::{IntentRecord, SeekStatus, SeekTrigger};
use super::keys::{FocusTarget, KeyPress, PlayerAction, map_key};
use super::playlist::{Advance, Playlist};
use super::resolver::{LoadAction, LoadSeekResolver, Outcome, ReadyCause, ReadySignal, Resolution, ResolveContext};
use super::state::PlaybackState;
use super::swap::{SourceSwapContext, SwapOrchestrator, SwapPhase, SwapReason};
use super::traits::{ControlAspect, ViewSync};
use super::types::{BackendEnvelope, BackendEvent, ErrorKind, SourceDescriptor, clamp_volume};
use crate::config::Config;
use crate::constants::{EVENT_BUS_CAPACITY, VOLUME_MAX};
use crate::events::{EventBus, EventFilter, EventPayload, EventSubscriber, EventType};
use crate::utils::errors::PlayerError;

/// Commands that can be sent to the player controller
#[derive(Debug)]
pub enum PlayerCommand {
    /// Start playback, or play as soon as the pending load resolves
    Play {
        respond_to: oneshot::Sender<Result<()>>,
    },
    Pause {
        respond_to: oneshot::Sender<Result<()>>,
    },
    TogglePlay {
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// Seek to a position in seconds
    Seek {
        position: f64,
        trigger: SeekTrigger,
        respond_to: oneshot::Sender<Result<()>>,
    },
    SeekToChapter {
        chapter_id: String,
        respond_to: oneshot::Sender<Result<()>>,
    },
    Restart {
        respond_to: oneshot::Sender<Result<()>>,
    },
    Rewind {
        respond_to: oneshot::Sender<Result<()>>,
    },
    Forward {
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// Set volume (0 to 10)
    SetVolume {
        volume: f64,
        respond_to: oneshot::Sender<Result<()>>,
    },
    SetMute {
        muted: bool,
        respond_to: oneshot::Sender<Result<()>>,
    },
    ToggleMute {
        respond_to: oneshot::Sender<Result<()>>,
    },
    SetPlaybackRate {
        rate: f64,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// Step to the next faster or slower rate the backend offers
    ChangeRate {
        faster: bool,
        respond_to: oneshot::Sender<Result<f64>>,
    },
    NextTrack {
        respond_to: oneshot::Sender<Result<()>>,
    },
    PreviousTrack {
        respond_to: oneshot::Sender<Result<()>>,
    },
    SelectPlaylistItem {
        index: usize,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// Returns the new description preference
    ToggleDescriptions {
        respond_to: oneshot::Sender<Result<bool>>,
    },
    /// Returns the new sign-language preference
    ToggleSign {
        respond_to: oneshot::Sender<Result<bool>>,
    },
    /// Follow playback in the transcript view
    SetHighlightTranscript {
        enabled: bool,
        respond_to: oneshot::Sender<Result<()>>,
    },
    StartTracking {
        respond_to: oneshot::Sender<Result<()>>,
    },
    Tracking {
        position: f64,
        respond_to: oneshot::Sender<Result<()>>,
    },
    StopTracking {
        position: f64,
        respond_to: oneshot::Sender<Result<()>>,
    },
    KeyPress {
        press: KeyPress,
        focus: FocusTarget,
        respond_to: oneshot::Sender<Result<Option<PlayerAction>>>,
    },
    GetSnapshot {
        respond_to: oneshot::Sender<PlayerSnapshot>,
    },
    /// Volume as the backend reports it, 0 to 10
    GetVolume {
        respond_to: oneshot::Sender<f64>,
    },
    /// Sent by the scrub-release timer
    ResumeAfterScrub { token: u64 },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

/// Point-in-time copy of everything the controller tracks
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    pub generation: u64,
    pub backend_ready: bool,
    pub swap_phase: SwapPhase,
    pub scrub: ScrubState,
    pub intents: IntentRecord,
    pub playlist_index: usize,
    pub playlist_len: usize,
    pub descriptions: bool,
    pub sign: bool,
    pub swaps_started: u64,
    pub swaps_completed: u64,
    pub swaps_ignored: u64,
    pub resolutions: u64,
}

/// Everything a controller needs besides its channels
pub struct PlayerSetup {
    pub config: Config,
    /// Falls back to the playlist in `config` when unset
    pub playlist: Option<Playlist>,
    pub factory: BackendFactory,
    pub view: Arc<dyn ViewSync>,
}

/// Controller that owns the backend and all playback state, and processes
/// commands and backend events one at a time
pub struct PlayerController {
    config: Config,
    playlist: Playlist,
    factory: BackendFactory,
    view: Arc<dyn ViewSync>,
    events: EventBus,

    receiver: mpsc::UnboundedReceiver<PlayerCommand>,
    self_sender: mpsc::WeakUnboundedSender<PlayerCommand>,
    backend_tx: mpsc::UnboundedSender<BackendEnvelope>,
    backend_rx: mpsc::UnboundedReceiver<BackendEnvelope>,

    backend: Option<Backend>,
    generation: u64,
    backend_ready: bool,

    state: PlaybackState,
    resolver: LoadSeekResolver,
    dispatcher: TimeSyncDispatcher,
    swap: SwapOrchestrator,

    descriptions_on: bool,
    sign_on: bool,
    scrub_chapter_offset: f64,
    scrub_token: u64,
}

impl PlayerController {
    pub fn new(setup: PlayerSetup) -> Result<(PlayerHandle, PlayerController)> {
        let PlayerSetup {
            config,
            playlist,
            factory,
            view,
        } = setup;
        config.validate().context("Invalid player configuration")?;
        let factory = factory.with_poll_interval(config.playback.youtube_poll_interval());

        let playlist = match playlist {
            Some(playlist) => playlist,
            None => config.build_playlist()?.ok_or(PlayerError::NoMedia)?,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let (backend_tx, backend_rx) = mpsc::unbounded_channel();
        let events = EventBus::new(EVENT_BUS_CAPACITY);

        let mut state = PlaybackState::new(config.playback.default_volume);
        state.set_playback_rate(config.playback.playback_rate);

        let mut resolver = LoadSeekResolver::new();
        resolver.intents_mut().ok_to_play = config.playback.autoplay;

        let dispatcher = TimeSyncDispatcher::new(
            config.preferences.highlight_transcript,
            config.preferences.use_chapter_times,
        );

        let controller = PlayerController {
            descriptions_on: config.preferences.descriptions,
            sign_on: config.preferences.sign,
            config,
            playlist,
            factory,
            view,
            events: events.clone(),
            receiver,
            self_sender: sender.downgrade(),
            backend_tx,
            backend_rx,
            backend: None,
            generation: 0,
            backend_ready: false,
            state,
            resolver,
            dispatcher,
            swap: SwapOrchestrator::new(),
            scrub_chapter_offset: 0.0,
            scrub_token: 0,
        };
        let handle = PlayerHandle { sender, events };

        Ok((handle, controller))
    }

    /// Create a controller and run it on the current tokio runtime
    pub fn spawn(setup: PlayerSetup) -> Result<(PlayerHandle, JoinHandle<()>)> {
        let (handle, controller) = Self::new(setup)?;
        let task = tokio::spawn(controller.run());
        Ok((handle, task))
    }

    /// Run the controller event loop
    pub async fn run(mut self) {
        debug!("PlayerController event loop started");

        if let Err(e) = self.load_current_source() {
            error!("Failed to load initial source: {}", e);
            self.emit_error(None, e.to_string()).await;
        }

        loop {
            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(PlayerCommand::Shutdown { respond_to }) => {
                        trace!("Shutting down player");
                        self.teardown_backend().await;
                        let _ = respond_to.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(envelope) = self.backend_rx.recv() => {
                    self.handle_backend_event(envelope).await;
                }
            }
        }

        self.teardown_backend().await;
        debug!("PlayerController event loop terminated");
    }

    async fn handle_command(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Play { respond_to } => {
                trace!("Starting playback");
                let result = self.play().await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::Pause { respond_to } => {
                trace!("Pausing playback");
                let result = self.pause().await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::TogglePlay { respond_to } => {
                trace!("Toggling playback");
                let result = self.toggle_play().await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::Seek {
                position,
                trigger,
                respond_to,
            } => {
                trace!("Seeking to {:.2}s ({:?})", position, trigger);
                let result = self.seek(position, trigger).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::SeekToChapter {
                chapter_id,
                respond_to,
            } => {
                trace!("Seeking to chapter {}", chapter_id);
                let result = self.seek_to_chapter(&chapter_id).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::Restart { respond_to } => {
                trace!("Restarting");
                let result = self.seek(0.0, SeekTrigger::Restart).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::Rewind { respond_to } => {
                let target = self.state.elapsed() - self.config.playback.seek_interval();
                trace!("Rewinding to {:.2}s", target);
                let result = self.seek(target, SeekTrigger::Rewind).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::Forward { respond_to } => {
                let target = self.state.elapsed() + self.config.playback.seek_interval();
                trace!("Forwarding to {:.2}s", target);
                let result = self.seek(target, SeekTrigger::Forward).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::SetVolume { volume, respond_to } => {
                trace!("Setting volume to {}", volume);
                let result = self.set_volume(volume).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::SetMute { muted, respond_to } => {
                trace!("Setting mute to {}", muted);
                let result = self.set_mute(muted).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::ToggleMute { respond_to } => {
                trace!("Toggling mute");
                let result = self.set_mute(!self.state.is_muted()).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::SetPlaybackRate { rate, respond_to } => {
                trace!("Setting playback rate to {}", rate);
                let result = self.set_playback_rate(rate).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::ChangeRate { faster, respond_to } => {
                trace!("Changing rate (faster: {})", faster);
                let result = self.change_rate(faster).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::NextTrack { respond_to } => {
                trace!("Next track");
                let result = match self.playlist.next() {
                    Some(index) if self.playlist.is_active() => self.swap_to_item(index, true).await,
                    _ => Ok(()),
                };
                let _ = respond_to.send(result);
            }
            PlayerCommand::PreviousTrack { respond_to } => {
                trace!("Previous track");
                let result = match self.playlist.previous() {
                    Some(index) if self.playlist.is_active() => self.swap_to_item(index, true).await,
                    _ => Ok(()),
                };
                let _ = respond_to.send(result);
            }
            PlayerCommand::SelectPlaylistItem { index, respond_to } => {
                trace!("Selecting playlist item {}", index);
                let result = self.swap_to_item(index, true).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::ToggleDescriptions { respond_to } => {
                trace!("Toggling descriptions");
                let result = self.toggle_alternate(SwapReason::DescriptionToggle).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::ToggleSign { respond_to } => {
                trace!("Toggling sign language");
                let result = self.toggle_alternate(SwapReason::SignToggle).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::SetHighlightTranscript {
                enabled,
                respond_to,
            } => {
                trace!("Transcript highlight {}", if enabled { "on" } else { "off" });
                self.dispatcher.set_highlight_transcript(enabled);
                let _ = respond_to.send(Ok(()));
            }
            PlayerCommand::StartTracking { respond_to } => {
                let result = self.start_tracking().await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::Tracking {
                position,
                respond_to,
            } => {
                self.dispatcher.tracking(
                    self.view.as_ref(),
                    &self.state,
                    position,
                    self.scrub_chapter_offset,
                );
                let _ = respond_to.send(Ok(()));
            }
            PlayerCommand::StopTracking {
                position,
                respond_to,
            } => {
                let result = self.stop_tracking(position).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::KeyPress {
                press,
                focus,
                respond_to,
            } => {
                trace!("Key press {:?} (focus {:?})", press, focus);
                let result = self.handle_key(press, focus).await;
                let _ = respond_to.send(result);
            }
            PlayerCommand::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
            PlayerCommand::GetVolume { respond_to } => {
                let volume = match self.backend.as_ref() {
                    Some(backend) if !self.state.is_muted() => backend.get_volume().await,
                    _ => self.state.volume(),
                };
                let _ = respond_to.send(volume);
            }
            PlayerCommand::ResumeAfterScrub { token } => {
                if token == self.scrub_token && !self.dispatcher.is_tracking() {
                    trace!("Resuming after scrub");
                    if let Err(e) = self.start_playback().await {
                        warn!("Failed to resume after scrub: {}", e);
                    }
                }
            }
            PlayerCommand::Shutdown { respond_to } => {
                let _ = respond_to.send(());
            }
        }
    }

    async fn handle_backend_event(&mut self, envelope: BackendEnvelope) {
        if envelope.generation != self.generation {
            trace!(
                "Dropping {:?} from stale backend generation {} (current {})",
                envelope.event, envelope.generation, self.generation
            );
            return;
        }

        match envelope.event {
            BackendEvent::Ready => self.on_ready().await,
            BackendEvent::TimeUpdate { elapsed, duration } => {
                let outcome = self.dispatcher.on_time_update(
                    self.view.as_ref(),
                    &mut self.state,
                    elapsed,
                    duration,
                );
                if outcome.pause_requested {
                    debug!("Pausing for extended description at {:.2}s", elapsed);
                    if let Some(backend) = self.backend.as_ref()
                        && let Err(e) = backend.pause().await
                    {
                        warn!("Failed to pause for description: {}", e);
                    }
                    self.refresh(ControlAspect::PlayPause);
                }
                self.emit(EventType::TimeUpdate, self.playback_payload()).await;
            }
            BackendEvent::DurationChanged(duration) => {
                self.state.update_times(self.state.elapsed(), duration);
            }
            BackendEvent::Seeked => self.on_seeked().await,
            BackendEvent::Playing => {
                self.state.mark_playing();
                self.refresh(ControlAspect::PlayPause);
                self.emit(EventType::Playing, self.playback_payload()).await;
            }
            BackendEvent::Paused => {
                // Players pause on their own while a source is being replaced
                if self.swap.is_idle() {
                    self.state.mark_paused();
                    self.refresh(ControlAspect::PlayPause);
                    self.emit(EventType::Paused, self.playback_payload()).await;
                }
            }
            BackendEvent::Ended => self.on_ended().await,
            BackendEvent::VolumeChanged(volume) => {
                if self.state.confirm_volume(volume) {
                    self.refresh(ControlAspect::Volume);
                    self.emit(EventType::VolumeChanged, self.volume_payload())
                        .await;
                }
            }
            BackendEvent::RateChanged(rate) => {
                self.state.set_playback_rate(rate);
                self.refresh(ControlAspect::Rate);
                self.emit(EventType::RateChanged, EventPayload::Rate { rate })
                    .await;
            }
            BackendEvent::Error(kind) => self.on_error(kind).await,
        }
    }

    async fn on_ready(&mut self) {
        if self.backend_ready {
            return;
        }
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        self.backend_ready = true;

        let elapsed = backend.get_elapsed().await;
        let duration = backend.get_duration().await;
        self.state.update_times(elapsed, duration);

        let muted = self.state.is_muted();
        let volume = if muted {
            self.state.last_volume()
        } else {
            self.state.volume()
        };
        if let Err(e) = backend.set_volume(volume).await {
            warn!("Failed to apply volume to new backend: {}", e);
        }
        if let Err(e) = backend.set_muted(muted).await {
            warn!("Failed to apply mute to new backend: {}", e);
        }

        info!(
            "{} backend ready (generation {}, duration {:.2}s)",
            backend.kind(),
            self.generation,
            duration
        );
        self.swap.ready();
        self.emit(
            EventType::Ready,
            EventPayload::Source {
                generation: self.generation,
                duration: self.state.duration(),
            },
        )
        .await;
        self.refresh(ControlAspect::All);

        let signal = self.resolver.signal(ReadyCause::SourceLoaded);
        self.run_resolver(signal).await;
    }

    async fn on_seeked(&mut self) {
        if !self.backend_ready {
            return;
        }
        if let Some(backend) = self.backend.as_ref() {
            let elapsed = backend.get_elapsed().await;
            self.state.set_elapsed(elapsed);
        }
        self.resolver.note_seek_settled();
        let signal = self.resolver.signal(ReadyCause::SeekSettled);
        self.run_resolver(signal).await;
    }

    async fn on_ended(&mut self) {
        let index = self.playlist.index();
        if self.playlist.is_active() && self.swap.is_idle() {
            match self.playlist.on_complete() {
                Advance::To(next) => {
                    info!("Item {} ended, advancing to {}", index, next);
                    self.emit(
                        EventType::Ended,
                        EventPayload::Ended {
                            playlist_index: index,
                            advancing: true,
                        },
                    )
                    .await;
                    if let Err(e) = self.swap_to_item(next, false).await {
                        warn!("Failed to advance playlist: {}", e);
                    }
                    return;
                }
                Advance::Stop => info!("Last playlist item ended"),
            }
        }

        self.state.halt();
        self.refresh(ControlAspect::All);
        self.emit(
            EventType::Ended,
            EventPayload::Ended {
                playlist_index: index,
                advancing: false,
            },
        )
        .await;
    }

    async fn on_error(&mut self, kind: ErrorKind) {
        let err = PlayerError::Playback(kind);
        error!(
            "{} on {:?} backend (generation {})",
            err,
            self.state.backend(),
            self.generation
        );
        self.state.halt();
        self.resolver.abandon();
        self.swap.abort();
        self.refresh(ControlAspect::All);
        self.emit_error(Some(kind), err.to_string()).await;
    }

    async fn run_resolver(&mut self, signal: ReadySignal) {
        let decision = {
            let item = self.playlist.current();
            let default_chapter = self
                .config
                .playback
                .default_chapter
                .as_deref()
                .and_then(|id| item.chapter(id));
            let rate = self.state.playback_rate();
            let ctx = ResolveContext {
                elapsed: self.state.elapsed(),
                duration: self.state.duration(),
                playing: self.state.is_playing(),
                started_playing: self.state.has_started(),
                playback_rate: (rate != 1.0).then_some(rate),
                start_time: self.config.playback.start_time,
                default_chapter,
                playlist: self.playlist.position(),
                has_desc_tracks: item.has_desc_tracks,
            };
            self.resolver.resolve(signal, &ctx)
        };

        if let Outcome::Resolved(resolution) = decision.outcome {
            if let Resolution::SeekAbandoned(reason) = resolution {
                let target = self.swap.context().map(|c| c.swap_time()).unwrap_or(0.0);
                debug!("{}", PlayerError::SeekAbandoned(reason));
                self.emit(
                    EventType::SeekAbandoned,
                    EventPayload::SeekAbandoned { reason, target },
                )
                .await;
            }
            if let Some(ctx) = self.swap.resolved() {
                info!("Source swap ({:?}) completed", ctx.reason);
                self.emit(
                    EventType::SwapCompleted,
                    EventPayload::Swap {
                        reason: ctx.reason,
                        swap_time: ctx.swap_time(),
                    },
                )
                .await;
            }
        }

        for action in decision.actions {
            let result = match action {
                LoadAction::ApplyPlaybackRate(rate) => match self.backend.as_ref() {
                    Some(backend) => backend.set_playback_rate(rate).await,
                    None => Ok(()),
                },
                LoadAction::SeekTo(target) => match self.backend.as_ref() {
                    Some(backend) => backend.seek_to(target).await,
                    None => Ok(()),
                },
                LoadAction::Play => self.start_playback().await,
            };
            if let Err(e) = result {
                warn!("Failed to apply {:?}: {}", action, e);
            }
        }
    }

    fn load_current_source(&mut self) -> Result<(), PlayerError> {
        let source = self.active_source().clone();
        self.generation += 1;
        self.backend_ready = false;

        let backend = self.factory.create(
            &source,
            self.generation,
            self.state.volume(),
            self.backend_tx.clone(),
        )?;
        self.state.set_backend(backend.kind());
        info!(
            "Loaded {} source for item {} (generation {})",
            backend.kind(),
            self.playlist.index(),
            self.generation
        );
        self.backend = Some(backend);
        Ok(())
    }

    /// Destroy the backend; events it already queued are dropped by generation
    async fn teardown_backend(&mut self) {
        if let Some(backend) = self.backend.take() {
            debug!(
                "Destroying {} backend generation {}",
                backend.kind(),
                backend.generation()
            );
            backend.destroy().await;
            self.generation += 1;
            self.backend_ready = false;
            self.view.clear_backend_caches();
        }
    }

    fn active_source(&self) -> &SourceDescriptor {
        self.playlist
            .current()
            .active_source(self.descriptions_on, self.sign_on)
    }

    /// The resolver still owes the player a decision
    fn resolution_pending(&self) -> bool {
        !self.backend_ready
            || !self.swap.is_idle()
            || self.resolver.intents().seek_status == SeekStatus::Seeking
    }

    async fn play(&mut self) -> Result<()> {
        if self.backend.is_none() {
            return Err(PlayerError::NoMedia.into());
        }
        if self.resolution_pending() {
            debug!("Play requested before the source resolved; deferring");
            self.resolver.intents_mut().ok_to_play = true;
            return Ok(());
        }
        self.start_playback().await
    }

    async fn start_playback(&mut self) -> Result<()> {
        let backend = self.backend.as_ref().ok_or(PlayerError::NoMedia)?;
        backend.play().await
    }

    async fn pause(&mut self) -> Result<()> {
        self.resolver.intents_mut().ok_to_play = false;
        let backend = self.backend.as_ref().ok_or(PlayerError::NoMedia)?;
        backend.pause().await?;

        // Backend Paused events are ignored mid-swap and a fresh backend never sends one
        if self.resolution_pending() && self.state.is_playing() {
            self.state.mark_paused();
            self.refresh(ControlAspect::PlayPause);
            self.emit(EventType::Paused, self.playback_payload()).await;
        }
        Ok(())
    }

    async fn toggle_play(&mut self) -> Result<()> {
        if self.state.is_playing() {
            self.pause().await
        } else {
            self.play().await
        }
    }

    async fn seek(&mut self, position: f64, trigger: SeekTrigger) -> Result<()> {
        let backend = self.backend.as_ref().ok_or(PlayerError::NoMedia)?;
        let duration = self.state.duration();
        let mut target = position.max(0.0);
        if duration > 0.0 {
            target = target.min(duration);
        }

        self.resolver.intents_mut().seek_trigger = Some(trigger);
        backend.seek_to(target).await?;
        self.refresh(ControlAspect::Timeline);
        Ok(())
    }

    async fn seek_to_chapter(&mut self, chapter_id: &str) -> Result<()> {
        let start = self
            .playlist
            .current()
            .chapter(chapter_id)
            .map(|c| c.start)
            .ok_or_else(|| PlayerError::UnknownChapter(chapter_id.to_string()))?;
        self.seek(start, SeekTrigger::Chapter).await
    }

    async fn set_volume(&mut self, volume: f64) -> Result<()> {
        if volume.is_nan() {
            bail!("Volume must be a number");
        }
        let volume = clamp_volume(volume);
        if volume == 0.0 {
            return self.set_mute(true).await;
        }

        let backend = self.backend.as_ref().ok_or(PlayerError::NoMedia)?;
        if self.state.is_muted() {
            self.state.unmute();
            backend.set_muted(false).await?;
        }
        let volume = self.state.request_volume(volume);
        backend.set_volume(volume).await?;
        self.refresh(ControlAspect::Volume);
        Ok(())
    }

    async fn set_mute(&mut self, muted: bool) -> Result<()> {
        if muted == self.state.is_muted() {
            return Ok(());
        }
        let backend = self.backend.as_ref().ok_or(PlayerError::NoMedia)?;
        if muted {
            self.state.mute();
            backend.set_muted(true).await?;
        } else {
            let restored = self.state.unmute();
            backend.set_muted(false).await?;
            backend.set_volume(restored).await?;
        }

        debug!(
            "Mute {} (volume {}, restore to {})",
            if muted { "on" } else { "off" },
            self.state.volume(),
            self.state.last_volume()
        );
        self.refresh(ControlAspect::Volume);
        self.emit(EventType::VolumeChanged, self.volume_payload())
            .await;
        Ok(())
    }

    async fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            bail!("Playback rate must be positive, got {}", rate);
        }
        let backend = self.backend.as_ref().ok_or(PlayerError::NoMedia)?;
        backend.set_playback_rate(rate).await?;
        self.state.set_playback_rate(rate);
        self.refresh(ControlAspect::Rate);
        Ok(())
    }

    async fn change_rate(&mut self, faster: bool) -> Result<f64> {
        let backend = self.backend.as_ref().ok_or(PlayerError::NoMedia)?;
        let mut rates = backend.available_rates();
        rates.sort_by(|a, b| a.total_cmp(b));
        let current = self.state.playback_rate();

        let next = if faster {
            rates.iter().copied().find(|r| *r > current + f64::EPSILON)
        } else {
            rates.iter().rev().copied().find(|r| *r < current - f64::EPSILON)
        };
        match next {
            Some(rate) => {
                self.set_playback_rate(rate).await?;
                Ok(rate)
            }
            None => Ok(current),
        }
    }

    async fn capture_swap(&self, reason: SwapReason) -> SourceSwapContext {
        let prior_elapsed = match self.backend.as_ref() {
            Some(backend) if self.backend_ready => backend.get_elapsed().await,
            _ => self.state.elapsed(),
        };
        SourceSwapContext {
            reason,
            prior_elapsed,
            prior_duration: self.state.duration(),
            prior_playing: self.state.is_playing(),
        }
    }

    async fn begin_swap(&mut self, context: SourceSwapContext) -> Result<(), PlayerError> {
        if let Err(e) = self.swap.begin(context) {
            debug!("{}", e);
            self.emit(
                EventType::SwapIgnored,
                EventPayload::SwapIgnored {
                    reason: context.reason,
                    phase: self.swap.phase(),
                },
            )
            .await;
            return Err(e);
        }

        let playlist_active = self.playlist.is_active();
        self.resolver
            .intents_mut()
            .begin_swap(&context, playlist_active);
        self.emit(
            EventType::SwapStarted,
            EventPayload::Swap {
                reason: context.reason,
                swap_time: context.swap_time(),
            },
        )
        .await;
        Ok(())
    }

    /// Tear down the current backend and load the active source in its place
    async fn perform_swap(&mut self) -> Result<(), PlayerError> {
        self.teardown_backend().await;
        self.swap.torn_down();

        if let Err(e) = self.load_current_source() {
            error!("Source swap failed: {}", e);
            self.swap.abort();
            self.resolver.abandon();
            self.state.halt();
            self.refresh(ControlAspect::All);
            self.emit_error(None, e.to_string()).await;
            return Err(e);
        }
        self.refresh(ControlAspect::Playlist);
        Ok(())
    }

    async fn swap_to_item(&mut self, index: usize, user_initiated: bool) -> Result<()> {
        if index >= self.playlist.len() {
            return Err(PlayerError::PlaylistIndex {
                index,
                len: self.playlist.len(),
            }
            .into());
        }

        let context = self.capture_swap(SwapReason::Playlist { index }).await;
        self.begin_swap(context).await?;
        self.playlist.select(index)?;
        if user_initiated {
            self.resolver.intents_mut().user_clicked_playlist = true;
        }
        self.perform_swap().await?;
        Ok(())
    }

    /// Flip the description or sign preference; swaps sources only when the
    /// active source actually changes
    async fn toggle_alternate(&mut self, reason: SwapReason) -> Result<bool> {
        let (descriptions, sign) = match reason {
            SwapReason::DescriptionToggle => (!self.descriptions_on, self.sign_on),
            SwapReason::SignToggle => (self.descriptions_on, !self.sign_on),
            SwapReason::Playlist { .. } => bail!("Playlist swaps are not toggles"),
        };
        let aspect = match reason {
            SwapReason::SignToggle => ControlAspect::Sign,
            _ => ControlAspect::Descriptions,
        };
        let enabled = match reason {
            SwapReason::SignToggle => sign,
            _ => descriptions,
        };

        let item = self.playlist.current();
        let changes_source =
            item.active_source(descriptions, sign) != item.active_source(self.descriptions_on, self.sign_on);

        if changes_source {
            let context = self.capture_swap(reason).await;
            self.begin_swap(context).await?;
            self.descriptions_on = descriptions;
            self.sign_on = sign;
            self.perform_swap().await?;
        } else {
            self.descriptions_on = descriptions;
            self.sign_on = sign;
        }

        self.refresh(aspect);
        Ok(enabled)
    }

    async fn start_tracking(&mut self) -> Result<()> {
        self.scrub_chapter_offset = if self.config.preferences.use_chapter_times {
            self.playlist
                .current()
                .chapter_at(self.state.elapsed())
                .map(|c| c.start)
                .unwrap_or(0.0)
        } else {
            0.0
        };

        if self.dispatcher.start_tracking(&mut self.state)
            && let Some(backend) = self.backend.as_ref()
        {
            backend.pause().await?;
        }
        self.refresh(ControlAspect::PlayPause);
        Ok(())
    }

    async fn stop_tracking(&mut self, position: f64) -> Result<()> {
        let Some(release) = self
            .dispatcher
            .stop_tracking(position, self.scrub_chapter_offset)
        else {
            return Ok(());
        };

        self.seek(release.seek_to, SeekTrigger::Seekbar).await?;
        if release.resume {
            self.scrub_token += 1;
            let token = self.scrub_token;
            let delay = self.config.playback.scrub_resume_delay();
            let sender = self.self_sender.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(sender) = sender.upgrade() {
                    let _ = sender.send(PlayerCommand::ResumeAfterScrub { token });
                }
            });
        }
        Ok(())
    }

    async fn handle_key(
        &mut self,
        press: KeyPress,
        focus: FocusTarget,
    ) -> Result<Option<PlayerAction>> {
        let prefs = &self.config.preferences;
        let Some(action) = map_key(&press, prefs.modifier_prefs(), focus, prefs.steno_mode) else {
            return Ok(None);
        };
        debug!("Key action {:?}", action);

        match action {
            PlayerAction::TogglePlay => self.toggle_play().await?,
            PlayerAction::Restart => self.seek(0.0, SeekTrigger::Restart).await?,
            PlayerAction::ToggleMute => self.set_mute(!self.state.is_muted()).await?,
            PlayerAction::SetVolume(level) => {
                self.set_volume(f64::from(level).min(VOLUME_MAX)).await?
            }
            PlayerAction::Rewind => {
                let target = self.state.elapsed() - self.config.playback.seek_interval();
                self.seek(target, SeekTrigger::Rewind).await?
            }
            PlayerAction::Forward => {
                let target = self.state.elapsed() + self.config.playback.seek_interval();
                self.seek(target, SeekTrigger::Forward).await?
            }
            PlayerAction::PreviousTrack => {
                if let Some(index) = self.playlist.previous()
                    && self.playlist.is_active()
                {
                    self.swap_to_item(index, true).await?
                }
            }
            PlayerAction::NextTrack => {
                if let Some(index) = self.playlist.next()
                    && self.playlist.is_active()
                {
                    self.swap_to_item(index, true).await?
                }
            }
            PlayerAction::ToggleDescriptions => {
                self.toggle_alternate(SwapReason::DescriptionToggle).await?;
            }
            PlayerAction::Ui(ui) => self.view.on_ui_action(ui),
        }
        Ok(Some(action))
    }

    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.state.clone(),
            generation: self.generation,
            backend_ready: self.backend_ready,
            swap_phase: self.swap.phase(),
            scrub: self.dispatcher.scrub_state(),
            intents: self.resolver.intents().clone(),
            playlist_index: self.playlist.index(),
            playlist_len: self.playlist.len(),
            descriptions: self.descriptions_on,
            sign: self.sign_on,
            swaps_started: self.swap.started(),
            swaps_completed: self.swap.completed(),
            swaps_ignored: self.swap.ignored(),
            resolutions: self.resolver.resolutions(),
        }
    }

    fn refresh(&self, aspect: ControlAspect) {
        self.view.refresh_controls(aspect, &self.state);
    }

    fn playback_payload(&self) -> EventPayload {
        EventPayload::Playback {
            elapsed: self.state.elapsed(),
            duration: self.state.duration(),
        }
    }

    fn volume_payload(&self) -> EventPayload {
        EventPayload::Volume {
            volume: self.state.volume(),
            muted: self.state.is_muted(),
        }
    }

    async fn emit(&self, event_type: EventType, payload: EventPayload) {
        if let Err(e) = self
            .events
            .emit(event_type, payload, self.state.backend())
            .await
        {
            warn!("Failed to publish {}: {}", event_type.as_str(), e);
        }
    }

    async fn emit_error(&self, kind: Option<ErrorKind>, message: String) {
        self.emit(
            EventType::Error,
            EventPayload::Error {
                kind,
                message,
            },
        )
        .await;
    }
}

/// Handle to send commands to the player controller
#[derive(Clone)]
pub struct PlayerHandle {
    sender: mpsc::UnboundedSender<PlayerCommand>,
    events: EventBus,
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("sender", &"<UnboundedSender>")
            .field("subscribers", &self.events.subscriber_count())
            .finish()
    }
}

impl PlayerHandle {
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<PlayerCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = Self {
            sender,
            events: EventBus::new(EVENT_BUS_CAPACITY),
        };
        (handle, receiver)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> PlayerCommand,
    ) -> Result<T> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(command(respond_to))
            .map_err(|_| anyhow!("Player controller disconnected"))?;
        response
            .await
            .map_err(|_| anyhow!("Failed to receive response from player controller"))
    }

    /// Subscribe to player events (ready, playing, paused, ended, errors...)
    pub fn subscribe(&self) -> EventSubscriber {
        self.events.subscribe()
    }

    pub fn subscribe_filtered(&self, filter: EventFilter) -> EventSubscriber {
        self.events.subscribe_filtered(filter)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn play(&self) -> Result<()> {
        self.request(|respond_to| PlayerCommand::Play { respond_to })
            .await?
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|respond_to| PlayerCommand::Pause { respond_to })
            .await?
    }

    pub async fn toggle_play(&self) -> Result<()> {
        self.request(|respond_to| PlayerCommand::TogglePlay { respond_to })
            .await?
    }

    /// Seek to a position in seconds
    pub async fn seek(&self, position: f64) -> Result<()> {
        self.seek_with_trigger(position, SeekTrigger::Api).await
    }

    pub async fn seek_with_trigger(&self, position: f64, trigger: SeekTrigger) -> Result<()> {
        self.request(|respond_to| PlayerCommand::Seek {
            position,
            trigger,
            respond_to,
        })
        .await?
    }

    pub async fn seek_to_chapter(&self, chapter_id: &str) -> Result<()> {
        let chapter_id = chapter_id.to_string();
        self.request(|respond_to| PlayerCommand::SeekToChapter {
            chapter_id,
            respond_to,
        })
        .await?
    }

    pub async fn restart(&self) -> Result<()> {
        self.request(|respond_to| PlayerCommand::Restart { respond_to })
            .await?
    }

    pub async fn rewind(&self) -> Result<()> {
        self.request(|respond_to| PlayerCommand::Rewind { respond_to })
            .await?
    }

    pub async fn forward(&self) -> Result<()> {
        self.request(|respond_to| PlayerCommand::Forward { respond_to })
            .await?
    }

    /// Set volume (0 to 10); 0 mutes
    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        self.request(|respond_to| PlayerCommand::SetVolume { volume, respond_to })
            .await?
    }

    pub async fn set_mute(&self, muted: bool) -> Result<()> {
        self.request(|respond_to| PlayerCommand::SetMute { muted, respond_to })
            .await?
    }

    pub async fn toggle_mute(&self) -> Result<()> {
        self.request(|respond_to| PlayerCommand::ToggleMute { respond_to })
            .await?
    }

    pub async fn set_playback_rate(&self, rate: f64) -> Result<()> {
        self.request(|respond_to| PlayerCommand::SetPlaybackRate { rate, respond_to })
            .await?
    }

    /// Returns the rate now in effect
    pub async fn change_rate(&self, faster: bool) -> Result<f64> {
        self.request(|respond_to| PlayerCommand::ChangeRate { faster, respond_to })
            .await?
    }

    pub async fn next_track(&self) -> Result<()> {
        self.request(|respond_to| PlayerCommand::NextTrack { respond_to })
            .await?
    }

    pub async fn previous_track(&self) -> Result<()> {
        self.request(|respond_to| PlayerCommand::PreviousTrack { respond_to })
            .await?
    }

    pub async fn select_playlist_item(&self, index: usize) -> Result<()> {
        self.request(|respond_to| PlayerCommand::SelectPlaylistItem { index, respond_to })
            .await?
    }

    pub async fn toggle_descriptions(&self) -> Result<bool> {
        self.request(|respond_to| PlayerCommand::ToggleDescriptions { respond_to })
            .await?
    }

    pub async fn toggle_sign(&self) -> Result<bool> {
        self.request(|respond_to| PlayerCommand::ToggleSign { respond_to })
            .await?
    }

    pub async fn set_highlight_transcript(&self, enabled: bool) -> Result<()> {
        self.request(|respond_to| PlayerCommand::SetHighlightTranscript {
            enabled,
            respond_to,
        })
        .await?
    }

    pub async fn start_tracking(&self) -> Result<()> {
        self.request(|respond_to| PlayerCommand::StartTracking { respond_to })
            .await?
    }

    pub async fn tracking(&self, position: f64) -> Result<()> {
        self.request(|respond_to| PlayerCommand::Tracking {
            position,
            respond_to,
        })
        .await?
    }

    pub async fn stop_tracking(&self, position: f64) -> Result<()> {
        self.request(|respond_to| PlayerCommand::StopTracking {
            position,
            respond_to,
        })
        .await?
    }

    pub async fn key_press(
        &self,
        press: KeyPress,
        focus: FocusTarget,
    ) -> Result<Option<PlayerAction>> {
        self.request(|respond_to| PlayerCommand::KeyPress {
            press,
            focus,
            respond_to,
        })
        .await?
    }

    pub async fn snapshot(&self) -> Result<PlayerSnapshot> {
        self.request(|respond_to| PlayerCommand::GetSnapshot { respond_to })
            .await
    }

    pub async fn get_elapsed(&self) -> Result<f64> {
        Ok(self.snapshot().await?.state.elapsed())
    }

    pub async fn get_duration(&self) -> Result<f64> {
        Ok(self.snapshot().await?.state.duration())
    }

    pub async fn get_volume(&self) -> Result<f64> {
        self.request(|respond_to| PlayerCommand::GetVolume { respond_to })
            .await
    }

    pub async fn is_playing(&self) -> Result<bool> {
        Ok(self.snapshot().await?.state.is_playing())
    }

    pub async fn is_muted(&self) -> Result<bool> {
        Ok(self.snapshot().await?.state.is_muted())
    }

    /// Stop the controller and destroy the active backend
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|respond_to| PlayerCommand::Shutdown { respond_to })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::traits::NullView;
    use crate::player::types::MediaItem;

    fn controller() -> PlayerController {
        let item = MediaItem::new("talk", SourceDescriptor::native(["talk.mp4"]));
        let (_handle, controller) = PlayerController::new(PlayerSetup {
            config: Config::default(),
            playlist: Some(Playlist::single(item)),
            factory: BackendFactory::new(),
            view: Arc::new(NullView),
        })
        .unwrap();
        controller
    }

    #[tokio::test]
    async fn test_stale_generation_is_dropped() {
        let mut controller = controller();
        controller.generation = 3;

        controller
            .handle_backend_event(BackendEnvelope {
                generation: 2,
                event: BackendEvent::Playing,
            })
            .await;
        assert!(!controller.state.is_playing());

        controller
            .handle_backend_event(BackendEnvelope {
                generation: 3,
                event: BackendEvent::Playing,
            })
            .await;
        assert!(controller.state.is_playing());
    }

    #[tokio::test]
    async fn test_error_clears_intents_and_halts() {
        let mut controller = controller();
        controller.state.mark_playing();
        controller.resolver.intents_mut().ok_to_play = true;
        controller.resolver.intents_mut().seek_status = SeekStatus::Seeking;
        let mut errors = controller.events.subscribe_to_types(vec![EventType::Error]);

        controller
            .handle_backend_event(BackendEnvelope {
                generation: 0,
                event: BackendEvent::Error(ErrorKind::Network),
            })
            .await;

        assert!(controller.resolver.intents().is_clear());
        assert!(!controller.state.is_playing());
        assert!(controller.state.is_paused());
        let event = errors.recv().await.unwrap();
        assert!(matches!(
            event.payload,
            EventPayload::Error {
                kind: Some(ErrorKind::Network),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_play_without_backend_is_no_media() {
        let mut controller = controller();
        let err = controller.play().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlayerError>(),
            Some(PlayerError::NoMedia)
        ));
    }

    #[tokio::test]
    async fn test_missing_driver_reports_error_and_keeps_running() {
        let (handle, task) = PlayerController::spawn(PlayerSetup {
            config: Config::default(),
            playlist: Some(Playlist::single(MediaItem::new(
                "clip",
                SourceDescriptor::youtube("dQw4w9WgXcQ").unwrap(),
            ))),
            factory: BackendFactory::new(),
            view: Arc::new(NullView),
        })
        .unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert!(!snapshot.backend_ready);
        assert!(snapshot.state.backend().is_none());
        let history = handle.events().get_history().await;
        assert!(history.iter().any(|e| e.event_type == EventType::Error));

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[test]
    fn test_setup_without_media_fails() {
        let result = PlayerController::new(PlayerSetup {
            config: Config::default(),
            playlist: None,
            factory: BackendFactory::new(),
            view: Arc::new(NullView),
        });
        assert!(result.is_err());
    }
}
