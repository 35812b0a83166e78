use super::keys::UiAction;
use super::state::PlaybackState;

/// Which part of the control bar needs repainting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAspect {
    All,
    PlayPause,
    Timeline,
    Volume,
    Rate,
    Descriptions,
    Sign,
    Playlist,
}

/// Answer from the description view after rendering the cue at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptionRequest {
    #[default]
    Continue,
    /// Extended description: hold the media until narration finishes
    Pause,
}

/// View layer driven by the playback core.
///
/// Every time-taking method is a pure view update for that position; none of
/// them may call back into the player. The controller calls them from its own
/// task, in the order documented on [`super::dispatcher::TimeSyncDispatcher`].
pub trait ViewSync: Send + Sync {
    fn highlight_transcript(&self, elapsed: f64);
    fn update_caption(&self, elapsed: f64);
    fn show_description(&self, elapsed: f64) -> DescriptionRequest;
    fn update_chapter(&self, elapsed: f64);
    fn update_meta(&self, elapsed: f64);
    fn refresh_controls(&self, aspect: ControlAspect, state: &PlaybackState);

    /// Drop caption and chapter popups built for the previous backend
    fn clear_backend_caches(&self) {}

    /// Key actions that only concern the view (captions menu, preferences...)
    fn on_ui_action(&self, _action: UiAction) {}
}

/// View that ignores every update; used when the host has no UI attached
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl ViewSync for NullView {
    fn highlight_transcript(&self, _elapsed: f64) {}
    fn update_caption(&self, _elapsed: f64) {}
    fn show_description(&self, _elapsed: f64) -> DescriptionRequest {
        DescriptionRequest::Continue
    }
    fn update_chapter(&self, _elapsed: f64) {}
    fn update_meta(&self, _elapsed: f64) {}
    fn refresh_controls(&self, _aspect: ControlAspect, _state: &PlaybackState) {}
}
