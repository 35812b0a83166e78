use anyhow::{Result, bail};
use async_trait::async_trait;
use mediasync::player::keys::UiAction;
use mediasync::player::platform::{
    ElementEvent, MediaElement, MediaElementProvider, VimeoApi, VimeoEvent, VimeoProvider,
    YouTubeApi, YouTubeEvent, YouTubeProvider, YouTubeState,
};
use mediasync::player::{ControlAspect, DescriptionRequest, PlaybackState, ViewSync};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

const DEFAULT_DURATION: f64 = 120.0;

fn format_call(name: &str, value: impl std::fmt::Display) -> String {
    format!("{}:{}", name, value)
}

struct ElementInner {
    current_time: f64,
    volume: f64,
    muted: bool,
    rate: f64,
    paused: bool,
}

/// Media element that records every call and fires the events a browser would
pub struct FakeElement {
    pub urls: Vec<String>,
    duration: f64,
    seek_events: bool,
    events: mpsc::UnboundedSender<ElementEvent>,
    inner: Mutex<ElementInner>,
    calls: Mutex<Vec<String>>,
}

impl FakeElement {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that move playback: seeks and play requests, in order
    pub fn transport_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c == "play" || c.starts_with("seek:"))
            .collect()
    }

    pub fn emit(&self, event: ElementEvent) {
        let _ = self.events.send(event);
    }

    /// Buffered enough to play through
    pub fn load(&self) {
        self.emit(ElementEvent::LoadedMetadata);
        self.emit(ElementEvent::CanPlayThrough);
    }

    /// Move the playhead as playback would and fire `timeupdate`
    pub fn advance_to(&self, seconds: f64) {
        self.inner.lock().unwrap().current_time = seconds;
        self.emit(ElementEvent::TimeUpdate);
    }

    pub fn finish(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.current_time = self.duration;
            inner.paused = true;
        }
        self.emit(ElementEvent::Pause);
        self.emit(ElementEvent::Ended);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MediaElement for FakeElement {
    async fn play(&self) -> Result<()> {
        self.record("play".to_string());
        self.inner.lock().unwrap().paused = false;
        self.emit(ElementEvent::Play);
        self.emit(ElementEvent::Playing);
        Ok(())
    }

    fn pause(&self) {
        self.record("pause".to_string());
        let was_paused = {
            let mut inner = self.inner.lock().unwrap();
            std::mem::replace(&mut inner.paused, true)
        };
        if !was_paused {
            self.emit(ElementEvent::Pause);
        }
    }

    fn current_time(&self) -> f64 {
        self.inner.lock().unwrap().current_time
    }

    fn set_current_time(&self, seconds: f64) {
        self.record(format_call("seek", seconds));
        self.inner.lock().unwrap().current_time = seconds;
        if self.seek_events {
            self.emit(ElementEvent::Seeking);
            self.emit(ElementEvent::Seeked);
            self.emit(ElementEvent::TimeUpdate);
        }
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn volume(&self) -> f64 {
        self.inner.lock().unwrap().volume
    }

    fn set_volume(&self, volume: f64) {
        self.record(format_call("volume", volume));
        self.inner.lock().unwrap().volume = volume;
        self.emit(ElementEvent::VolumeChange);
    }

    fn muted(&self) -> bool {
        self.inner.lock().unwrap().muted
    }

    fn set_muted(&self, muted: bool) {
        self.record(format_call("muted", muted));
        self.inner.lock().unwrap().muted = muted;
        self.emit(ElementEvent::VolumeChange);
    }

    fn playback_rate(&self) -> f64 {
        self.inner.lock().unwrap().rate
    }

    fn set_playback_rate(&self, rate: f64) {
        self.record(format_call("rate", rate));
        self.inner.lock().unwrap().rate = rate;
        self.emit(ElementEvent::RateChange);
    }

    fn release(&self) {
        self.record("release".to_string());
    }
}

/// Opens fake elements; durations can be set per URL
pub struct FakeElementProvider {
    durations: HashMap<String, f64>,
    seek_events: bool,
    opened: Mutex<Vec<Arc<FakeElement>>>,
}

impl FakeElementProvider {
    pub fn new() -> Self {
        Self {
            durations: HashMap::new(),
            seek_events: true,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn with_duration(mut self, url: &str, duration: f64) -> Self {
        self.durations.insert(url.to_string(), duration);
        self
    }

    /// Seeks never report `seeked`, leaving resolver seeks in flight
    pub fn without_seek_events(mut self) -> Self {
        self.seek_events = false;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn element(&self, index: usize) -> Arc<FakeElement> {
        self.opened.lock().unwrap()[index].clone()
    }

    pub fn latest(&self) -> Arc<FakeElement> {
        self.opened
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no element opened yet")
    }
}

impl MediaElementProvider for FakeElementProvider {
    fn open(
        &self,
        urls: &[String],
        events: mpsc::UnboundedSender<ElementEvent>,
    ) -> Result<Arc<dyn MediaElement>> {
        let duration = urls
            .first()
            .and_then(|url| self.durations.get(url))
            .copied()
            .unwrap_or(DEFAULT_DURATION);
        let element = Arc::new(FakeElement {
            urls: urls.to_vec(),
            duration,
            seek_events: self.seek_events,
            events,
            inner: Mutex::new(ElementInner {
                current_time: 0.0,
                volume: 1.0,
                muted: false,
                rate: 1.0,
                paused: true,
            }),
            calls: Mutex::new(Vec::new()),
        });
        self.opened.lock().unwrap().push(element.clone());
        Ok(element)
    }
}

struct YouTubeInner {
    current_time: f64,
    volume: f64,
    muted: bool,
    playing: bool,
}

/// YouTube iframe player; seeks land immediately (shifted by `seek_offset`)
/// and are seen by the next poll
pub struct FakeYouTube {
    pub video_id: String,
    duration: f64,
    seek_offset: f64,
    time_queries: AtomicUsize,
    events: mpsc::UnboundedSender<YouTubeEvent>,
    inner: Mutex<YouTubeInner>,
    calls: Mutex<Vec<String>>,
}

impl FakeYouTube {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn emit(&self, event: YouTubeEvent) {
        let _ = self.events.send(event);
    }

    pub fn set_time(&self, seconds: f64) {
        self.inner.lock().unwrap().current_time = seconds;
    }

    /// How many times anything read the playhead
    pub fn time_queries(&self) -> usize {
        self.time_queries.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl YouTubeApi for FakeYouTube {
    fn play_video(&self) {
        self.record("play".to_string());
        self.inner.lock().unwrap().playing = true;
        self.emit(YouTubeEvent::StateChange(YouTubeState::Playing));
    }

    fn pause_video(&self) {
        self.record("pause".to_string());
        self.inner.lock().unwrap().playing = false;
        self.emit(YouTubeEvent::StateChange(YouTubeState::Paused));
    }

    fn seek_to(&self, seconds: f64, _allow_seek_ahead: bool) {
        self.record(format_call("seek", seconds));
        self.set_time(seconds + self.seek_offset);
    }

    fn get_current_time(&self) -> f64 {
        self.time_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.lock().unwrap().current_time
    }

    fn get_duration(&self) -> f64 {
        self.duration
    }

    fn get_volume(&self) -> f64 {
        self.inner.lock().unwrap().volume
    }

    fn set_volume(&self, volume: f64) {
        self.record(format_call("volume", volume));
        self.inner.lock().unwrap().volume = volume;
    }

    fn mute(&self) {
        self.record("mute".to_string());
        self.inner.lock().unwrap().muted = true;
    }

    fn unmute(&self) {
        self.record("unmute".to_string());
        self.inner.lock().unwrap().muted = false;
    }

    fn is_muted(&self) -> bool {
        self.inner.lock().unwrap().muted
    }

    fn set_playback_rate(&self, rate: f64) {
        self.record(format_call("rate", rate));
        self.emit(YouTubeEvent::PlaybackRateChange(rate));
    }

    fn get_available_playback_rates(&self) -> Vec<f64> {
        vec![0.25, 0.5, 1.0, 1.5, 2.0]
    }

    fn destroy(&self) {
        self.record("destroy".to_string());
    }
}

pub struct FakeYouTubeProvider {
    seek_offset: f64,
    created: Mutex<Vec<Arc<FakeYouTube>>>,
}

impl FakeYouTubeProvider {
    pub fn new() -> Self {
        Self {
            seek_offset: 0.0,
            created: Mutex::new(Vec::new()),
        }
    }

    /// Seeks land this many seconds away from where they were aimed
    pub fn with_seek_offset(mut self, offset: f64) -> Self {
        self.seek_offset = offset;
        self
    }

    pub fn created(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn latest(&self) -> Arc<FakeYouTube> {
        self.created
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no YouTube player created yet")
    }
}

impl YouTubeProvider for FakeYouTubeProvider {
    fn create(
        &self,
        video_id: &str,
        events: mpsc::UnboundedSender<YouTubeEvent>,
    ) -> Result<Arc<dyn YouTubeApi>> {
        let player = Arc::new(FakeYouTube {
            video_id: video_id.to_string(),
            duration: DEFAULT_DURATION,
            seek_offset: self.seek_offset,
            time_queries: AtomicUsize::new(0),
            events,
            inner: Mutex::new(YouTubeInner {
                current_time: 0.0,
                volume: 100.0,
                muted: false,
                playing: false,
            }),
            calls: Mutex::new(Vec::new()),
        });
        self.created.lock().unwrap().push(player.clone());
        Ok(player)
    }
}

/// Vimeo player; every setter answers and then fires the matching event
pub struct FakeVimeo {
    pub video_id: String,
    events: mpsc::UnboundedSender<VimeoEvent>,
    current_time: Mutex<f64>,
    calls: Mutex<Vec<String>>,
}

impl FakeVimeo {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn emit(&self, event: VimeoEvent) {
        let _ = self.events.send(event);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl VimeoApi for FakeVimeo {
    async fn play(&self) -> Result<()> {
        self.record("play".to_string());
        self.emit(VimeoEvent::Play);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause".to_string());
        self.emit(VimeoEvent::Pause);
        Ok(())
    }

    async fn set_current_time(&self, seconds: f64) -> Result<f64> {
        self.record(format_call("seek", seconds));
        *self.current_time.lock().unwrap() = seconds;
        self.emit(VimeoEvent::Seeked { seconds });
        Ok(seconds)
    }

    async fn get_current_time(&self) -> Result<f64> {
        Ok(*self.current_time.lock().unwrap())
    }

    async fn get_duration(&self) -> Result<f64> {
        Ok(DEFAULT_DURATION)
    }

    async fn set_volume(&self, volume: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&volume) {
            bail!("RangeError: volume out of range");
        }
        self.record(format_call("volume", volume));
        self.emit(VimeoEvent::VolumeChange { volume });
        Ok(volume)
    }

    async fn set_muted(&self, muted: bool) -> Result<bool> {
        self.record(format_call("muted", muted));
        Ok(muted)
    }

    async fn set_playback_rate(&self, rate: f64) -> Result<f64> {
        self.record(format_call("rate", rate));
        self.emit(VimeoEvent::PlaybackRateChange { rate });
        Ok(rate)
    }

    async fn destroy(&self) -> Result<()> {
        self.record("destroy".to_string());
        Ok(())
    }
}

pub struct FakeVimeoProvider {
    created: Mutex<Vec<Arc<FakeVimeo>>>,
}

impl FakeVimeoProvider {
    pub fn new() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn created(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn latest(&self) -> Arc<FakeVimeo> {
        self.created
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no Vimeo player created yet")
    }
}

impl VimeoProvider for FakeVimeoProvider {
    fn create(
        &self,
        video_id: &str,
        events: mpsc::UnboundedSender<VimeoEvent>,
    ) -> Result<Arc<dyn VimeoApi>> {
        let player = Arc::new(FakeVimeo {
            video_id: video_id.to_string(),
            events,
            current_time: Mutex::new(0.0),
            calls: Mutex::new(Vec::new()),
        });
        self.created.lock().unwrap().push(player.clone());
        Ok(player)
    }
}

/// View that records every update it receives
pub struct RecordingView {
    calls: Mutex<Vec<(Instant, String)>>,
    description_pauses: Mutex<HashSet<u64>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            description_pauses: Mutex::new(HashSet::new()),
        }
    }

    /// Ask for a pause when the description view renders second `at`
    pub fn pause_for_description_at(&self, at: u64) {
        self.description_pauses.lock().unwrap().insert(at);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// When each call whose name starts with `prefix` happened
    pub fn timestamps(&self, prefix: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, call)| call.starts_with(prefix))
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.timestamps(prefix).len()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }
}

impl ViewSync for RecordingView {
    fn highlight_transcript(&self, elapsed: f64) {
        self.record(format_call("transcript", elapsed));
    }

    fn update_caption(&self, elapsed: f64) {
        self.record(format_call("caption", elapsed));
    }

    fn show_description(&self, elapsed: f64) -> DescriptionRequest {
        self.record(format_call("description", elapsed));
        if self
            .description_pauses
            .lock()
            .unwrap()
            .contains(&(elapsed as u64))
        {
            DescriptionRequest::Pause
        } else {
            DescriptionRequest::Continue
        }
    }

    fn update_chapter(&self, elapsed: f64) {
        self.record(format_call("chapter", elapsed));
    }

    fn update_meta(&self, elapsed: f64) {
        self.record(format_call("meta", elapsed));
    }

    fn refresh_controls(&self, aspect: ControlAspect, _state: &PlaybackState) {
        self.record(format!("refresh:{:?}", aspect));
    }

    fn clear_backend_caches(&self) {
        self.record("clear_caches".to_string());
    }

    fn on_ui_action(&self, action: UiAction) {
        self.record(format!("ui:{:?}", action));
    }
}
