use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::{
    DEFAULT_SEEK_INTERVAL_SECS, DEFAULT_VOLUME, SCRUB_RESUME_DELAY, VOLUME_MAX,
    YOUTUBE_POLL_INTERVAL,
};
use crate::player::keys::ModifierPrefs;
use crate::player::playlist::Playlist;
use crate::player::types::MediaItem;
use crate::utils::errors::PlayerError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub preferences: PreferencesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Media to load; more than one item makes a playlist
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub playlist: Vec<MediaItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Seconds into the media where the first playback begins
    #[serde(default)]
    pub start_time: f64,

    /// Chapter to start at when no start time is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_chapter: Option<String>,

    /// Rewind/forward step; 10 seconds when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seek_interval: Option<f64>,

    #[serde(default, rename = "loop")]
    pub looping: bool,

    #[serde(default)]
    pub autoplay: bool,

    #[serde(default = "default_volume")]
    pub default_volume: f64,

    #[serde(default = "default_playback_rate")]
    pub playback_rate: f64,

    #[serde(default = "default_poll_interval_ms")]
    pub youtube_poll_interval_ms: u64,

    #[serde(default = "default_scrub_resume_delay_ms")]
    pub scrub_resume_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesConfig {
    #[serde(default = "default_true")]
    pub highlight_transcript: bool,

    /// Prefer the described version of the media
    #[serde(default)]
    pub descriptions: bool,

    /// Prefer the sign-language version of the media
    #[serde(default)]
    pub sign: bool,

    /// Seek bar shows time relative to the current chapter
    #[serde(default)]
    pub use_chapter_times: bool,

    #[serde(default = "default_true")]
    pub modifier_alt: bool,

    #[serde(default = "default_true")]
    pub modifier_ctrl: bool,

    #[serde(default)]
    pub modifier_shift: bool,

    /// Keep shortcuts live inside text areas (stenographer transcription)
    #[serde(default)]
    pub steno_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,

    #[serde(default)]
    pub debug: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let contents = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        config.validate()?;
        info!("Config loaded successfully");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("mediasync").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), PlayerError> {
        let p = &self.playback;
        if !p.start_time.is_finite() || p.start_time < 0.0 {
            return Err(PlayerError::InvalidConfig(format!(
                "start_time must be a non-negative number, got {}",
                p.start_time
            )));
        }
        if let Some(interval) = p.seek_interval
            && (!interval.is_finite() || interval <= 0.0)
        {
            return Err(PlayerError::InvalidConfig(format!(
                "seek_interval must be positive, got {}",
                interval
            )));
        }
        if !(0.0..=VOLUME_MAX).contains(&p.default_volume) {
            return Err(PlayerError::InvalidConfig(format!(
                "default_volume must be within 0..={}, got {}",
                VOLUME_MAX, p.default_volume
            )));
        }
        if !p.playback_rate.is_finite() || p.playback_rate <= 0.0 {
            return Err(PlayerError::InvalidConfig(format!(
                "playback_rate must be positive, got {}",
                p.playback_rate
            )));
        }
        if p.youtube_poll_interval_ms == 0 {
            return Err(PlayerError::InvalidConfig(
                "youtube_poll_interval_ms must be at least 1".to_string(),
            ));
        }
        if let Some(ref chapter) = p.default_chapter
            && !self.playlist.is_empty()
            && !self.playlist.iter().any(|item| item.chapter(chapter).is_some())
        {
            return Err(PlayerError::UnknownChapter(chapter.clone()));
        }
        Ok(())
    }

    /// The configured media as a playlist, or `None` when nothing is configured
    pub fn build_playlist(&self) -> Result<Option<Playlist>, PlayerError> {
        match self.playlist.len() {
            0 => Ok(None),
            1 => Ok(Some(Playlist::single(self.playlist[0].clone()))),
            _ => Playlist::new(self.playlist.clone(), self.playback.looping).map(Some),
        }
    }
}

impl PlaybackConfig {
    pub fn seek_interval(&self) -> f64 {
        self.seek_interval.unwrap_or(DEFAULT_SEEK_INTERVAL_SECS)
    }

    pub fn youtube_poll_interval(&self) -> Duration {
        Duration::from_millis(self.youtube_poll_interval_ms)
    }

    pub fn scrub_resume_delay(&self) -> Duration {
        Duration::from_millis(self.scrub_resume_delay_ms)
    }
}

impl PreferencesConfig {
    pub fn modifier_prefs(&self) -> ModifierPrefs {
        ModifierPrefs {
            alt: self.modifier_alt,
            ctrl: self.modifier_ctrl,
            shift: self.modifier_shift,
        }
    }
}

impl LoggingConfig {
    /// Filter directive handed to the tracing subscriber
    pub fn directive(&self) -> String {
        if self.debug {
            "mediasync=debug".to_string()
        } else {
            self.filter.clone()
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            default_chapter: None,
            seek_interval: None,
            looping: false,
            autoplay: false,
            default_volume: default_volume(),
            playback_rate: default_playback_rate(),
            youtube_poll_interval_ms: default_poll_interval_ms(),
            scrub_resume_delay_ms: default_scrub_resume_delay_ms(),
        }
    }
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            highlight_transcript: default_true(),
            descriptions: false,
            sign: false,
            use_chapter_times: false,
            modifier_alt: default_true(),
            modifier_ctrl: default_true(),
            modifier_shift: false,
            steno_mode: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            debug: false,
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_volume() -> f64 {
    DEFAULT_VOLUME
}
fn default_playback_rate() -> f64 {
    1.0
}
fn default_poll_interval_ms() -> u64 {
    YOUTUBE_POLL_INTERVAL.as_millis() as u64
}
fn default_scrub_resume_delay_ms() -> u64 {
    SCRUB_RESUME_DELAY.as_millis() as u64
}
fn default_log_filter() -> String {
    "mediasync=info".to_string()
}
