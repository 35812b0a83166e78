/// Common types used by the backend adapters and the playback core
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::constants::VOLUME_MAX;
use crate::utils::errors::PlayerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Native,
    YouTube,
    Vimeo,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Native => "native",
            BackendKind::YouTube => "youtube",
            BackendKind::Vimeo => "vimeo",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure categories reported by every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Aborted,
    Network,
    Decode,
    Unsupported,
}

impl ErrorKind {
    /// Map a native `MediaError.code`
    pub fn from_media_error_code(code: u16) -> Self {
        match code {
            1 => ErrorKind::Aborted,
            2 => ErrorKind::Network,
            3 => ErrorKind::Decode,
            _ => ErrorKind::Unsupported,
        }
    }

    /// Map a YouTube `onError` code
    pub fn from_youtube_code(code: u16) -> Self {
        match code {
            5 => ErrorKind::Decode,
            2 | 100 | 101 | 150 => ErrorKind::Unsupported,
            _ => ErrorKind::Network,
        }
    }

    /// Map the `name` field of a Vimeo error payload
    pub fn from_vimeo_name(name: &str) -> Self {
        match name {
            "NotFoundError" | "PrivacyError" | "PasswordError" | "UnsupportedError" => {
                ErrorKind::Unsupported
            }
            "RangeError" | "TypeError" | "InvalidTrackError" | "InvalidCuePoint" => {
                ErrorKind::Aborted
            }
            _ => ErrorKind::Network,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Aborted => "aborted",
            ErrorKind::Network => "network",
            ErrorKind::Decode => "decode",
            ErrorKind::Unsupported => "unsupported source",
        };
        f.write_str(label)
    }
}

/// Where a media source lives and which backend plays it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceDescriptor {
    Native { urls: Vec<String> },
    YouTube { video_id: String },
    Vimeo { video_id: String },
}

impl SourceDescriptor {
    pub fn native<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SourceDescriptor::Native {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }

    /// Accepts a bare video id or any of the usual watch/share/embed URLs
    pub fn youtube(input: &str) -> Result<Self, PlayerError> {
        let input = input.trim();
        let id = if input.contains("://") {
            let url = Url::parse(input)
                .map_err(|e| PlayerError::InvalidSource(format!("{}: {}", input, e)))?;
            youtube_id_from_url(&url)
                .ok_or_else(|| PlayerError::InvalidSource(format!("no YouTube id in {}", input)))?
        } else {
            input.to_string()
        };

        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(PlayerError::InvalidSource(format!(
                "malformed YouTube id: {:?}",
                id
            )));
        }
        Ok(SourceDescriptor::YouTube { video_id: id })
    }

    /// Accepts a numeric id, a vimeo.com URL or a player.vimeo.com embed URL
    pub fn vimeo(input: &str) -> Result<Self, PlayerError> {
        let input = input.trim();
        let id = if input.contains("://") {
            let url = Url::parse(input)
                .map_err(|e| PlayerError::InvalidSource(format!("{}: {}", input, e)))?;
            url.path_segments()
                .and_then(|segments| {
                    segments
                        .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
                        .last()
                })
                .map(str::to_string)
                .ok_or_else(|| PlayerError::InvalidSource(format!("no Vimeo id in {}", input)))?
        } else {
            input.to_string()
        };

        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(PlayerError::InvalidSource(format!(
                "malformed Vimeo id: {:?}",
                id
            )));
        }
        Ok(SourceDescriptor::Vimeo { video_id: id })
    }

    /// Pick the backend from the URL host; anything else is a native media URL
    pub fn parse(input: &str) -> Result<Self, PlayerError> {
        let url = Url::parse(input.trim())
            .map_err(|e| PlayerError::InvalidSource(format!("{}: {}", input, e)))?;
        match url.host_str().unwrap_or_default() {
            host if is_youtube_host(host) => Self::youtube(input),
            host if host == "vimeo.com" || host.ends_with(".vimeo.com") => Self::vimeo(input),
            _ => Ok(SourceDescriptor::native([url.to_string()])),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            SourceDescriptor::Native { .. } => BackendKind::Native,
            SourceDescriptor::YouTube { .. } => BackendKind::YouTube,
            SourceDescriptor::Vimeo { .. } => BackendKind::Vimeo,
        }
    }
}

fn is_youtube_host(host: &str) -> bool {
    matches!(
        host,
        "youtu.be"
            | "youtube.com"
            | "www.youtube.com"
            | "m.youtube.com"
            | "youtube-nocookie.com"
            | "www.youtube-nocookie.com"
    )
}

fn youtube_id_from_url(url: &Url) -> Option<String> {
    if url.host_str() == Some("youtu.be") {
        return url
            .path_segments()?
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }

    if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
        return Some(v.into_owned());
    }

    let mut segments = url.path_segments()?;
    match segments.next()? {
        "embed" | "shorts" | "v" | "live" => segments
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Chapter cue reference; the cue list itself is owned by the track loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub start: f64,
    pub end: f64,
}

/// One entry of the player's media: the main source plus its alternates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(default)]
    pub title: String,
    pub source: SourceDescriptor,
    /// Version of the media with audio description mixed in
    #[serde(default)]
    pub described_source: Option<SourceDescriptor>,
    /// Version of the media with sign language burned in
    #[serde(default)]
    pub signed_source: Option<SourceDescriptor>,
    /// Text description tracks are synchronized from 0 and forbid resume-seeks
    #[serde(default)]
    pub has_desc_tracks: bool,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl MediaItem {
    pub fn new(title: impl Into<String>, source: SourceDescriptor) -> Self {
        Self {
            title: title.into(),
            source,
            described_source: None,
            signed_source: None,
            has_desc_tracks: false,
            chapters: Vec::new(),
        }
    }

    pub fn with_described_source(mut self, source: SourceDescriptor) -> Self {
        self.described_source = Some(source);
        self
    }

    pub fn with_signed_source(mut self, source: SourceDescriptor) -> Self {
        self.signed_source = Some(source);
        self
    }

    pub fn with_desc_tracks(mut self, has_desc_tracks: bool) -> Self {
        self.has_desc_tracks = has_desc_tracks;
        self
    }

    pub fn with_chapters(mut self, chapters: Vec<Chapter>) -> Self {
        self.chapters = chapters;
        self
    }

    /// Source to load for the given description/sign preferences.
    /// A described version wins over a signed one when both apply.
    pub fn active_source(&self, descriptions: bool, sign: bool) -> &SourceDescriptor {
        if descriptions && let Some(ref described) = self.described_source {
            return described;
        }
        if sign && let Some(ref signed) = self.signed_source {
            return signed;
        }
        &self.source
    }

    pub fn chapter(&self, id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }

    /// Chapter whose span contains `elapsed`
    pub fn chapter_at(&self, elapsed: f64) -> Option<&Chapter> {
        self.chapters
            .iter()
            .find(|c| elapsed >= c.start && elapsed < c.end)
    }
}

/// Normalized events every backend adapter emits
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Source buffered enough to seek anywhere; once per loaded source
    Ready,
    TimeUpdate { elapsed: f64, duration: f64 },
    DurationChanged(f64),
    Seeked,
    Playing,
    Paused,
    Ended,
    VolumeChanged(f64),
    RateChanged(f64),
    Error(ErrorKind),
}

/// Backend event tagged with the generation of the adapter that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct BackendEnvelope {
    pub generation: u64,
    pub event: BackendEvent,
}

pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, VOLUME_MAX)
    }
}

/// Non-finite durations (NaN before metadata, +inf for live streams) read as 0
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_ids_from_urls() {
        let cases = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
            "dQw4w9WgXcQ",
        ];
        for case in cases {
            assert_eq!(
                SourceDescriptor::youtube(case).unwrap(),
                SourceDescriptor::YouTube {
                    video_id: "dQw4w9WgXcQ".to_string()
                },
                "{}",
                case
            );
        }
    }

    #[test]
    fn test_vimeo_ids_from_urls() {
        for case in [
            "https://vimeo.com/76979871",
            "https://player.vimeo.com/video/76979871",
            "76979871",
        ] {
            assert_eq!(
                SourceDescriptor::vimeo(case).unwrap(),
                SourceDescriptor::Vimeo {
                    video_id: "76979871".to_string()
                }
            );
        }
        assert!(SourceDescriptor::vimeo("https://vimeo.com/channels/staffpicks").is_err());
    }

    #[test]
    fn test_parse_picks_backend_by_host() {
        assert_eq!(
            SourceDescriptor::parse("https://youtu.be/abc123").unwrap().kind(),
            BackendKind::YouTube
        );
        assert_eq!(
            SourceDescriptor::parse("https://vimeo.com/123").unwrap().kind(),
            BackendKind::Vimeo
        );
        assert_eq!(
            SourceDescriptor::parse("https://example.org/talk.mp4")
                .unwrap()
                .kind(),
            BackendKind::Native
        );
        assert!(SourceDescriptor::parse("not a url").is_err());
    }

    #[test]
    fn test_active_source_prefers_described_version() {
        let item = MediaItem::new("talk", SourceDescriptor::native(["talk.mp4"]))
            .with_described_source(SourceDescriptor::native(["talk-ad.mp4"]))
            .with_signed_source(SourceDescriptor::native(["talk-asl.mp4"]));

        assert_eq!(item.active_source(false, false), &item.source);
        assert_eq!(
            item.active_source(true, true),
            item.described_source.as_ref().unwrap()
        );
        assert_eq!(
            item.active_source(false, true),
            item.signed_source.as_ref().unwrap()
        );
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(ErrorKind::from_media_error_code(2), ErrorKind::Network);
        assert_eq!(ErrorKind::from_media_error_code(4), ErrorKind::Unsupported);
        assert_eq!(ErrorKind::from_youtube_code(150), ErrorKind::Unsupported);
        assert_eq!(ErrorKind::from_vimeo_name("PrivacyError"), ErrorKind::Unsupported);
    }

    #[test]
    fn test_clamp_volume() {
        assert_eq!(clamp_volume(-3.0), 0.0);
        assert_eq!(clamp_volume(12.0), 10.0);
        assert_eq!(clamp_volume(f64::NAN), 0.0);
        assert_eq!(finite_or_zero(f64::INFINITY), 0.0);
    }
}
