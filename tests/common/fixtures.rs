use mediasync::player::{Chapter, MediaItem, Playlist, SourceDescriptor};

pub const TALK_URL: &str = "https://media.example.org/talk.mp4";
pub const TALK_DESCRIBED_URL: &str = "https://media.example.org/talk-described.mp4";
pub const TALK_SIGNED_URL: &str = "https://media.example.org/talk-signed.mp4";

pub fn talk() -> MediaItem {
    MediaItem::new("Talk", SourceDescriptor::native([TALK_URL]))
        .with_described_source(SourceDescriptor::native([TALK_DESCRIBED_URL]))
        .with_signed_source(SourceDescriptor::native([TALK_SIGNED_URL]))
        .with_chapters(vec![
            Chapter {
                id: "intro".to_string(),
                title: "Introduction".to_string(),
                start: 0.0,
                end: 30.0,
            },
            Chapter {
                id: "demo".to_string(),
                title: "Demo".to_string(),
                start: 30.0,
                end: 90.0,
            },
        ])
}

pub fn track(n: usize) -> MediaItem {
    MediaItem::new(
        format!("Track {}", n),
        SourceDescriptor::native([format!("https://media.example.org/track-{}.mp3", n)]),
    )
}

pub fn three_tracks(looping: bool) -> Playlist {
    Playlist::new(vec![track(1), track(2), track(3)], looping).expect("non-empty playlist")
}

pub fn youtube_clip() -> MediaItem {
    MediaItem::new("Clip", SourceDescriptor::youtube("dQw4w9WgXcQ").expect("valid id"))
}

pub fn vimeo_clip() -> MediaItem {
    MediaItem::new("Clip", SourceDescriptor::vimeo("76979871").expect("valid id"))
}

/// YouTube clip whose described version is hosted on Vimeo
pub fn youtube_clip_described_on_vimeo() -> MediaItem {
    youtube_clip().with_described_source(SourceDescriptor::vimeo("76979871").expect("valid id"))
}
