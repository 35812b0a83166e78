// Timing and tolerance constants shared by the playback core
// All tuning-related constants in one place for easy adjustment

use std::time::Duration;

// === Backend polling ===
// YouTube has no time-update event; the adapter polls at this rate
pub const YOUTUBE_POLL_INTERVAL: Duration = Duration::from_millis(300);

// A polled YouTube position within this many seconds of a seek target counts as arrived
pub const SEEK_ARRIVAL_TOLERANCE_SECS: f64 = 0.5;

// A YouTube seek the poller never sees land is settled after this long
pub const SEEK_ARRIVAL_TIMEOUT: Duration = Duration::from_secs(3);

// === Seek bar ===
// Delay between releasing the seek bar and resuming playback
pub const SCRUB_RESUME_DELAY: Duration = Duration::from_millis(200);

// === Source swaps ===
// Rounded durations this far apart still allow resuming at the saved position
pub const DURATION_TOLERANCE_SECS: f64 = 1.0;

// Positions closer than this are treated as the same point in the media
pub const SAME_POSITION_EPSILON: f64 = 0.001;

// === Volume ===
// Common volume scale used by every backend adapter
pub const VOLUME_MAX: f64 = 10.0;
pub const DEFAULT_VOLUME: f64 = 7.0;

// === Seeking ===
pub const DEFAULT_SEEK_INTERVAL_SECS: f64 = 10.0;

// === Playback rate ===
pub const NATIVE_PLAYBACK_RATES: &[f64] = &[0.5, 0.75, 1.0, 1.25, 1.5, 2.0, 2.5, 3.0];
pub const VIMEO_PLAYBACK_RATES: &[f64] = &[0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

// === Event bus ===
pub const EVENT_BUS_CAPACITY: usize = 256;
pub const EVENT_HISTORY_SIZE: usize = 100;
