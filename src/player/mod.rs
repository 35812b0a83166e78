pub mod controller;
pub mod dispatcher;
pub mod factory;
pub mod intent;
pub mod keys;
pub mod native;
pub mod platform;
pub mod playlist;
pub mod registry;
pub mod resolver;
pub mod state;
pub mod swap;
pub mod traits;
pub mod types;
pub mod vimeo;
pub mod youtube;

pub use controller::{PlayerCommand, PlayerController, PlayerHandle, PlayerSetup, PlayerSnapshot};
pub use factory::{Backend, BackendFactory};
pub use intent::{IntentRecord, PendingIntent, SeekStatus, SeekTrigger};
pub use keys::{FocusTarget, Key, KeyPress, ModifierPrefs, PlayerAction, UiAction};
pub use playlist::{Playlist, PlaylistPosition};
pub use registry::{KeyOrigin, PlayerId, PlayerRegistry};
pub use resolver::{AbandonReason, LoadSeekResolver, Resolution};
pub use state::PlaybackState;
pub use swap::{SwapPhase, SwapReason};
pub use traits::{ControlAspect, DescriptionRequest, NullView, ViewSync};
pub use types::{BackendEvent, BackendKind, Chapter, ErrorKind, MediaItem, SourceDescriptor};
