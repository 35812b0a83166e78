use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Digit(u8),
    Escape,
    Space,
    Enter,
    Other,
}

impl Key {
    /// Parse a DOM-style `KeyboardEvent.key` value
    pub fn from_name(name: &str) -> Self {
        match name {
            "Escape" | "Esc" => Key::Escape,
            " " | "Spacebar" => Key::Space,
            "Enter" => Key::Enter,
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_digit() => Key::Digit(c as u8 - b'0'),
                    (Some(c), None) => Key::Char(c.to_ascii_lowercase()),
                    _ => Key::Other,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub alt: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub meta: bool,
}

impl KeyPress {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            alt: false,
            ctrl: false,
            shift: false,
            meta: false,
        }
    }

    /// The key held together with exactly the configured modifiers
    pub fn with_modifiers(key: Key, prefs: ModifierPrefs) -> Self {
        Self {
            key,
            alt: prefs.alt,
            ctrl: prefs.ctrl,
            shift: prefs.shift,
            meta: false,
        }
    }
}

/// Modifier combination that must accompany player shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierPrefs {
    pub alt: bool,
    pub ctrl: bool,
    pub shift: bool,
}

impl Default for ModifierPrefs {
    fn default() -> Self {
        Self {
            alt: true,
            ctrl: true,
            shift: false,
        }
    }
}

impl ModifierPrefs {
    pub fn matches(&self, press: &KeyPress) -> bool {
        press.alt == self.alt && press.ctrl == self.ctrl && press.shift == self.shift && !press.meta
    }
}

/// Kind of element holding keyboard focus when the key was pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusTarget {
    #[default]
    Page,
    Button,
    TranscriptSpan,
    PlaylistItem,
    /// Any other element inside the transcript area
    Transcript,
    TextInput,
    TextArea,
    Select,
    ContentEditable,
}

impl FocusTarget {
    /// Elements that consume typed characters themselves
    fn takes_text(self, steno_mode: bool) -> bool {
        match self {
            FocusTarget::TextInput | FocusTarget::Select | FocusTarget::ContentEditable => true,
            FocusTarget::TextArea => !steno_mode,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    TogglePlay,
    Restart,
    ToggleMute,
    SetVolume(u8),
    Rewind,
    Forward,
    PreviousTrack,
    NextTrack,
    ToggleDescriptions,
    Ui(UiAction),
}

/// Key actions handled entirely by the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    ToggleVolumePopup,
    ToggleCaptions,
    OpenPreferences,
    ClosePopups,
    CloseTranscript,
    ActivateFocused,
}

pub fn map_key(
    press: &KeyPress,
    prefs: ModifierPrefs,
    focus: FocusTarget,
    steno_mode: bool,
) -> Option<PlayerAction> {
    if press.key == Key::Escape && focus == FocusTarget::Transcript {
        return Some(PlayerAction::Ui(UiAction::CloseTranscript));
    }
    if focus.takes_text(steno_mode) {
        return None;
    }

    match press.key {
        Key::Escape => Some(PlayerAction::Ui(UiAction::ClosePopups)),
        // Space scrolls the page unless a button has focus
        Key::Space => {
            (focus == FocusTarget::Button).then_some(PlayerAction::Ui(UiAction::ActivateFocused))
        }
        Key::Enter => matches!(
            focus,
            FocusTarget::Button | FocusTarget::TranscriptSpan | FocusTarget::PlaylistItem
        )
        .then_some(PlayerAction::Ui(UiAction::ActivateFocused)),
        Key::Digit(level) if prefs.matches(press) => Some(PlayerAction::SetVolume(level)),
        Key::Char(c) if prefs.matches(press) => match c {
            'p' => Some(PlayerAction::TogglePlay),
            's' => Some(PlayerAction::Restart),
            'm' => Some(PlayerAction::ToggleMute),
            'v' => Some(PlayerAction::Ui(UiAction::ToggleVolumePopup)),
            'c' => Some(PlayerAction::Ui(UiAction::ToggleCaptions)),
            'd' => Some(PlayerAction::ToggleDescriptions),
            'f' => Some(PlayerAction::Forward),
            'r' => Some(PlayerAction::Rewind),
            'b' => Some(PlayerAction::PreviousTrack),
            'n' => Some(PlayerAction::NextTrack),
            'e' => Some(PlayerAction::Ui(UiAction::OpenPreferences)),
            _ => None,
        },
        _ => None,
    }
}
