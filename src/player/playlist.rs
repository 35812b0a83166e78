use serde::Serialize;

use super::types::MediaItem;
use crate::utils::errors::PlayerError;

/// What the resolver needs to know about the playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlaylistPosition {
    pub active: bool,
    /// The last item ended and the list does not loop
    pub finished: bool,
    pub looping: bool,
}

impl PlaylistPosition {
    pub fn should_autoplay(&self) -> bool {
        self.active && (!self.finished || self.looping)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    To(usize),
    Stop,
}

#[derive(Debug, Clone)]
pub struct Playlist {
    items: Vec<MediaItem>,
    index: usize,
    looping: bool,
    finished: bool,
}

impl Playlist {
    /// A lone media item; never treated as an active playlist
    pub fn single(item: MediaItem) -> Self {
        Self {
            items: vec![item],
            index: 0,
            looping: false,
            finished: false,
        }
    }

    pub fn new(items: Vec<MediaItem>, looping: bool) -> Result<Self, PlayerError> {
        if items.is_empty() {
            return Err(PlayerError::InvalidConfig(
                "playlist must contain at least one item".to_string(),
            ));
        }
        Ok(Self {
            items,
            index: 0,
            looping,
            finished: false,
        })
    }

    pub fn is_active(&self) -> bool {
        self.items.len() > 1
    }

    pub fn current(&self) -> &MediaItem {
        &self.items[self.index]
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.items.len()
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Where to go when the current item ends
    pub fn on_complete(&mut self) -> Advance {
        match self.next() {
            Some(index) => Advance::To(index),
            None => {
                self.finished = true;
                Advance::Stop
            }
        }
    }

    pub fn next(&self) -> Option<usize> {
        if !self.is_last() {
            Some(self.index + 1)
        } else if self.looping {
            Some(0)
        } else {
            None
        }
    }

    pub fn previous(&self) -> Option<usize> {
        if self.index > 0 {
            Some(self.index - 1)
        } else if self.looping {
            Some(self.items.len() - 1)
        } else {
            None
        }
    }

    pub fn select(&mut self, index: usize) -> Result<(), PlayerError> {
        if index >= self.items.len() {
            return Err(PlayerError::PlaylistIndex {
                index,
                len: self.items.len(),
            });
        }
        self.index = index;
        self.finished = false;
        Ok(())
    }

    pub fn position(&self) -> PlaylistPosition {
        PlaylistPosition {
            active: self.is_active(),
            finished: self.finished,
            looping: self.looping,
        }
    }
}
