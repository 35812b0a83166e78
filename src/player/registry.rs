use anyhow::Result;
use std::fmt;
use tracing::{debug, trace};
use uuid::Uuid;

use super::controller::PlayerHandle;
use super::keys::{FocusTarget, KeyPress, PlayerAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a key press was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Document-level listener
    Page,
    /// Listener on one player's container
    Player(PlayerId),
}

/// Players living on one page.
///
/// With a single player, key presses are handled at page level so shortcuts
/// work wherever focus is. With several, each player only reacts to keys
/// pressed inside its own container.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Vec<(PlayerId, PlayerHandle)>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: PlayerHandle) -> PlayerId {
        let id = PlayerId::new();
        self.players.push((id, handle));
        debug!("Registered player {} ({} on page)", id, self.players.len());
        id
    }

    pub fn unregister(&mut self, id: PlayerId) -> Option<PlayerHandle> {
        let position = self.players.iter().position(|(pid, _)| *pid == id)?;
        let (_, handle) = self.players.remove(position);
        debug!("Unregistered player {} ({} on page)", id, self.players.len());
        Some(handle)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerHandle> {
        self.players
            .iter()
            .find(|(pid, _)| *pid == id)
            .map(|(_, handle)| handle)
    }

    pub fn route(&self, origin: KeyOrigin) -> Option<&PlayerHandle> {
        match origin {
            KeyOrigin::Page if self.players.len() == 1 => self.players.first().map(|(_, h)| h),
            KeyOrigin::Player(id) if self.players.len() > 1 => self.get(id),
            _ => None,
        }
    }

    /// Deliver a key press to the player it belongs to, if any
    pub async fn dispatch_key(
        &self,
        origin: KeyOrigin,
        press: KeyPress,
        focus: FocusTarget,
    ) -> Result<Option<PlayerAction>> {
        match self.route(origin) {
            Some(handle) => handle.key_press(press, focus).await,
            None => {
                trace!("No player handles key press from {:?}", origin);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::controller::PlayerHandle;

    #[test]
    fn test_page_keys_route_to_single_player() {
        let mut registry = PlayerRegistry::new();
        let (first, _rx1) = PlayerHandle::detached();
        let id = registry.register(first);

        assert!(registry.route(KeyOrigin::Page).is_some());
        assert!(registry.route(KeyOrigin::Player(id)).is_none());

        let (second, _rx2) = PlayerHandle::detached();
        let other = registry.register(second);
        assert!(registry.route(KeyOrigin::Page).is_none());
        assert!(registry.route(KeyOrigin::Player(id)).is_some());
        assert!(registry.route(KeyOrigin::Player(other)).is_some());
    }

    #[test]
    fn test_unregister_restores_page_routing() {
        let mut registry = PlayerRegistry::new();
        let (a, _rx1) = PlayerHandle::detached();
        let (b, _rx2) = PlayerHandle::detached();
        let a_id = registry.register(a);
        registry.register(b);

        assert!(registry.unregister(a_id).is_some());
        assert!(registry.unregister(a_id).is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.route(KeyOrigin::Page).is_some());
        assert!(registry.route(KeyOrigin::Player(a_id)).is_none());
    }

    #[tokio::test]
    async fn test_unrouted_key_is_ignored() {
        let registry = PlayerRegistry::new();
        let action = registry
            .dispatch_key(
                KeyOrigin::Page,
                KeyPress::new(crate::player::keys::Key::Char('p')),
                FocusTarget::Page,
            )
            .await
            .unwrap();
        assert_eq!(action, None);
    }
}
