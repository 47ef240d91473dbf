//! Connected identities and their transient profile

use std::collections::HashMap;
use uuid::Uuid;

use crate::game::RoomId;
use crate::ws::protocol::PlayerProfile;

use super::LobbyError;

/// A connected participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    /// Waiting for an opponent
    pub ready: bool,
    pub room: Option<RoomId>,
    /// Registration order, used to pick the first eligible opponent
    pub seq: u64,
}

impl Identity {
    /// Ready and not yet placed in a room
    pub fn is_waiting(&self) -> bool {
        self.ready && self.room.is_none()
    }

    pub fn profile(&self) -> PlayerProfile {
        PlayerProfile {
            id: self.id,
            name: self.name.clone(),
            ready: self.ready,
            room_id: self.room,
        }
    }
}

/// Registry of connected identities
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    identities: HashMap<Uuid, Identity>,
    next_seq: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly connected identity with a default `Player{n}` name
    pub fn connect(&mut self, id: Uuid) -> &Identity {
        self.next_seq += 1;
        let name = format!("Player{}", self.identities.len() + 1);
        let seq = self.next_seq;

        self.identities.entry(id).or_insert(Identity {
            id,
            name,
            ready: false,
            room: None,
            seq,
        })
    }

    /// Rename an identity; renaming to the current name is a no-op change
    pub fn register(&mut self, id: &Uuid, name: String) -> Result<(), LobbyError> {
        self.get_mut(id)?.name = name;
        Ok(())
    }

    pub fn set_ready(&mut self, id: &Uuid) -> Result<(), LobbyError> {
        self.get_mut(id)?.ready = true;
        Ok(())
    }

    pub fn clear_ready(&mut self, id: &Uuid) -> Result<(), LobbyError> {
        self.get_mut(id)?.ready = false;
        Ok(())
    }

    /// Seat an identity in a room; a seated identity is never ready
    pub fn assign_room(&mut self, id: &Uuid, room: RoomId) -> Result<(), LobbyError> {
        let identity = self.get_mut(id)?;
        identity.room = Some(room);
        identity.ready = false;
        Ok(())
    }

    /// Return an identity to the unready pool; no-op if it has disconnected
    pub fn leave_room(&mut self, id: &Uuid) {
        if let Some(identity) = self.identities.get_mut(id) {
            identity.room = None;
            identity.ready = false;
        }
    }

    /// Remove an identity; `None` if it was already gone
    pub fn remove(&mut self, id: &Uuid) -> Option<Identity> {
        self.identities.remove(id)
    }

    pub fn get(&self, id: &Uuid) -> Result<&Identity, LobbyError> {
        self.identities
            .get(id)
            .ok_or(LobbyError::UnknownIdentity(*id))
    }

    fn get_mut(&mut self, id: &Uuid) -> Result<&mut Identity, LobbyError> {
        self.identities
            .get_mut(id)
            .ok_or(LobbyError::UnknownIdentity(*id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.values()
    }

    /// Public profile of every connected identity, each exactly once
    pub fn roster(&self) -> Vec<PlayerProfile> {
        self.identities.values().map(Identity::profile).collect()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.identities.values().filter(|i| i.is_waiting()).count()
    }
}
