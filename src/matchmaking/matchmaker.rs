//! Opponent selection

use uuid::Uuid;

use super::registry::ConnectionRegistry;
use super::LobbyError;

/// Two identities to seat in a new room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    /// The opponent that was already waiting
    pub player1: Uuid,
    /// The identity whose request completed the pair
    pub player2: Uuid,
}

/// Outcome of a match request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    Paired(Pairing),
    /// Nobody eligible; park the requester as ready
    Wait,
}

pub struct Matchmaker;

impl Matchmaker {
    /// Decide what a match request from `requester` should do.
    ///
    /// The caller must hold the registry exclusively from this decision until
    /// the pairing is applied so that no other request can claim the same
    /// opponent.
    pub fn decide(registry: &ConnectionRegistry, requester: &Uuid) -> Result<MatchDecision, LobbyError> {
        let identity = registry.get(requester)?;
        if let Some(room) = identity.room {
            return Err(LobbyError::AlreadyInRoom(*requester, room));
        }

        Ok(match Self::find_opponent(registry, requester) {
            Some(opponent) => MatchDecision::Paired(Pairing {
                player1: opponent,
                player2: *requester,
            }),
            None => MatchDecision::Wait,
        })
    }

    /// First waiting identity in registration order, excluding the requester
    pub fn find_opponent(registry: &ConnectionRegistry, requester: &Uuid) -> Option<Uuid> {
        registry
            .iter()
            .filter(|identity| identity.id != *requester && identity.is_waiting())
            .min_by_key(|identity| identity.seq)
            .map(|identity| identity.id)
    }
}
