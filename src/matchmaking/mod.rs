//! Connection registry, matchmaking and room ownership

pub mod matchmaker;
pub mod registry;
pub mod service;

pub use service::{Lobby, LobbyStats};

use uuid::Uuid;

use crate::game::RoomId;

/// Reasons a lobby operation was not applied.
///
/// None of these are reported to clients; out-of-context requests are
/// dropped after logging.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("Unknown identity: {0}")]
    UnknownIdentity(Uuid),

    #[error("Identity {0} is already in {1}")]
    AlreadyInRoom(Uuid, RoomId),

    #[error("Identity {0} has no active room")]
    NoActiveRoom(Uuid),
}
