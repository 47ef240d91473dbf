//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{Input, Role, RoomId, SimulationState};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Set the display name shown to other players
    Register { name: String },

    /// Ask to be paired with a waiting opponent
    #[serde(alias = "start_game")]
    RequestMatch,

    /// Controls for the current tick
    SubmitInput(Input),

    /// Leave the current room and return to the unready pool
    RestartMatch,

    /// Relay a chat line to every connected player
    ChatMessage { text: String },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// First message on every connection
    IdentityAssigned { id: Uuid },

    /// Every connected player, sent after any registry change
    RosterUpdated { players: Vec<PlayerProfile> },

    /// A room was created for this player
    MatchFound {
        room_id: RoomId,
        role: Role,
        opponent: PlayerProfile,
        player: PlayerProfile,
        state: SimulationState,
    },

    /// Authoritative state after a simulation tick
    Tick { tick: u64, state: SimulationState },

    /// This player took damage
    Hit,

    /// Terminal result for the room
    MatchOver { winner_name: String },

    /// No opponent was available, the request is parked
    Waiting,

    /// The other member left and the room was closed
    OpponentLeft { identity_id: Uuid },

    /// Relayed chat line
    ChatMessage { sender: String, text: String },
}

/// Public view of a connected player
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerProfile {
    pub id: Uuid,
    pub name: String,
    pub ready: bool,
    pub room_id: Option<RoomId>,
}
