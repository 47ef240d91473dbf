//! Game simulation modules

pub mod combat;
pub mod physics;
pub mod room;
pub mod simulation;
pub mod snapshot;
pub mod state;

pub use room::{Room, RoomHandle, RoomId, RoomMember};
pub use state::SimulationState;

use serde::{Deserialize, Serialize};

/// Seat a member occupies in a room, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Left side, fires rightward
    Player1,
    /// Right side, fires leftward
    Player2,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Player1, Role::Player2];

    pub fn opponent(self) -> Self {
        match self {
            Role::Player1 => Role::Player2,
            Role::Player2 => Role::Player1,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Role::Player1 => 0,
            Role::Player2 => 1,
        }
    }
}

/// Input state for a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Input {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    /// Fire a projectile this tick
    pub action: bool,
    /// Shield is active for this tick only
    pub shield: bool,
}

/// Last input received per role during the current tick.
///
/// A newer submission overwrites the older one; nothing is queued. The
/// buffer is drained once per tick.
#[derive(Debug, Clone, Default)]
pub struct InputBuffer {
    slots: [Option<Input>; 2],
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `input` for `role`, replacing anything buffered this tick
    pub fn submit(&mut self, role: Role, input: Input) {
        self.slots[role.index()] = Some(input);
    }

    pub fn get(&self, role: Role) -> Option<&Input> {
        self.slots[role.index()].as_ref()
    }

    /// Take this tick's inputs, leaving the buffer empty
    pub fn drain(&mut self) -> InputBuffer {
        std::mem::take(self)
    }
}
