//! Authoritative simulation state for one room

use serde::{Deserialize, Serialize};

use super::combat::Projectile;
use super::Role;

pub const PLAYER_WIDTH: f32 = 0.0625;
pub const PLAYER_HEIGHT: f32 = 0.125;
pub const START_HEALTH: i32 = 100;
pub const START_Y: f32 = 0.5;

pub const PLAYER1_COLOR: &str = "#00f";
pub const PLAYER2_COLOR: &str = "#f0f";

/// Player state in a room (authoritative)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Left edge, normalized
    pub x: f32,
    /// Top edge, normalized
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: String,
    pub shield_active: bool,
    /// Never reported below zero
    pub health: i32,
}

impl PlayerState {
    /// Spawn a player at the canonical start position for `role`
    pub fn spawn(role: Role) -> Self {
        let (x, color) = match role {
            Role::Player1 => (0.125, PLAYER1_COLOR),
            Role::Player2 => (0.75, PLAYER2_COLOR),
        };

        Self {
            x,
            y: START_Y,
            width: PLAYER_WIDTH,
            height: PLAYER_HEIGHT,
            color: color.to_string(),
            shield_active: false,
            health: START_HEALTH,
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.health <= 0
    }
}

/// Full state of one match, serialized as the tick snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub player1: PlayerState,
    pub player2: PlayerState,
    pub projectiles: Vec<Projectile>,
}

impl SimulationState {
    pub fn new() -> Self {
        Self {
            player1: PlayerState::spawn(Role::Player1),
            player2: PlayerState::spawn(Role::Player2),
            projectiles: Vec::new(),
        }
    }

    pub fn player(&self, role: Role) -> &PlayerState {
        match role {
            Role::Player1 => &self.player1,
            Role::Player2 => &self.player2,
        }
    }

    pub fn player_mut(&mut self, role: Role) -> &mut PlayerState {
        match role {
            Role::Player1 => &mut self.player1,
            Role::Player2 => &mut self.player2,
        }
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new()
    }
}
