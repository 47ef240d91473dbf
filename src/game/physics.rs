//! Player movement and bounding-box tests

use super::state::PlayerState;
use super::Input;

/// Movement constants for the arena
#[derive(Debug, Clone, Copy)]
pub struct MovementStats {
    /// Distance moved per tick per pressed direction
    pub step: f32,
    /// Lowest coordinate a player's top-left corner may reach
    pub min_bound: f32,
    /// Highest coordinate a player's bottom-right corner may reach
    pub max_bound: f32,
}

impl Default for MovementStats {
    fn default() -> Self {
        Self {
            step: 0.01,
            min_bound: 0.01,
            max_bound: 0.99,
        }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Aabb {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Strict overlap on both axes; touching edges do not count
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

impl From<&PlayerState> for Aabb {
    fn from(player: &PlayerState) -> Self {
        Self::new(player.x, player.y, player.width, player.height)
    }
}

/// Physics system for updating player positions
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Apply one tick of directional input.
    ///
    /// Each pressed direction moves the player by one step and is clamped
    /// immediately, so opposite directions pressed together cancel out and
    /// the box never leaves `[min_bound, max_bound - size]` on either axis.
    pub fn apply_movement(player: &mut PlayerState, input: &Input, stats: &MovementStats) {
        let max_x = stats.max_bound - player.width;
        let max_y = stats.max_bound - player.height;

        if input.left {
            player.x = (player.x - stats.step).max(stats.min_bound);
        }
        if input.right {
            player.x = (player.x + stats.step).min(max_x);
        }
        if input.up {
            player.y = (player.y - stats.step).max(stats.min_bound);
        }
        if input.down {
            player.y = (player.y + stats.step).min(max_y);
        }
    }
}
