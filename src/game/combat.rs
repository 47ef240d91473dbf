//! Combat system - weapons, projectiles, damage

use serde::{Deserialize, Serialize};

use super::physics::Aabb;
use super::state::PlayerState;
use super::Role;

/// Weapon constants shared by both roles
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Health removed per unshielded hit
    pub damage: i32,
    /// Horizontal distance travelled per tick
    pub projectile_speed: f32,
    /// Projectile hitbox edge length
    pub projectile_size: f32,
    /// Gap between Player2's left edge and its projectile spawn point
    pub rear_spawn_offset: f32,
    /// Projectiles are culled once outside `(-bound_margin, 1 + bound_margin)`
    pub bound_margin: f32,
}

impl Default for WeaponStats {
    fn default() -> Self {
        Self {
            damage: 10,
            projectile_speed: 0.02,
            projectile_size: 0.0125,
            rear_spawn_offset: 0.01,
            bound_margin: 0.1,
        }
    }
}

/// Active projectile in the arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Signed horizontal velocity; positive was fired by Player1
    pub speed: f32,
    pub color: String,
}

impl Projectile {
    /// Fire from the leading edge of `shooter`, vertically centered
    pub fn fire(role: Role, shooter: &PlayerState, stats: &WeaponStats) -> Self {
        let (x, speed) = match role {
            Role::Player1 => (shooter.x + shooter.width, stats.projectile_speed),
            Role::Player2 => (shooter.x - stats.rear_spawn_offset, -stats.projectile_speed),
        };

        Self {
            x,
            y: shooter.y + shooter.height / 2.0 - stats.projectile_size / 2.0,
            width: stats.projectile_size,
            height: stats.projectile_size,
            speed,
            color: shooter.color.clone(),
        }
    }

    /// The role this projectile can damage
    pub fn target(&self) -> Role {
        if self.speed > 0.0 {
            Role::Player2
        } else {
            Role::Player1
        }
    }

    pub fn advance(&mut self) {
        self.x += self.speed;
    }

    pub fn in_bounds(&self, stats: &WeaponStats) -> bool {
        self.x > -stats.bound_margin && self.x < 1.0 + stats.bound_margin
    }

    pub fn hitbox(&self) -> Aabb {
        Aabb::new(self.x, self.y, self.width, self.height)
    }
}

/// Combat system for damage application
pub struct CombatSystem;

impl CombatSystem {
    /// Apply damage to health, returns (new_health, is_depleted)
    pub fn apply_damage(current_health: i32, damage: i32) -> (i32, bool) {
        let new_health = (current_health - damage).max(0);
        (new_health, new_health <= 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player1_fires_from_right_edge() {
        let stats = WeaponStats::default();
        let shooter = PlayerState::spawn(Role::Player1);

        let projectile = Projectile::fire(Role::Player1, &shooter, &stats);

        assert!((projectile.x - 0.1875).abs() < 1e-6);
        assert!((projectile.y - (0.5 + 0.0625 - 0.00625)).abs() < 1e-6);
        assert_eq!(projectile.speed, 0.02);
        assert_eq!(projectile.color, "#00f");
        assert_eq!(projectile.target(), Role::Player2);
    }

    #[test]
    fn test_player2_fires_leftward() {
        let stats = WeaponStats::default();
        let shooter = PlayerState::spawn(Role::Player2);

        let projectile = Projectile::fire(Role::Player2, &shooter, &stats);

        assert!((projectile.x - 0.74).abs() < 1e-6);
        assert_eq!(projectile.speed, -0.02);
        assert_eq!(projectile.color, "#f0f");
        assert_eq!(projectile.target(), Role::Player1);
    }

    #[test]
    fn test_bounds_are_exclusive() {
        let stats = WeaponStats::default();
        let mut projectile = Projectile::fire(Role::Player1, &PlayerState::spawn(Role::Player1), &stats);

        projectile.x = 1.09;
        assert!(projectile.in_bounds(&stats));
        projectile.x = 1.1;
        assert!(!projectile.in_bounds(&stats));
        projectile.x = -0.1;
        assert!(!projectile.in_bounds(&stats));
    }

    #[test]
    fn test_damage_floors_at_zero() {
        assert_eq!(CombatSystem::apply_damage(100, 10), (90, false));
        assert_eq!(CombatSystem::apply_damage(10, 10), (0, true));
        assert_eq!(CombatSystem::apply_damage(5, 10), (0, true));
    }
}
