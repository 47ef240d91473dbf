//! Fixed-timestep simulation step

use super::combat::{CombatSystem, Projectile, WeaponStats};
use super::physics::{Aabb, MovementStats, PhysicsSystem};
use super::state::SimulationState;
use super::{InputBuffer, Role};

/// Tuning shared by every room
#[derive(Debug, Clone, Copy, Default)]
pub struct ArenaRules {
    pub movement: MovementStats,
    pub weapon: WeaponStats,
}

/// Outcome of a tick that the room must relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// An unshielded player took damage
    Hit { target: Role, health: i32 },
    /// A player's health reached zero during this tick
    Depleted { role: Role },
}

impl SimulationState {
    /// Advance the simulation by one tick.
    ///
    /// Inputs are applied Player1 first. A role without a buffered input
    /// does not move, does not fire, and has its shield lowered.
    pub fn step(&mut self, inputs: &InputBuffer, rules: &ArenaRules) -> Vec<SimEvent> {
        for role in Role::ALL {
            match inputs.get(role) {
                Some(input) => {
                    let player = self.player_mut(role);
                    PhysicsSystem::apply_movement(player, input, &rules.movement);
                    player.shield_active = input.shield;

                    if input.action {
                        let projectile = Projectile::fire(role, self.player(role), &rules.weapon);
                        self.projectiles.push(projectile);
                    }
                }
                None => self.player_mut(role).shield_active = false,
            }
        }

        for projectile in &mut self.projectiles {
            projectile.advance();
        }
        self.projectiles.retain(|p| p.in_bounds(&rules.weapon));

        self.resolve_collisions(&rules.weapon)
    }

    /// Resolve every projectile against the player it targets
    fn resolve_collisions(&mut self, weapon: &WeaponStats) -> Vec<SimEvent> {
        let mut events = Vec::new();
        let in_flight = std::mem::take(&mut self.projectiles);

        for projectile in in_flight {
            let role = projectile.target();
            let target = self.player_mut(role);

            if !projectile.hitbox().overlaps(&Aabb::from(&*target)) {
                self.projectiles.push(projectile);
                continue;
            }

            // Shielded targets still absorb the projectile
            if target.shield_active {
                continue;
            }

            let was_standing = !target.is_depleted();
            let (health, depleted) = CombatSystem::apply_damage(target.health, weapon.damage);
            target.health = health;

            events.push(SimEvent::Hit { target: role, health });
            if depleted && was_standing {
                events.push(SimEvent::Depleted { role });
            }
        }

        events
    }
}
