//! Collision resolution
//!
//! Turns the contact and sensor events of a physics step into game rules:
//! projectile bounces and hits, death wall kills, pickup consumption and
//! the floating wall overlap count that gates pickups.

use tracing::debug;

use crate::game::constants::pickup::RESPAWN_WAIT;
use crate::game::entity::{EntityRef, ProjectileKey, WallKey, WallType};
use crate::game::match_result::DroneStats;
use crate::game::physics::StepEvents;
use crate::game::state::Env;
use crate::game::systems::{pickup, projectile};

fn resolve(data: Option<u128>) -> Option<EntityRef> {
    data.and_then(EntityRef::decode)
}

/// Apply contact begin events, then contact end events, in step order
pub fn handle_contact_events(env: &mut Env, events: &StepEvents) {
    for &(a, b) in &events.contact_begin {
        let (mut a, b) = (resolve(a), resolve(b));

        match a {
            Some(EntityRef::Projectile(key)) => {
                if projectile_begin_contact(env, key, b) {
                    a = None;
                }
            }
            Some(EntityRef::Wall(wall)) => death_wall_contact(env, wall, b),
            _ => {}
        }
        match b {
            Some(EntityRef::Projectile(key)) => {
                projectile_begin_contact(env, key, a);
            }
            Some(EntityRef::Wall(wall)) => death_wall_contact(env, wall, a),
            _ => {}
        }
    }

    for &(a, b) in &events.contact_end {
        for side in [resolve(a), resolve(b)] {
            if let Some(EntityRef::Projectile(key)) = side {
                projectile_end_contact(env, key);
            }
        }
    }
}

fn death_wall_contact(env: &mut Env, wall: WallKey, other: Option<EntityRef>) {
    let Some(EntityRef::Drone(idx)) = other else {
        return;
    };
    if env.walls.get(wall).is_some_and(|w| w.wall_type == WallType::Death) && env.kill_drone(idx, None) {
        debug!(drone = idx, "Drone touched a death wall");
    }
}

/// Apply bounce and hit rules to a projectile that started touching
/// `other`. Returns true if the projectile was destroyed.
fn projectile_begin_contact(env: &mut Env, key: ProjectileKey, other: Option<EntityRef>) -> bool {
    let Some(projectile) = env.projectiles.get(key) else {
        return false;
    };
    let (owner, weapon) = (projectile.drone_idx, projectile.weapon);

    match other {
        // Projectiles pass freely off each other, including ones already
        // destroyed earlier in this step
        None | Some(EntityRef::Projectile(_)) | Some(EntityRef::Pickup(_)) => return false,
        Some(EntityRef::Wall(wall)) => {
            if env.walls.get(wall).is_some_and(|w| w.wall_type == WallType::Bouncy) {
                return false;
            }
        }
        Some(EntityRef::Drone(hit)) => {
            if hit == owner {
                DroneStats::count(&mut env.stats[hit].own_shots_taken, weapon);
                debug!(drone = hit, "Drone hit by own shot");
            } else {
                if env.kill_drone(hit, Some(owner)) {
                    env.drones[owner].hit_info.killed[hit] = true;
                }
                env.drones[owner].hit_info.shot_hit[hit] = true;
                DroneStats::count(&mut env.stats[owner].shots_hit, weapon);
                DroneStats::count(&mut env.stats[hit].shots_taken, weapon);
                debug!(drone = owner, hit, weapon = ?weapon, "Shot hit");
            }
        }
    }

    let max_bounces = env.weapons.get(weapon).max_bounces;
    let Some(projectile) = env.projectiles.get_mut(key) else {
        return false;
    };
    projectile.bounces = projectile.bounces.saturating_add(1);
    if projectile.bounces >= max_bounces {
        projectile::destroy_projectile(env, key);
        return true;
    }
    false
}

/// Hold a projectile that stopped touching something to its launch speed
fn projectile_end_contact(env: &mut Env, key: ProjectileKey) {
    let Some(projectile) = env.projectiles.get(key) else {
        return;
    };
    let speed = env.weapons.get(projectile.weapon).nominal_speed();
    let dir = env.physics.velocity(projectile.body).normalize();
    if dir.is_zero() {
        return;
    }
    env.physics.set_velocity(projectile.body, dir * speed);
}

/// Apply pickup sensor events in step order
pub fn handle_sensor_events(env: &mut Env, events: &StepEvents) {
    for &(sensor, visitor) in &events.sensor_begin {
        let (Some(EntityRef::Pickup(key)), Some(visitor)) =
            (EntityRef::decode(sensor), EntityRef::decode(visitor))
        else {
            continue;
        };
        let Some(pickup) = env.pickups.get_mut(key) else {
            continue;
        };

        match visitor {
            EntityRef::Wall(_) => {
                pickup.floating_walls_touching = pickup.floating_walls_touching.saturating_add(1);
            }
            EntityRef::Drone(idx) => {
                if !pickup.is_available() || env.drones[idx].dead {
                    continue;
                }
                pickup.respawn_wait = RESPAWN_WAIT;
                let weapon = pickup.weapon;
                if let Some(cell) = pickup.map_cell_idx.take() {
                    env.cells[cell].occupant = None;
                }

                pickup::change_weapon(env, idx, weapon);
                DroneStats::count(&mut env.stats[idx].weapons_picked_up, weapon);
                env.drones[idx].hit_info.picked_up = Some(weapon);
                debug!(drone = idx, weapon = ?weapon, "Weapon picked up");
            }
            EntityRef::Pickup(_) | EntityRef::Projectile(_) => {}
        }
    }

    for &(sensor, visitor) in &events.sensor_end {
        let (Some(EntityRef::Pickup(key)), Some(EntityRef::Wall(_))) =
            (EntityRef::decode(sensor), EntityRef::decode(visitor))
        else {
            continue;
        };
        if let Some(pickup) = env.pickups.get_mut(key) {
            pickup.floating_walls_touching = pickup.floating_walls_touching.saturating_sub(1);
        }
    }
}
