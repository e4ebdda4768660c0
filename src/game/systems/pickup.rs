//! Weapon pickups
//!
//! Weapon changes and the respawn cycle of consumed pickups.

use tracing::{debug, warn};

use crate::game::constants::physics::DELTA_TIME;
use crate::game::entity::{CellOccupant, PickupKey, SpawnKind};
use crate::game::spatial;
use crate::game::state::Env;
use crate::game::weapons::WeaponType;

/// Arm drone `idx` with `weapon` and full ammo. Switching to a different
/// weapon also resets cooldown, charge and heat.
pub fn change_weapon(env: &mut Env, idx: usize, weapon: WeaponType) {
    let ammo = env.weapons.max_ammo(env.default_weapon, weapon);
    let drone = &mut env.drones[idx];
    if drone.weapon != weapon {
        drone.weapon_cooldown = 0.0;
        drone.weapon_charge = 0;
        drone.heat = 0;
    }
    drone.weapon = weapon;
    drone.ammo = ammo;
}

/// Count down consumed pickups and respawn those whose wait is over
pub fn pickups_step(env: &mut Env) {
    let keys: Vec<PickupKey> = env.pickups.keys().collect();
    for key in keys {
        let Some(pickup) = env.pickups.get_mut(key) else {
            continue;
        };
        if pickup.respawn_wait == 0.0 {
            continue;
        }
        pickup.respawn_wait = (pickup.respawn_wait - DELTA_TIME).max(0.0);
        if pickup.respawn_wait == 0.0 {
            respawn_pickup(env, key);
        }
    }
}

/// Move a pickup to a fresh open cell with a new weapon, or remove it when
/// no cell is left
fn respawn_pickup(env: &mut Env, key: PickupKey) {
    let Some(pos) = spatial::find_open_pos(env, SpawnKind::WeaponPickup) else {
        warn!("No open position to respawn weapon pickup, removing it");
        env.destroy_pickup(key);
        return;
    };

    let weapon = env.weapons.random_pickup_weapon(&mut env.rng, env.default_weapon);
    let cell_idx = env.grid.cell_idx(pos);
    let Some(pickup) = env.pickups.get_mut(key) else {
        return;
    };
    let old_cell = pickup.map_cell_idx;
    pickup.weapon = weapon;
    pickup.pos = pos;
    pickup.map_cell_idx = cell_idx;
    let body = pickup.body;

    if let Some(old) = old_cell {
        if env.cells[old].occupant == Some(CellOccupant::Pickup(key)) {
            env.cells[old].occupant = None;
        }
    }
    if let Some(idx) = cell_idx {
        env.cells[idx].occupant = Some(CellOccupant::Pickup(key));
    }
    env.physics.set_position(body, pos);
    debug!(x = pos.x, y = pos.y, weapon = ?weapon, "Weapon pickup respawned");
}
