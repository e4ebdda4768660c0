//! Drone system
//!
//! Decodes agent actions into movement and fire commands and runs the
//! per-frame weapon counter decay.

use crate::game::constants::{drone, physics::DELTA_TIME};
use crate::game::state::Env;
use crate::game::systems::projectile::{self, ProjectileEvent};
use crate::util::vec2::Vec2;

/// One agent's input for a frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Action {
    /// Movement direction, each component in [-1, 1]
    pub move_dir: Vec2,
    /// Normalized aim, or zero to keep the last aim
    pub aim: Vec2,
    pub fire: bool,
}

impl Action {
    /// Decode `[move_x, move_y, aim_x, aim_y, fire]`
    pub fn decode(raw: &[f32]) -> Self {
        debug_assert!(raw.len() >= drone::ACTION_SIZE);
        let axis = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) };

        Self {
            move_dir: Vec2::new(axis(raw[0]), axis(raw[1])),
            aim: Vec2::new(axis(raw[2]), axis(raw[3])).normalize(),
            fire: raw[4] > 0.0,
        }
    }

    pub fn encode(&self, out: &mut [f32]) {
        debug_assert!(out.len() >= drone::ACTION_SIZE);
        out[0] = self.move_dir.x;
        out[1] = self.move_dir.y;
        out[2] = self.aim.x;
        out[3] = self.aim.y;
        out[4] = if self.fire { 1.0 } else { 0.0 };
    }
}

/// Apply one frame of input to drone `idx`. Dead drones drift.
pub fn apply_action(env: &mut Env, idx: usize, action: Action) -> Option<ProjectileEvent> {
    let body = env.drones[idx].body;
    if env.drones[idx].dead {
        env.physics.set_force(body, Vec2::ZERO);
        return None;
    }

    env.physics.set_force(body, action.move_dir * drone::MOVE_MAGNITUDE);
    env.drones[idx].last_move = action.move_dir;

    let event = if action.fire {
        projectile::drone_shoot(env, idx, action.aim)
    } else {
        None
    };
    if !action.aim.is_zero() {
        env.drones[idx].last_aim = action.aim;
    }
    event
}

/// Decay weapon counters and accumulate distance traveled
pub fn drone_step(env: &mut Env, idx: usize) {
    let pos = env.drone_pos(idx);
    let drone = &mut env.drones[idx];

    drone.weapon_cooldown = (drone.weapon_cooldown - DELTA_TIME).max(0.0);
    if drone.shot_this_step {
        drone.shot_this_step = false;
    } else {
        drone.weapon_charge = drone.weapon_charge.saturating_sub(1);
        drone.heat = drone.heat.saturating_sub(1);
    }

    env.stats[idx].distance_traveled += drone.last_pos.distance_to(pos);
    drone.last_pos = pos;
}
