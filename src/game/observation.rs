//! Observation encoder
//!
//! Serializes the arena into one fixed-size `f32` buffer per agent:
//!
//! ```text
//! | scalars | drone blocks | projectile slots | floating wall slots | map cells |
//! ```
//!
//! Offsets come from [`ObsLayout`], computed once per drone count. A
//! canonical buffer is built first; each agent's buffer is a copy with the
//! drone blocks rotated so its own drone comes first, and with drones
//! marked on the map as self or enemy.

use crate::game::constants::{map::MAX_CELLS, map::MAX_COLUMNS, obs, round};
use crate::game::entity::CellOccupant;
use crate::game::state::Env;
use crate::game::systems::arena;
use crate::game::weapons::NUM_WEAPONS;
use crate::util::vec2::Vec2;

/// Map cell codes
pub mod cell_code {
    pub const EMPTY: f32 = 0.0;
    /// Static wall codes are `WALL + wall type`
    pub const WALL: f32 = 1.0;
    /// Pickup codes are `PICKUP + weapon index`
    pub const PICKUP: f32 = 4.0;
    pub const SELF: f32 = 9.0;
    pub const ENEMY: f32 = 10.0;
}

const NUM_WALL_TYPES: usize = 3;

/// Offsets of every region in one agent's observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObsLayout {
    pub num_drones: usize,
    scalars: usize,
    drones: usize,
    projectiles: usize,
    floating_walls: usize,
    map: usize,
    total: usize,
}

impl ObsLayout {
    pub fn new(num_drones: usize) -> Self {
        let scalars = 0;
        let drones = scalars + obs::SCALAR_SIZE;
        let projectiles = drones + num_drones * obs::DRONE_SIZE;
        let floating_walls = projectiles + obs::NUM_PROJECTILES * obs::PROJECTILE_SIZE;
        let map = floating_walls + obs::NUM_FLOATING_WALLS * obs::FLOATING_WALL_SIZE;
        Self {
            num_drones,
            scalars,
            drones,
            projectiles,
            floating_walls,
            map,
            total: map + MAX_CELLS,
        }
    }

    /// Floats in one agent's observation
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn scalars(&self) -> std::ops::Range<usize> {
        self.scalars..self.scalars + obs::SCALAR_SIZE
    }

    /// Drone block at `slot`; slot 0 is the observing agent's own drone
    pub fn drone_block(&self, slot: usize) -> std::ops::Range<usize> {
        debug_assert!(slot < self.num_drones);
        let start = self.drones + slot * obs::DRONE_SIZE;
        start..start + obs::DRONE_SIZE
    }

    pub fn projectile_slot(&self, slot: usize) -> std::ops::Range<usize> {
        debug_assert!(slot < obs::NUM_PROJECTILES);
        let start = self.projectiles + slot * obs::PROJECTILE_SIZE;
        start..start + obs::PROJECTILE_SIZE
    }

    pub fn floating_wall_slot(&self, slot: usize) -> std::ops::Range<usize> {
        debug_assert!(slot < obs::NUM_FLOATING_WALLS);
        let start = self.floating_walls + slot * obs::FLOATING_WALL_SIZE;
        start..start + obs::FLOATING_WALL_SIZE
    }

    pub fn map(&self) -> std::ops::Range<usize> {
        self.map..self.total
    }

    /// Offset of map cell `(col, row)`, laid out on the largest grid so the
    /// size never depends on the map being played
    #[inline]
    pub fn map_cell(&self, col: usize, row: usize) -> usize {
        self.map + row * MAX_COLUMNS + col
    }
}

/// Scale `v` to [0, 1] by `max`. Symmetric scaling maps [-max, max];
/// otherwise [0, max]. Returns 0 when `max` is not positive.
#[inline]
pub fn scale_value(v: f32, max: f32, min_is_zero: bool) -> f32 {
    if max <= 0.0 || v.is_nan() {
        return 0.0;
    }
    let scaled = if min_is_zero { v / max } else { (v + max) / (max * 2.0) };
    scaled.clamp(0.0, 1.0)
}

#[inline]
fn scale_pos(pos: Vec2) -> [f32; 2] {
    [
        scale_value(pos.x, obs::MAX_POS, false),
        scale_value(pos.y, obs::MAX_POS, false),
    ]
}

#[inline]
fn scale_vel(vel: Vec2) -> [f32; 2] {
    [
        scale_value(vel.x, obs::MAX_SPEED, false),
        scale_value(vel.y, obs::MAX_SPEED, false),
    ]
}

#[inline]
fn type_id(idx: usize, count: usize) -> f32 {
    (idx + 1) as f32 / count as f32
}

/// Rewrite every agent's observation buffer from the current world
pub fn compute_observations(env: &mut Env) {
    env.refresh_positions();

    let layout = env.layout;
    let mut canonical = vec![0.0; layout.total()];
    encode_scalars(env, &mut canonical[layout.scalars()]);
    for idx in 0..env.drones.len() {
        encode_drone(env, idx, &mut canonical[layout.drone_block(idx)]);
    }
    encode_projectiles(env, &layout, &mut canonical);
    encode_floating_walls(env, &layout, &mut canonical);
    encode_map(env, &layout, &mut canonical);

    // Occupied map cell of every live drone
    let drone_cells: Vec<Option<usize>> = env
        .drones
        .iter()
        .map(|drone| {
            if drone.dead {
                return None;
            }
            let idx = env.grid.cell_idx(drone.pos.pos)?;
            match env.cells[idx].occupant {
                Some(CellOccupant::Wall(_)) => None,
                _ => {
                    let (col, row) = env.grid.coords(idx);
                    Some(layout.map_cell(col, row))
                }
            }
        })
        .collect();

    let num_drones = env.drones.len();
    let size = layout.total();
    for (agent, buf) in env.observations.chunks_exact_mut(size).enumerate() {
        buf.copy_from_slice(&canonical);
        for slot in 0..num_drones {
            let drone = (agent + slot) % num_drones;
            buf[layout.drone_block(slot)].copy_from_slice(&canonical[layout.drone_block(drone)]);
        }

        for (drone, cell) in drone_cells.iter().enumerate() {
            if let Some(offset) = *cell {
                if drone != agent {
                    buf[offset] = cell_code::ENEMY;
                }
            }
        }
        if let Some(offset) = drone_cells.get(agent).copied().flatten() {
            buf[offset] = cell_code::SELF;
        }
    }
}

fn encode_scalars(env: &Env, out: &mut [f32]) {
    let clock = env.round;
    out[0] = scale_value(clock.steps_left as f32, round::ROUND_STEPS as f32, true);
    out[1] = scale_value(
        clock.sudden_death_steps as f32,
        round::SUDDEN_DEATH_STEPS as f32,
        true,
    );
    out[2] = scale_value(
        clock.sudden_death_walls as f32,
        arena::max_rings(env.grid) as f32,
        true,
    );
}

fn encode_drone(env: &Env, idx: usize, out: &mut [f32]) {
    let drone = &env.drones[idx];
    let info = env.weapons.get(drone.weapon);
    let max_ammo = env.weapons.max_ammo(env.default_weapon, drone.weapon);
    let [px, py] = scale_pos(drone.pos.pos);
    let [vx, vy] = scale_vel(env.physics.velocity(drone.body));

    out[0] = type_id(drone.weapon.index(), NUM_WEAPONS);
    out[1] = px;
    out[2] = py;
    out[3] = vx;
    out[4] = vy;
    out[5] = scale_value(drone.last_aim.x, 1.0, false);
    out[6] = scale_value(drone.last_aim.y, 1.0, false);
    out[7] = drone.ammo.fraction_of(max_ammo);
    out[8] = scale_value(drone.weapon_cooldown, info.cool_down, true);
    out[9] = scale_value(drone.weapon_charge as f32, info.charge_steps() as f32, true);
}

/// Projectiles in slot-map slot order; freed slots are reused, so once the
/// buffer is full the lowest slots are kept, not the oldest projectiles
fn encode_projectiles(env: &Env, layout: &ObsLayout, buf: &mut [f32]) {
    for (slot, projectile) in env.projectiles.values().take(obs::NUM_PROJECTILES).enumerate() {
        let [px, py] = scale_pos(projectile.pos.pos);
        let [vx, vy] = scale_vel(env.physics.velocity(projectile.body));
        buf[layout.projectile_slot(slot)].copy_from_slice(&[
            type_id(projectile.weapon.index(), NUM_WEAPONS),
            px,
            py,
            vx,
            vy,
        ]);
    }
}

fn encode_floating_walls(env: &Env, layout: &ObsLayout, buf: &mut [f32]) {
    let walls = env.walls.values().filter(|w| w.is_floating);
    for (slot, wall) in walls.take(obs::NUM_FLOATING_WALLS).enumerate() {
        let [px, py] = scale_pos(wall.pos.pos);
        let [vx, vy] = scale_vel(env.physics.velocity(wall.body));
        let angle = env.physics.angle(wall.body);
        buf[layout.floating_wall_slot(slot)].copy_from_slice(&[
            type_id(wall.wall_type as usize, NUM_WALL_TYPES),
            px,
            py,
            vx,
            vy,
            scale_value(angle, std::f32::consts::PI, false),
        ]);
    }
}

fn encode_map(env: &Env, layout: &ObsLayout, buf: &mut [f32]) {
    for (idx, cell) in env.cells.iter().enumerate() {
        let code = match cell.occupant {
            None => cell_code::EMPTY,
            Some(CellOccupant::Wall(key)) => match env.walls.get(key) {
                Some(wall) => cell_code::WALL + wall.wall_type as u8 as f32,
                None => cell_code::EMPTY,
            },
            Some(CellOccupant::Pickup(key)) => match env.pickups.get(key) {
                Some(pickup) => cell_code::PICKUP + pickup.weapon.index() as f32,
                None => cell_code::EMPTY,
            },
        };
        let (col, row) = env.grid.coords(idx);
        buf[layout.map_cell(col, row)] = code;
    }
}
