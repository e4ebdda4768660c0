//! Map grid math and spawn placement
//!
//! The arena is a grid of square cells centered on the origin. Cell `(col,
//! row)` has index `col + row * columns`; rows grow along +y.

use bitvec::prelude::*;
use rand::Rng;

use crate::game::constants::{category, drone, map::CELL_SIZE, pickup, spawn, wall};
use crate::game::entity::SpawnKind;
use crate::game::physics::ShapeDesc;
use crate::game::state::Env;
use crate::util::vec2::Vec2;

/// Dimensions of the active map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapGrid {
    pub columns: usize,
    pub rows: usize,
}

impl MapGrid {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self { columns, rows }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns * self.rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// World position of the center of a cell
    pub fn cell_pos(&self, col: usize, row: usize) -> Vec2 {
        Vec2::new(
            (col as f32 - self.columns as f32 / 2.0 + 0.5) * CELL_SIZE,
            (row as f32 - self.rows as f32 / 2.0 + 0.5) * CELL_SIZE,
        )
    }

    /// `(col, row)` of a cell index
    #[inline]
    pub fn coords(&self, idx: usize) -> (usize, usize) {
        (idx % self.columns, idx / self.columns)
    }

    #[inline]
    pub fn index(&self, col: usize, row: usize) -> usize {
        col + row * self.columns
    }

    /// Index of the cell containing `pos`, or `None` outside the grid
    pub fn cell_idx(&self, pos: Vec2) -> Option<usize> {
        let col = (pos.x / CELL_SIZE + self.columns as f32 / 2.0).floor();
        let row = (pos.y / CELL_SIZE + self.rows as f32 / 2.0).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        if col >= self.columns || row >= self.rows {
            return None;
        }
        Some(self.index(col, row))
    }
}

/// Shape an entity of `kind` will occupy once spawned
pub fn spawn_shape(kind: SpawnKind) -> ShapeDesc {
    match kind {
        SpawnKind::Drone => ShapeDesc::Circle { radius: drone::RADIUS },
        SpawnKind::FloatingWall => ShapeDesc::square(wall::FLOATING_THICKNESS),
        SpawnKind::WeaponPickup => ShapeDesc::square(pickup::THICKNESS),
    }
}

fn too_close(env: &Env, shape: ShapeDesc, pos: Vec2, mask: u32, clearance: f32) -> bool {
    env.physics
        .min_distance(shape, pos, mask)
        .is_some_and(|d| d < clearance)
}

/// Find an open cell to spawn an entity of `kind`.
///
/// Probes random cells without revisiting any, skipping occupied cells and
/// cells too close to existing bodies. Gives up with `None` once every cell
/// has been probed.
pub fn find_open_pos(env: &mut Env, kind: SpawnKind) -> Option<Vec2> {
    let n_cells = env.cells.len();
    let shape = spawn_shape(kind);
    let mut checked = bitvec![0; n_cells];
    let mut attempts = 0;

    while attempts < n_cells {
        let idx = env.rng.gen_range(0..n_cells);
        if checked[idx] {
            continue;
        }
        checked.set(idx, true);
        attempts += 1;

        let cell = &env.cells[idx];
        if cell.occupant.is_some() {
            continue;
        }
        let pos = cell.pos;

        if kind == SpawnKind::Drone {
            if too_close(
                env,
                shape,
                pos,
                category::WALL | category::FLOATING_WALL | category::DRONE,
                spawn::DRONE_WALL_DISTANCE,
            ) {
                continue;
            }
            if too_close(env, shape, pos, category::DRONE, spawn::DRONE_DRONE_DISTANCE) {
                continue;
            }
        }

        if !too_close(
            env,
            shape,
            pos,
            category::FLOATING_WALL | category::WEAPON_PICKUP | category::DRONE,
            spawn::MIN_DISTANCE,
        ) {
            return Some(pos);
        }
    }

    None
}
