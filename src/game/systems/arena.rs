//! Arena system
//!
//! Builds the static map, scatters floating walls, runs the round clock and
//! closes the arena in with death walls once the round runs long.

use std::sync::Arc;

use tracing::debug;

use crate::error::SimError;
use crate::game::constants::{category, drone, pickup, round, wall};
use crate::game::entity::{CellOccupant, MapCell, SpawnKind, WallKey, WallType};
use crate::game::maps::LayoutCell;
use crate::game::physics::ShapeDesc;
use crate::game::spatial::{self, MapGrid};
use crate::game::state::{Env, MapBounds};
use crate::util::vec2::Vec2;

/// Arena events
#[derive(Debug, Clone, PartialEq)]
pub enum ArenaEvent {
    /// A new ring of death walls closed in
    SuddenDeath { ring: u8, walls_placed: usize },
    /// A drone was caught inside a new wall
    DroneCrushed { drone: usize },
    /// A floating wall partially inside a new wall was pinned in place
    FloatingWallFrozen { pos: Vec2 },
    /// A floating wall was swallowed by the closing walls
    FloatingWallDestroyed { pos: Vec2 },
}

/// Lay out the cells and static walls of map `map_idx`
pub fn build_map(env: &mut Env, map_idx: usize) -> Result<(), SimError> {
    let maps = Arc::clone(&env.maps);
    let map = maps.get(map_idx).ok_or(SimError::UnknownMap(map_idx))?;

    env.map = map.clone();
    env.grid = MapGrid::new(map.columns, map.rows);
    env.default_weapon = map.default_weapon;

    let grid = env.grid;
    env.cells = (0..grid.len())
        .map(|idx| {
            let (col, row) = grid.coords(idx);
            MapCell {
                pos: grid.cell_pos(col, row),
                occupant: None,
            }
        })
        .collect();

    for idx in 0..grid.len() {
        let (col, row) = grid.coords(idx);
        let LayoutCell::Wall { wall_type, floating } = map.cell(col, row)? else {
            continue;
        };
        let pos = env.cells[idx].pos;
        if floating {
            env.create_wall(pos, wall::FLOATING_THICKNESS, wall_type, true, None);
        } else {
            env.create_wall(pos, wall::THICKNESS, wall_type, false, Some(idx));
        }
    }

    env.bounds = compute_bounds(env);
    Ok(())
}

/// Inner edges of the outermost static walls
fn compute_bounds(env: &Env) -> MapBounds {
    let mut min = Vec2::new(f32::MAX, f32::MAX);
    let mut max = Vec2::new(f32::MIN, f32::MIN);
    for wall in env.walls.values().filter(|w| !w.is_floating) {
        let pos = wall.pos.pos;
        min = min.min(pos - wall.extent + Vec2::new(wall::THICKNESS, wall::THICKNESS));
        max = max.max(pos + wall.extent - Vec2::new(wall::THICKNESS, wall::THICKNESS));
    }
    if min.x > max.x || min.y > max.y {
        return MapBounds::default();
    }
    MapBounds { min, max }
}

/// Place the map's configured floating walls at open cells
pub fn scatter_floating_walls(env: &mut Env) -> Result<(), SimError> {
    let counts = [
        (WallType::Standard, env.map.floating_standard_walls),
        (WallType::Bouncy, env.map.floating_bouncy_walls),
        (WallType::Death, env.map.floating_death_walls),
    ];
    for (wall_type, count) in counts {
        for _ in 0..count {
            let pos = spatial::find_open_pos(env, SpawnKind::FloatingWall)
                .ok_or(SimError::NoSpawnPosition(SpawnKind::FloatingWall))?;
            env.create_wall(pos, wall::FLOATING_THICKNESS, wall_type, true, None);
        }
    }
    Ok(())
}

/// Advance the round clock by one frame, escalating sudden death when due
pub fn update(env: &mut Env) -> Vec<ArenaEvent> {
    let clock = &mut env.round;
    clock.steps_left = clock.steps_left.saturating_sub(1);
    if clock.steps_left != 0 {
        return Vec::new();
    }

    clock.sudden_death_steps = clock.sudden_death_steps.saturating_sub(1);
    if clock.sudden_death_steps != 0 {
        return Vec::new();
    }

    let events = handle_sudden_death(env);
    env.round.sudden_death_steps = round::SUDDEN_DEATH_STEPS;
    events
}

/// Cells `ring` steps in from the map edge, row by row. Empty once the
/// rings have met in the middle.
fn ring_cells(grid: MapGrid, ring: usize) -> Vec<usize> {
    if grid.columns <= ring * 2 || grid.rows <= ring * 2 {
        return Vec::new();
    }
    let (last_col, last_row) = (grid.columns - 1 - ring, grid.rows - 1 - ring);
    let mut cells = Vec::new();
    for row in ring..=last_row {
        for col in ring..=last_col {
            if row == ring || row == last_row || col == ring || col == last_col {
                cells.push(grid.index(col, row));
            }
        }
    }
    cells
}

/// Close the arena in by one ring of death walls.
///
/// Pickups under the new walls are sent to respawn and drones inside them
/// die. A floating wall already frozen by an earlier ring, or whose center
/// is now inside a wall, is destroyed; one that only overlaps the new walls
/// is frozen.
pub fn handle_sudden_death(env: &mut Env) -> Vec<ArenaEvent> {
    let mut events = Vec::new();
    env.round.sudden_death_walls = env.round.sudden_death_walls.saturating_add(1);
    let ring = env.round.sudden_death_walls;

    let mut walls_placed = 0;
    for idx in ring_cells(env.grid, ring as usize) {
        match env.cells[idx].occupant {
            Some(CellOccupant::Wall(_)) => continue,
            Some(CellOccupant::Pickup(key)) => {
                if let Some(pickup) = env.pickups.get_mut(key) {
                    pickup.respawn_wait = pickup::RESPAWN_WAIT;
                    pickup.map_cell_idx = None;
                }
                env.cells[idx].occupant = None;
            }
            None => {}
        }
        let pos = env.cells[idx].pos;
        env.create_wall(pos, wall::THICKNESS, WallType::Death, false, Some(idx));
        walls_placed += 1;
    }
    debug!(ring, walls_placed, "Sudden death walls placed");
    events.push(ArenaEvent::SuddenDeath { ring, walls_placed });

    for idx in 0..env.drones.len() {
        if env.drones[idx].dead {
            continue;
        }
        let pos = env.drone_pos(idx);
        let caught = env.physics.any_overlap(
            ShapeDesc::Circle { radius: drone::RADIUS },
            pos,
            category::WALL,
        );
        if caught && env.kill_drone(idx, None) {
            events.push(ArenaEvent::DroneCrushed { drone: idx });
        }
    }

    let floating: Vec<WallKey> = env
        .walls
        .iter()
        .filter(|(_, w)| w.is_floating)
        .map(|(k, _)| k)
        .collect();
    for key in floating {
        let Some(pos) = env.wall_pos(key) else {
            continue;
        };
        let Some(body) = env.walls.get(key).map(|w| w.body) else {
            continue;
        };

        let center_in_wall = env
            .grid
            .cell_idx(pos)
            .is_some_and(|idx| matches!(env.cells[idx].occupant, Some(CellOccupant::Wall(_))));
        if env.physics.is_static(body) || center_in_wall {
            env.destroy_wall(key);
            debug!(x = pos.x, y = pos.y, "Destroyed floating wall");
            events.push(ArenaEvent::FloatingWallDestroyed { pos });
            continue;
        }

        if env
            .physics
            .any_overlap(ShapeDesc::square(wall::FLOATING_THICKNESS), pos, category::WALL)
        {
            env.physics.make_static(body);
            debug!(x = pos.x, y = pos.y, "Froze floating wall");
            events.push(ArenaEvent::FloatingWallFrozen { pos });
        }
    }

    events
}

/// Number of sudden death rings before the walls meet
pub fn max_rings(grid: MapGrid) -> u8 {
    (grid.columns.min(grid.rows).div_ceil(2)).min(u8::MAX as usize) as u8
}
