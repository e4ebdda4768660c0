//! Arena state
//!
//! `Env` owns the physics world and every entity collection. Systems mutate
//! it through free functions; frontends only read it between steps.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use slotmap::SlotMap;
use tracing::debug;

use crate::config::EnvConfig;
use crate::error::SimError;
use crate::game::constants::{category, drone, pickup, round, wall};
use crate::game::entity::{
    CachedPos, CellOccupant, Drone, EntityRef, MapCell, PickupKey, Projectile, ProjectileKey,
    SpawnKind, StepHitInfo, Wall, WallKey, WallType, WeaponPickup,
};
use crate::game::maps::{MapCatalog, MapEntry};
use crate::game::match_result::{DroneStats, LogBuffer, LogEntry};
use crate::game::observation::{self, ObsLayout};
use crate::game::physics::{BodyDesc, BodyHandle, BodyKind, PhysicsWorld, ShapeDesc};
use crate::game::spatial::{self, MapGrid};
use crate::game::systems::arena;
use crate::game::weapons::{WeaponCatalog, WeaponType};
use crate::util::vec2::Vec2;

/// Round and sudden death clocks, counted in frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundState {
    pub steps_left: u32,
    pub sudden_death_steps: u32,
    /// Sudden death escalations so far this round
    pub sudden_death_walls: u8,
}

impl RoundState {
    pub fn new() -> Self {
        Self {
            steps_left: round::ROUND_STEPS,
            sudden_death_steps: round::SUDDEN_DEATH_STEPS,
            sudden_death_walls: 0,
        }
    }
}

impl Default for RoundState {
    fn default() -> Self {
        Self::new()
    }
}

/// Inner edges of the static walls
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MapBounds {
    pub min: Vec2,
    pub max: Vec2,
}

/// Most recent explosion, kept for a few frames for rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplosionMarker {
    pub pos: Vec2,
    pub radius: f32,
    pub steps_left: u8,
}

pub struct Env {
    pub(crate) config: EnvConfig,
    pub(crate) weapons: Arc<WeaponCatalog>,
    pub(crate) maps: Arc<MapCatalog>,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) physics: PhysicsWorld,

    pub(crate) map: MapEntry,
    pub(crate) grid: MapGrid,
    pub(crate) bounds: MapBounds,
    pub(crate) default_weapon: WeaponType,
    pub(crate) cells: Vec<MapCell>,

    pub(crate) walls: SlotMap<WallKey, Wall>,
    pub(crate) pickups: SlotMap<PickupKey, WeaponPickup>,
    pub(crate) projectiles: SlotMap<ProjectileKey, Projectile>,
    pub(crate) drones: Vec<Drone>,
    pub(crate) stats: Vec<DroneStats>,

    pub(crate) round: RoundState,
    pub(crate) episode_length: u32,
    pub(crate) needs_reset: bool,
    pub(crate) explosion: Option<ExplosionMarker>,
    pub(crate) logs: LogBuffer,

    pub(crate) layout: ObsLayout,
    pub(crate) observations: Vec<f32>,
    pub(crate) actions: Vec<f32>,
    pub(crate) rewards: Vec<f32>,
    pub(crate) terminals: Vec<u8>,
}

impl Env {
    /// Build an environment and set up its first round
    pub fn new(
        config: EnvConfig,
        weapons: Arc<WeaponCatalog>,
        maps: Arc<MapCatalog>,
    ) -> Result<Self, SimError> {
        config.validate(maps.len())?;
        for map in maps.iter() {
            map.validate()?;
        }

        let first_map = maps.get(0).cloned().ok_or(SimError::UnknownMap(0))?;
        let layout = ObsLayout::new(config.num_drones);
        let num_agents = config.num_agents;
        let mut env = Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            physics: PhysicsWorld::new(),
            map: first_map,
            grid: MapGrid::default(),
            bounds: MapBounds::default(),
            default_weapon: WeaponType::Standard,
            cells: Vec::new(),
            walls: SlotMap::with_key(),
            pickups: SlotMap::with_key(),
            projectiles: SlotMap::with_key(),
            drones: Vec::with_capacity(config.num_drones),
            stats: vec![DroneStats::default(); config.num_drones],
            round: RoundState::new(),
            episode_length: 0,
            needs_reset: false,
            explosion: None,
            logs: LogBuffer::new(config.log_capacity),
            observations: vec![0.0; layout.total() * num_agents],
            actions: vec![0.0; drone::ACTION_SIZE * num_agents],
            rewards: vec![0.0; num_agents],
            terminals: vec![0; num_agents],
            layout,
            weapons,
            maps,
            config,
        };
        env.setup()?;
        Ok(env)
    }

    /// Build an environment with the stock weapon and map catalogs
    pub fn with_config(config: EnvConfig) -> Result<Self, SimError> {
        Self::new(
            config,
            Arc::new(WeaponCatalog::new()),
            Arc::new(MapCatalog::new()),
        )
    }

    /// Choose a map and populate the world
    pub(crate) fn setup(&mut self) -> Result<(), SimError> {
        self.round = RoundState::new();

        let map_idx = match self.config.map_index {
            Some(idx) => idx,
            None => self.rng.gen_range(0..self.maps.len()),
        };
        arena::build_map(self, map_idx)?;

        for idx in 0..self.config.num_drones {
            self.create_drone(idx)?;
        }
        arena::scatter_floating_walls(self)?;

        let num_pickups = self.map.weapon_pickups;
        for _ in 0..num_pickups {
            let pos = spatial::find_open_pos(self, SpawnKind::WeaponPickup)
                .ok_or(SimError::NoSpawnPosition(SpawnKind::WeaponPickup))?;
            self.create_pickup(pos);
        }

        debug!(
            map = self.map.name,
            drones = self.drones.len(),
            pickups = self.pickups.len(),
            "Round set up"
        );

        observation::compute_observations(self);
        Ok(())
    }

    /// Drop every per-round entity and statistic
    pub(crate) fn clear(&mut self) {
        self.physics = PhysicsWorld::new();
        self.cells.clear();
        self.walls.clear();
        self.pickups.clear();
        self.projectiles.clear();
        self.drones.clear();
        self.stats.iter_mut().for_each(|s| *s = DroneStats::default());
        self.explosion = None;
        self.episode_length = 0;
        self.needs_reset = false;
        self.rewards.fill(0.0);
        self.terminals.fill(0);
    }

    // ========================================================================
    // Entity lifecycle
    // ========================================================================

    pub(crate) fn create_wall(
        &mut self,
        pos: Vec2,
        thickness: f32,
        wall_type: WallType,
        floating: bool,
        map_cell_idx: Option<usize>,
    ) -> WallKey {
        let physics = &mut self.physics;
        let key = self.walls.insert_with_key(|key| {
            let (kind, category, mask) = if floating {
                (BodyKind::Dynamic, category::FLOATING_WALL, category::FLOATING_WALL_MASK)
            } else {
                (BodyKind::Static, category::WALL, category::WALL_MASK)
            };
            let mut desc = BodyDesc::new(kind, pos, ShapeDesc::square(thickness), category, mask);
            desc.density = wall::DENSITY;
            desc.friction = wall::FRICTION;
            desc.restitution = match wall_type {
                WallType::Bouncy => wall::BOUNCY_RESTITUTION,
                _ => wall::RESTITUTION,
            };
            if floating {
                desc.linear_damping = wall::FLOATING_DAMPING;
                desc.angular_damping = wall::FLOATING_DAMPING;
                desc.awake = false;
            }
            desc.events = floating || wall_type == WallType::Death;
            desc.user_data = EntityRef::Wall(key).encode();

            Wall {
                body: physics.create_body(&desc),
                pos: CachedPos::new(pos),
                extent: Vec2::new(thickness / 2.0, thickness / 2.0),
                is_floating: floating,
                wall_type,
                map_cell_idx,
            }
        });

        if let Some(idx) = map_cell_idx {
            debug_assert!(self.cells[idx].occupant.is_none());
            self.cells[idx].occupant = Some(CellOccupant::Wall(key));
        }
        key
    }

    pub(crate) fn destroy_wall(&mut self, key: WallKey) {
        let Some(wall) = self.walls.remove(key) else {
            return;
        };
        if wall.is_floating {
            // Sensor end events cannot name a removed collider, so release
            // the pickups this wall was blocking now.
            for data in self.physics.touching(wall.body, category::WEAPON_PICKUP) {
                if let Some(EntityRef::Pickup(pk)) = EntityRef::decode(data) {
                    if let Some(pickup) = self.pickups.get_mut(pk) {
                        pickup.floating_walls_touching = pickup.floating_walls_touching.saturating_sub(1);
                    }
                }
            }
        }
        if let Some(idx) = wall.map_cell_idx {
            if self.cells[idx].occupant == Some(CellOccupant::Wall(key)) {
                self.cells[idx].occupant = None;
            }
        }
        self.physics.destroy_body(wall.body);
    }

    pub(crate) fn create_pickup(&mut self, pos: Vec2) -> PickupKey {
        let weapon = self.weapons.random_pickup_weapon(&mut self.rng, self.default_weapon);
        let map_cell_idx = self.grid.cell_idx(pos);

        let physics = &mut self.physics;
        let key = self.pickups.insert_with_key(|key| {
            let mut desc = BodyDesc::new(
                BodyKind::Static,
                pos,
                ShapeDesc::square(pickup::THICKNESS),
                category::WEAPON_PICKUP,
                category::WEAPON_PICKUP_MASK,
            );
            desc.sensor = true;
            desc.events = true;
            desc.user_data = EntityRef::Pickup(key).encode();

            WeaponPickup {
                body: physics.create_body(&desc),
                pos,
                weapon,
                respawn_wait: 0.0,
                floating_walls_touching: 0,
                map_cell_idx,
            }
        });

        if let Some(idx) = map_cell_idx {
            self.cells[idx].occupant = Some(CellOccupant::Pickup(key));
        }
        key
    }

    pub(crate) fn destroy_pickup(&mut self, key: PickupKey) {
        let Some(pickup) = self.pickups.remove(key) else {
            return;
        };
        if let Some(idx) = pickup.map_cell_idx {
            if self.cells[idx].occupant == Some(CellOccupant::Pickup(key)) {
                self.cells[idx].occupant = None;
            }
        }
        self.physics.destroy_body(pickup.body);
    }

    pub(crate) fn create_drone(&mut self, idx: usize) -> Result<(), SimError> {
        debug_assert_eq!(idx, self.drones.len());
        let pos = spatial::find_open_pos(self, SpawnKind::Drone)
            .ok_or(SimError::NoSpawnPosition(SpawnKind::Drone))?;

        let mut desc = BodyDesc::new(
            BodyKind::Dynamic,
            pos,
            ShapeDesc::Circle { radius: drone::RADIUS },
            category::DRONE,
            category::DRONE_MASK,
        );
        desc.density = drone::DENSITY;
        desc.friction = drone::FRICTION;
        desc.restitution = drone::RESTITUTION;
        desc.linear_damping = drone::LINEAR_DAMPING;
        desc.fixed_rotation = true;
        desc.events = true;
        desc.user_data = EntityRef::Drone(idx).encode();
        let body = self.physics.create_body(&desc);

        let weapon = self.default_weapon;
        self.drones.push(Drone {
            body,
            idx,
            weapon,
            ammo: self.weapons.max_ammo(self.default_weapon, weapon),
            weapon_cooldown: 0.0,
            weapon_charge: 0,
            heat: 0,
            shot_this_step: false,
            pos: CachedPos::new(pos),
            spawn_pos: pos,
            last_pos: pos,
            last_move: Vec2::ZERO,
            last_aim: Vec2::new(0.0, -1.0),
            last_velocity: Vec2::ZERO,
            hit_info: StepHitInfo::default(),
            dead: false,
            killed_by: None,
        });
        Ok(())
    }

    /// Mark a drone dead. Returns false if it already was.
    pub(crate) fn kill_drone(&mut self, idx: usize, killer: Option<usize>) -> bool {
        let Some(drone) = self.drones.get_mut(idx) else {
            return false;
        };
        if drone.dead {
            return false;
        }
        drone.dead = true;
        drone.killed_by = killer;
        drone.hit_info.died = true;
        debug!(drone = idx, killer = ?killer, "Drone killed");
        true
    }

    // ========================================================================
    // Cached positions
    // ========================================================================

    pub(crate) fn drone_pos(&mut self, idx: usize) -> Vec2 {
        let drone = &mut self.drones[idx];
        if !drone.pos.valid {
            drone.pos = CachedPos::new(self.physics.position(drone.body));
        }
        drone.pos.pos
    }

    pub(crate) fn wall_pos(&mut self, key: WallKey) -> Option<Vec2> {
        let wall = self.walls.get_mut(key)?;
        if !wall.pos.valid {
            wall.pos = CachedPos::new(self.physics.position(wall.body));
        }
        Some(wall.pos.pos)
    }

    /// Mark positions of everything that moves as stale
    pub(crate) fn invalidate_positions(&mut self) {
        for drone in &mut self.drones {
            drone.pos.invalidate();
        }
        for wall in self.walls.values_mut().filter(|w| w.is_floating) {
            wall.pos.invalidate();
        }
    }

    /// Refresh every stale cached position from physics
    pub(crate) fn refresh_positions(&mut self) {
        for drone in &mut self.drones {
            if !drone.pos.valid {
                drone.pos = CachedPos::new(self.physics.position(drone.body));
            }
        }
        for wall in self.walls.values_mut() {
            if !wall.pos.valid {
                wall.pos = CachedPos::new(self.physics.position(wall.body));
            }
        }
        for projectile in self.projectiles.values_mut() {
            if !projectile.pos.valid {
                projectile.pos = CachedPos::new(self.physics.position(projectile.body));
            }
        }
    }

    // ========================================================================
    // Read-only view
    // ========================================================================

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn map(&self) -> &MapEntry {
        &self.map
    }

    pub fn grid(&self) -> MapGrid {
        self.grid
    }

    pub fn bounds(&self) -> MapBounds {
        self.bounds
    }

    pub fn default_weapon(&self) -> WeaponType {
        self.default_weapon
    }

    pub fn weapons(&self) -> &WeaponCatalog {
        &self.weapons
    }

    pub fn cells(&self) -> &[MapCell] {
        &self.cells
    }

    pub fn drones(&self) -> &[Drone] {
        &self.drones
    }

    /// Static walls
    pub fn walls(&self) -> impl Iterator<Item = &Wall> {
        self.walls.values().filter(|w| !w.is_floating)
    }

    pub fn floating_walls(&self) -> impl Iterator<Item = &Wall> {
        self.walls.values().filter(|w| w.is_floating)
    }

    pub fn pickups(&self) -> impl Iterator<Item = &WeaponPickup> {
        self.pickups.values()
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    pub fn round_state(&self) -> RoundState {
        self.round
    }

    pub fn explosion(&self) -> Option<&ExplosionMarker> {
        self.explosion.as_ref()
    }

    pub fn episode_length(&self) -> u32 {
        self.episode_length
    }

    pub fn stats(&self) -> &[DroneStats] {
        &self.stats
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    /// Average the logged rounds into one entry and empty the log
    pub fn aggregate_logs(&mut self) -> Option<LogEntry> {
        self.logs.aggregate_and_clear()
    }

    // ========================================================================
    // Agent buffers
    // ========================================================================

    /// Per-agent actions, `ACTION_SIZE` floats each: `[move_x, move_y,
    /// aim_x, aim_y, fire]`. Written by the caller before `step`.
    pub fn actions_mut(&mut self) -> &mut [f32] {
        &mut self.actions
    }

    pub fn actions(&self) -> &[f32] {
        &self.actions
    }

    /// Observations of every agent, back to back
    pub fn observations(&self) -> &[f32] {
        &self.observations
    }

    pub fn agent_observation(&self, agent: usize) -> Option<&[f32]> {
        let size = self.layout.total();
        self.observations.get(agent * size..(agent + 1) * size)
    }

    pub fn rewards(&self) -> &[f32] {
        &self.rewards
    }

    pub fn terminals(&self) -> &[u8] {
        &self.terminals
    }

    pub fn obs_layout(&self) -> &ObsLayout {
        &self.layout
    }

    pub fn obs_size(&self) -> usize {
        self.layout.total()
    }

    /// Live world position of a body, bypassing position caches
    pub fn body_pos(&self, body: BodyHandle) -> Vec2 {
        self.physics.position(body)
    }

    pub fn body_velocity(&self, body: BodyHandle) -> Vec2 {
        self.physics.velocity(body)
    }

    pub fn body_angle(&self, body: BodyHandle) -> f32 {
        self.physics.angle(body)
    }

    pub fn last_move(&self, agent: usize) -> Option<Vec2> {
        self.drones.get(agent).map(|d| d.last_move)
    }

    pub fn last_aim(&self, agent: usize) -> Option<Vec2> {
        self.drones.get(agent).map(|d| d.last_aim)
    }

    /// Point where the agent's aim line first meets a wall or drone
    pub fn aim_guide(&self, agent: usize, max_dist: f32) -> Option<Vec2> {
        let drone = self.drones.get(agent)?;
        let start = self.physics.position(drone.body) + drone.last_aim * (drone::RADIUS + 0.01);
        let (_, dist) = self.physics.cast_ray(
            start,
            drone.last_aim,
            max_dist,
            category::WALL | category::FLOATING_WALL | category::DRONE,
        )?;
        Some(start + drone.last_aim * dist)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::game::constants::spawn;

    /// Environment pinned to the open map with `num_drones` agents
    pub(crate) fn test_env(seed: u64, num_drones: usize) -> Env {
        Env::with_config(EnvConfig {
            num_drones,
            num_agents: num_drones,
            seed,
            map_index: Some(0),
            ..EnvConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_new_env_populates_round() {
        let env = test_env(42, 2);
        assert_eq!(env.drones().len(), 2);
        assert_eq!(env.pickups().count(), 8);
        assert_eq!(env.floating_walls().count(), 0);
        assert_eq!(env.default_weapon(), WeaponType::Standard);
        assert!(env.drones().iter().all(|d| !d.dead));
        assert_eq!(env.round_state(), RoundState::new());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Env::with_config(EnvConfig {
            num_drones: 0,
            ..EnvConfig::default()
        });
        assert!(matches!(result, Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_buffers_sized_for_agents() {
        let env = Env::with_config(EnvConfig {
            num_drones: 3,
            num_agents: 2,
            map_index: Some(0),
            ..EnvConfig::default()
        })
        .unwrap();
        assert_eq!(env.actions.len(), 2 * drone::ACTION_SIZE);
        assert_eq!(env.rewards.len(), 2);
        assert_eq!(env.observations.len(), 2 * env.layout.total());
    }

    #[test]
    fn test_spawn_clearance() {
        for seed in 0..8 {
            let env = test_env(seed, 4);
            let drone_pos: Vec<Vec2> = env.drones().iter().map(|d| env.body_pos(d.body)).collect();
            let pickup_pos: Vec<Vec2> = env.pickups().map(|p| p.pos).collect();

            for (i, a) in drone_pos.iter().enumerate() {
                for b in &drone_pos[i + 1..] {
                    assert!(a.distance_to(*b) >= spawn::DRONE_DRONE_DISTANCE + 2.0 * drone::RADIUS);
                }
                for p in &pickup_pos {
                    assert!(a.distance_to(*p) >= spawn::MIN_DISTANCE + drone::RADIUS + pickup::THICKNESS / 2.0);
                }
            }
            for (i, a) in pickup_pos.iter().enumerate() {
                for b in &pickup_pos[i + 1..] {
                    assert!(a.distance_to(*b) >= spawn::MIN_DISTANCE + pickup::THICKNESS);
                }
            }
        }
    }

    #[test]
    fn test_floating_wall_spawn_clearance() {
        let half_wall = wall::FLOATING_THICKNESS / 2.0;
        for seed in 0..12 {
            let env = Env::with_config(EnvConfig {
                num_drones: 4,
                num_agents: 4,
                seed,
                map_index: Some(3),
                ..EnvConfig::default()
            })
            .unwrap();
            assert_eq!(env.map().name, "rooms");

            let floating: Vec<Vec2> = env.floating_walls().map(|w| env.body_pos(w.body)).collect();
            assert_eq!(floating.len(), 6);

            for (i, a) in floating.iter().enumerate() {
                for b in &floating[i + 1..] {
                    assert!(a.distance_to(*b) >= spawn::MIN_DISTANCE + 2.0 * half_wall);
                }
                for d in env.drones() {
                    let pos = env.body_pos(d.body);
                    assert!(a.distance_to(pos) >= spawn::MIN_DISTANCE + half_wall + drone::RADIUS);
                }
                for p in env.pickups() {
                    assert!(a.distance_to(p.pos) >= spawn::MIN_DISTANCE + half_wall + pickup::THICKNESS / 2.0);
                }
            }
        }
    }

    #[test]
    fn test_pickups_registered_in_cells() {
        let env = test_env(7, 2);
        for (key, pickup) in env.pickups.iter() {
            let idx = pickup.map_cell_idx.unwrap();
            assert_eq!(env.cells[idx].occupant, Some(CellOccupant::Pickup(key)));
        }
    }

    #[test]
    fn test_destroy_wall_frees_cell() {
        let mut env = test_env(1, 2);
        let (key, idx) = env
            .walls
            .iter()
            .find_map(|(k, w)| w.map_cell_idx.map(|i| (k, i)))
            .unwrap();
        let bodies = env.physics.body_count();
        env.destroy_wall(key);
        assert!(env.cells[idx].occupant.is_none());
        assert_eq!(env.physics.body_count(), bodies - 1);
        env.destroy_wall(key);
        assert_eq!(env.physics.body_count(), bodies - 1);
    }

    #[test]
    fn test_kill_drone_is_sticky() {
        let mut env = test_env(1, 2);
        assert!(env.kill_drone(1, Some(0)));
        assert!(!env.kill_drone(1, None));
        assert_eq!(env.drones[1].killed_by, Some(0));
        assert!(env.drones[1].hit_info.died);
    }

    #[test]
    fn test_drone_pos_cache_refreshes() {
        let mut env = test_env(3, 2);
        let body = env.drones[0].body;
        env.physics.set_position(body, Vec2::new(1.0, 1.0));
        env.invalidate_positions();
        assert_eq!(env.drone_pos(0), Vec2::new(1.0, 1.0));
        assert!(env.drones[0].pos.valid);
    }

    #[test]
    fn test_aim_guide_stops_at_first_body() {
        let env = test_env(5, 2);
        let pos = env.body_pos(env.drones()[0].body);
        // Drones spawn aiming down; the border's inner edge is at y = -38
        let hit = env.aim_guide(0, 200.0).unwrap();
        assert!((hit.x - pos.x).abs() < 1e-3);
        assert!(hit.y < pos.y);
        assert!(hit.y >= -38.01);
        assert!(env.aim_guide(9, 200.0).is_none());
    }

    #[test]
    fn test_random_map_choice_is_seeded() {
        let config = EnvConfig {
            seed: 77,
            ..EnvConfig::default()
        };
        let a = Env::with_config(config.clone()).unwrap();
        let b = Env::with_config(config).unwrap();
        assert_eq!(a.map().name, b.map().name);
    }
}
