//! Arena entities
//!
//! Records for everything with a physics body. Each body's collider carries
//! an encoded [`EntityRef`] as user data so collision events can be mapped
//! back to game records. Keys are generational: a reference to a destroyed
//! record resolves to nothing instead of a reused slot.

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, Key, KeyData};

use crate::game::constants::drone::MAX_DRONES;
use crate::game::physics::BodyHandle;
use crate::game::weapons::{Ammo, WeaponType};
use crate::util::vec2::Vec2;

new_key_type! {
    pub struct WallKey;
    pub struct PickupKey;
    pub struct ProjectileKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WallType {
    Standard = 0,
    Bouncy = 1,
    Death = 2,
}

/// What a spawn search is placing; picks the clearance rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnKind {
    Drone,
    FloatingWall,
    WeaponPickup,
}

/// Back-reference from a collider to its owning record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Wall(WallKey),
    Pickup(PickupKey),
    Projectile(ProjectileKey),
    Drone(usize),
}

const TAG_SHIFT: u32 = 64;
const TAG_WALL: u128 = 1;
const TAG_PICKUP: u128 = 2;
const TAG_PROJECTILE: u128 = 3;
const TAG_DRONE: u128 = 4;

impl EntityRef {
    /// Pack into collider user data: tag in the high 64 bits, key below
    pub fn encode(self) -> u128 {
        let (tag, raw) = match self {
            EntityRef::Wall(k) => (TAG_WALL, k.data().as_ffi()),
            EntityRef::Pickup(k) => (TAG_PICKUP, k.data().as_ffi()),
            EntityRef::Projectile(k) => (TAG_PROJECTILE, k.data().as_ffi()),
            EntityRef::Drone(idx) => (TAG_DRONE, idx as u64),
        };
        (tag << TAG_SHIFT) | u128::from(raw)
    }

    pub fn decode(data: u128) -> Option<Self> {
        let raw = data as u64;
        let entity = match data >> TAG_SHIFT {
            TAG_WALL => EntityRef::Wall(KeyData::from_ffi(raw).into()),
            TAG_PICKUP => EntityRef::Pickup(KeyData::from_ffi(raw).into()),
            TAG_PROJECTILE => EntityRef::Projectile(KeyData::from_ffi(raw).into()),
            TAG_DRONE => EntityRef::Drone(raw as usize),
            _ => return None,
        };
        Some(entity)
    }
}

/// Last known position, refreshed from physics on demand
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CachedPos {
    pub pos: Vec2,
    pub valid: bool,
}

impl CachedPos {
    pub fn new(pos: Vec2) -> Self {
        Self { pos, valid: true }
    }

    #[inline]
    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}

/// Occupant of one map cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOccupant {
    Wall(WallKey),
    Pickup(PickupKey),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapCell {
    pub pos: Vec2,
    pub occupant: Option<CellOccupant>,
}

#[derive(Debug, Clone)]
pub struct Wall {
    pub body: BodyHandle,
    pub pos: CachedPos,
    pub extent: Vec2,
    pub is_floating: bool,
    pub wall_type: WallType,
    /// Grid cell of a static wall
    pub map_cell_idx: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct WeaponPickup {
    pub body: BodyHandle,
    pub pos: Vec2,
    pub weapon: WeaponType,
    /// Seconds until the pickup can be taken again; zero when available
    pub respawn_wait: f32,
    pub floating_walls_touching: u8,
    pub map_cell_idx: Option<usize>,
}

impl WeaponPickup {
    pub fn is_available(&self) -> bool {
        self.respawn_wait == 0.0 && self.floating_walls_touching == 0
    }
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub body: BodyHandle,
    pub drone_idx: usize,
    pub weapon: WeaponType,
    pub pos: CachedPos,
    pub last_pos: Vec2,
    pub distance: f32,
    pub bounces: u8,
}

/// Which enemies a drone hit during the current frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepHitInfo {
    pub shot_hit: [bool; MAX_DRONES],
    pub explosion_hit: [bool; MAX_DRONES],
    pub killed: [bool; MAX_DRONES],
    /// This drone died during the frame
    pub died: bool,
    pub picked_up: Option<WeaponType>,
}

#[derive(Debug, Clone)]
pub struct Drone {
    pub body: BodyHandle,
    pub idx: usize,
    pub weapon: WeaponType,
    pub ammo: Ammo,
    /// Seconds until the weapon can fire again
    pub weapon_cooldown: f32,
    /// Frames fire has been held toward the next shot
    pub weapon_charge: u16,
    /// Frames fire has been held, decaying while released
    pub heat: u16,
    pub shot_this_step: bool,
    pub pos: CachedPos,
    pub spawn_pos: Vec2,
    pub last_pos: Vec2,
    pub last_move: Vec2,
    pub last_aim: Vec2,
    pub last_velocity: Vec2,
    pub hit_info: StepHitInfo,
    pub dead: bool,
    pub killed_by: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_entity_ref_encoding() {
        let mut walls: SlotMap<WallKey, ()> = SlotMap::with_key();
        let mut projectiles: SlotMap<ProjectileKey, ()> = SlotMap::with_key();
        let w = walls.insert(());
        let p = projectiles.insert(());

        for entity in [EntityRef::Wall(w), EntityRef::Projectile(p), EntityRef::Drone(3)] {
            assert_eq!(EntityRef::decode(entity.encode()), Some(entity));
        }
        assert_eq!(EntityRef::decode(0), None);
    }

    #[test]
    fn test_stale_key_does_not_resolve() {
        let mut projectiles: SlotMap<ProjectileKey, u32> = SlotMap::with_key();
        let old = projectiles.insert(1);
        let encoded = EntityRef::Projectile(old).encode();
        projectiles.remove(old);
        let reused = projectiles.insert(2);

        let Some(EntityRef::Projectile(decoded)) = EntityRef::decode(encoded) else {
            panic!("expected projectile ref");
        };
        assert_ne!(decoded, reused);
        assert!(projectiles.get(decoded).is_none());
    }

    #[test]
    fn test_pickup_availability() {
        let mut pickup = WeaponPickup {
            body: dummy_handle(),
            pos: Vec2::ZERO,
            weapon: WeaponType::Sniper,
            respawn_wait: 0.0,
            floating_walls_touching: 0,
            map_cell_idx: None,
        };
        assert!(pickup.is_available());
        pickup.floating_walls_touching = 1;
        assert!(!pickup.is_available());
        pickup.floating_walls_touching = 0;
        pickup.respawn_wait = 0.5;
        assert!(!pickup.is_available());
    }

    fn dummy_handle() -> BodyHandle {
        let mut world = crate::game::physics::PhysicsWorld::new();
        world.create_body(&crate::game::physics::BodyDesc::new(
            crate::game::physics::BodyKind::Static,
            Vec2::ZERO,
            crate::game::physics::ShapeDesc::square(1.0),
            1,
            1,
        ))
    }
}
