//! Weapon catalog
//!
//! Immutable per-weapon ballistics shared by every drone and projectile. A
//! catalog is built once and handed to each `Env`; nothing mutates it after
//! construction.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::constants::{category, circle_mass, physics::FRAME_RATE};
use crate::util::vec2::Vec2;

pub const NUM_WEAPONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum WeaponType {
    Standard = 0,
    MachineGun = 1,
    Sniper = 2,
    Shotgun = 3,
    Imploder = 4,
}

impl WeaponType {
    pub const ALL: [WeaponType; NUM_WEAPONS] = [
        WeaponType::Standard,
        WeaponType::MachineGun,
        WeaponType::Sniper,
        WeaponType::Shotgun,
        WeaponType::Imploder,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }
}

/// Remaining rounds of a drone's weapon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ammo {
    Infinite,
    Rounds(u16),
}

impl Ammo {
    pub fn is_empty(self) -> bool {
        matches!(self, Ammo::Rounds(0))
    }

    /// Fraction of `max` remaining; infinite ammo is always full
    pub fn fraction_of(self, max: Ammo) -> f32 {
        match (self, max) {
            (Ammo::Infinite, _) => 1.0,
            (Ammo::Rounds(n), Ammo::Rounds(m)) if m > 0 => n as f32 / m as f32,
            (Ammo::Rounds(_), _) => 0.0,
        }
    }
}

/// How a weapon disturbs the shooter's aim
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AimPerturbation {
    None,
    /// Random sway growing with sustained heat, up to `max` per axis
    HeatSway { max: f32 },
    /// Uniform random offset of up to `max` per axis
    Offset { max: f32 },
}

/// Radial impulse applied where an explosive projectile is destroyed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplosionDef {
    pub radius: f32,
    pub falloff: f32,
    /// Negative values pull bodies toward the center
    pub impulse_per_length: f32,
    pub mask: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeaponInfo {
    pub weapon_type: WeaponType,
    /// Continuous collision detection for fast projectiles
    pub is_physics_bullet: bool,
    pub num_projectiles: u8,
    pub recoil_magnitude: f32,
    pub fire_magnitude: f32,
    /// Symmetric integer jitter added to `fire_magnitude` per projectile
    pub fire_jitter: i32,
    /// Seconds of held fire before a shot releases
    pub charge_time: f32,
    pub cool_down: f32,
    /// `None` means the projectile never expires by distance
    pub max_distance: Option<f32>,
    pub radius: f32,
    pub density: f32,
    pub inv_mass: f32,
    /// Contacts a projectile survives before being destroyed
    pub max_bounces: u8,
    pub ammo: Ammo,
    pub aim: AimPerturbation,
    pub explosion: Option<ExplosionDef>,
}

impl WeaponInfo {
    #[allow(clippy::too_many_arguments)]
    fn new(
        weapon_type: WeaponType,
        is_physics_bullet: bool,
        num_projectiles: u8,
        recoil_magnitude: f32,
        fire_magnitude: f32,
        charge_time: f32,
        cool_down: f32,
        max_distance: Option<f32>,
        radius: f32,
        density: f32,
        bounces: u8,
        ammo: Ammo,
    ) -> Self {
        Self {
            weapon_type,
            is_physics_bullet,
            num_projectiles,
            recoil_magnitude,
            fire_magnitude,
            fire_jitter: 0,
            charge_time,
            cool_down,
            max_distance,
            radius,
            density,
            inv_mass: 1.0 / circle_mass(radius, density),
            max_bounces: bounces + 1,
            ammo,
            aim: AimPerturbation::None,
            explosion: None,
        }
    }

    /// Frames of held fire needed before a shot releases
    pub fn charge_steps(&self) -> u16 {
        (self.charge_time * FRAME_RATE) as u16
    }

    /// Launch impulse magnitude for one projectile
    pub fn fire_impulse<R: Rng>(&self, rng: &mut R) -> f32 {
        if self.fire_jitter == 0 {
            return self.fire_magnitude;
        }
        self.fire_magnitude + rng.gen_range(-self.fire_jitter..=self.fire_jitter) as f32
    }

    /// Speed a projectile is held to after each bounce
    pub fn nominal_speed(&self) -> f32 {
        self.fire_magnitude * self.inv_mass
    }

    /// Perturb a normalized aim according to this weapon's handling.
    ///
    /// `heat` counts consecutive frames with fire held. The result is
    /// normalized.
    pub fn adjust_aim<R: Rng>(&self, rng: &mut R, heat: u16, aim: Vec2) -> Vec2 {
        debug_assert!(aim.is_normalized(1e-3));
        let offset_max = match self.aim {
            AimPerturbation::None => return aim,
            AimPerturbation::HeatSway { max } => max * heat_sway_coef(heat),
            AimPerturbation::Offset { max } => max,
        };
        let offset = Vec2::new(
            rng.gen_range(-offset_max..=offset_max),
            rng.gen_range(-offset_max..=offset_max),
        );
        let adjusted = (aim + offset).normalize();
        if adjusted.is_zero() {
            aim
        } else {
            adjusted
        }
    }
}

/// Sway grows logarithmically with heat, reaching 1 at heat 895
fn heat_sway_coef(heat: u16) -> f32 {
    ((heat as f32 / 5.0) + 1.0).ln() / 180f32.ln()
}

/// Read-only table of every weapon
#[derive(Debug, Clone)]
pub struct WeaponCatalog {
    infos: [WeaponInfo; NUM_WEAPONS],
}

impl WeaponCatalog {
    pub fn new() -> Self {
        let standard = WeaponInfo::new(
            WeaponType::Standard,
            true,
            1,
            12.5,
            15.5,
            0.0,
            0.37,
            Some(80.0),
            0.2,
            3.0,
            2,
            Ammo::Infinite,
        );

        let mut machine_gun = WeaponInfo::new(
            WeaponType::MachineGun,
            true,
            1,
            8.0,
            20.0,
            0.0,
            0.07,
            Some(225.0),
            0.15,
            3.0,
            1,
            Ammo::Rounds(35),
        );
        machine_gun.aim = AimPerturbation::HeatSway { max: 0.15 };

        let sniper = WeaponInfo::new(
            WeaponType::Sniper,
            true,
            1,
            60.0,
            200.0,
            1.0,
            1.5,
            None,
            0.5,
            1.5,
            0,
            Ammo::Rounds(3),
        );

        let mut shotgun = WeaponInfo::new(
            WeaponType::Shotgun,
            true,
            8,
            75.0,
            20.0,
            0.0,
            1.0,
            Some(100.0),
            0.15,
            3.0,
            1,
            Ammo::Rounds(8),
        );
        shotgun.fire_jitter = 3;
        shotgun.aim = AimPerturbation::Offset { max: 0.15 };

        let mut imploder = WeaponInfo::new(
            WeaponType::Imploder,
            false,
            1,
            35.0,
            25.0,
            2.0,
            0.0,
            None,
            0.8,
            1.0,
            0,
            Ammo::Rounds(1),
        );
        imploder.explosion = Some(ExplosionDef {
            radius: 10.0,
            falloff: 5.0,
            impulse_per_length: -150.0,
            mask: category::FLOATING_WALL | category::DRONE,
        });

        Self {
            infos: [standard, machine_gun, sniper, shotgun, imploder],
        }
    }

    #[inline]
    pub fn get(&self, weapon: WeaponType) -> &WeaponInfo {
        &self.infos[weapon.index()]
    }

    /// Full ammo for `weapon`; the map's default weapon never runs dry
    pub fn max_ammo(&self, default_weapon: WeaponType, weapon: WeaponType) -> Ammo {
        if weapon == default_weapon {
            Ammo::Infinite
        } else {
            self.get(weapon).ammo
        }
    }

    /// Roll the weapon offered by a pickup, never the map's default
    pub fn random_pickup_weapon<R: Rng>(&self, rng: &mut R, default_weapon: WeaponType) -> WeaponType {
        loop {
            let idx = rng.gen_range(1..NUM_WEAPONS);
            if let Some(weapon) = WeaponType::from_index(idx) {
                if weapon != default_weapon {
                    return weapon;
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeaponInfo> {
        self.infos.iter()
    }
}

impl Default for WeaponCatalog {
    fn default() -> Self {
        Self::new()
    }
}
