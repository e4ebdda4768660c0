//! Projectile system
//!
//! Fire protocol (heat, cooldown, charge, ammo, recoil), projectile
//! creation, travel bookkeeping and destruction with optional explosions.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;

use crate::game::constants::{category, drone, round};
use crate::game::entity::{CachedPos, EntityRef, Projectile, ProjectileKey};
use crate::game::match_result::DroneStats;
use crate::game::physics::{BodyDesc, BodyKind, ShapeDesc};
use crate::game::state::{Env, ExplosionMarker};
use crate::game::systems::pickup;
use crate::game::weapons::{Ammo, WeaponInfo, WeaponType};
use crate::util::vec2::Vec2;

/// Projectile events
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectileEvent {
    /// A shot was released
    Fired {
        drone: usize,
        weapon: WeaponType,
        projectiles: u8,
    },
    /// An explosive projectile went off
    Exploded {
        owner: usize,
        pos: Vec2,
        /// Enemy drones caught in the blast
        hits: SmallVec<[usize; 4]>,
    },
}

/// Pull the trigger of drone `idx` for one frame.
///
/// Heat rises on every attempt. The shot only releases once the weapon is
/// off cooldown and fire has been held for its charge time. `aim` may be
/// zero, in which case the drone's last aim is used.
pub fn drone_shoot(env: &mut Env, idx: usize, aim: Vec2) -> Option<ProjectileEvent> {
    let weapons = Arc::clone(&env.weapons);
    let default_weapon = env.default_weapon;

    let drone = &mut env.drones[idx];
    debug_assert!(!drone.ammo.is_empty());
    drone.shot_this_step = true;
    drone.heat = drone.heat.saturating_add(1);
    if drone.weapon_cooldown != 0.0 {
        return None;
    }

    let info = weapons.get(drone.weapon);
    drone.weapon_charge = drone.weapon_charge.saturating_add(1);
    if drone.weapon_charge < info.charge_steps() {
        return None;
    }

    if let Ammo::Rounds(rounds) = &mut drone.ammo {
        *rounds = rounds.saturating_sub(1);
    }
    drone.weapon_cooldown = info.cool_down;
    drone.weapon_charge = 0;

    let norm_aim = if aim.is_zero() { drone.last_aim } else { aim.normalize() };
    debug_assert!(norm_aim.is_normalized(1e-3));
    let body = drone.body;
    env.physics.apply_impulse(body, norm_aim * -info.recoil_magnitude);

    for _ in 0..info.num_projectiles {
        create_projectile(env, idx, info, norm_aim);
        DroneStats::count(&mut env.stats[idx].shots_fired, info.weapon_type);
    }
    debug!(drone = idx, weapon = ?info.weapon_type, "Shot fired");

    if env.drones[idx].ammo.is_empty() {
        pickup::change_weapon(env, idx, default_weapon);
        env.drones[idx].weapon_cooldown = weapons.get(default_weapon).cool_down;
    }

    Some(ProjectileEvent::Fired {
        drone: idx,
        weapon: info.weapon_type,
        projectiles: info.num_projectiles,
    })
}

/// Launch one projectile from drone `idx` along `norm_aim`.
///
/// The drone's velocity perpendicular to the aim is partly carried over
/// so strafing does not bend the shot.
pub fn create_projectile(env: &mut Env, idx: usize, info: &WeaponInfo, norm_aim: Vec2) -> ProjectileKey {
    let drone_pos = env.drone_pos(idx);
    let drone_body = env.drones[idx].body;
    let heat = env.drones[idx].heat;
    let pos = drone_pos + norm_aim * (drone::RADIUS + info.radius * 1.5);

    let drone_vel = env.physics.velocity(drone_body);
    let lateral_vel = drone_vel.reject_from(norm_aim) * (info.density / drone::MOVE_AIM_DIVISOR);
    let aim = info.adjust_aim(&mut env.rng, heat, norm_aim);
    let impulse = lateral_vel + aim * info.fire_impulse(&mut env.rng);

    let physics = &mut env.physics;
    let key = env.projectiles.insert_with_key(|key| {
        let mut desc = BodyDesc::new(
            BodyKind::Dynamic,
            pos,
            ShapeDesc::Circle { radius: info.radius },
            category::PROJECTILE,
            category::PROJECTILE_MASK,
        );
        desc.density = info.density;
        desc.friction = 0.0;
        desc.restitution = 1.0;
        desc.max_restitution = true;
        desc.fixed_rotation = true;
        desc.bullet = info.is_physics_bullet;
        desc.events = true;
        desc.user_data = EntityRef::Projectile(key).encode();
        let body = physics.create_body(&desc);
        physics.set_velocity(body, impulse * info.inv_mass);

        Projectile {
            body,
            drone_idx: idx,
            weapon: info.weapon_type,
            pos: CachedPos::new(pos),
            last_pos: pos,
            distance: 0.0,
            bounces: 0,
        }
    });
    key
}

/// Accumulate travel distance and expire projectiles past their range
pub fn projectiles_step(env: &mut Env) {
    let keys: Vec<ProjectileKey> = env.projectiles.keys().collect();
    for key in keys {
        let Some(projectile) = env.projectiles.get_mut(key) else {
            continue;
        };
        let pos = env.physics.position(projectile.body);
        projectile.pos = CachedPos::new(pos);
        projectile.distance += projectile.last_pos.distance_to(pos);
        projectile.last_pos = pos;

        let max_distance = env.weapons.get(projectile.weapon).max_distance;
        if max_distance.is_some_and(|max| projectile.distance >= max) {
            destroy_projectile(env, key);
        }
    }
}

/// Remove a projectile, setting off its explosion if the weapon has one.
/// Its travel distance is credited to the owner's statistics.
pub fn destroy_projectile(env: &mut Env, key: ProjectileKey) -> Option<ProjectileEvent> {
    let projectile = env.projectiles.remove(key)?;
    let owner = projectile.drone_idx;
    let weapon = projectile.weapon;
    env.stats[owner].shot_distances[weapon.index()] += projectile.distance;

    let explosion = env.weapons.get(weapon).explosion;
    let event = explosion.map(|explosion| {
        let pos = env.physics.position(projectile.body);
        env.physics.explode(
            pos,
            explosion.radius,
            explosion.falloff,
            explosion.impulse_per_length,
            explosion.mask,
        );
        env.explosion = Some(ExplosionMarker {
            pos,
            radius: explosion.radius,
            steps_left: round::EXPLOSION_STEPS,
        });

        let reach = ShapeDesc::Circle {
            radius: explosion.radius + explosion.falloff,
        };
        let mut hits = SmallVec::new();
        for data in env.physics.overlapping(reach, pos, category::DRONE) {
            let Some(EntityRef::Drone(hit)) = EntityRef::decode(data) else {
                continue;
            };
            if hit == owner {
                DroneStats::count(&mut env.stats[hit].own_shots_taken, weapon);
                debug!(drone = hit, "Drone caught in own explosion");
                continue;
            }
            env.drones[owner].hit_info.explosion_hit[hit] = true;
            DroneStats::count(&mut env.stats[owner].shots_hit, weapon);
            DroneStats::count(&mut env.stats[hit].shots_taken, weapon);
            debug!(drone = owner, hit, "Explosion hit");
            hits.push(hit);
        }

        ProjectileEvent::Exploded { owner, pos, hits }
    });

    env.physics.destroy_body(projectile.body);
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::tests::test_env;

    fn arm(env: &mut Env, idx: usize, weapon: WeaponType, ammo: Ammo) {
        let drone = &mut env.drones[idx];
        drone.weapon = weapon;
        drone.ammo = ammo;
        drone.weapon_cooldown = 0.0;
        drone.weapon_charge = 0;
    }

    #[test]
    fn test_last_round_reverts_to_default_weapon() {
        let mut env = test_env(42, 2);
        arm(&mut env, 0, WeaponType::MachineGun, Ammo::Rounds(1));

        let event = drone_shoot(&mut env, 0, Vec2::new(1.0, 0.0));
        assert_eq!(
            event,
            Some(ProjectileEvent::Fired {
                drone: 0,
                weapon: WeaponType::MachineGun,
                projectiles: 1,
            })
        );

        let drone = &env.drones[0];
        assert_eq!(drone.weapon, WeaponType::Standard);
        assert_eq!(drone.ammo, Ammo::Infinite);
        assert_eq!(
            drone.weapon_cooldown,
            env.weapons.get(WeaponType::Standard).cool_down
        );

        assert_eq!(env.projectiles.len(), 1);
        let projectile = env.projectiles.values().next().unwrap();
        assert_eq!(projectile.weapon, WeaponType::MachineGun);
        assert_eq!(projectile.distance, 0.0);
        assert_eq!(projectile.bounces, 0);
        assert_eq!(env.stats[0].shots_fired[WeaponType::MachineGun.index()], 1.0);
    }

    #[test]
    fn test_ammo_decrements_on_release_only() {
        let mut env = test_env(3, 2);
        arm(&mut env, 0, WeaponType::Shotgun, Ammo::Rounds(8));

        assert!(drone_shoot(&mut env, 0, Vec2::new(0.0, 1.0)).is_some());
        assert_eq!(env.drones[0].ammo, Ammo::Rounds(7));
        assert_eq!(env.projectiles.len(), 8);

        // On cooldown: heat rises, nothing fires
        assert!(drone_shoot(&mut env, 0, Vec2::new(0.0, 1.0)).is_none());
        assert_eq!(env.drones[0].ammo, Ammo::Rounds(7));
        assert_eq!(env.drones[0].heat, 2);
        assert_eq!(env.stats[0].shots_fired[WeaponType::Shotgun.index()], 8.0);
    }

    #[test]
    fn test_charge_holds_shot() {
        let mut env = test_env(3, 2);
        arm(&mut env, 1, WeaponType::Sniper, Ammo::Rounds(3));
        let steps = env.weapons.get(WeaponType::Sniper).charge_steps();

        for _ in 1..steps {
            assert!(drone_shoot(&mut env, 1, Vec2::new(1.0, 0.0)).is_none());
        }
        assert!(env.projectiles.is_empty());
        assert!(drone_shoot(&mut env, 1, Vec2::new(1.0, 0.0)).is_some());
        assert_eq!(env.projectiles.len(), 1);
        assert_eq!(env.drones[1].weapon_charge, 0);
    }

    #[test]
    fn test_zero_aim_uses_last_aim() {
        let mut env = test_env(9, 2);
        env.drones[0].last_aim = Vec2::new(-1.0, 0.0);
        drone_shoot(&mut env, 0, Vec2::ZERO);

        let drone_pos = env.drone_pos(0);
        let projectile = env.projectiles.values().next().unwrap();
        assert!(projectile.pos.pos.x < drone_pos.x);
        assert!((projectile.pos.pos.y - drone_pos.y).abs() < 1e-4);
    }

    #[test]
    fn test_recoil_pushes_drone_back() {
        let mut env = test_env(9, 2);
        let body = env.drones[0].body;
        drone_shoot(&mut env, 0, Vec2::new(0.0, 1.0));
        assert!(env.physics.velocity(body).y < 0.0);
    }

    #[test]
    fn test_projectile_launch_speed() {
        let mut env = test_env(5, 2);
        drone_shoot(&mut env, 0, Vec2::new(1.0, 0.0));
        let projectile = env.projectiles.values().next().unwrap();
        let speed = env.physics.velocity(projectile.body).length();
        let expected = env.weapons.get(WeaponType::Standard).nominal_speed();
        assert!((speed - expected).abs() < 1e-2);
    }

    #[test]
    fn test_projectile_past_max_distance_removed() {
        let mut env = test_env(5, 2);
        drone_shoot(&mut env, 0, Vec2::new(1.0, 0.0));
        let (key, body) = env
            .projectiles
            .iter()
            .map(|(k, p)| (k, p.body))
            .next()
            .unwrap();
        let max = env.weapons.get(WeaponType::Standard).max_distance.unwrap();
        env.projectiles[key].distance = max;
        let bodies = env.physics.body_count();

        projectiles_step(&mut env);

        assert!(!env.projectiles.contains_key(key));
        assert!(!env.physics.contains(body));
        assert_eq!(env.physics.body_count(), bodies - 1);
        assert!(env.stats[0].shot_distances[WeaponType::Standard.index()] >= max);
    }

    #[test]
    fn test_projectile_within_range_survives() {
        let mut env = test_env(5, 2);
        drone_shoot(&mut env, 0, Vec2::new(1.0, 0.0));
        projectiles_step(&mut env);
        assert_eq!(env.projectiles.len(), 1);
    }

    #[test]
    fn test_imploder_explosion_hits_enemy() {
        let mut env = test_env(12, 2);
        arm(&mut env, 0, WeaponType::Imploder, Ammo::Rounds(1));
        let info = env.weapons.get(WeaponType::Imploder).clone();
        let key = create_projectile(&mut env, 0, &info, Vec2::new(1.0, 0.0));

        // Park the enemy next to the projectile and the owner far away
        let blast = env.projectiles[key].pos.pos;
        let enemy = env.drones[1].body;
        env.physics.set_position(enemy, blast + Vec2::new(3.0, 0.0));
        let owner = env.drones[0].body;
        env.physics.set_position(owner, blast + Vec2::new(-20.0, 0.0));

        let event = destroy_projectile(&mut env, key);
        let Some(ProjectileEvent::Exploded { owner, hits, .. }) = event else {
            panic!("expected explosion");
        };
        assert_eq!(owner, 0);
        assert_eq!(hits.as_slice(), &[1]);
        assert!(env.drones[0].hit_info.explosion_hit[1]);
        assert_eq!(env.stats[1].shots_taken[WeaponType::Imploder.index()], 1.0);
        assert_eq!(env.explosion.map(|e| e.steps_left), Some(round::EXPLOSION_STEPS));
        // Imploders pull inward
        assert!(env.physics.velocity(enemy).x < 0.0);
    }

    #[test]
    fn test_own_explosion_counted_separately() {
        let mut env = test_env(12, 2);
        let info = env.weapons.get(WeaponType::Imploder).clone();
        let key = create_projectile(&mut env, 0, &info, Vec2::new(1.0, 0.0));
        let enemy = env.drones[1].body;
        let blast = env.projectiles[key].pos.pos;
        env.physics.set_position(enemy, blast + Vec2::new(60.0, 60.0));

        destroy_projectile(&mut env, key);
        assert_eq!(env.stats[0].own_shots_taken[WeaponType::Imploder.index()], 1.0);
        assert!(!env.drones[0].hit_info.explosion_hit.iter().any(|&h| h));
    }
}
