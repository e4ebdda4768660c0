//! Simulation step loop
//!
//! One `step()` consumes the action buffer and runs `FRAME_SKIP` fixed
//! frames. A frame applies actions, advances physics, runs the systems in
//! a fixed order and scores the result. A finished round stops the frame
//! loop early and is torn down at the start of the next step.

use tracing::debug;

use crate::error::SimError;
use crate::game::constants::{
    drone::ACTION_SIZE,
    physics::{DELTA_TIME, FRAME_SKIP, SUBSTEPS},
};
use crate::game::match_result::{check_round_end, LogEntry, RoundEnd};
use crate::game::observation;
use crate::game::reward;
use crate::game::state::Env;
use crate::game::systems::arena::{self, ArenaEvent};
use crate::game::systems::drone::{self, Action};
use crate::game::systems::projectile::{self, ProjectileEvent};
use crate::game::systems::{collision, pickup};

/// Events produced during a step
#[derive(Debug, Clone, PartialEq)]
pub enum GameLoopEvent {
    Arena(ArenaEvent),
    Projectile(ProjectileEvent),
    /// The round ended; the next step starts a new one
    RoundOver { end: RoundEnd, length: u32 },
}

impl Env {
    /// Advance the simulation by one agent step.
    ///
    /// Reads the action buffer and rewrites the reward, terminal and
    /// observation buffers.
    pub fn step(&mut self) -> Result<Vec<GameLoopEvent>, SimError> {
        if self.needs_reset {
            self.reset()?;
        }
        self.rewards.fill(0.0);

        let mut events = Vec::new();
        for _ in 0..FRAME_SKIP {
            if self.frame(&mut events) {
                break;
            }
        }

        observation::compute_observations(self);
        Ok(events)
    }

    /// Tear down the round and set up a new one
    pub fn reset(&mut self) -> Result<(), SimError> {
        self.clear();
        self.setup()
    }

    /// Whether the last step ended the round
    pub fn terminated(&self) -> bool {
        self.needs_reset
    }

    /// Run one frame. Returns true when the round ended.
    fn frame(&mut self, events: &mut Vec<GameLoopEvent>) -> bool {
        self.episode_length += 1;
        if let Some(marker) = self.explosion.as_mut() {
            marker.steps_left = marker.steps_left.saturating_sub(1);
            if marker.steps_left == 0 {
                self.explosion = None;
            }
        }

        for drone in &mut self.drones {
            drone.last_velocity = self.physics.velocity(drone.body);
            drone.hit_info = Default::default();
        }

        let num_agents = self.config.num_agents;
        for agent in 0..num_agents {
            let offset = agent * ACTION_SIZE;
            let action = Action::decode(&self.actions[offset..offset + ACTION_SIZE]);
            if let Some(event) = drone::apply_action(self, agent, action) {
                events.push(GameLoopEvent::Projectile(event));
            }
        }

        let step_events = self.physics.step(DELTA_TIME, SUBSTEPS);
        self.invalidate_positions();

        events.extend(arena::update(self).into_iter().map(GameLoopEvent::Arena));
        projectile::projectiles_step(self);
        collision::handle_contact_events(self, &step_events);
        collision::handle_sensor_events(self, &step_events);

        for idx in 0..self.drones.len() {
            drone::drone_step(self, idx);
            if self.drones[idx].dead && idx < num_agents {
                self.terminals[idx] = 1;
            }
        }
        pickup::pickups_step(self);

        let end = check_round_end(&self.drones);
        reward::compute_rewards(self, end);

        match end {
            Some(end) => {
                self.finish_round(end);
                events.push(GameLoopEvent::RoundOver {
                    end,
                    length: self.episode_length,
                });
                true
            }
            None => false,
        }
    }

    /// Flush the round's statistics into the log and flag a reset
    fn finish_round(&mut self, end: RoundEnd) {
        if let Some(winner) = end.winner() {
            self.stats[winner].wins = 1.0;
        }
        for idx in 0..self.drones.len() {
            let pos = self.drone_pos(idx);
            self.stats[idx].abs_distance_traveled = self.drones[idx].spawn_pos.distance_to(pos);
        }
        for projectile in self.projectiles.values() {
            self.stats[projectile.drone_idx].shot_distances[projectile.weapon.index()] +=
                projectile.distance;
        }

        self.terminals.fill(1);
        self.logs.push(LogEntry {
            length: self.episode_length as f32,
            stats: self.stats.clone(),
        });
        self.needs_reset = true;

        match end {
            RoundEnd::LastDroneStanding(winner) => {
                debug!(winner, length = self.episode_length, "Round over")
            }
            RoundEnd::AllDead => debug!(length = self.episode_length, "Round over with no survivors"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::config::EnvConfig;
    use crate::game::constants::round;
    use crate::game::state::tests::test_env;
    use crate::game::weapons::{Ammo, WeaponType};
    use crate::util::vec2::Vec2;

    fn random_actions(rng: &mut ChaCha8Rng, env: &mut Env) {
        for v in env.actions_mut().iter_mut() {
            *v = rng.gen_range(-1.0..=1.0);
        }
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let mut a = test_env(11, 3);
        let mut b = test_env(11, 3);
        let mut rng_a = ChaCha8Rng::seed_from_u64(5);
        let mut rng_b = ChaCha8Rng::seed_from_u64(5);

        for _ in 0..300 {
            random_actions(&mut rng_a, &mut a);
            random_actions(&mut rng_b, &mut b);
            let events_a = a.step().unwrap();
            let events_b = b.step().unwrap();

            assert_eq!(events_a, events_b);
            assert_eq!(a.observations(), b.observations());
            assert_eq!(a.rewards(), b.rewards());
            assert_eq!(a.terminals(), b.terminals());
        }
    }

    #[test]
    fn test_observations_stay_in_range() {
        let mut env = test_env(12, 4);
        let layout = *env.obs_layout();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        for _ in 0..200 {
            random_actions(&mut rng, &mut env);
            env.step().unwrap();
            assert_eq!(env.observations().len(), layout.total() * 4);
            for agent in 0..4 {
                let buf = env.agent_observation(agent).unwrap();
                assert!(buf[..layout.map().start].iter().all(|v| (0.0..=1.0).contains(v)));
            }
        }
    }

    #[test]
    fn test_agent_sees_own_drone_first_after_steps() {
        let mut env = test_env(13, 3);
        let layout = *env.obs_layout();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for _ in 0..20 {
            random_actions(&mut rng, &mut env);
            env.step().unwrap();
        }

        let canonical = env.agent_observation(0).unwrap().to_vec();
        for agent in 1..3 {
            let buf = env.agent_observation(agent).unwrap();
            assert_eq!(
                &buf[layout.drone_block(0)],
                &canonical[layout.drone_block(agent)]
            );
        }
    }

    #[test]
    fn test_frame_skip_advances_clock() {
        let mut env = test_env(14, 2);
        let events = env.step().unwrap();
        assert!(events.is_empty());
        assert_eq!(env.episode_length(), FRAME_SKIP as u32);
        assert_eq!(
            env.round_state().steps_left,
            round::ROUND_STEPS - FRAME_SKIP as u32
        );
        assert!(!env.terminated());
    }

    #[test]
    fn test_round_over_then_reset() {
        let mut env = test_env(15, 2);
        env.kill_drone(1, Some(0));

        let events = env.step().unwrap();
        assert!(matches!(
            events.last(),
            Some(GameLoopEvent::RoundOver {
                end: RoundEnd::LastDroneStanding(0),
                length: 1
            })
        ));
        assert!(env.terminated());
        assert_eq!(env.terminals(), &[1, 1]);
        assert!(env.rewards()[0] >= 1.0);
        assert_eq!(env.logs().len(), 1);
        let log = env.logs().iter().next().unwrap();
        assert_eq!(log.stats[0].wins, 1.0);
        assert_eq!(log.stats[1].wins, 0.0);

        env.step().unwrap();
        assert!(!env.terminated());
        assert!(env.drones().iter().all(|d| !d.dead));
        assert_eq!(env.terminals(), &[0, 0]);
        assert_eq!(env.episode_length(), FRAME_SKIP as u32);
        assert_eq!(env.stats()[0].wins, 0.0);
        assert_eq!(env.logs().len(), 1);
    }

    #[test]
    fn test_dead_agent_terminal_before_round_end() {
        let mut env = test_env(16, 3);
        env.kill_drone(1, None);
        env.step().unwrap();
        assert!(!env.terminated());
        assert_eq!(env.terminals(), &[0, 1, 0]);
    }

    #[test]
    fn test_sudden_death_through_step() {
        let mut env = test_env(17, 2);
        let walls = env.walls().count();
        env.round.steps_left = 1;
        env.round.sudden_death_steps = 1;

        let events = env.step().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            GameLoopEvent::Arena(ArenaEvent::SuddenDeath { ring: 1, .. })
        )));
        assert_eq!(env.walls().count(), walls + 72);
        assert_eq!(env.round_state().sudden_death_walls, 1);
        assert_eq!(
            env.round_state().sudden_death_steps,
            round::SUDDEN_DEATH_STEPS - (FRAME_SKIP as u32 - 1)
        );
    }

    #[test]
    fn test_single_drone_round_ends_immediately() {
        let mut env = Env::with_config(EnvConfig {
            num_drones: 1,
            num_agents: 1,
            map_index: Some(0),
            ..EnvConfig::default()
        })
        .unwrap();
        env.step().unwrap();
        assert!(env.terminated());
        assert_eq!(env.terminals(), &[1]);
        assert_eq!(env.logs().iter().next().unwrap().stats[0].wins, 1.0);
    }

    #[test]
    fn test_firing_through_action_buffer() {
        let mut env = test_env(18, 2);
        let fire = Action {
            aim: Vec2::new(1.0, 0.0),
            fire: true,
            ..Action::default()
        };
        fire.encode(&mut env.actions_mut()[..ACTION_SIZE]);

        let events = env.step().unwrap();
        let fired = events
            .iter()
            .filter(|e| matches!(e, GameLoopEvent::Projectile(ProjectileEvent::Fired { drone: 0, .. })))
            .count();
        // Standard weapon cooldown spans all four frames
        assert_eq!(fired, 1);
        assert_eq!(env.stats()[0].shots_fired[WeaponType::Standard.index()], 1.0);
    }

    #[test]
    fn test_last_round_through_step_reverts_weapon() {
        let mut env = test_env(42, 2);
        {
            let drone = &mut env.drones[0];
            drone.weapon = WeaponType::MachineGun;
            drone.ammo = Ammo::Rounds(1);
            drone.weapon_cooldown = 0.0;
            drone.weapon_charge = 0;
        }
        let fire = Action {
            aim: Vec2::new(1.0, 0.0),
            fire: true,
            ..Action::default()
        };
        fire.encode(&mut env.actions_mut()[..ACTION_SIZE]);

        let events = env.step().unwrap();
        let fired: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                GameLoopEvent::Projectile(ProjectileEvent::Fired { drone: 0, weapon, .. }) => Some(*weapon),
                _ => None,
            })
            .collect();
        assert_eq!(fired, vec![WeaponType::MachineGun]);

        let frames = env.episode_length() as f32;
        let drone = &env.drones()[0];
        assert_eq!(drone.weapon, WeaponType::Standard);
        assert_eq!(drone.ammo, Ammo::Infinite);
        let expected = env.weapons().get(WeaponType::Standard).cool_down - frames * DELTA_TIME;
        assert!((drone.weapon_cooldown - expected.max(0.0)).abs() < 1e-4);
        assert!(drone.weapon_cooldown > 0.0);

        let shots = &env.stats()[0].shots_fired;
        assert_eq!(shots[WeaponType::MachineGun.index()], 1.0);
        assert_eq!(shots[WeaponType::Standard.index()], 0.0);
    }

    #[test]
    fn test_aggregate_logs_after_rounds() {
        let mut env = test_env(19, 2);
        for _ in 0..2 {
            env.kill_drone(1, None);
            env.step().unwrap();
            env.step().unwrap();
        }
        let agg = env.aggregate_logs().unwrap();
        assert_eq!(agg.length, 1.0);
        assert_eq!(agg.stats[0].wins, 1.0);
        assert!(env.logs().is_empty());
    }
}
