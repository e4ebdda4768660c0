//! Reward engine
//!
//! Converts the hits, kills, deaths and pickups recorded during a frame
//! into per-agent rewards. Rewards accumulate over the frames of one step.

use tracing::debug;

use crate::game::constants::{obs::MAX_SPEED, reward};
use crate::game::match_result::RoundEnd;
use crate::game::observation::scale_value;
use crate::game::state::Env;

/// Reward for shooting `victim`, scaled by how much the hit changed its speed
pub fn shot_hit_reward(env: &Env, victim: usize) -> f32 {
    let drone = &env.drones[victim];
    let before = drone.last_velocity.length();
    let after = env.physics.velocity(drone.body).length();
    scale_value((after - before).abs(), MAX_SPEED, true) * reward::SHOT_HIT_COEF
}

/// Reward earned by drone `idx` this frame, excluding the win bonus
pub fn drone_reward(env: &Env, idx: usize) -> f32 {
    let info = &env.drones[idx].hit_info;
    let mut total = 0.0;
    if info.died {
        total += reward::DEATH;
    }
    if info.picked_up.is_some() {
        total += reward::PICKUP;
    }

    for enemy in (0..env.drones.len()).filter(|&enemy| enemy != idx) {
        if info.shot_hit[enemy] {
            total += shot_hit_reward(env, enemy);
        }
        if info.explosion_hit[enemy] {
            total += shot_hit_reward(env, enemy);
        }
        if info.killed[enemy] {
            total += reward::KILL;
        }
    }
    total
}

/// Add this frame's rewards to the agent buffer and drone statistics
pub fn compute_rewards(env: &mut Env, round_end: Option<RoundEnd>) {
    let num_agents = env.rewards.len();

    for idx in 0..env.drones.len() {
        let mut total = drone_reward(env, idx);
        if round_end.and_then(RoundEnd::winner) == Some(idx) {
            total += reward::WIN;
        }
        if total == 0.0 {
            continue;
        }

        if idx < num_agents {
            env.rewards[idx] += total;
        }
        env.stats[idx].reward += total;
        debug!(drone = idx, reward = total, "Reward");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvConfig;
    use crate::game::state::tests::test_env;
    use crate::game::weapons::WeaponType;
    use crate::util::vec2::Vec2;

    #[test]
    fn test_shot_hit_scaled_by_speed_change() {
        let mut env = test_env(10, 2);
        let body = env.drones[1].body;
        env.drones[1].last_velocity = Vec2::ZERO;
        env.physics.set_velocity(body, Vec2::new(0.0, 125.0));

        assert!((shot_hit_reward(&env, 1) - 0.5).abs() < 1e-5);
        env.physics.set_velocity(body, Vec2::new(0.0, 900.0));
        assert_eq!(shot_hit_reward(&env, 1), 1.0);
    }

    #[test]
    fn test_kill_and_hit_rewards() {
        let mut env = test_env(10, 2);
        let body = env.drones[1].body;
        env.physics.set_velocity(body, Vec2::new(25.0, 0.0));
        env.drones[1].last_velocity = Vec2::ZERO;
        env.drones[0].hit_info.shot_hit[1] = true;
        env.drones[0].hit_info.killed[1] = true;

        compute_rewards(&mut env, None);
        assert!((env.rewards()[0] - (0.1 + reward::KILL)).abs() < 1e-5);
        assert_eq!(env.rewards()[1], 0.0);
        assert_eq!(env.stats()[0].reward, env.rewards()[0]);
    }

    #[test]
    fn test_win_and_pickup_rewards() {
        let mut env = test_env(10, 2);
        env.drones[1].hit_info.picked_up = Some(WeaponType::Sniper);

        compute_rewards(&mut env, Some(RoundEnd::LastDroneStanding(1)));
        assert!((env.rewards()[1] - (reward::WIN + reward::PICKUP)).abs() < 1e-6);

        compute_rewards(&mut env, Some(RoundEnd::AllDead));
        assert!((env.rewards()[1] - (reward::WIN + 2.0 * reward::PICKUP)).abs() < 1e-6);
        assert_eq!(env.rewards()[0], 0.0);
    }

    #[test]
    fn test_non_agent_drone_only_updates_stats() {
        let mut env = Env::with_config(EnvConfig {
            num_drones: 2,
            num_agents: 1,
            seed: 10,
            map_index: Some(0),
            ..Default::default()
        })
        .unwrap();
        compute_rewards(&mut env, Some(RoundEnd::LastDroneStanding(1)));
        assert_eq!(env.rewards(), &[0.0]);
        assert_eq!(env.stats()[1].reward, reward::WIN);
    }
}
