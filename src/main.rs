use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use drone_arena::config::EnvConfig;
use drone_arena::game::game_loop::GameLoopEvent;
use drone_arena::game::match_result::RoundEnd;
use drone_arena::game::state::Env;

const DEFAULT_RUN_STEPS: u64 = 10_000;

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Drone Arena v{}", env!("CARGO_PKG_VERSION"));

    let config = EnvConfig::load_or_default();
    info!(
        "Configuration loaded: drones={}, agents={}, seed={}, map={:?}",
        config.num_drones, config.num_agents, config.seed, config.map_index
    );

    let steps = match std::env::var("ARENA_RUN_STEPS") {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("ARENA_RUN_STEPS must be a number, using {}", DEFAULT_RUN_STEPS);
            DEFAULT_RUN_STEPS
        }),
        Err(_) => DEFAULT_RUN_STEPS,
    };

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed ^ 0x9e37_79b9_7f4a_7c15);
    let mut env = Env::with_config(config)?;
    info!("Map '{}' ready, observation size {}", env.map().name, env.obs_size());

    let mut rounds = 0u64;
    for _ in 0..steps {
        for v in env.actions_mut().iter_mut() {
            *v = rng.gen_range(-1.0..=1.0);
        }

        for event in env.step()? {
            if let GameLoopEvent::RoundOver { end, length } = event {
                rounds += 1;
                match end {
                    RoundEnd::LastDroneStanding(winner) => {
                        info!("Round {} won by drone {} after {} frames", rounds, winner, length)
                    }
                    RoundEnd::AllDead => info!("Round {} ended with no survivors after {} frames", rounds, length),
                }
            }
        }
    }

    let Some(summary) = env.aggregate_logs() else {
        info!("No rounds finished in {} steps", steps);
        return Ok(());
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Ok(path) = std::env::var("ARENA_LOG_FILE") {
        let bytes = bincode::serde::encode_to_vec(&summary, bincode::config::standard())?;
        std::fs::write(&path, bytes)?;
        info!("Wrote aggregated log to {}", path);
    }

    Ok(())
}
