use crate::game::constants::{drone::MAX_DRONES, round::LOG_BUFFER_SIZE};

/// Configuration errors found by [`EnvConfig::validate`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("num_drones must be 1-{max}, got {got}")]
    DroneCount { got: usize, max: usize },

    #[error("num_agents must be 1-{num_drones}, got {got}")]
    AgentCount { got: usize, num_drones: usize },

    #[error("map index {got} out of range (catalog has {len})")]
    MapIndex { got: usize, len: usize },

    #[error("log_capacity must be at least 1")]
    LogCapacity,
}

/// Environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    /// Drones in the arena
    pub num_drones: usize,
    /// Drones driven by the action buffer; the rest are idle
    pub num_agents: usize,
    /// Seed of the environment's RNG
    pub seed: u64,
    /// Play only this map; `None` rolls a map on every reset
    pub map_index: Option<usize>,
    /// Rounds kept in the log buffer before the oldest is dropped
    pub log_capacity: usize,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            num_drones: 2,
            num_agents: 2,
            seed: 0,
            map_index: None,
            log_capacity: LOG_BUFFER_SIZE,
        }
    }
}

impl EnvConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(drones) = parse_var::<usize>("ARENA_NUM_DRONES") {
            if (1..=MAX_DRONES).contains(&drones) {
                config.num_drones = drones;
            } else {
                tracing::warn!("ARENA_NUM_DRONES must be 1-{}, using default", MAX_DRONES);
            }
        }
        config.num_agents = config.num_drones;

        if let Some(agents) = parse_var::<usize>("ARENA_NUM_AGENTS") {
            if agents >= 1 && agents <= config.num_drones {
                config.num_agents = agents;
            } else {
                tracing::warn!(
                    "ARENA_NUM_AGENTS must be 1-{}, using {}",
                    config.num_drones,
                    config.num_agents
                );
            }
        }

        if let Some(seed) = parse_var::<u64>("ARENA_SEED") {
            config.seed = seed;
        }

        if let Some(map) = parse_var::<usize>("ARENA_MAP") {
            config.map_index = Some(map);
        }

        if let Some(capacity) = parse_var::<usize>("ARENA_LOG_CAPACITY") {
            if capacity > 0 {
                config.log_capacity = capacity;
            } else {
                tracing::warn!("ARENA_LOG_CAPACITY must be > 0, using default");
            }
        }

        config
    }

    /// Validate configuration against the number of available maps
    pub fn validate(&self, num_maps: usize) -> Result<(), ConfigError> {
        if self.num_drones == 0 || self.num_drones > MAX_DRONES {
            return Err(ConfigError::DroneCount {
                got: self.num_drones,
                max: MAX_DRONES,
            });
        }
        if self.num_agents == 0 || self.num_agents > self.num_drones {
            return Err(ConfigError::AgentCount {
                got: self.num_agents,
                num_drones: self.num_drones,
            });
        }
        if let Some(map) = self.map_index {
            if map >= num_maps {
                return Err(ConfigError::MapIndex {
                    got: map,
                    len: num_maps,
                });
            }
        }
        if self.log_capacity == 0 {
            return Err(ConfigError::LogCapacity);
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EnvConfig::default();
        assert_eq!(config.num_drones, 2);
        assert_eq!(config.num_agents, 2);
        assert_eq!(config.map_index, None);
        assert!(config.validate(5).is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = EnvConfig::load_or_default();
        assert!(config.num_drones > 0);
        assert!(config.num_agents <= config.num_drones);
    }

    #[test]
    fn test_validate_drone_count() {
        let config = EnvConfig {
            num_drones: MAX_DRONES + 1,
            ..EnvConfig::default()
        };
        assert_eq!(
            config.validate(5),
            Err(ConfigError::DroneCount {
                got: MAX_DRONES + 1,
                max: MAX_DRONES
            })
        );
    }

    #[test]
    fn test_validate_agents_exceed_drones() {
        let config = EnvConfig {
            num_drones: 2,
            num_agents: 3,
            ..EnvConfig::default()
        };
        assert!(matches!(config.validate(5), Err(ConfigError::AgentCount { .. })));
    }

    #[test]
    fn test_validate_map_index() {
        let config = EnvConfig {
            map_index: Some(5),
            ..EnvConfig::default()
        };
        assert_eq!(config.validate(5), Err(ConfigError::MapIndex { got: 5, len: 5 }));
    }
}
