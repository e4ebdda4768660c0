use crate::config::ConfigError;
use crate::game::entity::SpawnKind;

/// Unrecoverable simulation setup failures
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("unknown map layout cell {0:?}")]
    UnknownLayoutCell(char),

    #[error("map '{0}' has inconsistent dimensions")]
    InvalidMap(&'static str),

    #[error("map index {0} is out of range")]
    UnknownMap(usize),

    #[error("no open position left to spawn a {0:?}")]
    NoSpawnPosition(SpawnKind),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}
