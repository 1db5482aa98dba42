//! Player configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for [`spawn_player`](crate::spawn_player).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Capacity of the handle → actor command channel.
    pub command_buffer: usize,

    /// How long `play()` may take to settle before the command is treated
    /// as failed.
    pub play_timeout: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            command_buffer: 32,
            play_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_config_default() {
        let config = PlayerConfig::default();
        assert_eq!(config.command_buffer, 32);
        assert_eq!(config.play_timeout, Duration::from_secs(5));
    }
}
