//! Round configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration validation failures.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("at least one render variation is required")]
    NoVariations,

    #[error("duplicate render variation {0}")]
    DuplicateVariation(u32),
}

/// Options for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Total wall-clock budget of the round in milliseconds.
    pub round_duration_ms: u64,

    /// TRYON is skipped when less than this much time is left after GATHER.
    pub early_exit_threshold_ms: u64,

    /// Render jobs allowed in flight at once, across the whole round.
    pub render_concurrency: usize,

    /// Delay between two status polls of a render job.
    pub poll_interval_ms: u64,

    /// Status polls before a render job is abandoned as timed out.
    pub poll_attempts: u32,

    /// Upper bound for a single external call, including one status poll.
    pub tool_timeout_ms: u64,

    /// Variation discriminators requested for every outfit.
    pub variations: Vec<u32>,

    /// Result limit passed to every catalog search.
    pub search_limit: usize,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            round_duration_ms: 120_000,
            early_exit_threshold_ms: 20_000,
            render_concurrency: 6,
            poll_interval_ms: 3_000,
            poll_attempts: 30,
            tool_timeout_ms: 30_000,
            variations: vec![11, 77],
            search_limit: 10,
        }
    }
}

impl RoundConfig {
    /// Default options with a different round length.
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            round_duration_ms: duration.as_millis() as u64,
            ..Self::default()
        }
    }

    pub fn round_duration(&self) -> Duration {
        Duration::from_millis(self.round_duration_ms)
    }

    pub fn early_exit_threshold(&self) -> Duration {
        Duration::from_millis(self.early_exit_threshold_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_concurrency == 0 {
            return Err(ConfigError::Zero {
                field: "render_concurrency",
            });
        }
        if self.poll_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "poll_attempts",
            });
        }
        if self.tool_timeout_ms == 0 {
            return Err(ConfigError::Zero {
                field: "tool_timeout_ms",
            });
        }
        if self.search_limit == 0 {
            return Err(ConfigError::Zero {
                field: "search_limit",
            });
        }
        if self.variations.is_empty() {
            return Err(ConfigError::NoVariations);
        }
        for (i, v) in self.variations.iter().enumerate() {
            if self.variations[..i].contains(v) {
                return Err(ConfigError::DuplicateVariation(*v));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_round_options() {
        let config = RoundConfig::default();
        assert_eq!(config.round_duration(), Duration::from_secs(120));
        assert_eq!(config.early_exit_threshold(), Duration::from_secs(20));
        assert_eq!(config.render_concurrency, 6);
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.poll_attempts, 30);
        assert_eq!(config.variations, vec![11, 77]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let config = RoundConfig {
            render_concurrency: 0,
            ..RoundConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "render_concurrency"
            })
        );

        let config = RoundConfig {
            variations: vec![],
            ..RoundConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoVariations));

        let config = RoundConfig {
            variations: vec![3, 5, 3],
            ..RoundConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::DuplicateVariation(3)));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: RoundConfig =
            serde_json::from_str(r#"{"round_duration_ms": 60000, "variations": [1]}"#).unwrap();
        assert_eq!(config.round_duration(), Duration::from_secs(60));
        assert_eq!(config.variations, vec![1]);
        assert_eq!(config.poll_attempts, 30);
    }
}
