//! Generation settings.
//!
//! Every knob the pipeline uses is collected here with the reference
//! deployment's values as defaults; override them through the builder or by
//! loading a JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::persist::RetryPolicy;
use crate::stream::StreamBudgets;

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(default, setter(into))]
#[serde(default)]
pub struct GenerationConfig {
    /// Ceiling on one whole generation run.
    pub total_budget: Duration,
    /// Ceiling on producing a single segment.
    pub segment_budget: Duration,
    /// WAV write attempts, including the first.
    pub max_retries: u32,
    /// Pause between write attempts.
    pub retry_delay: Duration,
    /// Expected engine output sample rate in Hz.
    pub sample_rate: u32,
    /// Longest accepted request text, in characters.
    pub max_text_chars: usize,
    /// Directory generated audio is written into.
    pub output_dir: PathBuf,
    /// Delimiter the engine splits request text on.
    pub split_pattern: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            total_budget: Duration::from_secs(300),
            segment_budget: Duration::from_secs(60),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            sample_rate: 24_000,
            max_text_chars: 10_000,
            output_dir: PathBuf::from("outputs"),
            split_pattern: "\n".to_string(),
        }
    }
}

impl GenerationConfig {
    /// Load settings from a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn budgets(&self) -> StreamBudgets {
        StreamBudgets {
            total: self.total_budget,
            per_segment: self.segment_budget,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            delay: self.retry_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GenerationConfig, GenerationConfigBuilder};
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn defaults_match_the_reference_constants() {
        let config = GenerationConfig::default();
        assert_eq!(config.total_budget, Duration::from_secs(300));
        assert_eq!(config.segment_budget, Duration::from_secs(60));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.sample_rate, 24_000);
        assert_eq!(config.max_text_chars, 10_000);
        assert_eq!(config.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.split_pattern, "\n");
    }

    #[test]
    fn builder_overrides_only_what_is_set() {
        let config = GenerationConfigBuilder::default()
            .max_retries(5u32)
            .output_dir("elsewhere")
            .build()
            .expect("builder");

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.output_dir, PathBuf::from("elsewhere"));
        assert_eq!(config.sample_rate, 24_000);
        assert_eq!(config.total_budget, Duration::from_secs(300));
    }

    #[test]
    fn json_round_trip_preserves_overrides() {
        let config = GenerationConfigBuilder::default()
            .max_text_chars(128usize)
            .segment_budget(Duration::from_secs(5))
            .build()
            .expect("builder");

        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: GenerationConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.max_text_chars, 128);
        assert_eq!(parsed.segment_budget, Duration::from_secs(5));
    }

    #[test]
    fn partial_json_keeps_defaults_for_absent_fields() {
        let parsed: GenerationConfig =
            serde_json::from_str(r#"{"max_retries": 7}"#).expect("deserialize");
        assert_eq!(parsed.max_retries, 7);
        assert_eq!(parsed.sample_rate, 24_000);
    }
}
