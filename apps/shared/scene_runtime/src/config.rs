use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use scene_schema::Validatable;
use std::time::Duration;

use crate::wait::WaitOptions;

/// Defaults applied to waits that do not specify their own options
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[schemars(title = "Scene Runtime Configuration")]
pub struct RuntimeConfig {
    /// Default wait timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    #[schemars(description = "Timeout applied to waits without an explicit one, in milliseconds", range(min = 0))]
    pub default_timeout_ms: u64,

    /// Frames between predicate re-checks
    #[serde(default = "default_poll_interval_frames")]
    #[schemars(description = "Number of frames between predicate re-checks (default: 1)", range(min = 1, max = 1000))]
    pub poll_interval_frames: u32,
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_poll_interval_frames() -> u32 {
    1
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            poll_interval_frames: default_poll_interval_frames(),
        }
    }
}

impl Validatable for RuntimeConfig {}

impl RuntimeConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Wait options derived from this configuration
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout: self.default_timeout(),
            poll_interval_frames: self.poll_interval_frames.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.default_timeout(), Duration::from_secs(60));
        assert_eq!(config.wait_options().poll_interval_frames, 1);
    }

    #[test]
    fn test_custom_values() {
        let json = r#"{ "default_timeout_ms": 250, "poll_interval_frames": 4 }"#;
        let config = RuntimeConfig::from_json_str(json).unwrap();
        let options = config.wait_options();
        assert_eq!(options.timeout, Duration::from_millis(250));
        assert_eq!(options.poll_interval_frames, 4);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let json = r#"{ "poll_interval_frames": 0 }"#;
        assert!(RuntimeConfig::from_json_str(json).is_err());
    }
}
