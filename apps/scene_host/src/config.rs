use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use scene_runtime::RuntimeConfig;
use scene_schema::{SceneManifest, Validatable};
use std::time::Duration;

use crate::scenes;

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Scene Host Configuration")]
#[schemars(description = "Configuration for the headless scene host")]
pub struct HostConfig {
    /// Host name
    #[serde(default = "default_name")]
    #[schemars(description = "Human-readable name shown in the startup banner")]
    pub name: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[schemars(description = "Log level: trace, debug, info, warn, error")]
    #[schemars(regex(pattern = r"^(trace|debug|info|warn|error)$"))]
    pub log_level: String,

    /// Frame rate in Hz
    #[serde(default = "default_tick_rate")]
    #[schemars(description = "Frames per second driven into the runtime", range(min = 1, max = 1000))]
    pub tick_rate: u64,

    /// Frame limit
    #[serde(default)]
    #[schemars(description = "Stop after this many frames, 0 for no limit")]
    pub max_frames: u64,

    /// Pace frames on the wall clock
    #[serde(default = "default_true")]
    #[schemars(description = "When false frames run back to back; without a frame limit the host stops once every procedure ended")]
    pub realtime: bool,

    /// Scene manifest path
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Path to a scene manifest JSON file; the built-in manifest is used when omitted")]
    pub manifest_path: Option<String>,

    /// Runtime defaults
    #[serde(default)]
    #[schemars(description = "Wait defaults for scene procedures")]
    pub runtime: RuntimeConfig,
}

fn default_name() -> String {
    "Scene Host".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_rate() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            tick_rate: default_tick_rate(),
            max_frames: 0,
            realtime: true,
            manifest_path: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Validatable for HostConfig {}

impl HostConfig {
    /// Duration of one frame at the configured tick rate
    pub fn frame_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate.max(1))
    }

    /// Load the scene manifest
    ///
    /// `override_path` wins over `manifest_path`; with neither, the built-in
    /// manifest describing the example assets is returned.
    pub fn load_manifest(&self, override_path: Option<&str>) -> Result<SceneManifest, String> {
        let Some(path) = override_path.or(self.manifest_path.as_deref()) else {
            return Ok(scenes::default_manifest());
        };
        let manifest = SceneManifest::from_json_file(path)
            .map_err(|e| format!("Failed to load manifest '{}': {}", path, e))?;
        manifest
            .check()
            .map_err(|e| format!("Invalid manifest '{}': {}", path, e))?;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let json = r#"{
            "name": "Test Host",
            "log_level": "debug",
            "tick_rate": 30,
            "max_frames": 600,
            "realtime": false,
            "runtime": { "default_timeout_ms": 5000 }
        }"#;

        let config = HostConfig::from_json_str(json).unwrap();
        assert_eq!(config.name, "Test Host");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.max_frames, 600);
        assert!(!config.realtime);
        assert_eq!(config.runtime.default_timeout_ms, 5000);
        assert_eq!(config.runtime.poll_interval_frames, 1);
    }

    #[test]
    fn test_defaults() {
        let config = HostConfig::from_json_str("{}").unwrap();
        assert_eq!(config.name, "Scene Host");
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.max_frames, 0);
        assert!(config.realtime);
        assert!(config.manifest_path.is_none());
        assert_eq!(config.frame_duration(), Duration::from_micros(16_666));
    }

    #[test]
    fn test_invalid_log_level() {
        let json = r#"{ "log_level": "verbose" }"#;
        assert!(HostConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_invalid_tick_rate() {
        let json = r#"{ "tick_rate": 0 }"#;
        assert!(HostConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_builtin_manifest_when_no_path() {
        let manifest = HostConfig::default().load_manifest(None).unwrap();
        assert!(manifest.asset(scenes::house::HOUSE_SRC).is_some());
    }

    #[test]
    fn test_demo_files_match_builtin() {
        let demos = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");
        let config_path = demos.join("scene_host.json");
        let config = HostConfig::from_json_file(config_path.to_str().unwrap()).unwrap();
        assert!(!config.realtime);
        assert_eq!(config.max_frames, 600);

        let manifest_path = demos.join("scene_manifest.json");
        let manifest = config.load_manifest(manifest_path.to_str()).unwrap();
        let builtin = scenes::default_manifest();
        assert_eq!(manifest.player_frame, builtin.player_frame);
        assert_eq!(manifest.assets, builtin.assets);
    }

    #[test]
    fn test_missing_manifest_file() {
        let result = HostConfig::default().load_manifest(Some("./does/not/exist.json"));
        assert!(result.unwrap_err().contains("does/not/exist.json"));
    }
}
