//! Configuration resolution for rlbuffer.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/rlbuffer/settings.json`)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::relay::RelayConfig;

/// Complete rlbuffer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub demo: DemoSettings,
    #[serde(default)]
    pub logging: LogSettings,
}

/// Which relay policy to run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RelayPolicy {
    /// Stage and flush in batches on the flush window.
    #[default]
    Batched,
    /// Forward one event at a time at `events_per_sec`.
    Paced,
}

impl FromStr for RelayPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batched" => Ok(Self::Batched),
            "paced" => Ok(Self::Paced),
            other => Err(Error::Config(format!(
                "Unknown relay policy '{other}' (expected 'batched' or 'paced')"
            ))),
        }
    }
}

/// Relay settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelaySettings {
    pub policy: RelayPolicy,
    pub capacity: usize,
    pub flush_window_ms: u64,
    /// Only used by the paced policy.
    pub events_per_sec: f64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            policy: RelayPolicy::Batched,
            capacity: 8,
            flush_window_ms: 1000,
            events_per_sec: 2.0,
        }
    }
}

impl RelaySettings {
    pub const fn flush_window(&self) -> Duration {
        Duration::from_millis(self.flush_window_ms)
    }

    pub const fn relay_config(&self) -> RelayConfig {
        RelayConfig::new(self.capacity).with_flush_window(self.flush_window())
    }
}

/// Demo producer settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DemoSettings {
    pub produce_interval_ms: u64,
    /// Stop producing after this many events; run until Ctrl+C when unset.
    pub max_events: Option<u64>,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            produce_interval_ms: 300,
            max_events: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Reject settings the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.relay.capacity == 0 {
            return Err(Error::InvalidSetting {
                name: "relay.capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.relay.flush_window_ms == 0 {
            return Err(Error::InvalidSetting {
                name: "relay.flush_window_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.relay.policy == RelayPolicy::Paced
            && (!self.relay.events_per_sec.is_finite() || self.relay.events_per_sec <= 0.0)
        {
            return Err(Error::InvalidSetting {
                name: "relay.events_per_sec",
                reason: format!(
                    "must be a positive finite number, got {}",
                    self.relay.events_per_sec
                ),
            });
        }
        if self.demo.produce_interval_ms == 0 {
            return Err(Error::InvalidSetting {
                name: "demo.produce_interval_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
///
/// `explicit` must exist when given; the global file is optional. The
/// explicit file is layered over the global one key by key, so it only
/// replaces the settings it names.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let global = global_config_path().filter(|path| path.exists());
    load_layered(global.as_deref(), explicit)
}

fn load_layered(global: Option<&Path>, explicit: Option<&Path>) -> Result<Config> {
    let mut layered = Value::Object(serde_json::Map::new());
    for path in [global, explicit].into_iter().flatten() {
        merge_values(&mut layered, load_config_value(path)?);
    }

    let mut config: Config = serde_json::from_value(layered)?;
    apply_env_overrides(&mut config)?;
    config.validate()?;

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("rlbuffer").join("settings.json"))
}

/// Load a single settings file; missing fields take their defaults.
pub fn load_config_file(path: &Path) -> Result<Config> {
    Ok(serde_json::from_value(load_config_value(path)?)?)
}

fn load_config_value(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Recursively overlay `overlay` onto `base`. Objects merge per key; any
/// other value replaces what was there.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_values(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env_overrides(config: &mut Config) -> Result<()> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Apply `RLBUFFER_*` overrides from `lookup`. Unparseable numbers are
/// ignored; an unknown policy name is an error.
fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(val) = lookup("RLBUFFER_POLICY") {
        config.relay.policy = val.parse()?;
    }
    if let Some(val) = lookup("RLBUFFER_CAPACITY")
        && let Ok(n) = val.parse()
    {
        config.relay.capacity = n;
    }
    if let Some(val) = lookup("RLBUFFER_FLUSH_WINDOW_MS")
        && let Ok(n) = val.parse()
    {
        config.relay.flush_window_ms = n;
    }
    if let Some(val) = lookup("RLBUFFER_EVENTS_PER_SEC")
        && let Ok(n) = val.parse()
    {
        config.relay.events_per_sec = n;
    }
    if let Some(val) = lookup("RLBUFFER_LOG_LEVEL") {
        config.logging.level = val;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_one_second_batched() {
        let config = Config::default();
        assert_eq!(config.relay.policy, RelayPolicy::Batched);
        assert_eq!(config.relay.capacity, 8);
        assert_eq!(config.relay.flush_window(), Duration::from_secs(1));
        assert_eq!(config.demo.produce_interval_ms, 300);
        config.validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"relay": {{"capacity": 3}}, "logging": {{"json": true}}}}"#).unwrap();

        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.relay.capacity, 3);
        assert_eq!(config.relay.flush_window_ms, 1000);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn explicit_file_is_loaded_and_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"relay": {{"policy": "paced", "events_per_sec": 5.0}}}}"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.relay.policy, RelayPolicy::Paced);
        assert!((config.relay.events_per_sec - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn explicit_file_layers_over_global_file() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.json");
        let explicit = dir.path().join("explicit.json");
        std::fs::write(
            &global,
            r#"{"relay": {"capacity": 32, "flush_window_ms": 500}, "logging": {"json": true}}"#,
        )
        .unwrap();
        std::fs::write(
            &explicit,
            r#"{"relay": {"flush_window_ms": 250}, "logging": {"level": "debug"}}"#,
        )
        .unwrap();

        let config = load_layered(Some(&global), Some(&explicit)).unwrap();
        assert_eq!(config.relay.capacity, 32);
        assert_eq!(config.relay.flush_window_ms, 250);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.demo.produce_interval_ms, 300);
    }

    #[test]
    fn merge_replaces_non_object_values() {
        let mut base = serde_json::json!({"relay": {"capacity": 4}, "demo": {"max_events": 9}});
        merge_values(
            &mut base,
            serde_json::json!({"relay": {"policy": "paced"}, "demo": {"max_events": null}}),
        );
        assert_eq!(
            base,
            serde_json::json!({"relay": {"capacity": 4, "policy": "paced"}, "demo": {"max_events": null}})
        );
    }

    #[test]
    fn missing_explicit_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("nope.json")));
        assert!(matches!(result, Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound));
    }

    #[test]
    fn malformed_file_is_a_json_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(load_config_file(file.path()), Err(Error::Json(_))));
    }

    #[test]
    fn wrongly_typed_setting_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("settings.json");
        std::fs::write(&explicit, r#"{"relay": {"capacity": "many"}}"#).unwrap();
        assert!(matches!(load_layered(None, Some(&explicit)), Err(Error::Json(_))));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        let lookup = lookup_from(&[
            ("RLBUFFER_POLICY", "Paced"),
            ("RLBUFFER_CAPACITY", "16"),
            ("RLBUFFER_FLUSH_WINDOW_MS", "250"),
            ("RLBUFFER_EVENTS_PER_SEC", "4.5"),
            ("RLBUFFER_LOG_LEVEL", "debug"),
        ]);
        apply_overrides(&mut config, lookup).unwrap();

        assert_eq!(config.relay.policy, RelayPolicy::Paced);
        assert_eq!(config.relay.capacity, 16);
        assert_eq!(config.relay.flush_window_ms, 250);
        assert!((config.relay.events_per_sec - 4.5).abs() < f64::EPSILON);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn unparseable_numbers_are_ignored() {
        let mut config = Config::default();
        apply_overrides(&mut config, lookup_from(&[("RLBUFFER_CAPACITY", "lots")])).unwrap();
        assert_eq!(config.relay.capacity, 8);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let mut config = Config::default();
        let result = apply_overrides(&mut config, lookup_from(&[("RLBUFFER_POLICY", "bucket")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_zero_capacity_and_window() {
        let mut config = Config::default();
        config.relay.capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidSetting { name: "relay.capacity", .. })
        ));

        let mut config = Config::default();
        config.relay.flush_window_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_checks_rate_only_for_paced() {
        let mut config = Config::default();
        config.relay.events_per_sec = 0.0;
        config.validate().unwrap();

        config.relay.policy = RelayPolicy::Paced;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidSetting { name: "relay.events_per_sec", .. })
        ));
    }

    #[test]
    fn relay_config_carries_window() {
        let settings = RelaySettings {
            capacity: 3,
            flush_window_ms: 200,
            ..RelaySettings::default()
        };
        let relay = settings.relay_config();
        assert_eq!(relay.capacity, 3);
        assert_eq!(relay.flush_window, Duration::from_millis(200));
    }
}
