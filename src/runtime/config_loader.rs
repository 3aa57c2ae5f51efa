//! Collector configuration loader.
//!
//! Loads the collector configuration from YAML, then applies environment
//! overrides (after `.env` has been read by the binary) and validates the
//! result.

use crate::nats::NatsConfig;
use crate::runtime::completion::PolicyKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file used when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "eps-collector.yaml";

/// Error type for configuration loading
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Yaml(serde_yaml::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read config file {}: {}", path.display(), source)
            }
            ConfigError::Yaml(e) => write!(f, "Failed to parse YAML: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Yaml(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

/// Top-level collector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CollectorConfig {
    /// Log filter used when neither `RUST_LOG` nor `--debug` is set
    pub log_level: Option<String>,
    pub transport: TransportConfig,
    pub completion: CompletionConfig,
    pub sinks: SinkConfig,
    pub control: ControlConfig,
}

/// Where telemetry lines come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Device node path, or `tcp://host:port` for a serial bridge
    pub device: String,
    /// Upper bound on a single line read before the policy is polled
    pub read_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyACM0".to_string(),
            read_timeout_ms: 250,
        }
    }
}

/// Completion policy selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub policy: PolicyKind,
    pub interval_ms: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::BoundaryReset,
            interval_ms: 1000,
        }
    }
}

/// Sinks receiving emitted snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Append each snapshot as one JSON line
    pub jsonl_path: Option<PathBuf>,
    /// Emissions kept in memory for the readings API
    pub recent_capacity: usize,
    /// Publish each snapshot to NATS JetStream
    pub nats: Option<NatsConfig>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            jsonl_path: None,
            recent_capacity: 100,
            nats: None,
        }
    }
}

/// HTTP control surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub enabled: bool,
    pub bind: SocketAddr,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl CollectorConfig {
    /// Load configuration from YAML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid YAML
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Resolve the configuration for a run.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_PATH`] is
    /// used if present and defaults otherwise. Environment overrides are
    /// applied and the result is validated.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load_from_file(default_path)?
                } else {
                    tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment-like lookup.
    ///
    /// Recognized keys: `EPS_DEVICE`, `EPS_POLICY`, `EPS_INTERVAL_MS`,
    /// `EPS_JSONL_PATH`, `EPS_BIND`, `NATS_URL`, `NATS_STREAM`.
    /// `NATS_URL` enables the NATS sink when it is not configured.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(device) = lookup("EPS_DEVICE") {
            self.transport.device = device;
        }
        if let Some(policy) = lookup("EPS_POLICY") {
            self.completion.policy = policy.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(interval) = lookup("EPS_INTERVAL_MS") {
            self.completion.interval_ms = interval.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("EPS_INTERVAL_MS is not a number: '{}'", interval))
            })?;
        }
        if let Some(path) = lookup("EPS_JSONL_PATH") {
            self.sinks.jsonl_path = Some(PathBuf::from(path));
        }
        if let Some(bind) = lookup("EPS_BIND") {
            self.control.bind = bind.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("EPS_BIND is not a socket address: '{}'", bind))
            })?;
        }
        if let Some(url) = lookup("NATS_URL") {
            self.sinks.nats.get_or_insert_with(NatsConfig::default).url = url;
        }
        if let Some(stream) = lookup("NATS_STREAM") {
            if let Some(nats) = self.sinks.nats.as_mut() {
                nats.stream_name = stream;
            }
        }
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.device.trim().is_empty() {
            return Err(ConfigError::Invalid("transport.device is empty".to_string()));
        }
        if self.transport.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "transport.read_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.sinks.recent_capacity == 0 {
            return Err(ConfigError::Invalid(
                "sinks.recent_capacity must be greater than zero".to_string(),
            ));
        }
        // Timeouts drive the interval check when the board goes quiet
        if self.completion.policy == PolicyKind::FixedInterval
            && self.completion.interval_ms <= self.transport.read_timeout_ms
        {
            return Err(ConfigError::Invalid(format!(
                "completion.interval_ms ({}) must be longer than transport.read_timeout_ms ({})",
                self.completion.interval_ms, self.transport.read_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.transport.read_timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.completion.interval_ms)
    }

    /// Render the effective configuration.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = CollectorConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.completion.policy, PolicyKind::BoundaryReset);
        assert_eq!(config.interval(), Duration::from_secs(1));
        assert_eq!(config.read_timeout(), Duration::from_millis(250));
        assert!(config.sinks.nats.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "transport:\n  device: tcp://127.0.0.1:7000\ncompletion:\n  policy: fixed_interval\n  interval_ms: 2000\nsinks:\n  jsonl_path: out.jsonl\n"
        )
        .unwrap();

        let config = CollectorConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.transport.device, "tcp://127.0.0.1:7000");
        assert_eq!(config.transport.read_timeout_ms, 250);
        assert_eq!(config.completion.policy, PolicyKind::FixedInterval);
        assert_eq!(config.completion.interval_ms, 2000);
        assert_eq!(config.sinks.jsonl_path, Some(PathBuf::from("out.jsonl")));
        assert!(config.control.enabled);
    }

    #[test]
    fn test_load_missing_file() {
        let result = CollectorConfig::load_from_file("/nonexistent/eps-collector.yaml");

        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = CollectorConfig::from_yaml_str("completion:\n  policy: hourly\n");

        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = CollectorConfig::from_yaml_str("\n").unwrap();
        assert_eq!(config, CollectorConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CollectorConfig::default();
        let lookup = lookup_from(&[
            ("EPS_DEVICE", "/dev/ttyUSB1"),
            ("EPS_POLICY", "fixed-interval"),
            ("EPS_INTERVAL_MS", "5000"),
            ("EPS_BIND", "127.0.0.1:9000"),
            ("NATS_URL", "nats://broker:4222"),
            ("NATS_STREAM", "EPS_TEST"),
        ]);

        config.apply_overrides(lookup).unwrap();

        assert_eq!(config.transport.device, "/dev/ttyUSB1");
        assert_eq!(config.completion.policy, PolicyKind::FixedInterval);
        assert_eq!(config.completion.interval_ms, 5000);
        assert_eq!(config.control.bind, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        let nats = config.sinks.nats.unwrap();
        assert_eq!(nats.url, "nats://broker:4222");
        assert_eq!(nats.stream_name, "EPS_TEST");
    }

    #[test]
    fn test_env_override_rejects_bad_values() {
        let mut config = CollectorConfig::default();
        let result = config.apply_overrides(lookup_from(&[("EPS_INTERVAL_MS", "soon")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = config.apply_overrides(lookup_from(&[("EPS_POLICY", "hourly")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_interval_longer_than_timeout() {
        let mut config = CollectorConfig::default();
        config.completion.policy = PolicyKind::FixedInterval;
        config.completion.interval_ms = 200;

        assert!(config.validate().is_err());

        config.completion.interval_ms = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = CollectorConfig::default();
        config.sinks.recent_capacity = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_round_trip_of_effective_config() {
        let config = CollectorConfig::default();
        let yaml = config.to_yaml().unwrap();

        assert!(yaml.contains("policy: boundary_reset"));
        assert_eq!(CollectorConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
