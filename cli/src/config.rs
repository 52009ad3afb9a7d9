use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{EngineSettings, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "off" => LogLevel::Off,
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Warn,
        }
    }

    pub fn as_tracing_level(self) -> Option<tracing::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Trace => Some(tracing::Level::TRACE),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Sampling cadence in seconds, 1-60.
    pub interval_secs: u64,

    /// Per-process power history ring size.
    pub history_capacity: usize,

    /// Deadline for a single source read before it counts as unavailable.
    pub read_timeout_ms: u64,

    /// Maximum process rows shown in the TUI.
    pub process_count: usize,

    /// Optional per-tick CSV sample log.
    pub csv_log: Option<PathBuf>,

    pub log_level: LogLevel,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            interval_secs: 2,
            history_capacity: 100,
            read_timeout_ms: 1000,
            process_count: 20,
            csv_log: None,
            log_level: LogLevel::Warn,
        }
    }
}

impl UserConfig {
    pub fn load() -> Self {
        let path = config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                eprintln!("Warning: invalid config at {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> color_eyre::eyre::Result<()> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn merge_with_args(&mut self, interval_secs: Option<u64>, csv_log: Option<PathBuf>) {
        if let Some(secs) = interval_secs {
            self.interval_secs = secs;
        }
        if let Some(path) = csv_log {
            self.csv_log = Some(path);
        }
    }

    /// Engine view of the config, with the interval clamped into range so a
    /// hand-edited file cannot produce a zero-second loop.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            interval_secs: self.interval_secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS),
            read_timeout: Duration::from_millis(self.read_timeout_ms.max(1)),
            csv_log: self.csv_log.clone(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("wattop")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("wattop")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn toml_round_trip_preserves_fields() {
        let config = UserConfig {
            interval_secs: 5,
            csv_log: Some(PathBuf::from("/tmp/wattop.csv")),
            log_level: LogLevel::Debug,
            ..UserConfig::default()
        };

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: UserConfig = toml::from_str(&text).unwrap();

        assert_eq!(parsed.interval_secs, 5);
        assert_eq!(parsed.csv_log, Some(PathBuf::from("/tmp/wattop.csv")));
        assert_eq!(parsed.log_level, LogLevel::Debug);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: UserConfig = toml::from_str("interval_secs = 10\n").unwrap();
        assert_eq!(parsed.interval_secs, 10);
        assert_eq!(parsed.history_capacity, 100);
        assert_eq!(parsed.log_level, LogLevel::Warn);
    }

    #[test]
    fn engine_settings_clamp_bad_intervals() {
        let mut config = UserConfig::default();

        config.interval_secs = 0;
        assert_eq!(config.engine_settings().interval_secs, MIN_INTERVAL_SECS);

        config.interval_secs = 600;
        assert_eq!(config.engine_settings().interval_secs, MAX_INTERVAL_SECS);
    }
}
