use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProbeConfig {
    #[serde(default = "default_ping_count")]
    pub ping_count: u16,
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_ping_count() -> u16 {
    10
}

fn default_ping_timeout_ms() -> u64 {
    1000
}

fn default_ping_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ping_count: default_ping_count(),
            ping_timeout_ms: default_ping_timeout_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            log_level: default_log_level(),
        }
    }
}

impl ProbeConfig {
    /// Defaults when no file is given, otherwise the parsed and validated file.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_file_config(path).await?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    async fn load_file_config(file_path: &Path) -> Result<ProbeConfig> {
        if !file_path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", file_path.display()));
        }

        let content = fs::read_to_string(file_path).await?;
        let config: ProbeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!("Invalid log level: {}. Valid levels are: trace, debug, info, warn, error", self.log_level))
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ping_count == 0 {
            return Err(anyhow::anyhow!("ping_count must be at least 1"));
        }
        if self.ping_timeout_ms == 0 {
            return Err(anyhow::anyhow!("ping_timeout_ms must be greater than 0"));
        }
        self.get_tracing_level().map(|_| ())
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: ProbeConfig = serde_json::from_str(r#"{"ping_count": 3}"#).unwrap();
        assert_eq!(config.ping_count, 3);
        assert_eq!(config.ping_timeout_ms, 1000);
        assert_eq!(config.ping_interval_ms, 1000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn log_levels() {
        let mut config = ProbeConfig::default();
        config.log_level = "WARNING".to_string();
        assert_eq!(config.get_tracing_level().unwrap(), tracing::Level::WARN);
        config.log_level = "loud".to_string();
        assert!(config.get_tracing_level().is_err());
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_ping_count_is_rejected() {
        let config = ProbeConfig {
            ping_count: 0,
            ..ProbeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn no_path_means_defaults() {
        assert_eq!(ProbeConfig::load(None).await.unwrap(), ProbeConfig::default());
    }

    #[tokio::test]
    async fn loads_and_validates_file() {
        let file = temp_config(r#"{"ping_count": 2, "log_level": "debug"}"#);
        let config = ProbeConfig::load(Some(file.path())).await.unwrap();
        assert_eq!(config.ping_count, 2);
        assert_eq!(config.get_tracing_level().unwrap(), tracing::Level::DEBUG);

        let bad = temp_config(r#"{"ping_timeout_ms": 0}"#);
        assert!(ProbeConfig::load(Some(bad.path())).await.is_err());

        let garbled = temp_config("{not json");
        assert!(ProbeConfig::load(Some(garbled.path())).await.is_err());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let err = ProbeConfig::load(Some(path.as_path())).await.unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
