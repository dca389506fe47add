//! Browser configuration.
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `timeout_ms` | 30000 | Task deadline |
//! | `max_request_retries` | 3 | Re-issues of a transient failure |
//! | `drain_interval_ms` | 1000 | Delay between checks for outstanding requests |
//! | `user_agent` | desktop Chromium | Sent with every request |
//! | `engine` | all off | Pass-through page switches |
//!
//! Every field is optional in a JSON configuration file:
//!
//! ```
//! use crawlview::BrowserConfig;
//!
//! let config = BrowserConfig::from_json_str(r#"{"timeout_ms": 4000}"#).unwrap();
//! assert_eq!(config.timeout_ms, 4000);
//! assert_eq!(config.max_request_retries, 3);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineSettings;
use crate::network::DEFAULT_MAX_RETRIES;
use crate::utils::{BrowserError, Result};

/// User agent advertised by default
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/535.19 (KHTML, \
     like Gecko) Ubuntu/11.10 Chromium/18.0.1025.142 Chrome/18.0.1025.142 Safari/535.19";

/// Configuration of one browser instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Task deadline in milliseconds
    pub timeout_ms: u64,
    /// How many times a transient failure is re-issued
    pub max_request_retries: u32,
    /// Delay between checks for outstanding requests after render-complete
    pub drain_interval_ms: u64,
    pub user_agent: String,
    pub engine: EngineSettings,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_request_retries: DEFAULT_MAX_RETRIES,
            drain_interval_ms: 1000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            engine: EngineSettings::default(),
        }
    }
}

impl BrowserConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_max_request_retries(mut self, retries: u32) -> Self {
        self.max_request_retries = retries;
        self
    }

    #[must_use]
    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval_ms = interval.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: EngineSettings) -> Self {
        self.engine = engine;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(BrowserError::Config("timeout_ms must be positive".into()));
        }
        if self.drain_interval_ms == 0 {
            return Err(BrowserError::Config(
                "drain_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = BrowserConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_request_retries, 3);
        assert_eq!(config.drain_interval(), Duration::from_secs(1));
        assert!(!config.engine.javascript);
    }

    #[test]
    fn test_partial_json() {
        let config = BrowserConfig::from_json_str(
            r#"{"max_request_retries": 1, "engine": {"images": true}}"#,
        )
        .unwrap();
        assert_eq!(config.max_request_retries, 1);
        assert!(config.engine.images);
        assert!(!config.engine.popups);
        assert_eq!(config.timeout_ms, 30_000);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            BrowserConfig::from_json_str(r#"{"timeout_ms": 0}"#),
            Err(BrowserError::Config(_))
        ));
        assert!(matches!(
            BrowserConfig::from_json_str("{not json"),
            Err(BrowserError::Json(_))
        ));
    }

    #[test]
    fn test_builders() {
        let config = BrowserConfig::default()
            .with_timeout(Duration::from_secs(4))
            .with_max_request_retries(0)
            .with_drain_interval(Duration::from_millis(50));
        assert_eq!(config.timeout_ms, 4000);
        assert_eq!(config.max_request_retries, 0);
        assert_eq!(config.drain_interval_ms, 50);
    }
}
