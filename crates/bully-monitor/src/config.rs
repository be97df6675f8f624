//! Dashboard configuration management

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main dashboard configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Base URL of the node serving the status endpoints
    pub base_url: String,

    /// Path of the single-node status endpoint
    pub observer_path: String,

    /// Path of the cluster roster endpoint
    pub cluster_path: String,

    /// Socket.IO endpoint of the push channel (`ws://` or `wss://`; a bare
    /// host means `/socket.io/`); pull-only mode when absent
    pub push_url: Option<String>,

    /// Session cookie for endpoints that sit behind a login
    pub session_cookie: Option<String>,

    /// Interval between periodic pulls
    pub refresh_interval: Duration,

    /// Timeout applied to every pull request
    pub request_timeout: Duration,

    /// Wait between push channel reconnection attempts
    pub reconnect_delay: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            observer_path: "/api/bully/status".to_string(),
            cluster_path: "/api/bully/cluster".to_string(),
            push_url: None,
            session_cookie: None,
            refresh_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::configuration(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content)
            .map_err(|e| MonitorError::configuration(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            MonitorError::configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, content).map_err(|e| {
            MonitorError::configuration(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base = reqwest::Url::parse(&self.base_url)
            .map_err(|e| MonitorError::configuration(format!("Invalid base URL: {}", e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(MonitorError::configuration(
                "Base URL must use http or https",
            ));
        }

        for path in [&self.observer_path, &self.cluster_path] {
            if !path.starts_with('/') {
                return Err(MonitorError::configuration(format!(
                    "Endpoint path must start with '/': {}",
                    path
                )));
            }
        }

        if let Some(push_url) = &self.push_url {
            let push = reqwest::Url::parse(push_url)
                .map_err(|e| MonitorError::configuration(format!("Invalid push URL: {}", e)))?;
            if !matches!(push.scheme(), "ws" | "wss") {
                return Err(MonitorError::configuration(
                    "Push URL must use ws or wss",
                ));
            }
        }

        if self.refresh_interval < Duration::from_millis(100) {
            return Err(MonitorError::configuration(
                "Refresh interval must be at least 100ms",
            ));
        }

        if self.request_timeout < Duration::from_millis(100) {
            return Err(MonitorError::configuration(
                "Request timeout must be at least 100ms",
            ));
        }

        if self.reconnect_delay.is_zero() {
            return Err(MonitorError::configuration(
                "Reconnect delay must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Full URL of the single-node status endpoint
    pub fn observer_url(&self) -> String {
        join_url(&self.base_url, &self.observer_path)
    }

    /// Full URL of the cluster roster endpoint
    pub fn cluster_url(&self) -> String {
        join_url(&self.base_url, &self.cluster_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = DashboardConfig::default();
        assert_eq!(config.refresh_interval, Duration::from_secs(5));
        assert!(config.push_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_urls() {
        let config = DashboardConfig {
            base_url: "http://node-2:5000/".to_string(),
            ..Default::default()
        };

        assert_eq!(config.observer_url(), "http://node-2:5000/api/bully/status");
        assert_eq!(config.cluster_url(), "http://node-2:5000/api/bully/cluster");
    }

    #[test]
    fn test_config_validation() {
        let mut config = DashboardConfig::default();

        // Invalid: not a URL
        config.base_url = "node-2".to_string();
        assert!(config.validate().is_err());

        // Invalid: push channel over http
        config.base_url = "http://127.0.0.1:5000".to_string();
        config.push_url = Some("http://127.0.0.1:5000/ws".to_string());
        assert!(config.validate().is_err());

        // Valid push channel
        config.push_url = Some("ws://127.0.0.1:5000/ws".to_string());
        assert!(config.validate().is_ok());

        // Invalid: refresh too fast
        config.refresh_interval = Duration::from_millis(10);
        assert!(config.validate().is_err());

        // Invalid: relative endpoint path
        config.refresh_interval = Duration::from_secs(5);
        config.cluster_path = "api/bully/cluster".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DashboardConfig =
            toml::from_str("base_url = \"http://10.0.0.4:5000\"\n").unwrap();

        assert_eq!(config.base_url, "http://10.0.0.4:5000");
        assert_eq!(config.observer_path, "/api/bully/status");
        assert_eq!(config.refresh_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("dashboard.toml");

        let config = DashboardConfig {
            push_url: Some("ws://127.0.0.1:5000/ws".to_string()),
            session_cookie: Some("session=abc".to_string()),
            ..Default::default()
        };

        config.to_file(&config_path).unwrap();
        assert!(config_path.exists());

        let loaded = DashboardConfig::from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }
}
