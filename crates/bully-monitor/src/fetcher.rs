//! Pull requests against the status service

use crate::config::DashboardConfig;
use crate::error::{FetchError, MonitorError, Result};
use crate::model::{ClusterSnapshot, ObserverStatus};
use crate::wire;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};

/// One request-response exchange per call, no retries.
///
/// Implementations never touch the status model; results go back to the
/// reconciler.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Fetch the self-report of the serving node
    async fn fetch_observer_status(&self) -> std::result::Result<ObserverStatus, FetchError>;

    /// Fetch the full cluster roster
    async fn fetch_cluster_snapshot(&self) -> std::result::Result<ClusterSnapshot, FetchError>;
}

/// HTTP fetcher for the JSON status endpoints
#[derive(Debug, Clone)]
pub struct HttpSnapshotFetcher {
    client: reqwest::Client,
    observer_url: String,
    cluster_url: String,
}

impl HttpSnapshotFetcher {
    pub fn new(config: &DashboardConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| MonitorError::configuration(format!("Invalid session cookie: {}", e)))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            observer_url: config.observer_url(),
            cluster_url: config.cluster_url(),
        })
    }

    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let detail = wire::error_marker(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            return Err(FetchError::service(format!("HTTP {}: {}", status.as_u16(), detail)));
        }

        Ok(body.to_vec())
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch_observer_status(&self) -> std::result::Result<ObserverStatus, FetchError> {
        let body = self.get(&self.observer_url).await?;
        wire::decode_observer_status(&body)
    }

    async fn fetch_cluster_snapshot(&self) -> std::result::Result<ClusterSnapshot, FetchError> {
        let body = self.get(&self.cluster_url).await?;
        wire::decode_cluster_snapshot(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_uses_configured_endpoints() {
        let config = DashboardConfig {
            base_url: "http://10.0.0.2:5000".to_string(),
            ..Default::default()
        };
        let fetcher = HttpSnapshotFetcher::new(&config).unwrap();

        assert_eq!(fetcher.observer_url, "http://10.0.0.2:5000/api/bully/status");
        assert_eq!(fetcher.cluster_url, "http://10.0.0.2:5000/api/bully/cluster");
    }

    #[test]
    fn test_invalid_cookie_is_a_configuration_error() {
        let config = DashboardConfig {
            session_cookie: Some("bad\ncookie".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            HttpSnapshotFetcher::new(&config),
            Err(MonitorError::Configuration(_))
        ));
    }
}
