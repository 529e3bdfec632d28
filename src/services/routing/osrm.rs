//! OSRM routing engine client
//!
//! OSRM route service documentation:
//! https://project-osrm.org/docs/v5.24.0/api/#route-service

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::types::Coordinates;
use super::DurationSource;

/// OSRM client configuration
#[derive(Debug, Clone)]
pub struct OsrmConfig {
    /// Base URL of OSRM server (e.g., "https://router.project-osrm.org")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl OsrmConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// OSRM routing client
pub struct OsrmClient {
    client: Client,
    config: OsrmConfig,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .user_agent("route-planner/0.1")
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    /// OSRM takes `lng,lat` pairs separated by `;`
    fn route_url(&self, from: &Coordinates, to: &Coordinates) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=false",
            self.config.base_url.trim_end_matches('/'),
            from.lng,
            from.lat,
            to.lng,
            to.lat
        )
    }
}

#[async_trait]
impl DurationSource for OsrmClient {
    async fn driving_minutes(&self, from: &Coordinates, to: &Coordinates) -> Result<Option<f64>> {
        let url = self.route_url(from, to);
        debug!("Requesting route duration from OSRM: {}", url);

        let response = self.client
            .get(&url)
            .send()
            .await
            .context("Failed to send route request to OSRM")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OSRM returned error {}: {}", status, body);
        }

        let route_response: RouteResponse = response
            .json()
            .await
            .context("Failed to parse OSRM route response")?;

        Ok(route_response.driving_minutes())
    }

    fn name(&self) -> &str {
        "OSRM"
    }
}

// OSRM API types

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Travel time in seconds
    duration: f64,
}

impl RouteResponse {
    fn driving_minutes(&self) -> Option<f64> {
        self.routes.first().map(|route| route.duration / 60.0)
    }
}
