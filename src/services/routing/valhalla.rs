//! Valhalla routing engine client
//!
//! Valhalla API documentation:
//! https://valhalla.github.io/valhalla/api/turn-by-turn/api-reference/

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Coordinates;
use super::DurationSource;

/// Valhalla client configuration
#[derive(Debug, Clone)]
pub struct ValhallaConfig {
    /// Base URL of Valhalla server (e.g., "http://localhost:8002")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ValhallaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl ValhallaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// Valhalla routing client
pub struct ValhallaClient {
    client: Client,
    config: ValhallaConfig,
}

impl ValhallaClient {
    pub fn new(config: ValhallaConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    /// Build a two-location route request; only the summary is needed
    fn build_route_request(&self, from: &Coordinates, to: &Coordinates) -> RouteRequest {
        let locations = [from, to]
            .into_iter()
            .map(|c| ValhallaLocation {
                lat: c.lat,
                lon: c.lng,
                // 500m radius – geocoded building centroids may sit off-road
                radius: Some(500),
            })
            .collect();

        RouteRequest {
            locations,
            costing: "auto".to_string(),
            directions_type: "none".to_string(),
        }
    }
}

#[async_trait]
impl DurationSource for ValhallaClient {
    async fn driving_minutes(&self, from: &Coordinates, to: &Coordinates) -> Result<Option<f64>> {
        let request = self.build_route_request(from, to);
        let url = format!("{}/route", self.config.base_url.trim_end_matches('/'));

        debug!("Requesting route duration from Valhalla");

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send route request to Valhalla")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Valhalla route returned error {}: {}", status, body);
        }

        let route_response: RouteResponse = response
            .json()
            .await
            .context("Failed to parse Valhalla route response")?;

        Ok(route_response.trip.summary.time.map(|seconds| seconds / 60.0))
    }

    fn name(&self) -> &str {
        "Valhalla"
    }
}

// Valhalla API types

#[derive(Debug, Serialize, Clone)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
    /// Radius in meters for snapping to roads
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<u32>,
}

#[derive(Debug, Serialize)]
struct RouteRequest {
    locations: Vec<ValhallaLocation>,
    costing: String,
    directions_type: String,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    trip: Trip,
}

#[derive(Debug, Deserialize)]
struct Trip {
    summary: Summary,
}

#[derive(Debug, Deserialize)]
struct Summary {
    /// Time in seconds
    time: Option<f64>,
}
