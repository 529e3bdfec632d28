//! Nominatim geocoding client

use anyhow::{Context, Result};
use serde::Deserialize;
use crate::types::Coordinates;

/// Nominatim API response
#[derive(Debug, Deserialize)]
pub struct NominatimResult {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
}

/// A resolved place
#[derive(Debug, Clone)]
pub struct NominatimPlace {
    pub coordinates: Coordinates,
    pub display_name: String,
}

/// Nominatim geocoding client
pub struct NominatimClient {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimClient {
    /// Create a new client
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("route-planner/0.1")
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn search_url(&self, name: &str, city: &str) -> String {
        let query = format!("{}, {}", name, city);
        format!(
            "{}/search?q={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(&query)
        )
    }

    /// Look up a place by name and city
    pub async fn geocode(&self, name: &str, city: &str) -> Result<Option<NominatimPlace>> {
        let url = self.search_url(name, city);

        let response = self.client
            .get(&url)
            .send()
            .await
            .context("Failed to send geocoding request")?;

        if !response.status().is_success() {
            anyhow::bail!("Nominatim returned status {}", response.status());
        }

        let results: Vec<NominatimResult> = response
            .json()
            .await
            .context("Failed to parse geocoding response")?;

        results.first().map(parse_result).transpose()
    }
}

fn parse_result(result: &NominatimResult) -> Result<NominatimPlace> {
    let lat: f64 = result.lat.parse().context("Invalid latitude")?;
    let lng: f64 = result.lon.parse().context("Invalid longitude")?;

    Ok(NominatimPlace {
        coordinates: Coordinates { lat, lng },
        display_name: result.display_name.clone(),
    })
}
