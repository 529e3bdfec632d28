//! Configuration management

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{self, Context, Result};

use crate::defaults;
use crate::types::{ClockTime, Coordinates};

/// Which geocoder turns stop names into coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocoderBackend {
    Mock,
    Nominatim,
}

impl FromStr for GeocoderBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "nominatim" => Ok(Self::Nominatim),
            other => anyhow::bail!("unknown geocoder backend '{}' (expected mock or nominatim)", other),
        }
    }
}

/// Which service answers driving-duration lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingBackend {
    Haversine,
    Osrm,
    Valhalla,
}

impl FromStr for RoutingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "haversine" => Ok(Self::Haversine),
            "osrm" => Ok(Self::Osrm),
            "valhalla" => Ok(Self::Valhalla),
            other => anyhow::bail!(
                "unknown routing backend '{}' (expected haversine, osrm or valhalla)",
                other
            ),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON file holding the last planned itinerary
    pub store_path: PathBuf,

    pub geocoder_backend: GeocoderBackend,

    /// Nominatim API URL (for geocoding)
    pub nominatim_url: String,
    /// Minimum interval between Nominatim requests
    pub nominatim_rate_limit_ms: u64,
    /// Consecutive failures before the geocoder stops calling Nominatim
    pub nominatim_cb_threshold: u32,
    pub nominatim_cb_recovery_secs: u64,

    pub routing_backend: RoutingBackend,
    /// OSRM routing engine URL
    pub osrm_url: String,
    /// Valhalla routing engine URL
    pub valhalla_url: String,
    /// Upper bound for a single duration lookup
    pub routing_timeout_secs: u64,

    /// Starting point of every route
    pub depot: Coordinates,
    pub departure: ClockTime,
    /// Time spent at each stop before leaving for the next one
    pub dwell_minutes: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("./itinerary.json"),
            geocoder_backend: GeocoderBackend::Mock,
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            nominatim_rate_limit_ms: 1500,
            nominatim_cb_threshold: 3,
            nominatim_cb_recovery_secs: 300,
            routing_backend: RoutingBackend::Haversine,
            osrm_url: "https://router.project-osrm.org".to_string(),
            valhalla_url: "http://localhost:8002".to_string(),
            routing_timeout_secs: 10,
            depot: defaults::default_depot(),
            departure: defaults::default_departure(),
            dwell_minutes: defaults::DEFAULT_DWELL_MINUTES,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(backend) = lookup("GEOCODER_BACKEND") {
            config.geocoder_backend = backend.parse::<GeocoderBackend>().context("GEOCODER_BACKEND")?;
        }
        if let Some(url) = lookup("NOMINATIM_URL") {
            config.nominatim_url = url;
        }
        config.nominatim_rate_limit_ms =
            parse_or(&lookup, "NOMINATIM_RATE_LIMIT_MS", config.nominatim_rate_limit_ms)?;
        config.nominatim_cb_threshold =
            parse_or(&lookup, "NOMINATIM_CB_THRESHOLD", config.nominatim_cb_threshold)?;
        config.nominatim_cb_recovery_secs =
            parse_or(&lookup, "NOMINATIM_CB_RECOVERY_SECS", config.nominatim_cb_recovery_secs)?;

        if let Some(backend) = lookup("ROUTING_BACKEND") {
            config.routing_backend = backend.parse::<RoutingBackend>().context("ROUTING_BACKEND")?;
        }
        if let Some(url) = lookup("OSRM_URL") {
            config.osrm_url = url;
        }
        if let Some(url) = lookup("VALHALLA_URL") {
            config.valhalla_url = url;
        }
        config.routing_timeout_secs =
            parse_or(&lookup, "ROUTING_TIMEOUT_SECS", config.routing_timeout_secs)?;
        if config.routing_timeout_secs == 0 {
            anyhow::bail!("ROUTING_TIMEOUT_SECS must be at least 1");
        }

        config.depot = Coordinates {
            lat: parse_or(&lookup, "DEPOT_LAT", config.depot.lat)?,
            lng: parse_or(&lookup, "DEPOT_LNG", config.depot.lng)?,
        };
        if !config.depot.is_valid() {
            anyhow::bail!("DEPOT_LAT/DEPOT_LNG out of range: {:?}", config.depot);
        }

        if let Some(raw) = lookup("DEPARTURE_TIME") {
            config.departure = raw
                .parse::<ClockTime>()
                .with_context(|| format!("DEPARTURE_TIME must be HH:MM, got '{}'", raw))?;
        }
        config.dwell_minutes = parse_or(&lookup, "DWELL_MINUTES", config.dwell_minutes)?;

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults_when_nothing_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.geocoder_backend, GeocoderBackend::Mock);
        assert_eq!(config.routing_backend, RoutingBackend::Haversine);
        assert_eq!(config.nominatim_url, "https://nominatim.openstreetmap.org");
        assert_eq!(config.departure.to_string(), "09:00");
        assert_eq!(config.dwell_minutes, 30);
        assert_eq!(config.depot, defaults::default_depot());
    }

    #[test]
    fn test_config_reads_routing_settings() {
        let config = Config::from_lookup(lookup_from(&[
            ("ROUTING_BACKEND", "OSRM"),
            ("OSRM_URL", "http://localhost:5000"),
            ("ROUTING_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.routing_backend, RoutingBackend::Osrm);
        assert_eq!(config.osrm_url, "http://localhost:5000");
        assert_eq!(config.routing_timeout_secs, 3);
    }

    #[test]
    fn test_config_reads_depot_and_schedule() {
        let config = Config::from_lookup(lookup_from(&[
            ("DEPOT_LAT", "47.2184"),
            ("DEPOT_LNG", "-1.5536"),
            ("DEPARTURE_TIME", "07:30"),
            ("DWELL_MINUTES", "45"),
        ]))
        .unwrap();

        assert_eq!(config.depot, Coordinates { lat: 47.2184, lng: -1.5536 });
        assert_eq!(config.departure.to_string(), "07:30");
        assert_eq!(config.dwell_minutes, 45);
    }

    #[test]
    fn test_config_rejects_unknown_backend() {
        let err = Config::from_lookup(lookup_from(&[("ROUTING_BACKEND", "google")])).unwrap_err();
        assert!(format!("{:#}", err).contains("ROUTING_BACKEND"));
    }

    #[test]
    fn test_config_rejects_bad_numbers_and_times() {
        assert!(Config::from_lookup(lookup_from(&[("DWELL_MINUTES", "half an hour")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("DEPARTURE_TIME", "9h")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("DEPOT_LAT", "123.0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("ROUTING_TIMEOUT_SECS", "0")])).is_err());
    }

    #[test]
    fn test_config_nominatim_url_uses_local_when_set() {
        let config = Config::from_lookup(lookup_from(&[
            ("GEOCODER_BACKEND", "nominatim"),
            ("NOMINATIM_URL", "http://localhost:8080"),
        ]))
        .unwrap();

        assert_eq!(config.geocoder_backend, GeocoderBackend::Nominatim);
        assert_eq!(config.nominatim_url, "http://localhost:8080");
    }
}
