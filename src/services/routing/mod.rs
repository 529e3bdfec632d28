//! Driving duration estimates between two locations
//!
//! The sequencer only sees [`DurationOracle`], which never fails. Network
//! backends implement the fallible [`DurationSource`] and are wrapped in
//! [`GuardedOracle`], which bounds every call and turns any failure into a
//! zero-minute estimate.

mod osrm;
mod valhalla;

pub use osrm::{OsrmClient, OsrmConfig};
pub use valhalla::{ValhallaClient, ValhallaConfig};

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::{Config, RoutingBackend};
use crate::services::geo;
use crate::types::Coordinates;

/// Estimated driving minutes between two coordinates.
///
/// Implementations must not fail: a lookup that cannot be answered returns
/// `0.0`.
#[async_trait]
pub trait DurationOracle: Send + Sync {
    async fn estimate(&self, from: &Coordinates, to: &Coordinates) -> f64;

    /// Get oracle name for logging
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: DurationOracle + ?Sized> DurationOracle for &T {
    async fn estimate(&self, from: &Coordinates, to: &Coordinates) -> f64 {
        (**self).estimate(from, to).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: DurationOracle + ?Sized> DurationOracle for Box<T> {
    async fn estimate(&self, from: &Coordinates, to: &Coordinates) -> f64 {
        (**self).estimate(from, to).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A routing backend that can fail or find no route.
#[async_trait]
pub trait DurationSource: Send + Sync {
    /// Driving minutes, or `None` when the backend has no route.
    async fn driving_minutes(&self, from: &Coordinates, to: &Coordinates) -> Result<Option<f64>>;

    fn name(&self) -> &str;
}

/// Applies a hard timeout to a [`DurationSource`] and degrades every failure
/// to a zero-minute estimate.
pub struct GuardedOracle<S> {
    source: S,
    timeout: Duration,
}

impl<S: DurationSource> GuardedOracle<S> {
    pub fn new(source: S, timeout: Duration) -> Self {
        Self { source, timeout }
    }
}

#[async_trait]
impl<S: DurationSource> DurationOracle for GuardedOracle<S> {
    async fn estimate(&self, from: &Coordinates, to: &Coordinates) -> f64 {
        match tokio::time::timeout(self.timeout, self.source.driving_minutes(from, to)).await {
            Ok(Ok(Some(minutes))) if minutes.is_finite() && minutes >= 0.0 => minutes,
            Ok(Ok(Some(minutes))) => {
                warn!("{} returned unusable duration {}, assuming 0 min", self.source.name(), minutes);
                0.0
            }
            Ok(Ok(None)) => {
                warn!("{} found no route {:?} -> {:?}, assuming 0 min", self.source.name(), from, to);
                0.0
            }
            Ok(Err(e)) => {
                warn!("{} duration lookup failed: {:#}, assuming 0 min", self.source.name(), e);
                0.0
            }
            Err(_) => {
                warn!(
                    "{} duration lookup timed out after {:?}, assuming 0 min",
                    self.source.name(),
                    self.timeout
                );
                0.0
            }
        }
    }

    fn name(&self) -> &str {
        self.source.name()
    }
}

/// Ordered coordinate pair, compared bit-for-bit
type PairKey = (u64, u64, u64, u64);

fn pair_key(from: &Coordinates, to: &Coordinates) -> PairKey {
    (
        from.lat.to_bits(),
        from.lng.to_bits(),
        to.lat.to_bits(),
        to.lng.to_bits(),
    )
}

/// Caches estimates per ordered coordinate pair.
///
/// Meant to live for a single planning run; the sequencer creates a fresh one
/// on every call.
pub struct MemoizedOracle<O> {
    inner: O,
    cache: Mutex<HashMap<PairKey, f64>>,
}

impl<O: DurationOracle> MemoizedOracle<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct pairs looked up so far
    pub fn cached_pairs(&self) -> usize {
        self.cache.lock().len()
    }
}

#[async_trait]
impl<O: DurationOracle> DurationOracle for MemoizedOracle<O> {
    async fn estimate(&self, from: &Coordinates, to: &Coordinates) -> f64 {
        let key = pair_key(from, to);
        let cached = self.cache.lock().get(&key).copied();
        if let Some(minutes) = cached {
            return minutes;
        }

        let minutes = self.inner.estimate(from, to).await;
        self.cache.lock().insert(key, minutes);
        minutes
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Offline oracle: straight-line distance × road coefficient at a constant speed
pub struct HaversineOracle {
    /// Coefficient for converting straight-line to road distance (default: 1.3)
    road_coefficient: f64,
    /// Average speed in km/h for time estimation (default: 40)
    average_speed_kmh: f64,
}

impl Default for HaversineOracle {
    fn default() -> Self {
        Self {
            road_coefficient: geo::ROAD_COEFFICIENT,
            average_speed_kmh: geo::AVERAGE_SPEED_KMH,
        }
    }
}

impl HaversineOracle {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurationOracle for HaversineOracle {
    async fn estimate(&self, from: &Coordinates, to: &Coordinates) -> f64 {
        geo::travel_time_minutes(from, to, self.road_coefficient, self.average_speed_kmh)
    }

    fn name(&self) -> &str {
        "haversine"
    }
}

/// Create the duration oracle selected by `ROUTING_BACKEND`
pub fn create_duration_oracle(config: &Config) -> Box<dyn DurationOracle> {
    let timeout = Duration::from_secs(config.routing_timeout_secs);

    match config.routing_backend {
        RoutingBackend::Haversine => {
            debug!("Using haversine duration estimates");
            Box::new(HaversineOracle::new())
        }
        RoutingBackend::Osrm => {
            debug!("Using OSRM at {}", config.osrm_url);
            let client = OsrmClient::new(OsrmConfig {
                timeout_seconds: config.routing_timeout_secs,
                ..OsrmConfig::new(config.osrm_url.as_str())
            });
            Box::new(GuardedOracle::new(client, timeout))
        }
        RoutingBackend::Valhalla => {
            debug!("Using Valhalla at {}", config.valhalla_url);
            let client = ValhallaClient::new(ValhallaConfig {
                timeout_seconds: config.routing_timeout_secs,
                ..ValhallaConfig::new(config.valhalla_url.as_str())
            });
            Box::new(GuardedOracle::new(client, timeout))
        }
    }
}
