//! Turns a stop's name and city into coordinates.
//!
//! `MockGeocoder` is offline and deterministic. `NominatimGeocoder` asks a
//! Nominatim server and is always wrapped in [`GuardedGeocoder`], which
//! spaces out requests and pauses the backend after repeated failures.
//! `GEOCODER_BACKEND` picks one (see `Config`).

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::config::{Config, GeocoderBackend};
use crate::services::nominatim::NominatimClient;
use crate::types::Coordinates;

/// Resolves a place name within a city
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `None` if the place is unknown.
    async fn geocode(&self, name: &str, city: &str) -> Result<Option<GeocodingResult>>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct GeocodingResult {
    pub coordinates: Coordinates,
    /// Label returned by the backend, for logs
    pub display_name: String,
}

/// Offline geocoder: hashes name and city to a point around Nantes
pub struct MockGeocoder;

impl MockGeocoder {
    pub fn new() -> Self {
        Self
    }

    fn hash_to_coordinates(name: &str, city: &str) -> Coordinates {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        const LAT_RANGE: (f64, f64) = (47.0, 47.5);
        const LNG_RANGE: (f64, f64) = (-2.0, -1.0);

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        city.hash(&mut hasher);
        let hash = hasher.finish();

        // High half drives latitude, low half longitude
        let lat_share = (hash >> 32) as f64 / u32::MAX as f64;
        let lng_share = (hash & 0xFFFF_FFFF) as f64 / u32::MAX as f64;

        Coordinates {
            lat: LAT_RANGE.0 + lat_share * (LAT_RANGE.1 - LAT_RANGE.0),
            lng: LNG_RANGE.0 + lng_share * (LNG_RANGE.1 - LNG_RANGE.0),
        }
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, name: &str, city: &str) -> Result<Option<GeocodingResult>> {
        Ok(Some(GeocodingResult {
            coordinates: Self::hash_to_coordinates(name, city),
            display_name: format!("{}, {}", name, city),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Nominatim free-text search
pub struct NominatimGeocoder {
    client: NominatimClient,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: NominatimClient::new(base_url),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, name: &str, city: &str) -> Result<Option<GeocodingResult>> {
        let place = self.client.geocode(name, city).await?;
        Ok(place.map(|place| GeocodingResult {
            coordinates: place.coordinates,
            display_name: place.display_name,
        }))
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

/// Hands out request slots at least `interval` apart. Callers queue on the
/// mutex, so one request leaves per slot.
struct RequestPacer {
    interval: Duration,
    next_slot: tokio::sync::Mutex<Option<Instant>>,
}

impl RequestPacer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: tokio::sync::Mutex::new(None),
        }
    }

    async fn wait_for_slot(&self) {
        let mut next_slot = self.next_slot.lock().await;
        if let Some(slot) = *next_slot {
            tokio::time::sleep_until(slot).await;
        }
        *next_slot = Some(Instant::now() + self.interval);
    }
}

#[derive(Default)]
struct GateState {
    consecutive_failures: u32,
    paused_at: Option<Instant>,
}

/// Pauses a backend once `threshold` calls in a row failed. After `cooldown`
/// one trial call goes through; another failure pauses it again.
struct FailureGate {
    threshold: u32,
    cooldown: Duration,
    state: parking_lot::Mutex<GateState>,
}

impl FailureGate {
    fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: parking_lot::Mutex::new(GateState::default()),
        }
    }

    /// Failure streak while paused, `None` when calls may proceed
    fn paused(&self) -> Option<u32> {
        let state = self.state.lock();
        match state.paused_at {
            Some(at) if at.elapsed() < self.cooldown => Some(state.consecutive_failures),
            _ => None,
        }
    }

    fn record(&self, succeeded: bool) {
        let mut state = self.state.lock();
        if succeeded {
            *state = GateState::default();
            return;
        }
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.threshold {
            state.paused_at = Some(Instant::now());
        }
    }
}

/// Request pacing and failure pause around any [`Geocoder`]
pub struct GuardedGeocoder<G> {
    inner: G,
    pacer: RequestPacer,
    gate: FailureGate,
}

impl<G: Geocoder> GuardedGeocoder<G> {
    pub fn new(inner: G, min_interval: Duration, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner,
            pacer: RequestPacer::new(min_interval),
            gate: FailureGate::new(failure_threshold, cooldown),
        }
    }
}

#[async_trait]
impl<G: Geocoder> Geocoder for GuardedGeocoder<G> {
    async fn geocode(&self, name: &str, city: &str) -> Result<Option<GeocodingResult>> {
        if let Some(failures) = self.gate.paused() {
            warn!("{} paused, skipping '{}, {}'", self.inner.name(), name, city);
            anyhow::bail!(
                "{} geocoding paused after {} consecutive failures",
                self.inner.name(),
                failures
            );
        }

        self.pacer.wait_for_slot().await;

        // An unknown place is an answer, not a failure
        let result = self.inner.geocode(name, city).await;
        self.gate.record(result.is_ok());
        if let Err(e) = &result {
            error!("{} lookup for '{}, {}' failed: {:#}", self.inner.name(), name, city, e);
        }
        result
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

/// Create the geocoder selected by `GEOCODER_BACKEND`
pub fn create_geocoder(config: &Config) -> Box<dyn Geocoder> {
    match config.geocoder_backend {
        GeocoderBackend::Mock => {
            tracing::info!("Using MockGeocoder");
            Box::new(MockGeocoder::new())
        }
        GeocoderBackend::Nominatim => {
            tracing::info!(
                "Using Nominatim at {} ({} ms between requests)",
                config.nominatim_url,
                config.nominatim_rate_limit_ms
            );
            Box::new(GuardedGeocoder::new(
                NominatimGeocoder::new(&config.nominatim_url),
                Duration::from_millis(config.nominatim_rate_limit_ms),
                config.nominatim_cb_threshold,
                Duration::from_secs(config.nominatim_cb_recovery_secs),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::intake::resolve_drafts;
    use crate::types::StopDraft;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn draft(name: &str) -> StopDraft {
        StopDraft {
            id: None,
            name: name.to_string(),
            city: "Nantes".to_string(),
            coordinates: None,
            opening_window: None,
            fixed_time: None,
        }
    }

    /// Fails the first `fail_first` calls and any name starting with "Down",
    /// answers like the mock otherwise.
    struct ScriptedGeocoder {
        fail_first: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Geocoder for ScriptedGeocoder {
        async fn geocode(&self, name: &str, city: &str) -> Result<Option<GeocodingResult>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first || name.starts_with("Down") {
                anyhow::bail!("502 Bad Gateway");
            }
            MockGeocoder::new().geocode(name, city).await
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    /// Guarded scripted geocoder plus its call counter
    fn guarded(
        fail_first: usize,
        interval_ms: u64,
        threshold: u32,
        cooldown_ms: u64,
    ) -> (GuardedGeocoder<ScriptedGeocoder>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = ScriptedGeocoder { fail_first, calls: calls.clone() };
        let geocoder = GuardedGeocoder::new(
            inner,
            Duration::from_millis(interval_ms),
            threshold,
            Duration::from_millis(cooldown_ms),
        );
        (geocoder, calls)
    }

    #[tokio::test]
    async fn mock_geocoder_is_deterministic_and_local() {
        let geocoder = MockGeocoder::new();

        let first = geocoder.geocode("Boulangerie du Port", "Nantes").await.unwrap().unwrap();
        let again = geocoder.geocode("Boulangerie du Port", "Nantes").await.unwrap().unwrap();
        let other = geocoder.geocode("Garage Central", "Clisson").await.unwrap().unwrap();

        assert_eq!(first.coordinates, again.coordinates);
        assert_ne!(first.coordinates, other.coordinates);
        for c in [first.coordinates, other.coordinates] {
            assert!((47.0..=47.5).contains(&c.lat), "lat {}", c.lat);
            assert!((-2.0..=-1.0).contains(&c.lng), "lng {}", c.lng);
        }
    }

    #[tokio::test]
    async fn guarded_geocoder_spaces_out_a_batch() {
        let (geocoder, calls) = guarded(0, 80, 3, 60_000);
        let drafts = vec![draft("Bakery"), draft("Florist"), draft("Garage")];

        let start = std::time::Instant::now();
        let stops = resolve_drafts(&geocoder, drafts, None).await.unwrap();

        assert_eq!(stops.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // First request leaves at once, the other two wait one interval each
        assert!(start.elapsed() >= Duration::from_millis(160), "took {:?}", start.elapsed());
    }

    #[tokio::test]
    async fn guarded_geocoder_stops_calling_a_failing_backend() {
        let (geocoder, calls) = guarded(usize::MAX, 0, 2, 60_000);
        let drafts = vec![draft("Bakery"), draft("Florist"), draft("Garage"), draft("Pharmacy")];

        let err = resolve_drafts(&geocoder, drafts, None).await.unwrap_err().to_string();

        assert!(err.contains("4 of 4"), "{}", err);
        assert!(err.contains("Pharmacy, Nantes (scripted geocoding paused after 2 consecutive failures)"), "{}", err);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn guarded_geocoder_retries_after_cooldown() {
        let (geocoder, calls) = guarded(1, 0, 1, 40);

        assert!(geocoder.geocode("Bakery", "Nantes").await.is_err());
        assert!(geocoder.geocode("Bakery", "Nantes").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1, "paused backend was called");

        tokio::time::sleep(Duration::from_millis(60)).await;

        let stops = resolve_drafts(&geocoder, vec![draft("Bakery"), draft("Florist")], None)
            .await
            .unwrap();
        assert_eq!(stops.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn guarded_geocoder_counts_only_consecutive_failures() {
        let (geocoder, calls) = guarded(0, 0, 2, 60_000);
        let drafts = vec![draft("Downtown A"), draft("Bakery"), draft("Downtown B"), draft("Florist")];

        let err = resolve_drafts(&geocoder, drafts, None).await.unwrap_err().to_string();

        assert!(err.contains("2 of 4"), "{}", err);
        assert!(!err.contains("paused"), "{}", err);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn guarded_geocoder_treats_unknown_place_as_success() {
        struct Unknown;

        #[async_trait]
        impl Geocoder for Unknown {
            async fn geocode(&self, _name: &str, _city: &str) -> Result<Option<GeocodingResult>> {
                Ok(None)
            }

            fn name(&self) -> &'static str {
                "unknown"
            }
        }

        let geocoder = GuardedGeocoder::new(Unknown, Duration::ZERO, 1, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(geocoder.geocode("Nowhere", "Nantes").await.unwrap().is_none());
        }
    }

    #[test]
    fn create_geocoder_follows_config() {
        let mut config = Config::default();
        assert_eq!(create_geocoder(&config).name(), "mock");

        config.geocoder_backend = GeocoderBackend::Nominatim;
        assert_eq!(create_geocoder(&config).name(), "nominatim");
    }
}
