//! Stop types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ClockTime;

/// Coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and within the WGS84 latitude/longitude ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Same-day opening hours of a stop, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningWindow {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl OpeningWindow {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self { start, end }
    }

    /// An overnight window like 22:00–06:00 is not representable.
    pub fn is_inverted(&self) -> bool {
        self.end < self.start
    }
}

/// A geocoded location to visit.
///
/// The `distance_from_previous`, `duration_from_previous`, `scheduled_time`
/// and `is_open` fields are written by the sequencer only; everything else
/// passes through a planning run unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub coordinates: Coordinates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_window: Option<OpeningWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_time: Option<ClockTime>,

    // Computed by the sequencer
    /// Kilometres from the previous stop (or the depot)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_from_previous: Option<f64>,
    /// Driving minutes from the previous stop (or the depot)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_from_previous: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<ClockTime>,
    /// Only set by the opening-hours policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_open: Option<bool>,

    #[serde(default)]
    pub completed: bool,
}

impl Stop {
    pub fn new(id: Uuid, name: impl Into<String>, city: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            id,
            name: name.into(),
            city: city.into(),
            coordinates,
            opening_window: None,
            fixed_time: None,
            distance_from_previous: None,
            duration_from_previous: None,
            scheduled_time: None,
            is_open: None,
            completed: false,
        }
    }

    pub fn with_opening_window(mut self, window: OpeningWindow) -> Self {
        self.opening_window = Some(window);
        self
    }

    pub fn with_fixed_time(mut self, time: ClockTime) -> Self {
        self.fixed_time = Some(time);
        self
    }
}

/// A stop as entered by the user, before geocoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDraft {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub opening_window: Option<OpeningWindow>,
    #[serde(default)]
    pub fixed_time: Option<ClockTime>,
}

impl StopDraft {
    /// Promote to a `Stop` once coordinates are known.
    pub fn into_stop(self, coordinates: Coordinates) -> Stop {
        let mut stop = Stop::new(
            self.id.unwrap_or_else(Uuid::new_v4),
            self.name,
            self.city,
            coordinates,
        );
        stop.opening_window = self.opening_window;
        stop.fixed_time = self.fixed_time;
        stop
    }
}
