//! Read-only views of a planned itinerary: summary, text, CSV and share links.
//!
//! Nothing here changes a stop; computed fields are shown exactly as the
//! sequencer wrote them.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io;

use anyhow::{Context, Result};
use base64::Engine;
use serde::Serialize;

use crate::types::{Coordinates, Stop};

/// Aggregates shown under the itinerary
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub total_distance_km: f64,
    pub total_duration_minutes: f64,
    pub completed: usize,
    pub total: usize,
    pub all_completed: bool,
    /// Total distance over `max(n - 1, 1)` legs
    pub average_leg_km: f64,
    /// Hour of day → number of arrivals in that hour
    pub visits_per_hour: BTreeMap<u32, usize>,
}

impl RouteSummary {
    pub fn from_stops(stops: &[Stop]) -> Self {
        let total_distance_km: f64 = stops.iter().filter_map(|s| s.distance_from_previous).sum();
        let total_duration_minutes: f64 = stops.iter().filter_map(|s| s.duration_from_previous).sum();
        let completed = stops.iter().filter(|s| s.completed).count();

        let mut visits_per_hour = BTreeMap::new();
        for time in stops.iter().filter_map(|s| s.scheduled_time) {
            *visits_per_hour.entry(time.hour()).or_insert(0) += 1;
        }

        Self {
            total_distance_km,
            total_duration_minutes,
            completed,
            total: stops.len(),
            all_completed: !stops.is_empty() && completed == stops.len(),
            average_leg_km: total_distance_km / stops.len().saturating_sub(1).max(1) as f64,
            visits_per_hour,
        }
    }
}

/// `"1h 5min"`, `"2h"`, `"0h 45min"`
pub fn format_duration(minutes: f64) -> String {
    let total = if minutes.is_finite() && minutes > 0.0 {
        minutes.round() as u64
    } else {
        0
    };
    let (h, m) = (total / 60, total % 60);
    if m > 0 {
        format!("{}h {}min", h, m)
    } else {
        format!("{}h", h)
    }
}

/// Turn-by-turn navigation link for one stop
pub fn waze_url(coordinates: &Coordinates) -> String {
    format!(
        "https://www.waze.com/ul?ll={}%2C{}&navigate=yes",
        coordinates.lat, coordinates.lng
    )
}

/// Plain-text itinerary for the terminal
pub fn render_itinerary(stops: &[Stop]) -> String {
    let mut out = String::new();
    if stops.is_empty() {
        let _ = writeln!(out, "No stops planned.");
        return out;
    }

    for (idx, stop) in stops.iter().enumerate() {
        let time = stop
            .scheduled_time
            .map(|t| t.to_string())
            .unwrap_or_else(|| "--:--".to_string());
        let status = match stop.is_open {
            Some(true) => "open",
            Some(false) => "CLOSED",
            None => "",
        };
        let _ = writeln!(
            out,
            "{:>2}. {}  {:<32} {:>7.1} km {:>9}  {:<6}{}",
            idx + 1,
            time,
            format!("{}, {}", stop.name, stop.city),
            stop.distance_from_previous.unwrap_or(0.0),
            format_duration(stop.duration_from_previous.unwrap_or(0.0)),
            status,
            if stop.completed { " [done]" } else { "" }
        );
        let _ = writeln!(out, "    {}  {}", stop.id, waze_url(&stop.coordinates));
    }

    let summary = RouteSummary::from_stops(stops);
    let _ = writeln!(
        out,
        "\n{:.1} km, {} driving, {:.1} km per leg, {}/{} completed",
        summary.total_distance_km,
        format_duration(summary.total_duration_minutes),
        summary.average_leg_km,
        summary.completed,
        summary.total
    );
    let histogram: Vec<String> = summary
        .visits_per_hour
        .iter()
        .map(|(hour, count)| format!("{:02}h:{}", hour, count))
        .collect();
    let _ = writeln!(out, "Visits per hour: {}", histogram.join(" "));

    out
}

/// Write the itinerary as CSV, one row per stop in visiting order
pub fn write_csv<W: io::Write>(stops: &[Stop], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        "order",
        "id",
        "name",
        "city",
        "lat",
        "lng",
        "scheduled_time",
        "distance_km",
        "duration_min",
        "is_open",
        "completed",
    ])?;

    for (idx, stop) in stops.iter().enumerate() {
        csv.write_record(&[
            (idx + 1).to_string(),
            stop.id.to_string(),
            stop.name.clone(),
            stop.city.clone(),
            stop.coordinates.lat.to_string(),
            stop.coordinates.lng.to_string(),
            stop.scheduled_time.map(|t| t.to_string()).unwrap_or_default(),
            stop.distance_from_previous.map(|d| format!("{:.3}", d)).unwrap_or_default(),
            stop.duration_from_previous.map(|d| format!("{:.1}", d)).unwrap_or_default(),
            stop.is_open.map(|o| o.to_string()).unwrap_or_default(),
            stop.completed.to_string(),
        ])?;
    }

    csv.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Compact link payload: URL-safe unpadded base64 of the JSON list
pub fn encode_share_token(stops: &[Stop]) -> Result<String> {
    let json = serde_json::to_vec(stops)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json))
}

pub fn decode_share_token(token: &str) -> Result<Vec<Stop>> {
    // Accept a full link as well as the bare token
    let token = token.rsplit(['=', '/', '#']).next().unwrap_or(token).trim();
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(token)
        .context("Share token is not valid base64")?;
    serde_json::from_slice(&bytes).context("Share token does not contain an itinerary")
}
