//! Stop intake: reads drafts and geocodes the ones without coordinates.
//!
//! Planning only starts when every stop resolved. A single unresolved name
//! aborts the whole batch and the error lists all of them.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::defaults::MAX_STOPS;
use crate::services::geocoding::Geocoder;
use crate::types::{OpeningWindow, Stop, StopDraft};

/// Parse a JSON array of drafts
pub fn parse_drafts(raw: &str) -> Result<Vec<StopDraft>> {
    serde_json::from_str(raw).context("Stop file must be a JSON array of stops")
}

pub fn read_drafts(path: &Path) -> Result<Vec<StopDraft>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read stop file {}", path.display()))?;
    parse_drafts(&raw).with_context(|| format!("Invalid stop file {}", path.display()))
}

/// Resolve drafts into stops.
///
/// Drafts that already carry coordinates skip the geocoder. When
/// `default_hours` is set, window-less drafts without a fixed time receive it.
pub async fn resolve_drafts(
    geocoder: &dyn Geocoder,
    drafts: Vec<StopDraft>,
    default_hours: Option<OpeningWindow>,
) -> Result<Vec<Stop>> {
    if drafts.len() > MAX_STOPS {
        anyhow::bail!("{} stops given, at most {} can be planned at once", drafts.len(), MAX_STOPS);
    }

    info!("Resolving {} stops with {} geocoder", drafts.len(), geocoder.name());

    let mut stops = Vec::with_capacity(drafts.len());
    let mut unresolved = Vec::new();

    for mut draft in drafts {
        if draft.name.trim().is_empty() {
            anyhow::bail!("Every stop needs a name");
        }
        if let Some(window) = default_hours {
            if draft.opening_window.is_none() && draft.fixed_time.is_none() {
                draft.opening_window = Some(window);
            }
        }

        let coordinates = match draft.coordinates {
            Some(coordinates) => coordinates,
            None => match geocoder.geocode(&draft.name, &draft.city).await {
                Ok(Some(result)) => {
                    debug!("Geocoded '{}, {}' to {}", draft.name, draft.city, result.display_name);
                    result.coordinates
                }
                Ok(None) => {
                    warn!("No match for '{}, {}'", draft.name, draft.city);
                    unresolved.push(format!("{}, {}", draft.name, draft.city));
                    continue;
                }
                Err(e) => {
                    warn!("Geocoding '{}, {}' failed: {}", draft.name, draft.city, e);
                    unresolved.push(format!("{}, {} ({})", draft.name, draft.city, e));
                    continue;
                }
            },
        };

        stops.push(draft.into_stop(coordinates));
    }

    if !unresolved.is_empty() {
        anyhow::bail!(
            "Could not locate {} of {} stops: {}",
            unresolved.len(),
            unresolved.len() + stops.len(),
            unresolved.join("; ")
        );
    }

    Ok(stops)
}
