//! Route sequencing for a single-vehicle day plan.
//!
//! Given geocoded stops, a depot and a departure time, this module decides
//! the visiting order and annotates every stop with the leg distance, the
//! driving duration and the arrival clock time. Two policies exist:
//!
//! - [`SchedulingPolicy::NearestWithWindows`]: greedy nearest neighbour that
//!   prefers stops open at their arrival time and falls back to the nearest
//!   closed stop when nothing is open.
//! - [`SchedulingPolicy::FixedOrder`]: the user assigned a time to each stop;
//!   stops are visited in that order and keep their assigned time.
//!
//! The run owns all of its state. Duration lookups are memoized per run and
//! the cancellation token is checked before each lookup.

use std::collections::HashSet;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::defaults::MAX_STOPS;
use crate::services::clock;
use crate::services::geo::haversine_distance;
use crate::services::routing::{DurationOracle, MemoizedOracle};
use crate::types::{ClockTime, Coordinates, Stop};

/// How the visiting order is decided. Chosen once per run by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingPolicy {
    /// Nearest stop that is open on arrival, nearest overall if none is
    NearestWithWindows,
    /// Ascending by each stop's pre-assigned `fixed_time`
    FixedOrder,
}

impl SchedulingPolicy {
    /// Policy matching the fields a stop list carries: any fixed time selects
    /// `FixedOrder`. Mixed lists are still rejected by the sequencer.
    pub fn infer(stops: &[Stop]) -> Self {
        if stops.iter().any(|s| s.fixed_time.is_some()) {
            SchedulingPolicy::FixedOrder
        } else {
            SchedulingPolicy::NearestWithWindows
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SchedulingPolicy::NearestWithWindows => "nearest-with-windows",
            SchedulingPolicy::FixedOrder => "fixed-order",
        }
    }
}

/// Invalid input for a sequencing run
#[derive(Debug, Error, PartialEq)]
pub enum SequenceError {
    #[error("{count} stops exceed the limit of {max} per run")]
    TooManyStops { count: usize, max: usize },

    #[error("depot coordinates are invalid: {0:?}")]
    InvalidDepot(Coordinates),

    #[error("stop {id} has invalid coordinates {coordinates:?}")]
    InvalidCoordinates { id: Uuid, coordinates: Coordinates },

    #[error("stop id {0} appears more than once")]
    DuplicateId(Uuid),

    #[error("stop {id} has an opening window ending before it starts ({start}-{end})")]
    InvertedWindow {
        id: Uuid,
        start: ClockTime,
        end: ClockTime,
    },

    #[error("stop {id} carries {field}, which the {policy} policy does not accept")]
    PolicyMismatch {
        id: Uuid,
        policy: &'static str,
        field: &'static str,
    },

    #[error("stop {0} has no fixed time, required by the fixed-order policy")]
    MissingFixedTime(Uuid),
}

/// Route-level inputs of a run
#[derive(Debug, Clone)]
pub struct SequenceRequest {
    pub depot: Coordinates,
    /// Departure from the depot
    pub departure: ClockTime,
    /// Time spent at each stop
    pub dwell_minutes: u32,
    pub policy: SchedulingPolicy,
}

/// Result of a run
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceOutcome {
    Completed(Vec<Stop>),
    /// The run was cancelled; `partial` holds the stops placed before that,
    /// fully annotated.
    Cancelled { partial: Vec<Stop> },
}

impl SequenceOutcome {
    pub fn stops(&self) -> &[Stop] {
        match self {
            SequenceOutcome::Completed(stops) => stops,
            SequenceOutcome::Cancelled { partial } => partial,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SequenceOutcome::Cancelled { .. })
    }
}

/// Orders and annotates stops using an injected duration oracle
pub struct RouteSequencer<'a> {
    oracle: &'a dyn DurationOracle,
    cancel: CancellationToken,
}

impl<'a> RouteSequencer<'a> {
    pub fn new(oracle: &'a dyn DurationOracle) -> Self {
        Self {
            oracle,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Order `stops` under `request.policy`.
    ///
    /// The output is a permutation of the input with all computed fields
    /// overwritten. Fails only on invalid input; a stop that is closed
    /// whenever it can be reached is still placed, with `is_open = false`.
    pub async fn sequence(
        &self,
        stops: Vec<Stop>,
        request: &SequenceRequest,
    ) -> Result<SequenceOutcome, SequenceError> {
        validate(&stops, request)?;

        let oracle = MemoizedOracle::new(self.oracle);
        let count = stops.len();
        info!(
            "Sequencing {} stops with {} policy using {} durations",
            count,
            request.policy.as_str(),
            oracle.name()
        );

        let outcome = match request.policy {
            SchedulingPolicy::NearestWithWindows => {
                self.nearest_with_windows(&oracle, stops, request).await
            }
            SchedulingPolicy::FixedOrder => self.fixed_order(&oracle, stops, request).await,
        };

        match &outcome {
            SequenceOutcome::Completed(ordered) => info!(
                "Sequenced {} stops ({} distinct duration lookups, {} closed on arrival)",
                ordered.len(),
                oracle.cached_pairs(),
                ordered.iter().filter(|s| s.is_open == Some(false)).count()
            ),
            SequenceOutcome::Cancelled { .. } => info!(
                "Sequencing cancelled after placing {} of {} stops",
                outcome.stops().len(),
                count
            ),
        }

        Ok(outcome)
    }

    async fn nearest_with_windows(
        &self,
        oracle: &dyn DurationOracle,
        stops: Vec<Stop>,
        request: &SequenceRequest,
    ) -> SequenceOutcome {
        // `Vec::remove` keeps the input order of what is left, which the
        // distance tie-break relies on.
        let mut remaining = stops;
        let mut ordered = Vec::with_capacity(remaining.len());
        let mut position = request.depot;
        let mut clock = request.departure;

        while !remaining.is_empty() {
            let mut candidates: Vec<(usize, f64)> = remaining
                .iter()
                .enumerate()
                .map(|(idx, stop)| (idx, haversine_distance(&position, &stop.coordinates)))
                .collect();
            // Stable: equal distances stay in input order
            candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

            // Probing in distance order, the first open stop is the nearest
            // feasible one.
            let mut feasible = None;
            for &(idx, distance) in &candidates {
                if self.cancel.is_cancelled() {
                    return SequenceOutcome::Cancelled { partial: ordered };
                }
                let duration = oracle.estimate(&position, &remaining[idx].coordinates).await;
                if is_open_at(&remaining[idx], clock::add_minutes(clock, duration)) {
                    feasible = Some((idx, distance));
                    break;
                }
            }

            let (idx, distance, fallback) = match feasible {
                Some((idx, distance)) => (idx, distance, false),
                None => {
                    let (idx, distance) = candidates[0];
                    (idx, distance, true)
                }
            };

            if self.cancel.is_cancelled() {
                return SequenceOutcome::Cancelled { partial: ordered };
            }
            let mut stop = remaining.remove(idx);
            let duration = oracle.estimate(&position, &stop.coordinates).await;
            let arrival = clock::add_minutes(clock, duration);
            let open = is_open_at(&stop, arrival);

            debug!(
                "Stop {} ({}): {:.2} km, {:.1} min, arrival {}{}",
                stop.id,
                stop.name,
                distance,
                duration,
                arrival,
                if fallback { ", closed (fallback)" } else { "" }
            );

            stop.distance_from_previous = Some(distance);
            stop.duration_from_previous = Some(duration);
            stop.scheduled_time = Some(arrival);
            stop.is_open = Some(open);

            position = stop.coordinates;
            clock = clock::add_minutes(arrival, request.dwell_minutes as f64);
            ordered.push(stop);
        }

        SequenceOutcome::Completed(ordered)
    }

    async fn fixed_order(
        &self,
        oracle: &dyn DurationOracle,
        stops: Vec<Stop>,
        request: &SequenceRequest,
    ) -> SequenceOutcome {
        let mut sorted = stops;
        // Validation guarantees every stop has a fixed time; sort_by is stable
        sorted.sort_by(|a, b| {
            clock::compare(
                a.fixed_time.unwrap_or_default(),
                b.fixed_time.unwrap_or_default(),
            )
        });

        let mut ordered = Vec::with_capacity(sorted.len());
        let mut position = request.depot;

        for mut stop in sorted {
            if self.cancel.is_cancelled() {
                return SequenceOutcome::Cancelled { partial: ordered };
            }
            let distance = haversine_distance(&position, &stop.coordinates);
            let duration = oracle.estimate(&position, &stop.coordinates).await;

            debug!(
                "Stop {} ({}): {:.2} km, {:.1} min, fixed at {}",
                stop.id,
                stop.name,
                distance,
                duration,
                stop.fixed_time.unwrap_or_default()
            );

            stop.distance_from_previous = Some(distance);
            stop.duration_from_previous = Some(duration);
            stop.scheduled_time = stop.fixed_time;
            stop.is_open = None;

            position = stop.coordinates;
            ordered.push(stop);
        }

        SequenceOutcome::Completed(ordered)
    }
}

/// A stop without opening hours is always open.
fn is_open_at(stop: &Stop, arrival: ClockTime) -> bool {
    stop.opening_window
        .as_ref()
        .map_or(true, |window| clock::is_within(arrival, window))
}

fn validate(stops: &[Stop], request: &SequenceRequest) -> Result<(), SequenceError> {
    if !request.depot.is_valid() {
        return Err(SequenceError::InvalidDepot(request.depot));
    }
    validate_stops(stops)?;

    for stop in stops {
        match request.policy {
            SchedulingPolicy::NearestWithWindows => {
                if stop.fixed_time.is_some() {
                    return Err(SequenceError::PolicyMismatch {
                        id: stop.id,
                        policy: request.policy.as_str(),
                        field: "fixedTime",
                    });
                }
            }
            SchedulingPolicy::FixedOrder => {
                if stop.opening_window.is_some() {
                    return Err(SequenceError::PolicyMismatch {
                        id: stop.id,
                        policy: request.policy.as_str(),
                        field: "openingWindow",
                    });
                }
                if stop.fixed_time.is_none() {
                    return Err(SequenceError::MissingFixedTime(stop.id));
                }
            }
        }
    }

    Ok(())
}

/// Policy-independent checks on a stop list: size, unique ids, usable
/// coordinates and opening windows.
pub fn validate_stops(stops: &[Stop]) -> Result<(), SequenceError> {
    if stops.len() > MAX_STOPS {
        return Err(SequenceError::TooManyStops {
            count: stops.len(),
            max: MAX_STOPS,
        });
    }

    let mut seen = HashSet::with_capacity(stops.len());
    for stop in stops {
        if !seen.insert(stop.id) {
            return Err(SequenceError::DuplicateId(stop.id));
        }
        if !stop.coordinates.is_valid() {
            return Err(SequenceError::InvalidCoordinates {
                id: stop.id,
                coordinates: stop.coordinates,
            });
        }
        if let Some(window) = stop.opening_window {
            if window.is_inverted() {
                return Err(SequenceError::InvertedWindow {
                    id: stop.id,
                    start: window.start,
                    end: window.end,
                });
            }
        }
    }

    Ok(())
}
