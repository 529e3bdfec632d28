use crate::types::{ClockTime, Coordinates, OpeningWindow};

pub const DEFAULT_DWELL_MINUTES: u32 = 30;

/// Planning runs are sized for a single day's visits.
pub const MAX_STOPS: usize = 50;

pub fn default_depot() -> Coordinates {
    Coordinates { lat: 47.2629133, lng: -1.4844803 }
}

pub fn default_departure() -> ClockTime {
    ClockTime::from_minutes(9 * 60)
}

/// Opening hours offered to a new stop when the user enters none
pub fn default_opening_window() -> OpeningWindow {
    OpeningWindow::new(ClockTime::from_minutes(9 * 60), ClockTime::from_minutes(17 * 60))
}
