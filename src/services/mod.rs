//! Business logic services

pub mod clock;
pub mod export;
pub mod geo;
pub mod geocoding;
pub mod intake;
pub mod nominatim;
pub mod routing;
pub mod sequencer;
pub mod storage;
