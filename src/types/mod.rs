//! Type definitions

pub mod clock;
pub mod stop;

pub use clock::*;
pub use stop::*;
