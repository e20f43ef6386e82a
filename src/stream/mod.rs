//! Stream combinators for status delivery

pub mod throttle;

pub use throttle::{Throttle, ThrottleExt};
