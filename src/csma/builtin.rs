use std::ops::Range;
use std::time::Duration;

pub const BUSY_PROBABILITY: f64 = 0.25;
pub const COLLISION_PROBABILITY: f64 = 0.75;

/// An emulated busy channel returns to idle after this many milliseconds.
pub const BUSY_HOLD_MILLIS: Range<u64> = 500..1500;
/// An emulated collision clears after this many milliseconds.
pub const COLLISION_HOLD_MILLIS: Range<u64> = 50..150;

pub const SLOT_TIME: Duration = Duration::from_micros(51);
pub const MAX_BACKOFF_EXPONENT: usize = 10;

pub const JAM_DURATION: Duration = Duration::from_micros(4);
