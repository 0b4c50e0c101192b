//! # Serlink CSMA/CD
//! Serlink CSMA/CD arbitrates access to the shared medium. A station listens
//! before transmitting; a busy channel defers the attempt, and a collision
//! during transmission raises the jam signal and schedules a retry after a
//! binary exponential backoff. The medium itself is emulated: configurable
//! probabilities decide when the channel turns busy and when a transmission
//! collides, and scheduled timers return the channel to idle, the way a real
//! carrier would fall silent.

mod controller;

pub mod builtin;

pub use controller::{shared_rng, ChannelState, ChannelStatistics, CsmaCd, CsmaEvent, SharedRng};
