//! # Serlink Terminal
//! The terminal owns one serial byte pipe and turns it into a message
//! endpoint. Transmission runs the CSMA/CD access procedure before every
//! frame; reception is a long-lived reader task that hunts for flag-delimited
//! frames in the incoming byte stream, destuffs and parses them, and runs the
//! cyclic code before anything reaches the operator. A dispatcher task
//! serializes every outward notification onto a single event sink.

mod event;
mod terminal;

pub mod builtin;

pub use event::{TerminalEvent, TerminalSink};
pub use terminal::{SerialTerminal, SerialTerminalConfig, TerminalError};
