//! kwzforge - Flipnote KWZ to MP4 conversion
//!
//! This library crate exposes the binary's building blocks for integration
//! testing.

pub mod config;
pub mod delivery;
pub mod intake;
