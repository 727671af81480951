//! kf-core: shared types, IDs, errors, and configuration.
//!
//! This crate is the foundational dependency for all other kf-* crates,
//! providing the conversion error taxonomy, the typed job identifier, and
//! the configuration sections recognised by the pipeline.

pub mod config;
pub mod error;
pub mod ids;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, ErrorKind, Result};
pub use ids::JobId;
