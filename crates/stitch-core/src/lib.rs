//! stitch-core: shared types, IDs, errors, configuration, and job events.
//!
//! This crate is the foundational dependency for all other stitch-* crates,
//! providing the playlist job domain model, a unified error type, typed job
//! identifiers, application configuration, and the job observer seam.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod job;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::JobId;
pub use job::*;
pub use media::*;
