//! This module defines the core, strongly-typed data representations used
//! throughout the ebe pipeline.
//!
//! It includes the canonical `Particle` value and the `Record` sum type that
//! replaces "a particle or a falsy separator" with an explicit tagged variant.

pub mod particle;

// Re-export the main type(s) for easier access.
pub use particle::{Event, Particle, Record};
