//! This file is the root of the `ebe_flow` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of the library (`decoder`, `flow`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the handful of types a caller needs to drive the pipeline:
//!
//!   raw lines -> [decoder] -> [filter] -> [segmenter] -> [flow] -> FlowVectors
//!
//! Every stage is a pull-based iterator; nothing buffers the whole input.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
pub mod observability; // Make macros available throughout the crate

pub mod config;
pub mod decoder;
pub mod error;
pub mod filter;
pub mod flow;
pub mod input;
pub mod pipeline;
pub mod segmenter;
pub mod types;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use config::{EbeConfig, InputFormat};
pub use error::EbeError;
pub use filter::{ChargedIdSet, ChargedLookup, ParticleFilter};
pub use flow::{
    AggregateFlows, BinnedFlow, DifferentialFlows, FlowAccumulator, FlowAggregator, FlowVectors,
};
pub use pipeline::FlowPipeline;
pub use segmenter::EventSegmenter;
pub use types::{Event, Particle, Record};
