//! This module computes flow coefficients from particle collections, one
//! event at a time or aggregated over an entire run.
//!
//! `vectors` holds the per-collection math (`FlowVectors`, `FlowAccumulator`);
//! `aggregator` merges many collections in bounded memory.

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod aggregator;
pub mod vectors;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use self::aggregator::{
    AggregateFlows, AggregationMode, BinnedFlow, DifferentialFlows, FlowAggregator,
};
pub use self::vectors::{event_by_event, FlowAccumulator, FlowVectors, Harmonics};

#[cfg(test)]
mod aggregator_tests;
