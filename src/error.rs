// In: src/error.rs

//! This module defines the single, unified error type for the entire ebe library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Configuration errors are raised eagerly by constructors; decode errors abort
//! the stream they occur in. Nothing in the crate retries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EbeError {
    // =========================================================================
    // === Decode Errors (fatal for the whole stream)
    // =========================================================================
    /// A record field could not be parsed, or the record has the wrong shape.
    #[error("Malformed record: field '{field}' = {value:?}: {reason}")]
    MalformedRecord {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// The (type code, 2*I3) pair of a fixed-width record is not in the lookup table.
    #[error("Unknown particle code: ityp={ityp}, 2*I3={iso}")]
    UnknownParticleCode { ityp: i32, iso: i32 },

    /// Wraps a decode error with the location and content of the offending line.
    #[error("{source_name}:{line_no}: {source} (expected {expected} format)\n  line: {content:?}")]
    AtLine {
        source_name: String,
        line_no: usize,
        content: String,
        expected: &'static str,
        #[source]
        source: Box<EbeError>,
    },

    // =========================================================================
    // === Configuration & Domain Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A particle reached a stage that cannot process it (e.g. a negative pT
    /// handed to the differential aggregator).
    #[error("Invalid particle: {0}")]
    InvalidParticle(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the underlying I/O subsystem (e.g., file not found).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while loading a config.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl EbeError {
    /// Convenience constructor used by the decoders.
    pub(crate) fn malformed(field: &'static str, value: &str, reason: impl ToString) -> Self {
        EbeError::MalformedRecord {
            field,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns the innermost error, looking through any `AtLine` context.
    pub fn root(&self) -> &EbeError {
        match self {
            EbeError::AtLine { source, .. } => source.root(),
            other => other,
        }
    }
}
