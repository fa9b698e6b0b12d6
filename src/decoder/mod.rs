// In: src/decoder/mod.rs

//! Turns one raw input line into a `Record`.
//!
//! A decoder is a pure function of a line plus a small amount of persistent
//! state (the fixed-width header/body flag). It never looks ahead and never
//! buffers, so any line source can drive it one line at a time.

use serde::{Deserialize, Serialize};

use crate::error::EbeError;
use crate::types::Record;

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod ityp_table;
pub mod standard;
pub mod urqmd;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use self::ityp_table::resolve_particle_id;
pub use self::standard::StandardDecoder;
pub use self::urqmd::{UrqmdDecoder, RECORD_LENGTH};

/// A concrete, already-resolved record layout.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// Whitespace-delimited `ID pT phi eta`, blank line between events.
    Standard,
    /// UrQMD fixed-width particle records separated by header blocks.
    FixedWidth,
}

impl RecordFormat {
    /// Short name used in error reports.
    pub fn name(&self) -> &'static str {
        match self {
            RecordFormat::Standard => "std",
            RecordFormat::FixedWidth => "fixed",
        }
    }

    /// Creates a fresh decoder for this layout.
    pub fn decoder(&self) -> Box<dyn RecordDecoder> {
        match self {
            RecordFormat::Standard => Box::new(StandardDecoder),
            RecordFormat::FixedWidth => Box::new(UrqmdDecoder::new()),
        }
    }
}

/// **CONTRACT:** decodes one line (without its terminator) into at most one record.
///
/// `Ok(None)` means the line carries nothing for the stream (e.g. a header
/// line that does not close an event). Any `Err` is fatal for the stream.
pub trait RecordDecoder {
    fn format(&self) -> RecordFormat;

    fn decode_line(&mut self, line: &str) -> Result<Option<Record>, EbeError>;

    /// Returns to the start-of-input state. Called when one input ends and
    /// the next begins.
    fn reset(&mut self) {}
}

impl<D: RecordDecoder + ?Sized> RecordDecoder for Box<D> {
    fn format(&self) -> RecordFormat {
        (**self).format()
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<Record>, EbeError> {
        (**self).decode_line(line)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
