//! Decoder for UrQMD fixed-width output (file 13/14 style).
//!
//! Particle lines are recognised purely by their length; every other line is
//! part of an event header. Fields are pulled by character offset rather than
//! by tokenizing, since adjacent columns may touch.

use std::borrow::Cow;
use std::ops::Range;

use super::ityp_table::resolve_particle_id;
use super::{RecordDecoder, RecordFormat};
use crate::error::EbeError;
use crate::types::{Particle, Record};

/// Width of a particle record with the line terminator stripped
/// (435 including the trailing newline).
pub const RECORD_LENGTH: usize = 434;

const PX: Range<usize> = 121..144;
const PY: Range<usize> = 145..168;
const PZ: Range<usize> = 169..192;
const ITYP: Range<usize> = 218..221;
const ISO: Range<usize> = 222..224;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Header,
    Body,
}

/// Tracks whether the previous line belonged to a header block, so a run of
/// header lines produces a single `EventBoundary` and no boundary is emitted
/// before the first event.
#[derive(Debug, Clone)]
pub struct UrqmdDecoder {
    state: BlockState,
}

impl Default for UrqmdDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl UrqmdDecoder {
    /// Files begin with a header.
    pub fn new() -> Self {
        Self {
            state: BlockState::Header,
        }
    }
}

impl RecordDecoder for UrqmdDecoder {
    fn format(&self) -> RecordFormat {
        RecordFormat::FixedWidth
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<Record>, EbeError> {
        if line.len() == RECORD_LENGTH {
            self.state = BlockState::Body;
            return parse_particle_line(line).map(|p| Some(Record::Particle(p)));
        }

        match self.state {
            BlockState::Body => {
                self.state = BlockState::Header;
                Ok(Some(Record::EventBoundary))
            }
            BlockState::Header => Ok(None),
        }
    }

    fn reset(&mut self) {
        self.state = BlockState::Header;
    }
}

fn field<'a>(line: &'a str, range: Range<usize>, name: &'static str) -> Result<&'a str, EbeError> {
    line.get(range.clone()).ok_or_else(|| {
        EbeError::malformed(
            name,
            line,
            format!("columns {}..{} do not fall on character boundaries", range.start, range.end),
        )
    })
}

/// Parses a Fortran double, accepting `D` as the exponent marker.
fn parse_fortran_float(name: &'static str, raw: &str) -> Result<f64, EbeError> {
    let trimmed = raw.trim();
    let normalized: Cow<'_, str> = if trimmed.contains(['D', 'd']) {
        Cow::Owned(trimmed.replace(['D', 'd'], "E"))
    } else {
        Cow::Borrowed(trimmed)
    };
    normalized
        .parse::<f64>()
        .map_err(|e| EbeError::malformed(name, raw, e))
}

fn parse_int(name: &'static str, raw: &str) -> Result<i32, EbeError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|e| EbeError::malformed(name, raw, e))
}

fn parse_particle_line(line: &str) -> Result<Particle, EbeError> {
    let px = parse_fortran_float("px", field(line, PX, "px")?)?;
    let py = parse_fortran_float("py", field(line, PY, "py")?)?;
    let pz = parse_fortran_float("pz", field(line, PZ, "pz")?)?;
    let ityp = parse_int("ityp", field(line, ITYP, "ityp")?)?;
    let iso = parse_int("2*I3", field(line, ISO, "2*I3")?)?;

    let id = resolve_particle_id(ityp, iso)?;
    Ok(Particle::from_momentum(id, px, py, pz))
}
