//! Decoder for the standard text format: one `ID pT phi eta` particle per
//! line, events separated by blank lines.

use super::{RecordDecoder, RecordFormat};
use crate::error::EbeError;
use crate::types::{Particle, Record};

const FIELD_NAMES: [&str; 4] = ["ID", "pT", "phi", "eta"];

/// Stateless; every line is decoded independently.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardDecoder;

fn parse_float(field: &'static str, token: &str) -> Result<f64, EbeError> {
    token
        .parse::<f64>()
        .map_err(|e| EbeError::malformed(field, token, e))
}

impl RecordDecoder for StandardDecoder {
    fn format(&self) -> RecordFormat {
        RecordFormat::Standard
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<Record>, EbeError> {
        let mut tokens = [""; 4];
        let mut count = 0;
        for token in line.split_whitespace() {
            if count < tokens.len() {
                tokens[count] = token;
            }
            count += 1;
        }

        match count {
            0 => Ok(Some(Record::EventBoundary)),
            4 => {
                let id = tokens[0]
                    .parse::<i32>()
                    .map_err(|e| EbeError::malformed(FIELD_NAMES[0], tokens[0], e))?;
                let pt = parse_float(FIELD_NAMES[1], tokens[1])?;
                let phi = parse_float(FIELD_NAMES[2], tokens[2])?;
                let eta = parse_float(FIELD_NAMES[3], tokens[3])?;
                Ok(Some(Record::Particle(Particle::new(id, pt, phi, eta))))
            }
            n => Err(EbeError::malformed(
                "line",
                line.trim(),
                format!("expected 4 whitespace-separated fields, found {}", n),
            )),
        }
    }
}
