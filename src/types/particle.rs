//! The canonical particle tuple `(ID, pT, phi, eta)` and the record stream item.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Small positive floor for both `|p| + pz` and `|p| - pz` in `eta`; one of
/// them vanishes for a particle travelling exactly along the beam axis.
pub const ETA_FLOOR: f64 = 1e-16;

/// Standard particle information. Immutable once decoded.
///
/// A large run may produce ~10^7 of these, so the struct is kept `Copy` and
/// exactly four scalars wide.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    /// Monte Carlo particle identifier; negative for antiparticles.
    pub id: i32,
    /// Transverse momentum in GeV.
    pub pt: f64,
    /// Azimuthal angle in (-pi, pi].
    pub phi: f64,
    /// Pseudorapidity.
    pub eta: f64,
}

impl Particle {
    pub fn new(id: i32, pt: f64, phi: f64, eta: f64) -> Self {
        Self { id, pt, phi, eta }
    }

    /// Builds a particle from Cartesian momentum components.
    pub fn from_momentum(id: i32, px: f64, py: f64, pz: f64) -> Self {
        let pt = (px * px + py * py).sqrt();
        let phi = py.atan2(px);
        let pmag = (px * px + py * py + pz * pz).sqrt();
        let eta = 0.5 * ((pmag + pz).max(ETA_FLOOR) / (pmag - pz).max(ETA_FLOOR)).ln();
        Self { id, pt, phi, eta }
    }
}

/// Renders the particle as a standard-format line: `ID pT phi eta`.
impl fmt::Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.id, self.pt, self.phi, self.eta)
    }
}

/// One item of a decoded record stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Record {
    Particle(Particle),
    /// Flush the current event.
    EventBoundary,
}

impl Record {
    pub fn as_particle(&self) -> Option<&Particle> {
        match self {
            Record::Particle(p) => Some(p),
            Record::EventBoundary => None,
        }
    }
}

impl From<Particle> for Record {
    fn from(p: Particle) -> Self {
        Record::Particle(p)
    }
}

/// An ordered, non-empty sequence of particles between two boundaries.
pub type Event = Vec<Particle>;
