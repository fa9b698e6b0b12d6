// In: src/filter.rs

//! Particle selection.
//!
//! A `ParticleFilter` is the logical AND of every active criterion. It always
//! accepts `Record::EventBoundary`, so it can sit upstream of the segmenter
//! without merging or dropping events.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashSet;

use crate::config::EbeConfig;
use crate::error::EbeError;
use crate::types::{Particle, Record};

//==================================================================================
// 1. Charged-species lookup seam
//==================================================================================

/// An external source of truth for which particle species carry charge.
///
/// Only consulted when the `charged` criterion is active. Implementations are
/// queried with the absolute particle ID.
pub trait ChargedLookup: Send + Sync {
    fn is_charged(&self, abs_id: i32) -> bool;
}

/// An in-memory set of charged particle IDs.
#[derive(Debug, Clone, Default)]
pub struct ChargedIdSet {
    ids: HashSet<i32>,
}

impl ChargedIdSet {
    pub fn new<I: IntoIterator<Item = i32>>(ids: I) -> Self {
        Self {
            ids: ids.into_iter().map(i32::abs).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<i32> for ChargedIdSet {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl ChargedLookup for ChargedIdSet {
    fn is_charged(&self, abs_id: i32) -> bool {
        self.ids.contains(&abs_id)
    }
}

//==================================================================================
// 2. Filter criteria
//==================================================================================

/// The raw selection criteria, as configured.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub particle_ids: Option<Vec<i32>>,
    pub charged: bool,
    pub pt_min: Option<f64>,
    pub pt_max: Option<f64>,
    pub eta_min: Option<f64>,
    pub eta_max: Option<f64>,
}

impl FilterSpec {
    pub fn from_config(config: &EbeConfig) -> Self {
        Self {
            particle_ids: config.particle_ids.clone(),
            charged: config.charged,
            pt_min: config.pt_min,
            pt_max: config.pt_max,
            eta_min: config.eta_min,
            eta_max: config.eta_max,
        }
    }

    pub fn validate(&self) -> Result<(), EbeError> {
        let invalid = |msg: String| Err(EbeError::InvalidConfiguration(msg));

        if self.particle_ids.is_some() && self.charged {
            return invalid("particle ID allow-list and 'charged' are mutually exclusive".to_string());
        }

        for (name, bound) in [("pt_min", self.pt_min), ("pt_max", self.pt_max)] {
            if let Some(v) = bound {
                if !(v >= 0.0) {
                    return invalid(format!("{} must be >= 0, got {}", name, v));
                }
            }
        }
        if let (Some(lo), Some(hi)) = (self.pt_min, self.pt_max) {
            if lo > hi {
                return invalid(format!("pt_min ({}) exceeds pt_max ({})", lo, hi));
            }
        }

        match (self.eta_min, self.eta_max) {
            (Some(lo), Some(hi)) if !(lo < hi) => {
                invalid(format!("eta_min ({}) must be less than eta_max ({})", lo, hi))
            }
            (Some(lo), None) if !(lo >= 0.0) => {
                invalid(format!("eta_min alone selects |eta| > eta_min and must be >= 0, got {}", lo))
            }
            (None, Some(hi)) if !(hi > 0.0) => {
                invalid(format!("eta_max alone selects |eta| < eta_max and must be > 0, got {}", hi))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Clone)]
enum Criterion {
    Ids(HashSet<i32>),
    Charged(Arc<dyn ChargedLookup>),
    PtRange { min: Option<f64>, max: Option<f64> },
    AbsEtaBelow(f64),
    AbsEtaAbove(f64),
    EtaWithin { min: f64, max: f64 },
}

impl Criterion {
    fn matches(&self, p: &Particle) -> bool {
        match self {
            Criterion::Ids(ids) => ids.contains(&p.id),
            Criterion::Charged(lookup) => lookup.is_charged(p.id.abs()),
            Criterion::PtRange { min, max } => {
                min.map_or(true, |lo| lo <= p.pt) && max.map_or(true, |hi| p.pt <= hi)
            }
            Criterion::AbsEtaBelow(max) => p.eta.abs() < *max,
            Criterion::AbsEtaAbove(min) => *min < p.eta.abs(),
            Criterion::EtaWithin { min, max } => *min < p.eta && p.eta < *max,
        }
    }
}

impl fmt::Debug for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Ids(ids) => write!(f, "Ids({} ids)", ids.len()),
            Criterion::Charged(_) => write!(f, "Charged"),
            Criterion::PtRange { min, max } => write!(f, "PtRange({:?}..={:?})", min, max),
            Criterion::AbsEtaBelow(v) => write!(f, "|eta| < {}", v),
            Criterion::AbsEtaAbove(v) => write!(f, "|eta| > {}", v),
            Criterion::EtaWithin { min, max } => write!(f, "{} < eta < {}", min, max),
        }
    }
}

//==================================================================================
// 3. The composed predicate
//==================================================================================

/// A validated, ready-to-run particle predicate.
#[derive(Debug, Clone, Default)]
pub struct ParticleFilter {
    criteria: Vec<Criterion>,
}

impl ParticleFilter {
    /// A filter that accepts everything.
    pub fn accept_all() -> Self {
        Self::default()
    }

    /// Builds the predicate. `charged_lookup` is required only when the filter
    /// asks for charged particles.
    pub fn new(
        spec: &FilterSpec,
        charged_lookup: Option<Arc<dyn ChargedLookup>>,
    ) -> Result<Self, EbeError> {
        spec.validate()?;
        let mut criteria = Vec::new();

        if let Some(ids) = &spec.particle_ids {
            criteria.push(Criterion::Ids(ids.iter().copied().collect()));
        }
        if spec.charged {
            let lookup = charged_lookup.ok_or_else(|| {
                EbeError::InvalidConfiguration(
                    "'charged' filter requested but no charged-particle lookup was supplied"
                        .to_string(),
                )
            })?;
            criteria.push(Criterion::Charged(lookup));
        }
        if spec.pt_min.is_some() || spec.pt_max.is_some() {
            criteria.push(Criterion::PtRange {
                min: spec.pt_min,
                max: spec.pt_max,
            });
        }
        match (spec.eta_min, spec.eta_max) {
            (Some(min), Some(max)) => criteria.push(Criterion::EtaWithin { min, max }),
            (Some(min), None) => criteria.push(Criterion::AbsEtaAbove(min)),
            (None, Some(max)) => criteria.push(Criterion::AbsEtaBelow(max)),
            (None, None) => {}
        }

        log::debug!("particle filter criteria: {:?}", criteria);
        Ok(Self { criteria })
    }

    /// Builds the filter described by a full configuration.
    pub fn from_config(
        config: &EbeConfig,
        charged_lookup: Option<Arc<dyn ChargedLookup>>,
    ) -> Result<Self, EbeError> {
        Self::new(&FilterSpec::from_config(config), charged_lookup)
    }

    /// True when no criterion is active.
    pub fn is_pass_through(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn accepts_particle(&self, p: &Particle) -> bool {
        self.criteria.iter().all(|c| c.matches(p))
    }

    /// Boundaries always pass.
    pub fn accepts(&self, record: &Record) -> bool {
        match record {
            Record::Particle(p) => self.accepts_particle(p),
            Record::EventBoundary => true,
        }
    }
}
