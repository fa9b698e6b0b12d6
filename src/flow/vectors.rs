// In: src/flow/vectors.rs

//! Per-collection flow vectors and the event-plane accumulator.
//!
//! For harmonic order `n`, the flow vector of a particle collection is
//! `(mean cos(n*phi), mean sin(n*phi))`. `FlowVectors` keeps that exact mean
//! together with the multiplicity it was taken over, which is all that is
//! needed to merge two disjoint collections:
//!
//!   v = (M*v + m*v') / (M + m),  M = M + m
//!
//! The minimum-multiplicity rule is applied in the accessors, never to the
//! stored means, so merging at any granularity gives the same observable
//! result up to floating-point rounding.

use std::ops::RangeInclusive;

use ndarray::ArrayView1;
use serde::ser::{Serialize, Serializer};

use crate::config::validate_harmonics;
use crate::error::EbeError;
use crate::types::{Event, Particle};

/// Default minimum number of particles for a non-zero flow vector.
pub const DEFAULT_MIN_MULTIPLICITY: usize = 2;

//==================================================================================
// 1. Harmonic range
//==================================================================================

/// A validated, inclusive range of harmonic orders `[min, max]`, `min >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Harmonics {
    min: u32,
    max: u32,
}

impl Harmonics {
    pub fn new(min: u32, max: u32) -> Result<Self, EbeError> {
        validate_harmonics(min, max)?;
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn orders(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }

    pub fn len(&self) -> usize {
        (self.max - self.min + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

//==================================================================================
// 2. FlowVectors
//==================================================================================

/// Flow vectors for every harmonic in a `Harmonics` range, over `multiplicity`
/// particles.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowVectors {
    harmonics: Harmonics,
    min_multiplicity: usize,
    multiplicity: usize,
    vx: Vec<f64>,
    vy: Vec<f64>,
}

impl FlowVectors {
    /// Zero vectors over zero particles; the identity for [`FlowVectors::merge`].
    pub fn empty(harmonics: Harmonics, min_multiplicity: usize) -> Self {
        Self {
            harmonics,
            min_multiplicity,
            multiplicity: 0,
            vx: vec![0.0; harmonics.len()],
            vy: vec![0.0; harmonics.len()],
        }
    }

    /// Event-plane flow vectors of a set of azimuthal angles.
    pub fn from_angles(harmonics: Harmonics, min_multiplicity: usize, phi: &[f64]) -> Self {
        let mut flows = Self::empty(harmonics, min_multiplicity);
        if phi.is_empty() {
            return flows;
        }

        let phi = ArrayView1::from(phi);
        for (k, n) in harmonics.orders().enumerate() {
            let nphi = &phi * f64::from(n);
            flows.vx[k] = nphi.mapv(f64::cos).mean().unwrap_or(0.0);
            flows.vy[k] = nphi.mapv(f64::sin).mean().unwrap_or(0.0);
        }
        flows.multiplicity = phi.len();
        flows
    }

    /// Folds another collection's vectors into this one, weighting each side
    /// by its multiplicity. Both sides must cover the same harmonics.
    pub fn merge(&mut self, other: &FlowVectors) -> Result<(), EbeError> {
        if self.harmonics != other.harmonics {
            return Err(EbeError::InvalidConfiguration(format!(
                "cannot merge flows over harmonics {:?} into {:?}",
                other.harmonics.orders(),
                self.harmonics.orders()
            )));
        }
        self.merge_unchecked(other);
        Ok(())
    }

    /// `merge` for callers that already know the harmonics agree.
    pub(crate) fn merge_unchecked(&mut self, other: &FlowVectors) {
        debug_assert_eq!(self.harmonics, other.harmonics);
        if other.multiplicity == 0 {
            return;
        }

        let m_old = self.multiplicity as f64;
        let m_new = other.multiplicity as f64;
        let total = m_old + m_new;
        for k in 0..self.vx.len() {
            self.vx[k] = (m_old * self.vx[k] + m_new * other.vx[k]) / total;
            self.vy[k] = (m_old * self.vy[k] + m_new * other.vy[k]) / total;
        }
        self.multiplicity += other.multiplicity;
    }

    /// Merges the flow vectors of a set of angles.
    pub fn add_angles(&mut self, phi: &[f64]) {
        if phi.is_empty() {
            return;
        }
        let part = FlowVectors::from_angles(self.harmonics, self.min_multiplicity, phi);
        self.merge_unchecked(&part);
    }

    pub fn harmonics(&self) -> Harmonics {
        self.harmonics
    }

    pub fn multiplicity(&self) -> usize {
        self.multiplicity
    }

    pub fn min_multiplicity(&self) -> usize {
        self.min_multiplicity
    }

    /// True if enough particles contributed for the vectors to be reported.
    pub fn is_significant(&self) -> bool {
        self.multiplicity > 0 && self.multiplicity >= self.min_multiplicity
    }

    /// `(vx_n, vy_n)` for harmonic `n`, or `None` if `n` is out of range.
    pub fn vector(&self, n: u32) -> Option<(f64, f64)> {
        if !self.harmonics.orders().contains(&n) {
            return None;
        }
        let k = (n - self.harmonics.min()) as usize;
        Some(if self.is_significant() {
            (self.vx[k], self.vy[k])
        } else {
            (0.0, 0.0)
        })
    }

    /// `(vx_min, vy_min), ..., (vx_max, vy_max)`
    pub fn vectors(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        let significant = self.is_significant();
        self.vx.iter().zip(&self.vy).map(move |(&x, &y)| {
            if significant {
                (x, y)
            } else {
                (0.0, 0.0)
            }
        })
    }

    /// `vx_min, vy_min, ..., vx_max, vy_max`
    pub fn vector_chain(&self) -> impl Iterator<Item = f64> + '_ {
        self.vectors().flat_map(|(x, y)| [x, y])
    }

    /// `v_n = sqrt(vx^2 + vy^2)` per harmonic.
    pub fn magnitudes(&self) -> impl Iterator<Item = f64> + '_ {
        self.vectors().map(|(x, y)| x.hypot(y))
    }

    /// Event-plane angles `atan2(vy, vx)` per harmonic.
    pub fn angles(&self) -> impl Iterator<Item = f64> + '_ {
        self.vectors().map(|(x, y)| y.atan2(x))
    }
}

/// Serialized as the observable view: zeroed vectors below the minimum
/// multiplicity.
impl Serialize for FlowVectors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(serde::Serialize)]
        struct View {
            vn_min: u32,
            vn_max: u32,
            multiplicity: usize,
            vectors: Vec<(f64, f64)>,
            magnitudes: Vec<f64>,
        }

        View {
            vn_min: self.harmonics.min(),
            vn_max: self.harmonics.max(),
            multiplicity: self.multiplicity,
            vectors: self.vectors().collect(),
            magnitudes: self.magnitudes().collect(),
        }
        .serialize(serializer)
    }
}

//==================================================================================
// 3. FlowAccumulator
//==================================================================================

/// Computes `FlowVectors` for finite particle collections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowAccumulator {
    harmonics: Harmonics,
    min_multiplicity: usize,
}

impl FlowAccumulator {
    /// Fails with `InvalidConfiguration` unless `1 <= vn_min <= vn_max`.
    pub fn new(vn_min: u32, vn_max: u32) -> Result<Self, EbeError> {
        Ok(Self {
            harmonics: Harmonics::new(vn_min, vn_max)?,
            min_multiplicity: DEFAULT_MIN_MULTIPLICITY,
        })
    }

    pub fn with_min_multiplicity(mut self, min_multiplicity: usize) -> Self {
        self.min_multiplicity = min_multiplicity;
        self
    }

    pub fn harmonics(&self) -> Harmonics {
        self.harmonics
    }

    pub fn min_multiplicity(&self) -> usize {
        self.min_multiplicity
    }

    pub fn empty(&self) -> FlowVectors {
        FlowVectors::empty(self.harmonics, self.min_multiplicity)
    }

    pub fn compute(&self, particles: &[Particle]) -> FlowVectors {
        let phi: Vec<f64> = particles.iter().map(|p| p.phi).collect();
        self.compute_angles(&phi)
    }

    pub fn compute_angles(&self, phi: &[f64]) -> FlowVectors {
        FlowVectors::from_angles(self.harmonics, self.min_multiplicity, phi)
    }
}

/// Lazily computes one `FlowVectors` per event. Errors pass through unchanged.
pub fn event_by_event<I>(
    events: I,
    accumulator: FlowAccumulator,
) -> impl Iterator<Item = Result<FlowVectors, EbeError>>
where
    I: IntoIterator<Item = Result<Event, EbeError>>,
{
    events
        .into_iter()
        .map(move |event| event.map(|e| accumulator.compute(&e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const TOL: f64 = 1e-12;

    fn accumulator(min: u32, max: u32) -> FlowAccumulator {
        FlowAccumulator::new(min, max).unwrap()
    }

    #[test]
    fn test_invalid_harmonics() {
        assert!(matches!(
            FlowAccumulator::new(0, 2),
            Err(EbeError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            FlowAccumulator::new(3, 2),
            Err(EbeError::InvalidConfiguration(_))
        ));
        assert_eq!(accumulator(2, 2).harmonics().len(), 1);
    }

    #[test]
    fn test_back_to_back_pair() {
        let flows = accumulator(1, 2).compute_angles(&[0.0, PI]);
        let v: Vec<(f64, f64)> = flows.vectors().collect();

        assert_eq!(flows.multiplicity(), 2);
        assert!(v[0].0.abs() < TOL && v[0].1.abs() < TOL);
        assert!((v[1].0 - 1.0).abs() < TOL && v[1].1.abs() < TOL);
    }

    #[test]
    fn test_single_particle_reports_zero_for_every_harmonic() {
        let acc = accumulator(1, 6);
        for phi in [0.0, 0.3, -2.0, PI] {
            let flows = acc.compute_angles(&[phi]);
            assert_eq!(flows.multiplicity(), 1);
            assert!(!flows.is_significant());
            assert!(flows.vector_chain().all(|v| v == 0.0));
            assert!(flows.magnitudes().all(|v| v == 0.0));
        }
    }

    #[test]
    fn test_empty_collection() {
        let flows = accumulator(2, 4).compute(&[]);
        assert_eq!(flows.multiplicity(), 0);
        assert_eq!(flows.vector_chain().count(), 6);
        assert!(flows.vector_chain().all(|v| v == 0.0));
    }

    #[test]
    fn test_configurable_min_multiplicity() {
        let acc = accumulator(2, 2).with_min_multiplicity(3);
        assert!(!acc.compute_angles(&[0.0, PI]).is_significant());
        assert!(acc.compute_angles(&[0.0, PI, 0.0]).is_significant());

        let permissive = accumulator(1, 1).with_min_multiplicity(1);
        let flows = permissive.compute_angles(&[0.5]);
        let (x, y) = flows.vector(1).unwrap();
        assert!((x - 0.5f64.cos()).abs() < TOL && (y - 0.5f64.sin()).abs() < TOL);
    }

    #[test]
    fn test_derived_views() {
        // all particles at phi = pi/4: v1 = (cos, sin) of pi/4, unit magnitude
        let flows = accumulator(1, 1).compute_angles(&[PI / 4.0; 4]);
        let chain: Vec<f64> = flows.vector_chain().collect();
        assert_eq!(chain.len(), 2);
        assert!((chain[0] - (PI / 4.0).cos()).abs() < TOL);
        assert!((flows.magnitudes().next().unwrap() - 1.0).abs() < TOL);
        assert!((flows.angles().next().unwrap() - PI / 4.0).abs() < TOL);
        assert_eq!(flows.vector(2), None);
    }

    #[test]
    fn test_merge_matches_union() {
        let acc = accumulator(1, 3);
        let a = [0.1, 0.7, -1.2];
        let b = [2.0, 2.5];
        let c = [-3.0];

        let mut merged = acc.compute_angles(&a);
        merged.merge(&acc.compute_angles(&b)).unwrap();
        merged.merge(&acc.compute_angles(&c)).unwrap();

        let union: Vec<f64> = a.iter().chain(&b).chain(&c).copied().collect();
        let direct = acc.compute_angles(&union);

        assert_eq!(merged.multiplicity(), 6);
        for (m, d) in merged.vector_chain().zip(direct.vector_chain()) {
            assert!((m - d).abs() < 1e-10);
        }
    }

    #[test]
    fn test_add_angles_folds_in_place() {
        let acc = accumulator(1, 3);
        let mut running = acc.compute_angles(&[0.2, 1.1]);
        running.add_angles(&[]);
        running.add_angles(&[-2.0, 0.7, 3.0]);

        let direct = acc.compute_angles(&[0.2, 1.1, -2.0, 0.7, 3.0]);
        assert_eq!(running.multiplicity(), 5);
        for (a, b) in running.vector_chain().zip(direct.vector_chain()) {
            assert!((a - b).abs() < TOL);
        }
    }

    #[test]
    fn test_merge_rejects_mismatched_harmonics() {
        let mut a = accumulator(1, 2).compute_angles(&[0.0, 1.0]);
        let b = accumulator(2, 3).compute_angles(&[0.0, 1.0]);
        assert!(a.merge(&b).is_err());
        assert_eq!(a.multiplicity(), 2);
    }

    #[test]
    fn test_event_by_event_passes_errors_through() {
        let events = vec![
            Ok(vec![Particle::new(211, 1.0, 0.0, 0.0), Particle::new(211, 1.0, PI, 0.0)]),
            Err(EbeError::UnknownParticleCode { ityp: 0, iso: 0 }),
        ];
        let results: Vec<_> = event_by_event(events, accumulator(2, 2)).collect();
        assert_eq!(results[0].as_ref().unwrap().multiplicity(), 2);
        assert!(results[1].is_err());
    }

    #[test]
    fn test_serializes_observable_view() {
        let flows = accumulator(2, 2).compute_angles(&[0.3]);
        let json = serde_json::to_value(&flows).unwrap();
        assert_eq!(json["multiplicity"], 1);
        assert_eq!(json["vectors"][0][0], 0.0);
        assert_eq!(json["vn_min"], 2);
    }
}
