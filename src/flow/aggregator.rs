// In: src/flow/aggregator.rs

//! Streaming, bounded-memory aggregation of flow vectors.
//!
//! Incoming particles only contribute their azimuthal angle, which is parked
//! in a buffer (one angle list per momentum bin, or a single list for the
//! whole-run average). When the buffer holds `capacity` angles it is flushed:
//! each non-empty list is turned into `FlowVectors` and merged into the
//! matching running total by multiplicity weighting, then cleared.
//!
//! There is one code path for buffered and unbuffered runs: an unbounded
//! capacity just flushes once at the end (or, for the whole-run average, at
//! every event end). Results at different capacities agree up to
//! floating-point rounding, typically ~1e-15 per component; this is an
//! accepted discrepancy, not a bug.

use hashbrown::HashMap;
use serde::Serialize;

use super::vectors::{FlowAccumulator, FlowVectors};
use crate::config::EbeConfig;
use crate::error::EbeError;
use crate::types::Particle;

/// How contributions are keyed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregationMode {
    /// One running total for the whole run.
    Integrated,
    /// One running total per pT bin of the given width (GeV).
    Differential { bin_width: f64 },
}

//==================================================================================
// 1. Results
//==================================================================================

/// Whole-run average flow.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateFlows {
    pub events: usize,
    pub flows: FlowVectors,
}

/// Average flow in one pT bin.
#[derive(Debug, Clone, Serialize)]
pub struct BinnedFlow {
    pub index: usize,
    /// Bin center `(2k+1) * width / 2`, rounded to 10 decimals.
    pub pt_mid: f64,
    pub flows: FlowVectors,
}

/// Differential (pT-binned) average flow, ordered by bin index.
#[derive(Debug, Clone, Serialize)]
pub struct DifferentialFlows {
    pub events: usize,
    pub bin_width: f64,
    pub bins: Vec<BinnedFlow>,
}

impl DifferentialFlows {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Iterates `(pt_mid, flows)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &FlowVectors)> {
        self.bins.iter().map(|b| (b.pt_mid, &b.flows))
    }
}

fn bin_center(index: usize, width: f64) -> f64 {
    let mid = (2 * index + 1) as f64 * width / 2.0;
    (mid * 1e10).round() / 1e10
}

//==================================================================================
// 2. The aggregator
//==================================================================================

/// Merges particles or whole events into running flow totals.
///
/// Owns all of its mutable state; not shared between threads.
#[derive(Debug)]
pub struct FlowAggregator {
    accumulator: FlowAccumulator,
    mode: AggregationMode,
    capacity: Option<usize>,
    /// Buffered angles keyed by bin index.
    pending: HashMap<usize, Vec<f64>>,
    pending_len: usize,
    /// Running totals of populated bins only; empty bins are filled in at finish.
    totals: HashMap<usize, FlowVectors>,
    /// One past the highest bin index seen.
    bin_count: usize,
    events: usize,
    flushes: usize,
}

impl FlowAggregator {
    /// Validates every setting before any data is accepted.
    ///
    /// `capacity: None` means unbounded.
    pub fn new(
        accumulator: FlowAccumulator,
        mode: AggregationMode,
        capacity: Option<usize>,
    ) -> Result<Self, EbeError> {
        if capacity == Some(0) {
            return Err(EbeError::InvalidConfiguration(
                "buffer capacity must be at least 1".to_string(),
            ));
        }
        let bin_count = match mode {
            AggregationMode::Integrated => 1,
            AggregationMode::Differential { bin_width } => {
                if !(bin_width.is_finite() && bin_width > 0.0) {
                    return Err(EbeError::InvalidConfiguration(format!(
                        "bin width must be a positive number, got {}",
                        bin_width
                    )));
                }
                0
            }
        };

        Ok(Self {
            accumulator,
            mode,
            capacity,
            pending: HashMap::new(),
            pending_len: 0,
            totals: HashMap::new(),
            bin_count,
            events: 0,
            flushes: 0,
        })
    }

    pub fn integrated(accumulator: FlowAccumulator, capacity: Option<usize>) -> Result<Self, EbeError> {
        Self::new(accumulator, AggregationMode::Integrated, capacity)
    }

    pub fn differential(
        accumulator: FlowAccumulator,
        bin_width: f64,
        capacity: Option<usize>,
    ) -> Result<Self, EbeError> {
        Self::new(accumulator, AggregationMode::Differential { bin_width }, capacity)
    }

    /// Whole-run aggregator using the harmonic, multiplicity and buffer
    /// settings of a config.
    pub fn integrated_from_config(config: &EbeConfig) -> Result<Self, EbeError> {
        Self::with_config_mode(config, AggregationMode::Integrated)
    }

    /// pT-binned aggregator using the config's `bin_width` as well.
    pub fn differential_from_config(config: &EbeConfig) -> Result<Self, EbeError> {
        Self::with_config_mode(
            config,
            AggregationMode::Differential {
                bin_width: config.bin_width,
            },
        )
    }

    fn with_config_mode(config: &EbeConfig, mode: AggregationMode) -> Result<Self, EbeError> {
        config.validate()?;
        let accumulator = FlowAccumulator::new(config.vn_min, config.vn_max)?
            .with_min_multiplicity(config.min_multiplicity);
        Self::new(accumulator, mode, config.buffer_capacity)
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    /// Number of angles currently buffered.
    pub fn buffered(&self) -> usize {
        self.pending_len
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Number of bins spanned so far, including empty interior bins
    /// (1 in integrated mode).
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    fn bin_index(&self, p: &Particle) -> Result<usize, EbeError> {
        let bin_width = match self.mode {
            AggregationMode::Integrated => return Ok(0),
            AggregationMode::Differential { bin_width } => bin_width,
        };
        if !(p.pt.is_finite() && p.pt >= 0.0) {
            return Err(EbeError::InvalidParticle(format!(
                "pT must be finite and non-negative for binning, got {} (ID {})",
                p.pt, p.id
            )));
        }
        let index = (p.pt / bin_width).floor();
        // `usize::MAX as f64` rounds up to 2^64, so `>=` is the overflow test
        if index >= usize::MAX as f64 {
            return Err(EbeError::InvalidParticle(format!(
                "pT {} with bin width {} gives a bin index beyond the addressable range",
                p.pt, bin_width
            )));
        }
        Ok(index as usize)
    }

    /// Adds one particle, flushing if the buffer reaches capacity.
    pub fn push_particle(&mut self, p: &Particle) -> Result<(), EbeError> {
        let index = self.bin_index(p)?;
        self.bin_count = self.bin_count.max(index + 1);
        self.pending.entry(index).or_default().push(p.phi);
        self.pending_len += 1;

        if self.capacity == Some(self.pending_len) {
            self.flush();
        }
        Ok(())
    }

    /// Adds every particle of one event. In integrated mode the event is also
    /// folded in immediately, so memory is bounded by the largest event even
    /// without a capacity.
    pub fn push_event(&mut self, event: &[Particle]) -> Result<(), EbeError> {
        for p in event {
            self.push_particle(p)?;
        }
        self.events += 1;
        if self.mode == AggregationMode::Integrated {
            self.flush();
        }
        Ok(())
    }

    /// Merges the buffered angles into the running totals and clears the
    /// buffer. A no-op when nothing is buffered.
    pub fn flush(&mut self) {
        if self.pending_len == 0 {
            return;
        }
        let accumulator = self.accumulator;
        for (&index, angles) in self.pending.iter_mut() {
            if angles.is_empty() {
                continue;
            }
            self.totals
                .entry(index)
                .or_insert_with(|| accumulator.empty())
                .add_angles(angles.as_slice());
            angles.clear();
        }
        log_metric!(
            "event" = "flush",
            "angles" = self.pending_len,
            "bins" = self.bin_count,
            "flush" = self.flushes + 1
        );
        self.pending_len = 0;
        self.flushes += 1;
    }

    /// Flushes and returns the whole-run total, ignoring any binning.
    pub fn finish_integrated(mut self) -> AggregateFlows {
        self.flush();
        let mut flows = self.accumulator.empty();
        // bin order, so the sum is reproducible
        let mut indices: Vec<usize> = self.totals.keys().copied().collect();
        indices.sort_unstable();
        for index in indices {
            if let Some(total) = self.totals.get(&index) {
                flows.merge_unchecked(total);
            }
        }
        if flows.multiplicity() == 0 {
            log::warn!("no particles contributed to the average flow");
        }
        log::info!(
            "average flow: {} events, {} particles, {} flushes",
            self.events,
            flows.multiplicity(),
            self.flushes
        );
        AggregateFlows {
            events: self.events,
            flows,
        }
    }

    /// Flushes and returns one entry per bin, including empty interior bins.
    pub fn finish_differential(mut self) -> Result<DifferentialFlows, EbeError> {
        let bin_width = match self.mode {
            AggregationMode::Differential { bin_width } => bin_width,
            AggregationMode::Integrated => {
                return Err(EbeError::InvalidConfiguration(
                    "aggregator was not configured with a pT bin width".to_string(),
                ))
            }
        };
        self.flush();
        log::info!(
            "differential flow: {} events, {} bins of width {}, {} flushes",
            self.events,
            self.bin_count,
            bin_width,
            self.flushes
        );
        let accumulator = self.accumulator;
        let mut totals = self.totals;
        let bins = (0..self.bin_count)
            .map(|index| BinnedFlow {
                index,
                pt_mid: bin_center(index, bin_width),
                flows: totals
                    .remove(&index)
                    .unwrap_or_else(|| accumulator.empty()),
            })
            .collect();
        Ok(DifferentialFlows {
            events: self.events,
            bin_width,
            bins,
        })
    }
}
