use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::aggregator::{AggregationMode, FlowAggregator};
use super::vectors::{FlowAccumulator, FlowVectors};
use crate::config::EbeConfig;
use crate::error::EbeError;
use crate::types::Particle;

fn accumulator() -> FlowAccumulator {
    FlowAccumulator::new(1, 4).unwrap()
}

fn particle(pt: f64, phi: f64) -> Particle {
    Particle::new(211, pt, phi, 0.0)
}

/// A reproducible stream with a falling pT spectrum and uniform angles.
fn random_particles(n: usize, seed: u64) -> Vec<Particle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let u: f64 = rng.random_range(0.0..1.0);
            let pt = -0.5 * (1.0 - u).ln();
            let phi = rng.random_range(-PI..PI);
            particle(pt, phi)
        })
        .collect()
}

fn assert_flows_close(a: &FlowVectors, b: &FlowVectors, tol: f64) {
    assert_eq!(a.multiplicity(), b.multiplicity());
    for (x, y) in a.vector_chain().zip(b.vector_chain()) {
        assert!((x - y).abs() < tol, "{} vs {} (tol {})", x, y, tol);
    }
}

//==================================================================================
// 1. Construction
//==================================================================================

#[test]
fn test_invalid_settings_rejected_at_construction() {
    let cases = [
        FlowAggregator::integrated(accumulator(), Some(0)),
        FlowAggregator::differential(accumulator(), 0.0, None),
        FlowAggregator::differential(accumulator(), -0.1, Some(10)),
        FlowAggregator::differential(accumulator(), f64::NAN, None),
    ];
    for result in cases {
        assert!(matches!(result, Err(EbeError::InvalidConfiguration(_))));
    }
}

#[test]
fn test_from_config() {
    let config = EbeConfig {
        vn_min: 2,
        vn_max: 3,
        bin_width: 0.25,
        buffer_capacity: Some(64),
        ..Default::default()
    };
    let agg = FlowAggregator::differential_from_config(&config).unwrap();
    assert_eq!(agg.mode(), AggregationMode::Differential { bin_width: 0.25 });
    assert_eq!(agg.bin_count(), 0);

    let agg = FlowAggregator::integrated_from_config(&config).unwrap();
    assert_eq!(agg.mode(), AggregationMode::Integrated);
    assert_eq!(agg.bin_count(), 1);

    let bad = EbeConfig {
        vn_min: 3,
        vn_max: 2,
        ..Default::default()
    };
    assert!(FlowAggregator::integrated_from_config(&bad).is_err());
    assert!(FlowAggregator::differential_from_config(&bad).is_err());
}

//==================================================================================
// 2. Dynamic binning
//==================================================================================

#[test]
fn test_bins_are_created_lazily_with_empty_gaps() {
    let mut agg = FlowAggregator::differential(accumulator(), 0.1, None).unwrap();
    for pt in [0.05, 0.15, 5.0] {
        agg.push_particle(&particle(pt, 0.3)).unwrap();
    }
    assert_eq!(agg.bin_count(), 51);

    let result = agg.finish_differential().unwrap();
    assert_eq!(result.len(), 51);
    for bin in &result.bins {
        let expected = if [0, 1, 50].contains(&bin.index) { 1 } else { 0 };
        assert_eq!(bin.flows.multiplicity(), expected, "bin {}", bin.index);
        assert!(bin.flows.vector_chain().all(|v| v == 0.0));
    }
    assert_eq!(result.bins[0].pt_mid, 0.05);
    assert_eq!(result.bins[1].pt_mid, 0.15);
    assert_eq!(result.bins[50].pt_mid, 5.05);
}

#[test]
fn test_growth_never_invalidates_existing_bins() {
    let mut agg = FlowAggregator::differential(accumulator(), 0.5, Some(3)).unwrap();
    agg.push_particle(&particle(0.1, 0.0)).unwrap();
    agg.push_particle(&particle(0.2, PI)).unwrap();
    agg.push_particle(&particle(9.9, 1.0)).unwrap(); // flush + growth to bin 19
    agg.push_particle(&particle(0.3, 0.0)).unwrap();

    let result = agg.finish_differential().unwrap();
    assert_eq!(result.len(), 20);
    assert_eq!(result.bins[0].flows.multiplicity(), 3);
    assert_eq!(result.bins[19].flows.multiplicity(), 1);
    let (v1x, _) = result.bins[0].flows.vector(1).unwrap();
    assert!((v1x - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_fine_bin_width_accepts_high_pt() {
    // Arrange
    let mut agg = FlowAggregator::differential(accumulator(), 1e-6, Some(4)).unwrap();

    // Act: two million bins apart, in the middle of the stream
    agg.push_particle(&particle(0.5e-6, 0.0)).unwrap();
    agg.push_particle(&particle(2.0, 0.0)).unwrap();
    agg.push_particle(&particle(2.0, PI)).unwrap();

    // Assert
    assert!(agg.bin_count() > 1_999_000, "{}", agg.bin_count());
    assert_eq!(agg.buffered(), 3);
    let summed = agg.finish_integrated();
    assert_eq!(summed.flows.multiplicity(), 3);
}

#[test]
fn test_unbinnable_particles_are_rejected() {
    let mut agg = FlowAggregator::differential(accumulator(), 0.1, None).unwrap();
    for pt in [-0.1, f64::NAN, f64::INFINITY, 1e300] {
        assert!(matches!(
            agg.push_particle(&particle(pt, 0.0)),
            Err(EbeError::InvalidParticle(_))
        ));
    }
    assert_eq!(agg.bin_count(), 0);
}

//==================================================================================
// 3. Buffering
//==================================================================================

#[test]
fn test_buffered_matches_unbuffered_differential() {
    let particles = random_particles(10_000, 42);

    let mut reference = FlowAggregator::differential(accumulator(), 0.1, None).unwrap();
    for p in &particles {
        reference.push_particle(p).unwrap();
    }
    assert_eq!(reference.flushes(), 0);
    let reference = reference.finish_differential().unwrap();

    for capacity in [1, 100, 10_000] {
        let mut agg = FlowAggregator::differential(accumulator(), 0.1, Some(capacity)).unwrap();
        for p in &particles {
            agg.push_particle(p).unwrap();
        }
        let result = agg.finish_differential().unwrap();

        assert_eq!(result.len(), reference.len(), "capacity {}", capacity);
        for (a, b) in result.bins.iter().zip(&reference.bins) {
            assert_eq!(a.pt_mid, b.pt_mid);
            assert_flows_close(&a.flows, &b.flows, 1e-8);
        }
    }
}

#[test]
fn test_flush_triggers_at_capacity_and_empty_flush_is_noop() {
    let mut agg = FlowAggregator::differential(accumulator(), 0.1, Some(100)).unwrap();
    for p in random_particles(250, 3) {
        agg.push_particle(&p).unwrap();
    }
    assert_eq!(agg.flushes(), 2);
    assert_eq!(agg.buffered(), 50);

    agg.flush();
    assert_eq!(agg.flushes(), 3);
    assert_eq!(agg.buffered(), 0);

    agg.flush();
    assert_eq!(agg.flushes(), 3);
}

//==================================================================================
// 4. Whole-run average
//==================================================================================

#[test]
fn test_integrated_average_equals_union_in_any_order() {
    let all = random_particles(900, 11);
    let (a, rest) = all.split_at(200);
    let (b, c) = rest.split_at(450);

    let direct = accumulator().compute(&all);

    let orders: [[&[Particle]; 3]; 3] = [[a, b, c], [c, a, b], [b, c, a]];
    for order in &orders {
        for capacity in [None, Some(7), Some(1000)] {
            let mut agg = FlowAggregator::integrated(accumulator(), capacity).unwrap();
            for event in order {
                agg.push_event(event).unwrap();
            }
            let result = agg.finish_integrated();
            assert_eq!(result.events, 3);
            assert_flows_close(&result.flows, &direct, 1e-10);
        }
    }
}

#[test]
fn test_merge_grouping_does_not_matter() {
    let acc = accumulator();
    let a = acc.compute(&random_particles(30, 1));
    let b = acc.compute(&random_particles(70, 2));
    let c = acc.compute(&random_particles(5, 3));

    // merge(merge(A, B), C)
    let mut left = a.clone();
    left.merge(&b).unwrap();
    left.merge(&c).unwrap();

    // merge(C, merge(A, B)) with a different grouping
    let mut ab = a.clone();
    ab.merge(&b).unwrap();
    let mut right = c.clone();
    right.merge(&ab).unwrap();

    // merge(merge(C, A), B)
    let mut other = c.clone();
    other.merge(&a).unwrap();
    other.merge(&b).unwrap();

    assert_flows_close(&left, &right, 1e-10);
    assert_flows_close(&left, &other, 1e-10);
}

#[test]
fn test_integrated_event_fold_is_bounded_by_event() {
    let mut agg = FlowAggregator::integrated(accumulator(), None).unwrap();
    agg.push_event(&random_particles(40, 5)).unwrap();
    assert_eq!(agg.buffered(), 0);
    assert_eq!(agg.flushes(), 1);
    agg.push_event(&[]).unwrap();
    assert_eq!(agg.flushes(), 1);
}

#[test]
fn test_empty_run() {
    let agg = FlowAggregator::integrated(accumulator(), Some(10)).unwrap();
    let result = agg.finish_integrated();
    assert_eq!(result.events, 0);
    assert_eq!(result.flows.multiplicity(), 0);
    assert!(result.flows.vector_chain().all(|v| v == 0.0));
}

#[test]
fn test_integrated_aggregator_has_no_bins() {
    let agg = FlowAggregator::integrated(accumulator(), None).unwrap();
    assert!(matches!(
        agg.finish_differential(),
        Err(EbeError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_differential_sum_equals_integrated() {
    let particles = random_particles(500, 9);
    let mut diff = FlowAggregator::differential(accumulator(), 0.2, Some(64)).unwrap();
    diff.push_event(&particles).unwrap();
    let summed = diff.finish_integrated();

    assert_eq!(summed.events, 1);
    assert_flows_close(&summed.flows, &accumulator().compute(&particles), 1e-10);
}
