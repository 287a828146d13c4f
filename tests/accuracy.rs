//! End-to-end accuracy checks for the per-flow and whole-array estimates.
//!
//! These run millions of inserts; they are still deterministic (fixed hash
//! seeds), so the asserted error bounds are stable across runs.

use vhll::VirtualHll;

fn relative_error(estimate: f64, actual: f64) -> f64 {
    (estimate - actual).abs() / actual
}

/// One flow, one million distinct elements: the virtual estimate dominated by
/// the flow's own traffic must land within 4%.
#[test]
fn test_single_flow_one_million() {
    let mut sketch = VirtualHll::with_precision(20).unwrap();
    for i in 0u32..1_000_000 {
        sketch.insert(b"flow", &i.to_le_bytes());
    }

    let estimate = sketch.estimate_flow(b"flow") as f64;
    assert!(
        relative_error(estimate, 1_000_000.0) < 0.04,
        "estimate {estimate} outside 4% of 1000000"
    );
}

/// Five flows with harmonic cardinalities sharing one array: every per-flow
/// estimate must land within 13% despite cross-flow contamination.
#[test]
fn test_five_flows_shared_array() {
    let mut sketch = VirtualHll::with_precision(24).unwrap();
    for i in 0u32..=2_000_000 {
        for j in 1u32..=5 {
            if i % j == 0 {
                sketch.insert(&j.to_le_bytes(), &i.to_le_bytes());
            }
        }
    }

    for j in 1u32..=5 {
        let expected = f64::from(2_000_000 / j + 1);
        let estimate = sketch.estimate_flow(&j.to_le_bytes()) as f64;
        assert!(
            relative_error(estimate, expected) < 0.13,
            "flow {j}: estimate {estimate} outside 13% of {expected}"
        );
    }
}

/// Many small flows filling the array uniformly: the whole-array estimate is
/// a plain HyperLogLog estimate and must land within 5%.
#[test]
fn test_many_flows_total_estimate() {
    let mut sketch = VirtualHll::new(14, 7).unwrap();
    for flow in 0u32..2_000 {
        for i in 0u32..50 {
            // Globally distinct elements so rank observations stay independent.
            let element = u64::from(flow) * 1_000_000 + u64::from(i);
            sketch.insert(&flow.to_le_bytes(), &element.to_le_bytes());
        }
    }

    let total = sketch.estimate_total() as f64;
    assert!(
        relative_error(total, 100_000.0) < 0.05,
        "total estimate {total} outside 5% of 100000"
    );
}

/// A large flow among thousands of small ones, with the virtual array much
/// smaller than the physical array: exercises the scaled noise-correction
/// branch.
#[test]
fn test_large_flow_among_noise() {
    let mut sketch = VirtualHll::new(14, 7).unwrap();
    for flow in 0u32..2_000 {
        for i in 0u32..50 {
            let element = u64::from(flow) * 1_000_000 + u64::from(i);
            sketch.insert(&flow.to_le_bytes(), &element.to_le_bytes());
        }
    }
    for i in 0u64..20_000 {
        sketch.insert(b"whale", &i.to_le_bytes());
    }

    // s = 128 registers: ~9% relative standard error before correction noise.
    let estimate = sketch.estimate_flow(b"whale") as f64;
    assert!(
        relative_error(estimate, 20_000.0) < 0.30,
        "estimate {estimate} outside 30% of 20000"
    );

    // An unseen flow reads pure cross-flow noise; after correction it must sit
    // near zero (possibly slightly negative; callers clamp at the edge).
    let unseen = sketch.estimate_flow(b"unseen-flow");
    assert!(
        unseen.abs() < 3_000,
        "unseen flow estimate {unseen} not near zero"
    );
}
