//! Property-based tests for sequence invariants.
//!
//! These tests verify properties that should hold for any well-spaced knots:
//! - Interpolating sequences pass through every knot response
//! - Chained segments join with their declared continuity
//! - Inserting a knot at the curve's own value leaves the curve unchanged
//! - Clipping leaves the kept part of the curve unchanged
//! - Response-input sensitivities sum to one

use approx::assert_relative_eq;
use knotwork_spline::prelude::*;
use proptest::prelude::*;

// =============================================================================
// TEST DATA GENERATORS
// =============================================================================

/// Knots starting at zero with gaps in `[0.5, 2.0]`, and one response per knot.
fn knots_and_responses() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (3usize..=6).prop_flat_map(|n| {
        (
            prop::collection::vec(0.5f64..2.0, n - 1),
            prop::collection::vec(-2.0f64..2.0, n),
        )
            .prop_map(|(gaps, ys)| {
                let mut knots = Vec::with_capacity(gaps.len() + 1);
                knots.push(0.0);
                for gap in gaps {
                    let last = knots[knots.len() - 1];
                    knots.push(last + gap);
                }
                (knots, ys)
            })
    })
}

/// Every boundary condition with cubic continuity orders 1 and 2.
fn condition_and_ck() -> impl Strategy<Value = (BoundaryCondition, u32)> {
    (
        prop_oneof![
            Just(BoundaryCondition::Floating),
            Just(BoundaryCondition::Natural),
            Just(BoundaryCondition::Financial),
            Just(BoundaryCondition::NotAKnot),
        ],
        1u32..=2,
    )
}

fn cubic(
    knots: &[f64],
    ys: &[f64],
    condition: BoundaryCondition,
    ck: u32,
) -> MultiSegmentSequence {
    MultiSegmentSequence::interpolate(
        "prop",
        knots,
        ys,
        SegmentBuilderControl::cubic_polynomial(ck),
        SequenceConfig::new(condition),
    )
    .unwrap()
}

fn natural(knots: &[f64], ys: &[f64]) -> MultiSegmentSequence {
    cubic(knots, ys, BoundaryCondition::Natural, 2)
}

/// Largest response difference on a 40-cell grid over `[from, to]`.
fn max_difference(a: &MultiSegmentSequence, b: &MultiSegmentSequence, from: f64, to: f64) -> f64 {
    (0..=40)
        .map(|k| {
            let x = (from + (to - from) * f64::from(k) / 40.0).clamp(from, to);
            (a.response_value(x).unwrap() - b.response_value(x).unwrap()).abs()
        })
        .fold(0.0, f64::max)
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_interpolation_hits_knots((knots, ys) in knots_and_responses()) {
        let sequence = natural(&knots, &ys);
        for (&x, &y) in knots.iter().zip(&ys) {
            prop_assert!((sequence.response_value(x).unwrap() - y).abs() < 1e-9);
        }
        prop_assert!(sequence.derivative(knots[0], 2).unwrap().abs() < 1e-9);
    }

    #[test]
    fn prop_chain_is_c2((knots, ys) in knots_and_responses()) {
        let sequence = natural(&knots, &ys);
        for pair in sequence.segments().windows(2) {
            let knot = pair[0].right();
            let left = pair[0].calc_sprd(knot).unwrap();
            let right = pair[1].calc_sprd(knot).unwrap();
            prop_assert!((left.value - right.value).abs() < 1e-9);
            for (l, r) in left.derivatives.iter().zip(&right.derivatives) {
                prop_assert!((l - r).abs() < 1e-7);
            }
        }
    }

    #[test]
    fn prop_insertion_at_own_value_is_invariant(
        (knots, ys) in knots_and_responses(),
        (condition, ck) in condition_and_ck(),
        segment in 0usize..5,
        fraction in 0.1f64..0.9,
    ) {
        let sequence = cubic(&knots, &ys, condition, ck);
        let i = segment % sequence.len();
        let p = knots[i] + fraction * (knots[i + 1] - knots[i]);
        let inserted = sequence.insert_knot(p, sequence.response_value(p).unwrap()).unwrap();

        prop_assert_eq!(inserted.len(), sequence.len() + 1);
        let (left, right) = sequence.domain();
        let diff = max_difference(&sequence, &inserted, left, right);
        prop_assert!(diff < 1e-8, "{} ck={} p={}: {}", condition, ck, p, diff);
    }

    #[test]
    fn prop_clipping_keeps_curve(
        (knots, ys) in knots_and_responses(),
        (condition, ck) in condition_and_ck(),
        segment in 0usize..5,
        fraction in 0.1f64..0.9,
    ) {
        let sequence = cubic(&knots, &ys, condition, ck);
        let i = segment % sequence.len();
        let x = knots[i] + fraction * (knots[i + 1] - knots[i]);
        let (left, right) = sequence.domain();

        let clipped = sequence.clip_left(x).unwrap();
        prop_assert_eq!(clipped.domain(), (x, right));
        let diff = max_difference(&sequence, &clipped, x, right);
        prop_assert!(diff < 1e-8, "clip_left {} ck={} x={}: {}", condition, ck, x, diff);

        let clipped = sequence.clip_right(x).unwrap();
        prop_assert_eq!(clipped.domain(), (left, x));
        let diff = max_difference(&sequence, &clipped, left, x);
        prop_assert!(diff < 1e-8, "clip_right {} ck={} x={}: {}", condition, ck, x, diff);
    }

    #[test]
    fn prop_sensitivities_reproduce_constants(
        (knots, ys) in knots_and_responses(),
        (condition, ck) in condition_and_ck(),
        fraction in 0.0f64..1.0,
    ) {
        let sequence = cubic(&knots, &ys, condition, ck);
        let (left, right) = sequence.domain();
        let x = left + fraction * (right - left);
        let jacobian = sequence.jack_d_response_d_response_input(x).unwrap();
        prop_assert_eq!(jacobian.cols(), ys.len());
        let total: f64 = jacobian.row(0).iter().sum();
        prop_assert!((total - 1.0).abs() < 1e-7);
    }
}

#[test]
fn test_generator_knots_are_increasing() {
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    let mut runner = TestRunner::deterministic();
    for _ in 0..16 {
        let (knots, ys) = knots_and_responses().new_tree(&mut runner).unwrap().current();
        assert_eq!(knots.len(), ys.len());
        assert!(knots.windows(2).all(|w| w[1] - w[0] >= 0.5));
        assert_relative_eq!(knots[0], 0.0);
    }
}
