//! Integration tests: calibrate, query, differentiate and modify sequences.
//!
//! The zero-rate curve below is a smooth humped profile sampled at the usual
//! money-market and swap tenors:
//!
//! | Tenor | Zero rate |
//! |-------|-----------|
//! | 0.25Y | 3.936%    |
//! | 0.5Y  | 3.774%    |
//! | 1Y    | 3.591%    |
//! | 2Y    | 3.502%    |
//! | 3Y    | 3.493%    |
//! | 5Y    | 3.603%    |
//! | 7Y    | 3.788%    |
//! | 10Y   | 4.018%    |
//! | 20Y   | 4.628%    |
//! | 30Y   | 4.667%    |

use approx::assert_relative_eq;
use knotwork_spline::prelude::*;
use tracing_subscriber::EnvFilter;

const TENORS: [f64; 10] = [0.25, 0.5, 1.0, 2.0, 3.0, 5.0, 7.0, 10.0, 20.0, 30.0];
const ZERO_RATES: [f64; 10] = [
    0.03936, 0.03774, 0.03591, 0.03502, 0.03493, 0.03603, 0.03788, 0.04018, 0.04628, 0.04667,
];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn cubic(knots: &[f64], ys: &[f64], condition: BoundaryCondition) -> MultiSegmentSequence {
    MultiSegmentSequence::interpolate(
        "test",
        knots,
        ys,
        SegmentBuilderControl::cubic_polynomial(2),
        SequenceConfig::new(condition),
    )
    .unwrap()
}

fn assert_ck_continuous(sequence: &MultiSegmentSequence, ck: u32, epsilon: f64) {
    for pair in sequence.segments().windows(2) {
        let knot = pair[0].right();
        assert_relative_eq!(
            pair[0].response_value(knot).unwrap(),
            pair[1].response_value(knot).unwrap(),
            epsilon = epsilon
        );
        for order in 1..=ck {
            assert_relative_eq!(
                pair[0].derivative(knot, order).unwrap(),
                pair[1].derivative(knot, order).unwrap(),
                epsilon = epsilon
            );
        }
    }
}

// =============================================================================
// CALIBRATION
// =============================================================================

#[test]
fn test_natural_cubic_hump() {
    init_tracing();
    let sequence = cubic(&[0.0, 1.0, 2.0], &[0.0, 1.0, 0.0], BoundaryCondition::Natural);

    // S(x) = 1.5x − 0.5x³ on [0, 1], mirrored on [1, 2]
    assert_relative_eq!(sequence.leading_slope().unwrap(), 1.5, epsilon = 1e-8);
    assert_relative_eq!(sequence.response_value(0.5).unwrap(), 0.6875, epsilon = 1e-9);
    assert_relative_eq!(sequence.response_value(1.5).unwrap(), 0.6875, epsilon = 1e-9);
    assert_relative_eq!(sequence.derivative(0.0, 2).unwrap(), 0.0, epsilon = 1e-9);
    assert_relative_eq!(sequence.derivative(2.0, 2).unwrap(), 0.0, epsilon = 1e-8);

    let left = sequence.segments()[0].derivative(1.0, 2).unwrap();
    let right = sequence.segments()[1].derivative(1.0, 2).unwrap();
    assert_relative_eq!(left, -3.0, epsilon = 1e-8);
    assert_relative_eq!(left, right, epsilon = 1e-8);
}

#[test]
fn test_zero_curve_interpolation() {
    init_tracing();
    for condition in [
        BoundaryCondition::Floating,
        BoundaryCondition::Natural,
        BoundaryCondition::Financial,
        BoundaryCondition::NotAKnot,
    ] {
        let curve = cubic(&TENORS, &ZERO_RATES, condition);

        assert_eq!(curve.len(), TENORS.len() - 1);
        assert_eq!(curve.knots(), TENORS.to_vec());
        for (&t, &r) in TENORS.iter().zip(&ZERO_RATES) {
            assert_relative_eq!(curve.response_value(t).unwrap(), r, epsilon = 1e-10);
        }
        assert_ck_continuous(&curve, 2, 1e-8);
    }

    let financial = cubic(&TENORS, &ZERO_RATES, BoundaryCondition::Financial);
    assert_relative_eq!(financial.derivative(30.0, 1).unwrap(), 0.0, epsilon = 1e-10);
    assert_eq!(financial.floating_condition(), Some(BoundaryCondition::Financial));
}

#[test]
fn test_ck1_natural_sequence() {
    init_tracing();
    let knots = [0.0, 1.0, 2.0, 3.0];
    let ys = [1.0, 2.0, 0.5, 1.0];
    let build = |ys: &[f64]| {
        MultiSegmentSequence::interpolate(
            "ck1",
            &knots,
            ys,
            SegmentBuilderControl::cubic_polynomial(1),
            SequenceConfig::natural(),
        )
        .unwrap()
    };

    let curve = build(&ys[..]);
    assert_eq!(curve.floating_slope().map(|f| f.edge), Some(ResidualEdge::Leading));
    assert_relative_eq!(curve.derivative(0.0, 2).unwrap(), 0.0, epsilon = 1e-9);
    assert_ck_continuous(&curve, 1, 1e-9);

    let x = 1.7;
    let jacobian = curve.jack_d_response_d_response_input(x).unwrap();
    let eps = 1e-6;
    for k in 0..ys.len() {
        let (mut up, mut down) = (ys, ys);
        up[k] += eps;
        down[k] -= eps;
        let fd = (build(&up[..]).response_value(x).unwrap()
            - build(&down[..]).response_value(x).unwrap())
            / (2.0 * eps);
        assert_relative_eq!(jacobian.get(0, k).unwrap(), fd, epsilon = 1e-6);
    }

    let linear = build(&[0.0, 1.0, 2.0, 3.0][..]);
    assert_relative_eq!(linear.response_value(x).unwrap(), x, epsilon = 1e-9);
    let total: f64 = linear.jack_d_response_d_response_input(x).unwrap().row(0).iter().sum();
    assert_relative_eq!(total, 1.0, epsilon = 1e-9);
}

#[test]
fn test_tension_basis_sequence() {
    let control = SegmentBuilderControl::new(
        BasisFamily::KochLycheKvasovHyperbolic { tension: 2.0 },
        DesignControl::new(2, 2),
    );
    let curve = MultiSegmentSequence::interpolate(
        "klk",
        &TENORS,
        &ZERO_RATES,
        control,
        SequenceConfig::natural(),
    )
    .unwrap();

    for (&t, &r) in TENORS.iter().zip(&ZERO_RATES) {
        assert_relative_eq!(curve.response_value(t).unwrap(), r, epsilon = 1e-10);
    }
    assert_ck_continuous(&curve, 2, 1e-8);
    assert_relative_eq!(curve.derivative(30.0, 2).unwrap(), 0.0, epsilon = 1e-8);
}

#[test]
fn test_average_constraint_from_free_constraints() {
    let knots = [0.0, 1.0, 2.0, 3.0];
    let constraints = vec![
        ResponseValueConstraint::point(1.0, 0.02).unwrap(),
        ResponseValueConstraint::new(vec![1.5, 2.0], vec![0.5, 0.5], 0.025).unwrap(),
        ResponseValueConstraint::point(3.0, 0.03).unwrap(),
    ];
    let inputs = SequenceInputs::from_constraints(&knots, Some(0.01), constraints).unwrap();
    assert_eq!(inputs.constraints()[1].len(), 1);

    let curve = MultiSegmentSequence::calibrate(
        "avg",
        &knots,
        &[SegmentBuilderControl::cubic_polynomial(2)],
        &inputs,
        SequenceConfig::natural(),
    )
    .unwrap();

    let average =
        0.5 * (curve.response_value(1.5).unwrap() + curve.response_value(2.0).unwrap());
    assert_relative_eq!(average, 0.025, epsilon = 1e-10);
    assert_relative_eq!(curve.response_value(0.0).unwrap(), 0.01, epsilon = 1e-12);
    assert_relative_eq!(curve.response_value(3.0).unwrap(), 0.03, epsilon = 1e-10);
    assert_ck_continuous(&curve, 2, 1e-9);
}

#[test]
fn test_overdetermined_segment_fails() {
    let knots = [0.0, 1.0, 2.0];
    let point = |x, y| ResponseValueConstraint::point(x, y).unwrap();
    let inputs = SequenceInputs::new(
        Some(0.0),
        vec![
            vec![point(1.0, 1.0)],
            vec![point(1.25, 0.5), point(1.5, 0.5), point(1.75, 0.5), point(2.0, 0.0)],
        ],
    )
    .unwrap();

    let err = MultiSegmentSequence::calibrate(
        "over",
        &knots,
        &[SegmentBuilderControl::cubic_polynomial(2)],
        &inputs,
        SequenceConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SplineError::ConstraintCountMismatch { constraints: 7, basis: 4 }));
}

#[test]
fn test_config_from_json() {
    let config: SequenceConfig =
        serde_json::from_str(r#"{ "boundary_condition": "not_a_knot", "tolerance": 1e-11 }"#)
            .unwrap();
    assert_eq!(config.boundary_condition, BoundaryCondition::NotAKnot);
    assert_eq!(config.max_iterations, SequenceConfig::default().max_iterations);
    assert!(config.is_valid());

    let curve = MultiSegmentSequence::interpolate(
        "json",
        &[0.0, 1.0, 2.0, 3.0],
        &[1.0, 0.0, 2.0, 1.0],
        SegmentBuilderControl::cubic_polynomial(2),
        config,
    )
    .unwrap();
    let segments = curve.segments();
    assert_relative_eq!(
        segments[0].derivative(1.0, 3).unwrap(),
        segments[1].derivative(1.0, 3).unwrap(),
        epsilon = 1e-7
    );
}

// =============================================================================
// QUERIES
// =============================================================================

#[test]
fn test_linear_sequence_shape() {
    let control = SegmentBuilderControl::new(
        BasisFamily::Polynomial { num_basis: 2 },
        DesignControl::new(0, 1),
    );
    let ys = [1.0, 2.0, 4.0, 4.5];
    let curve = MultiSegmentSequence::interpolate(
        "linear",
        &[0.0, 1.0, 2.0, 3.0],
        &ys,
        control,
        SequenceConfig::default(),
    )
    .unwrap();

    assert!(curve.is_locally_monotone().unwrap());
    assert!(curve.is_co_monotone(&ys).unwrap());
    assert_eq!(curve.monotone_type(1.5).unwrap(), Monotonicity::Monotonic);
    // Trapezoids: 1.5 + 3.0 + 4.25
    assert_relative_eq!(curve.integrate(0.0, 3.0).unwrap(), 8.75, epsilon = 1e-12);
    assert_relative_eq!(curve.integrate(3.0, 0.0).unwrap(), -8.75, epsilon = 1e-12);
    assert!(curve.integrate(0.0, 3.5).unwrap_err().is_out_of_domain());
}

#[test]
fn test_ck0_cubic_keeps_monotone_data_monotone() {
    let knots = [0.0, 1.0, 2.0, 3.0];
    for ys in [[0.0, 1.0, 1.01, 5.0], [0.0, 0.1, 2.0, 2.05]] {
        for condition in [BoundaryCondition::Floating, BoundaryCondition::Natural] {
            let curve = MultiSegmentSequence::interpolate(
                "ck0",
                &knots,
                &ys,
                SegmentBuilderControl::cubic_polynomial(0),
                SequenceConfig::new(condition),
            )
            .unwrap();
            assert!(curve.is_locally_monotone().unwrap());
            assert!(curve.is_co_monotone(&ys).unwrap());
        }

        // Inherited slopes overshoot the near-flat step
        let ck1 = MultiSegmentSequence::interpolate(
            "ck1",
            &knots,
            &ys,
            SegmentBuilderControl::cubic_polynomial(1),
            SequenceConfig::new(BoundaryCondition::Floating),
        )
        .unwrap();
        assert!(!ck1.is_locally_monotone().unwrap());
    }
}

#[test]
fn test_response_input_jacobian_matches_bumps() {
    let knots = [0.0, 1.0, 2.0, 3.0];
    let ys = [1.0, 2.0, 0.5, 1.0];
    let curve = cubic(&knots, &ys, BoundaryCondition::Natural);
    assert_eq!(curve.response_inputs().unwrap(), ys.to_vec());

    let eps = 1e-6;
    for &x in &[0.4, 1.3, 2.7] {
        let jacobian = curve.jack_d_response_d_response_input(x).unwrap();
        assert_eq!(jacobian.cols(), ys.len());

        let base = curve.response_value(x).unwrap();
        for k in 0..ys.len() {
            let mut bumped = ys;
            bumped[k] += eps;
            let fd = (cubic(&knots, &bumped, BoundaryCondition::Natural)
                .response_value(x)
                .unwrap()
                - base)
                / eps;
            assert_relative_eq!(jacobian.get(0, k).unwrap(), fd, epsilon = 1e-5);
        }

        // A parallel shift of every input shifts the curve by the same amount
        let total: f64 = jacobian.row(0).iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-8);
    }
}

#[test]
fn test_edge_jacobian_is_local() {
    let curve = cubic(&TENORS, &ZERO_RATES, BoundaryCondition::Natural);
    let jacobian = curve.jack_d_response_d_edge_input(4.0).unwrap();

    assert_eq!(jacobian.cols(), TENORS.len());
    let row = jacobian.row(0);
    for (k, value) in row.iter().enumerate() {
        if k != 4 && k != 5 {
            assert_eq!(*value, 0.0);
        }
    }
    assert!(row[4] != 0.0 || row[5] != 0.0);
}

// =============================================================================
// MODIFICATION
// =============================================================================

#[test]
fn test_insertion_then_clipping() {
    init_tracing();
    let curve = cubic(&TENORS, &ZERO_RATES, BoundaryCondition::Natural);

    let p = 15.0;
    let inserted = curve.insert_knot(p, curve.response_value(p).unwrap()).unwrap();
    assert_eq!(inserted.len(), curve.len() + 1);
    for k in 0..=60 {
        let x = 0.25 + 29.75 * f64::from(k) / 60.0;
        assert_relative_eq!(
            inserted.response_value(x).unwrap(),
            curve.response_value(x).unwrap(),
            epsilon = 1e-10
        );
    }

    let clipped = inserted.clip_left(1.5).unwrap().clip_right(25.0).unwrap();
    assert_eq!(clipped.domain(), (1.5, 25.0));
    for &x in &[1.5, 2.0, 6.0, 15.0, 24.9] {
        assert_relative_eq!(
            clipped.response_value(x).unwrap(),
            curve.response_value(x).unwrap(),
            epsilon = 1e-10
        );
    }
    assert!(clipped.jack_d_response_d_response_input(10.0).unwrap().is_finite());
}

#[test]
fn test_append_extends_curve() {
    let curve = cubic(&TENORS, &ZERO_RATES, BoundaryCondition::Natural);
    let appended = curve
        .append_segment(
            40.0,
            ResponseValueConstraint::point(40.0, 0.0465).unwrap(),
            SegmentBuilderControl::cubic_polynomial(2),
        )
        .unwrap();

    assert_eq!(appended.domain(), (0.25, 40.0));
    assert_relative_eq!(appended.response_value(40.0).unwrap(), 0.0465, epsilon = 1e-12);
    assert_relative_eq!(
        appended.response_value(12.0).unwrap(),
        curve.response_value(12.0).unwrap(),
        epsilon = 1e-12
    );
    assert_ck_continuous(&appended, 2, 1e-9);
}

#[test]
fn test_recalibrate_with_new_quotes() {
    let base = cubic(&TENORS, &ZERO_RATES, BoundaryCondition::Natural);
    let mut curve = base.clone();
    let shifted: Vec<f64> = ZERO_RATES.iter().map(|r| r + 0.001).collect();
    let inputs = SequenceInputs::knot_responses(&TENORS, &shifted).unwrap();

    curve.recalibrate(&inputs).unwrap();
    // Natural splines reproduce constants, so a parallel shift moves the curve in step
    for &x in &[0.3, 4.0, 12.5, 28.0] {
        assert_relative_eq!(
            curve.response_value(x).unwrap(),
            base.response_value(x).unwrap() + 0.001,
            epsilon = 1e-10
        );
    }
}
