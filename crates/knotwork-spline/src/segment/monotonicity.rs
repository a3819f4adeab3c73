//! Monotonicity classification of a calibrated response.

use knotwork_math::solvers::{bisection, find_sign_changes, SolverConfig};

use crate::error::SplineResult;

/// Slopes this small relative to the largest scanned slope count as stationary.
const STATIONARY_TOLERANCE: f64 = 1e-9;

/// Stationary points this close to an edge belong to the neighbouring segment.
const EDGE_TOLERANCE: f64 = 1e-9;

/// Shape of a response over one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Monotonicity {
    /// No interior stationary point.
    Monotonic,
    /// One interior maximum.
    Maxima,
    /// One interior minimum.
    Minima,
    /// One interior stationary point where the slope touches zero without
    /// changing sign, as `t³` at the origin.
    Inflection,
    /// More than one interior stationary point.
    NonMonotonic,
}

impl Monotonicity {
    /// Returns true if the response never turns: [`Monotonicity::Monotonic`]
    /// or a stationary [`Monotonicity::Inflection`].
    pub fn is_monotonic(&self) -> bool {
        matches!(self, Self::Monotonic | Self::Inflection)
    }
}

fn interior(t: f64) -> bool {
    t > EDGE_TOLERANCE && t < 1.0 - EDGE_TOLERANCE
}

/// Classifies a response from its local first and second derivatives on `[0, 1]`.
///
/// Sign changes of `f′` are extrema, told apart by the direction of the
/// change. Sign changes of `f″` where `f′` vanishes are stationary
/// inflections.
pub(crate) fn classify<D1, D2>(
    first: D1,
    second: D2,
    scan_intervals: usize,
) -> SplineResult<Monotonicity>
where
    D1: Fn(f64) -> f64,
    D2: Fn(f64) -> f64,
{
    let config = SolverConfig::default();
    let half_cell = 0.5 / scan_intervals as f64;

    let mut minima = Vec::new();
    let mut maxima = Vec::new();
    for (a, b) in find_sign_changes(&first, 0.0, 1.0, scan_intervals)? {
        let root = bisection(&first, a, b, &config)?.root;
        if !interior(root) {
            continue;
        }
        // A zero on a grid node is only an extremum if the slope changes sign
        let before = first((root - half_cell).max(0.0));
        let after = first((root + half_cell).min(1.0));
        if before < 0.0 && after > 0.0 {
            minima.push(root);
        } else if before > 0.0 && after < 0.0 {
            maxima.push(root);
        }
    }

    let scale = (0..=scan_intervals)
        .map(|i| first(i as f64 / scan_intervals as f64).abs())
        .fold(0.0, f64::max);
    let mut inflections = Vec::new();
    for (a, b) in find_sign_changes(&second, 0.0, 1.0, scan_intervals)? {
        let root = bisection(&second, a, b, &config)?.root;
        let turning = minima.iter().chain(&maxima).any(|t| (t - root).abs() < half_cell);
        if interior(root) && !turning && first(root).abs() <= STATIONARY_TOLERANCE * scale {
            inflections.push(root);
        }
    }

    Ok(match (minima.len(), maxima.len(), inflections.len()) {
        (0, 0, 0) => Monotonicity::Monotonic,
        (1, 0, 0) => Monotonicity::Minima,
        (0, 1, 0) => Monotonicity::Maxima,
        (0, 0, 1) => Monotonicity::Inflection,
        _ => Monotonicity::NonMonotonic,
    })
}
