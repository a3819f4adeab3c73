//! Leading-edge boundary conditions.
//!
//! Every condition other than [`BoundaryCondition::Floating`] floats the
//! leading slope `s` of the chain and picks the value that zeroes a residual
//! elsewhere on the curve:
//!
//! | Condition   | Leading derivatives | Residual                                        |
//! |-------------|---------------------|-------------------------------------------------|
//! | `Natural`   | `[s, 0]` (`[s]` if Ck = 1) | second derivative at the right edge      |
//! | `Financial` | `[s]`               | first derivative at the right edge              |
//! | `NotAKnot`  | `[s]`               | jump of the `Ck + 1` derivative at the first interior knot |
//!
//! The residual is affine in `s` for a linear chain, so the Newton search
//! typically finishes in one or two steps.
//!
//! Some chains cannot steer the trailing residual with `s`. In a `Ck = 1`
//! chain of cubics padded by a curvature row, every right-edge slope is the
//! chord slope whatever the slope on the left. The search then zeroes the
//! second derivative at the leading edge instead ([`ResidualEdge::Leading`]),
//! and if that does not respond either, a single pass runs at the chord
//! slope.

use std::cell::RefCell;

use knotwork_math::solvers::{newton_raphson_numerical, SolverConfig};
use knotwork_math::MathError;
use tracing::{debug, warn};

use super::builder::{CalibratedChain, CkSequenceBuilder, SegmentSequenceBuilder};
use super::inputs::SequenceInputs;
use crate::config::{BoundaryCondition, SequenceConfig};
use crate::error::{SplineError, SplineResult};
use crate::segment::Segment;

/// Relative slope step used to test whether a residual responds to `s`.
const SLOPE_BUMP: f64 = 1e-3;

/// Residual changes below this, relative to the residual, count as no response.
const DEGENERATE_RESIDUAL: f64 = 1e-10;

/// Where the residual that fixes the leading slope is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResidualEdge {
    /// The condition's own residual, away from the leading edge.
    Trailing,
    /// Second derivative at the leading edge.
    Leading,
}

/// Boundary condition whose residual fixed a chain's leading slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FloatingSlope {
    /// The condition.
    pub condition: BoundaryCondition,
    /// Where its residual was zeroed.
    pub edge: ResidualEdge,
}

impl FloatingSlope {
    /// The condition's own residual.
    pub fn trailing(condition: BoundaryCondition) -> Self {
        Self {
            condition,
            edge: ResidualEdge::Trailing,
        }
    }
}

/// One signed derivative evaluation contributing to a residual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ResidualTerm {
    pub segment: usize,
    pub x: f64,
    pub order: u32,
    pub sign: f64,
}

/// Returns true if `condition` floats the leading slope of a chain whose
/// leading segment has continuity `ck`.
pub(crate) fn floats_slope(condition: BoundaryCondition, ck: u32) -> bool {
    condition != BoundaryCondition::Floating && ck >= 1
}

/// Leading-edge derivatives for a trial slope.
pub(crate) fn leading_derivs(condition: BoundaryCondition, slope: f64, ck: u32) -> Vec<f64> {
    match condition {
        BoundaryCondition::Floating => Vec::new(),
        _ if ck == 0 => Vec::new(),
        BoundaryCondition::Natural if ck >= 2 => vec![slope, 0.0],
        _ => vec![slope],
    }
}

/// Derivative evaluations whose signed sum is the residual of `floating`.
pub(crate) fn residual_terms(floating: FloatingSlope, segments: &[Segment]) -> Vec<ResidualTerm> {
    let Some(last) = segments.len().checked_sub(1) else {
        return Vec::new();
    };
    let right_edge = |order| {
        vec![ResidualTerm {
            segment: last,
            x: segments[last].right(),
            order,
            sign: 1.0,
        }]
    };

    if floating.edge == ResidualEdge::Leading {
        return vec![ResidualTerm {
            segment: 0,
            x: segments[0].left(),
            order: 2,
            sign: 1.0,
        }];
    }

    match floating.condition {
        BoundaryCondition::Floating => Vec::new(),
        BoundaryCondition::Natural => right_edge(2),
        BoundaryCondition::Financial => right_edge(1),
        BoundaryCondition::NotAKnot if segments.len() < 2 => right_edge(2),
        BoundaryCondition::NotAKnot => {
            let knot = segments[0].right();
            let order = segments[0].ck() + 1;
            vec![
                ResidualTerm {
                    segment: 0,
                    x: knot,
                    order,
                    sign: 1.0,
                },
                ResidualTerm {
                    segment: 1,
                    x: knot,
                    order,
                    sign: -1.0,
                },
            ]
        }
    }
}

/// Residual of `floating` on a calibrated chain.
pub(crate) fn residual(floating: FloatingSlope, segments: &[Segment]) -> SplineResult<f64> {
    residual_terms(floating, segments)
        .into_iter()
        .map(|term| {
            segments[term.segment]
                .derivative(term.x, term.order)
                .map(|d| term.sign * d)
        })
        .sum()
}

/// Solves for the leading slope that satisfies a boundary condition.
///
/// Each trial slope recalibrates the whole chain with a
/// [`CkSequenceBuilder`]. With [`BoundaryCondition::Floating`], or when the
/// leading segment carries no derivative continuity, a single pass runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryConditionBuilder {
    condition: BoundaryCondition,
    solver: SolverConfig,
}

impl BoundaryConditionBuilder {
    /// Creates a builder for `condition` with the given root-search settings.
    pub fn new(condition: BoundaryCondition, solver: SolverConfig) -> Self {
        Self { condition, solver }
    }

    /// Builder for the condition and solver settings of a sequence config.
    pub fn from_config(config: &SequenceConfig) -> Self {
        Self::new(config.boundary_condition, config.solver_config())
    }

    /// The boundary condition.
    pub fn condition(&self) -> BoundaryCondition {
        self.condition
    }

    fn chain(
        &self,
        slope: f64,
        template: &[Segment],
        inputs: &SequenceInputs,
    ) -> SplineResult<CalibratedChain> {
        let ck = template.first().map_or(0, Segment::ck);
        CkSequenceBuilder::new(leading_derivs(self.condition, slope, ck)).build(template, inputs)
    }

    /// First residual edge, trailing then leading, that responds to the slope.
    fn responsive_edge(
        &self,
        guess: f64,
        template: &[Segment],
        inputs: &SequenceInputs,
    ) -> SplineResult<Option<FloatingSlope>> {
        let step = SLOPE_BUMP * guess.abs().max(1.0);
        let base = self.chain(guess, template, inputs)?;
        let bumped = self.chain(guess + step, template, inputs)?;

        for edge in [ResidualEdge::Trailing, ResidualEdge::Leading] {
            let floating = FloatingSlope {
                condition: self.condition,
                edge,
            };
            let r0 = residual(floating, &base.segments)?;
            let r1 = residual(floating, &bumped.segments)?;
            if (r1 - r0).abs() > DEGENERATE_RESIDUAL * (1.0 + r0.abs().max(r1.abs())) {
                return Ok(Some(floating));
            }
        }
        Ok(None)
    }
}

/// Maps a failed slope search onto the spline error that names its cause.
fn search_failure(condition: BoundaryCondition, error: MathError) -> SplineError {
    match error {
        MathError::ConvergenceFailed {
            iterations,
            residual,
        } => SplineError::BoundaryConditionFailed {
            condition: condition.name().to_string(),
            iterations,
            residual,
        },
        cause => SplineError::BoundarySearchAborted {
            condition: condition.name().to_string(),
            cause,
        },
    }
}

/// Chord slope of the leading segment, if both of its edge responses are pinned.
fn chord_slope(template: &[Segment], inputs: &SequenceInputs) -> f64 {
    let (Some(first), Some(y0)) = (template.first(), inputs.leading_response()) else {
        return 0.0;
    };
    inputs
        .constraints()
        .first()
        .and_then(|group| group.iter().find(|c| c.as_point() == Some(first.right())))
        .map_or(0.0, |c| (c.value() - y0) / first.width())
}

impl SegmentSequenceBuilder for BoundaryConditionBuilder {
    fn build(
        &self,
        template: &[Segment],
        inputs: &SequenceInputs,
    ) -> SplineResult<CalibratedChain> {
        let ck = template.first().map_or(0, Segment::ck);
        if !floats_slope(self.condition, ck) {
            return CkSequenceBuilder::default().build(template, inputs);
        }

        let guess = chord_slope(template, inputs);
        let Some(floating) = self.responsive_edge(guess, template, inputs)? else {
            warn!(
                condition = %self.condition,
                slope = guess,
                "boundary residual does not respond to the leading slope, holding chord slope"
            );
            let mut chain = self.chain(guess, template, inputs)?;
            chain.leading_slope = Some(guess);
            return Ok(chain);
        };

        let failure = RefCell::new(None);
        let residual_at = |slope: f64| match self
            .chain(slope, template, inputs)
            .and_then(|chain| residual(floating, &chain.segments))
        {
            Ok(r) => r,
            Err(e) => {
                failure.borrow_mut().get_or_insert(e);
                f64::NAN
            }
        };

        match newton_raphson_numerical(residual_at, guess, &self.solver) {
            Ok(result) => {
                debug!(
                    condition = %self.condition,
                    edge = ?floating.edge,
                    slope = result.root,
                    iterations = result.iterations,
                    residual = result.residual,
                    "leading slope solved"
                );
                let mut chain = self.chain(result.root, template, inputs)?;
                chain.leading_slope = Some(result.root);
                chain.floating = Some(floating);
                Ok(chain)
            }
            Err(e) => {
                if let Some(inner) = failure.into_inner() {
                    return Err(inner);
                }
                warn!(
                    condition = %self.condition,
                    edge = ?floating.edge,
                    error = %e,
                    "leading slope search failed"
                );
                Err(search_failure(self.condition, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{ResponseValueConstraint, SegmentBuilderControl};
    use approx::assert_relative_eq;

    fn template(knots: &[f64], ck: u32) -> Vec<Segment> {
        knots
            .windows(2)
            .map(|w| Segment::new(w[0], w[1], SegmentBuilderControl::cubic_polynomial(ck)).unwrap())
            .collect()
    }

    fn solve(condition: BoundaryCondition, knots: &[f64], ys: &[f64], ck: u32) -> CalibratedChain {
        let inputs = SequenceInputs::knot_responses(knots, ys).unwrap();
        BoundaryConditionBuilder::new(condition, SolverConfig::new(1e-12, 50))
            .build(&template(knots, ck), &inputs)
            .unwrap()
    }

    #[test]
    fn test_leading_derivs() {
        assert!(leading_derivs(BoundaryCondition::Floating, 1.0, 2).is_empty());
        assert_eq!(leading_derivs(BoundaryCondition::Natural, 1.0, 2), vec![1.0, 0.0]);
        assert_eq!(leading_derivs(BoundaryCondition::Natural, 1.0, 1), vec![1.0]);
        assert_eq!(leading_derivs(BoundaryCondition::NotAKnot, 1.0, 2), vec![1.0]);
        assert!(leading_derivs(BoundaryCondition::Financial, 1.0, 0).is_empty());
    }

    #[test]
    fn test_natural_cubic_three_knots() {
        let chain = solve(BoundaryCondition::Natural, &[0.0, 1.0, 2.0], &[0.0, 1.0, 0.0], 2);

        // S(x) = 1.5x − 0.5x³ on [0, 1]
        assert_relative_eq!(chain.leading_slope.unwrap(), 1.5, epsilon = 1e-8);
        assert_relative_eq!(chain.segments[0].response_value(0.5).unwrap(), 0.6875, epsilon = 1e-9);
        assert_relative_eq!(chain.segments[1].derivative(2.0, 2).unwrap(), 0.0, epsilon = 1e-9);
        assert_eq!(chain.floating, Some(FloatingSlope::trailing(BoundaryCondition::Natural)));
    }

    #[test]
    fn test_financial_flattens_right_edge() {
        let chain = solve(
            BoundaryCondition::Financial,
            &[0.0, 1.0, 2.0, 4.0],
            &[0.01, 0.02, 0.025, 0.03],
            2,
        );
        let last = chain.segments.last().unwrap();
        assert_relative_eq!(last.derivative(4.0, 1).unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_not_a_knot_matches_third_derivative() {
        let chain = solve(
            BoundaryCondition::NotAKnot,
            &[0.0, 1.0, 2.0, 3.0],
            &[1.0, 0.0, 2.0, 1.0],
            2,
        );
        let left = chain.segments[0].derivative(1.0, 3).unwrap();
        let right = chain.segments[1].derivative(1.0, 3).unwrap();
        assert_relative_eq!(left, right, epsilon = 1e-7);
    }

    #[test]
    fn test_floating_is_single_pass() {
        let chain = solve(BoundaryCondition::Floating, &[0.0, 1.0, 2.0], &[0.0, 1.0, 0.0], 2);
        assert!(chain.leading_slope.is_none());
        assert!(chain.floating.is_none());
    }

    #[test]
    fn test_calibration_failure_surfaces_from_search() {
        // Two extra point constraints overflow the cubic's four rows
        let point = |x, y| ResponseValueConstraint::point(x, y).unwrap();
        let knots = [0.0, 1.0, 2.0];
        let groups = vec![
            vec![point(1.0, 1.0)],
            vec![point(1.2, 0.5), point(1.5, 0.5), point(2.0, 0.0)],
        ];
        let inputs = SequenceInputs::new(Some(0.0), groups).unwrap();
        let err = BoundaryConditionBuilder::new(BoundaryCondition::Natural, SolverConfig::default())
            .build(&template(&knots, 2), &inputs)
            .unwrap_err();
        assert!(matches!(err, SplineError::ConstraintCountMismatch { .. }));
    }

    #[test]
    fn test_ck1_natural_falls_back_to_leading_edge() {
        let knots = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 2.0, 0.5, 1.0];
        let chain = solve(BoundaryCondition::Natural, &knots, &ys, 1);

        assert_eq!(
            chain.floating,
            Some(FloatingSlope {
                condition: BoundaryCondition::Natural,
                edge: ResidualEdge::Leading,
            })
        );
        assert_relative_eq!(chain.segments[0].derivative(0.0, 2).unwrap(), 0.0, epsilon = 1e-9);
        for (i, segment) in chain.segments.iter().enumerate() {
            let (a, b) = (knots[i], knots[i + 1]);
            assert_relative_eq!(segment.response_value(a).unwrap(), ys[i], epsilon = 1e-10);
            assert_relative_eq!(segment.response_value(b).unwrap(), ys[i + 1], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_ck1_financial_on_linear_data() {
        let chain = solve(
            BoundaryCondition::Financial,
            &[0.0, 1.0, 2.0, 3.0],
            &[0.0, 1.0, 2.0, 3.0],
            1,
        );
        assert_relative_eq!(chain.leading_slope.unwrap(), 1.0, epsilon = 1e-9);
        assert_eq!(chain.floating.map(|f| f.edge), Some(ResidualEdge::Leading));
        assert_relative_eq!(chain.segments[2].response_value(2.5).unwrap(), 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_trailing_residual_preferred_when_responsive() {
        let chain = solve(
            BoundaryCondition::NotAKnot,
            &[0.0, 1.0, 2.0, 3.0],
            &[1.0, 2.0, 0.5, 1.0],
            1,
        );
        assert_eq!(chain.floating.map(|f| f.edge), Some(ResidualEdge::Trailing));
        let left = chain.segments[0].derivative(1.0, 2).unwrap();
        let right = chain.segments[1].derivative(1.0, 2).unwrap();
        assert_relative_eq!(left, right, epsilon = 1e-7);
    }

    #[test]
    fn test_search_failure_names_cause() {
        let stalled = search_failure(
            BoundaryCondition::Natural,
            MathError::DivisionByZero { value: 0.0 },
        );
        assert!(matches!(
            stalled,
            SplineError::BoundarySearchAborted {
                cause: MathError::DivisionByZero { .. },
                ..
            }
        ));

        let exhausted =
            search_failure(BoundaryCondition::Financial, MathError::convergence_failed(7, 0.5));
        assert!(matches!(
            exhausted,
            SplineError::BoundaryConditionFailed { iterations: 7, .. }
        ));
    }
}
