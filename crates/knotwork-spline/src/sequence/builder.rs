//! Strategies that calibrate a chain of segments.

use tracing::{debug, warn};

use super::boundary::FloatingSlope;
use super::inputs::SequenceInputs;
use crate::error::{SplineError, SplineResult};
use crate::penalty::BestFitResponse;
use crate::segment::{CalibrationParams, ResponseValueConstraint, Segment};

/// Result of a chain calibration.
#[derive(Debug, Clone)]
pub struct CalibratedChain {
    /// Calibrated segments, left to right.
    pub segments: Vec<Segment>,
    /// Leading slope chosen by a boundary-condition search.
    pub leading_slope: Option<f64>,
    /// Boundary condition whose residual fixed the leading slope.
    pub floating: Option<FloatingSlope>,
}

/// Calibrates template segments against a set of sequence inputs.
pub trait SegmentSequenceBuilder {
    /// Builds a calibrated chain. `template` supplies geometry and controls.
    fn build(&self, template: &[Segment], inputs: &SequenceInputs)
        -> SplineResult<CalibratedChain>;
}

/// Left-to-right chain with `Ck` continuity at every interior knot.
///
/// The leading segment takes the leading response and `leading_derivs`;
/// every later segment takes the value and derivatives `1..=Ck` of its
/// predecessor at the shared knot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CkSequenceBuilder {
    leading_derivs: Vec<f64>,
}

impl CkSequenceBuilder {
    /// Creates a builder with the given leading-edge derivatives.
    pub fn new(leading_derivs: Vec<f64>) -> Self {
        Self { leading_derivs }
    }

    /// Leading-edge derivatives of orders `1..=n`.
    pub fn leading_derivs(&self) -> &[f64] {
        &self.leading_derivs
    }
}

impl SegmentSequenceBuilder for CkSequenceBuilder {
    fn build(
        &self,
        template: &[Segment],
        inputs: &SequenceInputs,
    ) -> SplineResult<CalibratedChain> {
        if template.is_empty() {
            return Err(SplineError::invalid_knots("sequence needs at least one segment"));
        }
        if inputs.constraints().len() != template.len() {
            return Err(SplineError::invalid_params(format!(
                "{} constraint groups for {} segments",
                inputs.constraints().len(),
                template.len()
            )));
        }

        let mut segments: Vec<Segment> = Vec::with_capacity(template.len());
        for (i, (segment, globals)) in template.iter().zip(inputs.constraints()).enumerate() {
            let best_fit = inputs
                .best_fit()
                .map(|fit| fit.subset(segment.left(), segment.right(), i == 0));
            let constraints = restrict_constraints(globals, segment.left(), &segments)?;

            let params = match segments.last() {
                None => {
                    let (points, responses) = match inputs.leading_response() {
                        Some(y) => (vec![segment.left()], vec![y]),
                        None => (Vec::new(), Vec::new()),
                    };
                    let params = CalibrationParams::new(
                        points,
                        responses,
                        self.leading_derivs.clone(),
                        Vec::new(),
                        constraints,
                    )?;
                    match best_fit {
                        Some(fit) => params.with_best_fit(fit),
                        None => params,
                    }
                }
                Some(previous) => chained_params(previous, segment, constraints, best_fit)?,
            };

            let calibrated = segment.calibrated(params).map_err(|e| {
                warn!(segment = i, error = %e, "chain calibration failed");
                e
            })?;
            segments.push(calibrated);
        }

        debug!(segments = segments.len(), "calibrated chain");
        Ok(CalibratedChain {
            segments,
            leading_slope: None,
            floating: None,
        })
    }
}

/// Parameters for `segment` chained onto its calibrated predecessor.
pub(crate) fn chained_params(
    previous: &Segment,
    segment: &Segment,
    constraints: Vec<ResponseValueConstraint>,
    best_fit: Option<BestFitResponse>,
) -> SplineResult<CalibrationParams> {
    let value = previous.response_value(previous.right())?;
    let derivs = previous.right_edge_derivatives(segment.ck())?;
    let params = CalibrationParams::new(
        vec![segment.left()],
        vec![value],
        derivs,
        Vec::new(),
        constraints,
    )?;
    Ok(match best_fit {
        Some(fit) => params.with_best_fit(fit),
        None => params,
    })
}

/// Moves the terms of each constraint left of `left` to its right-hand side,
/// evaluating them on the already-calibrated `earlier` segments.
pub(crate) fn restrict_constraints(
    globals: &[ResponseValueConstraint],
    left: f64,
    earlier: &[Segment],
) -> SplineResult<Vec<ResponseValueConstraint>> {
    globals
        .iter()
        .map(|constraint| {
            constraint.restrict_from(left, |x| {
                earlier
                    .iter()
                    .find(|s| s.contains(x))
                    .ok_or_else(|| SplineError::out_of_domain(x, left, left))?
                    .response_value(x)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentBuilderControl;
    use approx::assert_relative_eq;

    fn template(knots: &[f64], ck: u32) -> Vec<Segment> {
        knots
            .windows(2)
            .map(|w| Segment::new(w[0], w[1], SegmentBuilderControl::cubic_polynomial(ck)).unwrap())
            .collect()
    }

    #[test]
    fn test_chain_is_ck_continuous() {
        let knots = [0.0, 1.0, 2.5, 3.0];
        let inputs = SequenceInputs::knot_responses(&knots, &[1.0, 2.0, 0.5, 1.5]).unwrap();
        let chain = CkSequenceBuilder::new(vec![0.3, -0.2])
            .build(&template(&knots, 2), &inputs)
            .unwrap();

        for pair in chain.segments.windows(2) {
            let knot = pair[0].right();
            for order in 0..=2 {
                let left = if order == 0 {
                    pair[0].response_value(knot).unwrap()
                } else {
                    pair[0].derivative(knot, order).unwrap()
                };
                let right = if order == 0 {
                    pair[1].response_value(knot).unwrap()
                } else {
                    pair[1].derivative(knot, order).unwrap()
                };
                assert_relative_eq!(left, right, epsilon = 1e-9);
            }
        }
        assert_relative_eq!(chain.segments[0].derivative(0.0, 1).unwrap(), 0.3, epsilon = 1e-10);
        assert!(chain.leading_slope.is_none());
    }

    #[test]
    fn test_spanning_constraint_uses_earlier_segment() {
        let knots = [0.0, 1.0, 2.0];
        // f(0.5) + f(1.5) = 3 owned by the second segment
        let spanning = ResponseValueConstraint::new(vec![0.5, 1.5], vec![1.0, 1.0], 3.0).unwrap();
        let inputs = SequenceInputs::new(
            Some(0.0),
            vec![
                vec![ResponseValueConstraint::point(1.0, 1.0).unwrap()],
                vec![spanning, ResponseValueConstraint::point(2.0, 2.0).unwrap()],
            ],
        )
        .unwrap();

        let chain = CkSequenceBuilder::new(vec![1.0])
            .build(&template(&knots, 1), &inputs)
            .unwrap();
        let total = chain.segments[0].response_value(0.5).unwrap()
            + chain.segments[1].response_value(1.5).unwrap();
        assert_relative_eq!(total, 3.0, epsilon = 1e-10);
    }

    #[test]
    fn test_group_count_must_match() {
        let knots = [0.0, 1.0, 2.0];
        let inputs = SequenceInputs::knot_responses(&[0.0, 1.0], &[0.0, 1.0]).unwrap();
        assert!(CkSequenceBuilder::default()
            .build(&template(&knots, 1), &inputs)
            .is_err());
    }
}
