//! Response inputs for a sequence calibration.

use serde::{Deserialize, Serialize};

use crate::error::{SplineError, SplineResult};
use crate::penalty::BestFitResponse;
use crate::segment::ResponseValueConstraint;

/// Everything a sequence is calibrated to.
///
/// Constraints are held in global form, grouped by the segment that owns
/// them: the segment containing the constraint's last ordinate. Ordinates in
/// earlier segments are moved to the right-hand side once those segments are
/// calibrated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SequenceInputs {
    leading_response: Option<f64>,
    constraints: Vec<Vec<ResponseValueConstraint>>,
    best_fit: Option<BestFitResponse>,
}

impl SequenceInputs {
    /// Creates inputs from an optional leading response and per-segment constraints.
    pub fn new(
        leading_response: Option<f64>,
        constraints: Vec<Vec<ResponseValueConstraint>>,
    ) -> SplineResult<Self> {
        if leading_response.is_some_and(|y| !y.is_finite()) {
            return Err(SplineError::invalid_params("leading response must be finite"));
        }
        Ok(Self {
            leading_response,
            constraints,
            best_fit: None,
        })
    }

    /// Interpolation inputs: one response per knot.
    pub fn knot_responses(knots: &[f64], responses: &[f64]) -> SplineResult<Self> {
        if knots.len() != responses.len() {
            return Err(SplineError::invalid_params(format!(
                "{} knots but {} responses",
                knots.len(),
                responses.len()
            )));
        }
        let Some((&leading, rest)) = responses.split_first() else {
            return Err(SplineError::invalid_params("no knot responses"));
        };

        let constraints = knots[1..]
            .iter()
            .zip(rest)
            .map(|(&x, &y)| ResponseValueConstraint::point(x, y).map(|c| vec![c]))
            .collect::<SplineResult<Vec<_>>>()?;

        Self::new(Some(leading), constraints)
    }

    /// Groups free-standing constraints by the segment holding their last ordinate.
    pub fn from_constraints(
        knots: &[f64],
        leading_response: Option<f64>,
        constraints: Vec<ResponseValueConstraint>,
    ) -> SplineResult<Self> {
        let (Some(&first), Some(&last)) = (knots.first(), knots.last()) else {
            return Err(SplineError::invalid_knots("no knots"));
        };
        let segments = knots.len().saturating_sub(1);

        let mut grouped = vec![Vec::new(); segments];
        for constraint in constraints {
            let lo = constraint.first_ordinate();
            let hi = constraint.last_ordinate();
            if lo < first || hi > last {
                let x = if lo < first { lo } else { hi };
                return Err(SplineError::out_of_domain(x, first, last));
            }
            let owner = knots[1..]
                .iter()
                .position(|&k| hi <= k)
                .ok_or_else(|| SplineError::out_of_domain(hi, first, last))?;
            if let Some(group) = grouped.get_mut(owner) {
                group.push(constraint);
            }
        }

        Self::new(leading_response, grouped)
    }

    /// Attaches a global best-fit set.
    #[must_use]
    pub fn with_best_fit(mut self, best_fit: BestFitResponse) -> Self {
        self.best_fit = if best_fit.is_empty() {
            None
        } else {
            Some(best_fit)
        };
        self
    }

    /// Response at the leading knot, if pinned.
    pub fn leading_response(&self) -> Option<f64> {
        self.leading_response
    }

    /// Constraints owned by each segment.
    pub fn constraints(&self) -> &[Vec<ResponseValueConstraint>] {
        &self.constraints
    }

    /// Global best-fit set.
    pub fn best_fit(&self) -> Option<&BestFitResponse> {
        self.best_fit.as_ref()
    }

    /// The response inputs `q` in sensitivity order: leading response, then
    /// each constraint value segment by segment.
    pub fn response_inputs(&self) -> Vec<f64> {
        self.leading_response
            .into_iter()
            .chain(self.constraints.iter().flatten().map(ResponseValueConstraint::value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knot_responses() {
        let inputs = SequenceInputs::knot_responses(&[0.0, 1.0, 2.0], &[0.0, 1.0, 0.0]).unwrap();
        assert_eq!(inputs.leading_response(), Some(0.0));
        assert_eq!(inputs.constraints().len(), 2);
        assert_eq!(inputs.constraints()[1][0].as_point(), Some(2.0));
        assert_eq!(inputs.response_inputs(), vec![0.0, 1.0, 0.0]);

        assert!(SequenceInputs::knot_responses(&[0.0, 1.0], &[0.0]).is_err());
    }

    #[test]
    fn test_constraints_grouped_by_last_ordinate() {
        let knots = [0.0, 1.0, 2.0, 3.0];
        let spanning = ResponseValueConstraint::new(vec![0.5, 1.5], vec![0.5, 0.5], 2.0).unwrap();
        let at_knot = ResponseValueConstraint::point(1.0, 1.0).unwrap();
        let last = ResponseValueConstraint::point(3.0, 4.0).unwrap();

        let inputs =
            SequenceInputs::from_constraints(&knots, None, vec![spanning, at_knot, last]).unwrap();
        let sizes: Vec<_> = inputs.constraints().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![1, 1, 1]);
        assert_eq!(inputs.constraints()[0][0].as_point(), Some(1.0));

        let outside = ResponseValueConstraint::point(3.5, 1.0).unwrap();
        let err = SequenceInputs::from_constraints(&knots, None, vec![outside]).unwrap_err();
        assert!(err.is_out_of_domain());
    }
}
