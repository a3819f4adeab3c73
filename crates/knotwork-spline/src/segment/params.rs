//! Calibration inputs for a single segment.

use serde::{Deserialize, Serialize};

use super::constraint::{KnotPosition, ResponseValueConstraint};
use crate::error::{SplineError, SplineResult};
use crate::penalty::BestFitResponse;

/// Inputs for one segment calibration.
///
/// The explicit rows of the segment's system come, in order, from the point
/// responses, the linear constraints, the left-edge derivatives (orders
/// `1..=n` at the left edge) and the right-edge derivatives. The best-fit
/// set only feeds the penalty rows that pad an under-determined system.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationParams {
    predictor_ordinates: Vec<f64>,
    responses: Vec<f64>,
    left_derivs: Vec<f64>,
    right_derivs: Vec<f64>,
    constraints: Vec<ResponseValueConstraint>,
    best_fit: Option<BestFitResponse>,
}

impl CalibrationParams {
    /// Creates calibration parameters, validating lengths and finiteness.
    pub fn new(
        predictor_ordinates: Vec<f64>,
        responses: Vec<f64>,
        left_derivs: Vec<f64>,
        right_derivs: Vec<f64>,
        constraints: Vec<ResponseValueConstraint>,
    ) -> SplineResult<Self> {
        if predictor_ordinates.len() != responses.len() {
            return Err(SplineError::invalid_params(format!(
                "{} predictor ordinates but {} responses",
                predictor_ordinates.len(),
                responses.len()
            )));
        }
        if predictor_ordinates
            .iter()
            .chain(&responses)
            .chain(&left_derivs)
            .chain(&right_derivs)
            .any(|v| !v.is_finite())
        {
            return Err(SplineError::invalid_params(
                "ordinates, responses and edge derivatives must be finite",
            ));
        }

        Ok(Self {
            predictor_ordinates,
            responses,
            left_derivs,
            right_derivs,
            constraints,
            best_fit: None,
        })
    }

    /// Point responses only.
    pub fn points(predictor_ordinates: Vec<f64>, responses: Vec<f64>) -> SplineResult<Self> {
        Self::new(predictor_ordinates, responses, Vec::new(), Vec::new(), Vec::new())
    }

    /// Attaches a best-fit set.
    #[must_use]
    pub fn with_best_fit(mut self, best_fit: BestFitResponse) -> Self {
        self.best_fit = if best_fit.is_empty() {
            None
        } else {
            Some(best_fit)
        };
        self
    }

    /// Replaces the left-edge derivatives.
    pub fn with_left_derivs(mut self, left_derivs: Vec<f64>) -> SplineResult<Self> {
        if left_derivs.iter().any(|v| !v.is_finite()) {
            return Err(SplineError::invalid_params("left derivatives must be finite"));
        }
        self.left_derivs = left_derivs;
        Ok(self)
    }

    /// Replaces the right-edge derivatives.
    pub fn with_right_derivs(mut self, right_derivs: Vec<f64>) -> SplineResult<Self> {
        if right_derivs.iter().any(|v| !v.is_finite()) {
            return Err(SplineError::invalid_params("right derivatives must be finite"));
        }
        self.right_derivs = right_derivs;
        Ok(self)
    }

    /// Predictor ordinates of the point responses.
    pub fn predictor_ordinates(&self) -> &[f64] {
        &self.predictor_ordinates
    }

    /// Point responses.
    pub fn responses(&self) -> &[f64] {
        &self.responses
    }

    /// Left-edge derivatives of orders `1..=n`.
    pub fn left_derivs(&self) -> &[f64] {
        &self.left_derivs
    }

    /// Right-edge derivatives of orders `1..=n`.
    pub fn right_derivs(&self) -> &[f64] {
        &self.right_derivs
    }

    /// Linear response constraints.
    pub fn constraints(&self) -> &[ResponseValueConstraint] {
        &self.constraints
    }

    /// Best-fit observations, if any.
    pub fn best_fit(&self) -> Option<&BestFitResponse> {
        self.best_fit.as_ref()
    }

    /// Number of explicit rows these parameters contribute.
    pub fn explicit_count(&self) -> usize {
        self.predictor_ordinates.len()
            + self.constraints.len()
            + self.left_derivs.len()
            + self.right_derivs.len()
    }

    /// Splits the parameters around a new knot at `p` with response `y`.
    ///
    /// Points strictly left of `p` and `(p, y)` go left; `(p, y)` and points
    /// strictly right go right. Left derivatives stay with the left half and
    /// right derivatives with the right. A constraint straddling `p` cannot be
    /// assigned to either half and fails with
    /// [`SplineError::ConstraintSplitsKnot`].
    pub fn split_at(&self, p: f64, y: f64) -> SplineResult<(Self, Self)> {
        if !p.is_finite() || !y.is_finite() {
            return Err(SplineError::invalid_params("split knot and response must be finite"));
        }

        let mut left = Self {
            left_derivs: self.left_derivs.clone(),
            ..Self::default()
        };
        let mut right = Self {
            right_derivs: self.right_derivs.clone(),
            ..Self::default()
        };

        for (&x, &r) in self.predictor_ordinates.iter().zip(&self.responses) {
            if x < p {
                left.predictor_ordinates.push(x);
                left.responses.push(r);
            }
        }
        left.predictor_ordinates.push(p);
        left.responses.push(y);

        right.predictor_ordinates.push(p);
        right.responses.push(y);
        for (&x, &r) in self.predictor_ordinates.iter().zip(&self.responses) {
            if x > p {
                right.predictor_ordinates.push(x);
                right.responses.push(r);
            }
        }

        for constraint in &self.constraints {
            match constraint.knot_position(p) {
                KnotPosition::LeftOf => left.constraints.push(constraint.clone()),
                KnotPosition::RightOf => right.constraints.push(constraint.clone()),
                KnotPosition::Splits => {
                    return Err(SplineError::ConstraintSplitsKnot {
                        knot: p,
                        first: constraint.first_ordinate(),
                        last: constraint.last_ordinate(),
                    })
                }
            }
        }

        if let Some(fit) = &self.best_fit {
            let lower = fit.ordinates().iter().copied().fold(f64::INFINITY, f64::min);
            let upper = fit.ordinates().iter().copied().fold(f64::NEG_INFINITY, f64::max);
            left = left.with_best_fit(fit.subset(lower, p, true));
            right = right.with_best_fit(fit.subset(p, upper, false));
        }

        Ok((left, right))
    }
}
