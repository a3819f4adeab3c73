//! Linear response constraints.

use serde::{Deserialize, Serialize};

use crate::basis::ResponseBasis;
use crate::error::{SplineError, SplineResult};

/// Position of a constraint relative to a knot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnotPosition {
    /// Every ordinate is at or left of the knot.
    LeftOf,
    /// Every ordinate is at or right of the knot, at least one strictly.
    RightOf,
    /// Ordinates lie strictly on both sides.
    Splits,
}

/// A linear constraint `Σⱼ wⱼ · f(xⱼ) = value` on the curve's response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseValueConstraint {
    predictor_ordinates: Vec<f64>,
    response_weights: Vec<f64>,
    value: f64,
}

impl ResponseValueConstraint {
    /// Creates a constraint, validating lengths and finiteness.
    pub fn new(
        predictor_ordinates: Vec<f64>,
        response_weights: Vec<f64>,
        value: f64,
    ) -> SplineResult<Self> {
        if predictor_ordinates.is_empty() {
            return Err(SplineError::invalid_params(
                "constraint needs at least one ordinate",
            ));
        }
        if predictor_ordinates.len() != response_weights.len() {
            return Err(SplineError::invalid_params(format!(
                "constraint has {} ordinates but {} weights",
                predictor_ordinates.len(),
                response_weights.len()
            )));
        }
        if predictor_ordinates
            .iter()
            .chain(&response_weights)
            .chain(std::iter::once(&value))
            .any(|v| !v.is_finite())
        {
            return Err(SplineError::invalid_params(
                "constraint ordinates, weights and value must be finite",
            ));
        }

        Ok(Self {
            predictor_ordinates,
            response_weights,
            value,
        })
    }

    /// A point constraint `f(x) = y`.
    pub fn point(x: f64, y: f64) -> SplineResult<Self> {
        Self::new(vec![x], vec![1.0], y)
    }

    /// Returns the ordinates.
    pub fn predictor_ordinates(&self) -> &[f64] {
        &self.predictor_ordinates
    }

    /// Returns the weights.
    pub fn response_weights(&self) -> &[f64] {
        &self.response_weights
    }

    /// Returns the constraint value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Smallest ordinate.
    pub fn first_ordinate(&self) -> f64 {
        self.predictor_ordinates
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }

    /// Largest ordinate.
    pub fn last_ordinate(&self) -> f64 {
        self.predictor_ordinates
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Returns `Some(x)` if this is a unit-weight point constraint at `x`.
    pub fn as_point(&self) -> Option<f64> {
        match (self.predictor_ordinates.as_slice(), self.response_weights.as_slice()) {
            ([x], [w]) if *w == 1.0 => Some(*x),
            _ => None,
        }
    }

    /// Classifies the constraint against a knot at `p`.
    pub fn knot_position(&self, p: f64) -> KnotPosition {
        if self.last_ordinate() <= p {
            KnotPosition::LeftOf
        } else if self.first_ordinate() >= p {
            KnotPosition::RightOf
        } else {
            KnotPosition::Splits
        }
    }

    /// Restricts the constraint to ordinates at or right of `left`.
    ///
    /// Terms for ordinates left of `left` are moved to the right-hand side
    /// using `earlier`, the already-calibrated response there.
    pub fn restrict_from<F>(&self, left: f64, earlier: F) -> SplineResult<Self>
    where
        F: Fn(f64) -> SplineResult<f64>,
    {
        let mut ordinates = Vec::with_capacity(self.predictor_ordinates.len());
        let mut weights = Vec::with_capacity(self.predictor_ordinates.len());
        let mut value = self.value;

        for (&x, &w) in self.predictor_ordinates.iter().zip(&self.response_weights) {
            if x < left {
                value -= w * earlier(x)?;
            } else {
                ordinates.push(x);
                weights.push(w);
            }
        }

        if ordinates.is_empty() {
            return Err(SplineError::invalid_params(format!(
                "constraint has no ordinate at or beyond {left}"
            )));
        }

        Self::new(ordinates, weights, value)
    }

    /// Translates the constraint into per-coefficient weights for a segment.
    ///
    /// Every ordinate must lie in `[left, right]`.
    pub fn localize(
        &self,
        left: f64,
        right: f64,
        basis: &ResponseBasis,
    ) -> SplineResult<ResponseBasisConstraint> {
        let width = right - left;
        let mut basis_weights = vec![0.0; basis.len()];

        for (&x, &w) in self.predictor_ordinates.iter().zip(&self.response_weights) {
            if x < left || x > right {
                return Err(SplineError::invalid_params(format!(
                    "constraint ordinate {x} outside segment [{left}, {right}]"
                )));
            }
            let t = (x - left) / width;
            for (acc, r) in basis_weights.iter_mut().zip(basis.values(t)) {
                *acc += w * r;
            }
        }

        Ok(ResponseBasisConstraint {
            basis_weights,
            value: self.value,
        })
    }
}

/// A constraint in one segment's local form: `Σᵢ aᵢ cᵢ = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBasisConstraint {
    basis_weights: Vec<f64>,
    value: f64,
}

impl ResponseBasisConstraint {
    /// Creates a localized constraint.
    pub fn new(basis_weights: Vec<f64>, value: f64) -> Self {
        Self {
            basis_weights,
            value,
        }
    }

    /// Weight on each basis coefficient.
    pub fn basis_weights(&self) -> &[f64] {
        &self.basis_weights
    }

    /// Constraint value.
    pub fn value(&self) -> f64 {
        self.value
    }
}
