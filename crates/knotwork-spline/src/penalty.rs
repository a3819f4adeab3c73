//! Curvature and best-fit penalizers.
//!
//! When a segment has fewer explicit constraints than coefficients, the
//! remaining rows of its linear system come from two competing preferences:
//!
//! - **Curvature**: `amplitude · ∫₀¹ Rᵢ⁽ⁿ⁾(t) Rᵣ⁽ⁿ⁾(t) dt`, integrated with a
//!   composite Boole's rule
//! - **Best fit**: `(1/N) · Σₖ wₖ Rᵢ(tₖ) Rᵣ(tₖ)` over weighted observations
//!
//! Row `r` of the padding is `Σᵢ (Cᵢᵣ + Fᵢᵣ) cᵢ = (1/N) · Σₖ wₖ Rᵣ(tₖ) yₖ`.

use knotwork_math::quadrature::BooleQuadrature;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::basis::ResponseBasis;
use crate::error::{SplineError, SplineResult};
use crate::segment::DesignControl;

/// Weighted observations a curve is pulled towards.
///
/// Weights are non-negative and normalized to sum to one at construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BestFitResponse {
    ordinates: Vec<f64>,
    responses: Vec<f64>,
    weights: Vec<f64>,
}

impl BestFitResponse {
    /// Creates a best-fit set. `weights = None` weighs every observation equally.
    pub fn new(
        ordinates: Vec<f64>,
        responses: Vec<f64>,
        weights: Option<Vec<f64>>,
    ) -> SplineResult<Self> {
        let weights = weights.unwrap_or_else(|| vec![1.0; ordinates.len()]);
        if ordinates.len() != responses.len() || ordinates.len() != weights.len() {
            return Err(SplineError::invalid_params(format!(
                "best fit needs equal lengths, got {} ordinates, {} responses, {} weights",
                ordinates.len(),
                responses.len(),
                weights.len()
            )));
        }
        if ordinates.iter().chain(&responses).chain(&weights).any(|v| !v.is_finite()) {
            return Err(SplineError::invalid_params("best fit values must be finite"));
        }
        if weights.iter().any(|&w| w < 0.0) {
            return Err(SplineError::invalid_params("best fit weights must be non-negative"));
        }
        if ordinates.is_empty() {
            return Ok(Self::empty());
        }

        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(SplineError::invalid_params("best fit weights sum to zero"));
        }

        Ok(Self {
            ordinates,
            responses,
            weights: weights.into_iter().map(|w| w / total).collect(),
        })
    }

    /// A set with no observations; contributes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.ordinates.len()
    }

    /// Returns true if there are no observations.
    pub fn is_empty(&self) -> bool {
        self.ordinates.is_empty()
    }

    /// Observation ordinates.
    pub fn ordinates(&self) -> &[f64] {
        &self.ordinates
    }

    /// Observed responses.
    pub fn responses(&self) -> &[f64] {
        &self.responses
    }

    /// Normalized weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Observations in `[left, right]` (or `(left, right]` when
    /// `include_left` is false), re-normalized.
    ///
    /// A subset whose weights sum to zero comes back empty.
    pub fn subset(&self, left: f64, right: f64, include_left: bool) -> Self {
        let mut ordinates = Vec::new();
        let mut responses = Vec::new();
        let mut weights = Vec::new();

        for ((&x, &y), &w) in self.ordinates.iter().zip(&self.responses).zip(&self.weights) {
            let inside = x <= right && (x > left || (include_left && x == left));
            if inside {
                ordinates.push(x);
                responses.push(y);
                weights.push(w);
            }
        }

        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Self::empty();
        }

        Self {
            ordinates,
            responses,
            weights: weights.into_iter().map(|w| w / total).collect(),
        }
    }
}

/// Computes penalty entries for one segment's response basis.
pub struct Penalizer<'a> {
    basis: &'a ResponseBasis,
    design: &'a DesignControl,
    quadrature: &'a BooleQuadrature,
    /// Best-fit observations in local coordinates: `(t, y, w)`.
    observations: Vec<(f64, f64, f64)>,
}

impl<'a> Penalizer<'a> {
    /// Creates a penalizer for a segment spanning `[left, right]`.
    ///
    /// Best-fit observations outside the segment are ignored.
    pub fn new(
        basis: &'a ResponseBasis,
        design: &'a DesignControl,
        quadrature: &'a BooleQuadrature,
        left: f64,
        right: f64,
        best_fit: Option<&BestFitResponse>,
    ) -> Self {
        let width = right - left;
        let observations = best_fit
            .map(|fit| {
                fit.ordinates()
                    .iter()
                    .zip(fit.responses())
                    .zip(fit.weights())
                    .filter(|((&x, _), _)| x >= left && x <= right)
                    .map(|((&x, &y), &w)| ((x - left) / width, y, w))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            basis,
            design,
            quadrature,
            observations,
        }
    }

    fn pair_roughness(&self, i: usize, r: usize, order: u32, amplitude: f64) -> SplineResult<f64> {
        if amplitude == 0.0 {
            return Ok(0.0);
        }
        let integral = self.quadrature.integrate_unit(|t| {
            self.basis.derivative(i, t, order) * self.basis.derivative(r, t, order)
        })?;
        Ok(amplitude * integral)
    }

    /// `amplitude · ∫₀¹ Rᵢ⁽ⁿ⁾ Rᵣ⁽ⁿ⁾ dt`, plus the length penalty if configured.
    pub fn basis_pair_curvature_penalty(&self, i: usize, r: usize) -> SplineResult<f64> {
        let curvature = self.design.curvature;
        let mut penalty =
            self.pair_roughness(i, r, curvature.derivative_order, curvature.amplitude)?;
        if let Some(length) = self.design.length {
            penalty += self.pair_roughness(i, r, length.derivative_order, length.amplitude)?;
        }
        Ok(penalty)
    }

    /// `(1/N) · Σₖ wₖ Rᵢ(tₖ) Rᵣ(tₖ)`; zero without observations.
    pub fn basis_pair_best_fit_penalty(&self, i: usize, r: usize) -> f64 {
        if self.observations.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .observations
            .iter()
            .map(|&(t, _, w)| {
                w * self.basis.derivative(i, t, 0) * self.basis.derivative(r, t, 0)
            })
            .sum();
        sum / self.observations.len() as f64
    }

    /// Matrix entry for padding row `r`, column `i`.
    pub fn basis_pair_constraint_coefficient(&self, i: usize, r: usize) -> SplineResult<f64> {
        Ok(self.basis_pair_curvature_penalty(i, r)? + self.basis_pair_best_fit_penalty(i, r))
    }

    /// Right-hand side for padding row `r`: `(1/N) · Σₖ wₖ Rᵣ(tₖ) yₖ`.
    pub fn basis_pair_penalty_constraint(&self, r: usize) -> f64 {
        if self.observations.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .observations
            .iter()
            .map(|&(t, y, w)| w * self.basis.derivative(r, t, 0) * y)
            .sum();
        sum / self.observations.len() as f64
    }

    /// Full `n × n` matrix of pair constraint coefficients.
    pub fn pair_matrix(&self) -> SplineResult<DMatrix<f64>> {
        let n = self.basis.len();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| (i..n).map(move |r| (i, r)))
            .collect();

        let values = self.pair_values(&pairs)?;

        let mut matrix = DMatrix::zeros(n, n);
        for (&(i, r), value) in pairs.iter().zip(values) {
            matrix[(i, r)] = value;
            matrix[(r, i)] = value;
        }
        Ok(matrix)
    }

    #[cfg(feature = "parallel")]
    fn pair_values(&self, pairs: &[(usize, usize)]) -> SplineResult<Vec<f64>> {
        use rayon::prelude::*;

        pairs
            .par_iter()
            .map(|&(i, r)| self.basis_pair_constraint_coefficient(i, r))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn pair_values(&self, pairs: &[(usize, usize)]) -> SplineResult<Vec<f64>> {
        pairs
            .iter()
            .map(|&(i, r)| self.basis_pair_constraint_coefficient(i, r))
            .collect()
    }

    /// Roughness of a response with the given coefficients:
    /// `amplitude · ∫₀¹ (f⁽ⁿ⁾(t))² dt` plus the length term.
    pub fn curvature_penalty(&self, coefficients: &[f64]) -> SplineResult<f64> {
        let roughness = |order: u32, amplitude: f64| -> SplineResult<f64> {
            if amplitude == 0.0 {
                return Ok(0.0);
            }
            let integral = self.quadrature.integrate_unit(|t| {
                let d: f64 = self
                    .basis
                    .derivatives(t, order)
                    .iter()
                    .zip(coefficients)
                    .map(|(r, c)| r * c)
                    .sum();
                d * d
            })?;
            Ok(amplitude * integral)
        };

        let curvature = self.design.curvature;
        let mut penalty = roughness(curvature.derivative_order, curvature.amplitude)?;
        if let Some(length) = self.design.length {
            penalty += roughness(length.derivative_order, length.amplitude)?;
        }
        Ok(penalty)
    }

    /// Weighted mean squared residual against the observations.
    pub fn best_fit_penalty(&self, coefficients: &[f64]) -> f64 {
        if self.observations.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .observations
            .iter()
            .map(|&(t, y, w)| {
                let f: f64 = self
                    .basis
                    .values(t)
                    .iter()
                    .zip(coefficients)
                    .map(|(r, c)| r * c)
                    .sum();
                w * (f - y) * (f - y)
            })
            .sum();
        sum / self.observations.len() as f64
    }
}
