//! Segments: one knot-to-knot piece of a spline.
//!
//! A segment owns its response basis, design and, once calibrated, its
//! coefficients together with the inverse of the calibration matrix. The
//! inverse is the sensitivity `∂c/∂b` of the coefficients to the right-hand
//! side of the system, i.e. to the segment's edge inputs.
//!
//! # Calibration
//!
//! The square system `A·c = b` is assembled row by row:
//!
//! 1. point responses `Σᵢ cᵢ Rᵢ(tₖ) = yₖ`
//! 2. localized linear constraints
//! 3. left-edge derivatives of orders `1..=n`
//! 4. right-edge derivatives of orders `1..=n`
//! 5. penalty rows padding the system up to the number of basis functions
//!
//! More explicit rows than basis functions is an error; inputs are never
//! truncated.

mod constraint;
mod design;
mod monotonicity;
mod params;

pub use constraint::{KnotPosition, ResponseBasisConstraint, ResponseValueConstraint};
pub use design::{DesignControl, PenaltyControl, SegmentBuilderControl};
pub use monotonicity::Monotonicity;
pub use params::CalibrationParams;

use knotwork_math::linear_algebra::{solve_square_system, SolveMethod};
use knotwork_math::quadrature::BooleQuadrature;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::basis::ResponseBasis;
use crate::config::Validate;
use crate::error::{SplineError, SplineResult};
use crate::penalty::{BestFitResponse, Penalizer};

/// Response value plus derivatives of orders `1..=n` at one ordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDerivatives {
    /// Response value.
    pub value: f64,
    /// Derivatives of orders `1..=n`.
    pub derivatives: Vec<f64>,
}

#[derive(Debug, Clone)]
struct Calibration {
    coefficients: DVector<f64>,
    params: CalibrationParams,
    /// `A⁻¹`, the coefficient sensitivity to the right-hand side.
    inverse: DMatrix<f64>,
    method: SolveMethod,
}

/// One piece of a spline on `[left, right]`.
#[derive(Debug, Clone)]
pub struct Segment {
    left: f64,
    right: f64,
    control: SegmentBuilderControl,
    basis: ResponseBasis,
    quadrature: BooleQuadrature,
    calibration: Option<Calibration>,
}

impl Segment {
    /// Creates an uncalibrated segment.
    pub fn new(left: f64, right: f64, control: SegmentBuilderControl) -> SplineResult<Self> {
        if !left.is_finite() || !right.is_finite() || left >= right {
            return Err(SplineError::invalid_knots(format!(
                "segment needs finite left < right, got [{left}, {right}]"
            )));
        }

        let errors = control.validate();
        if !errors.is_empty() {
            let reason = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SplineError::invalid_design(reason));
        }

        Ok(Self {
            left,
            right,
            basis: ResponseBasis::new(control.basis, control.shape)?,
            control,
            quadrature: BooleQuadrature::default(),
            calibration: None,
        })
    }

    /// Uses a quadrature rule with the given number of panels.
    pub fn with_quadrature_panels(mut self, panels: usize) -> SplineResult<Self> {
        self.quadrature = BooleQuadrature::new(panels)?;
        Ok(self)
    }

    /// Left edge.
    pub fn left(&self) -> f64 {
        self.left
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.right
    }

    /// Width `right − left`.
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Builder control the segment was created with.
    pub fn control(&self) -> &SegmentBuilderControl {
        &self.control
    }

    /// Continuity order.
    pub fn ck(&self) -> u32 {
        self.control.design.ck
    }

    /// Response basis.
    pub fn basis(&self) -> &ResponseBasis {
        &self.basis
    }

    /// Number of basis functions.
    pub fn num_basis(&self) -> usize {
        self.basis.len()
    }

    /// Returns true once the segment holds coefficients.
    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_some()
    }

    /// Returns true if `left ≤ x ≤ right`.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.left && x <= self.right
    }

    fn calibrated_state(&self) -> SplineResult<&Calibration> {
        self.calibration.as_ref().ok_or(SplineError::NotCalibrated {
            left: self.left,
            right: self.right,
        })
    }

    /// Calibrated coefficients.
    pub fn coefficients(&self) -> SplineResult<&DVector<f64>> {
        Ok(&self.calibrated_state()?.coefficients)
    }

    /// Parameters of the last successful calibration.
    pub fn params(&self) -> SplineResult<&CalibrationParams> {
        Ok(&self.calibrated_state()?.params)
    }

    /// Solver used by the last successful calibration.
    pub fn solve_method(&self) -> SplineResult<SolveMethod> {
        Ok(self.calibrated_state()?.method)
    }

    fn local(&self, x: f64) -> SplineResult<f64> {
        if !self.contains(x) {
            return Err(SplineError::out_of_domain(x, self.left, self.right));
        }
        Ok((x - self.left) / self.width())
    }

    fn derivative_rows(&self, t: f64, order: u32) -> Vec<f64> {
        let scale = self.width().powi(order as i32);
        self.basis
            .derivatives(t, order)
            .into_iter()
            .map(|v| v / scale)
            .collect()
    }

    /// Calibrates the segment in place.
    ///
    /// On failure the segment keeps its previous coefficients and caches.
    pub fn calibrate(&mut self, params: CalibrationParams) -> SplineResult<()> {
        let calibration = self.solve(params)?;
        self.calibration = Some(calibration);
        Ok(())
    }

    /// Returns a calibrated copy, leaving `self` untouched.
    pub fn calibrated(&self, params: CalibrationParams) -> SplineResult<Self> {
        let mut segment = self.clone();
        segment.calibrate(params)?;
        Ok(segment)
    }

    fn solve(&self, params: CalibrationParams) -> SplineResult<Calibration> {
        let n = self.basis.len();
        let explicit = params.explicit_count();
        if explicit > n {
            return Err(SplineError::ConstraintCountMismatch {
                constraints: explicit,
                basis: n,
            });
        }

        let mut a = DMatrix::zeros(n, n);
        let mut b = DVector::zeros(n);
        let mut row = 0;

        for (&x, &y) in params.predictor_ordinates().iter().zip(params.responses()) {
            let t = self.local(x).map_err(|_| {
                SplineError::invalid_params(format!(
                    "predictor ordinate {x} outside segment [{}, {}]",
                    self.left, self.right
                ))
            })?;
            for (i, v) in self.basis.values(t).into_iter().enumerate() {
                a[(row, i)] = v;
            }
            b[row] = y;
            row += 1;
        }

        for constraint in params.constraints() {
            let local = constraint.localize(self.left, self.right, &self.basis)?;
            for (i, &v) in local.basis_weights().iter().enumerate() {
                a[(row, i)] = v;
            }
            b[row] = local.value();
            row += 1;
        }

        for (edge, derivs) in [(0.0, params.left_derivs()), (1.0, params.right_derivs())] {
            for (k, &d) in derivs.iter().enumerate() {
                for (i, v) in self.derivative_rows(edge, k as u32 + 1).into_iter().enumerate() {
                    a[(row, i)] = v;
                }
                b[row] = d;
                row += 1;
            }
        }

        if row < n {
            let penalizer = Penalizer::new(
                &self.basis,
                &self.control.design,
                &self.quadrature,
                self.left,
                self.right,
                params.best_fit(),
            );
            let pairs = penalizer.pair_matrix()?;
            for l in row..n {
                for i in 0..n {
                    a[(l, i)] = pairs[(i, l)];
                }
                b[l] = penalizer.basis_pair_penalty_constraint(l);
            }
        }

        let solution = solve_square_system(&a, &b).map_err(|e| {
            warn!(left = self.left, right = self.right, error = %e, "segment calibration failed");
            SplineError::SingularSystem {
                left: self.left,
                right: self.right,
            }
        })?;

        if let Some(index) = solution.solution.iter().position(|c| !c.is_finite()) {
            return Err(SplineError::NonFiniteCoefficient {
                index,
                left: self.left,
                right: self.right,
            });
        }

        debug!(
            left = self.left,
            right = self.right,
            explicit,
            padding = n - explicit,
            method = ?solution.method,
            "calibrated segment"
        );

        Ok(Calibration {
            coefficients: solution.solution,
            params,
            inverse: solution.inverse,
            method: solution.method,
        })
    }

    fn dot(&self, row: &[f64]) -> SplineResult<f64> {
        let coefficients = &self.calibrated_state()?.coefficients;
        Ok(row.iter().zip(coefficients.iter()).map(|(r, c)| r * c).sum())
    }

    /// Response at `x`.
    pub fn response_value(&self, x: f64) -> SplineResult<f64> {
        let t = self.local(x)?;
        self.dot(&self.basis.values(t))
    }

    /// Derivative of `order` at `x`, in global ordinates.
    pub fn derivative(&self, x: f64, order: u32) -> SplineResult<f64> {
        let t = self.local(x)?;
        self.dot(&self.derivative_rows(t, order))
    }

    /// Value plus derivatives `1..=Ck` at `x`.
    pub fn calc_sprd(&self, x: f64) -> SplineResult<ResponseDerivatives> {
        let value = self.response_value(x)?;
        let derivatives = (1..=self.ck())
            .map(|order| self.derivative(x, order))
            .collect::<SplineResult<Vec<_>>>()?;
        Ok(ResponseDerivatives { value, derivatives })
    }

    /// Derivatives of orders `1..=n` at the left edge.
    pub fn left_edge_derivatives(&self, n: u32) -> SplineResult<Vec<f64>> {
        (1..=n).map(|order| self.derivative(self.left, order)).collect()
    }

    /// Derivatives of orders `1..=n` at the right edge.
    pub fn right_edge_derivatives(&self, n: u32) -> SplineResult<Vec<f64>> {
        (1..=n).map(|order| self.derivative(self.right, order)).collect()
    }

    /// Integral of the response over `[a, b] ⊆ [left, right]`.
    pub fn integrate(&self, a: f64, b: f64) -> SplineResult<f64> {
        let ta = self.local(a)?;
        let tb = self.local(b)?;
        let integrals = self.basis.integrals(ta, tb, &self.quadrature)?;
        Ok(self.width() * self.dot(&integrals)?)
    }

    /// `∂f(x)/∂c`: the response basis values at `x`.
    pub fn jack_d_response_d_coefficients(&self, x: f64) -> SplineResult<DVector<f64>> {
        let t = self.local(x)?;
        Ok(DVector::from_vec(self.basis.values(t)))
    }

    /// `∂f⁽ᵏ⁾(x)/∂c`: the response basis derivatives of `order` at `x`.
    pub fn jack_d_derivative_d_coefficients(
        &self,
        x: f64,
        order: u32,
    ) -> SplineResult<DVector<f64>> {
        let t = self.local(x)?;
        Ok(DVector::from_vec(self.derivative_rows(t, order)))
    }

    /// `∂c/∂b`, the cached inverse of the calibration matrix.
    ///
    /// Columns follow the row order of the calibration system.
    pub fn jack_d_coefficients_d_edge_inputs(&self) -> SplineResult<&DMatrix<f64>> {
        Ok(&self.calibrated_state()?.inverse)
    }

    /// `∂f(x)/∂b = R(x)ᵀ · ∂c/∂b`, one entry per calibration row.
    pub fn jack_d_response_d_edge_inputs(&self, x: f64) -> SplineResult<DVector<f64>> {
        let values = self.jack_d_response_d_coefficients(x)?;
        Ok(self.jack_d_coefficients_d_edge_inputs()?.tr_mul(&values))
    }

    /// Rows of the calibration system carrying the responses at the left and
    /// right edges, if the last calibration had them.
    pub fn edge_response_rows(&self) -> SplineResult<(Option<usize>, Option<usize>)> {
        let params = self.params()?;
        let points = params.predictor_ordinates();

        let left = points.iter().position(|&x| x == self.left);
        let right = points.iter().position(|&x| x == self.right).or_else(|| {
            params
                .constraints()
                .iter()
                .position(|c| c.as_point() == Some(self.right))
                .map(|k| points.len() + k)
        });

        Ok((left, right))
    }

    /// Penalizer over this segment's basis and design.
    pub fn penalizer<'a>(&'a self, best_fit: Option<&BestFitResponse>) -> Penalizer<'a> {
        Penalizer::new(
            &self.basis,
            &self.control.design,
            &self.quadrature,
            self.left,
            self.right,
            best_fit,
        )
    }

    /// Roughness of the calibrated response.
    pub fn curvature_penalty(&self) -> SplineResult<f64> {
        let coefficients = self.coefficients()?;
        self.penalizer(None).curvature_penalty(coefficients.as_slice())
    }

    /// Weighted mean squared residual of the observations inside the segment.
    pub fn best_fit_penalty(&self, best_fit: &BestFitResponse) -> SplineResult<f64> {
        let coefficients = self.coefficients()?;
        Ok(self
            .penalizer(Some(best_fit))
            .best_fit_penalty(coefficients.as_slice()))
    }

    /// Classifies the calibrated response's monotonicity.
    pub fn monotone_type(&self, scan_intervals: usize) -> SplineResult<Monotonicity> {
        let coefficients = self.coefficients()?;
        let along = |order: u32| {
            move |t: f64| -> f64 {
                self.basis
                    .derivatives(t, order)
                    .iter()
                    .zip(coefficients.iter())
                    .map(|(r, c)| r * c)
                    .sum()
            }
        };
        monotonicity::classify(along(1), along(2), scan_intervals)
    }

    /// Calibrates a copy of this segment restricted to `[left, right]`.
    ///
    /// Rows that `params` leaves free are not padded with penalties. They are
    /// filled with this segment's own derivatives at `right`, continuing the
    /// orders `params` already fixes there, so the copy reproduces this
    /// segment wherever its explicit inputs agree with it.
    pub fn restricted(
        &self,
        left: f64,
        right: f64,
        params: CalibrationParams,
    ) -> SplineResult<Self> {
        if !(left < right) || !self.contains(left) || !self.contains(right) {
            return Err(SplineError::invalid_knots(format!(
                "[{left}, {right}] is not a sub-interval of [{}, {}]",
                self.left, self.right
            )));
        }

        let free = self.num_basis().saturating_sub(params.explicit_count());
        let params = if free == 0 {
            params
        } else {
            let mut derivs = params.right_derivs().to_vec();
            let from = derivs.len() as u32 + 1;
            for order in from..from + free as u32 {
                derivs.push(self.derivative(right, order)?);
            }
            params.with_right_derivs(derivs)?
        };

        Self {
            left,
            right,
            calibration: None,
            ..self.clone()
        }
        .calibrated(params)
    }

    /// Splits the calibrated segment at an interior ordinate `p` with response `y`.
    ///
    /// The left half is calibrated from the left part of the stored
    /// parameters. The right half gets the right part plus the left half's
    /// derivatives `1..=Ck` at `p`, so the two halves join with the segment's
    /// own continuity. Both halves are [`restricted`](Self::restricted)
    /// copies, so splitting at `y = f(p)` reproduces the segment.
    pub fn split_at(&self, p: f64, y: f64) -> SplineResult<(Self, Self)> {
        let params = self.params()?;
        if p == self.left || p == self.right {
            return Err(SplineError::KnotExists { x: p });
        }
        if !self.contains(p) {
            return Err(SplineError::out_of_domain(p, self.left, self.right));
        }

        let (left_params, right_params) = params.split_at(p, y)?;
        let left = self.restricted(self.left, p, left_params)?;
        let edge = left.right_edge_derivatives(self.ck())?;
        let right = self.restricted(p, self.right, right_params.with_left_derivs(edge)?)?;

        Ok((left, right))
    }
}
