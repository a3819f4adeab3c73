//! Dense Jacobians with accumulation and chaining.
//!
//! Sensitivities flow forward through a sequence in Wengert (forward-mode)
//! order: each segment's `∂c/∂q` is built from its own `∂c/∂b` and the
//! already-propagated sensitivities of the segments it depends on.

use nalgebra::{DMatrix, DVector};

use crate::error::{SplineError, SplineResult};

/// A dense `rows × cols` Jacobian `∂output/∂input`.
#[derive(Debug, Clone, PartialEq)]
pub struct WengertJacobian {
    matrix: DMatrix<f64>,
}

impl WengertJacobian {
    /// A zero Jacobian.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            matrix: DMatrix::zeros(rows, cols),
        }
    }

    /// Wraps an existing matrix.
    pub fn from_matrix(matrix: DMatrix<f64>) -> Self {
        Self { matrix }
    }

    /// A single-row Jacobian.
    pub fn from_row(row: &[f64]) -> Self {
        Self {
            matrix: DMatrix::from_row_slice(1, row.len(), row),
        }
    }

    /// Number of outputs.
    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of inputs.
    pub fn cols(&self) -> usize {
        self.matrix.ncols()
    }

    /// Entry `∂outputᵣ/∂inputc`.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.matrix.get((row, col)).copied()
    }

    /// Adds `value` to entry `(row, col)`.
    pub fn accumulate(&mut self, row: usize, col: usize, value: f64) -> SplineResult<()> {
        let (rows, cols) = self.matrix.shape();
        let entry = self.matrix.get_mut((row, col)).ok_or_else(|| {
            SplineError::invalid_params(format!(
                "entry ({row}, {col}) outside {rows}x{cols} jacobian"
            ))
        })?;
        *entry += value;
        Ok(())
    }

    /// Adds `scale · source` to row `row`.
    pub fn accumulate_row(&mut self, row: usize, source: &[f64], scale: f64) -> SplineResult<()> {
        if row >= self.rows() || source.len() != self.cols() {
            return Err(SplineError::invalid_params(format!(
                "cannot add a {}-wide row into row {row} of a {}x{} jacobian",
                source.len(),
                self.rows(),
                self.cols()
            )));
        }
        for (col, value) in source.iter().enumerate() {
            self.matrix[(row, col)] += scale * value;
        }
        Ok(())
    }

    /// Chain rule: `∂a/∂c = (∂a/∂b) · (∂b/∂c)` with `self = ∂a/∂b`.
    pub fn chain(&self, inner: &Self) -> SplineResult<Self> {
        if self.cols() != inner.rows() {
            return Err(SplineError::invalid_params(format!(
                "cannot chain {}x{} with {}x{}",
                self.rows(),
                self.cols(),
                inner.rows(),
                inner.cols()
            )));
        }
        Ok(Self::from_matrix(&self.matrix * &inner.matrix))
    }

    /// Left-multiplies by a row vector: `weightsᵀ · J`.
    pub fn weighted_row(&self, weights: &DVector<f64>) -> SplineResult<DVector<f64>> {
        if weights.len() != self.rows() {
            return Err(SplineError::invalid_params(format!(
                "{} weights for a {}-row jacobian",
                weights.len(),
                self.rows()
            )));
        }
        Ok(self.matrix.tr_mul(weights))
    }

    /// Row `row` as a vector.
    pub fn row(&self, row: usize) -> Vec<f64> {
        self.matrix.row(row).iter().copied().collect()
    }

    /// Underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Returns true if every entry is finite.
    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite())
    }
}
