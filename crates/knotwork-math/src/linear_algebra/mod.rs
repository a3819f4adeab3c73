//! Linear algebra utilities.
//!
//! Segment calibration reduces to a small dense square system `A·c = b`.
//! This module solves it by direct inversion first, because the inverse
//! doubles as the coefficient sensitivity `∂c/∂b`, and falls back to
//! Gaussian elimination with partial pivoting when the inversion is rejected.

use crate::error::{MathError, MathResult};
use nalgebra::{DMatrix, DVector};

/// Pivots smaller than this fraction of the largest matrix entry are treated as zero.
pub const PIVOT_TOLERANCE: f64 = 1e-14;

/// Maximum entry of `A·A⁻¹ − I` tolerated before an inverse is rejected.
pub const INVERSE_RESIDUAL_TOLERANCE: f64 = 1e-8;

/// Which solver produced a [`SquareSolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMethod {
    /// LU-based direct inversion.
    DirectInversion,
    /// Gaussian elimination with partial pivoting.
    GaussianElimination,
}

/// Solution of a square linear system together with the inverse matrix.
#[derive(Debug, Clone)]
pub struct SquareSolution {
    /// The solution vector `x` of `A·x = b`.
    pub solution: DVector<f64>,
    /// The inverse `A⁻¹`, i.e. `∂x/∂b`.
    pub inverse: DMatrix<f64>,
    /// Solver that produced the result.
    pub method: SolveMethod,
}

fn ensure_square(matrix: &DMatrix<f64>) -> MathResult<usize> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(MathError::invalid_input(format!(
            "matrix must be square, got {}x{}",
            n,
            matrix.ncols()
        )));
    }
    if n == 0 {
        return Err(MathError::invalid_input("matrix must not be empty"));
    }
    Ok(n)
}

/// Inverts a square matrix.
///
/// The inverse is accepted only if it is finite and reproduces the identity
/// to within [`INVERSE_RESIDUAL_TOLERANCE`]; near-singular matrices whose
/// LU factorisation technically succeeds are therefore rejected too.
pub fn invert(matrix: &DMatrix<f64>) -> MathResult<DMatrix<f64>> {
    let n = ensure_square(matrix)?;

    let inverse = matrix.clone().try_inverse().ok_or(MathError::SingularMatrix)?;
    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(MathError::SingularMatrix);
    }

    let residual = (matrix * &inverse - DMatrix::<f64>::identity(n, n)).amax();
    if !residual.is_finite() || residual > INVERSE_RESIDUAL_TOLERANCE {
        return Err(MathError::SingularMatrix);
    }

    Ok(inverse)
}

/// Solves `A·X = B` for every column of `B` by Gaussian elimination with
/// partial pivoting.
pub fn gaussian_elimination(a: &DMatrix<f64>, b: &DMatrix<f64>) -> MathResult<DMatrix<f64>> {
    let n = ensure_square(a)?;
    if b.nrows() != n {
        return Err(MathError::DimensionMismatch {
            rows1: n,
            cols1: n,
            rows2: b.nrows(),
            cols2: b.ncols(),
        });
    }

    let scale = a.amax();
    if scale == 0.0 || !scale.is_finite() {
        return Err(MathError::SingularMatrix);
    }

    let mut u = a.clone();
    let mut rhs = b.clone();
    let m = rhs.ncols();

    // Forward elimination
    for k in 0..n {
        let mut pivot_row = k;
        for i in k + 1..n {
            if u[(i, k)].abs() > u[(pivot_row, k)].abs() {
                pivot_row = i;
            }
        }
        if u[(pivot_row, k)].abs() <= PIVOT_TOLERANCE * scale {
            return Err(MathError::SingularMatrix);
        }
        if pivot_row != k {
            u.swap_rows(pivot_row, k);
            rhs.swap_rows(pivot_row, k);
        }

        for i in k + 1..n {
            let factor = u[(i, k)] / u[(k, k)];
            if factor == 0.0 {
                continue;
            }
            for j in k..n {
                u[(i, j)] -= factor * u[(k, j)];
            }
            for j in 0..m {
                rhs[(i, j)] -= factor * rhs[(k, j)];
            }
        }
    }

    // Back substitution
    let mut x = DMatrix::zeros(n, m);
    for col in 0..m {
        for i in (0..n).rev() {
            let mut sum = rhs[(i, col)];
            for j in i + 1..n {
                sum -= u[(i, j)] * x[(j, col)];
            }
            x[(i, col)] = sum / u[(i, i)];
        }
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::non_finite("gaussian elimination"));
    }

    Ok(x)
}

/// Solves the square system `A·x = b`, returning the solution and `A⁻¹`.
///
/// Direct inversion is attempted first. If it is rejected the system is
/// retried once with Gaussian elimination on the augmented right-hand side
/// `[b | I]`, which yields both the solution and the inverse.
pub fn solve_square_system(a: &DMatrix<f64>, b: &DVector<f64>) -> MathResult<SquareSolution> {
    let n = ensure_square(a)?;
    if b.len() != n {
        return Err(MathError::DimensionMismatch {
            rows1: n,
            cols1: n,
            rows2: b.len(),
            cols2: 1,
        });
    }

    match invert(a) {
        Ok(inverse) => {
            let solution = &inverse * b;
            if solution.iter().all(|v| v.is_finite()) {
                return Ok(SquareSolution {
                    solution,
                    inverse,
                    method: SolveMethod::DirectInversion,
                });
            }
            log::warn!("direct inversion produced a non-finite solution, retrying elimination");
        }
        Err(e) => {
            log::warn!("direct inversion of {n}x{n} system rejected ({e}), retrying elimination");
        }
    }

    let mut augmented = DMatrix::zeros(n, n + 1);
    augmented.set_column(0, b);
    for i in 0..n {
        augmented[(i, i + 1)] = 1.0;
    }

    let x = gaussian_elimination(a, &augmented)?;
    let solution = x.column(0).into_owned();
    let inverse = x.columns(1, n).into_owned();

    Ok(SquareSolution {
        solution,
        inverse,
        method: SolveMethod::GaussianElimination,
    })
}
