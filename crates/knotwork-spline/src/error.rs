//! Error types for spline construction, calibration, queries and modification.
//!
//! The variants group into four families:
//!
//! - **Construction**: malformed inputs rejected before an object exists
//! - **Calibration**: the linear system or the boundary search failed
//! - **Query**: an ordinate outside the calibrated domain
//! - **Modification**: a knot insertion, clip or append that would leave an
//!   inconsistent sequence

use knotwork_math::MathError;
use thiserror::Error;

/// A specialized Result type for spline operations.
pub type SplineResult<T> = Result<T, SplineError>;

/// Error types for spline operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplineError {
    /// Calibration parameters or constraints are malformed.
    #[error("Invalid calibration parameters: {reason}")]
    InvalidParams {
        /// Description of the problem.
        reason: String,
    },

    /// Basis, shape or design settings are inconsistent.
    #[error("Invalid segment design: {reason}")]
    InvalidDesign {
        /// Description of the problem.
        reason: String,
    },

    /// Knot vector is unusable.
    #[error("Invalid knots: {reason}")]
    InvalidKnots {
        /// Description of the problem.
        reason: String,
    },

    /// Configuration failed validation.
    #[error("Invalid configuration field '{field}': {reason}")]
    InvalidConfig {
        /// Offending field.
        field: String,
        /// Description of the problem.
        reason: String,
    },

    /// More explicit constraints than basis coefficients.
    #[error(
        "Constraint count mismatch: {constraints} explicit constraints for {basis} basis functions"
    )]
    ConstraintCountMismatch {
        /// Number of explicit constraints supplied.
        constraints: usize,
        /// Number of basis functions in the segment.
        basis: usize,
    },

    /// The calibration system could not be solved by either solver.
    #[error("Singular calibration system on segment [{left:.6}, {right:.6}]")]
    SingularSystem {
        /// Left edge of the segment.
        left: f64,
        /// Right edge of the segment.
        right: f64,
    },

    /// A solved coefficient is NaN or infinite.
    #[error("Non-finite coefficient {index} on segment [{left:.6}, {right:.6}]")]
    NonFiniteCoefficient {
        /// Index of the offending coefficient.
        index: usize,
        /// Left edge of the segment.
        left: f64,
        /// Right edge of the segment.
        right: f64,
    },

    /// The boundary-condition root search did not converge.
    #[error("Boundary condition {condition} not met after {iterations} iterations (residual: {residual:.2e})")]
    BoundaryConditionFailed {
        /// Name of the boundary condition.
        condition: String,
        /// Iterations attempted.
        iterations: u32,
        /// Final absolute residual.
        residual: f64,
    },

    /// The boundary-condition root search stopped before using its budget.
    #[error("Boundary condition {condition} search aborted: {cause}")]
    BoundarySearchAborted {
        /// Name of the boundary condition.
        condition: String,
        /// Numerical failure that stopped the search.
        cause: MathError,
    },

    /// A query needs calibrated coefficients but the segment has none.
    #[error("Segment [{left:.6}, {right:.6}] has not been calibrated")]
    NotCalibrated {
        /// Left edge of the segment.
        left: f64,
        /// Right edge of the segment.
        right: f64,
    },

    /// Ordinate lies outside the domain.
    #[error("Ordinate {x:.6} outside domain [{left:.6}, {right:.6}]")]
    OutOfDomain {
        /// The queried ordinate.
        x: f64,
        /// Left edge of the domain.
        left: f64,
        /// Right edge of the domain.
        right: f64,
    },

    /// Knot insertion at an ordinate that already is a knot.
    #[error("Knot already exists at {x:.6}")]
    KnotExists {
        /// The existing knot.
        x: f64,
    },

    /// A constraint's ordinates straddle the knot being inserted.
    #[error("Constraint spanning [{first:.6}, {last:.6}] splits the knot at {knot:.6}")]
    ConstraintSplitsKnot {
        /// The knot ordinate.
        knot: f64,
        /// First constraint ordinate.
        first: f64,
        /// Last constraint ordinate.
        last: f64,
    },

    /// A constraint crosses a clip or append boundary.
    #[error("Constraint ordinate {ordinate:.6} overlaps boundary at {boundary:.6}")]
    ConstraintOverlapsBoundary {
        /// The boundary ordinate.
        boundary: f64,
        /// The offending constraint ordinate.
        ordinate: f64,
    },

    /// Underlying numerical failure.
    #[error("Math error: {0}")]
    Math(#[from] MathError),
}

impl SplineError {
    /// Creates an invalid parameters error.
    #[must_use]
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            reason: reason.into(),
        }
    }

    /// Creates an invalid design error.
    #[must_use]
    pub fn invalid_design(reason: impl Into<String>) -> Self {
        Self::InvalidDesign {
            reason: reason.into(),
        }
    }

    /// Creates an invalid knots error.
    #[must_use]
    pub fn invalid_knots(reason: impl Into<String>) -> Self {
        Self::InvalidKnots {
            reason: reason.into(),
        }
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an out-of-domain error.
    #[must_use]
    pub fn out_of_domain(x: f64, left: f64, right: f64) -> Self {
        Self::OutOfDomain { x, left, right }
    }

    /// Returns true for query errors a caller may recover from by probing elsewhere.
    #[must_use]
    pub fn is_out_of_domain(&self) -> bool {
        matches!(self, Self::OutOfDomain { .. })
    }

    /// Returns true if the error came out of a calibration attempt.
    #[must_use]
    pub fn is_calibration_failure(&self) -> bool {
        matches!(
            self,
            Self::ConstraintCountMismatch { .. }
                | Self::SingularSystem { .. }
                | Self::NonFiniteCoefficient { .. }
                | Self::BoundaryConditionFailed { .. }
                | Self::BoundarySearchAborted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SplineError::ConstraintCountMismatch {
            constraints: 3,
            basis: 2,
        };
        assert!(err.to_string().contains("3 explicit constraints"));
        assert!(err.is_calibration_failure());

        let err = SplineError::out_of_domain(2.5, 0.0, 2.0);
        assert!(err.is_out_of_domain());
        assert!(!err.is_calibration_failure());
    }

    #[test]
    fn test_aborted_search_names_cause() {
        let err = SplineError::BoundarySearchAborted {
            condition: "natural".to_string(),
            cause: MathError::DivisionByZero { value: 0.0 },
        };
        assert!(err.to_string().contains("Division by zero"));
        assert!(err.is_calibration_failure());
    }

    #[test]
    fn test_math_error_conversion() {
        let err: SplineError = MathError::SingularMatrix.into();
        assert!(matches!(err, SplineError::Math(MathError::SingularMatrix)));
    }
}
