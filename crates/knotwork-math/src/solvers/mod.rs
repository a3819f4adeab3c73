//! Root-finding algorithms.
//!
//! - [`newton_raphson`]: Bounded Newton iteration with an analytic derivative
//! - [`newton_raphson_numerical`]: The same iteration with a central-difference derivative
//! - [`bisection`]: Bracketing method used to refine a known sign change
//! - [`find_sign_changes`]: Grid scan that locates every bracketed root in an interval
//!
//! The spline engine uses Newton to solve for the floating leading slope of a
//! segment sequence (the residual is affine in the slope, so Newton converges
//! in one or two steps) and the scan/bisection pair to locate interior
//! extrema when classifying segment monotonicity.

mod bisection;
mod newton;

pub use bisection::{bisection, find_sign_changes};
pub use newton::{newton_raphson, newton_raphson_numerical};

/// Default tolerance for root-finding algorithms.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Default maximum iterations for root-finding algorithms.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Configuration for root-finding algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Tolerance for convergence.
    pub tolerance: f64,
    /// Maximum number of iterations.
    pub max_iterations: u32,
    /// Optional interval the iterate is kept inside.
    pub bounds: Option<(f64, f64)>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            bounds: None,
        }
    }
}

impl SolverConfig {
    /// Creates a new solver configuration.
    #[must_use]
    pub fn new(tolerance: f64, max_iterations: u32) -> Self {
        Self {
            tolerance,
            max_iterations,
            bounds: None,
        }
    }

    /// Sets the tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the maximum iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Keeps every iterate inside `[lower, upper]`.
    #[must_use]
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.bounds = Some((lower.min(upper), lower.max(upper)));
        self
    }
}

/// Result of a root-finding iteration.
#[derive(Debug, Clone, Copy)]
pub struct SolverResult {
    /// The root found.
    pub root: f64,
    /// Number of iterations used.
    pub iterations: u32,
    /// Final residual (function value at root).
    pub residual: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solver_config() {
        let config = SolverConfig::default()
            .with_tolerance(1e-8)
            .with_max_iterations(50)
            .with_bounds(2.0, -2.0);

        assert!((config.tolerance - 1e-8).abs() < f64::EPSILON);
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.bounds, Some((-2.0, 2.0)));
    }

    #[test]
    fn test_newton_and_bisection_agree() {
        let f = |x: f64| x.powi(3) - 2.0 * x - 5.0;
        let df = |x: f64| 3.0 * x * x - 2.0;
        let config = SolverConfig::default();

        let newton = newton_raphson(f, df, 2.0, &config).unwrap();
        let bisect = bisection(f, 2.0, 3.0, &config).unwrap();

        assert_relative_eq!(newton.root, bisect.root, epsilon = 1e-8);
    }

    #[test]
    fn test_scan_then_refine() {
        // Derivative of a cubic with extrema at 1/3 and 2/3
        let df = |t: f64| (t - 1.0 / 3.0) * (t - 2.0 / 3.0);
        let brackets = find_sign_changes(df, 0.0, 1.0, 16).unwrap();
        assert_eq!(brackets.len(), 2);

        let roots: Vec<f64> = brackets
            .iter()
            .map(|&(a, b)| bisection(df, a, b, &SolverConfig::default()).unwrap().root)
            .collect();
        assert_relative_eq!(roots[0], 1.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(roots[1], 2.0 / 3.0, epsilon = 1e-9);
    }
}
