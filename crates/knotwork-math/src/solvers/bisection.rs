//! Bisection refinement and sign-change scanning.

use crate::error::{MathError, MathResult};
use crate::solvers::{SolverConfig, SolverResult};

/// Bisection root-finding on a bracket `[a, b]`.
///
/// Requires `f(a) * f(b) <= 0`. The function value at the lower end of the
/// bracket is carried between iterations, so each step costs a single
/// evaluation.
///
/// # Example
///
/// ```rust
/// use knotwork_math::solvers::{bisection, SolverConfig};
///
/// let f = |x: f64| x * x - 2.0;
///
/// let result = bisection(f, 1.0, 2.0, &SolverConfig::default()).unwrap();
/// assert!((result.root - std::f64::consts::SQRT_2).abs() < 1e-10);
/// ```
pub fn bisection<F>(f: F, a: f64, b: f64, config: &SolverConfig) -> MathResult<SolverResult>
where
    F: Fn(f64) -> f64,
{
    let mut lo = a.min(b);
    let mut hi = a.max(b);

    let mut f_lo = f(lo);
    let f_hi = f(hi);

    if !f_lo.is_finite() || !f_hi.is_finite() {
        return Err(MathError::non_finite("bisection bracket"));
    }
    if f_lo * f_hi > 0.0 {
        return Err(MathError::InvalidBracket {
            a: lo,
            b: hi,
            fa: f_lo,
            fb: f_hi,
        });
    }

    if f_lo.abs() < config.tolerance {
        return Ok(SolverResult {
            root: lo,
            iterations: 0,
            residual: f_lo,
        });
    }
    if f_hi.abs() < config.tolerance {
        return Ok(SolverResult {
            root: hi,
            iterations: 0,
            residual: f_hi,
        });
    }

    for iteration in 0..config.max_iterations {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);

        if f_mid.abs() < config.tolerance || 0.5 * (hi - lo) < config.tolerance {
            return Ok(SolverResult {
                root: mid,
                iterations: iteration + 1,
                residual: f_mid,
            });
        }

        if f_mid * f_lo < 0.0 {
            hi = mid;
        } else {
            lo = mid;
            f_lo = f_mid;
        }
    }

    let mid = 0.5 * (lo + hi);
    Err(MathError::convergence_failed(
        config.max_iterations,
        f(mid).abs(),
    ))
}

/// Scans `[a, b]` on `intervals` equal cells and returns every cell whose
/// endpoints straddle a sign change of `f`.
///
/// A grid node where `f` is exactly zero is reported once, as the cell that
/// ends on it. Roots of even multiplicity inside a cell are invisible to the
/// scan; callers choose `intervals` to suit the functions they inspect.
pub fn find_sign_changes<F>(f: F, a: f64, b: f64, intervals: usize) -> MathResult<Vec<(f64, f64)>>
where
    F: Fn(f64) -> f64,
{
    if intervals == 0 {
        return Err(MathError::invalid_input("scan needs at least one interval"));
    }
    if !(a < b) {
        return Err(MathError::invalid_input(format!(
            "scan interval must be increasing: [{a}, {b}]"
        )));
    }

    let h = (b - a) / intervals as f64;
    let mut brackets = Vec::new();
    let mut x_prev = a;
    let mut f_prev = f(a);
    if !f_prev.is_finite() {
        return Err(MathError::non_finite("sign change scan"));
    }

    for i in 1..=intervals {
        let x = if i == intervals { b } else { a + h * i as f64 };
        let fx = f(x);
        if !fx.is_finite() {
            return Err(MathError::non_finite("sign change scan"));
        }

        let crosses = f_prev * fx < 0.0 || (fx == 0.0 && f_prev != 0.0);
        if crosses {
            brackets.push((x_prev, x));
        }

        x_prev = x;
        f_prev = fx;
    }

    Ok(brackets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sqrt_2() {
        let f = |x: f64| x * x - 2.0;

        let result = bisection(f, 1.0, 2.0, &SolverConfig::default()).unwrap();

        assert_relative_eq!(result.root, std::f64::consts::SQRT_2, epsilon = 1e-10);
    }

    #[test]
    fn test_reversed_bracket() {
        let f = |x: f64| x - 0.25;

        let result = bisection(f, 1.0, 0.0, &SolverConfig::default()).unwrap();

        assert_relative_eq!(result.root, 0.25, epsilon = 1e-10);
    }

    #[test]
    fn test_invalid_bracket() {
        let f = |x: f64| x * x + 1.0;

        let result = bisection(f, -1.0, 1.0, &SolverConfig::default());

        assert!(matches!(result, Err(MathError::InvalidBracket { .. })));
    }

    #[test]
    fn test_scan_reports_each_crossing_once() {
        let f = |x: f64| (x - 0.5) * (x - 0.75);

        // 0.5 and 0.75 are grid nodes of the 8-cell scan on [0, 1]
        let brackets = find_sign_changes(f, 0.0, 1.0, 8).unwrap();

        assert_eq!(brackets, vec![(0.375, 0.5), (0.625, 0.75)]);
    }

    #[test]
    fn test_scan_without_crossing() {
        let f = |x: f64| 1.0 + x;
        assert!(find_sign_changes(f, 0.0, 1.0, 8).unwrap().is_empty());
    }

    #[test]
    fn test_scan_rejects_empty_interval() {
        assert!(find_sign_changes(|x| x, 1.0, 1.0, 8).is_err());
        assert!(find_sign_changes(|x| x, 0.0, 1.0, 0).is_err());
    }
}
