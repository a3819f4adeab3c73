//! Bounded Newton-Raphson root-finding.

use crate::error::{MathError, MathResult};
use crate::solvers::{SolverConfig, SolverResult};

/// Relative step used for the central-difference derivative.
const NUMERICAL_STEP: f64 = 1e-6;

/// Newton-Raphson root-finding with an iteration budget and optional bounds.
///
/// Uses the iteration `x_{n+1} = x_n - f(x_n) / f'(x_n)`. When
/// [`SolverConfig::bounds`] is set, a step that would leave the interval is
/// replaced by a move halfway towards the violated bound, so the iterate
/// never escapes the bracket.
///
/// # Example
///
/// ```rust
/// use knotwork_math::solvers::{newton_raphson, SolverConfig};
///
/// let f = |x: f64| x * x - 2.0;
/// let df = |x: f64| 2.0 * x;
///
/// let result = newton_raphson(f, df, 1.5, &SolverConfig::default()).unwrap();
/// assert!((result.root - std::f64::consts::SQRT_2).abs() < 1e-10);
/// ```
pub fn newton_raphson<F, DF>(
    f: F,
    df: DF,
    initial_guess: f64,
    config: &SolverConfig,
) -> MathResult<SolverResult>
where
    F: Fn(f64) -> f64,
    DF: Fn(f64) -> f64,
{
    let mut x = match config.bounds {
        Some((lo, hi)) => initial_guess.clamp(lo, hi),
        None => initial_guess,
    };
    let mut fx = f(x);

    for iteration in 0..config.max_iterations {
        if !fx.is_finite() {
            return Err(MathError::non_finite("newton residual"));
        }
        if fx.abs() < config.tolerance {
            return Ok(SolverResult {
                root: x,
                iterations: iteration,
                residual: fx,
            });
        }

        let dfx = df(x);
        if !dfx.is_finite() || dfx.abs() < 1e-15 {
            return Err(MathError::DivisionByZero { value: dfx });
        }

        let mut next = x - fx / dfx;
        if let Some((lo, hi)) = config.bounds {
            if next < lo {
                next = 0.5 * (x + lo);
            } else if next > hi {
                next = 0.5 * (x + hi);
            }
        }

        let step = next - x;
        x = next;
        fx = f(x);

        if step.abs() < config.tolerance * x.abs().max(1.0) {
            log::debug!("newton converged on step size after {} iterations", iteration + 1);
            return Ok(SolverResult {
                root: x,
                iterations: iteration + 1,
                residual: fx,
            });
        }
    }

    if fx.is_finite() && fx.abs() < config.tolerance {
        return Ok(SolverResult {
            root: x,
            iterations: config.max_iterations,
            residual: fx,
        });
    }

    Err(MathError::convergence_failed(config.max_iterations, fx.abs()))
}

/// Newton-Raphson with a central-difference derivative.
///
/// The difference step scales with `|x|` so the derivative stays accurate
/// for both small slopes and large ordinates.
pub fn newton_raphson_numerical<F>(
    f: F,
    initial_guess: f64,
    config: &SolverConfig,
) -> MathResult<SolverResult>
where
    F: Fn(f64) -> f64,
{
    let df = |x: f64| {
        let h = NUMERICAL_STEP * x.abs().max(1.0);
        (f(x + h) - f(x - h)) / (2.0 * h)
    };

    newton_raphson(&f, df, initial_guess, config)
}
