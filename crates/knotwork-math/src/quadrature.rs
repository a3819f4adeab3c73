//! Fixed-rule numerical quadrature.
//!
//! Curvature penalties integrate products of basis-function derivatives over
//! a segment's local domain. Those integrands are smooth, so a composite
//! Boole's rule on a fixed number of panels is both exact for the polynomial
//! families (degree ≤ 5 per panel) and accurate for the tension families.

use crate::error::{MathError, MathResult};

/// Default number of Boole panels used by [`BooleQuadrature::default`].
pub const DEFAULT_PANELS: usize = 32;

/// Boole's rule weights for one panel of four sub-intervals, scaled by `2h/45`.
const BOOLE_WEIGHTS: [f64; 5] = [7.0, 32.0, 12.0, 32.0, 7.0];

/// Composite Boole's rule on `panels` equal panels.
///
/// Each panel spans four sub-intervals of width `h` and contributes
/// `2h/45 · (7f₀ + 32f₁ + 12f₂ + 32f₃ + 7f₄)`.
///
/// # Example
///
/// ```rust
/// use knotwork_math::quadrature::boole;
///
/// // ∫₀¹ t⁴ dt = 1/5, integrated exactly by a single panel
/// let value = boole(|t: f64| t.powi(4), 0.0, 1.0, 1).unwrap();
/// assert!((value - 0.2).abs() < 1e-14);
/// ```
pub fn boole<F>(f: F, a: f64, b: f64, panels: usize) -> MathResult<f64>
where
    F: Fn(f64) -> f64,
{
    if panels == 0 {
        return Err(MathError::invalid_input("Boole's rule needs at least one panel"));
    }
    if !a.is_finite() || !b.is_finite() {
        return Err(MathError::invalid_input(format!(
            "integration limits must be finite: [{a}, {b}]"
        )));
    }
    if a == b {
        return Ok(0.0);
    }

    let h = (b - a) / (4 * panels) as f64;
    let mut sum = 0.0;

    for panel in 0..panels {
        let x0 = a + (4 * panel) as f64 * h;
        for (k, weight) in BOOLE_WEIGHTS.iter().enumerate() {
            sum += weight * f(x0 + k as f64 * h);
        }
    }

    let value = sum * 2.0 * h / 45.0;
    if !value.is_finite() {
        return Err(MathError::non_finite("boole quadrature"));
    }

    Ok(value)
}

/// A reusable composite Boole's rule with a fixed panel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BooleQuadrature {
    panels: usize,
}

impl Default for BooleQuadrature {
    fn default() -> Self {
        Self {
            panels: DEFAULT_PANELS,
        }
    }
}

impl BooleQuadrature {
    /// Creates a rule with the given number of panels.
    pub fn new(panels: usize) -> MathResult<Self> {
        if panels == 0 {
            return Err(MathError::invalid_input("Boole's rule needs at least one panel"));
        }
        Ok(Self { panels })
    }

    /// Returns the number of panels.
    pub fn panels(&self) -> usize {
        self.panels
    }

    /// Integrates `f` over `[a, b]`.
    pub fn integrate<F>(&self, f: F, a: f64, b: f64) -> MathResult<f64>
    where
        F: Fn(f64) -> f64,
    {
        boole(f, a, b, self.panels)
    }

    /// Integrates `f` over the unit interval `[0, 1]`.
    pub fn integrate_unit<F>(&self, f: F) -> MathResult<f64>
    where
        F: Fn(f64) -> f64,
    {
        boole(f, 0.0, 1.0, self.panels)
    }
}
