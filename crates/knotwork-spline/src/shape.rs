//! Shape controllers.
//!
//! A shape controller `g(t)` multiplies every basis function of a segment,
//! so the segment's response is `f(t) = g(t) · Σᵢ cᵢ Bᵢ(t)`. The rational
//! controllers pull the curve towards its left edge as the tension grows.

use serde::{Deserialize, Serialize};

use crate::error::{SplineError, SplineResult};

/// Multiplicative shape function applied to a segment's basis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeController {
    /// `1 / (1 + τt)`.
    RationalLinear {
        /// Tension `τ > −1`.
        tension: f64,
    },
    /// `1 / (1 + τt(1 − t))`.
    RationalQuadratic {
        /// Tension `τ > −4`.
        tension: f64,
    },
    /// `e^{−τt}`.
    Exponential {
        /// Tension `τ`.
        tension: f64,
    },
}

impl ShapeController {
    /// Returns the tension.
    #[must_use]
    pub fn tension(&self) -> f64 {
        match *self {
            Self::RationalLinear { tension }
            | Self::RationalQuadratic { tension }
            | Self::Exponential { tension } => tension,
        }
    }

    /// Checks that the controller is finite and positive on `[0, 1]`.
    pub fn validate(&self) -> SplineResult<()> {
        let tension = self.tension();
        if !tension.is_finite() {
            return Err(SplineError::invalid_design(format!(
                "shape tension must be finite, got {tension}"
            )));
        }
        let floor = match self {
            Self::RationalLinear { .. } => -1.0,
            Self::RationalQuadratic { .. } => -4.0,
            Self::Exponential { .. } => f64::NEG_INFINITY,
        };
        if tension <= floor {
            return Err(SplineError::invalid_design(format!(
                "shape tension {tension} makes the controller singular on [0, 1]"
            )));
        }
        Ok(())
    }

    /// Evaluates the controller at `t`.
    pub fn evaluate(&self, t: f64) -> f64 {
        match *self {
            Self::RationalLinear { tension } => 1.0 / (1.0 + tension * t),
            Self::RationalQuadratic { tension } => 1.0 / (1.0 + tension * t * (1.0 - t)),
            Self::Exponential { tension } => (-tension * t).exp(),
        }
    }

    /// Returns `[g(t), g'(t), …, g⁽ᵏ⁾(t)]` for `k = max_order`.
    ///
    /// The rational forms are `1/h` with `h` of degree at most two, so their
    /// derivatives follow `h·g⁽ᵏ⁾ = −Σ_{j=1}^{min(k,2)} C(k,j) h⁽ʲ⁾ g⁽ᵏ⁻ʲ⁾`.
    pub fn derivatives(&self, t: f64, max_order: u32) -> Vec<f64> {
        let n = max_order as usize + 1;
        match *self {
            Self::Exponential { tension } => {
                let value = (-tension * t).exp();
                (0..n).map(|k| (-tension).powi(k as i32) * value).collect()
            }
            Self::RationalLinear { tension } => {
                reciprocal_derivatives([1.0 + tension * t, tension, 0.0], n)
            }
            Self::RationalQuadratic { tension } => reciprocal_derivatives(
                [
                    1.0 + tension * t * (1.0 - t),
                    tension * (1.0 - 2.0 * t),
                    -2.0 * tension,
                ],
                n,
            ),
        }
    }

    /// Evaluates the derivative of the given order at `t`.
    pub fn derivative(&self, t: f64, order: u32) -> f64 {
        self.derivatives(t, order)[order as usize]
    }
}

fn reciprocal_derivatives(h: [f64; 3], n: usize) -> Vec<f64> {
    let mut g = Vec::with_capacity(n);
    g.push(1.0 / h[0]);
    for k in 1..n {
        let mut acc = 0.0;
        let mut binomial = 1.0;
        for j in 1..=k.min(2) {
            binomial *= (k + 1 - j) as f64 / j as f64;
            acc += binomial * h[j] * g[k - j];
        }
        g.push(-acc / h[0]);
    }
    g
}
