//! Univariate basis functions on the local segment domain.

use serde::{Deserialize, Serialize};

/// Below this `|τt|` the tension remainders are summed as power series.
const SERIES_THRESHOLD: f64 = 0.5;

/// Series terms used for the tension remainders; ample for `|τt| < 0.5`.
const SERIES_TERMS: u32 = 12;

/// A single basis function, evaluated in the local coordinate `t`
/// (`t = 0` at the segment's left edge, `t = 1` at its right edge).
///
/// The Koch-Lyche-Kvasov variants are the Taylor remainders of the
/// exponential and hyperbolic functions,
///
/// ```text
/// KlkExponential{τ, m}(t) = (e^{τt} − Σ_{j<m} (τt)^j / j!) / τ^m
/// KlkHyperbolic{τ, m}(t)  = (cosh/sinh(τt) − lower even/odd terms) / τ^m
/// ```
///
/// which reduce to `t^m / m!` as `τ → 0` and stay well conditioned for
/// small tension, unlike the raw `e^{τt}` or `cosh(τt)` forms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BasisFunction {
    /// `t^power`.
    Monomial {
        /// Exponent.
        power: u32,
    },
    /// Bernstein polynomial `C(n, i) t^i (1 − t)^(n − i)`.
    Bernstein {
        /// Polynomial degree `n`.
        degree: u32,
        /// Index `i` in `0..=n`.
        index: u32,
    },
    /// `e^{τt}`.
    Exponential {
        /// Tension `τ` (sign selects growth or decay).
        tension: f64,
    },
    /// `cosh(τt)`.
    HyperbolicCosine {
        /// Tension `τ`.
        tension: f64,
    },
    /// `sinh(τt)`.
    HyperbolicSine {
        /// Tension `τ`.
        tension: f64,
    },
    /// Exponential Taylor remainder of order `m`.
    KlkExponential {
        /// Tension `τ`.
        tension: f64,
        /// Remainder order `m`.
        order: u32,
    },
    /// Hyperbolic Taylor remainder of order `m`.
    KlkHyperbolic {
        /// Tension `τ`.
        tension: f64,
        /// Remainder order `m`.
        order: u32,
    },
}

impl BasisFunction {
    /// Evaluates the function at `t`.
    pub fn evaluate(&self, t: f64) -> f64 {
        self.derivative(t, 0)
    }

    /// Evaluates the derivative of the given order at `t` (order 0 is the value).
    pub fn derivative(&self, t: f64, order: u32) -> f64 {
        match *self {
            Self::Monomial { power } => monomial_derivative(power, t, order),
            Self::Bernstein { degree, index } => bernstein_derivative(degree, index, t, order),
            Self::Exponential { tension } => tension.powi(order as i32) * (tension * t).exp(),
            Self::HyperbolicCosine { tension } => {
                tension.powi(order as i32) * hyperbolic_cycle(tension * t, order)
            }
            Self::HyperbolicSine { tension } => {
                tension.powi(order as i32) * hyperbolic_cycle(tension * t, order + 1)
            }
            Self::KlkExponential { tension, order: m } => {
                if order <= m {
                    exponential_remainder(tension, m - order, t)
                } else {
                    tension.powi((order - m) as i32) * (tension * t).exp()
                }
            }
            Self::KlkHyperbolic { tension, order: m } => {
                if order <= m {
                    hyperbolic_remainder(tension, m - order, t)
                } else {
                    let j = order - m;
                    tension.powi(j as i32) * hyperbolic_cycle(tension * t, j)
                }
            }
        }
    }

    /// Integrates the function over `[a, b]`.
    pub fn integral(&self, a: f64, b: f64) -> f64 {
        match *self {
            Self::Monomial { power } => {
                let p = power as i32 + 1;
                (b.powi(p) - a.powi(p)) / f64::from(power + 1)
            }
            Self::Bernstein { degree, index } => {
                // ∫ B_{i,n} = 1/(n+1) · Σ_{j=i+1}^{n+1} B_{j,n+1}
                let antiderivative = |t: f64| {
                    (index + 1..=degree + 1)
                        .map(|j| bernstein(degree + 1, i64::from(j), t))
                        .sum::<f64>()
                        / f64::from(degree + 1)
                };
                antiderivative(b) - antiderivative(a)
            }
            Self::Exponential { tension } => {
                if tension == 0.0 {
                    b - a
                } else {
                    ((tension * b).exp() - (tension * a).exp()) / tension
                }
            }
            Self::HyperbolicCosine { tension } => {
                if tension == 0.0 {
                    b - a
                } else {
                    ((tension * b).sinh() - (tension * a).sinh()) / tension
                }
            }
            Self::HyperbolicSine { tension } => {
                if tension == 0.0 {
                    0.0
                } else {
                    ((tension * b).cosh() - (tension * a).cosh()) / tension
                }
            }
            Self::KlkExponential { tension, order } => {
                exponential_remainder(tension, order + 1, b)
                    - exponential_remainder(tension, order + 1, a)
            }
            Self::KlkHyperbolic { tension, order } => {
                hyperbolic_remainder(tension, order + 1, b)
                    - hyperbolic_remainder(tension, order + 1, a)
            }
        }
    }

    /// Returns the tension carried by the function, if any.
    pub fn tension(&self) -> Option<f64> {
        match *self {
            Self::Monomial { .. } | Self::Bernstein { .. } => None,
            Self::Exponential { tension }
            | Self::HyperbolicCosine { tension }
            | Self::HyperbolicSine { tension }
            | Self::KlkExponential { tension, .. }
            | Self::KlkHyperbolic { tension, .. } => Some(tension),
        }
    }
}

fn factorial(n: u32) -> f64 {
    (2..=n).map(f64::from).product()
}

fn monomial_derivative(power: u32, t: f64, order: u32) -> f64 {
    if order > power {
        return 0.0;
    }
    let falling: f64 = (power - order + 1..=power).map(f64::from).product();
    falling * t.powi((power - order) as i32)
}

fn binomial(n: u32, k: u32) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, j| acc * f64::from(n - j) / f64::from(j + 1))
}

fn bernstein(degree: u32, index: i64, t: f64) -> f64 {
    if index < 0 || index > i64::from(degree) {
        return 0.0;
    }
    let i = index as u32;
    binomial(degree, i) * t.powi(i as i32) * (1.0 - t).powi((degree - i) as i32)
}

/// `D^k B_{i,n} = n!/(n−k)! · Σ_j (−1)^j C(k, j) B_{i−k+j, n−k}`.
fn bernstein_derivative(degree: u32, index: u32, t: f64, order: u32) -> f64 {
    if order > degree {
        return 0.0;
    }
    let lower = degree - order;
    let scale: f64 = (lower + 1..=degree).map(f64::from).product();
    let sum: f64 = (0..=order)
        .map(|j| {
            let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
            let shifted = i64::from(index) - i64::from(order) + i64::from(j);
            sign * binomial(order, j) * bernstein(lower, shifted, t)
        })
        .sum();
    scale * sum
}

/// `cosh(x)` for even `k`, `sinh(x)` for odd `k`.
fn hyperbolic_cycle(x: f64, k: u32) -> f64 {
    if k % 2 == 0 {
        x.cosh()
    } else {
        x.sinh()
    }
}

/// `t^m · Σ_k (τt)^k / (m + k)!`, the exponential remainder of order `m`.
fn exponential_remainder(tension: f64, order: u32, t: f64) -> f64 {
    let x = tension * t;
    if order == 0 {
        return x.exp();
    }
    if x.abs() < SERIES_THRESHOLD {
        let mut term = 1.0 / factorial(order);
        let mut sum = term;
        for k in 1..=SERIES_TERMS {
            term *= x / f64::from(order + k);
            sum += term;
        }
        return t.powi(order as i32) * sum;
    }

    let mut head = x.exp();
    let mut power_term = 1.0;
    for j in 0..order {
        if j > 0 {
            power_term *= x / f64::from(j);
        }
        head -= power_term;
    }
    head / tension.powi(order as i32)
}

/// `t^m · Σ_k (τt)^{2k} / (m + 2k)!`, the hyperbolic remainder of order `m`.
fn hyperbolic_remainder(tension: f64, order: u32, t: f64) -> f64 {
    let x = tension * t;
    if order == 0 {
        return x.cosh();
    }
    if x.abs() < SERIES_THRESHOLD {
        let mut term = 1.0 / factorial(order);
        let mut sum = term;
        for k in 1..=SERIES_TERMS {
            let m = order + 2 * k;
            term *= x * x / (f64::from(m - 1) * f64::from(m));
            sum += term;
        }
        return t.powi(order as i32) * sum;
    }

    let mut head = hyperbolic_cycle(x, order);
    let mut j = order % 2;
    while j < order {
        head -= x.powi(j as i32) / factorial(j);
        j += 2;
    }
    head / tension.powi(order as i32)
}
