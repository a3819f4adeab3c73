//! Named basis families and their string form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::function::BasisFunction;
use super::BasisSet;
use crate::error::{SplineError, SplineResult};

/// A family of basis functions from which a segment's [`BasisSet`] is built.
///
/// The tension families all carry four functions, `{1, t, φ₁, φ₂}`, so a
/// segment built from them has four coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum BasisFamily {
    /// Monomials `1, t, …, t^(n−1)`.
    Polynomial {
        /// Number of basis functions.
        num_basis: usize,
    },
    /// Bernstein polynomials of degree `n − 1`.
    Bernstein {
        /// Number of basis functions.
        num_basis: usize,
    },
    /// `{1, t, e^{τt}, e^{−τt}}`.
    ExponentialTension {
        /// Tension `τ > 0`.
        tension: f64,
    },
    /// `{1, t, cosh(τt), sinh(τt)}`.
    HyperbolicTension {
        /// Tension `τ > 0`.
        tension: f64,
    },
    /// `{1, t, (e^{τt} − 1 − τt)/τ², (e^{τt} − 1 − τt − τ²t²/2)/τ³}`.
    #[serde(rename = "klk_exponential_tension")]
    KochLycheKvasovExponential {
        /// Tension `τ ≥ 0`; zero yields the cubic monomials up to scale.
        tension: f64,
    },
    /// `{1, t, (cosh τt − 1)/τ², (sinh τt − τt)/τ³}`.
    #[serde(rename = "klk_hyperbolic_tension")]
    KochLycheKvasovHyperbolic {
        /// Tension `τ ≥ 0`; zero yields the cubic monomials up to scale.
        tension: f64,
    },
}

impl BasisFamily {
    /// Cubic monomials, the usual default.
    pub const CUBIC_POLYNOMIAL: Self = Self::Polynomial { num_basis: 4 };

    /// Returns the number of functions in the family.
    #[must_use]
    pub fn num_basis(&self) -> usize {
        match *self {
            Self::Polynomial { num_basis } | Self::Bernstein { num_basis } => num_basis,
            Self::ExponentialTension { .. }
            | Self::HyperbolicTension { .. }
            | Self::KochLycheKvasovExponential { .. }
            | Self::KochLycheKvasovHyperbolic { .. } => 4,
        }
    }

    /// Returns the family's short name, as used by [`FromStr`].
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Polynomial { .. } => "polynomial",
            Self::Bernstein { .. } => "bernstein",
            Self::ExponentialTension { .. } => "exponential_tension",
            Self::HyperbolicTension { .. } => "hyperbolic_tension",
            Self::KochLycheKvasovExponential { .. } => "klk_exponential_tension",
            Self::KochLycheKvasovHyperbolic { .. } => "klk_hyperbolic_tension",
        }
    }

    /// Checks the family parameters.
    pub fn validate(&self) -> SplineResult<()> {
        match *self {
            Self::Polynomial { num_basis } | Self::Bernstein { num_basis } => {
                if num_basis < 2 {
                    return Err(SplineError::invalid_design(format!(
                        "{} basis needs at least 2 functions, got {num_basis}",
                        self.name()
                    )));
                }
            }
            Self::ExponentialTension { tension } | Self::HyperbolicTension { tension } => {
                if !tension.is_finite() || tension <= 0.0 {
                    return Err(SplineError::invalid_design(format!(
                        "{} needs a positive finite tension, got {tension}",
                        self.name()
                    )));
                }
            }
            Self::KochLycheKvasovExponential { tension }
            | Self::KochLycheKvasovHyperbolic { tension } => {
                if !tension.is_finite() || tension < 0.0 {
                    return Err(SplineError::invalid_design(format!(
                        "{} needs a non-negative finite tension, got {tension}",
                        self.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Builds the basis set for this family.
    pub fn build(&self) -> SplineResult<BasisSet> {
        self.validate()?;

        let functions = match *self {
            Self::Polynomial { num_basis } => (0..num_basis)
                .map(|p| BasisFunction::Monomial { power: p as u32 })
                .collect(),
            Self::Bernstein { num_basis } => {
                let degree = (num_basis - 1) as u32;
                (0..=degree)
                    .map(|index| BasisFunction::Bernstein { degree, index })
                    .collect()
            }
            Self::ExponentialTension { tension } => vec![
                BasisFunction::Monomial { power: 0 },
                BasisFunction::Monomial { power: 1 },
                BasisFunction::Exponential { tension },
                BasisFunction::Exponential { tension: -tension },
            ],
            Self::HyperbolicTension { tension } => vec![
                BasisFunction::Monomial { power: 0 },
                BasisFunction::Monomial { power: 1 },
                BasisFunction::HyperbolicCosine { tension },
                BasisFunction::HyperbolicSine { tension },
            ],
            Self::KochLycheKvasovExponential { tension } => vec![
                BasisFunction::Monomial { power: 0 },
                BasisFunction::Monomial { power: 1 },
                BasisFunction::KlkExponential { tension, order: 2 },
                BasisFunction::KlkExponential { tension, order: 3 },
            ],
            Self::KochLycheKvasovHyperbolic { tension } => vec![
                BasisFunction::Monomial { power: 0 },
                BasisFunction::Monomial { power: 1 },
                BasisFunction::KlkHyperbolic { tension, order: 2 },
                BasisFunction::KlkHyperbolic { tension, order: 3 },
            ],
        };

        Ok(BasisSet::new(*self, functions))
    }
}

impl Default for BasisFamily {
    fn default() -> Self {
        Self::CUBIC_POLYNOMIAL
    }
}

impl fmt::Display for BasisFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Polynomial { num_basis } | Self::Bernstein { num_basis } => {
                write!(f, "{}({num_basis})", self.name())
            }
            Self::ExponentialTension { tension }
            | Self::HyperbolicTension { tension }
            | Self::KochLycheKvasovExponential { tension }
            | Self::KochLycheKvasovHyperbolic { tension } => {
                write!(f, "{}({tension})", self.name())
            }
        }
    }
}

impl FromStr for BasisFamily {
    type Err = SplineError;

    /// Parses `name(parameter)`, e.g. `"polynomial(4)"` or
    /// `"klk_hyperbolic_tension(1.5)"`. A bare `"polynomial"` or
    /// `"bernstein"` means four functions.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let (name, argument) = match normalized.split_once('(') {
            Some((name, rest)) => {
                let argument = rest.strip_suffix(')').ok_or_else(|| {
                    SplineError::invalid_design(format!("unbalanced parentheses in '{s}'"))
                })?;
                (name.trim().to_string(), Some(argument.trim().to_string()))
            }
            None => (normalized.clone(), None),
        };

        let count = |default: usize| -> SplineResult<usize> {
            argument.as_deref().map_or(Ok(default), |a| {
                a.parse::<usize>().map_err(|_| {
                    SplineError::invalid_design(format!("'{a}' is not a basis count"))
                })
            })
        };
        let tension = || -> SplineResult<f64> {
            let a = argument.as_deref().ok_or_else(|| {
                SplineError::invalid_design(format!("'{name}' needs a tension argument"))
            })?;
            a.parse::<f64>()
                .map_err(|_| SplineError::invalid_design(format!("'{a}' is not a tension")))
        };

        let family = match name.as_str() {
            "polynomial" | "poly" | "monomial" => Self::Polynomial {
                num_basis: count(4)?,
            },
            "bernstein" => Self::Bernstein {
                num_basis: count(4)?,
            },
            "exponential_tension" | "exponential" => Self::ExponentialTension {
                tension: tension()?,
            },
            "hyperbolic_tension" | "hyperbolic" => Self::HyperbolicTension {
                tension: tension()?,
            },
            "klk_exponential_tension" | "klk_exponential" => Self::KochLycheKvasovExponential {
                tension: tension()?,
            },
            "klk_hyperbolic_tension" | "klk_hyperbolic" => Self::KochLycheKvasovHyperbolic {
                tension: tension()?,
            },
            _ => {
                return Err(SplineError::invalid_design(format!(
                    "unknown basis family '{s}'"
                )))
            }
        };

        family.validate()?;
        Ok(family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let family: BasisFamily = "polynomial(5)".parse().unwrap();
        assert_eq!(family, BasisFamily::Polynomial { num_basis: 5 });
        assert_eq!(family.to_string(), "polynomial(5)");

        let family: BasisFamily = " KLK_Hyperbolic_Tension(1.5) ".parse().unwrap();
        assert_eq!(family, BasisFamily::KochLycheKvasovHyperbolic { tension: 1.5 });
        assert_eq!(family.to_string().parse::<BasisFamily>().unwrap(), family);

        assert_eq!(
            "bernstein".parse::<BasisFamily>().unwrap(),
            BasisFamily::Bernstein { num_basis: 4 }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!("spline(4)".parse::<BasisFamily>().is_err());
        assert!("hyperbolic_tension".parse::<BasisFamily>().is_err());
        assert!("hyperbolic_tension(-1)".parse::<BasisFamily>().is_err());
        assert!("polynomial(1)".parse::<BasisFamily>().is_err());
        assert!("polynomial(4".parse::<BasisFamily>().is_err());
    }

    #[test]
    fn test_build_sizes() {
        for family in [
            BasisFamily::Polynomial { num_basis: 3 },
            BasisFamily::Bernstein { num_basis: 5 },
            BasisFamily::ExponentialTension { tension: 1.0 },
            BasisFamily::HyperbolicTension { tension: 1.0 },
            BasisFamily::KochLycheKvasovExponential { tension: 0.0 },
            BasisFamily::KochLycheKvasovHyperbolic { tension: 2.0 },
        ] {
            let set = family.build().unwrap();
            assert_eq!(set.len(), family.num_basis());
            assert_eq!(set.family(), family);
        }
    }

    #[test]
    fn test_serde_round_trip() {
        let family = BasisFamily::HyperbolicTension { tension: 2.5 };
        let json = serde_json::to_string(&family).unwrap();
        assert!(json.contains("hyperbolic_tension"));
        let back: BasisFamily = serde_json::from_str(&json).unwrap();
        assert_eq!(back, family);
    }
}
