//! Sequence configuration and validation.
//!
//! Configuration structs deserialize with per-field defaults, so a partial
//! JSON document such as `{"boundary_condition": "natural"}` is enough to
//! obtain a complete [`SequenceConfig`].

use std::fmt;
use std::str::FromStr;

use knotwork_math::solvers::SolverConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SplineError, SplineResult};

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Field that failed validation.
    pub field: String,
    /// Description of the failure.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Trait for validatable configurations.
pub trait Validate {
    /// Returns every validation failure, or an empty vector if valid.
    fn validate(&self) -> Vec<ValidationError>;

    /// Returns true if the configuration is valid.
    fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Validates and returns the failures as a single error.
    fn validate_or_error(&self) -> SplineResult<()> {
        let mut errors = self.validate();
        match errors.len() {
            0 => Ok(()),
            1 => {
                let err = errors.remove(0);
                Err(SplineError::invalid_config(err.field, err.message))
            }
            _ => {
                let fields = errors
                    .iter()
                    .map(|e| e.field.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let messages = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(SplineError::invalid_config(fields, messages))
            }
        }
    }
}

/// Policy closing the leading edge of a sequence.
///
/// Every policy except [`BoundaryCondition::Floating`] floats the leading
/// slope and solves for the value that zeroes a residual elsewhere on the
/// curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryCondition {
    /// No leading derivative constraints; penalty rows close the system.
    #[default]
    Floating,
    /// Zero second derivative at both ends.
    Natural,
    /// Zero first derivative at the right end.
    Financial,
    /// Continuous derivative of order `Ck + 1` across the first interior knot.
    NotAKnot,
}

impl BoundaryCondition {
    /// Returns the condition's short name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Floating => "floating",
            Self::Natural => "natural",
            Self::Financial => "financial",
            Self::NotAKnot => "not_a_knot",
        }
    }
}

impl fmt::Display for BoundaryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BoundaryCondition {
    type Err = SplineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "floating" | "free" => Ok(Self::Floating),
            "natural" => Ok(Self::Natural),
            "financial" | "flat" => Ok(Self::Financial),
            "not_a_knot" | "notaknot" => Ok(Self::NotAKnot),
            _ => Err(SplineError::invalid_config(
                "boundary_condition",
                format!("unknown boundary condition '{s}'"),
            )),
        }
    }
}

/// Settings for sequence calibration and analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Leading-edge policy.
    #[serde(default)]
    pub boundary_condition: BoundaryCondition,

    /// Iteration budget for the leading-slope search.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Residual tolerance for the leading-slope search.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Optional bracket `[lo, hi]` for the leading slope.
    #[serde(default)]
    pub slope_bounds: Option<(f64, f64)>,

    /// Cells per segment when scanning the first derivative for extrema.
    #[serde(default = "default_monotone_scan_intervals")]
    pub monotone_scan_intervals: usize,

    /// Boole panels per segment for penalty and shaped integrals.
    #[serde(default = "default_quadrature_panels")]
    pub quadrature_panels: usize,
}

fn default_max_iterations() -> u32 {
    50
}

fn default_tolerance() -> f64 {
    1e-12
}

fn default_monotone_scan_intervals() -> usize {
    64
}

fn default_quadrature_panels() -> usize {
    32
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            boundary_condition: BoundaryCondition::default(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            slope_bounds: None,
            monotone_scan_intervals: default_monotone_scan_intervals(),
            quadrature_panels: default_quadrature_panels(),
        }
    }
}

impl SequenceConfig {
    /// Creates a configuration with the given boundary condition.
    #[must_use]
    pub fn new(boundary_condition: BoundaryCondition) -> Self {
        Self {
            boundary_condition,
            ..Self::default()
        }
    }

    /// Natural boundary conditions with default solver settings.
    #[must_use]
    pub fn natural() -> Self {
        Self::new(BoundaryCondition::Natural)
    }

    /// Sets the boundary condition.
    #[must_use]
    pub fn with_boundary_condition(mut self, condition: BoundaryCondition) -> Self {
        self.boundary_condition = condition;
        self
    }

    /// Sets the iteration budget.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the residual tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Bounds the leading-slope search.
    #[must_use]
    pub fn with_slope_bounds(mut self, lo: f64, hi: f64) -> Self {
        self.slope_bounds = Some((lo.min(hi), lo.max(hi)));
        self
    }

    /// Sets the monotonicity scan resolution.
    #[must_use]
    pub fn with_monotone_scan_intervals(mut self, intervals: usize) -> Self {
        self.monotone_scan_intervals = intervals;
        self
    }

    /// Sets the quadrature panel count.
    #[must_use]
    pub fn with_quadrature_panels(mut self, panels: usize) -> Self {
        self.quadrature_panels = panels;
        self
    }

    /// Root-finder settings for the leading-slope search.
    pub fn solver_config(&self) -> SolverConfig {
        let config = SolverConfig::new(self.tolerance, self.max_iterations);
        match self.slope_bounds {
            Some((lo, hi)) => config.with_bounds(lo, hi),
            None => config,
        }
    }
}

impl Validate for SequenceConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.max_iterations == 0 || self.max_iterations > 10_000 {
            errors.push(ValidationError::new(
                "max_iterations",
                "Max iterations must be between 1 and 10000",
            ));
        }

        if !(self.tolerance > 0.0 && self.tolerance <= 1e-4) {
            errors.push(ValidationError::new(
                "tolerance",
                "Tolerance must be in (0, 1e-4]",
            ));
        }

        if let Some((lo, hi)) = self.slope_bounds {
            if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                errors.push(ValidationError::new(
                    "slope_bounds",
                    "Slope bounds must be finite with lo < hi",
                ));
            }
        }

        if self.monotone_scan_intervals < 2 {
            errors.push(ValidationError::new(
                "monotone_scan_intervals",
                "Monotonicity scan needs at least 2 intervals",
            ));
        }

        if self.quadrature_panels == 0 {
            errors.push(ValidationError::new(
                "quadrature_panels",
                "Quadrature needs at least one panel",
            ));
        }

        errors
    }
}
