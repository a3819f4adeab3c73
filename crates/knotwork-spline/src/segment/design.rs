//! Inelastic design parameters and per-segment builder control.

use serde::{Deserialize, Serialize};

use crate::basis::BasisFamily;
use crate::config::{Validate, ValidationError};
use crate::shape::ShapeController;

/// A roughness penalty `amplitude · ∫₀¹ (f⁽ⁿ⁾(t))² dt` on one derivative order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyControl {
    /// Derivative order `n`.
    pub derivative_order: u32,
    /// Non-negative scale.
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
}

fn default_amplitude() -> f64 {
    1.0
}

impl PenaltyControl {
    /// Creates a penalty on the given derivative order with unit amplitude.
    #[must_use]
    pub fn new(derivative_order: u32) -> Self {
        Self {
            derivative_order,
            amplitude: 1.0,
        }
    }

    /// Sets the amplitude.
    #[must_use]
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    fn check(&self, field: &str, errors: &mut Vec<ValidationError>) {
        if self.derivative_order == 0 {
            errors.push(ValidationError::new(
                format!("{field}.derivative_order"),
                "Penalty derivative order must be at least 1",
            ));
        }
        if !self.amplitude.is_finite() || self.amplitude < 0.0 {
            errors.push(ValidationError::new(
                format!("{field}.amplitude"),
                "Penalty amplitude must be finite and non-negative",
            ));
        }
    }
}

/// Continuity order and smoothness penalties of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DesignControl {
    /// Order of derivative continuity enforced at the segment's left edge.
    pub ck: u32,
    /// Curvature penalty used to pad under-determined systems.
    #[serde(default = "default_curvature")]
    pub curvature: PenaltyControl,
    /// Optional extra roughness penalty, summed with the curvature penalty.
    #[serde(default)]
    pub length: Option<PenaltyControl>,
}

fn default_curvature() -> PenaltyControl {
    PenaltyControl::new(2)
}

impl DesignControl {
    /// Creates a design with continuity `ck` and a curvature penalty of the given order.
    #[must_use]
    pub fn new(ck: u32, curvature_order: u32) -> Self {
        Self {
            ck,
            curvature: PenaltyControl::new(curvature_order),
            length: None,
        }
    }

    /// Adds a length (lower-order roughness) penalty.
    #[must_use]
    pub fn with_length_penalty(mut self, length: PenaltyControl) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets the curvature penalty amplitude.
    #[must_use]
    pub fn with_curvature_amplitude(mut self, amplitude: f64) -> Self {
        self.curvature.amplitude = amplitude;
        self
    }
}

impl Default for DesignControl {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

/// Everything needed to build one segment: basis family, optional shape
/// controller and design.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentBuilderControl {
    /// Basis family with its parameters.
    pub basis: BasisFamily,
    /// Optional shape controller.
    #[serde(default)]
    pub shape: Option<ShapeController>,
    /// Design parameters.
    #[serde(default)]
    pub design: DesignControl,
}

impl SegmentBuilderControl {
    /// Creates a control from a basis family and design.
    #[must_use]
    pub fn new(basis: BasisFamily, design: DesignControl) -> Self {
        Self {
            basis,
            shape: None,
            design,
        }
    }

    /// Cubic monomial basis with the given continuity and a second-order
    /// curvature penalty.
    #[must_use]
    pub fn cubic_polynomial(ck: u32) -> Self {
        Self::new(BasisFamily::CUBIC_POLYNOMIAL, DesignControl::new(ck, 2))
    }

    /// Sets the shape controller.
    #[must_use]
    pub fn with_shape(mut self, shape: ShapeController) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Returns the number of basis functions the control produces.
    #[must_use]
    pub fn num_basis(&self) -> usize {
        self.basis.num_basis()
    }

    /// Returns the continuity order.
    #[must_use]
    pub fn ck(&self) -> u32 {
        self.design.ck
    }
}

impl Default for SegmentBuilderControl {
    fn default() -> Self {
        Self::cubic_polynomial(2)
    }
}

impl Validate for DesignControl {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        self.curvature.check("curvature", &mut errors);
        if let Some(length) = &self.length {
            length.check("length", &mut errors);
        }
        errors
    }
}

impl Validate for SegmentBuilderControl {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = self.design.validate();

        if let Err(e) = self.basis.validate() {
            errors.push(ValidationError::new("basis", e.to_string()));
        }
        if let Some(shape) = &self.shape {
            if let Err(e) = shape.validate() {
                errors.push(ValidationError::new("shape", e.to_string()));
            }
        }

        let num_basis = self.basis.num_basis();
        if num_basis >= 2 && self.design.ck as usize > num_basis - 2 {
            errors.push(ValidationError::new(
                "design.ck",
                format!(
                    "Ck = {} needs at least {} basis functions, family has {num_basis}",
                    self.design.ck,
                    self.design.ck + 2
                ),
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ck_bound() {
        assert!(SegmentBuilderControl::cubic_polynomial(2).is_valid());
        assert!(!SegmentBuilderControl::cubic_polynomial(3).is_valid());

        let linear = SegmentBuilderControl::new(
            BasisFamily::Polynomial { num_basis: 2 },
            DesignControl::new(0, 1),
        );
        assert!(linear.is_valid());
    }

    #[test]
    fn test_penalty_validation() {
        let design = DesignControl::new(1, 0)
            .with_curvature_amplitude(-1.0)
            .with_length_penalty(PenaltyControl::new(1));
        let errors = design.validate();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "curvature.derivative_order");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let control: SegmentBuilderControl = serde_json::from_str(
            r#"{"basis": {"family": "klk_hyperbolic_tension", "tension": 1.0}, "design": {"ck": 1}}"#,
        )
        .unwrap();
        assert_eq!(control.num_basis(), 4);
        assert_eq!(control.design.curvature, PenaltyControl::new(2));
        assert!(control.shape.is_none());
        assert!(control.is_valid());
    }
}
