//! Shaped response basis `Rᵢ(t) = g(t) Bᵢ(t)`.

use knotwork_math::quadrature::BooleQuadrature;

use super::{BasisFamily, BasisSet};
use crate::error::{SplineError, SplineResult};
use crate::shape::ShapeController;

/// The basis a segment actually solves against: each basis function
/// multiplied by the optional shape controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBasis {
    basis: BasisSet,
    shape: Option<ShapeController>,
}

impl ResponseBasis {
    /// Builds the response basis for a family and optional shape controller.
    pub fn new(family: BasisFamily, shape: Option<ShapeController>) -> SplineResult<Self> {
        if let Some(shape) = &shape {
            shape.validate()?;
        }
        Ok(Self {
            basis: family.build()?,
            shape,
        })
    }

    /// Returns the underlying basis set.
    pub fn basis(&self) -> &BasisSet {
        &self.basis
    }

    /// Returns the shape controller, if any.
    pub fn shape(&self) -> Option<&ShapeController> {
        self.shape.as_ref()
    }

    /// Number of response basis functions.
    pub fn len(&self) -> usize {
        self.basis.len()
    }

    /// Returns true if the basis is empty.
    pub fn is_empty(&self) -> bool {
        self.basis.is_empty()
    }

    /// Local derivative of `order` of every `Rᵢ` at `t`, by the Leibniz rule.
    pub fn derivatives(&self, t: f64, order: u32) -> Vec<f64> {
        let Some(shape) = &self.shape else {
            return self.basis.derivatives(t, order);
        };

        let g = shape.derivatives(t, order);
        let mut out = vec![0.0; self.basis.len()];
        let mut binomial = 1.0;
        for j in 0..=order {
            if j > 0 {
                binomial *= f64::from(order + 1 - j) / f64::from(j);
            }
            let weight = binomial * g[(order - j) as usize];
            for (acc, b) in out.iter_mut().zip(self.basis.derivatives(t, j)) {
                *acc += weight * b;
            }
        }
        out
    }

    /// Local value of every `Rᵢ` at `t`.
    pub fn values(&self, t: f64) -> Vec<f64> {
        self.derivatives(t, 0)
    }

    /// Local derivative of `order` of the single function `Rᵢ` at `t`.
    pub fn derivative(&self, index: usize, t: f64, order: u32) -> f64 {
        let Some(shape) = &self.shape else {
            return self.basis.functions()[index].derivative(t, order);
        };

        let function = &self.basis.functions()[index];
        let g = shape.derivatives(t, order);
        let mut binomial = 1.0;
        let mut acc = 0.0;
        for j in 0..=order {
            if j > 0 {
                binomial *= f64::from(order + 1 - j) / f64::from(j);
            }
            acc += binomial * g[(order - j) as usize] * function.derivative(t, j);
        }
        acc
    }

    /// Integral of every `Rᵢ` over the local interval `[a, b]`.
    ///
    /// Unshaped bases integrate in closed form; shaped ones use the quadrature.
    pub fn integrals(&self, a: f64, b: f64, quadrature: &BooleQuadrature) -> SplineResult<Vec<f64>> {
        match &self.shape {
            None => Ok(self
                .basis
                .functions()
                .iter()
                .map(|f| f.integral(a, b))
                .collect()),
            Some(shape) => self
                .basis
                .functions()
                .iter()
                .map(|f| {
                    quadrature
                        .integrate(|t| shape.evaluate(t) * f.evaluate(t), a, b)
                        .map_err(SplineError::from)
                })
                .collect(),
        }
    }
}
