//! Basis functions, families and the shaped response basis.
//!
//! A segment's response is a linear combination of basis functions in the
//! local coordinate `t ∈ [0, 1]`, optionally multiplied by a
//! [`ShapeController`](crate::shape::ShapeController):
//!
//! ```text
//! f(t) = g(t) · Σᵢ cᵢ Bᵢ(t)
//! ```
//!
//! [`BasisFamily`] names the available sets, [`BasisSet`] holds the built
//! functions, and [`ResponseBasis`] folds in the shape controller so that
//! callers see the products `Rᵢ(t) = g(t) Bᵢ(t)` and their derivatives.

mod family;
mod function;
mod response;

pub use family::BasisFamily;
pub use function::BasisFunction;
pub use response::ResponseBasis;

/// An ordered set of basis functions built from a [`BasisFamily`].
#[derive(Debug, Clone, PartialEq)]
pub struct BasisSet {
    family: BasisFamily,
    functions: Vec<BasisFunction>,
}

impl BasisSet {
    pub(crate) fn new(family: BasisFamily, functions: Vec<BasisFunction>) -> Self {
        Self { family, functions }
    }

    /// Returns the family the set was built from.
    pub fn family(&self) -> BasisFamily {
        self.family
    }

    /// Returns the number of functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if the set has no functions.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Returns the functions in order.
    pub fn functions(&self) -> &[BasisFunction] {
        &self.functions
    }

    /// Evaluates every function's derivative of `order` at `t`.
    pub fn derivatives(&self, t: f64, order: u32) -> Vec<f64> {
        self.functions
            .iter()
            .map(|f| f.derivative(t, order))
            .collect()
    }

    /// Evaluates every function at `t`.
    pub fn values(&self, t: f64) -> Vec<f64> {
        self.derivatives(t, 0)
    }
}
