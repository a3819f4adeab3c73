//! # Knotwork Math
//!
//! Numerical building blocks for the Knotwork spline calibration engine.
//!
//! This crate provides:
//!
//! - **Linear Algebra**: Square-system solves by direct inversion with a
//!   Gaussian elimination fallback
//! - **Solvers**: Root-finding (bounded Newton-Raphson, bisection, bracket scans)
//! - **Quadrature**: Composite Boole's rule on fixed panels
//!
//! ## Design Philosophy
//!
//! - **Explicit failures**: every numerical failure surfaces as a [`MathError`]
//! - **Bounded work**: iteration budgets and panel counts are always finite
//! - **Plain `f64`**: the spline engine works in double precision throughout

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::similar_names)]

pub mod error;
pub mod linear_algebra;
pub mod quadrature;
pub mod solvers;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{MathError, MathResult};
    pub use crate::linear_algebra::{
        gaussian_elimination, invert, solve_square_system, SolveMethod, SquareSolution,
    };
    pub use crate::quadrature::{boole, BooleQuadrature};
    pub use crate::solvers::{
        bisection, find_sign_changes, newton_raphson, newton_raphson_numerical, SolverConfig,
        SolverResult,
    };
}

pub use error::{MathError, MathResult};
