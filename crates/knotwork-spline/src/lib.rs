//! # Knotwork Spline
//!
//! Segment-based spline calibration.
//!
//! A curve is a chain of [`Segment`](segment::Segment)s, each a linear
//! combination of basis functions on its own interval. Segments are
//! calibrated left to right against response constraints, with value and
//! derivative continuity enforced at every interior knot.
//!
//! This crate provides:
//!
//! - **Basis families**: polynomial, Bernstein and four exponential or
//!   hyperbolic tension bases, optionally shaped by a
//!   [`ShapeController`](shape::ShapeController)
//! - **Segments**: per-interval calibration from edge values, derivatives,
//!   linear response constraints and curvature or best-fit penalties
//! - **Sequences**: `Ck` chains closed by natural, financial or not-a-knot
//!   boundary conditions
//! - **Sensitivities**: Jacobians of responses against coefficients, edge
//!   inputs and the sequence's response inputs
//! - **Modification**: knot insertion, clipping and segment appends
//!
//! ## Example
//!
//! ```rust
//! use knotwork_spline::prelude::*;
//!
//! let curve = MultiSegmentSequence::interpolate(
//!     "zero",
//!     &[0.0, 1.0, 2.0, 5.0],
//!     &[0.010, 0.015, 0.018, 0.022],
//!     SegmentBuilderControl::cubic_polynomial(2),
//!     SequenceConfig::natural(),
//! )
//! .unwrap();
//!
//! let y = curve.response_value(1.5).unwrap();
//! assert!(y > 0.015 && y < 0.018);
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel`: build curvature penalty matrices with rayon

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::similar_names)]
#![allow(clippy::float_cmp)]

pub mod basis;
pub mod config;
pub mod error;
pub mod jacobian;
pub mod penalty;
pub mod segment;
pub mod sequence;
pub mod shape;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::basis::{BasisFamily, BasisFunction, BasisSet, ResponseBasis};
    pub use crate::config::{BoundaryCondition, SequenceConfig, Validate, ValidationError};
    pub use crate::error::{SplineError, SplineResult};
    pub use crate::jacobian::WengertJacobian;
    pub use crate::penalty::{BestFitResponse, Penalizer};
    pub use crate::segment::{
        CalibrationParams, DesignControl, KnotPosition, Monotonicity, PenaltyControl,
        ResponseBasisConstraint, ResponseDerivatives, ResponseValueConstraint, Segment,
        SegmentBuilderControl,
    };
    pub use crate::sequence::{
        BoundaryConditionBuilder, CalibratedChain, CkSequenceBuilder, FloatingSlope,
        MultiSegmentSequence, ResidualEdge, SegmentSequenceBuilder, SequenceInputs,
    };
    pub use crate::shape::ShapeController;
}

pub use error::{SplineError, SplineResult};
