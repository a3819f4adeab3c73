//! Multi-segment sequences.
//!
//! A [`MultiSegmentSequence`] chains calibrated segments over contiguous
//! knots. Calibration runs through a [`SegmentSequenceBuilder`]; the default
//! is a [`BoundaryConditionBuilder`] driven by the sequence's
//! [`SequenceConfig`].
//!
//! # Example
//!
//! ```rust
//! use knotwork_spline::prelude::*;
//!
//! let knots = [0.0, 1.0, 2.0];
//! let sequence = MultiSegmentSequence::interpolate(
//!     "hump",
//!     &knots,
//!     &[0.0, 1.0, 0.0],
//!     SegmentBuilderControl::cubic_polynomial(2),
//!     SequenceConfig::natural(),
//! )
//! .unwrap();
//!
//! assert!((sequence.response_value(0.5).unwrap() - 0.6875).abs() < 1e-9);
//! ```

mod boundary;
mod builder;
mod inputs;
mod modifier;
mod sensitivity;

pub use boundary::{BoundaryConditionBuilder, FloatingSlope, ResidualEdge};
pub use builder::{CalibratedChain, CkSequenceBuilder, SegmentSequenceBuilder};
pub use inputs::SequenceInputs;

use tracing::debug;

use crate::config::{BoundaryCondition, SequenceConfig, Validate};
use crate::error::{SplineError, SplineResult};
use crate::jacobian::WengertJacobian;
use crate::penalty::BestFitResponse;
use crate::segment::{
    Monotonicity, ResponseDerivatives, ResponseValueConstraint, Segment, SegmentBuilderControl,
};

/// A calibrated chain of segments over `knots[0] < … < knots[n]`.
#[derive(Debug, Clone)]
pub struct MultiSegmentSequence {
    name: String,
    segments: Vec<Segment>,
    /// Global constraints per segment, aligned with the restricted ones in
    /// each segment's calibration parameters.
    constraints: Vec<Vec<ResponseValueConstraint>>,
    best_fit: Option<BestFitResponse>,
    config: SequenceConfig,
    leading_slope: Option<f64>,
    floating: Option<FloatingSlope>,
    /// `∂c/∂q` per segment.
    sensitivities: Vec<WengertJacobian>,
}

/// Builds uncalibrated segments over `knots`.
///
/// `controls` holds either one control per segment or a single shared one.
fn template_segments(
    knots: &[f64],
    controls: &[SegmentBuilderControl],
    config: &SequenceConfig,
) -> SplineResult<Vec<Segment>> {
    if knots.len() < 2 {
        return Err(SplineError::invalid_knots(format!(
            "need at least 2 knots, got {}",
            knots.len()
        )));
    }
    if knots.iter().any(|k| !k.is_finite()) || knots.windows(2).any(|w| w[0] >= w[1]) {
        return Err(SplineError::invalid_knots("knots must be finite and strictly increasing"));
    }

    let count = knots.len() - 1;
    let control_at = |i: usize| match controls {
        [shared] => Ok(*shared),
        _ if controls.len() == count => Ok(controls[i]),
        _ => Err(SplineError::invalid_design(format!(
            "{} controls for {count} segments",
            controls.len()
        ))),
    };

    knots
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            Segment::new(w[0], w[1], control_at(i)?)?
                .with_quadrature_panels(config.quadrature_panels)
        })
        .collect()
}

impl MultiSegmentSequence {
    /// Calibrates a sequence with the boundary condition in `config`.
    pub fn calibrate(
        name: impl Into<String>,
        knots: &[f64],
        controls: &[SegmentBuilderControl],
        inputs: &SequenceInputs,
        config: SequenceConfig,
    ) -> SplineResult<Self> {
        let builder = BoundaryConditionBuilder::from_config(&config);
        Self::calibrate_with(name, knots, controls, inputs, config, &builder)
    }

    /// Calibrates a sequence with an explicit builder strategy.
    pub fn calibrate_with(
        name: impl Into<String>,
        knots: &[f64],
        controls: &[SegmentBuilderControl],
        inputs: &SequenceInputs,
        config: SequenceConfig,
        builder: &dyn SegmentSequenceBuilder,
    ) -> SplineResult<Self> {
        config.validate_or_error()?;
        let template = template_segments(knots, controls, &config)?;
        let chain = builder.build(&template, inputs)?;
        Self::from_chain(name.into(), chain, inputs, config)
    }

    /// Interpolates one response per knot with a shared control.
    pub fn interpolate(
        name: impl Into<String>,
        knots: &[f64],
        responses: &[f64],
        control: SegmentBuilderControl,
        config: SequenceConfig,
    ) -> SplineResult<Self> {
        let inputs = SequenceInputs::knot_responses(knots, responses)?;
        Self::calibrate(name, knots, &[control], &inputs, config)
    }

    fn from_chain(
        name: String,
        chain: CalibratedChain,
        inputs: &SequenceInputs,
        config: SequenceConfig,
    ) -> SplineResult<Self> {
        let constraints = inputs.constraints().to_vec();
        let sensitivities =
            sensitivity::coefficient_sensitivities(&chain.segments, &constraints, chain.floating)?;

        debug!(
            name = %name,
            segments = chain.segments.len(),
            leading_slope = ?chain.leading_slope,
            "calibrated sequence"
        );

        Ok(Self {
            name,
            segments: chain.segments,
            constraints,
            best_fit: inputs.best_fit().cloned(),
            config,
            leading_slope: chain.leading_slope,
            floating: chain.floating,
            sensitivities,
        })
    }

    /// Recalibrates against new inputs over the same knots and controls.
    ///
    /// On failure the sequence keeps its previous state.
    pub fn recalibrate(&mut self, inputs: &SequenceInputs) -> SplineResult<()> {
        let builder = BoundaryConditionBuilder::from_config(&self.config);
        let chain = builder.build(&self.segments, inputs)?;
        *self = Self::from_chain(self.name.clone(), chain, inputs, self.config.clone())?;
        Ok(())
    }

    /// Sequence name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false: a sequence has at least one segment.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments, left to right.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment `i`.
    pub fn segment(&self, i: usize) -> Option<&Segment> {
        self.segments.get(i)
    }

    /// Knot ordinates.
    pub fn knots(&self) -> Vec<f64> {
        self.segments
            .first()
            .map(Segment::left)
            .into_iter()
            .chain(self.segments.iter().map(Segment::right))
            .collect()
    }

    /// `(first knot, last knot)`.
    pub fn domain(&self) -> (f64, f64) {
        let left = self.segments.first().map_or(f64::NAN, Segment::left);
        let right = self.segments.last().map_or(f64::NAN, Segment::right);
        (left, right)
    }

    /// Configuration the sequence was calibrated with.
    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Leading slope chosen by the boundary-condition search, if any.
    pub fn leading_slope(&self) -> Option<f64> {
        self.leading_slope
    }

    /// Boundary condition that still determines the leading slope.
    ///
    /// Modified sequences hold their leading edge fixed and report `None`.
    pub fn floating_condition(&self) -> Option<BoundaryCondition> {
        self.floating.map(|floating| floating.condition)
    }

    /// Condition and residual edge that still determine the leading slope.
    pub fn floating_slope(&self) -> Option<FloatingSlope> {
        self.floating
    }

    /// Global constraints owned by each segment.
    pub fn constraints(&self) -> &[Vec<ResponseValueConstraint>] {
        &self.constraints
    }

    /// Global best-fit set.
    pub fn best_fit(&self) -> Option<&BestFitResponse> {
        self.best_fit.as_ref()
    }

    /// Index of the segment containing `x`.
    ///
    /// Interior points match strictly; `include_left`/`include_right` also
    /// accept a segment's edges. The first matching segment wins.
    pub fn containing_index(
        &self,
        x: f64,
        include_left: bool,
        include_right: bool,
    ) -> SplineResult<usize> {
        self.segments
            .iter()
            .position(|s| {
                (x > s.left() && x < s.right())
                    || (include_left && x == s.left())
                    || (include_right && x == s.right())
            })
            .ok_or_else(|| {
                let (left, right) = self.domain();
                SplineError::out_of_domain(x, left, right)
            })
    }

    fn containing(&self, x: f64) -> SplineResult<&Segment> {
        let i = self.containing_index(x, true, true)?;
        Ok(&self.segments[i])
    }

    /// Response at `x`.
    pub fn response_value(&self, x: f64) -> SplineResult<f64> {
        self.containing(x)?.response_value(x)
    }

    /// Derivative of `order` at `x`. At a knot the left segment answers.
    pub fn derivative(&self, x: f64, order: u32) -> SplineResult<f64> {
        self.containing(x)?.derivative(x, order)
    }

    /// Value plus derivatives `1..=Ck` at `x`.
    pub fn calc_sprd(&self, x: f64) -> SplineResult<ResponseDerivatives> {
        self.containing(x)?.calc_sprd(x)
    }

    /// Integral of the response over `[a, b]`; negative if `a > b`.
    pub fn integrate(&self, a: f64, b: f64) -> SplineResult<f64> {
        if a > b {
            return Ok(-self.integrate(b, a)?);
        }
        let (left, right) = self.domain();
        for x in [a, b] {
            if !(x >= left && x <= right) {
                return Err(SplineError::out_of_domain(x, left, right));
            }
        }

        self.segments
            .iter()
            .filter_map(|s| {
                let lo = a.max(s.left());
                let hi = b.min(s.right());
                (lo < hi).then(|| s.integrate(lo, hi))
            })
            .sum()
    }

    /// Monotonicity of the segment containing `x`.
    pub fn monotone_type(&self, x: f64) -> SplineResult<Monotonicity> {
        self.containing(x)?
            .monotone_type(self.config.monotone_scan_intervals)
    }

    /// Returns true if every segment is monotonic on its own.
    pub fn is_locally_monotone(&self) -> SplineResult<bool> {
        for segment in &self.segments {
            if !segment
                .monotone_type(self.config.monotone_scan_intervals)?
                .is_monotonic()
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Returns true if the curve's shape follows measured knot responses.
    ///
    /// A monotonic segment must move in the same direction as the data
    /// across it. A segment with one interior extremum is accepted only if
    /// the data turns the same way at one of its knots.
    pub fn is_co_monotone(&self, measured: &[f64]) -> SplineResult<bool> {
        if measured.len() != self.segments.len() + 1 {
            return Err(SplineError::invalid_params(format!(
                "{} measured responses for {} knots",
                measured.len(),
                self.segments.len() + 1
            )));
        }

        // +1 for a data maximum at knot j, −1 for a minimum
        let turn = |j: usize| -> i8 {
            if j == 0 || j + 1 >= measured.len() {
                return 0;
            }
            let before = measured[j] - measured[j - 1];
            let after = measured[j + 1] - measured[j];
            match (before > 0.0, after < 0.0, before < 0.0, after > 0.0) {
                (true, true, _, _) => 1,
                (_, _, true, true) => -1,
                _ => 0,
            }
        };

        for (i, segment) in self.segments.iter().enumerate() {
            let shape = segment.monotone_type(self.config.monotone_scan_intervals)?;
            let consistent = match shape {
                Monotonicity::Monotonic | Monotonicity::Inflection => {
                    let data = measured[i + 1] - measured[i];
                    let curve = segment.response_value(segment.right())?
                        - segment.response_value(segment.left())?;
                    data * curve >= 0.0
                }
                Monotonicity::Maxima => turn(i) == 1 || turn(i + 1) == 1,
                Monotonicity::Minima => turn(i) == -1 || turn(i + 1) == -1,
                Monotonicity::NonMonotonic => false,
            };
            if !consistent {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Total roughness over all segments.
    pub fn curvature_penalty(&self) -> SplineResult<f64> {
        self.segments.iter().map(Segment::curvature_penalty).sum()
    }

    /// Weighted mean squared residual against the global best-fit set.
    pub fn best_fit_penalty(&self) -> SplineResult<f64> {
        let Some(fit) = &self.best_fit else {
            return Ok(0.0);
        };
        let mut sum = 0.0;
        for ((&x, &y), &w) in fit.ordinates().iter().zip(fit.responses()).zip(fit.weights()) {
            let residual = self.response_value(x)? - y;
            sum += w * residual * residual;
        }
        Ok(sum / fit.len() as f64)
    }

    /// Local sensitivity of `f(x)` to the responses at the two knots
    /// bounding its segment, one column per knot.
    ///
    /// Knots whose response is not a calibration row of the containing
    /// segment get zero.
    pub fn jack_d_response_d_edge_input(&self, x: f64) -> SplineResult<WengertJacobian> {
        let i = self.containing_index(x, true, true)?;
        let segment = &self.segments[i];
        let local = segment.jack_d_response_d_edge_inputs(x)?;
        let (left_row, right_row) = segment.edge_response_rows()?;

        let mut jacobian = WengertJacobian::zeros(1, self.segments.len() + 1);
        for (knot, row) in [(i, left_row), (i + 1, right_row)] {
            if let Some(row) = row {
                jacobian.accumulate(0, knot, local[row])?;
            }
        }
        Ok(jacobian)
    }

    /// Response inputs `q` in sensitivity order.
    pub fn response_inputs(&self) -> SplineResult<Vec<f64>> {
        sensitivity::response_inputs(&self.segments, &self.constraints)
    }

    /// Whole-curve sensitivity `∂f(x)/∂q`, one column per response input.
    pub fn jack_d_response_d_response_input(&self, x: f64) -> SplineResult<WengertJacobian> {
        let i = self.containing_index(x, true, true)?;
        let values = self.segments[i].jack_d_response_d_coefficients(x)?;
        let row = self.sensitivities[i].weighted_row(&values)?;
        Ok(WengertJacobian::from_row(row.as_slice()))
    }

    /// `∂c/∂q` of segment `i`.
    pub fn coefficient_sensitivity(&self, i: usize) -> Option<&WengertJacobian> {
        self.sensitivities.get(i)
    }
}
