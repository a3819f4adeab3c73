//! Forward propagation of `∂c/∂q` along a calibrated chain.
//!
//! The response inputs `q` are, in order, every point response that is not
//! inherited from a predecessor, followed by the segment's constraint values,
//! segment by segment. While propagating, the floating leading slope `s` is
//! carried as one extra input column and eliminated at the end with
//! `ds/dq = −(∂r/∂q)/(∂r/∂s)`, where `r` is the boundary-condition residual.
//! A residual with `∂r/∂s ≈ 0` cannot move the slope, which then stays a
//! constant of the chain.

use nalgebra::DMatrix;
use tracing::warn;

use super::boundary::{residual_terms, FloatingSlope};
use crate::error::{SplineError, SplineResult};
use crate::jacobian::WengertJacobian;
use crate::segment::{ResponseValueConstraint, Segment};

/// Residual sensitivities to the slope smaller than this leave the slope
/// as a constant.
const MIN_SLOPE_SENSITIVITY: f64 = 1e-14;

/// Returns true if point row `x` of segment `index` is inherited from the
/// predecessor rather than being a response input.
fn is_inherited(index: usize, segment: &Segment, x: f64) -> bool {
    index > 0 && x == segment.left()
}

/// Number of response inputs of a calibrated chain.
pub(crate) fn response_input_count(segments: &[Segment]) -> SplineResult<usize> {
    let mut count = 0;
    for (i, segment) in segments.iter().enumerate() {
        let params = segment.params()?;
        count += params
            .predictor_ordinates()
            .iter()
            .filter(|&&x| !is_inherited(i, segment, x))
            .count();
        count += params.constraints().len();
    }
    Ok(count)
}

/// Response input values, in sensitivity order.
pub(crate) fn response_inputs(
    segments: &[Segment],
    globals: &[Vec<ResponseValueConstraint>],
) -> SplineResult<Vec<f64>> {
    let mut inputs = Vec::new();
    for (i, (segment, constraints)) in segments.iter().zip(globals).enumerate() {
        let params = segment.params()?;
        for (&x, &y) in params.predictor_ordinates().iter().zip(params.responses()) {
            if !is_inherited(i, segment, x) {
                inputs.push(y);
            }
        }
        inputs.extend(constraints.iter().map(ResponseValueConstraint::value));
    }
    Ok(inputs)
}

/// `∂f⁽ᵏ⁾(x)/∂(q, s)` on `segment`, given its coefficient sensitivities.
fn derivative_sensitivity(
    segment: &Segment,
    sensitivity: &WengertJacobian,
    x: f64,
    order: u32,
) -> SplineResult<Vec<f64>> {
    let rows = if order == 0 {
        segment.jack_d_response_d_coefficients(x)?
    } else {
        segment.jack_d_derivative_d_coefficients(x, order)?
    };
    Ok(sensitivity.weighted_row(&rows)?.as_slice().to_vec())
}

/// Per-segment `∂c/∂q` for a calibrated chain.
///
/// `globals[i]` holds segment `i`'s constraints in global form, aligned with
/// the restricted constraints in its calibration parameters. `floating` is
/// the boundary condition that fixed the leading slope, if any.
pub(crate) fn coefficient_sensitivities(
    segments: &[Segment],
    globals: &[Vec<ResponseValueConstraint>],
    floating: Option<FloatingSlope>,
) -> SplineResult<Vec<WengertJacobian>> {
    if globals.len() != segments.len() {
        return Err(SplineError::invalid_params(format!(
            "{} constraint groups for {} segments",
            globals.len(),
            segments.len()
        )));
    }

    let inputs = response_input_count(segments)?;
    let slope = inputs;
    let mut next_input = 0;
    let mut propagated: Vec<WengertJacobian> = Vec::with_capacity(segments.len());

    for (i, (segment, constraints)) in segments.iter().zip(globals).enumerate() {
        let params = segment.params()?;
        if params.constraints().len() != constraints.len() {
            return Err(SplineError::invalid_params(format!(
                "segment {i} holds {} constraints but {} global forms",
                params.constraints().len(),
                constraints.len()
            )));
        }

        let mut rhs = WengertJacobian::zeros(segment.num_basis(), inputs + 1);
        let mut row = 0;

        for &x in params.predictor_ordinates() {
            if is_inherited(i, segment, x) {
                let previous = &segments[i - 1];
                let source =
                    derivative_sensitivity(previous, &propagated[i - 1], previous.right(), 0)?;
                rhs.accumulate_row(row, &source, 1.0)?;
            } else {
                rhs.accumulate(row, next_input, 1.0)?;
                next_input += 1;
            }
            row += 1;
        }

        for constraint in constraints {
            rhs.accumulate(row, next_input, 1.0)?;
            next_input += 1;
            for (&x, &w) in constraint
                .predictor_ordinates()
                .iter()
                .zip(constraint.response_weights())
            {
                if x >= segment.left() {
                    continue;
                }
                let owner = segments[..i].iter().position(|s| s.contains(x)).ok_or_else(|| {
                    SplineError::out_of_domain(x, segment.left(), segment.right())
                })?;
                let source = derivative_sensitivity(&segments[owner], &propagated[owner], x, 0)?;
                rhs.accumulate_row(row, &source, -w)?;
            }
            row += 1;
        }

        for order in 1..=params.left_derivs().len() as u32 {
            if i == 0 {
                if floating.is_some() && order == 1 {
                    rhs.accumulate(row, slope, 1.0)?;
                }
            } else {
                let previous = &segments[i - 1];
                let source =
                    derivative_sensitivity(previous, &propagated[i - 1], previous.right(), order)?;
                rhs.accumulate_row(row, &source, 1.0)?;
            }
            row += 1;
        }

        // Right-edge derivative and penalty rows carry no response input
        let inverse =
            WengertJacobian::from_matrix(segment.jack_d_coefficients_d_edge_inputs()?.clone());
        propagated.push(inverse.chain(&rhs)?);
    }

    let slope_row = match floating {
        Some(floating) => {
            let mut total = vec![0.0; inputs + 1];
            for term in residual_terms(floating, segments) {
                let source = derivative_sensitivity(
                    &segments[term.segment],
                    &propagated[term.segment],
                    term.x,
                    term.order,
                )?;
                for (acc, v) in total.iter_mut().zip(source) {
                    *acc += term.sign * v;
                }
            }
            let dr_ds = total[slope];
            if dr_ds.abs() < MIN_SLOPE_SENSITIVITY {
                warn!(
                    condition = %floating.condition,
                    dr_ds,
                    "boundary residual does not respond to the leading slope, holding it fixed"
                );
                None
            } else {
                Some(total[..inputs].iter().map(|v| -v / dr_ds).collect::<Vec<_>>())
            }
        }
        None => None,
    };

    Ok(propagated
        .into_iter()
        .map(|d| {
            let full = d.matrix();
            let mut reduced = DMatrix::from_fn(full.nrows(), inputs, |r, c| full[(r, c)]);
            if let Some(ds_dq) = &slope_row {
                for r in 0..full.nrows() {
                    let dc_ds = full[(r, slope)];
                    for (c, v) in ds_dq.iter().enumerate() {
                        reduced[(r, c)] += dc_ds * v;
                    }
                }
            }
            WengertJacobian::from_matrix(reduced)
        })
        .collect())
}
