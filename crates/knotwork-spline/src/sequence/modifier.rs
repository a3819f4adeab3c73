//! Knot insertion, clipping and appending.
//!
//! Every operation returns a new sequence and leaves `self` untouched.
//! Modified sequences hold their leading edge fixed: the leading slope is
//! not re-solved, so their response-input Jacobian carries no slope term.

use tracing::debug;

use super::builder::{chained_params, restrict_constraints};
use super::sensitivity::coefficient_sensitivities;
use super::MultiSegmentSequence;
use crate::error::{SplineError, SplineResult};
use crate::penalty::BestFitResponse;
use crate::segment::{
    CalibrationParams, KnotPosition, ResponseValueConstraint, Segment, SegmentBuilderControl,
};

/// Maps a split failure at a clip boundary onto the clip error.
fn overlap_at(boundary: f64) -> impl Fn(SplineError) -> SplineError {
    move |e| match e {
        SplineError::ConstraintSplitsKnot { first, .. } => SplineError::ConstraintOverlapsBoundary {
            boundary,
            ordinate: first,
        },
        other => other,
    }
}

/// `segment`'s stored parameters with its inherited left-edge rows refreshed
/// from a recalibrated predecessor.
fn refreshed_params(
    previous: &Segment,
    segment: &Segment,
    globals: &[ResponseValueConstraint],
    calibrated: &[Segment],
) -> SplineResult<CalibrationParams> {
    let params = segment.params()?;
    let value = previous.response_value(previous.right())?;
    let derivs = previous.right_edge_derivatives(params.left_derivs().len() as u32)?;

    let responses = params
        .predictor_ordinates()
        .iter()
        .zip(params.responses())
        .map(|(&x, &y)| if x == segment.left() { value } else { y })
        .collect();
    let refreshed = CalibrationParams::new(
        params.predictor_ordinates().to_vec(),
        responses,
        derivs,
        params.right_derivs().to_vec(),
        restrict_constraints(globals, segment.left(), calibrated)?,
    )?;

    Ok(match params.best_fit() {
        Some(fit) => refreshed.with_best_fit(fit.clone()),
        None => refreshed,
    })
}

impl MultiSegmentSequence {
    /// Index of the segment strictly containing `p`.
    fn interior_segment(&self, p: f64) -> SplineResult<usize> {
        if self.knots().contains(&p) {
            return Err(SplineError::KnotExists { x: p });
        }
        self.segments
            .iter()
            .position(|s| p > s.left() && p < s.right())
            .ok_or_else(|| {
                let (left, right) = self.domain();
                SplineError::out_of_domain(p, left, right)
            })
    }

    /// Recalibrates the old segments `from..` onto a new prefix, refreshing
    /// their inherited rows and restricted constraints.
    fn rechain(
        &self,
        mut segments: Vec<Segment>,
        mut constraints: Vec<Vec<ResponseValueConstraint>>,
        from: usize,
    ) -> SplineResult<(Vec<Segment>, Vec<Vec<ResponseValueConstraint>>)> {
        for (segment, globals) in self.segments[from..].iter().zip(&self.constraints[from..]) {
            let params = match segments.last() {
                Some(previous) => refreshed_params(previous, segment, globals, &segments)?,
                None => segment.params()?.clone(),
            };
            segments.push(segment.calibrated(params)?);
            constraints.push(globals.clone());
        }
        Ok((segments, constraints))
    }

    fn modified(
        &self,
        segments: Vec<Segment>,
        constraints: Vec<Vec<ResponseValueConstraint>>,
        best_fit: Option<BestFitResponse>,
    ) -> SplineResult<Self> {
        let sensitivities = coefficient_sensitivities(&segments, &constraints, None)?;
        Ok(Self {
            name: self.name.clone(),
            segments,
            constraints,
            best_fit,
            config: self.config.clone(),
            leading_slope: self.leading_slope,
            floating: None,
            sensitivities,
        })
    }

    fn segment_like(
        &self,
        left: f64,
        right: f64,
        control: SegmentBuilderControl,
    ) -> SplineResult<Segment> {
        Segment::new(left, right, control)?.with_quadrature_panels(self.config.quadrature_panels)
    }

    /// Inserts a knot at `p` with response `y`.
    ///
    /// The containing segment's stored parameters are split around `p` and
    /// both halves recalibrated with the original control, the right half
    /// inheriting the left half's derivatives at `p`. Segments to the right
    /// are recalibrated from their own stored inputs with refreshed edges, so
    /// inserting at the curve's own value `y = f(p)` leaves it unchanged.
    pub fn insert_knot(&self, p: f64, y: f64) -> SplineResult<Self> {
        let i = self.interior_segment(p)?;
        let original = &self.segments[i];
        let (left, right) = original.split_at(p, y)?;

        let mut left_globals = Vec::new();
        let mut right_globals = Vec::new();
        let restricted_constraints = original.params()?.constraints();
        for (restricted, global) in restricted_constraints.iter().zip(&self.constraints[i]) {
            match restricted.knot_position(p) {
                KnotPosition::LeftOf => left_globals.push(global.clone()),
                KnotPosition::RightOf => right_globals.push(global.clone()),
                KnotPosition::Splits => {
                    return Err(SplineError::ConstraintSplitsKnot {
                        knot: p,
                        first: restricted.first_ordinate(),
                        last: restricted.last_ordinate(),
                    })
                }
            }
        }

        let mut segments = self.segments[..i].to_vec();
        segments.extend([left, right]);
        let mut constraints = self.constraints[..i].to_vec();
        constraints.extend([left_globals, right_globals]);

        let (segments, constraints) = self.rechain(segments, constraints, i + 1)?;
        debug!(knot = p, response = y, segment = i, "inserted knot");
        self.modified(segments, constraints, self.best_fit.clone())
    }

    /// Inserts a knot at `p` with a cardinal Hermite slope.
    ///
    /// The slope at `p` is `(1 − tension)·(f(b) − f(a))/(b − a)` over the
    /// containing segment `[a, b]`. Each half is calibrated from its two edge
    /// values and two edge slopes: the original slopes at `a` and `b` and the
    /// new slope at `p`. Constraints owned by the containing segment are
    /// replaced by the Hermite data. The Hermite slopes enter as fixed right-
    /// edge derivatives, so the response-input Jacobian treats them as
    /// constants.
    pub fn insert_cardinal_knot(&self, p: f64, y: f64, tension: f64) -> SplineResult<Self> {
        if !tension.is_finite() || !y.is_finite() {
            return Err(SplineError::invalid_params("tension and response must be finite"));
        }
        let i = self.interior_segment(p)?;
        let original = &self.segments[i];
        let (a, b) = (original.left(), original.right());

        let fa = original.response_value(a)?;
        let fb = original.response_value(b)?;
        let slope_b = original.derivative(b, 1)?;
        let slope_a = match i.checked_sub(1).map(|j| &self.segments[j]) {
            Some(previous) => previous.derivative(a, 1)?,
            None => original.derivative(a, 1)?,
        };
        let slope_p = (1.0 - tension) * (fb - fa) / (b - a);

        let control = *original.control();
        let left = self.segment_like(a, p, control)?.calibrated(CalibrationParams::new(
            vec![a, p],
            vec![fa, y],
            vec![slope_a],
            vec![slope_p],
            Vec::new(),
        )?)?;
        let right = self.segment_like(p, b, control)?.calibrated(CalibrationParams::new(
            vec![p, b],
            vec![y, fb],
            vec![slope_p],
            vec![slope_b],
            Vec::new(),
        )?)?;

        let mut segments = self.segments[..i].to_vec();
        segments.extend([left, right]);
        let mut constraints = self.constraints[..i].to_vec();
        constraints.extend([Vec::new(), Vec::new()]);

        let (segments, constraints) = self.rechain(segments, constraints, i + 1)?;
        debug!(knot = p, response = y, tension, slope = slope_p, "inserted cardinal knot");
        self.modified(segments, constraints, self.best_fit.clone())
    }

    /// Cardinal insertion with zero tension.
    pub fn insert_catmull_rom_knot(&self, p: f64, y: f64) -> SplineResult<Self> {
        self.insert_cardinal_knot(p, y, 0.0)
    }

    /// Drops everything left of `x`.
    ///
    /// A segment cut by `x` is replaced by a restricted copy calibrated from
    /// the original's value and left-edge derivatives at `x` plus its
    /// remaining inputs, so the kept part of the curve is unchanged.
    /// Constraints with ordinates on both sides of `x` fail with
    /// [`SplineError::ConstraintOverlapsBoundary`].
    pub fn clip_left(&self, x: f64) -> SplineResult<Self> {
        let (lo, hi) = self.domain();
        if x == lo {
            return Ok(self.clone());
        }
        if !(x > lo && x < hi) {
            return Err(SplineError::out_of_domain(x, lo, hi));
        }
        let i = self
            .segments
            .iter()
            .position(|s| x >= s.left() && x < s.right())
            .ok_or_else(|| SplineError::out_of_domain(x, lo, hi))?;

        for constraint in self.constraints[i..].iter().flatten() {
            if constraint.first_ordinate() < x && constraint.last_ordinate() >= x {
                return Err(SplineError::ConstraintOverlapsBoundary {
                    boundary: x,
                    ordinate: constraint.first_ordinate(),
                });
            }
        }

        let original = &self.segments[i];
        let (first, globals) = if x == original.left() {
            (original.clone(), self.constraints[i].clone())
        } else {
            let params = original.params()?;
            let (_, kept) = params
                .split_at(x, original.response_value(x)?)
                .map_err(overlap_at(x))?;
            let derivs = (1..=params.left_derivs().len() as u32)
                .map(|order| original.derivative(x, order))
                .collect::<SplineResult<Vec<_>>>()?;
            let globals = self.constraints[i]
                .iter()
                .filter(|c| c.first_ordinate() >= x)
                .cloned()
                .collect();
            let clipped =
                original.restricted(x, original.right(), kept.with_left_derivs(derivs)?)?;
            (clipped, globals)
        };

        let (segments, constraints) = self.rechain(vec![first], vec![globals], i + 1)?;
        let best_fit = self.best_fit.as_ref().map(|fit| fit.subset(x, hi, true));
        debug!(boundary = x, segments = segments.len(), "clipped left");
        self.modified(segments, constraints, best_fit.filter(|fit| !fit.is_empty()))
    }

    /// Drops everything right of `x`.
    ///
    /// A segment cut by `x` is recalibrated on `[left, x]` as a restricted
    /// copy from its stored inputs left of `x` plus the original response at
    /// `x`, so the kept part of the curve is unchanged. Constraints with
    /// ordinates on both sides of `x` fail with
    /// [`SplineError::ConstraintOverlapsBoundary`].
    pub fn clip_right(&self, x: f64) -> SplineResult<Self> {
        let (lo, hi) = self.domain();
        if x == hi {
            return Ok(self.clone());
        }
        if !(x > lo && x < hi) {
            return Err(SplineError::out_of_domain(x, lo, hi));
        }
        let i = self
            .segments
            .iter()
            .position(|s| x > s.left() && x <= s.right())
            .ok_or_else(|| SplineError::out_of_domain(x, lo, hi))?;

        for constraint in self.constraints[..=i].iter().flatten() {
            if constraint.first_ordinate() <= x && constraint.last_ordinate() > x {
                return Err(SplineError::ConstraintOverlapsBoundary {
                    boundary: x,
                    ordinate: constraint.last_ordinate(),
                });
            }
        }

        let mut segments = self.segments[..i].to_vec();
        let mut constraints = self.constraints[..i].to_vec();
        let original = &self.segments[i];
        if x == original.right() {
            segments.push(original.clone());
            constraints.push(self.constraints[i].clone());
        } else {
            let (kept, _) = original
                .params()?
                .split_at(x, original.response_value(x)?)
                .map_err(overlap_at(x))?;
            let clipped = original.restricted(original.left(), x, kept)?;
            segments.push(clipped);
            constraints.push(
                self.constraints[i]
                    .iter()
                    .filter(|c| c.last_ordinate() <= x)
                    .cloned()
                    .collect(),
            );
        }

        let best_fit = self.best_fit.as_ref().map(|fit| fit.subset(lo, x, true));
        debug!(boundary = x, segments = segments.len(), "clipped right");
        self.modified(segments, constraints, best_fit.filter(|fit| !fit.is_empty()))
    }

    /// Appends a segment `[edge, right]` calibrated against `constraint`.
    ///
    /// The new segment inherits the value and derivatives `1..=Ck` at the
    /// current right edge. `right` and every constraint ordinate must lie
    /// strictly beyond the edge and no further than `right`.
    pub fn append_segment(
        &self,
        right: f64,
        constraint: ResponseValueConstraint,
        control: SegmentBuilderControl,
    ) -> SplineResult<Self> {
        let (_, edge) = self.domain();
        if !(right > edge) {
            return Err(SplineError::ConstraintOverlapsBoundary {
                boundary: edge,
                ordinate: right,
            });
        }
        for &x in constraint.predictor_ordinates() {
            if x <= edge || x > right {
                return Err(SplineError::ConstraintOverlapsBoundary {
                    boundary: if x <= edge { edge } else { right },
                    ordinate: x,
                });
            }
        }

        let last = self
            .segments
            .last()
            .ok_or_else(|| SplineError::invalid_knots("sequence has no segments"))?;
        let segment = self.segment_like(edge, right, control)?;
        let params = chained_params(last, &segment, vec![constraint.clone()], None)?;
        let appended = segment.calibrated(params)?;

        let mut segments = self.segments.clone();
        segments.push(appended);
        let mut constraints = self.constraints.clone();
        constraints.push(vec![constraint]);

        debug!(left = edge, right, "appended segment");
        self.modified(segments, constraints, self.best_fit.clone())
    }
}
