//! Multilinear interpolation over curve sets
//!
//! Values inside the sampled range of an axis are interpolated linearly
//! between the two bracketing samples. Targets outside the range are clamped
//! to the boundary sample and flagged as extrapolated; values are never
//! projected linearly past the last sample.
//!
//! Multi-axis targets are reduced one axis at a time in a fixed order, from
//! the last declared axis to the first, so repeated calls are bit-identical.
//! In a row-major grid the last axis is the x of each digitized curve (for
//! `[temperature, current]`, one current sweep per temperature).
//!
//! Each reduction works line by line: for every fixed combination of the
//! remaining axes, only the samples present on that line are bracketed.
//! Sparse curves digitized at different x points per curve interpolate
//! without a complete grid cell; a line that does not reach the target is
//! clamped on its own.

use miette::Diagnostic;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::entities::curve::{CurveError, CurveSet, Variable};

/// Result of a single interpolation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolation {
    pub value: f64,
    /// True when at least one coordinate lay outside its axis range
    pub extrapolated: bool,
}

/// Errors raised by [`interpolate`]
#[derive(Debug, Clone, Error, Diagnostic, PartialEq)]
pub enum InterpolateError {
    #[error("invalid curve: {0}")]
    #[diagnostic(code(tdb::interpolate::invalid_curve))]
    InvalidCurve(#[from] CurveError),

    #[error("expected {expected} target coordinates, got {found}")]
    #[diagnostic(code(tdb::interpolate::dimension_mismatch))]
    DimensionMismatch { expected: usize, found: usize },

    #[error("target coordinate for '{axis}' is not finite")]
    #[diagnostic(code(tdb::interpolate::non_finite))]
    NonFiniteCoordinate { axis: Variable },
}

/// Position of a target between two samples of one axis
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bracket {
    lower: usize,
    upper: usize,
    /// Fraction of the way from `lower` to `upper`
    t: f64,
    clamped: bool,
}

impl Bracket {
    fn at(index: usize, clamped: bool) -> Self {
        Self {
            lower: index,
            upper: index,
            t: 0.0,
            clamped,
        }
    }
}

/// Locate `x` within strictly increasing `samples` (non-empty)
fn bracket(samples: &[f64], x: f64) -> Bracket {
    let last = samples.len() - 1;
    if x < samples[0] {
        return Bracket::at(0, true);
    }
    if x > samples[last] {
        return Bracket::at(last, true);
    }

    // First sample >= x; exists because x <= samples[last]
    let upper = samples.partition_point(|&s| s < x);
    if samples[upper] == x {
        return Bracket::at(upper, false);
    }

    let lower = upper - 1;
    let t = (x - samples[lower]) / (samples[upper] - samples[lower]);
    Bracket {
        lower,
        upper,
        t,
        clamped: false,
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    if t == 0.0 {
        a
    } else {
        a + (b - a) * t
    }
}

/// Interpolate `curve` at `target` (one coordinate per axis, in the curve's
/// axis order).
pub fn interpolate(curve: &CurveSet, target: &[f64]) -> Result<Interpolation, InterpolateError> {
    let axes = curve.axes();
    if axes.is_empty() {
        return Err(CurveError::NoAxes.into());
    }
    if let Some(axis) = axes.iter().find(|a| a.is_empty()) {
        return Err(CurveError::EmptyAxis {
            axis: axis.variable(),
        }
        .into());
    }
    if target.len() != axes.len() {
        return Err(InterpolateError::DimensionMismatch {
            expected: axes.len(),
            found: target.len(),
        });
    }

    if let Some((axis, _)) = axes.iter().zip(target).find(|(_, x)| !x.is_finite()) {
        return Err(InterpolateError::NonFiniteCoordinate {
            axis: axis.variable(),
        });
    }

    // Keyed by the sample indices of the axes not reduced yet
    let mut level: BTreeMap<Vec<usize>, Node> = curve
        .indexed_samples()
        .map(|(indices, value)| {
            (
                indices,
                Node {
                    value,
                    clamped: false,
                },
            )
        })
        .collect();

    for (axis, &x) in axes.iter().zip(target).rev() {
        // Entries arrive in key order, so each line is sorted along `axis`
        let mut lines: BTreeMap<Vec<usize>, (Vec<f64>, Vec<Node>)> = BTreeMap::new();
        for (key, node) in level {
            let Some((&i, rest)) = key.split_last() else {
                continue;
            };
            let line = lines.entry(rest.to_vec()).or_default();
            line.0.push(axis.samples()[i]);
            line.1.push(node);
        }

        level = lines
            .into_iter()
            .map(|(key, (xs, nodes))| (key, reduce_line(&xs, &nodes, x)))
            .collect();
    }

    let node = level
        .into_values()
        .next()
        .ok_or(InterpolateError::InvalidCurve(CurveError::NoValues))?;
    if node.clamped {
        log::debug!("target {:?} clamped to the sampled range", target);
    }

    Ok(Interpolation {
        value: node.value,
        extrapolated: node.clamped,
    })
}

/// A partially reduced value; `clamped` records whether any clamping fed into it
#[derive(Debug, Clone, Copy)]
struct Node {
    value: f64,
    clamped: bool,
}

/// Interpolate one line (`xs` strictly increasing, non-empty) at `x`
fn reduce_line(xs: &[f64], nodes: &[Node], x: f64) -> Node {
    let b = bracket(xs, x);
    let lower = nodes[b.lower];
    let upper = nodes[b.upper];
    Node {
        value: lerp(lower.value, upper.value, b.t),
        clamped: b.clamped || lower.clamped || (b.t != 0.0 && upper.clamped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::curve::{Axis, CurvePoint};
    use rand::Rng;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * (1.0 + a.abs().max(b.abs()))
    }

    fn channel_resistance() -> CurveSet {
        CurveSet::dense(
            vec![Axis::with_default_unit(Variable::Current, vec![0.0, 10.0, 20.0]).unwrap()],
            vec![0.10, 0.12, 0.18],
        )
        .unwrap()
    }

    #[test]
    fn test_interpolates_between_samples() {
        let r = interpolate(&channel_resistance(), &[5.0]).unwrap();
        assert!(approx(r.value, 0.11));
        assert!(!r.extrapolated);
    }

    #[test]
    fn test_clamps_above_range() {
        let r = interpolate(&channel_resistance(), &[25.0]).unwrap();
        assert_eq!(r.value, 0.18);
        assert!(r.extrapolated);
    }

    #[test]
    fn test_clamps_below_range() {
        let r = interpolate(&channel_resistance(), &[-3.0]).unwrap();
        assert_eq!(r.value, 0.10);
        assert!(r.extrapolated);
    }

    #[test]
    fn test_exact_sample_hit() {
        let r = interpolate(&channel_resistance(), &[10.0]).unwrap();
        assert_eq!(r.value, 0.12);
        assert!(!r.extrapolated);
        let r = interpolate(&channel_resistance(), &[20.0]).unwrap();
        assert_eq!(r.value, 0.18);
        assert!(!r.extrapolated);
    }

    #[test]
    fn test_single_sample_axis() {
        let curve = CurveSet::dense(
            vec![Axis::with_default_unit(Variable::GateResistance, vec![2.2]).unwrap()],
            vec![1.5],
        )
        .unwrap();
        let same = interpolate(&curve, &[2.2]).unwrap();
        assert_eq!(same.value, 1.5);
        assert!(!same.extrapolated);
        let other = interpolate(&curve, &[10.0]).unwrap();
        assert_eq!(other.value, 1.5);
        assert!(other.extrapolated);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = interpolate(&channel_resistance(), &[1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            InterpolateError::DimensionMismatch {
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn test_non_finite_target() {
        let err = interpolate(&channel_resistance(), &[f64::NAN]).unwrap_err();
        assert!(matches!(err, InterpolateError::NonFiniteCoordinate { .. }));
    }

    #[test]
    fn test_bilinear() {
        let t = Axis::with_default_unit(Variable::Temperature, vec![25.0, 125.0]).unwrap();
        let i = Axis::with_default_unit(Variable::Current, vec![0.0, 10.0]).unwrap();
        let curve = CurveSet::dense(vec![t, i], vec![1.0, 2.0, 3.0, 5.0]).unwrap();

        let r = interpolate(&curve, &[75.0, 5.0]).unwrap();
        // (1+2)/2 = 1.5 at 25 °C, (3+5)/2 = 4 at 125 °C, midpoint 2.75
        assert!(approx(r.value, 2.75));
        assert!(!r.extrapolated);

        let r = interpolate(&curve, &[150.0, 5.0]).unwrap();
        assert!(approx(r.value, 4.0));
        assert!(r.extrapolated);
    }

    #[test]
    fn test_sparse_clamps_per_line() {
        let i = Axis::with_default_unit(Variable::Current, vec![0.0, 10.0, 20.0]).unwrap();
        let curve = CurveSet::sparse(
            vec![i],
            vec![
                CurvePoint { at: vec![0.0], value: 1.0 },
                CurvePoint { at: vec![10.0], value: 2.0 },
            ],
        )
        .unwrap();

        let inside = interpolate(&curve, &[5.0]).unwrap();
        assert!(approx(inside.value, 1.5));
        assert!(!inside.extrapolated);

        // 20 A is on the axis but this curve stops at 10 A
        let beyond = interpolate(&curve, &[15.0]).unwrap();
        assert_eq!(beyond.value, 2.0);
        assert!(beyond.extrapolated);
    }

    fn staggered_curve() -> CurveSet {
        // 25 °C digitized at 0/10/20 A, 150 °C at 0/5/15/20 A
        let t = Axis::with_default_unit(Variable::Temperature, vec![25.0, 150.0]).unwrap();
        let i = Axis::with_default_unit(Variable::Current, vec![0.0, 5.0, 10.0, 15.0, 20.0])
            .unwrap();
        let p = |t: f64, i: f64, value: f64| CurvePoint { at: vec![t, i], value };
        CurveSet::sparse(
            vec![t, i],
            vec![
                p(25.0, 0.0, 1.0),
                p(25.0, 10.0, 2.0),
                p(25.0, 20.0, 4.0),
                p(150.0, 0.0, 1.5),
                p(150.0, 5.0, 2.0),
                p(150.0, 15.0, 3.0),
                p(150.0, 20.0, 5.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_sparse_staggered_samples_per_curve() {
        let curve = staggered_curve();

        // 2.4 on the 25 °C curve (10..20 A), 2.7 on the 150 °C curve (5..15 A)
        let r = interpolate(&curve, &[100.0, 12.0]).unwrap();
        assert!(approx(r.value, 2.4 + 0.6 * (2.7 - 2.4)), "got {}", r.value);
        assert!(!r.extrapolated);

        let r = interpolate(&curve, &[87.5, 20.0]).unwrap();
        assert!(approx(r.value, 4.5));
        assert!(!r.extrapolated);

        let r = interpolate(&curve, &[150.0, 10.0]).unwrap();
        assert!(approx(r.value, 2.5));
        assert!(!r.extrapolated);
    }

    #[test]
    fn test_sparse_clamped_curve_only_counts_when_used() {
        let t = Axis::with_default_unit(Variable::Temperature, vec![25.0, 150.0]).unwrap();
        let i = Axis::with_default_unit(Variable::Current, vec![0.0, 15.0, 20.0]).unwrap();
        let p = |t: f64, i: f64, value: f64| CurvePoint { at: vec![t, i], value };
        // The 150 °C curve stops at 15 A
        let curve = CurveSet::sparse(
            vec![t, i],
            vec![
                p(25.0, 0.0, 1.0),
                p(25.0, 20.0, 3.0),
                p(150.0, 0.0, 2.0),
                p(150.0, 15.0, 4.0),
            ],
        )
        .unwrap();

        let r = interpolate(&curve, &[25.0, 18.0]).unwrap();
        assert!(approx(r.value, 2.8));
        assert!(!r.extrapolated);

        let r = interpolate(&curve, &[100.0, 18.0]).unwrap();
        assert!(approx(r.value, 2.8 + 0.6 * (4.0 - 2.8)));
        assert!(r.extrapolated);
    }

    #[test]
    fn test_sparse_huge_axes_single_point() {
        let axes: Vec<Axis> = [Variable::Temperature, Variable::Voltage, Variable::Current]
            .iter()
            .map(|v| Axis::with_default_unit(*v, (0..70_000).map(f64::from).collect()).unwrap())
            .collect();
        let curve = CurveSet::sparse(
            axes,
            vec![CurvePoint { at: vec![1.0, 2.0, 3.0], value: 0.5 }],
        )
        .unwrap();

        let hit = interpolate(&curve, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(hit.value, 0.5);
        assert!(!hit.extrapolated);
        assert!(interpolate(&curve, &[5.0, 2.0, 3.0]).unwrap().extrapolated);
    }

    #[test]
    fn test_deterministic() {
        let curve = channel_resistance();
        let a = interpolate(&curve, &[13.7]).unwrap();
        let b = interpolate(&curve, &[13.7]).unwrap();
        assert_eq!(a.value.to_bits(), b.value.to_bits());
        assert_eq!(a.extrapolated, b.extrapolated);
    }

    fn random_axis(rng: &mut impl Rng, variable: Variable) -> Axis {
        let n = rng.random_range(1..5);
        let mut x = rng.random_range(-10.0..10.0);
        let mut samples = Vec::with_capacity(n);
        for _ in 0..n {
            samples.push(x);
            x += rng.random_range(0.5..5.0);
        }
        Axis::with_default_unit(variable, samples).unwrap()
    }

    #[test]
    fn test_between_bracketing_values() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let axis = random_axis(&mut rng, Variable::Current);
            if axis.len() < 2 {
                continue;
            }
            let values: Vec<f64> = (0..axis.len()).map(|_| rng.random_range(-5.0..5.0)).collect();
            let k = rng.random_range(0..axis.len() - 1);
            let (lo, hi) = (axis.samples()[k], axis.samples()[k + 1]);
            let x = lo + (hi - lo) * rng.random_range(0.01..0.99);
            let curve = CurveSet::dense(vec![axis], values.clone()).unwrap();

            let r = interpolate(&curve, &[x]).unwrap();
            let (a, b) = (values[k].min(values[k + 1]), values[k].max(values[k + 1]));
            assert!(r.value >= a - 1e-12 && r.value <= b + 1e-12);
            assert!(!r.extrapolated);
        }
    }

    #[test]
    fn test_axis_order_independence() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let a0 = random_axis(&mut rng, Variable::Temperature);
            let a1 = random_axis(&mut rng, Variable::Current);
            let a2 = random_axis(&mut rng, Variable::Voltage);
            let (n0, n1, n2) = (a0.len(), a1.len(), a2.len());

            let values: Vec<f64> = (0..n0 * n1 * n2)
                .map(|_| rng.random_range(-1.0..1.0))
                .collect();
            // Same data with axes permuted to (voltage, temperature, current)
            let mut permuted = Vec::with_capacity(values.len());
            for k in 0..n2 {
                for i in 0..n0 {
                    for j in 0..n1 {
                        permuted.push(values[(i * n1 + j) * n2 + k]);
                    }
                }
            }

            let target: Vec<f64> = [&a0, &a1, &a2]
                .iter()
                .map(|a| rng.random_range(a.min() - 1.0..a.max() + 1.0))
                .collect();

            let original = CurveSet::dense(vec![a0.clone(), a1.clone(), a2.clone()], values).unwrap();
            let reordered = CurveSet::dense(vec![a2, a0, a1], permuted).unwrap();

            let r1 = interpolate(&original, &target).unwrap();
            let r2 = interpolate(&reordered, &[target[2], target[0], target[1]]).unwrap();
            assert!(approx(r1.value, r2.value), "{} vs {}", r1.value, r2.value);
            assert_eq!(r1.extrapolated, r2.extrapolated);
        }
    }
}
