//! Curve sets - sampled characteristic curves over one or more axes
//!
//! A [`CurveSet`] is an immutable grid of dependent values indexed by the
//! sampled coordinates of its axes. Grids may be dense (every node has a
//! value) or sparse (only the nodes that were actually digitized from the
//! datasheet are present).

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// An independent physical variable a curve or condition is expressed in.
///
/// Declaration order is the priority order used when narrowing fixed
/// measurement conditions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Variable {
    /// Junction temperature
    Temperature,
    /// Gate-source / gate-emitter voltage
    GateVoltage,
    /// External gate resistance
    GateResistance,
    /// Blocking / supply voltage
    Voltage,
    /// Channel current
    Current,
    /// Pulse duration (thermal impedance)
    Time,
}

impl Variable {
    pub fn all() -> &'static [Variable] {
        &[
            Variable::Temperature,
            Variable::GateVoltage,
            Variable::GateResistance,
            Variable::Voltage,
            Variable::Current,
            Variable::Time,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::Temperature => "temperature",
            Variable::GateVoltage => "gate-voltage",
            Variable::GateResistance => "gate-resistance",
            Variable::Voltage => "voltage",
            Variable::Current => "current",
            Variable::Time => "time",
        }
    }

    /// Unit assumed when an axis does not declare one
    pub fn default_unit(&self) -> &'static str {
        match self {
            Variable::Temperature => "°C",
            Variable::GateVoltage | Variable::Voltage => "V",
            Variable::GateResistance => "Ω",
            Variable::Current => "A",
            Variable::Time => "s",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Variable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "temperature" | "t" | "tj" | "t-j" => Ok(Variable::Temperature),
            "gate-voltage" | "vg" | "v-g" => Ok(Variable::GateVoltage),
            "gate-resistance" | "rg" | "r-g" => Ok(Variable::GateResistance),
            "voltage" | "v" => Ok(Variable::Voltage),
            "current" | "i" => Ok(Variable::Current),
            "time" | "tp" => Ok(Variable::Time),
            _ => Err(format!(
                "Unknown variable: {}. Use temperature, gate-voltage, gate-resistance, voltage, current, or time",
                s
            )),
        }
    }
}

/// Errors raised while building a curve set
#[derive(Debug, Clone, Error, Diagnostic, PartialEq)]
#[diagnostic(code(tdb::curve::invalid))]
pub enum CurveError {
    #[error("curve set has no axes")]
    NoAxes,

    #[error("axis '{axis}' has no samples")]
    EmptyAxis { axis: Variable },

    #[error("axis '{axis}' appears more than once")]
    DuplicateAxis { axis: Variable },

    #[error("axis '{axis}' sample {index} is not finite")]
    NonFiniteSample { axis: Variable, index: usize },

    #[error("axis '{axis}' samples must be strictly increasing (sample {index})")]
    #[diagnostic(help("sort the samples and remove duplicated coordinates"))]
    UnsortedAxis { axis: Variable, index: usize },

    #[error("value {index} is not finite")]
    NonFiniteValue { index: usize },

    #[error("expected {expected} values for the axis grid, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("point {index} has {found} coordinates, expected {expected}")]
    PointArity {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("coordinate {value} is not a sample of axis '{axis}'")]
    #[diagnostic(help("every point must lie on the declared axis samples"))]
    OffGrid { axis: Variable, value: f64 },

    #[error("point {coordinates:?} is given more than once")]
    DuplicatePoint { coordinates: Vec<f64> },

    #[error("curve set has no values")]
    NoValues,

    #[error("curve set gives both 'values' and 'points'")]
    #[diagnostic(help("use 'values' for a full grid or 'points' for a sparse one"))]
    AmbiguousValues,

    #[error("axis grid has more nodes than can be addressed")]
    #[diagnostic(help("split the curve or use fewer samples per axis"))]
    GridTooLarge,

    #[error("graph has {xs} x values but {ys} y values")]
    GraphLength { xs: usize, ys: usize },

    #[error("graph has repeated x value {value}")]
    DuplicateGraphX { value: f64 },
}

/// One independent-variable axis of a curve set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    variable: Variable,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,

    samples: Vec<f64>,
}

impl Axis {
    /// Create a validated axis
    pub fn new(
        variable: Variable,
        unit: impl Into<String>,
        samples: Vec<f64>,
    ) -> Result<Self, CurveError> {
        let axis = Self {
            variable,
            unit: Some(unit.into()),
            samples,
        };
        axis.validate()?;
        Ok(axis)
    }

    /// Create an axis in the variable's default unit
    pub fn with_default_unit(variable: Variable, samples: Vec<f64>) -> Result<Self, CurveError> {
        Self::new(variable, variable.default_unit(), samples)
    }

    fn validate(&self) -> Result<(), CurveError> {
        if self.samples.is_empty() {
            return Err(CurveError::EmptyAxis {
                axis: self.variable,
            });
        }
        for (index, s) in self.samples.iter().enumerate() {
            if !s.is_finite() {
                return Err(CurveError::NonFiniteSample {
                    axis: self.variable,
                    index,
                });
            }
            if index > 0 && *s <= self.samples[index - 1] {
                return Err(CurveError::UnsortedAxis {
                    axis: self.variable,
                    index,
                });
            }
        }
        Ok(())
    }

    pub fn variable(&self) -> Variable {
        self.variable
    }

    pub fn unit(&self) -> &str {
        self.unit
            .as_deref()
            .unwrap_or_else(|| self.variable.default_unit())
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn min(&self) -> f64 {
        self.samples[0]
    }

    pub fn max(&self) -> f64 {
        self.samples[self.samples.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Index of an exact sample coordinate
    fn index_of(&self, value: f64) -> Option<usize> {
        self.samples.binary_search_by(|s| s.total_cmp(&value)).ok()
    }
}

/// A sparse grid point as written in device files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub at: Vec<f64>,
    pub value: f64,
}

/// On-disk shape of a curve set; converted through [`CurveSet::try_from`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawCurveSet {
    axes: Vec<Axis>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    values: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    points: Option<Vec<CurvePoint>>,
}

/// Stored values of a curve set
#[derive(Debug, Clone, PartialEq)]
enum Grid {
    /// Every node, row-major with the first axis slowest
    Dense { values: Vec<f64>, strides: Vec<usize> },
    /// Only the digitized nodes, keyed by per-axis sample indices
    Sparse(BTreeMap<Vec<usize>, f64>),
}

/// Immutable collection of samples for one characteristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCurveSet", into = "RawCurveSet")]
pub struct CurveSet {
    axes: Vec<Axis>,
    grid: Grid,
}

impl CurveSet {
    /// Build a dense curve set; `values` is row-major with the first axis
    /// varying slowest.
    pub fn dense(axes: Vec<Axis>, values: Vec<f64>) -> Result<Self, CurveError> {
        validate_axes(&axes)?;
        let expected = grid_len(&axes).ok_or(CurveError::GridTooLarge)?;
        if values.len() != expected {
            return Err(CurveError::ShapeMismatch {
                expected,
                found: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(CurveError::NonFiniteValue { index });
        }
        let strides = row_major_strides(&axes);
        Ok(Self {
            axes,
            grid: Grid::Dense { values, strides },
        })
    }

    /// Build a sparse curve set from explicit grid points
    pub fn sparse(axes: Vec<Axis>, points: Vec<CurvePoint>) -> Result<Self, CurveError> {
        validate_axes(&axes)?;
        if points.is_empty() {
            return Err(CurveError::NoValues);
        }

        let mut nodes = BTreeMap::new();
        for (index, point) in points.into_iter().enumerate() {
            if point.at.len() != axes.len() {
                return Err(CurveError::PointArity {
                    index,
                    expected: axes.len(),
                    found: point.at.len(),
                });
            }
            if !point.value.is_finite() {
                return Err(CurveError::NonFiniteValue { index });
            }
            let key = axes
                .iter()
                .zip(&point.at)
                .map(|(axis, coordinate)| {
                    axis.index_of(*coordinate).ok_or(CurveError::OffGrid {
                        axis: axis.variable,
                        value: *coordinate,
                    })
                })
                .collect::<Result<Vec<usize>, CurveError>>()?;
            match nodes.entry(key) {
                Entry::Occupied(_) => {
                    return Err(CurveError::DuplicatePoint {
                        coordinates: point.at,
                    })
                }
                Entry::Vacant(slot) => {
                    slot.insert(point.value);
                }
            }
        }

        Ok(Self {
            axes,
            grid: Grid::Sparse(nodes),
        })
    }

    /// Build a one-axis curve from a digitized datasheet graph
    ///
    /// Points are sorted on x; repeated x values are rejected.
    pub fn from_graph(
        variable: Variable,
        unit: impl Into<String>,
        xs: &[f64],
        ys: &[f64],
    ) -> Result<Self, CurveError> {
        if xs.len() != ys.len() {
            return Err(CurveError::GraphLength {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        let mut pairs: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        if let Some(w) = pairs.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(CurveError::DuplicateGraphX { value: w[0].0 });
        }
        let (samples, values): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        let axis = Axis::new(variable, unit, samples)?;
        Self::dense(vec![axis], values)
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn dimensions(&self) -> usize {
        self.axes.len()
    }

    /// Position of the axis for `variable`, if the curve has one
    pub fn axis_position(&self, variable: Variable) -> Option<usize> {
        self.axes.iter().position(|a| a.variable == variable)
    }

    /// True when the curve was built from a full grid
    pub fn is_dense(&self) -> bool {
        matches!(self.grid, Grid::Dense { .. })
    }

    /// Number of stored (present) samples
    pub fn sample_count(&self) -> usize {
        match &self.grid {
            Grid::Dense { values, .. } => values.len(),
            Grid::Sparse(nodes) => nodes.len(),
        }
    }

    /// Value at grid indices (one per axis)
    pub fn value_at(&self, indices: &[usize]) -> Option<f64> {
        if indices.len() != self.axes.len()
            || indices.iter().zip(&self.axes).any(|(i, axis)| *i >= axis.len())
        {
            return None;
        }
        match &self.grid {
            Grid::Dense { values, strides } => {
                let flat: usize = indices.iter().zip(strides).map(|(i, s)| i * s).sum();
                values.get(flat).copied()
            }
            Grid::Sparse(nodes) => nodes.get(indices).copied(),
        }
    }

    /// Grid coordinates for a set of per-axis indices
    pub fn coordinates_of(&self, indices: &[usize]) -> Vec<f64> {
        indices
            .iter()
            .zip(&self.axes)
            .map(|(i, axis)| axis.samples[*i])
            .collect()
    }

    /// Every present sample as `(per-axis indices, value)`, in row-major order
    pub fn indexed_samples(&self) -> Box<dyn Iterator<Item = (Vec<usize>, f64)> + '_> {
        match &self.grid {
            Grid::Dense { values, strides } => Box::new(
                values
                    .iter()
                    .enumerate()
                    .map(move |(flat, v)| (unflatten(flat, strides), *v)),
            ),
            Grid::Sparse(nodes) => Box::new(nodes.iter().map(|(k, v)| (k.clone(), *v))),
        }
    }

    /// Every present sample as `(coordinates, value)`
    pub fn points(&self) -> impl Iterator<Item = (Vec<f64>, f64)> + '_ {
        self.indexed_samples()
            .map(move |(indices, value)| (self.coordinates_of(&indices), value))
    }

    /// Smallest and largest stored value
    pub fn value_range(&self) -> (f64, f64) {
        self.indexed_samples()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v)| {
                (lo.min(v), hi.max(v))
            })
    }
}

fn unflatten(mut flat: usize, strides: &[usize]) -> Vec<usize> {
    strides
        .iter()
        .map(|stride| {
            let i = flat / stride;
            flat %= stride;
            i
        })
        .collect()
}

/// Number of nodes in the full grid; `None` on overflow
fn grid_len(axes: &[Axis]) -> Option<usize> {
    axes.iter()
        .try_fold(1usize, |acc, axis| acc.checked_mul(axis.len()))
}

fn validate_axes(axes: &[Axis]) -> Result<(), CurveError> {
    if axes.is_empty() {
        return Err(CurveError::NoAxes);
    }
    let mut seen = BTreeSet::new();
    for axis in axes {
        axis.validate()?;
        if !seen.insert(axis.variable) {
            return Err(CurveError::DuplicateAxis {
                axis: axis.variable,
            });
        }
    }
    Ok(())
}

/// Row-major strides; callers check `grid_len` first
fn row_major_strides(axes: &[Axis]) -> Vec<usize> {
    let mut strides = vec![1; axes.len()];
    for i in (0..axes.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * axes[i + 1].len();
    }
    strides
}

impl TryFrom<RawCurveSet> for CurveSet {
    type Error = CurveError;

    fn try_from(raw: RawCurveSet) -> Result<Self, Self::Error> {
        match (raw.values, raw.points) {
            (Some(values), None) => CurveSet::dense(raw.axes, values),
            (None, Some(points)) => CurveSet::sparse(raw.axes, points),
            (Some(values), Some(points)) if points.is_empty() => {
                CurveSet::dense(raw.axes, values)
            }
            (Some(_), Some(_)) => Err(CurveError::AmbiguousValues),
            (None, None) => Err(CurveError::NoValues),
        }
    }
}

impl From<CurveSet> for RawCurveSet {
    fn from(curve: CurveSet) -> Self {
        match curve.grid {
            Grid::Dense { values, .. } => RawCurveSet {
                axes: curve.axes,
                values: Some(values),
                points: None,
            },
            Grid::Sparse(ref nodes) => {
                let points = nodes
                    .iter()
                    .map(|(indices, value)| CurvePoint {
                        at: curve.coordinates_of(indices),
                        value: *value,
                    })
                    .collect();
                RawCurveSet {
                    axes: curve.axes,
                    values: None,
                    points: Some(points),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_axis() -> Axis {
        Axis::with_default_unit(Variable::Current, vec![0.0, 10.0, 20.0]).unwrap()
    }

    #[test]
    fn test_axis_rejects_unsorted() {
        let err = Axis::with_default_unit(Variable::Current, vec![0.0, 20.0, 10.0]).unwrap_err();
        assert_eq!(
            err,
            CurveError::UnsortedAxis {
                axis: Variable::Current,
                index: 2
            }
        );
    }

    #[test]
    fn test_axis_rejects_duplicates_and_empty() {
        assert!(matches!(
            Axis::with_default_unit(Variable::Voltage, vec![1.0, 1.0]),
            Err(CurveError::UnsortedAxis { .. })
        ));
        assert!(matches!(
            Axis::with_default_unit(Variable::Voltage, vec![]),
            Err(CurveError::EmptyAxis { .. })
        ));
        assert!(matches!(
            Axis::with_default_unit(Variable::Voltage, vec![0.0, f64::NAN]),
            Err(CurveError::NonFiniteSample { .. })
        ));
    }

    #[test]
    fn test_dense_requires_matching_shape() {
        let err = CurveSet::dense(vec![current_axis()], vec![0.1, 0.2]).unwrap_err();
        assert_eq!(
            err,
            CurveError::ShapeMismatch {
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_no_axes_is_invalid() {
        assert_eq!(CurveSet::dense(vec![], vec![]).unwrap_err(), CurveError::NoAxes);
    }

    #[test]
    fn test_duplicate_axis_is_invalid() {
        let err = CurveSet::dense(vec![current_axis(), current_axis()], vec![0.0; 9]).unwrap_err();
        assert!(matches!(err, CurveError::DuplicateAxis { .. }));
    }

    #[test]
    fn test_dense_grid_indexing_is_row_major() {
        let t = Axis::with_default_unit(Variable::Temperature, vec![25.0, 125.0]).unwrap();
        let curve =
            CurveSet::dense(vec![t, current_axis()], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(curve.value_at(&[0, 2]), Some(3.0));
        assert_eq!(curve.value_at(&[1, 0]), Some(4.0));
        assert_eq!(curve.value_at(&[2, 0]), None);
        assert_eq!(curve.coordinates_of(&[1, 1]), vec![125.0, 10.0]);
    }

    #[test]
    fn test_sparse_points() {
        let curve = CurveSet::sparse(
            vec![current_axis()],
            vec![
                CurvePoint { at: vec![0.0], value: 0.1 },
                CurvePoint { at: vec![20.0], value: 0.18 },
            ],
        )
        .unwrap();
        assert!(!curve.is_dense());
        assert_eq!(curve.sample_count(), 2);
        assert_eq!(curve.value_at(&[1]), None);
        assert_eq!(curve.value_range(), (0.1, 0.18));
    }

    #[test]
    fn test_sparse_rejects_off_grid_and_duplicates() {
        let off = CurveSet::sparse(
            vec![current_axis()],
            vec![CurvePoint { at: vec![5.0], value: 0.1 }],
        );
        assert!(matches!(off, Err(CurveError::OffGrid { .. })));

        let dup = CurveSet::sparse(
            vec![current_axis()],
            vec![
                CurvePoint { at: vec![10.0], value: 0.1 },
                CurvePoint { at: vec![10.0], value: 0.2 },
            ],
        );
        assert!(matches!(dup, Err(CurveError::DuplicatePoint { .. })));

        let arity = CurveSet::sparse(
            vec![current_axis()],
            vec![CurvePoint { at: vec![10.0, 1.0], value: 0.1 }],
        );
        assert!(matches!(arity, Err(CurveError::PointArity { .. })));
    }

    #[test]
    fn test_sparse_on_huge_axes_stores_only_points() {
        let axes: Vec<Axis> = [
            Variable::Temperature,
            Variable::GateVoltage,
            Variable::Voltage,
            Variable::Current,
        ]
        .iter()
        .map(|v| Axis::with_default_unit(*v, (0..70_000).map(f64::from).collect()).unwrap())
        .collect();

        let curve = CurveSet::sparse(
            axes.clone(),
            vec![CurvePoint { at: vec![1.0, 2.0, 3.0, 4.0], value: 0.5 }],
        )
        .unwrap();
        assert_eq!(curve.sample_count(), 1);
        assert_eq!(curve.value_at(&[1, 2, 3, 4]), Some(0.5));
        assert_eq!(curve.value_at(&[0, 0, 0, 0]), None);

        // The same axes cannot be addressed as a full grid
        assert_eq!(
            CurveSet::dense(axes, vec![0.5]).unwrap_err(),
            CurveError::GridTooLarge
        );
    }

    #[test]
    fn test_from_graph_sorts_points() {
        let curve = CurveSet::from_graph(
            Variable::Current,
            "A",
            &[20.0, 0.0, 10.0],
            &[0.18, 0.10, 0.12],
        )
        .unwrap();
        assert_eq!(curve.axes()[0].samples(), &[0.0, 10.0, 20.0]);
        assert_eq!(curve.value_at(&[1]), Some(0.12));
    }

    #[test]
    fn test_from_graph_rejects_repeated_x() {
        let err = CurveSet::from_graph(Variable::Current, "A", &[1.0, 1.0], &[0.1, 0.2]);
        assert!(matches!(err, Err(CurveError::DuplicateGraphX { .. })));
    }

    #[test]
    fn test_yaml_roundtrip_dense_and_sparse() {
        let dense = CurveSet::dense(vec![current_axis()], vec![0.10, 0.12, 0.18]).unwrap();
        let yaml = serde_yml::to_string(&dense).unwrap();
        assert!(yaml.contains("values:"));
        let parsed: CurveSet = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(parsed, dense);

        let sparse = CurveSet::sparse(
            vec![current_axis()],
            vec![CurvePoint { at: vec![20.0], value: 0.18 }],
        )
        .unwrap();
        let yaml = serde_yml::to_string(&sparse).unwrap();
        assert!(yaml.contains("points:"));
        let parsed: CurveSet = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(parsed, sparse);
    }

    #[test]
    fn test_deserialize_validates() {
        let yaml = r#"
axes:
  - variable: current
    samples: [0, 20, 10]
values: [0.1, 0.2, 0.3]
"#;
        let err = serde_yml::from_str::<CurveSet>(yaml).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn test_axis_default_unit() {
        let yaml = "variable: gate-resistance\nsamples: [2.2]\n";
        let axis: Axis = serde_yml::from_str(yaml).unwrap();
        assert_eq!(axis.unit(), "Ω");
    }

    #[test]
    fn test_variable_parsing() {
        assert_eq!("tj".parse::<Variable>().unwrap(), Variable::Temperature);
        assert_eq!("gate_resistance".parse::<Variable>().unwrap(), Variable::GateResistance);
        assert!("flux".parse::<Variable>().is_err());
    }
}
