//! Working-point resolution
//!
//! Turns a device, a working point and a requested [`Quantity`] into a
//! concrete value. Resolution happens in two steps:
//!
//! 1. **Selection** - among the records of the required kind and element,
//!    narrow the fixed measurement conditions one variable at a time in
//!    priority order (temperature, gate voltage, gate resistance, voltage,
//!    current, time). For each variable the bucket nearest to the
//!    working-point value wins; ties go to the bucket nearest the device's
//!    nominal value, then to the lowest value. A variable the working point
//!    leaves open falls back to the nominal value, or to the only bucket when
//!    there is just one. A requested value outside the measured buckets
//!    marks the result as extrapolated.
//! 2. **Interpolation** - the working point supplies one coordinate per curve
//!    axis (single-sample axes and nominal values fill gaps) and the record's
//!    curve is interpolated there.
//!
//! Derived quantities resolve each base part independently and combine them
//! with the quantity's [`Formula`].

use miette::Diagnostic;
use thiserror::Error;

use crate::core::interpolate::{interpolate, InterpolateError};
use crate::entities::characteristic::{CharacteristicKind, CharacteristicRecord, Element};
use crate::entities::curve::Variable;
use crate::entities::device::DeviceRecord;
use crate::entities::quantity::{Formula, LinearTerm, Quantity, ResolvedQuantity};
use crate::entities::working_point::{WorkingPoint, WorkingPointError};

/// Unit of the conduction-loss product
pub const POWER_UNIT: &str = "W";

/// Unit a channel-voltage record must carry to form a conduction loss or
/// a linearized channel
pub const VOLTAGE_UNIT: &str = "V";

/// Unit of the linearized channel slope
pub const RESISTANCE_UNIT: &str = "Ω";

/// Relative current step of the channel secant, `[i·(1-s), i]`
pub const LINEARIZATION_STEP: f64 = 0.1;

/// Whether a missing value was needed as a fixed condition or a curve axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Condition,
    Axis,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Condition => write!(f, "condition"),
            Role::Axis => write!(f, "axis"),
        }
    }
}

/// Errors raised while resolving a quantity
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum ResolveError {
    #[error("device {device} has no {element} {kind} characteristic (needed for {quantity})")]
    #[diagnostic(
        code(tdb::resolve::not_found),
        help("choose another quantity or add the characteristic to the device")
    )]
    CharacteristicNotFound {
        device: String,
        element: Element,
        kind: CharacteristicKind,
        quantity: Quantity,
    },

    #[error("device {device}: {kind} needs a value for {role} '{variable}' and no default exists")]
    #[diagnostic(
        code(tdb::resolve::incomplete),
        help("add the value to the working point or set a nominal value on the device")
    )]
    IncompleteWorkingPoint {
        device: String,
        kind: CharacteristicKind,
        variable: Variable,
        role: Role,
    },

    #[error("device {device}: invalid working point for {quantity}: {source}")]
    #[diagnostic(code(tdb::resolve::invalid_working_point))]
    InvalidWorkingPoint {
        device: String,
        quantity: Quantity,
        #[source]
        source: WorkingPointError,
    },

    #[error("device {device}: {quantity} is undefined at {variable} = {value}")]
    #[diagnostic(
        code(tdb::resolve::degenerate),
        help("the channel can only be linearized at a current above zero")
    )]
    DegenerateWorkingPoint {
        device: String,
        quantity: Quantity,
        variable: Variable,
        value: f64,
    },

    #[error("device {device}: {kind} is in '{found}' but {quantity} needs '{expected}'")]
    #[diagnostic(code(tdb::resolve::unit_mismatch))]
    UnitMismatch {
        device: String,
        kind: CharacteristicKind,
        quantity: Quantity,
        expected: String,
        found: String,
    },

    #[error("device {device}: cannot interpolate {kind} at conditions {conditions}: {source}")]
    #[diagnostic(code(tdb::resolve::interpolation))]
    Interpolation {
        device: String,
        kind: CharacteristicKind,
        conditions: String,
        #[source]
        source: InterpolateError,
    },
}

impl ResolveError {
    /// Characteristic kind the error is attributed to, if a single one
    pub fn kind(&self) -> Option<CharacteristicKind> {
        match self {
            ResolveError::CharacteristicNotFound { kind, .. }
            | ResolveError::IncompleteWorkingPoint { kind, .. }
            | ResolveError::UnitMismatch { kind, .. }
            | ResolveError::Interpolation { kind, .. } => Some(*kind),
            ResolveError::InvalidWorkingPoint { .. }
            | ResolveError::DegenerateWorkingPoint { .. } => None,
        }
    }
}

/// A single base kind evaluated at a working point
#[derive(Debug, Clone, PartialEq)]
struct Part {
    value: f64,
    unit: String,
    extrapolated: bool,
}

/// Selected record plus whether a requested condition lay outside the
/// measured buckets
struct Selection<'a> {
    record: &'a CharacteristicRecord,
    outside: bool,
}

/// Resolves quantities against one element of one device
#[derive(Debug, Clone, Copy)]
pub struct WorkingPointResolver<'a> {
    device: &'a DeviceRecord,
    element: Element,
}

impl<'a> WorkingPointResolver<'a> {
    /// Resolver for the device's primary element
    pub fn new(device: &'a DeviceRecord) -> Self {
        Self {
            device,
            element: device.primary_element(),
        }
    }

    /// Resolve against the switch or the diode instead
    pub fn with_element(mut self, element: Element) -> Self {
        self.element = element;
        self
    }

    pub fn device(&self) -> &'a DeviceRecord {
        self.device
    }

    pub fn element(&self) -> Element {
        self.element
    }

    fn device_label(&self) -> String {
        self.device.id().to_string()
    }

    /// Resolve one quantity at `wp`
    pub fn resolve(
        &self,
        wp: &WorkingPoint,
        quantity: Quantity,
    ) -> Result<ResolvedQuantity, ResolveError> {
        wp.validate()
            .map_err(|source| ResolveError::InvalidWorkingPoint {
                device: self.device_label(),
                quantity,
                source,
            })?;

        // Fail on any absent part before resolving the others
        for kind in quantity.required_kinds() {
            if !self.device.has_kind(self.element, kind) {
                return Err(self.not_found(kind, quantity));
            }
        }

        let part = match quantity.formula() {
            Formula::Base(kind) => self.resolve_kind(kind, quantity, wp)?,
            Formula::Sum(first, rest) => {
                let mut total = self.resolve_kind(first, quantity, wp)?;
                for &kind in rest {
                    let part = self.resolve_kind(kind, quantity, wp)?;
                    if part.unit != total.unit {
                        return Err(ResolveError::UnitMismatch {
                            device: self.device_label(),
                            kind,
                            quantity,
                            expected: total.unit,
                            found: part.unit,
                        });
                    }
                    total.value += part.value;
                    total.extrapolated |= part.extrapolated;
                }
                total
            }
            Formula::TimesCurrent(kind) => {
                let current = self.required(wp, kind, Variable::Current)?;
                let part = self.resolve_kind(kind, quantity, wp)?;
                self.expect_unit(kind, quantity, &part.unit, VOLTAGE_UNIT)?;
                Part {
                    value: part.value * current,
                    unit: POWER_UNIT.to_string(),
                    extrapolated: part.extrapolated,
                }
            }
            Formula::Linearized(kind, term) => self.linearize(kind, term, quantity, wp)?,
            Formula::StoredEnergy(kind) => self.stored_energy(kind, quantity, wp)?,
        };

        Ok(ResolvedQuantity {
            quantity,
            value: part.value,
            unit: part.unit,
            extrapolated: part.extrapolated,
        })
    }

    /// Resolve every quantity the element can supply, in [`Quantity::all`]
    /// order. Failures are returned alongside the successes.
    pub fn resolve_all(
        &self,
        wp: &WorkingPoint,
    ) -> Vec<(Quantity, Result<ResolvedQuantity, ResolveError>)> {
        self.device
            .available_quantities(self.element)
            .into_iter()
            .map(|q| (q, self.resolve(wp, q)))
            .collect()
    }

    /// Pick the record of `kind` whose conditions best match `wp`
    pub fn select_characteristic(
        &self,
        kind: CharacteristicKind,
        wp: &WorkingPoint,
    ) -> Result<&'a CharacteristicRecord, ResolveError> {
        self.select(kind, Quantity::from(kind), wp)
            .map(|selection| selection.record)
    }

    fn not_found(&self, kind: CharacteristicKind, quantity: Quantity) -> ResolveError {
        ResolveError::CharacteristicNotFound {
            device: self.device_label(),
            element: self.element,
            kind,
            quantity,
        }
    }

    fn required(
        &self,
        wp: &WorkingPoint,
        kind: CharacteristicKind,
        variable: Variable,
    ) -> Result<f64, ResolveError> {
        wp.value(variable)
            .ok_or_else(|| ResolveError::IncompleteWorkingPoint {
                device: self.device_label(),
                kind,
                variable,
                role: Role::Axis,
            })
    }

    fn expect_unit(
        &self,
        kind: CharacteristicKind,
        quantity: Quantity,
        found: &str,
        expected: &str,
    ) -> Result<(), ResolveError> {
        if found == expected {
            Ok(())
        } else {
            Err(ResolveError::UnitMismatch {
                device: self.device_label(),
                kind,
                quantity,
                expected: expected.to_string(),
                found: found.to_string(),
            })
        }
    }

    fn select(
        &self,
        kind: CharacteristicKind,
        quantity: Quantity,
        wp: &WorkingPoint,
    ) -> Result<Selection<'a>, ResolveError> {
        let mut candidates: Vec<&'a CharacteristicRecord> = self
            .device
            .characteristics_for(self.element, kind)
            .collect();
        let Some(first) = candidates.first() else {
            return Err(self.not_found(kind, quantity));
        };

        // Every record of a kind shares the same condition variables
        let variables: Vec<Variable> = first.conditions().variables().collect();
        let nominal = self.device.nominal();
        let mut outside = false;

        for variable in variables {
            let mut buckets: Vec<f64> = candidates
                .iter()
                .filter_map(|c| c.conditions().get(variable))
                .collect();
            buckets.sort_by(f64::total_cmp);
            buckets.dedup();

            let chosen = choose_bucket(&buckets, wp.value(variable), nominal.get(variable))
                .ok_or_else(|| ResolveError::IncompleteWorkingPoint {
                    device: self.device_label(),
                    kind,
                    variable,
                    role: Role::Condition,
                })?;

            if let Some(wanted) = wp.value(variable) {
                if outside_buckets(&buckets, wanted) {
                    outside = true;
                    log::debug!(
                        "{}: {} {} {} outside measured range, using {}",
                        self.device_label(),
                        kind,
                        variable,
                        wanted,
                        chosen
                    );
                } else if wanted != chosen {
                    log::debug!(
                        "{}: {} using nearest {} bucket {} for requested {}",
                        self.device_label(),
                        kind,
                        variable,
                        chosen,
                        wanted
                    );
                }
            }

            candidates.retain(|c| c.conditions().get(variable) == Some(chosen));
        }

        let record = candidates
            .first()
            .copied()
            .ok_or_else(|| self.not_found(kind, quantity))?;
        Ok(Selection { record, outside })
    }

    fn resolve_kind(
        &self,
        kind: CharacteristicKind,
        quantity: Quantity,
        wp: &WorkingPoint,
    ) -> Result<Part, ResolveError> {
        let selection = self.select(kind, quantity, wp)?;
        let mut part = self.evaluate(kind, selection.record, wp)?;
        part.extrapolated |= selection.outside;
        Ok(part)
    }

    /// Interpolate an already selected record at `wp`
    fn evaluate(
        &self,
        kind: CharacteristicKind,
        record: &CharacteristicRecord,
        wp: &WorkingPoint,
    ) -> Result<Part, ResolveError> {
        let nominal = self.device.nominal();

        let mut target = Vec::with_capacity(record.curve().dimensions());
        for axis in record.curve().axes() {
            let variable = axis.variable();
            let value = match (wp.value(variable), axis.samples()) {
                (Some(v), _) => v,
                (None, [only]) => *only,
                (None, _) => {
                    nominal
                        .get(variable)
                        .ok_or_else(|| ResolveError::IncompleteWorkingPoint {
                            device: self.device_label(),
                            kind,
                            variable,
                            role: Role::Axis,
                        })?
                }
            };
            target.push(value);
        }

        let result =
            interpolate(record.curve(), &target).map_err(|source| ResolveError::Interpolation {
                device: self.device_label(),
                kind,
                conditions: record.conditions().to_string(),
                source,
            })?;

        log::debug!(
            "{}: {} {} at {:?} [{}] = {} {}{}",
            self.device_label(),
            self.element,
            kind,
            target,
            record.conditions(),
            result.value,
            record.unit(),
            if result.extrapolated { " (clamped)" } else { "" }
        );

        Ok(Part {
            value: result.value,
            unit: record.unit().to_string(),
            extrapolated: result.extrapolated,
        })
    }

    /// Fit `v(i) ≈ v0 + r·i` through the channel curve at the working
    /// current and one relative step below it
    fn linearize(
        &self,
        kind: CharacteristicKind,
        term: LinearTerm,
        quantity: Quantity,
        wp: &WorkingPoint,
    ) -> Result<Part, ResolveError> {
        let current = self.required(wp, kind, Variable::Current)?;
        if current <= 0.0 {
            return Err(ResolveError::DegenerateWorkingPoint {
                device: self.device_label(),
                quantity,
                variable: Variable::Current,
                value: current,
            });
        }

        // Both evaluations use the record chosen for the requested point
        let selection = self.select(kind, quantity, wp)?;
        let step = current * LINEARIZATION_STEP;
        let at = self.evaluate(kind, selection.record, wp)?;
        let below = self.evaluate(kind, selection.record, &wp.with_current(current - step))?;
        self.expect_unit(kind, quantity, &at.unit, VOLTAGE_UNIT)?;

        let slope = (at.value - below.value) / step;
        let (value, unit) = match term {
            LinearTerm::Slope => (slope, RESISTANCE_UNIT),
            LinearTerm::Offset => (at.value - slope * current, VOLTAGE_UNIT),
        };
        Ok(Part {
            value,
            unit: unit.to_string(),
            extrapolated: selection.outside || at.extrapolated || below.extrapolated,
        })
    }

    /// Trapezoidal `∫ v·C(v) dv` from zero to the working-point voltage,
    /// with nodes at every voltage sample of the capacitance curve
    fn stored_energy(
        &self,
        kind: CharacteristicKind,
        quantity: Quantity,
        wp: &WorkingPoint,
    ) -> Result<Part, ResolveError> {
        let voltage = self.required(wp, kind, Variable::Voltage)?;
        let selection = self.select(kind, quantity, wp)?;
        let record = selection.record;
        let unit = energy_unit(record.unit()).ok_or_else(|| ResolveError::UnitMismatch {
            device: self.device_label(),
            kind,
            quantity,
            expected: "F".to_string(),
            found: record.unit().to_string(),
        })?;

        let mut nodes: Vec<f64> = record
            .curve()
            .axis_position(Variable::Voltage)
            .map(|pos| {
                record.curve().axes()[pos]
                    .samples()
                    .iter()
                    .copied()
                    .filter(|v| *v > 0.0 && *v < voltage)
                    .collect()
            })
            .unwrap_or_default();
        if voltage > 0.0 {
            nodes.push(voltage);
        }

        let mut energy = 0.0;
        let mut extrapolated = selection.outside;
        let (mut prev_v, mut prev_f) = (0.0, 0.0);
        for v in nodes {
            let c = self.evaluate(kind, record, &wp.with_voltage(v))?;
            extrapolated |= c.extrapolated;
            let f = v * c.value;
            energy += (v - prev_v) * (f + prev_f) / 2.0;
            prev_v = v;
            prev_f = f;
        }

        Ok(Part {
            value: energy,
            unit,
            extrapolated,
        })
    }
}

/// Resolve `quantity` for `device` at `wp`
pub fn resolve(
    device: &DeviceRecord,
    wp: &WorkingPoint,
    quantity: Quantity,
) -> Result<ResolvedQuantity, ResolveError> {
    WorkingPointResolver::new(device).resolve(wp, quantity)
}

/// Choose a bucket from sorted, distinct `buckets`
fn choose_bucket(buckets: &[f64], wanted: Option<f64>, nominal: Option<f64>) -> Option<f64> {
    let distance = |reference: Option<f64>, b: f64| reference.map_or(0.0, |r| (b - r).abs());

    match (wanted, nominal) {
        (Some(_), _) | (None, Some(_)) => {
            let primary = wanted.or(nominal);
            let secondary = if wanted.is_some() { nominal } else { None };
            buckets.iter().copied().min_by(|a, b| {
                distance(primary, *a)
                    .total_cmp(&distance(primary, *b))
                    .then_with(|| distance(secondary, *a).total_cmp(&distance(secondary, *b)))
                    .then_with(|| a.total_cmp(b))
            })
        }
        (None, None) => match buckets {
            [only] => Some(*only),
            _ => None,
        },
    }
}

/// True if `wanted` lies below the lowest or above the highest bucket
fn outside_buckets(buckets: &[f64], wanted: f64) -> bool {
    match (buckets.first(), buckets.last()) {
        (Some(lo), Some(hi)) => wanted < *lo || wanted > *hi,
        _ => false,
    }
}

/// Energy unit matching a capacitance unit: `F` → `J`, `pF` → `pJ`, ...
fn energy_unit(capacitance: &str) -> Option<String> {
    capacitance
        .strip_suffix('F')
        .map(|prefix| format!("{}J", prefix))
}
