//! Working points - the operating conditions a quantity is requested at

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::entities::curve::Variable;
use crate::entities::device::DeviceRecord;

/// Lowest physically meaningful temperature in °C
pub const ABSOLUTE_ZERO_C: f64 = -273.15;

/// Temperature used when a device declares no nominal temperature
pub const DEFAULT_TEMPERATURE_C: f64 = 25.0;

/// Operating conditions; any field may be left open
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkingPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_resistance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum WorkingPointError {
    #[error("working point value for '{variable}' is not finite")]
    #[diagnostic(code(tdb::working_point::non_finite))]
    NonFinite { variable: Variable },

    #[error("working point value for '{variable}' must not be negative, got {value}")]
    #[diagnostic(code(tdb::working_point::negative))]
    Negative { variable: Variable, value: f64 },

    #[error("temperature {value} °C is below absolute zero")]
    #[diagnostic(code(tdb::working_point::temperature))]
    BelowAbsoluteZero { value: f64 },

    #[error("cannot parse working point entry '{entry}': {reason}")]
    #[diagnostic(
        code(tdb::working_point::parse),
        help("use comma separated key=value pairs, e.g. v=400,i=20,t=125,rg=2.2")
    )]
    Parse { entry: String, reason: String },
}

impl WorkingPoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_voltage(mut self, v: f64) -> Self {
        self.voltage = Some(v);
        self
    }

    pub fn with_current(mut self, i: f64) -> Self {
        self.current = Some(i);
        self
    }

    pub fn with_temperature(mut self, t: f64) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn with_gate_resistance(mut self, rg: f64) -> Self {
        self.gate_resistance = Some(rg);
        self
    }

    pub fn with_gate_voltage(mut self, vg: f64) -> Self {
        self.gate_voltage = Some(vg);
        self
    }

    pub fn with_time(mut self, t: f64) -> Self {
        self.time = Some(t);
        self
    }

    /// Value of a variable, if set
    pub fn value(&self, variable: Variable) -> Option<f64> {
        match variable {
            Variable::Temperature => self.temperature,
            Variable::GateVoltage => self.gate_voltage,
            Variable::GateResistance => self.gate_resistance,
            Variable::Voltage => self.voltage,
            Variable::Current => self.current,
            Variable::Time => self.time,
        }
    }

    pub fn set(&mut self, variable: Variable, value: f64) {
        let slot = match variable {
            Variable::Temperature => &mut self.temperature,
            Variable::GateVoltage => &mut self.gate_voltage,
            Variable::GateResistance => &mut self.gate_resistance,
            Variable::Voltage => &mut self.voltage,
            Variable::Current => &mut self.current,
            Variable::Time => &mut self.time,
        };
        *slot = Some(value);
    }

    /// Set variables in priority order
    pub fn entries(&self) -> impl Iterator<Item = (Variable, f64)> + '_ {
        Variable::all()
            .iter()
            .filter_map(move |v| self.value(*v).map(|x| (*v, x)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    pub fn validate(&self) -> Result<(), WorkingPointError> {
        for (variable, value) in self.entries() {
            if !value.is_finite() {
                return Err(WorkingPointError::NonFinite { variable });
            }
            match variable {
                Variable::Temperature => {
                    if value < ABSOLUTE_ZERO_C {
                        return Err(WorkingPointError::BelowAbsoluteZero { value });
                    }
                }
                // gate drive may be negative at turn-off
                Variable::GateVoltage => {}
                _ => {
                    if value < 0.0 {
                        return Err(WorkingPointError::Negative { variable, value });
                    }
                }
            }
        }
        Ok(())
    }

    /// A sensible default point for a device
    ///
    /// Temperature is the nominal temperature (or 25 °C), current is the
    /// continuous rating (or half the absolute maximum), voltage is half the
    /// blocking rating. Gate drive comes from the nominal conditions.
    pub fn quickstart(device: &DeviceRecord) -> Self {
        let ratings = device.ratings();
        let nominal = device.nominal();
        Self {
            voltage: Some(ratings.v_abs_max / 2.0),
            current: Some(ratings.i_cont.unwrap_or(ratings.i_abs_max / 2.0)),
            temperature: Some(
                nominal
                    .get(Variable::Temperature)
                    .unwrap_or(DEFAULT_TEMPERATURE_C),
            ),
            gate_resistance: nominal.get(Variable::GateResistance),
            gate_voltage: nominal.get(Variable::GateVoltage),
            time: None,
        }
    }
}

impl fmt::Display for WorkingPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .entries()
            .map(|(v, x)| format!("{}={}", short_key(v), x))
            .collect();
        if parts.is_empty() {
            write!(f, "(empty)")
        } else {
            write!(f, "{}", parts.join(","))
        }
    }
}

fn short_key(variable: Variable) -> &'static str {
    match variable {
        Variable::Temperature => "t",
        Variable::GateVoltage => "vg",
        Variable::GateResistance => "rg",
        Variable::Voltage => "v",
        Variable::Current => "i",
        Variable::Time => "time",
    }
}

impl std::str::FromStr for WorkingPoint {
    type Err = WorkingPointError;

    /// Parse `v=400,i=20,t=125,rg=2.2,vg=15,time=1e-3`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut wp = WorkingPoint::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry.split_once('=').ok_or_else(|| WorkingPointError::Parse {
                entry: entry.to_string(),
                reason: "missing '='".to_string(),
            })?;
            let variable: Variable = key.trim().parse().map_err(|e: String| {
                WorkingPointError::Parse {
                    entry: entry.to_string(),
                    reason: e,
                }
            })?;
            let value: f64 = value.trim().parse().map_err(|_| WorkingPointError::Parse {
                entry: entry.to_string(),
                reason: format!("'{}' is not a number", value.trim()),
            })?;
            if wp.value(variable).is_some() {
                return Err(WorkingPointError::Parse {
                    entry: entry.to_string(),
                    reason: format!("'{}' given twice", variable),
                });
            }
            wp.set(variable, value);
        }
        wp.validate()?;
        Ok(wp)
    }
}
