//! Characteristic records - one measured datasheet curve with its fixed
//! measurement conditions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::entities::curve::{CurveSet, Variable};
use crate::entities::device::DeviceError;

/// What a characteristic curve describes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum CharacteristicKind {
    /// Channel (on-state) resistance
    ChannelResistance,
    /// On-state voltage drop over current (output characteristic)
    ChannelVoltage,
    /// Turn-on switching energy
    TurnOnEnergy,
    /// Turn-off switching energy
    TurnOffEnergy,
    /// Diode reverse-recovery energy
    ReverseRecoveryEnergy,
    /// Junction-to-case transient thermal impedance
    ThermalImpedance,
    /// Output capacitance over blocking voltage
    OutputCapacitance,
}

impl CharacteristicKind {
    pub fn all() -> &'static [CharacteristicKind] {
        &[
            CharacteristicKind::ChannelResistance,
            CharacteristicKind::ChannelVoltage,
            CharacteristicKind::TurnOnEnergy,
            CharacteristicKind::TurnOffEnergy,
            CharacteristicKind::ReverseRecoveryEnergy,
            CharacteristicKind::ThermalImpedance,
            CharacteristicKind::OutputCapacitance,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CharacteristicKind::ChannelResistance => "channel-resistance",
            CharacteristicKind::ChannelVoltage => "channel-voltage",
            CharacteristicKind::TurnOnEnergy => "turn-on-energy",
            CharacteristicKind::TurnOffEnergy => "turn-off-energy",
            CharacteristicKind::ReverseRecoveryEnergy => "reverse-recovery-energy",
            CharacteristicKind::ThermalImpedance => "thermal-impedance",
            CharacteristicKind::OutputCapacitance => "output-capacitance",
        }
    }

    /// Unit used when a record does not declare one
    pub fn default_unit(&self) -> &'static str {
        match self {
            CharacteristicKind::ChannelResistance => "Ω",
            CharacteristicKind::ChannelVoltage => "V",
            CharacteristicKind::TurnOnEnergy
            | CharacteristicKind::TurnOffEnergy
            | CharacteristicKind::ReverseRecoveryEnergy => "J",
            CharacteristicKind::ThermalImpedance => "K/W",
            CharacteristicKind::OutputCapacitance => "F",
        }
    }
}

impl fmt::Display for CharacteristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CharacteristicKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "channel-resistance" | "r-channel" => Ok(CharacteristicKind::ChannelResistance),
            "channel-voltage" | "v-channel" => Ok(CharacteristicKind::ChannelVoltage),
            "turn-on-energy" | "e-on" => Ok(CharacteristicKind::TurnOnEnergy),
            "turn-off-energy" | "e-off" => Ok(CharacteristicKind::TurnOffEnergy),
            "reverse-recovery-energy" | "e-rr" => Ok(CharacteristicKind::ReverseRecoveryEnergy),
            "thermal-impedance" | "z-th" => Ok(CharacteristicKind::ThermalImpedance),
            "output-capacitance" | "c-oss" => Ok(CharacteristicKind::OutputCapacitance),
            _ => Err(format!("Unknown characteristic kind: {}", s)),
        }
    }
}

/// Which semiconductor of a package a record belongs to
///
/// Transistors carry switch curves and, for co-packed or body diodes,
/// diode curves of the same kinds (a diode channel-voltage, say). A
/// record that names no element belongs to the device's primary element.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    Switch,
    Diode,
}

impl Element {
    pub fn as_str(&self) -> &'static str {
        match self {
            Element::Switch => "switch",
            Element::Diode => "diode",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Element {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "switch" | "transistor" => Ok(Element::Switch),
            "diode" => Ok(Element::Diode),
            _ => Err(format!("Invalid element: {}. Use switch or diode", s)),
        }
    }
}

/// Fixed measurement conditions of a record (not interpolation axes)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions(BTreeMap<Variable, f64>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, variable: Variable, value: f64) -> Self {
        self.0.insert(variable, value);
        self
    }

    pub fn get(&self, variable: Variable) -> Option<f64> {
        self.0.get(&variable).copied()
    }

    pub fn contains(&self, variable: Variable) -> bool {
        self.0.contains_key(&variable)
    }

    /// Condition variables in priority order
    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Variable, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Same variables with bit-identical values
    pub fn same_as(&self, other: &Conditions) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|((ka, va), (kb, vb))| ka == kb && va.to_bits() == vb.to_bits())
    }
}

impl fmt::Display for Conditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(none)");
        }
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// One named characteristic of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicRecord {
    kind: CharacteristicKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    element: Option<Element>,

    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    conditions: Conditions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,

    curve: CurveSet,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

impl CharacteristicRecord {
    /// Create a validated record
    pub fn new(
        kind: CharacteristicKind,
        conditions: Conditions,
        unit: impl Into<String>,
        curve: CurveSet,
    ) -> Result<Self, DeviceError> {
        let record = Self {
            kind,
            element: None,
            conditions,
            unit: Some(unit.into()),
            curve,
            comment: None,
        };
        record.validate()?;
        Ok(record)
    }

    /// Assign the record to the switch or the diode of the package
    pub fn with_element(mut self, element: Element) -> Self {
        self.element = Some(element);
        self
    }

    /// Attach a free-text comment (source graph, datasheet figure, ...)
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), DeviceError> {
        for (variable, value) in self.conditions.iter() {
            if !value.is_finite() {
                return Err(DeviceError::NonFiniteCondition {
                    kind: self.kind,
                    variable,
                });
            }
            if self.curve.axis_position(variable).is_some() {
                return Err(DeviceError::ConditionIsAxis {
                    kind: self.kind,
                    variable,
                });
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> CharacteristicKind {
        self.kind
    }

    /// Element named in the file; `None` means the device's primary one
    pub fn element(&self) -> Option<Element> {
        self.element
    }

    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    pub fn unit(&self) -> &str {
        self.unit.as_deref().unwrap_or_else(|| self.kind.default_unit())
    }

    pub fn curve(&self) -> &CurveSet {
        &self.curve
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// True if this record has the same (kind, conditions) key
    pub fn same_key(&self, other: &CharacteristicRecord) -> bool {
        self.kind == other.kind && self.conditions.same_as(&other.conditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::curve::Axis;

    fn curve() -> CurveSet {
        CurveSet::dense(
            vec![Axis::with_default_unit(Variable::Current, vec![0.0, 10.0]).unwrap()],
            vec![0.1, 0.2],
        )
        .unwrap()
    }

    #[test]
    fn test_record_creation() {
        let rec = CharacteristicRecord::new(
            CharacteristicKind::ChannelResistance,
            Conditions::new().with(Variable::Temperature, 25.0),
            "Ω",
            curve(),
        )
        .unwrap()
        .with_comment("Fig. 5");

        assert_eq!(rec.kind(), CharacteristicKind::ChannelResistance);
        assert_eq!(rec.conditions().get(Variable::Temperature), Some(25.0));
        assert_eq!(rec.unit(), "Ω");
        assert_eq!(rec.comment(), Some("Fig. 5"));
    }

    #[test]
    fn test_condition_cannot_be_axis() {
        let err = CharacteristicRecord::new(
            CharacteristicKind::ChannelResistance,
            Conditions::new().with(Variable::Current, 5.0),
            "Ω",
            curve(),
        )
        .unwrap_err();
        assert!(matches!(err, DeviceError::ConditionIsAxis { .. }));
    }

    #[test]
    fn test_condition_must_be_finite() {
        let err = CharacteristicRecord::new(
            CharacteristicKind::ChannelResistance,
            Conditions::new().with(Variable::Temperature, f64::INFINITY),
            "Ω",
            curve(),
        )
        .unwrap_err();
        assert!(matches!(err, DeviceError::NonFiniteCondition { .. }));
    }

    #[test]
    fn test_kind_parsing_and_display() {
        assert_eq!(
            "e_on".parse::<CharacteristicKind>().unwrap(),
            CharacteristicKind::TurnOnEnergy
        );
        assert_eq!(CharacteristicKind::ThermalImpedance.to_string(), "thermal-impedance");
        assert!("bogus".parse::<CharacteristicKind>().is_err());
    }

    #[test]
    fn test_conditions_display_and_compare() {
        let a = Conditions::new()
            .with(Variable::GateResistance, 2.2)
            .with(Variable::Temperature, 25.0);
        let b = Conditions::new()
            .with(Variable::Temperature, 25.0)
            .with(Variable::GateResistance, 2.2);
        assert!(a.same_as(&b));
        assert_eq!(a.to_string(), "temperature=25, gate-resistance=2.2");
        assert_eq!(Conditions::new().to_string(), "(none)");
    }

    #[test]
    fn test_element_from_yaml() {
        let yaml = r#"
kind: channel-voltage
element: diode
conditions:
  temperature: 25
curve:
  axes:
    - variable: current
      samples: [0, 10]
  values: [0.7, 1.4]
"#;
        let rec: CharacteristicRecord = serde_yml::from_str(yaml).unwrap();
        assert_eq!(rec.element(), Some(Element::Diode));
        assert_eq!(rec.unit(), "V");

        let plain = CharacteristicRecord::new(
            CharacteristicKind::ChannelVoltage,
            Conditions::new(),
            "V",
            curve(),
        )
        .unwrap();
        assert_eq!(plain.element(), None);
        assert!(!serde_yml::to_string(&plain).unwrap().contains("element"));
        assert_eq!("Diode".parse::<Element>().unwrap(), Element::Diode);
        assert!("gate".parse::<Element>().is_err());
    }

    #[test]
    fn test_conditions_yaml_map() {
        let yaml = "temperature: 125\ngate-voltage: 15\n";
        let c: Conditions = serde_yml::from_str(yaml).unwrap();
        assert_eq!(c.get(Variable::GateVoltage), Some(15.0));
        assert_eq!(c.variables().collect::<Vec<_>>(), vec![Variable::Temperature, Variable::GateVoltage]);
    }
}
