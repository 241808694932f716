//! Requestable quantities and resolved results

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entities::characteristic::CharacteristicKind;

/// A quantity the resolver can produce
///
/// Base quantities map one-to-one onto a [`CharacteristicKind`]. Derived
/// quantities combine several resolved base quantities with a fixed
/// [`Formula`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quantity {
    ChannelResistance,
    ChannelVoltage,
    TurnOnEnergy,
    TurnOffEnergy,
    ReverseRecoveryEnergy,
    ThermalImpedance,
    OutputCapacitance,
    /// Turn-on plus turn-off energy
    TotalSwitchingEnergy,
    /// On-state voltage times current
    ConductionLoss,
    /// Zero-current intercept of the channel linearized at the working point
    LinearChannelVoltage,
    /// Slope of the channel linearized at the working point
    LinearChannelResistance,
    /// Energy stored in the output capacitance at the working-point voltage
    OutputEnergy,
}

/// How a quantity is computed from characteristic records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formula {
    /// Resolve a single record of this kind
    Base(CharacteristicKind),
    /// Sum of independently resolved kinds, first summand then the rest
    /// (units must agree)
    Sum(CharacteristicKind, &'static [CharacteristicKind]),
    /// Resolved kind multiplied by the working-point current
    TimesCurrent(CharacteristicKind),
    /// One term of `v(i) ≈ v0 + r·i`, fitted to a voltage-over-current kind
    Linearized(CharacteristicKind, LinearTerm),
    /// `∫ v·C(v) dv` from zero to the working-point voltage
    StoredEnergy(CharacteristicKind),
}

/// Term of a linearized channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearTerm {
    /// Voltage at zero current (`v0`)
    Offset,
    /// Differential resistance (`r`)
    Slope,
}

impl Quantity {
    pub fn all() -> &'static [Quantity] {
        &[
            Quantity::ChannelResistance,
            Quantity::ChannelVoltage,
            Quantity::TurnOnEnergy,
            Quantity::TurnOffEnergy,
            Quantity::ReverseRecoveryEnergy,
            Quantity::ThermalImpedance,
            Quantity::OutputCapacitance,
            Quantity::TotalSwitchingEnergy,
            Quantity::ConductionLoss,
            Quantity::LinearChannelVoltage,
            Quantity::LinearChannelResistance,
            Quantity::OutputEnergy,
        ]
    }

    pub fn formula(&self) -> Formula {
        match self {
            Quantity::ChannelResistance => Formula::Base(CharacteristicKind::ChannelResistance),
            Quantity::ChannelVoltage => Formula::Base(CharacteristicKind::ChannelVoltage),
            Quantity::TurnOnEnergy => Formula::Base(CharacteristicKind::TurnOnEnergy),
            Quantity::TurnOffEnergy => Formula::Base(CharacteristicKind::TurnOffEnergy),
            Quantity::ReverseRecoveryEnergy => {
                Formula::Base(CharacteristicKind::ReverseRecoveryEnergy)
            }
            Quantity::ThermalImpedance => Formula::Base(CharacteristicKind::ThermalImpedance),
            Quantity::OutputCapacitance => Formula::Base(CharacteristicKind::OutputCapacitance),
            Quantity::TotalSwitchingEnergy => Formula::Sum(
                CharacteristicKind::TurnOnEnergy,
                &[CharacteristicKind::TurnOffEnergy],
            ),
            Quantity::ConductionLoss => Formula::TimesCurrent(CharacteristicKind::ChannelVoltage),
            Quantity::LinearChannelVoltage => {
                Formula::Linearized(CharacteristicKind::ChannelVoltage, LinearTerm::Offset)
            }
            Quantity::LinearChannelResistance => {
                Formula::Linearized(CharacteristicKind::ChannelVoltage, LinearTerm::Slope)
            }
            Quantity::OutputEnergy => Formula::StoredEnergy(CharacteristicKind::OutputCapacitance),
        }
    }

    /// Characteristic kinds that must exist on a device for this quantity
    pub fn required_kinds(&self) -> Vec<CharacteristicKind> {
        match self.formula() {
            Formula::Base(kind)
            | Formula::TimesCurrent(kind)
            | Formula::Linearized(kind, _)
            | Formula::StoredEnergy(kind) => vec![kind],
            Formula::Sum(first, rest) => std::iter::once(first).chain(rest.iter().copied()).collect(),
        }
    }

    pub fn is_derived(&self) -> bool {
        !matches!(self.formula(), Formula::Base(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quantity::ChannelResistance => "channel-resistance",
            Quantity::ChannelVoltage => "channel-voltage",
            Quantity::TurnOnEnergy => "turn-on-energy",
            Quantity::TurnOffEnergy => "turn-off-energy",
            Quantity::ReverseRecoveryEnergy => "reverse-recovery-energy",
            Quantity::ThermalImpedance => "thermal-impedance",
            Quantity::OutputCapacitance => "output-capacitance",
            Quantity::TotalSwitchingEnergy => "total-switching-energy",
            Quantity::ConductionLoss => "conduction-loss",
            Quantity::LinearChannelVoltage => "linear-channel-voltage",
            Quantity::LinearChannelResistance => "linear-channel-resistance",
            Quantity::OutputEnergy => "output-energy",
        }
    }
}

impl From<CharacteristicKind> for Quantity {
    fn from(kind: CharacteristicKind) -> Self {
        match kind {
            CharacteristicKind::ChannelResistance => Quantity::ChannelResistance,
            CharacteristicKind::ChannelVoltage => Quantity::ChannelVoltage,
            CharacteristicKind::TurnOnEnergy => Quantity::TurnOnEnergy,
            CharacteristicKind::TurnOffEnergy => Quantity::TurnOffEnergy,
            CharacteristicKind::ReverseRecoveryEnergy => Quantity::ReverseRecoveryEnergy,
            CharacteristicKind::ThermalImpedance => Quantity::ThermalImpedance,
            CharacteristicKind::OutputCapacitance => Quantity::OutputCapacitance,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Quantity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "total-switching-energy" | "e-sw" | "e-total" => Ok(Quantity::TotalSwitchingEnergy),
            "conduction-loss" | "p-cond" => Ok(Quantity::ConductionLoss),
            "linear-channel-voltage" | "v-lin" => Ok(Quantity::LinearChannelVoltage),
            "linear-channel-resistance" | "r-lin" => Ok(Quantity::LinearChannelResistance),
            "output-energy" | "e-oss" => Ok(Quantity::OutputEnergy),
            _ => normalized
                .parse::<CharacteristicKind>()
                .map(Quantity::from)
                .map_err(|_| format!("Unknown quantity: {}", s)),
        }
    }
}

/// A quantity evaluated at a working point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQuantity {
    pub quantity: Quantity,
    pub value: f64,
    pub unit: String,
    /// True if any contributing axis was clamped to its sampled range
    pub extrapolated: bool,
}

impl fmt::Display for ResolvedQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} {}", self.quantity, self.value, self.unit)?;
        if self.extrapolated {
            write!(f, " (extrapolated)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_quantities_follow_kinds() {
        for kind in CharacteristicKind::all() {
            let q = Quantity::from(*kind);
            assert_eq!(q.formula(), Formula::Base(*kind));
            assert_eq!(q.as_str(), kind.as_str());
            assert!(!q.is_derived());
        }
    }

    #[test]
    fn test_derived_required_kinds() {
        assert_eq!(
            Quantity::TotalSwitchingEnergy.required_kinds(),
            vec![CharacteristicKind::TurnOnEnergy, CharacteristicKind::TurnOffEnergy]
        );
        assert_eq!(
            Quantity::ConductionLoss.required_kinds(),
            vec![CharacteristicKind::ChannelVoltage]
        );
        assert!(Quantity::ConductionLoss.is_derived());
        assert_eq!(
            Quantity::LinearChannelResistance.formula(),
            Formula::Linearized(CharacteristicKind::ChannelVoltage, LinearTerm::Slope)
        );
        assert_eq!(
            Quantity::OutputEnergy.required_kinds(),
            vec![CharacteristicKind::OutputCapacitance]
        );
    }

    #[test]
    fn test_quantity_parsing() {
        assert_eq!("e_sw".parse::<Quantity>().unwrap(), Quantity::TotalSwitchingEnergy);
        assert_eq!("e-on".parse::<Quantity>().unwrap(), Quantity::TurnOnEnergy);
        assert_eq!(
            "Channel-Resistance".parse::<Quantity>().unwrap(),
            Quantity::ChannelResistance
        );
        assert_eq!("E_oss".parse::<Quantity>().unwrap(), Quantity::OutputEnergy);
        assert_eq!("r-lin".parse::<Quantity>().unwrap(), Quantity::LinearChannelResistance);
        assert!("power".parse::<Quantity>().is_err());
    }

    #[test]
    fn test_resolved_display() {
        let r = ResolvedQuantity {
            quantity: Quantity::ChannelResistance,
            value: 0.18,
            unit: "Ω".to_string(),
            extrapolated: true,
        };
        assert_eq!(r.to_string(), "channel-resistance = 0.18 Ω (extrapolated)");
    }
}
