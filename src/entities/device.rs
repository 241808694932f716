//! Device records - identity, ratings and the characteristic collection
//! of one power semiconductor

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::core::identity::DeviceId;
use crate::entities::characteristic::{
    CharacteristicKind, CharacteristicRecord, Conditions, Element,
};
use crate::entities::curve::Variable;
use crate::entities::quantity::Quantity;

/// Switch technology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mosfet,
    Igbt,
    Diode,
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceClass::Mosfet => write!(f, "mosfet"),
            DeviceClass::Igbt => write!(f, "igbt"),
            DeviceClass::Diode => write!(f, "diode"),
        }
    }
}

impl std::str::FromStr for DeviceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mosfet" | "sic-mosfet" | "gan" => Ok(DeviceClass::Mosfet),
            "igbt" => Ok(DeviceClass::Igbt),
            "diode" => Ok(DeviceClass::Diode),
            _ => Err(format!(
                "Invalid device class: {}. Use mosfet, igbt, or diode",
                s
            )),
        }
    }
}

/// Absolute maximum and thermal ratings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ratings {
    /// Absolute maximum blocking voltage (V)
    pub v_abs_max: f64,

    /// Absolute maximum current (A)
    pub i_abs_max: f64,

    /// Continuous current rating (A)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i_cont: Option<f64>,

    /// Maximum junction temperature (°C)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t_j_max: Option<f64>,

    /// Case-to-heatsink thermal resistance (K/W)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r_th_cs: Option<f64>,
}

impl Ratings {
    pub fn new(v_abs_max: f64, i_abs_max: f64) -> Self {
        Self {
            v_abs_max,
            i_abs_max,
            i_cont: None,
            t_j_max: None,
            r_th_cs: None,
        }
    }

    fn validate(&self) -> Result<(), DeviceError> {
        let positive = |rating: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(DeviceError::NonPositiveRating { rating, value })
            }
        };
        positive("v_abs_max", self.v_abs_max)?;
        positive("i_abs_max", self.i_abs_max)?;
        if let Some(v) = self.i_cont {
            positive("i_cont", v)?;
        }
        if let Some(v) = self.t_j_max {
            positive("t_j_max", v)?;
        }
        if let Some(v) = self.r_th_cs {
            positive("r_th_cs", v)?;
        }
        Ok(())
    }
}

/// Errors raised while building or loading a device record
#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum DeviceError {
    #[error("device field '{field}' must not be empty")]
    #[diagnostic(code(tdb::device::empty_field))]
    EmptyField { field: &'static str },

    #[error("rating '{rating}' must be a positive number, got {value}")]
    #[diagnostic(code(tdb::device::rating))]
    NonPositiveRating { rating: &'static str, value: f64 },

    #[error("nominal condition '{variable}' is not finite")]
    #[diagnostic(code(tdb::device::nominal))]
    NonFiniteNominal { variable: Variable },

    #[error("{kind} condition '{variable}' is not finite")]
    #[diagnostic(code(tdb::device::condition))]
    NonFiniteCondition {
        kind: CharacteristicKind,
        variable: Variable,
    },

    #[error("{kind} uses '{variable}' both as a condition and as a curve axis")]
    #[diagnostic(
        code(tdb::device::condition_axis),
        help("remove the condition or drop the axis from the curve")
    )]
    ConditionIsAxis {
        kind: CharacteristicKind,
        variable: Variable,
    },

    #[error("{element} {kind} is defined more than once for conditions {conditions}")]
    #[diagnostic(code(tdb::device::duplicate))]
    DuplicateCharacteristic {
        element: Element,
        kind: CharacteristicKind,
        conditions: String,
    },

    #[error("{element} {kind} records declare different condition variables ({first} vs {second})")]
    #[diagnostic(
        code(tdb::device::inconsistent_conditions),
        help("every record of one kind must list the same condition variables")
    )]
    InconsistentConditions {
        element: Element,
        kind: CharacteristicKind,
        first: String,
        second: String,
    },

    #[error("a diode device cannot hold switch characteristics ({kind})")]
    #[diagnostic(
        code(tdb::device::element),
        help("drop `element: switch` or change the device class")
    )]
    SwitchOnDiode { kind: CharacteristicKind },
}

/// On-disk shape of a device record, validated into [`DeviceRecord`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawDevice {
    id: DeviceId,
    name: String,
    manufacturer: String,
    part_number: String,
    class: DeviceClass,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    housing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    datasheet_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    datasheet_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<String>,

    created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modified: Option<DateTime<Utc>>,

    ratings: Ratings,

    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    nominal: Conditions,

    #[serde(default)]
    characteristics: Vec<CharacteristicRecord>,
}

/// A validated, immutable device record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDevice", into = "RawDevice")]
pub struct DeviceRecord {
    id: DeviceId,
    name: String,
    manufacturer: String,
    part_number: String,
    class: DeviceClass,
    housing: Option<String>,
    datasheet_url: Option<String>,
    datasheet_version: Option<String>,
    comment: Option<String>,
    author: Option<String>,
    created: DateTime<Utc>,
    modified: Option<DateTime<Utc>>,
    ratings: Ratings,
    nominal: Conditions,
    characteristics: Vec<CharacteristicRecord>,
}

impl TryFrom<RawDevice> for DeviceRecord {
    type Error = DeviceError;

    fn try_from(raw: RawDevice) -> Result<Self, Self::Error> {
        let record = DeviceRecord {
            id: raw.id,
            name: raw.name,
            manufacturer: raw.manufacturer,
            part_number: raw.part_number,
            class: raw.class,
            housing: raw.housing,
            datasheet_url: raw.datasheet_url,
            datasheet_version: raw.datasheet_version,
            comment: raw.comment,
            author: raw.author,
            created: raw.created,
            modified: raw.modified,
            ratings: raw.ratings,
            nominal: raw.nominal,
            characteristics: raw.characteristics,
        };
        record.validate()?;
        Ok(record)
    }
}

impl From<DeviceRecord> for RawDevice {
    fn from(d: DeviceRecord) -> Self {
        RawDevice {
            id: d.id,
            name: d.name,
            manufacturer: d.manufacturer,
            part_number: d.part_number,
            class: d.class,
            housing: d.housing,
            datasheet_url: d.datasheet_url,
            datasheet_version: d.datasheet_version,
            comment: d.comment,
            author: d.author,
            created: d.created,
            modified: d.modified,
            ratings: d.ratings,
            nominal: d.nominal,
            characteristics: d.characteristics,
        }
    }
}

impl DeviceRecord {
    fn validate(&self) -> Result<(), DeviceError> {
        for (field, value) in [
            ("name", &self.name),
            ("manufacturer", &self.manufacturer),
            ("part_number", &self.part_number),
        ] {
            if value.trim().is_empty() {
                return Err(DeviceError::EmptyField { field });
            }
        }

        self.ratings.validate()?;

        for (variable, value) in self.nominal.iter() {
            if !value.is_finite() {
                return Err(DeviceError::NonFiniteNominal { variable });
            }
        }

        for (i, rec) in self.characteristics.iter().enumerate() {
            rec.validate()?;

            let element = self.element_of(rec);
            if self.class == DeviceClass::Diode && element == Element::Switch {
                return Err(DeviceError::SwitchOnDiode { kind: rec.kind() });
            }

            for earlier in &self.characteristics[..i] {
                if earlier.kind() != rec.kind() || self.element_of(earlier) != element {
                    continue;
                }
                if earlier.same_key(rec) {
                    return Err(DeviceError::DuplicateCharacteristic {
                        element,
                        kind: rec.kind(),
                        conditions: rec.conditions().to_string(),
                    });
                }
                if !earlier.conditions().variables().eq(rec.conditions().variables()) {
                    return Err(DeviceError::InconsistentConditions {
                        element,
                        kind: rec.kind(),
                        first: variable_list(earlier.conditions()),
                        second: variable_list(rec.conditions()),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn part_number(&self) -> &str {
        &self.part_number
    }

    pub fn class(&self) -> DeviceClass {
        self.class
    }

    pub fn housing(&self) -> Option<&str> {
        self.housing.as_deref()
    }

    pub fn datasheet_url(&self) -> Option<&str> {
        self.datasheet_url.as_deref()
    }

    pub fn datasheet_version(&self) -> Option<&str> {
        self.datasheet_version.as_deref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    pub fn ratings(&self) -> &Ratings {
        &self.ratings
    }

    pub fn nominal(&self) -> &Conditions {
        &self.nominal
    }

    pub fn characteristics(&self) -> &[CharacteristicRecord] {
        &self.characteristics
    }

    /// Element a record without an explicit `element` belongs to
    pub fn primary_element(&self) -> Element {
        match self.class {
            DeviceClass::Diode => Element::Diode,
            DeviceClass::Mosfet | DeviceClass::Igbt => Element::Switch,
        }
    }

    /// Effective element of one of this device's records
    pub fn element_of(&self, record: &CharacteristicRecord) -> Element {
        record.element().unwrap_or_else(|| self.primary_element())
    }

    /// All records of one kind across elements, in declaration order
    pub fn characteristics_of(
        &self,
        kind: CharacteristicKind,
    ) -> impl Iterator<Item = &CharacteristicRecord> + '_ {
        self.characteristics.iter().filter(move |c| c.kind() == kind)
    }

    /// Records of one kind belonging to `element`
    pub fn characteristics_for(
        &self,
        element: Element,
        kind: CharacteristicKind,
    ) -> impl Iterator<Item = &CharacteristicRecord> + '_ {
        self.characteristics_of(kind)
            .filter(move |c| self.element_of(c) == element)
    }

    /// The record with exactly these conditions, if any
    pub fn find(
        &self,
        element: Element,
        kind: CharacteristicKind,
        conditions: &Conditions,
    ) -> Option<&CharacteristicRecord> {
        self.characteristics_for(element, kind)
            .find(|c| c.conditions().same_as(conditions))
    }

    pub fn has_kind(&self, element: Element, kind: CharacteristicKind) -> bool {
        self.characteristics_for(element, kind).next().is_some()
    }

    /// Kinds present on this device for any element, sorted
    pub fn available_kinds(&self) -> BTreeSet<CharacteristicKind> {
        self.characteristics.iter().map(|c| c.kind()).collect()
    }

    /// Elements that carry at least one record, sorted
    pub fn elements(&self) -> BTreeSet<Element> {
        self.characteristics.iter().map(|c| self.element_of(c)).collect()
    }

    /// Every quantity of `element` whose required kinds are all present
    pub fn available_quantities(&self, element: Element) -> Vec<Quantity> {
        let kinds: BTreeSet<CharacteristicKind> = self
            .characteristics_for_element(element)
            .map(|c| c.kind())
            .collect();
        Quantity::all()
            .iter()
            .copied()
            .filter(|q| q.required_kinds().iter().all(|k| kinds.contains(k)))
            .collect()
    }

    fn characteristics_for_element(
        &self,
        element: Element,
    ) -> impl Iterator<Item = &CharacteristicRecord> + '_ {
        self.characteristics
            .iter()
            .filter(move |c| self.element_of(c) == element)
    }

    /// Copy of this record with a fresh modification timestamp
    pub fn touched(&self) -> Self {
        let mut copy = self.clone();
        copy.modified = Some(Utc::now());
        copy
    }

    /// Record `author` unless the device already names one
    pub fn with_default_author(mut self, author: impl Into<String>) -> Self {
        if self.author.is_none() {
            self.author = Some(author.into());
        }
        self
    }
}

fn variable_list(conditions: &Conditions) -> String {
    let names: Vec<&str> = conditions.variables().map(|v| v.as_str()).collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// Builder for [`DeviceRecord`]
#[derive(Debug, Clone)]
pub struct DeviceBuilder {
    raw: RawDevice,
}

impl DeviceBuilder {
    pub fn new(
        name: impl Into<String>,
        manufacturer: impl Into<String>,
        part_number: impl Into<String>,
        class: DeviceClass,
        ratings: Ratings,
    ) -> Self {
        Self {
            raw: RawDevice {
                id: DeviceId::new(),
                name: name.into(),
                manufacturer: manufacturer.into(),
                part_number: part_number.into(),
                class,
                housing: None,
                datasheet_url: None,
                datasheet_version: None,
                comment: None,
                author: None,
                created: Utc::now(),
                modified: None,
                ratings,
                nominal: Conditions::new(),
                characteristics: Vec::new(),
            },
        }
    }

    pub fn id(mut self, id: DeviceId) -> Self {
        self.raw.id = id;
        self
    }

    pub fn housing(mut self, housing: impl Into<String>) -> Self {
        self.raw.housing = Some(housing.into());
        self
    }

    pub fn datasheet(mut self, url: impl Into<String>, version: Option<String>) -> Self {
        self.raw.datasheet_url = Some(url.into());
        self.raw.datasheet_version = version;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.raw.comment = Some(comment.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.raw.author = Some(author.into());
        self
    }

    pub fn nominal(mut self, nominal: Conditions) -> Self {
        self.raw.nominal = nominal;
        self
    }

    pub fn characteristic(mut self, record: CharacteristicRecord) -> Self {
        self.raw.characteristics.push(record);
        self
    }

    pub fn build(self) -> Result<DeviceRecord, DeviceError> {
        DeviceRecord::try_from(self.raw)
    }
}
