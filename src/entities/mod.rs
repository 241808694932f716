//! Data model for device characterization
//!
//! - [`CurveSet`] - sampled dependent values over ordered axes
//! - [`CharacteristicRecord`] - one curve with its fixed measurement conditions
//! - [`DeviceRecord`] - identity, ratings and characteristics of one device
//! - [`WorkingPoint`] - operating conditions a quantity is requested at
//! - [`Quantity`] / [`ResolvedQuantity`] - what can be asked for and the answer

pub mod characteristic;
pub mod curve;
pub mod device;
pub mod quantity;
pub mod working_point;

pub use characteristic::{CharacteristicKind, CharacteristicRecord, Conditions};
pub use curve::{Axis, CurveError, CurvePoint, CurveSet, Variable};
pub use device::{DeviceBuilder, DeviceClass, DeviceError, DeviceRecord, Ratings};
pub use quantity::{Formula, Quantity, ResolvedQuantity};
pub use working_point::{WorkingPoint, WorkingPointError};
