//! Export views - the format-agnostic result handed to serializers
//!
//! [`build_export_view`] resolves every requested (point, quantity) pair
//! once. Pairs that fail are recorded in [`ExportView::failures`] and the
//! batch carries on, so a view is a partial result whenever
//! [`ExportView::is_complete`] is false. Nothing here touches the
//! filesystem; see [`serializer`] for the writers.

pub mod serializer;

pub use serializer::{
    serializer_for, CsvSerializer, ExportError, ExportFormat, ExportSerializer, JsonSerializer,
    TemplateSerializer, YamlSerializer,
};

use serde::{Serialize, Serializer};

use crate::core::resolve::{ResolveError, WorkingPointResolver};
use crate::entities::characteristic::Element;
use crate::entities::device::{DeviceClass, DeviceRecord, Ratings};
use crate::entities::quantity::{Quantity, ResolvedQuantity};
use crate::entities::working_point::WorkingPoint;

/// Identity and ratings of the exported device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    pub part_number: String,
    pub class: DeviceClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub housing: Option<String>,
    pub ratings: Ratings,
}

impl From<&DeviceRecord> for DeviceSummary {
    fn from(device: &DeviceRecord) -> Self {
        Self {
            id: device.id().to_string(),
            name: device.name().to_string(),
            manufacturer: device.manufacturer().to_string(),
            part_number: device.part_number().to_string(),
            class: device.class(),
            housing: device.housing().map(str::to_string),
            ratings: device.ratings().clone(),
        }
    }
}

/// One resolved (point, quantity) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportEntry {
    /// Index into [`ExportView::points`]
    pub point_index: usize,
    #[serde(flatten)]
    pub resolved: ResolvedQuantity,
}

/// One (point, quantity) pair that could not be resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportFailure {
    pub point_index: usize,
    pub quantity: Quantity,
    #[serde(serialize_with = "serialize_display")]
    pub error: ResolveError,
}

fn serialize_display<S: Serializer>(error: &ResolveError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

/// Resolved quantities for a device over a list of working points
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportView {
    pub device: DeviceSummary,
    /// Switch or diode the quantities were resolved for
    pub element: Element,
    pub points: Vec<WorkingPoint>,
    pub quantities: Vec<Quantity>,
    /// Ordered by point, then by requested quantity
    pub entries: Vec<ExportEntry>,
    pub failures: Vec<ExportFailure>,
}

impl ExportView {
    /// The resolved value for a pair, if it succeeded
    pub fn get(&self, point_index: usize, quantity: Quantity) -> Option<&ResolvedQuantity> {
        self.entries
            .iter()
            .find(|e| e.point_index == point_index && e.resolved.quantity == quantity)
            .map(|e| &e.resolved)
    }

    /// The recorded failure for a pair, if it failed
    pub fn failure(&self, point_index: usize, quantity: Quantity) -> Option<&ResolveError> {
        self.failures
            .iter()
            .find(|f| f.point_index == point_index && f.quantity == quantity)
            .map(|f| &f.error)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of requested pairs
    pub fn requested(&self) -> usize {
        self.points.len() * self.quantities.len()
    }
}

/// Resolve `quantities` at every point in `points`
pub fn build_export_view(
    resolver: WorkingPointResolver<'_>,
    points: &[WorkingPoint],
    quantities: &[Quantity],
) -> ExportView {
    let device = resolver.device();

    let mut unique: Vec<Quantity> = Vec::with_capacity(quantities.len());
    for q in quantities {
        if !unique.contains(q) {
            unique.push(*q);
        }
    }

    let mut entries = Vec::new();
    let mut failures = Vec::new();
    for (point_index, point) in points.iter().enumerate() {
        for &quantity in &unique {
            match resolver.resolve(point, quantity) {
                Ok(resolved) => entries.push(ExportEntry {
                    point_index,
                    resolved,
                }),
                Err(error) => {
                    log::debug!("export pair ({}, {}) failed: {}", point_index, quantity, error);
                    failures.push(ExportFailure {
                        point_index,
                        quantity,
                        error,
                    });
                }
            }
        }
    }

    if !failures.is_empty() {
        log::info!(
            "export of {}: {} of {} pairs failed",
            device.id(),
            failures.len(),
            points.len() * unique.len()
        );
    }

    ExportView {
        device: DeviceSummary::from(device),
        element: resolver.element(),
        points: points.to_vec(),
        quantities: unique,
        entries,
        failures,
    }
}

/// Resolve every quantity the resolver's element can supply at every point
pub fn build_full_export_view(
    resolver: WorkingPointResolver<'_>,
    points: &[WorkingPoint],
) -> ExportView {
    let quantities = resolver.device().available_quantities(resolver.element());
    build_export_view(resolver, points, &quantities)
}
