//! Point table and existence checking
//!
//! The registry is the in-process stand-in for the environment's point
//! system: every sensor reading, error signal, and published surface cell
//! lives here under its `device/control` address.

use crate::points::{PointAddress, PointValue};
use std::collections::HashMap;

/// Point-in-time existence and value access for external data points
///
/// This is the seam the discovery bootstrapper probes through; tests mock it
/// to script reachability.
#[cfg_attr(test, mockall::automock)]
pub trait PointRegistry {
    /// Whether the address currently exists and is reachable
    fn exists_and_reachable(&self, address: &PointAddress) -> bool;

    /// The most recent value published for the address, if any
    fn current_value(&self, address: &PointAddress) -> Option<PointValue>;
}

/// Display metadata attached to a published surface cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellSpec {
    /// Human-readable cell title
    pub title: String,
    /// Unit shown next to the value (e.g. "ppm")
    pub unit: Option<String>,
    /// Whether external writes to the cell are accepted
    pub readonly: bool,
}

#[derive(Debug, Clone)]
struct Point {
    value: PointValue,
    spec: Option<CellSpec>,
    error_mark: Option<PointValue>,
}

/// In-memory point table
///
/// A point exists once a value has been published for it, either by the
/// input bridge (sensor readings, error signals) or by a surface adapter
/// (published cells).
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    points: HashMap<PointAddress, Point>,
}

impl MemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a value for an address, creating the point if needed
    pub fn set_value(&mut self, address: &PointAddress, value: PointValue) {
        self.points
            .entry(address.clone())
            .and_modify(|point| point.value = value.clone())
            .or_insert(Point {
                value,
                spec: None,
                error_mark: None,
            });
    }

    /// Define a surface cell with display metadata and an initial value
    pub fn define_cell(&mut self, address: &PointAddress, spec: CellSpec, initial: PointValue) {
        self.points.insert(
            address.clone(),
            Point {
                value: initial,
                spec: Some(spec),
                error_mark: None,
            },
        );
    }

    /// Set or clear the error mark on a point
    pub fn set_error_mark(&mut self, address: &PointAddress, mark: Option<PointValue>) {
        self.points
            .entry(address.clone())
            .and_modify(|point| point.error_mark = mark.clone())
            .or_insert(Point {
                value: PointValue::Text(String::new()),
                spec: None,
                error_mark: mark,
            });
    }

    /// Current error mark on a point, if any
    pub fn error_mark(&self, address: &PointAddress) -> Option<PointValue> {
        self.points
            .get(address)
            .and_then(|point| point.error_mark.clone())
    }

    /// Display metadata of a defined cell
    pub fn cell_spec(&self, address: &PointAddress) -> Option<&CellSpec> {
        self.points.get(address).and_then(|point| point.spec.as_ref())
    }

    /// Number of known points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the table holds no points at all
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl PointRegistry for MemoryRegistry {
    fn exists_and_reachable(&self, address: &PointAddress) -> bool {
        self.points.contains_key(address)
    }

    fn current_value(&self, address: &PointAddress) -> Option<PointValue> {
        self.points.get(address).map(|point| point.value.clone())
    }
}
