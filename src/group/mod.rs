/// Sensor group state: the five parallel member sequences
pub mod sensor_group;

/// Per-member validity state machine with debounced recovery
pub mod validity;

/// Synthetic value computation over valid members
pub mod aggregate;

/// Health band classification of the synthetic value
pub mod classify;

/// Event handling and output publishing for one group
pub mod controller;

pub use classify::HealthBand;
pub use controller::{GroupController, Role};
pub use sensor_group::{AggregationMode, SensorGroup};
pub use validity::{RecoverySchedule, ValidityTracker};
