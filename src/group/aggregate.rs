//! Synthetic value computation
//!
//! Combines the latest readings of the currently-valid members into one
//! value according to the group's aggregation mode. With no valid members
//! there is nothing trustworthy to publish, so no value is produced and the
//! previously published one stands.

use crate::group::sensor_group::{AggregationMode, SensorGroup};

/// Compute the group's synthetic value from its valid members
///
/// Returns `None` when no member is currently valid. The mean is rounded
/// half away from zero to the nearest integer; min and max pass the raw
/// reading through.
pub fn synthesize(group: &SensorGroup) -> Option<f64> {
    let values: Vec<f64> = group.valid_values().collect();
    if values.is_empty() {
        return None;
    }

    let result = match group.mode() {
        AggregationMode::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregationMode::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationMode::Mean => {
            let sum: f64 = values.iter().sum();
            (sum / values.len() as f64).round()
        }
    };
    Some(result)
}
