//! Published control surface for a sensor group
//!
//! Exposes the group's outputs (synthetic value, health band, member count,
//! per-member raw values) and the aggregation-mode selector as cells of the
//! group's display surface inside the point table. Cell writes go through
//! here; the mode-selector read path is wired through the event bus by the
//! group controller.

use crate::group::classify::HealthBand;
use crate::group::sensor_group::{AggregationMode, SensorGroup};
use crate::points::{PointAddress, PointValue};
use crate::registry::{CellSpec, MemoryRegistry, PointRegistry};
use log::debug;
use std::sync::{Arc, Mutex};

/// Cell holding the synthetic value
pub const CELL_AVERAGE: &str = "average";
/// Cell holding the health band code
pub const CELL_STATE: &str = "state";
/// Read-write cell selecting the aggregation mode
pub const CELL_MODE: &str = "typeAVG";
/// Cell holding the admitted member count
pub const CELL_QTY: &str = "qtyCO2";

/// Marker published on the synthetic-value cell while no member is trusted
const GROUP_ALARM_MARK: &str = "r";

/// Handle to one group's published cells
#[derive(Debug)]
pub struct Surface {
    device: String,
    average: PointAddress,
    state: PointAddress,
    mode: PointAddress,
    quantity: PointAddress,
    member_cells: Vec<PointAddress>,
    registry: Arc<Mutex<MemoryRegistry>>,
}

impl Surface {
    /// Create the published cells for a bootstrapped group
    ///
    /// Defines the four fixed cells plus one read-only value cell per
    /// admitted member, seeded from the member's current reading. A member
    /// whose error signal already carries an asserted value has its error
    /// mirror seeded too.
    pub fn create(registry: Arc<Mutex<MemoryRegistry>>, group: &SensorGroup) -> Self {
        let device = group.display_name().to_string();
        let surface = Self {
            average: cell_address(&device, CELL_AVERAGE),
            state: cell_address(&device, CELL_STATE),
            mode: cell_address(&device, CELL_MODE),
            quantity: cell_address(&device, CELL_QTY),
            member_cells: (0..group.member_count())
                .map(|i| cell_address(&device, group.exposed_name(i)))
                .collect(),
            device,
            registry,
        };

        {
            let mut table = surface.registry.lock().unwrap();
            table.define_cell(
                &surface.average,
                CellSpec {
                    title: "Average value".to_string(),
                    unit: Some("ppm".to_string()),
                    readonly: true,
                },
                PointValue::Number(0.0),
            );
            table.define_cell(
                &surface.state,
                CellSpec {
                    title: "Health state".to_string(),
                    unit: None,
                    readonly: true,
                },
                PointValue::Number(0.0),
            );
            table.define_cell(
                &surface.mode,
                CellSpec {
                    title: "Aggregation mode".to_string(),
                    unit: None,
                    readonly: false,
                },
                PointValue::Number(f64::from(group.mode().code())),
            );
            table.define_cell(
                &surface.quantity,
                CellSpec {
                    title: "CO2 sensor count".to_string(),
                    unit: None,
                    readonly: true,
                },
                PointValue::Number(group.member_count() as f64),
            );

            for (i, cell) in surface.member_cells.iter().enumerate() {
                table.define_cell(
                    cell,
                    CellSpec {
                        title: group.members()[i].to_string(),
                        unit: Some("ppm".to_string()),
                        readonly: true,
                    },
                    PointValue::Number(group.latest_value(i)),
                );
                // Error indicators retained from before bootstrap are carried over.
                if let Some(mark) = table
                    .current_value(&group.error_signals()[i])
                    .filter(|value| value.is_truthy())
                {
                    table.set_error_mark(cell, Some(mark));
                }
            }
        }

        debug!(
            "[{}] published surface with {} member cell(s)",
            surface.device,
            surface.member_cells.len()
        );
        surface
    }

    /// Name of the display surface
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Address of the mode-selector cell, for bus registration
    pub fn mode_address(&self) -> &PointAddress {
        &self.mode
    }

    /// Publish a new synthetic value
    pub fn publish_average(&self, value: f64) {
        self.registry
            .lock()
            .unwrap()
            .set_value(&self.average, PointValue::Number(value));
    }

    /// Publish the health band derived from the synthetic value
    pub fn publish_state(&self, band: HealthBand) {
        self.registry
            .lock()
            .unwrap()
            .set_value(&self.state, PointValue::Number(f64::from(band.code())));
    }

    /// Mirror the accepted aggregation mode back onto the selector cell
    pub fn publish_mode(&self, mode: AggregationMode) {
        self.registry
            .lock()
            .unwrap()
            .set_value(&self.mode, PointValue::Number(f64::from(mode.code())));
    }

    /// Publish a member's raw reading on its value cell
    pub fn publish_member_value(&self, member: usize, value: f64) {
        self.registry
            .lock()
            .unwrap()
            .set_value(&self.member_cells[member], PointValue::Number(value));
    }

    /// Set or clear the error mirror on a member's value cell
    pub fn set_member_error(&self, member: usize, mark: Option<PointValue>) {
        self.registry
            .lock()
            .unwrap()
            .set_error_mark(&self.member_cells[member], mark);
    }

    /// Set or clear the persistent group alarm on the synthetic-value cell
    pub fn set_group_alarm(&self, active: bool) {
        let mark = active.then(|| PointValue::Text(GROUP_ALARM_MARK.to_string()));
        self.registry
            .lock()
            .unwrap()
            .set_error_mark(&self.average, mark);
    }
}

fn cell_address(device: &str, cell: &str) -> PointAddress {
    // Group names are validated non-empty before a surface is created.
    PointAddress::new(device, cell).expect("surface cell address")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn address(s: &str) -> PointAddress {
        s.parse().unwrap()
    }

    fn bootstrapped_group() -> (Arc<Mutex<MemoryRegistry>>, SensorGroup) {
        let registry = Arc::new(Mutex::new(MemoryRegistry::new()));
        {
            let mut table = registry.lock().unwrap();
            table.set_value(&address("sensor_0/CO2"), PointValue::Number(450.0));
            table.set_value(&address("sensor_1/CO2"), PointValue::Number(512.0));
        }
        let mut group = SensorGroup::new("co2_office");
        group.admit(address("sensor_0/CO2"), 450.0);
        group.admit(address("sensor_1/CO2"), 512.0);
        group.mark_bootstrapped();
        (registry, group)
    }

    fn cell_value(registry: &Arc<Mutex<MemoryRegistry>>, addr: &str) -> Option<PointValue> {
        registry.lock().unwrap().current_value(&address(addr))
    }

    #[test]
    fn test_create_defines_fixed_cells() {
        let (registry, group) = bootstrapped_group();
        let _surface = Surface::create(Arc::clone(&registry), &group);

        assert_eq!(
            cell_value(&registry, "co2_office/average"),
            Some(PointValue::Number(0.0))
        );
        assert_eq!(
            cell_value(&registry, "co2_office/state"),
            Some(PointValue::Number(0.0))
        );
        assert_eq!(
            cell_value(&registry, "co2_office/typeAVG"),
            Some(PointValue::Number(3.0))
        );
        assert_eq!(
            cell_value(&registry, "co2_office/qtyCO2"),
            Some(PointValue::Number(2.0))
        );

        let table = registry.lock().unwrap();
        let average_spec = table.cell_spec(&address("co2_office/average")).unwrap();
        assert!(average_spec.readonly);
        assert_eq!(average_spec.unit.as_deref(), Some("ppm"));
        let mode_spec = table.cell_spec(&address("co2_office/typeAVG")).unwrap();
        assert!(!mode_spec.readonly);
    }

    #[test]
    fn test_create_seeds_member_cells_from_readings() {
        let (registry, group) = bootstrapped_group();
        let _surface = Surface::create(Arc::clone(&registry), &group);

        assert_eq!(
            cell_value(&registry, "co2_office/CO2_0"),
            Some(PointValue::Number(450.0))
        );
        assert_eq!(
            cell_value(&registry, "co2_office/CO2_1"),
            Some(PointValue::Number(512.0))
        );

        let table = registry.lock().unwrap();
        let spec = table.cell_spec(&address("co2_office/CO2_0")).unwrap();
        assert_eq!(spec.title, "sensor_0/CO2");
    }

    #[test]
    fn test_create_carries_over_retained_error_indicator() {
        let (registry, group) = bootstrapped_group();
        registry.lock().unwrap().set_value(
            &address("sensor_1/CO2#error"),
            PointValue::Text("r".to_string()),
        );

        let _surface = Surface::create(Arc::clone(&registry), &group);

        let table = registry.lock().unwrap();
        assert_eq!(table.error_mark(&address("co2_office/CO2_0")), None);
        assert_eq!(
            table.error_mark(&address("co2_office/CO2_1")),
            Some(PointValue::Text("r".to_string()))
        );
    }

    #[test]
    fn test_publish_outputs() {
        let (registry, mut group) = bootstrapped_group();
        group.set_latest_value(0, 400.0, Utc::now());
        let surface = Surface::create(Arc::clone(&registry), &group);

        surface.publish_average(812.0);
        surface.publish_state(HealthBand::StaleAir);
        surface.publish_member_value(0, 400.0);
        surface.publish_mode(AggregationMode::Min);

        assert_eq!(
            cell_value(&registry, "co2_office/average"),
            Some(PointValue::Number(812.0))
        );
        assert_eq!(
            cell_value(&registry, "co2_office/state"),
            Some(PointValue::Number(2.0))
        );
        assert_eq!(
            cell_value(&registry, "co2_office/CO2_0"),
            Some(PointValue::Number(400.0))
        );
        assert_eq!(
            cell_value(&registry, "co2_office/typeAVG"),
            Some(PointValue::Number(1.0))
        );
    }

    #[test]
    fn test_group_alarm_set_and_clear() {
        let (registry, group) = bootstrapped_group();
        let surface = Surface::create(Arc::clone(&registry), &group);

        surface.set_group_alarm(true);
        assert_eq!(
            registry
                .lock()
                .unwrap()
                .error_mark(&address("co2_office/average")),
            Some(PointValue::Text("r".to_string()))
        );

        surface.set_group_alarm(false);
        assert_eq!(
            registry
                .lock()
                .unwrap()
                .error_mark(&address("co2_office/average")),
            None
        );
    }

    #[test]
    fn test_member_error_mirror() {
        let (registry, group) = bootstrapped_group();
        let surface = Surface::create(Arc::clone(&registry), &group);

        surface.set_member_error(1, Some(PointValue::Text("p".to_string())));
        assert_eq!(
            registry
                .lock()
                .unwrap()
                .error_mark(&address("co2_office/CO2_1")),
            Some(PointValue::Text("p".to_string()))
        );

        surface.set_member_error(1, None);
        assert_eq!(
            registry
                .lock()
                .unwrap()
                .error_mark(&address("co2_office/CO2_1")),
            None
        );
    }
}
