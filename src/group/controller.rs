//! Event handling for one sensor group
//!
//! The controller owns the group state, its validity tracker, and its
//! published surface. The event loop routes every bus match here; each
//! handler runs to completion, so the parallel member sequences are always
//! read in a consistent snapshot.

use crate::group::aggregate;
use crate::group::classify::HealthBand;
use crate::group::sensor_group::{AggregationMode, SensorGroup};
use crate::group::validity::{RecoverySchedule, ValidityTracker};
use crate::points::{PointAddress, PointValue, Timestamp};
use crate::surface::Surface;
use log::{debug, info, warn};

/// What a subscribed address means to the group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Reading of the member at this index changed
    MemberValue(usize),
    /// Error signal of the member at this index changed
    ErrorSignal(usize),
    /// External write to the aggregation-mode selector
    ModeControl,
}

/// Event handler and output publisher for one bootstrapped group
pub struct GroupController {
    group: SensorGroup,
    validity: ValidityTracker,
    surface: Surface,
    alarm_active: bool,
}

impl GroupController {
    /// Wrap a bootstrapped group with its tracker and surface
    pub fn new(group: SensorGroup, validity: ValidityTracker, surface: Surface) -> Self {
        Self {
            group,
            validity,
            surface,
            alarm_active: false,
        }
    }

    /// Read access to the group state
    pub fn group(&self) -> &SensorGroup {
        &self.group
    }

    /// The addresses this group must hear about, with their roles
    pub fn subscriptions(&self) -> Vec<(PointAddress, Role)> {
        let mut subscriptions = Vec::with_capacity(self.group.member_count() * 2 + 1);
        for (i, member) in self.group.members().iter().enumerate() {
            subscriptions.push((member.clone(), Role::MemberValue(i)));
        }
        for (i, signal) in self.group.error_signals().iter().enumerate() {
            subscriptions.push((signal.clone(), Role::ErrorSignal(i)));
        }
        subscriptions.push((self.surface.mode_address().clone(), Role::ModeControl));
        subscriptions
    }

    /// Handle one routed point update
    ///
    /// Returns the recovery the caller must schedule when a cleared error
    /// signal started a debounce window.
    pub fn handle(
        &mut self,
        role: Role,
        value: &PointValue,
        at: Timestamp,
    ) -> Option<RecoverySchedule> {
        match role {
            Role::MemberValue(member) => {
                self.on_member_value(member, value, at);
                None
            }
            Role::ErrorSignal(member) => self.on_error_signal(member, value),
            Role::ModeControl => {
                self.on_mode_write(value);
                None
            }
        }
    }

    /// Apply a debounce expiry delivered by the event loop
    pub fn on_recovery_elapsed(&mut self, member: usize, generation: u64) {
        if self
            .validity
            .on_recovery_elapsed(&mut self.group, member, generation)
        {
            info!(
                "[{}] sensor {} is trusted again",
                self.group.display_name(),
                self.group.members()[member]
            );
            self.refresh_outputs();
        } else {
            debug!(
                "[{}] superseded recovery for sensor {} ignored",
                self.group.display_name(),
                self.group.members()[member]
            );
        }
    }

    fn on_member_value(&mut self, member: usize, value: &PointValue, at: Timestamp) {
        let Some(reading) = value.as_number() else {
            warn!(
                "[{}] ignoring non-numeric reading '{}' from {}",
                self.group.display_name(),
                value,
                self.group.members()[member]
            );
            return;
        };

        self.group.set_latest_value(member, reading, at);
        self.surface.publish_member_value(member, reading);
        self.refresh_outputs();
    }

    fn on_error_signal(&mut self, member: usize, value: &PointValue) -> Option<RecoverySchedule> {
        let asserted = value.is_truthy();

        // The published mirror follows the raw signal immediately; only the
        // trust flag is debounced.
        self.surface
            .set_member_error(member, asserted.then(|| value.clone()));

        let was_valid = self.group.is_valid(member);
        let schedule = self
            .validity
            .on_error_signal(&mut self.group, member, asserted);

        if was_valid && !self.group.is_valid(member) {
            warn!(
                "[{}] sensor {} reported an error and is no longer trusted",
                self.group.display_name(),
                self.group.members()[member]
            );
            self.refresh_outputs();
        }
        if let Some(schedule) = &schedule {
            debug!(
                "[{}] sensor {} cleared its error; recovery in {:?}",
                self.group.display_name(),
                self.group.members()[member],
                schedule.delay
            );
        }
        schedule
    }

    fn on_mode_write(&mut self, value: &PointValue) {
        let requested = value
            .as_number()
            .filter(|n| n.fract() == 0.0 && *n >= 0.0)
            .and_then(|n| AggregationMode::from_code(n as u32));

        match requested {
            Some(mode) => {
                if mode != self.group.mode() {
                    info!(
                        "[{}] aggregation mode set to {}",
                        self.group.display_name(),
                        mode.label()
                    );
                }
                self.group.set_mode(mode);
                self.surface.publish_mode(mode);
            }
            None => {
                warn!(
                    "[{}] ignoring unrecognized aggregation mode value '{}'",
                    self.group.display_name(),
                    value
                );
                // Snap the selector cell back to the retained mode.
                self.surface.publish_mode(self.group.mode());
            }
        }
    }

    /// Recompute and publish the synthetic value and its band
    ///
    /// Called on every member value change and on every validity
    /// transition. With no valid members the previously published value is
    /// left standing.
    fn refresh_outputs(&mut self) {
        match aggregate::synthesize(&self.group) {
            Some(value) => {
                let band = HealthBand::classify(value);
                debug!(
                    "[{}] synthetic value {} ppm ({})",
                    self.group.display_name(),
                    value,
                    band.label()
                );
                self.surface.publish_average(value);
                self.surface.publish_state(band);
            }
            None => {
                debug!(
                    "[{}] no trusted members; keeping last published value",
                    self.group.display_name()
                );
            }
        }
        self.sync_group_alarm();
    }

    fn sync_group_alarm(&mut self) {
        let alarm = !self.group.group_valid();
        if alarm == self.alarm_active {
            return;
        }
        self.alarm_active = alarm;
        if alarm {
            warn!(
                "[{}] no trusted CO2 sensors left",
                self.group.display_name()
            );
        } else {
            info!(
                "[{}] a CO2 sensor is trusted again",
                self.group.display_name()
            );
        }
        self.surface.set_group_alarm(alarm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MemoryRegistry, PointRegistry};
    use chrono::Utc;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn address(s: &str) -> PointAddress {
        s.parse().unwrap()
    }

    fn controller_with_members(
        count: usize,
    ) -> (Arc<Mutex<MemoryRegistry>>, GroupController) {
        let registry = Arc::new(Mutex::new(MemoryRegistry::new()));
        let mut group = SensorGroup::new("co2_office");
        for i in 0..count {
            let member = address(&format!("sensor_{}/CO2", i));
            registry
                .lock()
                .unwrap()
                .set_value(&member, PointValue::Number(400.0));
            group.admit(member, 400.0);
        }
        group.mark_bootstrapped();
        let validity = ValidityTracker::new(Duration::from_millis(2000), count);
        let surface = Surface::create(Arc::clone(&registry), &group);
        (registry.clone(), GroupController::new(group, validity, surface))
    }

    fn cell(registry: &Arc<Mutex<MemoryRegistry>>, addr: &str) -> Option<PointValue> {
        registry.lock().unwrap().current_value(&address(addr))
    }

    fn number(registry: &Arc<Mutex<MemoryRegistry>>, addr: &str) -> f64 {
        cell(registry, addr).unwrap().as_number().unwrap()
    }

    fn send_value(controller: &mut GroupController, member: usize, value: f64) {
        controller.handle(
            Role::MemberValue(member),
            &PointValue::Number(value),
            Utc::now(),
        );
    }

    fn send_error(
        controller: &mut GroupController,
        member: usize,
        mark: &str,
    ) -> Option<RecoverySchedule> {
        controller.handle(
            Role::ErrorSignal(member),
            &PointValue::Text(mark.to_string()),
            Utc::now(),
        )
    }

    #[test]
    fn test_value_event_publishes_member_and_outputs() {
        let (registry, mut controller) = controller_with_members(3);

        send_value(&mut controller, 0, 400.0);
        send_value(&mut controller, 1, 800.0);
        send_value(&mut controller, 2, 1200.0);

        assert_eq!(number(&registry, "co2_office/CO2_2"), 1200.0);
        // Mean of [400, 800, 1200]
        assert_eq!(number(&registry, "co2_office/average"), 800.0);
        // 800 ppm is in the stale-air band
        assert_eq!(number(&registry, "co2_office/state"), 2.0);
    }

    #[test]
    fn test_non_numeric_reading_is_ignored() {
        let (registry, mut controller) = controller_with_members(1);
        send_value(&mut controller, 0, 650.0);

        controller.handle(
            Role::MemberValue(0),
            &PointValue::Text("garbage".to_string()),
            Utc::now(),
        );

        assert_eq!(number(&registry, "co2_office/CO2_0"), 650.0);
        assert_eq!(number(&registry, "co2_office/average"), 650.0);
    }

    #[test]
    fn test_repeated_event_is_idempotent() {
        let (registry, mut controller) = controller_with_members(2);

        send_value(&mut controller, 0, 700.0);
        send_value(&mut controller, 1, 900.0);
        let average = number(&registry, "co2_office/average");
        let state = number(&registry, "co2_office/state");

        send_value(&mut controller, 1, 900.0);

        assert_eq!(number(&registry, "co2_office/average"), average);
        assert_eq!(number(&registry, "co2_office/state"), state);
    }

    #[test]
    fn test_invalid_member_is_excluded_from_aggregate() {
        let (registry, mut controller) = controller_with_members(2);
        send_value(&mut controller, 0, 400.0);
        send_value(&mut controller, 1, 1200.0);

        send_error(&mut controller, 1, "r");

        // Invalidation retriggers aggregation over the remaining member
        assert_eq!(number(&registry, "co2_office/average"), 400.0);
        assert_eq!(number(&registry, "co2_office/state"), 1.0);
    }

    #[test]
    fn test_all_invalid_keeps_last_value_and_raises_alarm() {
        let (registry, mut controller) = controller_with_members(2);
        send_value(&mut controller, 0, 400.0);
        send_value(&mut controller, 1, 800.0);

        send_error(&mut controller, 0, "r");
        send_error(&mut controller, 1, "r");

        // Last synthetic value survives; no sentinel is published
        assert_eq!(number(&registry, "co2_office/average"), 800.0);
        assert_eq!(
            registry
                .lock()
                .unwrap()
                .error_mark(&address("co2_office/average")),
            Some(PointValue::Text("r".to_string()))
        );

        // A fresh reading while nobody is trusted changes the member cell only
        send_value(&mut controller, 0, 2000.0);
        assert_eq!(number(&registry, "co2_office/CO2_0"), 2000.0);
        assert_eq!(number(&registry, "co2_office/average"), 800.0);
    }

    #[test]
    fn test_recovery_clears_alarm_and_republishes() {
        let (registry, mut controller) = controller_with_members(2);
        send_value(&mut controller, 0, 400.0);
        send_value(&mut controller, 1, 800.0);
        send_error(&mut controller, 0, "r");
        send_error(&mut controller, 1, "r");

        let schedule = send_error(&mut controller, 0, "").unwrap();
        controller.on_recovery_elapsed(schedule.member, schedule.generation);

        assert!(controller.group().group_valid());
        assert_eq!(
            registry
                .lock()
                .unwrap()
                .error_mark(&address("co2_office/average")),
            None
        );
        // Aggregation reran over the recovered member
        assert_eq!(number(&registry, "co2_office/average"), 400.0);
    }

    #[test]
    fn test_superseded_recovery_does_not_flip_validity() {
        let (registry, mut controller) = controller_with_members(1);
        send_value(&mut controller, 0, 400.0);

        send_error(&mut controller, 0, "r");
        let stale = send_error(&mut controller, 0, "").unwrap();
        send_error(&mut controller, 0, "r");

        controller.on_recovery_elapsed(stale.member, stale.generation);

        assert!(!controller.group().is_valid(0));
        assert_eq!(
            registry
                .lock()
                .unwrap()
                .error_mark(&address("co2_office/average")),
            Some(PointValue::Text("r".to_string()))
        );
    }

    #[test]
    fn test_member_error_mirror_follows_raw_signal() {
        let (registry, mut controller) = controller_with_members(1);

        send_error(&mut controller, 0, "r");
        assert_eq!(
            registry
                .lock()
                .unwrap()
                .error_mark(&address("co2_office/CO2_0")),
            Some(PointValue::Text("r".to_string()))
        );

        // Mirror clears immediately; trust stays debounced
        send_error(&mut controller, 0, "");
        assert_eq!(
            registry
                .lock()
                .unwrap()
                .error_mark(&address("co2_office/CO2_0")),
            None
        );
        assert!(!controller.group().is_valid(0));
    }

    #[test]
    fn test_mode_write_takes_effect_on_next_event_only() {
        let (registry, mut controller) = controller_with_members(2);
        send_value(&mut controller, 0, 400.0);
        send_value(&mut controller, 1, 1200.0);
        assert_eq!(number(&registry, "co2_office/average"), 800.0);

        controller.handle(Role::ModeControl, &PointValue::Number(2.0), Utc::now());

        // Not retroactive: the published value is untouched
        assert_eq!(number(&registry, "co2_office/average"), 800.0);
        assert_eq!(number(&registry, "co2_office/typeAVG"), 2.0);

        send_value(&mut controller, 0, 400.0);
        assert_eq!(number(&registry, "co2_office/average"), 1200.0);
    }

    #[test]
    fn test_unrecognized_mode_write_is_ignored() {
        let (registry, mut controller) = controller_with_members(1);
        controller.handle(Role::ModeControl, &PointValue::Number(1.0), Utc::now());

        controller.handle(Role::ModeControl, &PointValue::Number(7.0), Utc::now());
        controller.handle(Role::ModeControl, &PointValue::Number(1.5), Utc::now());
        controller.handle(
            Role::ModeControl,
            &PointValue::Text("fastest".to_string()),
            Utc::now(),
        );

        assert_eq!(controller.group().mode(), AggregationMode::Min);
        // Selector cell is snapped back to the retained mode
        assert_eq!(number(&registry, "co2_office/typeAVG"), 1.0);
    }

    #[test]
    fn test_subscriptions_cover_members_signals_and_selector() {
        let (_registry, controller) = controller_with_members(2);

        let subscriptions = controller.subscriptions();

        assert_eq!(subscriptions.len(), 5);
        assert!(subscriptions
            .contains(&(address("sensor_0/CO2"), Role::MemberValue(0))));
        assert!(subscriptions
            .contains(&(address("sensor_1/CO2"), Role::MemberValue(1))));
        assert!(subscriptions
            .contains(&(address("sensor_0/CO2#error"), Role::ErrorSignal(0))));
        assert!(subscriptions
            .contains(&(address("sensor_1/CO2#error"), Role::ErrorSignal(1))));
        assert!(subscriptions.contains(&(address("co2_office/typeAVG"), Role::ModeControl)));
    }
}
