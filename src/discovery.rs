//! Group discovery bootstrapping
//!
//! Probes the requested member addresses on a fixed schedule until all of
//! them are reachable or the probe budget runs out, then performs exactly
//! one admission pass. Targets that never appeared are skipped for the rest
//! of the run; membership is fixed once the pass completes.

use crate::error::DiscoveryError;
use crate::group::sensor_group::SensorGroup;
use crate::points::PointAddress;
use crate::registry::PointRegistry;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What to discover for one group
#[derive(Debug, Clone)]
pub struct BootstrapPlan {
    /// Display-surface name of the group
    pub name: String,
    /// Requested member addresses, in order
    pub targets: Vec<PointAddress>,
    /// Delay between reachability probes
    pub probe_interval: Duration,
    /// Maximum number of probes before admission runs anyway
    pub probe_attempts: u32,
}

/// Whether every target currently passes the existence check
pub fn all_reachable<R: PointRegistry>(registry: &R, targets: &[PointAddress]) -> bool {
    targets
        .iter()
        .all(|target| registry.exists_and_reachable(target))
}

/// The single admission pass over the target list
///
/// Each currently-reachable target is admitted in order, seeded with its
/// current reading; the exposed names are numbered by admitted count, so
/// skipped targets leave no gaps.
pub fn admit_reachable<R: PointRegistry>(registry: &R, plan: &BootstrapPlan) -> SensorGroup {
    let mut group = SensorGroup::new(plan.name.clone());
    for target in &plan.targets {
        if registry.exists_and_reachable(target) {
            let initial = registry
                .current_value(target)
                .and_then(|value| value.as_number())
                .unwrap_or(0.0);
            group.admit(target.clone(), initial);
        } else {
            warn!(
                "[{}] sensor {} never became reachable and will not be tracked",
                plan.name, target
            );
        }
    }
    group.mark_bootstrapped();
    group
}

/// Run the bounded probe loop and admit whatever is reachable at the end
///
/// # Errors
///
/// Returns `DiscoveryError::NoTargets` immediately when the plan lists no
/// targets, and `DiscoveryError::NoMembers` when the admission pass admits
/// nobody; in both cases the group must not be started.
pub async fn bootstrap<R: PointRegistry>(
    registry: &Arc<Mutex<R>>,
    plan: &BootstrapPlan,
) -> Result<SensorGroup, DiscoveryError> {
    if plan.targets.is_empty() {
        return Err(DiscoveryError::NoTargets(plan.name.clone()));
    }

    info!(
        "[{}] waiting for {} sensor(s) to appear",
        plan.name,
        plan.targets.len()
    );

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        tokio::time::sleep(plan.probe_interval).await;

        let ready = {
            let table = registry.lock().unwrap();
            all_reachable(&*table, &plan.targets)
        };
        if ready {
            debug!(
                "[{}] all sensors reachable after {} probe(s)",
                plan.name, attempt
            );
            break;
        }
        if attempt >= plan.probe_attempts {
            warn!(
                "[{}] probe budget exhausted after {} attempt(s)",
                plan.name, attempt
            );
            break;
        }
        debug!(
            "[{}] probe {}/{} failed; retrying",
            plan.name, attempt, plan.probe_attempts
        );
    }

    let group = {
        let table = registry.lock().unwrap();
        admit_reachable(&*table, plan)
    };
    if group.is_empty() {
        return Err(DiscoveryError::NoMembers(plan.name.clone()));
    }

    info!(
        "[{}] bootstrap complete; tracking {} of {} sensor(s)",
        plan.name,
        group.member_count(),
        plan.targets.len()
    );
    Ok(group)
}
