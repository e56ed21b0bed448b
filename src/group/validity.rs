//! Per-member validity tracking with debounced recovery
//!
//! Each member is either Valid or Invalid. An asserted error signal
//! invalidates the member immediately; a cleared signal only revalidates it
//! after the debounce window has elapsed without a re-assertion, which
//! absorbs flapping reconnects without letting the aggregate oscillate.
//!
//! Recovery timers are superseded rather than stacked: every signal edge
//! bumps the member's generation counter, and a recovery that fires with a
//! stale generation token is a no-op. The caller owns the actual timers and
//! delivers expiry back through [`ValidityTracker::on_recovery_elapsed`].

use crate::group::sensor_group::SensorGroup;
use std::time::Duration;

/// A recovery the caller must schedule: after `delay`, deliver
/// `(member, generation)` back to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverySchedule {
    /// Member index within the group
    pub member: usize,
    /// Token identifying this particular recovery; stale tokens are ignored
    pub generation: u64,
    /// How long the error signal must stay clear
    pub delay: Duration,
}

/// Validity state machine for all members of one group
#[derive(Debug)]
pub struct ValidityTracker {
    debounce: Duration,
    generations: Vec<u64>,
}

impl ValidityTracker {
    /// Create a tracker for a group with `member_count` admitted members
    pub fn new(debounce: Duration, member_count: usize) -> Self {
        Self {
            debounce,
            generations: vec![0; member_count],
        }
    }

    /// The configured debounce window
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// React to an edge on a member's error signal
    ///
    /// An asserted signal invalidates the member at once (the group flag is
    /// rederived inside `set_valid`). A cleared signal on an invalid member
    /// returns the recovery the caller must schedule. Either edge supersedes
    /// any recovery still in flight for this member.
    pub fn on_error_signal(
        &mut self,
        group: &mut SensorGroup,
        member: usize,
        asserted: bool,
    ) -> Option<RecoverySchedule> {
        self.generations[member] += 1;

        if asserted {
            group.set_valid(member, false);
            None
        } else if !group.is_valid(member) {
            Some(RecoverySchedule {
                member,
                generation: self.generations[member],
                delay: self.debounce,
            })
        } else {
            // Signal cleared while already trusted; nothing to recover.
            None
        }
    }

    /// Apply a recovery whose debounce window has elapsed
    ///
    /// Returns true when the member actually transitioned back to Valid.
    /// A stale generation token means the recovery was superseded by a later
    /// signal edge and must not act.
    pub fn on_recovery_elapsed(
        &mut self,
        group: &mut SensorGroup,
        member: usize,
        generation: u64,
    ) -> bool {
        if self.generations[member] != generation {
            return false;
        }
        if group.is_valid(member) {
            return false;
        }
        group.set_valid(member, true);
        true
    }
}
