//! The sensor group aggregate
//!
//! One `SensorGroup` tracks one cohort of CO2 sensors. Five parallel
//! sequences describe the members; index `i` always refers to the same
//! member across all of them. Members enter only through [`SensorGroup::admit`]
//! during discovery, which is the single append path keeping the sequences
//! aligned; membership is fixed once bootstrap completes.

use crate::points::{PointAddress, Timestamp};

/// How the synthetic value is derived from the valid member readings
///
/// The numeric codes are the wire representation used by the `typeAVG`
/// control cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationMode {
    /// Minimum of the valid readings (code 1)
    Min,
    /// Maximum of the valid readings (code 2)
    Max,
    /// Arithmetic mean of the valid readings, rounded (code 3)
    Mean,
}

impl Default for AggregationMode {
    fn default() -> Self {
        AggregationMode::Mean
    }
}

impl AggregationMode {
    /// Resolve a wire code to a mode; unknown codes yield `None`
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(AggregationMode::Min),
            2 => Some(AggregationMode::Max),
            3 => Some(AggregationMode::Mean),
            _ => None,
        }
    }

    /// The wire code of this mode
    pub fn code(self) -> u32 {
        match self {
            AggregationMode::Min => 1,
            AggregationMode::Max => 2,
            AggregationMode::Mean => 3,
        }
    }

    /// Human-readable label for display surfaces and logs
    pub fn label(self) -> &'static str {
        match self {
            AggregationMode::Min => "Minimum",
            AggregationMode::Max => "Maximum",
            AggregationMode::Mean => "Arithmetic mean",
        }
    }
}

/// One monitored cohort of CO2 sensors
#[derive(Debug, Clone)]
pub struct SensorGroup {
    display_name: String,
    members: Vec<PointAddress>,
    error_signals: Vec<PointAddress>,
    exposed_names: Vec<String>,
    latest_values: Vec<f64>,
    valid_flags: Vec<bool>,
    last_seen: Vec<Option<Timestamp>>,
    group_valid: bool,
    mode: AggregationMode,
    bootstrapped: bool,
}

impl SensorGroup {
    /// Create an empty group attached to the named display surface
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            members: Vec::new(),
            error_signals: Vec::new(),
            exposed_names: Vec::new(),
            latest_values: Vec::new(),
            valid_flags: Vec::new(),
            last_seen: Vec::new(),
            group_valid: false,
            mode: AggregationMode::default(),
            bootstrapped: false,
        }
    }

    /// Admit one member, appending to all parallel sequences
    ///
    /// The error-signal sibling is derived from the member address, the
    /// exposed name is numbered by the count of already-admitted members,
    /// and the member starts Valid.
    pub fn admit(&mut self, member: PointAddress, initial_value: f64) {
        let exposed = format!("CO2_{}", self.members.len());
        self.error_signals.push(member.error_sibling());
        self.members.push(member);
        self.exposed_names.push(exposed);
        self.latest_values.push(initial_value);
        self.valid_flags.push(true);
        self.last_seen.push(None);
        self.recompute_group_valid();
    }

    /// Identifier of the published surface this group is attached to
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Number of admitted members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Whether discovery admitted nobody
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Addresses of the admitted members, in discovery order
    pub fn members(&self) -> &[PointAddress] {
        &self.members
    }

    /// Error-signal addresses, index-aligned with `members`
    pub fn error_signals(&self) -> &[PointAddress] {
        &self.error_signals
    }

    /// Externally published per-member value slot name
    pub fn exposed_name(&self, member: usize) -> &str {
        &self.exposed_names[member]
    }

    /// Most recently observed raw reading of a member (may be stale)
    pub fn latest_value(&self, member: usize) -> f64 {
        self.latest_values[member]
    }

    /// Record a fresh reading for a member
    pub fn set_latest_value(&mut self, member: usize, value: f64, at: Timestamp) {
        self.latest_values[member] = value;
        self.last_seen[member] = Some(at);
    }

    /// When the member last reported, if it ever did after bootstrap
    pub fn last_seen(&self, member: usize) -> Option<Timestamp> {
        self.last_seen[member]
    }

    /// Current trust state of a member
    pub fn is_valid(&self, member: usize) -> bool {
        self.valid_flags[member]
    }

    /// Flip a member's trust state and rederive `group_valid`
    pub fn set_valid(&mut self, member: usize, valid: bool) {
        self.valid_flags[member] = valid;
        self.recompute_group_valid();
    }

    /// True iff at least one member is currently valid
    pub fn group_valid(&self) -> bool {
        self.group_valid
    }

    /// Readings of the currently-valid members
    pub fn valid_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.valid_flags
            .iter()
            .zip(&self.latest_values)
            .filter(|(valid, _)| **valid)
            .map(|(_, value)| *value)
    }

    /// Currently selected aggregation mode
    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    /// Select the aggregation mode; takes effect on the next recomputation
    pub fn set_mode(&mut self, mode: AggregationMode) {
        self.mode = mode;
    }

    /// Whether discovery has completed for this group
    pub fn bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    /// Record that discovery has completed
    pub fn mark_bootstrapped(&mut self) {
        self.bootstrapped = true;
    }

    /// Index of the member with the given reading address
    pub fn member_index(&self, address: &PointAddress) -> Option<usize> {
        self.members.iter().position(|m| m == address)
    }

    /// Index of the member with the given error-signal address
    pub fn error_signal_index(&self, address: &PointAddress) -> Option<usize> {
        self.error_signals.iter().position(|e| e == address)
    }

    fn recompute_group_valid(&mut self) {
        self.group_valid = self.valid_flags.iter().any(|valid| *valid);
    }
}
