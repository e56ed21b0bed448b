//! Core point-addressing and value types for the CO2 watcher
//!
//! This module defines the fundamental data structures used throughout the
//! application for naming external data points and carrying their updates.

use crate::error::AddressError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Address of one external data point, rendered as `device/control`
///
/// Sensors publish their reading under `device/control` and their
/// error/disconnect indicator under the `device/control#error` sibling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PointAddress {
    device: String,
    control: String,
}

impl PointAddress {
    /// Create an address from its two segments
    ///
    /// # Errors
    ///
    /// Returns `AddressError::EmptySegment` if either segment is empty.
    pub fn new(
        device: impl Into<String>,
        control: impl Into<String>,
    ) -> Result<Self, AddressError> {
        let device = device.into();
        let control = control.into();
        if device.is_empty() || control.is_empty() {
            return Err(AddressError::EmptySegment(format!("{}/{}", device, control)));
        }
        Ok(Self { device, control })
    }

    /// The device segment of the address
    pub fn device(&self) -> &str {
        &self.device
    }

    /// The control segment of the address
    pub fn control(&self) -> &str {
        &self.control
    }

    /// The error-signal sibling of this point (`device/control#error`)
    pub fn error_sibling(&self) -> PointAddress {
        Self {
            device: self.device.clone(),
            control: format!("{}#error", self.control),
        }
    }
}

impl FromStr for PointAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (device, control) = s
            .split_once('/')
            .ok_or_else(|| AddressError::MissingSeparator(s.to_string()))?;
        if device.is_empty() || control.is_empty() {
            return Err(AddressError::EmptySegment(s.to_string()));
        }
        Ok(Self {
            device: device.to_string(),
            control: control.to_string(),
        })
    }
}

impl TryFrom<String> for PointAddress {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PointAddress> for String {
    fn from(address: PointAddress) -> Self {
        address.to_string()
    }
}

impl fmt::Display for PointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.control)
    }
}

/// Value carried by a point update
///
/// Readings are numeric; error signals are typically short text markers
/// (`"r"`, `"p"`) or empty when clear, so all three wire shapes are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl PointValue {
    /// Whether the value counts as an asserted (truthy) signal
    pub fn is_truthy(&self) -> bool {
        match self {
            PointValue::Number(n) => *n != 0.0,
            PointValue::Text(s) => !s.is_empty(),
            PointValue::Bool(b) => *b,
        }
    }

    /// Numeric view of the value
    ///
    /// Text values are parsed, since bridged transports often deliver
    /// numbers as strings.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PointValue::Number(n) => Some(*n),
            PointValue::Text(s) => s.trim().parse().ok(),
            PointValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointValue::Number(n) => write!(f, "{}", n),
            PointValue::Text(s) => write!(f, "{}", s),
            PointValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// One externally-originated point update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointEvent {
    /// Address whose value changed
    pub address: PointAddress,
    /// The new value
    pub value: PointValue,
    /// When the update was observed; defaults to arrival time
    #[serde(default = "Utc::now")]
    pub timestamp: Timestamp,
}
