//! Typed event bus with one topic per monitored address
//!
//! Subscriptions are explicit tokens registered per group instance; the
//! event loop looks up the tokens for an incoming address and dispatches
//! them serially in subscription order.

use crate::points::PointAddress;
use std::collections::HashMap;

/// Address-keyed subscription table
#[derive(Debug)]
pub struct PointBus<T> {
    topics: HashMap<PointAddress, Vec<T>>,
}

impl<T> Default for PointBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PointBus<T> {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
        }
    }

    /// Register a subscription token under an address
    pub fn subscribe(&mut self, address: PointAddress, token: T) {
        self.topics.entry(address).or_default().push(token);
    }

    /// Tokens subscribed to an address, in subscription order
    pub fn subscribers(&self, address: &PointAddress) -> &[T] {
        self.topics
            .get(address)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of addresses with at least one subscription
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(s: &str) -> PointAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_unknown_address_has_no_subscribers() {
        let bus: PointBus<u32> = PointBus::new();
        assert!(bus.subscribers(&address("a/CO2")).is_empty());
        assert_eq!(bus.topic_count(), 0);
    }

    #[test]
    fn test_subscribe_and_look_up() {
        let mut bus = PointBus::new();
        bus.subscribe(address("a/CO2"), 1u32);
        bus.subscribe(address("b/CO2"), 2u32);

        assert_eq!(bus.subscribers(&address("a/CO2")), &[1]);
        assert_eq!(bus.subscribers(&address("b/CO2")), &[2]);
        assert_eq!(bus.topic_count(), 2);
    }

    #[test]
    fn test_dispatch_order_is_subscription_order() {
        let mut bus = PointBus::new();
        bus.subscribe(address("a/CO2"), "first");
        bus.subscribe(address("a/CO2"), "second");
        bus.subscribe(address("a/CO2"), "third");

        assert_eq!(
            bus.subscribers(&address("a/CO2")),
            &["first", "second", "third"]
        );
    }
}
