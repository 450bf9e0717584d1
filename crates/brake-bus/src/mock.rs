//! Recording bus for tests

use std::cell::RefCell;

use crate::bus::{ServiceBus, SubscriberTable, Subscription};
use crate::messages::{
    BrakeCommand, BusEvent, BusEventKind, CarDetected, SpeedLimitDetected, SpeedUpdate,
};

/// Test double that records every published command and lets the test
/// invoke registered callbacks directly.
#[derive(Debug, Default)]
pub struct MockServiceBus {
    subscribers: SubscriberTable,
    published: RefCell<Vec<BrakeCommand>>,
}

impl MockServiceBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke the speed update callback, if registered
    pub fn speed_update(&self, update: SpeedUpdate) {
        self.deliver(&update.into());
    }

    /// Invoke the car detected callback, if registered
    pub fn car_detected(&self, detected: CarDetected) {
        self.deliver(&detected.into());
    }

    /// Invoke the speed limit callback, if registered
    pub fn speed_limit(&self, limit: SpeedLimitDetected) {
        self.deliver(&limit.into());
    }

    /// Invoke the callback for any inbound event
    pub fn deliver(&self, event: &BusEvent) -> bool {
        self.subscribers.dispatch(event)
    }

    /// Number of `publish` calls so far
    pub fn commands_published(&self) -> usize {
        self.published.borrow().len()
    }

    /// Most recently published command
    pub fn last_command(&self) -> Option<BrakeCommand> {
        self.published.borrow().last().copied()
    }

    /// All published commands, oldest first
    pub fn commands(&self) -> Vec<BrakeCommand> {
        self.published.borrow().clone()
    }

    pub fn is_subscribed(&self, kind: BusEventKind) -> bool {
        self.subscribers.is_subscribed(kind)
    }
}

impl ServiceBus for MockServiceBus {
    fn publish(&self, command: BrakeCommand) {
        self.published.borrow_mut().push(command);
    }

    fn subscribe(&self, subscription: Subscription) {
        self.subscribers.register(subscription);
    }
}
