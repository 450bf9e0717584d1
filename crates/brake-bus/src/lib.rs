//! Braking Service Bus
//!
//! Typed publish/subscribe plumbing between telemetry producers and the
//! automatic braking controller:
//! - Inbound messages (speed updates, detected cars, detected speed limits)
//! - Outbound brake commands
//! - Single-slot subscriber table (one callback per message type)
//! - In-process bus and a recording mock bus for tests

mod bus;
mod messages;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use bus::{Callback, InProcessBus, ServiceBus, SubscriberTable, Subscription};
pub use messages::{
    BrakeCommand, BusEvent, BusEventKind, CarDetected, SpeedLimitDetected, SpeedUpdate,
};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockServiceBus;
