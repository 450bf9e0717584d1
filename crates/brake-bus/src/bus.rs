//! Service bus capability and the in-process implementation

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

use crate::messages::{
    BrakeCommand, BusEvent, BusEventKind, CarDetected, SpeedLimitDetected, SpeedUpdate,
};

/// Subscriber callback for a single message type
pub type Callback<T> = Rc<dyn Fn(&T)>;

/// Registration request, one case per inbound channel
#[derive(Clone)]
pub enum Subscription {
    SpeedUpdate(Callback<SpeedUpdate>),
    CarDetected(Callback<CarDetected>),
    SpeedLimitDetected(Callback<SpeedLimitDetected>),
}

impl Subscription {
    pub fn speed_update(callback: impl Fn(&SpeedUpdate) + 'static) -> Self {
        Subscription::SpeedUpdate(Rc::new(callback))
    }

    pub fn car_detected(callback: impl Fn(&CarDetected) + 'static) -> Self {
        Subscription::CarDetected(Rc::new(callback))
    }

    pub fn speed_limit(callback: impl Fn(&SpeedLimitDetected) + 'static) -> Self {
        Subscription::SpeedLimitDetected(Rc::new(callback))
    }

    /// Channel this subscription listens on
    pub fn kind(&self) -> BusEventKind {
        match self {
            Subscription::SpeedUpdate(_) => BusEventKind::SpeedUpdate,
            Subscription::CarDetected(_) => BusEventKind::CarDetected,
            Subscription::SpeedLimitDetected(_) => BusEventKind::SpeedLimitDetected,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Subscription").field(&self.kind()).finish()
    }
}

/// Publish/subscribe capability shared by the real bus and test doubles.
///
/// Delivery is synchronous on the caller's thread: `publish` returns only
/// after the observer has run, including any nested publishes it triggers.
pub trait ServiceBus {
    /// Hand a brake command to the current observer
    fn publish(&self, command: BrakeCommand);

    /// Register the callback for one inbound channel, replacing any previous one
    fn subscribe(&self, subscription: Subscription);
}

/// Single-slot subscriber table: at most one callback per inbound channel
#[derive(Default)]
pub struct SubscriberTable {
    speed_update: RefCell<Option<Callback<SpeedUpdate>>>,
    car_detected: RefCell<Option<Callback<CarDetected>>>,
    speed_limit: RefCell<Option<Callback<SpeedLimitDetected>>>,
}

impl SubscriberTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a subscription. Returns true if it replaced an earlier one.
    pub fn register(&self, subscription: Subscription) -> bool {
        let kind = subscription.kind();
        let replaced = match subscription {
            Subscription::SpeedUpdate(cb) => self.speed_update.replace(Some(cb)).is_some(),
            Subscription::CarDetected(cb) => self.car_detected.replace(Some(cb)).is_some(),
            Subscription::SpeedLimitDetected(cb) => self.speed_limit.replace(Some(cb)).is_some(),
        };

        if replaced {
            debug!(%kind, "Replacing existing subscriber");
        } else {
            debug!(%kind, "Subscriber registered");
        }
        replaced
    }

    /// Route an event to its subscriber. Returns false if nobody listens.
    pub fn dispatch(&self, event: &BusEvent) -> bool {
        match event {
            BusEvent::SpeedUpdate(update) => invoke(&self.speed_update, update),
            BusEvent::CarDetected(detected) => invoke(&self.car_detected, detected),
            BusEvent::SpeedLimitDetected(limit) => invoke(&self.speed_limit, limit),
        }
    }

    /// Check whether a channel has a subscriber
    pub fn is_subscribed(&self, kind: BusEventKind) -> bool {
        match kind {
            BusEventKind::SpeedUpdate => self.speed_update.borrow().is_some(),
            BusEventKind::CarDetected => self.car_detected.borrow().is_some(),
            BusEventKind::SpeedLimitDetected => self.speed_limit.borrow().is_some(),
        }
    }
}

impl fmt::Debug for SubscriberTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberTable")
            .field("speed_update", &self.is_subscribed(BusEventKind::SpeedUpdate))
            .field("car_detected", &self.is_subscribed(BusEventKind::CarDetected))
            .field("speed_limit", &self.is_subscribed(BusEventKind::SpeedLimitDetected))
            .finish()
    }
}

/// Run the callback in `slot`, if any.
///
/// The handle is cloned out first so the slot is not borrowed while the
/// callback runs; callbacks may publish or re-subscribe.
pub(crate) fn invoke<T>(slot: &RefCell<Option<Callback<T>>>, message: &T) -> bool {
    let callback = slot.borrow().clone();
    match callback {
        Some(callback) => {
            callback(message);
            true
        }
        None => false,
    }
}

/// In-process bus used in production wiring
#[derive(Default)]
pub struct InProcessBus {
    subscribers: SubscriberTable,
    brake_observer: RefCell<Option<Callback<BrakeCommand>>>,
}

impl InProcessBus {
    /// Create a bus with no subscribers and no brake observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the brake command observer, replacing any previous one
    pub fn observe_brake_commands(&self, observer: impl Fn(&BrakeCommand) + 'static) {
        if self.brake_observer.replace(Some(Rc::new(observer))).is_some() {
            debug!("Replacing existing brake command observer");
        }
    }

    /// Deliver an inbound event to its subscriber.
    ///
    /// Returns false when the channel has no subscriber; the event is dropped.
    pub fn deliver(&self, event: &BusEvent) -> bool {
        let handled = self.subscribers.dispatch(event);
        if !handled {
            trace!(kind = %event.kind(), "No subscriber, event dropped");
        }
        handled
    }

    /// Check whether a channel has a subscriber
    pub fn is_subscribed(&self, kind: BusEventKind) -> bool {
        self.subscribers.is_subscribed(kind)
    }
}

impl ServiceBus for InProcessBus {
    fn publish(&self, command: BrakeCommand) {
        if !invoke(&self.brake_observer, &command) {
            trace!(?command, "No brake observer, command dropped");
        }
    }

    fn subscribe(&self, subscription: Subscription) {
        self.subscribers.register(subscription);
    }
}

impl fmt::Debug for InProcessBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InProcessBus")
            .field("subscribers", &self.subscribers)
            .field("brake_observer", &self.brake_observer.borrow().is_some())
            .finish()
    }
}
