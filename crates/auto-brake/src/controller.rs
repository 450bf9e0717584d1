//! AutoBrake controller
//!
//! Subscribes to speed, car and speed-limit events on a [`ServiceBus`] and
//! publishes [`BrakeCommand`]s back onto it.

use brake_bus::{
    BrakeCommand, CarDetected, ServiceBus, SpeedLimitDetected, SpeedUpdate, Subscription,
};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{info, trace, warn};

use crate::config::AutoBrakeConfig;
use crate::error::AutoBrakeError;
use crate::state::BrakeState;

const REASON_SPEED_LIMIT: &str = "speed_limit";
const REASON_COLLISION: &str = "collision";

/// State shared between the controller handle and its bus callbacks
struct Shared {
    state: RefCell<BrakeState>,
    /// Publish capability; non-owning since the bus owns our callbacks
    bus: Weak<dyn ServiceBus>,
}

impl Shared {
    fn handle_speed_update(&self, update: &SpeedUpdate) {
        let command = self.state.borrow_mut().on_speed_update(update);
        if let Some(command) = command {
            metrics::counter!("autobrake_speed_updates_rejected_total").increment(1);
            self.publish(command, REASON_SPEED_LIMIT);
        }
    }

    fn handle_car_detected(&self, detected: &CarDetected) {
        let command = self.state.borrow().on_car_detected(detected);
        if let Some(command) = command {
            self.publish(command, REASON_COLLISION);
        }
    }

    fn handle_speed_limit(&self, limit: &SpeedLimitDetected) {
        let command = self.state.borrow_mut().on_speed_limit(limit);
        if let Some(command) = command {
            self.publish(command, REASON_SPEED_LIMIT);
        }
    }

    /// Publish with the state borrow already released, so observers may
    /// read the controller.
    fn publish(&self, command: BrakeCommand, reason: &'static str) {
        metrics::counter!("autobrake_brake_commands_total", "reason" => reason).increment(1);

        match self.bus.upgrade() {
            Some(bus) => {
                info!(
                    reason,
                    time_to_collision_s = command.time_to_collision_s,
                    "Brake command issued"
                );
                bus.publish(command);
            }
            None => warn!(reason, "Service bus dropped, brake command lost"),
        }
    }
}

/// Automatic braking controller bound to one service bus.
///
/// Dropping the controller leaves its callbacks registered but inert.
pub struct AutoBrake {
    shared: Rc<Shared>,
}

impl AutoBrake {
    /// Create a controller with default settings and subscribe it to `bus`
    pub fn new<B: ServiceBus + 'static>(bus: &Rc<B>) -> Self {
        Self::attach(bus, BrakeState::default())
    }

    /// Create a controller from configuration and subscribe it to `bus`.
    ///
    /// Nothing is registered if the configuration is rejected.
    pub fn with_config<B: ServiceBus + 'static>(
        bus: &Rc<B>,
        config: &AutoBrakeConfig,
    ) -> Result<Self, AutoBrakeError> {
        let state = BrakeState::new(config.collision_threshold_s, config.initial_speed_limit_mps)?;
        Ok(Self::attach(bus, state))
    }

    fn attach<B: ServiceBus + 'static>(bus: &Rc<B>, state: BrakeState) -> Self {
        let publisher: Rc<dyn ServiceBus> = bus.clone();
        let shared = Rc::new(Shared {
            state: RefCell::new(state),
            bus: Rc::downgrade(&publisher),
        });

        let weak = Rc::downgrade(&shared);
        bus.subscribe(Subscription::speed_update(move |update| {
            with_controller(&weak, |shared| shared.handle_speed_update(update))
        }));

        let weak = Rc::downgrade(&shared);
        bus.subscribe(Subscription::car_detected(move |detected| {
            with_controller(&weak, |shared| shared.handle_car_detected(detected))
        }));

        let weak = Rc::downgrade(&shared);
        bus.subscribe(Subscription::speed_limit(move |limit| {
            with_controller(&weak, |shared| shared.handle_speed_limit(limit))
        }));

        info!(
            collision_threshold_s = state.collision_threshold_s(),
            speed_limit_mps = state.last_known_speed_limit(),
            "AutoBrake attached to service bus"
        );
        Self { shared }
    }

    /// Change the collision threshold; rejected values leave it unchanged
    pub fn set_collision_threshold_s(&mut self, threshold_s: f64) -> Result<(), AutoBrakeError> {
        self.shared.state.borrow_mut().set_collision_threshold_s(threshold_s)?;
        info!(threshold_s, "Collision threshold updated");
        Ok(())
    }

    pub fn collision_threshold_s(&self) -> f64 {
        self.shared.state.borrow().collision_threshold_s()
    }

    /// Last accepted speed (m/s)
    pub fn speed_mps(&self) -> f64 {
        self.shared.state.borrow().speed_mps()
    }

    pub fn last_known_speed_limit(&self) -> u32 {
        self.shared.state.borrow().last_known_speed_limit()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> BrakeState {
        *self.shared.state.borrow()
    }
}

fn with_controller(weak: &Weak<Shared>, f: impl FnOnce(&Shared)) {
    match weak.upgrade() {
        Some(shared) => f(&shared),
        None => trace!("AutoBrake dropped, event ignored"),
    }
}

impl fmt::Display for AutoBrake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.state(), f)
    }
}

impl fmt::Debug for AutoBrake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoBrake").field("state", &self.state()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brake_bus::{BusEventKind, InProcessBus, MockServiceBus};

    fn setup() -> (Rc<MockServiceBus>, AutoBrake) {
        let bus = Rc::new(MockServiceBus::new());
        let auto_brake = AutoBrake::new(&bus);
        (bus, auto_brake)
    }

    fn speed(velocity_mps: f64) -> SpeedUpdate {
        SpeedUpdate { velocity_mps }
    }

    fn limit(speed_mps: u32) -> SpeedLimitDetected {
        SpeedLimitDetected { speed_mps }
    }

    #[test]
    fn test_initial_state() {
        let (_bus, auto_brake) = setup();
        assert_eq!(auto_brake.speed_mps(), 0.0);
        assert_eq!(auto_brake.collision_threshold_s(), 5.0);
        assert_eq!(auto_brake.last_known_speed_limit(), 39);
    }

    #[test]
    fn test_subscribes_all_channels() {
        let (bus, _auto_brake) = setup();
        assert!(bus.is_subscribed(BusEventKind::SpeedUpdate));
        assert!(bus.is_subscribed(BusEventKind::CarDetected));
        assert!(bus.is_subscribed(BusEventKind::SpeedLimitDetected));
    }

    #[test]
    fn test_threshold_below_one_rejected() {
        let (_bus, mut auto_brake) = setup();
        assert!(matches!(
            auto_brake.set_collision_threshold_s(0.5),
            Err(AutoBrakeError::OutOfRange { .. })
        ));
        assert_eq!(auto_brake.collision_threshold_s(), 5.0);
    }

    #[test]
    fn test_threshold_boundary() {
        let (_bus, mut auto_brake) = setup();
        assert!(auto_brake.set_collision_threshold_s(1.0).is_ok());
        assert!(auto_brake.set_collision_threshold_s(0.999).is_err());
        assert_eq!(auto_brake.collision_threshold_s(), 1.0);
    }

    #[test]
    fn test_speed_is_saved() {
        let (bus, auto_brake) = setup();
        bus.speed_limit(limit(100));

        bus.speed_update(speed(100.0));
        assert_eq!(auto_brake.speed_mps(), 100.0);

        bus.speed_update(speed(50.0));
        assert_eq!(auto_brake.speed_mps(), 50.0);

        bus.speed_update(speed(0.0));
        assert_eq!(auto_brake.speed_mps(), 0.0);

        assert_eq!(bus.commands_published(), 0);
    }

    #[test]
    fn test_speed_over_default_limit_brakes() {
        let (bus, auto_brake) = setup();

        bus.speed_update(speed(100.0));
        assert_eq!(bus.commands_published(), 1);
        assert_eq!(auto_brake.speed_mps(), 0.0);

        bus.speed_update(speed(50.0));
        assert_eq!(bus.commands_published(), 2);
        assert_eq!(auto_brake.speed_mps(), 0.0);

        bus.speed_update(speed(0.0));
        assert_eq!(bus.commands_published(), 2);
        assert_eq!(auto_brake.speed_mps(), 0.0);

        assert!(bus.commands().iter().all(|c| c.time_to_collision_s == 0.0));
    }

    #[test]
    fn test_saves_last_known_speed_limit() {
        let (bus, auto_brake) = setup();

        bus.speed_limit(limit(20));
        assert_eq!(auto_brake.last_known_speed_limit(), 20);

        bus.speed_limit(limit(100));
        assert_eq!(auto_brake.last_known_speed_limit(), 100);

        bus.speed_limit(limit(820));
        assert_eq!(auto_brake.last_known_speed_limit(), 820);
    }

    #[test]
    fn test_no_brake_under_speed_limit() {
        let (bus, _auto_brake) = setup();
        bus.speed_limit(limit(35));
        bus.speed_update(speed(34.0));
        assert_eq!(bus.commands_published(), 0);
    }

    #[test]
    fn test_one_brake_over_speed_limit() {
        let (bus, _auto_brake) = setup();
        bus.speed_limit(limit(35));
        bus.speed_update(speed(40.0));
        assert_eq!(bus.commands_published(), 1);
        assert_eq!(bus.last_command(), Some(BrakeCommand::immediate()));
    }

    #[test]
    fn test_lower_limit_after_rejected_speed() {
        let (bus, auto_brake) = setup();
        bus.speed_limit(limit(35));
        bus.speed_update(speed(40.0));
        assert_eq!(bus.commands_published(), 1);

        // 40 was never stored, so the stationary speed is under the new limit.
        bus.speed_limit(limit(25));
        assert_eq!(bus.commands_published(), 1);
        assert_eq!(auto_brake.speed_mps(), 0.0);
    }

    #[test]
    fn test_brake_when_smaller_limit_encountered() {
        let (bus, _auto_brake) = setup();
        bus.speed_limit(limit(35));
        bus.speed_update(speed(30.0));
        assert_eq!(bus.commands_published(), 0);

        bus.speed_limit(limit(25));
        assert_eq!(bus.commands_published(), 1);
        assert_eq!(bus.last_command(), Some(BrakeCommand::immediate()));
    }

    #[test]
    fn test_alert_when_collision_imminent() {
        let (bus, mut auto_brake) = setup();
        bus.speed_limit(limit(100));
        auto_brake.set_collision_threshold_s(10.0).unwrap();
        bus.speed_update(speed(100.0));
        bus.car_detected(CarDetected { distance_m: 100.0, velocity_mps: 0.0 });

        assert_eq!(bus.commands_published(), 1);
        assert_eq!(bus.last_command().unwrap().time_to_collision_s, 1.0);
    }

    #[test]
    fn test_no_alert_when_collision_not_imminent() {
        let (bus, mut auto_brake) = setup();
        bus.speed_limit(limit(100));
        auto_brake.set_collision_threshold_s(2.0).unwrap();
        bus.speed_update(speed(100.0));
        bus.car_detected(CarDetected { distance_m: 1000.0, velocity_mps: 50.0 });

        assert_eq!(bus.commands_published(), 0);
    }

    #[test]
    fn test_no_alert_when_stationary() {
        let (bus, _auto_brake) = setup();
        bus.car_detected(CarDetected { distance_m: 10.0, velocity_mps: 20.0 });
        bus.car_detected(CarDetected { distance_m: 0.0, velocity_mps: 20.0 });
        assert_eq!(bus.commands_published(), 0);
    }

    #[test]
    fn test_with_config() {
        let bus = Rc::new(MockServiceBus::new());
        let config = AutoBrakeConfig {
            collision_threshold_s: 3.0,
            initial_speed_limit_mps: 50,
        };
        let auto_brake = AutoBrake::with_config(&bus, &config).unwrap();
        assert_eq!(auto_brake.collision_threshold_s(), 3.0);
        assert_eq!(auto_brake.last_known_speed_limit(), 50);

        bus.speed_update(speed(45.0));
        assert_eq!(auto_brake.speed_mps(), 45.0);
    }

    #[test]
    fn test_with_invalid_config_registers_nothing() {
        let bus = Rc::new(MockServiceBus::new());
        let config = AutoBrakeConfig {
            collision_threshold_s: 0.0,
            ..Default::default()
        };
        assert!(AutoBrake::with_config(&bus, &config).is_err());
        assert!(!bus.is_subscribed(BusEventKind::SpeedUpdate));
    }

    #[test]
    fn test_dropped_controller_ignores_events() {
        let (bus, auto_brake) = setup();
        drop(auto_brake);

        bus.speed_update(speed(100.0));
        bus.speed_limit(limit(1));
        assert_eq!(bus.commands_published(), 0);
    }

    #[test]
    fn test_controller_outlives_bus() {
        let bus = Rc::new(MockServiceBus::new());
        let auto_brake = AutoBrake::new(&bus);
        let weak_bus = Rc::downgrade(&bus);
        drop(bus);

        // Bus and its callbacks are gone; the controller is still usable.
        assert!(weak_bus.upgrade().is_none());
        assert_eq!(auto_brake.speed_mps(), 0.0);
    }

    #[test]
    fn test_in_process_bus_round_trip() {
        let bus = Rc::new(InProcessBus::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        bus.observe_brake_commands(move |cmd| sink.borrow_mut().push(*cmd));

        let auto_brake = AutoBrake::new(&bus);
        bus.deliver(&limit(100).into());
        bus.deliver(&speed(20.0).into());
        bus.deliver(&CarDetected { distance_m: 40.0, velocity_mps: 0.0 }.into());

        assert_eq!(auto_brake.speed_mps(), 20.0);
        assert_eq!(*seen.borrow(), vec![BrakeCommand { time_to_collision_s: 2.0 }]);
    }

    #[test]
    fn test_observer_can_read_controller() {
        let bus = Rc::new(InProcessBus::new());
        let auto_brake = Rc::new(AutoBrake::new(&bus));
        let readings = Rc::new(RefCell::new(Vec::new()));

        let controller = Rc::downgrade(&auto_brake);
        let sink = readings.clone();
        bus.observe_brake_commands(move |_| {
            if let Some(controller) = controller.upgrade() {
                sink.borrow_mut().push(controller.last_known_speed_limit());
            }
        });

        bus.deliver(&speed(20.0).into());
        bus.deliver(&limit(10).into());
        assert_eq!(*readings.borrow(), vec![10]);
    }

    #[test]
    fn test_display() {
        let (_bus, auto_brake) = setup();
        assert_eq!(
            auto_brake.to_string(),
            "Collision threshold: 5 s\nSpeed: 0 mps\nSpeed limit: 39 mps"
        );
    }
}
