//! Brake command recorder

use brake_bus::{BrakeCommand, InProcessBus};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Observer that keeps every brake command published on a bus, in order
#[derive(Debug, Clone, Default)]
pub struct BrakeLog {
    commands: Rc<RefCell<Vec<BrakeCommand>>>,
}

impl BrakeLog {
    /// Register a new log as the bus's brake command observer
    pub fn attach(bus: &InProcessBus) -> Self {
        let log = Self::default();
        let sink = log.commands.clone();
        bus.observe_brake_commands(move |command| {
            debug!(time_to_collision_s = command.time_to_collision_s, "Brake command recorded");
            sink.borrow_mut().push(*command);
        });
        log
    }

    pub fn len(&self) -> usize {
        self.commands.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.borrow().is_empty()
    }

    pub fn last(&self) -> Option<BrakeCommand> {
        self.commands.borrow().last().copied()
    }

    /// Recorded commands, oldest first
    pub fn commands(&self) -> Vec<BrakeCommand> {
        self.commands.borrow().clone()
    }
}
