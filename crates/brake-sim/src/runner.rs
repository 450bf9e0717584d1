//! Scenario replay

use auto_brake::{AutoBrake, AutoBrakeConfig, BrakeState};
use brake_bus::{BrakeCommand, InProcessBus};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, info_span, warn};

use crate::recorder::BrakeLog;
use crate::scenario::Scenario;
use crate::SimError;

/// Verdict for one scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "failures", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed(Vec<String>),
    /// Scenario carries no expectations
    Unchecked,
    /// Scenario could not be loaded or replayed
    Errored(String),
}

/// Result of replaying one scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    /// Events that reached a subscriber
    pub events_delivered: usize,
    pub commands: Vec<BrakeCommand>,
    /// Absent when the scenario errored before replay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_state: Option<BrakeState>,
    pub outcome: Outcome,
}

impl ScenarioReport {
    fn errored(name: String, error: &SimError) -> Self {
        Self {
            name,
            events_delivered: 0,
            commands: Vec::new(),
            final_state: None,
            outcome: Outcome::Errored(error.to_string()),
        }
    }

    /// False when an expectation was not met or the scenario errored
    pub fn passed(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed(_) | Outcome::Errored(_))
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Passed => write!(f, "[+] Scenario {} successful.", self.name),
            Outcome::Failed(failures) => {
                write!(f, "[-] Scenario failure in {}: {}.", self.name, failures.join("; "))
            }
            Outcome::Errored(error) => {
                write!(f, "[-] Scenario failure in {}: {}.", self.name, error)
            }
            Outcome::Unchecked => write!(
                f,
                "[ ] Scenario {} replayed, {} brake commands.",
                self.name,
                self.commands.len()
            ),
        }
    }
}

/// Replay a scenario on a fresh bus and controller
pub fn run_scenario(
    scenario: &Scenario,
    base: &AutoBrakeConfig,
) -> Result<ScenarioReport, SimError> {
    let span = info_span!("scenario", name = %scenario.name);
    let _enter = span.enter();

    let config = scenario.config(base);
    let bus = Rc::new(InProcessBus::new());
    let log = BrakeLog::attach(&bus);
    let auto_brake = AutoBrake::with_config(&bus, &config)?;

    let mut events_delivered = 0;
    for event in &scenario.events {
        debug!(?event, "Delivering event");
        if bus.deliver(event) {
            events_delivered += 1;
        }
    }

    let commands = log.commands();
    let final_state = auto_brake.state();
    let outcome = match &scenario.expect {
        Some(expect) => {
            let failures = expect.check(&commands, &final_state);
            if failures.is_empty() {
                Outcome::Passed
            } else {
                Outcome::Failed(failures)
            }
        }
        None => Outcome::Unchecked,
    };

    info!(
        events = scenario.events.len(),
        brake_commands = commands.len(),
        passed = !matches!(outcome, Outcome::Failed(_)),
        "Scenario replayed"
    );

    Ok(ScenarioReport {
        name: scenario.name.clone(),
        events_delivered,
        commands,
        final_state: Some(final_state),
        outcome,
    })
}

/// Load and replay one scenario file.
///
/// Load and replay errors are folded into an errored report so a batch can
/// carry on past a bad file.
pub async fn replay_file(path: &Path, base: &AutoBrakeConfig) -> ScenarioReport {
    let scenario = match Scenario::load(path).await {
        Ok(scenario) => scenario,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load scenario");
            return ScenarioReport::errored(path.display().to_string(), &e);
        }
    };

    match run_scenario(&scenario, base) {
        Ok(report) => report,
        Err(e) => {
            warn!(name = %scenario.name, error = %e, "Failed to run scenario");
            ScenarioReport::errored(scenario.name, &e)
        }
    }
}
