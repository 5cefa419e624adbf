//! # Status UI
//!
//! While the archive is imported and the instance started, a status task owns the
//! terminal and animates a spinner. It stops on the first [`OrchestratorEvent`],
//! or when the orchestrator drops its sender without reporting.
//!
//! The task is cooperative: it draws only from its own loop, advancing the
//! spinner on a fixed interval, so nothing else writes to the renderer while it runs.

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::{error::ExternalOperation, orchestrator::OrchestratorEvent};

/// Interval between spinner frames.
pub const TICK_INTERVAL: Duration = Duration::from_millis(120);

/// Draws the status spinner.
pub trait StatusRenderer: Send + 'static {
    /// Shows the spinner with `message`. Called once, before any tick.
    fn start(&mut self, message: &str);

    /// Advances the spinner one frame.
    fn tick(&mut self) {}

    /// Removes the spinner. Called exactly once. A failure outcome should be
    /// left visible to the user.
    fn stop(&mut self, outcome: &UiOutcome);
}

impl<R: StatusRenderer + ?Sized> StatusRenderer for Box<R> {
    fn start(&mut self, message: &str) {
        (**self).start(message);
    }

    fn tick(&mut self) {
        (**self).tick();
    }

    fn stop(&mut self, outcome: &UiOutcome) {
        (**self).stop(outcome);
    }
}

/// Renderer that draws nothing, for non-interactive output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentStatus;

impl StatusRenderer for SilentStatus {
    fn start(&mut self, _message: &str) {}

    fn stop(&mut self, _outcome: &UiOutcome) {}
}

/// How the status task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiOutcome {
    /// Import and start both succeeded.
    Succeeded,
    /// An external operation failed.
    Failed {
        operation: ExternalOperation,
        message: String,
    },
    /// The orchestrator ended without sending an event.
    Abandoned,
}

impl UiOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl From<OrchestratorEvent> for UiOutcome {
    fn from(event: OrchestratorEvent) -> Self {
        match event {
            OrchestratorEvent::Succeeded => Self::Succeeded,
            OrchestratorEvent::Failed { operation, message } => Self::Failed { operation, message },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiState {
    Idle,
    Running,
    Terminal,
}

/// Status renderer with its lifecycle state. Guarantees `start` and `stop` are
/// forwarded at most once, and that no tick is forwarded outside `Running`.
#[derive(Debug)]
pub struct StatusUi<R> {
    renderer: R,
    state: UiState,
}

impl<R: StatusRenderer> StatusUi<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            state: UiState::Idle,
        }
    }

    pub fn state(&self) -> UiState {
        self.state
    }

    pub fn start(&mut self, message: &str) {
        if self.state == UiState::Idle {
            self.renderer.start(message);
            self.state = UiState::Running;
        }
    }

    pub fn tick(&mut self) {
        if self.state == UiState::Running {
            self.renderer.tick();
        }
    }

    /// Moves to `Terminal`. Returns false if the UI had already stopped.
    pub fn finish(&mut self, outcome: &UiOutcome) -> bool {
        if self.state == UiState::Terminal {
            return false;
        }
        self.renderer.stop(outcome);
        self.state = UiState::Terminal;
        true
    }
}

/// Runs the status UI until the orchestrator reports, then stops rendering.
pub async fn run_status_ui<R: StatusRenderer>(
    renderer: R,
    message: String,
    mut events: oneshot::Receiver<OrchestratorEvent>,
) -> UiOutcome {
    let mut ui = StatusUi::new(renderer);
    ui.start(&message);

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let outcome = loop {
        tokio::select! {
            received = &mut events => {
                break received.map_or(UiOutcome::Abandoned, UiOutcome::from);
            }
            _ = ticker.tick() => ui.tick(),
        }
    };

    ui.finish(&outcome);
    debug!(?outcome, "status ui stopped");
    outcome
}
