//! Pipeline wiring: four queues, two background stage threads, and the
//! presentation stage on the controlling thread.
//!
//! ```text
//!                   user_input
//!      ┌──────────────────────────────────────────┐
//!      ▼                                          │
//!   [state] ──object_updates──► [physics] ──draw──► [presentation]
//!      │                                          ▲
//!      └───────────────────stats──────────────────┘
//! ```

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tristage_core::Payload;

use crate::config::{ConfigError, PipelineConfig, StageConfig};
use crate::host::PresentationHost;
use crate::metrics::StageMetrics;
use crate::physics::PhysicsStage;
use crate::presentation::PresentationStage;
use crate::queue::{command_queue, QueueReceiver, QueueSender};
use crate::runner::{StageOutcome, StageRunner};
use crate::state::StateStage;

// ── ShutdownReport ─────────────────────────────────────────────────

/// What happened to each stage during shutdown.
#[derive(Clone, Debug, Default)]
pub struct ShutdownReport {
    /// Time from the start of the shutdown sequence until both background
    /// threads were joined.
    pub total_ms: u64,
    /// Whether the state thread was joined successfully.
    pub state_joined: bool,
    /// Whether the physics thread was joined successfully.
    pub physics_joined: bool,
    /// State stage metrics, if its thread was joined.
    pub state: Option<StageMetrics>,
    /// Physics stage metrics, if its thread was joined.
    pub physics: Option<StageMetrics>,
    /// Presentation stage metrics, if it ran.
    pub presentation: Option<StageMetrics>,
}

// ── ShutdownState ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownState {
    Running,
    Joined,
}

/// The presentation side of the ring, held until presentation runs.
struct PresentationPorts {
    draw_rx: QueueReceiver,
    stats_rx: QueueReceiver,
    user_tx: QueueSender,
}

// ── Pipeline ───────────────────────────────────────────────────────

/// A running pipeline.
///
/// [`launch`](Pipeline::launch) starts the state and physics stages on
/// their own threads. Drive presentation on the calling thread with
/// [`run_presentation`](Pipeline::run_presentation), or stop everything
/// without presentation via [`shutdown`](Pipeline::shutdown). Dropping a
/// running pipeline shuts it down.
pub struct Pipeline {
    ports: Option<PresentationPorts>,
    state_thread: Option<JoinHandle<StageOutcome<StateStage>>>,
    physics_thread: Option<JoinHandle<StageOutcome<PhysicsStage>>>,
    recovered_state: Option<StateStage>,
    recovered_physics: Option<PhysicsStage>,
    presentation_config: StageConfig,
    shutdown_deadline: Duration,
    state: ShutdownState,
}

impl Pipeline {
    /// Validate `config`, create the four queues and spawn the state and
    /// physics threads.
    pub fn launch(
        config: PipelineConfig,
        state: StateStage,
        physics: PhysicsStage,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let q = &config.queue;
        let (user_tx, user_rx) = command_queue("user_input", q);
        let (objects_tx, objects_rx) = command_queue("object_updates", q);
        let (stats_tx, stats_rx) = command_queue("stats", q);
        let (draw_tx, draw_rx) = command_queue("draw", q);

        let state_runner = StageRunner::new(
            state,
            vec![user_rx],
            vec![objects_tx, stats_tx],
            config.state.clone(),
        )?;
        let physics_runner = StageRunner::new(
            physics,
            vec![objects_rx],
            vec![draw_tx],
            config.physics.clone(),
        )?;

        let state_thread = thread::Builder::new()
            .name("tristage-state".into())
            .spawn(move || state_runner.run())
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: format!("state stage: {e}"),
            })?;

        let physics_thread = match thread::Builder::new()
            .name("tristage-physics".into())
            .spawn(move || physics_runner.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                // Closing its inbound queue stops the state stage.
                drop((user_tx, stats_rx, draw_rx));
                join("state", Some(state_thread));
                return Err(ConfigError::ThreadSpawnFailed {
                    reason: format!("physics stage: {e}"),
                });
            }
        };

        tracing::info!("pipeline launched");
        Ok(Self {
            ports: Some(PresentationPorts {
                draw_rx,
                stats_rx,
                user_tx,
            }),
            state_thread: Some(state_thread),
            physics_thread: Some(physics_thread),
            recovered_state: None,
            recovered_physics: None,
            presentation_config: config.presentation,
            shutdown_deadline: config.state.drain_timeout + config.physics.drain_timeout,
            state: ShutdownState::Running,
        })
    }

    /// Run `stage` on the calling thread until the pipeline stops, then
    /// join the background stages.
    ///
    /// Presentation can run once per pipeline. A second call returns the
    /// stage untouched along with the report of an ordinary shutdown.
    pub fn run_presentation<H: PresentationHost>(
        &mut self,
        stage: PresentationStage<H>,
    ) -> Result<(PresentationStage<H>, ShutdownReport), ConfigError> {
        let Some(ports) = self.ports.take() else {
            tracing::warn!("presentation already ran on this pipeline");
            return Ok((stage, self.shutdown()));
        };

        let runner = match StageRunner::new(
            stage,
            vec![ports.draw_rx, ports.stats_rx],
            vec![ports.user_tx],
            self.presentation_config.clone(),
        ) {
            Ok(runner) => runner,
            Err(err) => {
                // The dropped queue halves stop both background stages.
                self.join_stages(Instant::now(), None);
                return Err(err);
            }
        };

        let outcome = runner.run();
        let report = self.join_stages(Instant::now(), Some(outcome.metrics));
        Ok((outcome.stage, report))
    }

    /// Stop a pipeline whose presentation stage is not running.
    ///
    /// Injects `EXIT` into the state stage, consumes everything sent towards
    /// presentation until both queues close, then joins. Idempotent.
    pub fn shutdown(&mut self) -> ShutdownReport {
        if self.state == ShutdownState::Joined {
            return ShutdownReport {
                state_joined: true,
                physics_joined: true,
                ..ShutdownReport::default()
            };
        }

        let start = Instant::now();
        if let Some(mut ports) = self.ports.take() {
            if ports.user_tx.push(Payload::Exit.into_command()).is_err() {
                tracing::debug!("state stage already stopped");
            }

            let deadline = start + self.shutdown_deadline;
            let mut sink = Vec::new();
            while !(ports.draw_rx.is_closed() && ports.stats_rx.is_closed()) {
                sink.clear();
                ports.draw_rx.drain_into(&mut sink);
                ports.stats_rx.drain_into(&mut sink);
                if Instant::now() > deadline {
                    tracing::warn!("background stages did not close their queues in time");
                    break;
                }
                thread::yield_now();
            }
        }

        self.join_stages(start, None)
    }

    /// The state stage, once its thread has been joined.
    pub fn state_stage(&self) -> Option<&StateStage> {
        self.recovered_state.as_ref()
    }

    /// The physics stage, once its thread has been joined.
    pub fn physics_stage(&self) -> Option<&PhysicsStage> {
        self.recovered_physics.as_ref()
    }

    fn join_stages(&mut self, start: Instant, presentation: Option<StageMetrics>) -> ShutdownReport {
        self.state = ShutdownState::Joined;

        let (state_joined, state) = match join("state", self.state_thread.take()) {
            Some(outcome) => {
                self.recovered_state = Some(outcome.stage);
                (true, Some(outcome.metrics))
            }
            None => (false, None),
        };
        let (physics_joined, physics) = match join("physics", self.physics_thread.take()) {
            Some(outcome) => {
                self.recovered_physics = Some(outcome.stage);
                (true, Some(outcome.metrics))
            }
            None => (false, None),
        };

        let total_ms = start.elapsed().as_millis() as u64;
        tracing::info!(total_ms, state_joined, physics_joined, "pipeline stopped");
        ShutdownReport {
            total_ms,
            state_joined,
            physics_joined,
            state,
            physics,
            presentation,
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.state != ShutdownState::Joined {
            self.shutdown();
        }
    }
}

fn join<S>(name: &'static str, handle: Option<JoinHandle<StageOutcome<S>>>) -> Option<StageOutcome<S>> {
    match handle?.join() {
        Ok(outcome) => Some(outcome),
        Err(_) => {
            tracing::error!(stage = name, "stage thread panicked");
            None
        }
    }
}
