//! The shared stage loop and shutdown state machine.
//!
//! Every iteration of [`StageRunner::step`] runs four phases:
//!
//! 1. **Drain**: poll each inbound queue once, in declared order.
//! 2. **Dispatch**: decode each command and hand it to the stage. Rejected
//!    commands are logged and skipped; the rest of the batch still runs.
//! 3. **Update**: advance the stage by the time since the previous
//!    iteration. Skipped once the stage has left `Running`.
//! 4. **Flush**: push every buffered command, in buffered order.
//!
//! # Shutdown
//!
//! ```text
//!   Running ──EXIT / local exit / fault──► Draining ──all inbound settled──► Stopped
//!                                             │                                ▲
//!                                             └──────drain_timeout elapsed─────┘
//! ```
//!
//! Leaving `Running` buffers `EXIT` on every outbound port and flushes it in
//! the same iteration. The next iteration is the final drain pass, the last
//! one that dispatches or flushes. An inbound queue is *settled* once it
//! has delivered an `EXIT` or closed. Until all are settled, later passes
//! only consume inbound commands: EXITs settle their queue and everything
//! else is discarded unhandled, so the stage pushes nothing after its final
//! flush. EXITs seen while draining are acknowledgements and are never
//! propagated again.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tristage_core::command::names;
use tristage_core::{Command, DispatchError, Payload};

use crate::config::{ConfigError, PortDirection, StageConfig};
use crate::metrics::StageMetrics;
use crate::queue::{QueueReceiver, QueueSender};
use crate::stage::{Control, Outbox, Stage};

/// Where a stage is in its shutdown sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Normal operation.
    Running,
    /// EXIT propagated; consuming what is left on the inbound queues.
    Draining,
    /// Terminal. All queue halves have been dropped.
    Stopped,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// What [`StageRunner::run`] hands back once the stage has stopped.
#[derive(Debug)]
pub struct StageOutcome<S> {
    /// The stage, with whatever state it accumulated.
    pub stage: S,
    /// Final loop metrics.
    pub metrics: StageMetrics,
}

/// Drives one [`Stage`] through the update loop.
pub struct StageRunner<S: Stage> {
    stage: S,
    inbound: Vec<QueueReceiver>,
    outbound: Vec<QueueSender>,
    settled: Vec<bool>,
    outbox: Outbox,
    config: StageConfig,
    metrics: StageMetrics,
    lifecycle: Lifecycle,
    batch: Vec<Command>,
    last_iteration: Option<Instant>,
    draining_since: Option<Instant>,
    settling: bool,
    exit_requested: bool,
}

impl<S: Stage> StageRunner<S> {
    /// Wire `stage` to its queues.
    ///
    /// `inbound` and `outbound` must line up with the stage's declared
    /// ports, in the same order.
    pub fn new(
        stage: S,
        inbound: Vec<QueueReceiver>,
        outbound: Vec<QueueSender>,
        config: StageConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        check_ports(
            stage.name(),
            PortDirection::Inbound,
            stage.inbound_ports().len(),
            inbound.len(),
        )?;
        check_ports(
            stage.name(),
            PortDirection::Outbound,
            stage.outbound_ports().len(),
            outbound.len(),
        )?;

        let settled = vec![false; inbound.len()];
        let outbox = Outbox::new(outbound.len());
        Ok(Self {
            stage,
            inbound,
            outbound,
            settled,
            outbox,
            config,
            metrics: StageMetrics::default(),
            lifecycle: Lifecycle::Running,
            batch: Vec::new(),
            last_iteration: None,
            draining_since: None,
            settling: false,
            exit_requested: false,
        })
    }

    /// Ask the stage to shut down at the start of its next iteration, as if
    /// it had dispatched `EXIT`.
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Metrics collected so far.
    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    /// The driven stage.
    pub fn stage(&self) -> &S {
        &self.stage
    }

    /// The driven stage, mutably.
    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    /// Run one loop iteration and return the resulting lifecycle state.
    ///
    /// A stopped runner does nothing.
    pub fn step(&mut self) -> Lifecycle {
        if self.lifecycle == Lifecycle::Stopped {
            return Lifecycle::Stopped;
        }

        let start = Instant::now();
        let dt = self
            .last_iteration
            .map_or(Duration::ZERO, |prev| start.saturating_duration_since(prev));
        self.last_iteration = Some(start);

        if self.settling {
            self.settle_inbound();
            self.end_iteration(start);
            self.metrics.drain_passes += 1;
            self.finish_drain_pass();
            return self.lifecycle;
        }
        let final_pass = self.lifecycle == Lifecycle::Draining;

        if std::mem::take(&mut self.exit_requested) {
            self.begin_shutdown("exit requested");
        }

        // 1 + 2. Drain and dispatch, one queue batch at a time.
        self.drain_and_dispatch();

        // 3. Update.
        if self.lifecycle == Lifecycle::Running
            && self.stage.update(dt, &mut self.outbox) == Control::Exit
        {
            self.begin_shutdown("stage update");
        }

        // 4. Flush.
        let disconnected = self.outbox.flush(&mut self.outbound, &mut self.metrics);
        if disconnected && self.lifecycle == Lifecycle::Running {
            tracing::warn!(stage = self.stage.name(), "downstream stage has terminated");
            self.begin_shutdown("downstream gone");
            self.outbox.flush(&mut self.outbound, &mut self.metrics);
        }

        self.end_iteration(start);

        if final_pass {
            self.metrics.drain_passes += 1;
            self.finish_drain_pass();
            self.settling = self.lifecycle == Lifecycle::Draining;
        }
        self.lifecycle
    }

    /// Loop until the stage stops, then hand back the stage and metrics.
    ///
    /// With a tick rate configured the loop sleeps for what remains of each
    /// budget; otherwise it yields once per iteration. Drain passes never
    /// sleep.
    pub fn run(mut self) -> StageOutcome<S> {
        tracing::info!(stage = self.stage.name(), "stage running");
        let budget = self.config.budget();
        loop {
            let start = Instant::now();
            match self.step() {
                Lifecycle::Stopped => break,
                Lifecycle::Running => match budget {
                    Some(budget) => {
                        let elapsed = start.elapsed();
                        if elapsed < budget {
                            thread::sleep(budget - elapsed);
                        }
                    }
                    None => thread::yield_now(),
                },
                Lifecycle::Draining => thread::yield_now(),
            }
        }
        self.into_outcome()
    }

    /// Consume the runner, returning the stage and its metrics.
    pub fn into_outcome(self) -> StageOutcome<S> {
        StageOutcome {
            stage: self.stage,
            metrics: self.metrics,
        }
    }

    // ── Phases ─────────────────────────────────────────────────────

    fn drain_and_dispatch(&mut self) {
        let mut batch = std::mem::take(&mut self.batch);
        for port in 0..self.inbound.len() {
            batch.clear();
            let n = self.inbound[port].drain_into(&mut batch);
            self.metrics.peak_inbound_depth = self.metrics.peak_inbound_depth.max(n);
            for cmd in batch.drain(..) {
                self.dispatch(port, &cmd);
            }
            if self.inbound[port].is_closed() && !self.settled[port] {
                self.settled[port] = true;
                if self.lifecycle == Lifecycle::Running {
                    tracing::warn!(
                        stage = self.stage.name(),
                        queue = self.inbound[port].name(),
                        "inbound queue closed without EXIT"
                    );
                    self.begin_shutdown("upstream gone");
                }
            }
        }
        self.batch = batch;
    }

    /// Drain without dispatching. Runs after the final drain pass, while
    /// waiting for the remaining inbound queues to settle.
    fn settle_inbound(&mut self) {
        let mut batch = std::mem::take(&mut self.batch);
        for port in 0..self.inbound.len() {
            batch.clear();
            let n = self.inbound[port].drain_into(&mut batch);
            self.metrics.peak_inbound_depth = self.metrics.peak_inbound_depth.max(n);
            for cmd in batch.drain(..) {
                if cmd.name() == names::EXIT {
                    self.metrics.commands_dispatched += 1;
                    self.settled[port] = true;
                    tracing::debug!(
                        stage = self.stage.name(),
                        queue = self.inbound[port].name(),
                        "EXIT acknowledged"
                    );
                } else {
                    self.metrics.commands_discarded += 1;
                    tracing::debug!(
                        stage = self.stage.name(),
                        queue = self.inbound[port].name(),
                        command = cmd.name(),
                        "discarding command after final drain pass"
                    );
                }
            }
            if self.inbound[port].is_closed() {
                self.settled[port] = true;
            }
        }
        self.batch = batch;
    }

    fn end_iteration(&mut self, start: Instant) {
        self.metrics.iterations += 1;
        self.metrics.last_iteration_us = start.elapsed().as_micros() as u64;
    }

    fn dispatch(&mut self, port: usize, cmd: &Command) {
        let payload = match Payload::from_command(cmd) {
            Ok(payload) => payload,
            Err(err) => return self.reject(cmd, &err),
        };

        if matches!(payload, Payload::Exit) {
            self.metrics.commands_dispatched += 1;
            self.settled[port] = true;
            if self.lifecycle == Lifecycle::Running {
                self.begin_shutdown("EXIT received");
            } else {
                tracing::debug!(
                    stage = self.stage.name(),
                    queue = self.inbound[port].name(),
                    "EXIT acknowledged"
                );
            }
            return;
        }

        match self.stage.handle(payload, &mut self.outbox) {
            Ok(control) => {
                self.metrics.commands_dispatched += 1;
                if control == Control::Exit {
                    self.begin_shutdown("handler requested exit");
                }
            }
            Err(err) => self.reject(cmd, &err),
        }
    }

    fn reject(&mut self, cmd: &Command, err: &DispatchError) {
        self.metrics.commands_rejected += 1;
        tracing::warn!(
            stage = self.stage.name(),
            command = err.command_name(),
            args = ?cmd.args(),
            "skipping command: {err}"
        );
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Running → Draining. Buffers EXIT on every outbound port.
    fn begin_shutdown(&mut self, reason: &'static str) {
        if self.lifecycle != Lifecycle::Running {
            return;
        }
        tracing::info!(stage = self.stage.name(), reason, "stage draining");
        self.lifecycle = Lifecycle::Draining;
        self.draining_since = Some(Instant::now());
        self.outbox.broadcast(&Payload::Exit);
    }

    fn finish_drain_pass(&mut self) {
        if self.settled.iter().all(|&s| s) {
            self.stop();
            return;
        }
        let waited = self.draining_since.map_or(Duration::ZERO, |t| t.elapsed());
        if waited >= self.config.drain_timeout {
            let unsettled: Vec<&'static str> = self
                .inbound
                .iter()
                .zip(&self.settled)
                .filter(|&(_, &s)| !s)
                .map(|(rx, _)| rx.name())
                .collect();
            tracing::warn!(
                stage = self.stage.name(),
                ?unsettled,
                waited_ms = waited.as_millis() as u64,
                "drain timed out"
            );
            self.metrics.drain_timed_out = true;
            self.stop();
        }
    }

    fn stop(&mut self) {
        self.lifecycle = Lifecycle::Stopped;
        self.outbox.clear();
        self.inbound.clear();
        self.outbound.clear();
        self.stage.on_exit();
        tracing::info!(
            stage = self.stage.name(),
            iterations = self.metrics.iterations,
            dispatched = self.metrics.commands_dispatched,
            rejected = self.metrics.commands_rejected,
            "stage stopped"
        );
    }
}

impl<S: Stage> fmt::Debug for StageRunner<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRunner")
            .field("stage", &self.stage.name())
            .field("lifecycle", &self.lifecycle)
            .field("inbound", &self.inbound)
            .field("outbound", &self.outbound)
            .field("metrics", &self.metrics)
            .finish()
    }
}

fn check_ports(
    stage: &'static str,
    direction: PortDirection,
    expected: usize,
    got: usize,
) -> Result<(), ConfigError> {
    if expected == got {
        Ok(())
    } else {
        Err(ConfigError::PortMismatch {
            stage,
            direction,
            expected,
            got,
        })
    }
}
