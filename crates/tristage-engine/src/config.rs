//! Pipeline configuration, validation, and error types.
//!
//! [`PipelineConfig`] bundles one [`QueueConfig`] shared by all four queues
//! and one [`StageConfig`] per stage. [`validate()`](PipelineConfig::validate)
//! checks structural invariants before any thread is spawned.

use std::error::Error;
use std::fmt;
use std::time::Duration;

// ── QueueConfig ────────────────────────────────────────────────────

/// Configuration for a [`command_queue`](crate::queue::command_queue).
///
/// Queues are unbounded. `depth_warning` is a soft threshold: crossing it
/// logs a warning and nothing else. Push never blocks or drops.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Queue depth that triggers a runaway-producer warning. Default: 10 000.
    pub depth_warning: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            depth_warning: 10_000,
        }
    }
}

// ── StageConfig ────────────────────────────────────────────────────

/// Per-stage loop configuration.
#[derive(Clone, Debug)]
pub struct StageConfig {
    /// Optional local throttle. `None` = free-running (the loop yields once
    /// per iteration). `Some(hz)` sleeps for the remainder of each
    /// `1 / hz` budget.
    pub tick_rate_hz: Option<f64>,
    /// Upper bound on the time a draining stage waits for every inbound
    /// queue to deliver its EXIT or close. Default: 2 s.
    pub drain_timeout: Duration,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: None,
            drain_timeout: Duration::from_secs(2),
        }
    }
}

impl StageConfig {
    /// A config throttled to `hz` iterations per second.
    pub fn throttled(hz: f64) -> Self {
        Self {
            tick_rate_hz: Some(hz),
            ..Self::default()
        }
    }

    /// Validate the loop parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // The reciprocal must also be finite: a subnormal rate would make
        // Duration::from_secs_f64 panic.
        if let Some(hz) = self.tick_rate_hz {
            if !hz.is_finite() || hz <= 0.0 || !(1.0 / hz).is_finite() {
                return Err(ConfigError::InvalidTickRate { value: hz });
            }
        }
        if self.drain_timeout.is_zero() {
            return Err(ConfigError::DrainTimeoutZero);
        }
        Ok(())
    }

    /// Iteration budget derived from `tick_rate_hz`.
    pub(crate) fn budget(&self) -> Option<Duration> {
        self.tick_rate_hz.map(|hz| Duration::from_secs_f64(1.0 / hz))
    }
}

// ── PipelineConfig ─────────────────────────────────────────────────

/// Complete configuration for [`Pipeline::launch`](crate::Pipeline::launch).
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Shared by all four queues.
    pub queue: QueueConfig,
    /// State stage loop. Default: free-running.
    pub state: StageConfig,
    /// Physics stage loop. Default: free-running.
    pub physics: StageConfig,
    /// Presentation stage loop. Default: 60 Hz.
    pub presentation: StageConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            state: StageConfig::default(),
            physics: StageConfig::default(),
            presentation: StageConfig::throttled(60.0),
        }
    }
}

impl PipelineConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.depth_warning == 0 {
            return Err(ConfigError::DepthWarningZero);
        }
        self.state.validate()?;
        self.physics.validate()?;
        self.presentation.validate()?;
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Direction of a stage port, used in [`ConfigError::PortMismatch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDirection {
    /// Queues the stage reads from.
    Inbound,
    /// Queues the stage writes to.
    Outbound,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

/// Errors detected while validating configuration or wiring stages.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// tick_rate_hz is NaN, infinite, zero, or negative.
    InvalidTickRate {
        /// The invalid value.
        value: f64,
    },
    /// drain_timeout is zero.
    DrainTimeoutZero,
    /// depth_warning is zero.
    DepthWarningZero,
    /// A stage was given a different number of queues than it declares.
    PortMismatch {
        /// Stage name.
        stage: &'static str,
        /// Which side of the stage.
        direction: PortDirection,
        /// Number of ports the stage declares.
        expected: usize,
        /// Number of queues supplied.
        got: usize,
    },
    /// A stage thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of which thread failed.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTickRate { value } => {
                write!(f, "tick_rate_hz must be finite and positive, got {value}")
            }
            Self::DrainTimeoutZero => write!(f, "drain_timeout must be non-zero"),
            Self::DepthWarningZero => write!(f, "depth_warning must be at least 1"),
            Self::PortMismatch {
                stage,
                direction,
                expected,
                got,
            } => write!(
                f,
                "stage {stage} declares {expected} {direction} ports but was given {got} queues"
            ),
            Self::ThreadSpawnFailed { reason } => {
                write!(f, "thread spawn failed: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(PipelineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_tick_rates() {
        for hz in [0.0, -1.0, f64::NAN, f64::INFINITY, f64::MIN_POSITIVE / 4.0] {
            let cfg = StageConfig {
                tick_rate_hz: Some(hz),
                ..StageConfig::default()
            };
            assert!(
                matches!(cfg.validate(), Err(ConfigError::InvalidTickRate { .. })),
                "{hz} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_zero_drain_timeout() {
        let cfg = StageConfig {
            drain_timeout: Duration::ZERO,
            ..StageConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::DrainTimeoutZero));
    }

    #[test]
    fn rejects_zero_depth_warning() {
        let cfg = PipelineConfig {
            queue: QueueConfig { depth_warning: 0 },
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::DepthWarningZero));
    }

    #[test]
    fn nested_stage_errors_surface() {
        let cfg = PipelineConfig {
            physics: StageConfig {
                tick_rate_hz: Some(-5.0),
                ..StageConfig::default()
            },
            ..PipelineConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::InvalidTickRate { value: -5.0 })
        );
    }

    #[test]
    fn throttled_budget() {
        let budget = StageConfig::throttled(50.0).budget().unwrap();
        assert_eq!(budget, Duration::from_millis(20));
        assert!(StageConfig::default().budget().is_none());
    }
}
