//! Per-stage loop metrics.
//!
//! [`StageMetrics`] is owned by each [`StageRunner`](crate::StageRunner)
//! and updated every iteration. It is returned to the caller when the
//! stage stops and is otherwise readable through
//! [`StageRunner::metrics`](crate::StageRunner::metrics).

/// Counters and timings collected by one stage loop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageMetrics {
    /// Loop iterations executed, including drain passes.
    pub iterations: u64,
    /// Commands that decoded and reached a handler (EXIT included).
    pub commands_dispatched: u64,
    /// Commands reported and skipped (short, mistyped, or unknown).
    pub commands_rejected: u64,
    /// Commands pushed onto outbound queues.
    pub commands_emitted: u64,
    /// Pushes that failed because the consumer stage had terminated.
    pub push_failures: u64,
    /// Commands consumed but not handled because they arrived after the
    /// final drain pass.
    pub commands_discarded: u64,
    /// Deepest inbound queue observed, measured as the number of commands
    /// taken by a single drain.
    pub peak_inbound_depth: usize,
    /// Wall-clock time of the most recent iteration, in microseconds.
    pub last_iteration_us: u64,
    /// Iterations executed while draining for shutdown.
    pub drain_passes: u64,
    /// Whether the drain phase gave up waiting for peers.
    pub drain_timed_out: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = StageMetrics::default();
        assert_eq!(m.iterations, 0);
        assert_eq!(m.commands_dispatched, 0);
        assert_eq!(m.commands_rejected, 0);
        assert_eq!(m.commands_emitted, 0);
        assert_eq!(m.push_failures, 0);
        assert_eq!(m.commands_discarded, 0);
        assert_eq!(m.peak_inbound_depth, 0);
        assert_eq!(m.last_iteration_us, 0);
        assert_eq!(m.drain_passes, 0);
        assert!(!m.drain_timed_out);
    }
}
