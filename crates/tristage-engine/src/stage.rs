//! The [`Stage`] trait and the per-stage [`Outbox`].
//!
//! A stage is plain single-threaded logic: it handles one typed
//! [`Payload`] at a time and advances its own state once per loop
//! iteration. Everything else (draining queues, flushing buffers,
//! lifecycle, EXIT propagation) belongs to
//! [`StageRunner`](crate::StageRunner).

use std::time::Duration;

use tristage_core::{Command, DispatchError, Payload};

use crate::metrics::StageMetrics;
use crate::queue::{PushError, QueueSender};

/// What a stage asks of its runner after a handler or update call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Keep running.
    Continue,
    /// Leave `Running`, equivalent to dispatching a local EXIT.
    Exit,
}

/// Stage logic driven by a [`StageRunner`](crate::StageRunner).
///
/// `EXIT` never reaches [`handle`](Stage::handle): the runner consumes it
/// and drives shutdown itself. A payload the stage does not consume should
/// be answered with [`DispatchError::UnknownCommand`]; the runner logs and
/// skips it.
pub trait Stage {
    /// Stage name used in logs and thread names.
    fn name(&self) -> &'static str;

    /// Names of the queues this stage reads, in drain order.
    fn inbound_ports(&self) -> &'static [&'static str];

    /// Names of the queues this stage writes. [`Outbox::send`] takes an
    /// index into this slice.
    fn outbound_ports(&self) -> &'static [&'static str];

    /// Handle one decoded command.
    fn handle(&mut self, payload: Payload, out: &mut Outbox) -> Result<Control, DispatchError>;

    /// Advance stage-owned state by `dt`. Runs once per iteration while
    /// the stage is running.
    fn update(&mut self, dt: Duration, out: &mut Outbox) -> Control;

    /// Called once when the stage reaches `Stopped`.
    fn on_exit(&mut self) {}
}

/// Per-outbound-port command buffers.
///
/// Commands produced during dispatch and update are buffered here and
/// pushed once per iteration, in the order they were buffered.
#[derive(Debug)]
pub struct Outbox {
    buffers: Vec<Vec<Command>>,
}

impl Outbox {
    /// An outbox with `ports` empty buffers.
    pub fn new(ports: usize) -> Self {
        Self {
            buffers: (0..ports).map(|_| Vec::new()).collect(),
        }
    }

    /// Buffer `payload` for the outbound port at index `port`.
    ///
    /// A port index outside the stage's declared ports is a wiring bug; the
    /// command is logged and discarded.
    pub fn send(&mut self, port: usize, payload: Payload) {
        match self.buffers.get_mut(port) {
            Some(buf) => buf.push(payload.into_command()),
            None => tracing::error!(
                port,
                ports = self.buffers.len(),
                command = payload.name(),
                "send to undeclared outbound port"
            ),
        }
    }

    /// Buffered commands for `port`, oldest first.
    pub fn pending(&self, port: usize) -> &[Command] {
        self.buffers.get(port).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of outbound ports.
    pub fn port_count(&self) -> usize {
        self.buffers.len()
    }

    /// Total buffered commands across all ports.
    pub fn len(&self) -> usize {
        self.buffers.iter().map(Vec::len).sum()
    }

    /// Whether every buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffers.iter().all(Vec::is_empty)
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        self.buffers.iter_mut().for_each(Vec::clear);
    }

    /// Buffer `payload` on every port.
    pub(crate) fn broadcast(&mut self, payload: &Payload) {
        for buf in &mut self.buffers {
            buf.push(payload.clone().into_command());
        }
    }

    /// Push every buffer onto its queue, in buffered order, and clear it.
    ///
    /// Returns `true` if any queue had lost its consumer.
    pub(crate) fn flush(&mut self, senders: &mut [QueueSender], metrics: &mut StageMetrics) -> bool {
        let mut disconnected = false;
        for (buf, tx) in self.buffers.iter_mut().zip(senders.iter_mut()) {
            for cmd in buf.drain(..) {
                match tx.push(cmd) {
                    Ok(()) => metrics.commands_emitted += 1,
                    Err(PushError::Disconnected { queue, command }) => {
                        metrics.push_failures += 1;
                        disconnected = true;
                        tracing::debug!(queue, command = command.name(), "consumer gone");
                    }
                }
            }
        }
        disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::queue::command_queue;
    use tristage_core::ObjectId;

    #[test]
    fn send_buffers_per_port_in_order() {
        let mut out = Outbox::new(2);
        out.send(1, Payload::ObjectRemove { id: ObjectId(1) });
        out.send(0, Payload::Exit);
        out.send(1, Payload::ObjectRemove { id: ObjectId(2) });
        assert_eq!(out.len(), 3);
        assert_eq!(out.pending(0).len(), 1);
        let ids: Vec<_> = out.pending(1).iter().map(|c| c.args()[0].clone()).collect();
        assert_eq!(ids, vec![1i64.into(), 2i64.into()]);
    }

    #[test]
    fn send_to_undeclared_port_is_discarded() {
        let mut out = Outbox::new(1);
        out.send(3, Payload::Exit);
        assert!(out.is_empty());
        assert!(out.pending(3).is_empty());
    }

    #[test]
    fn broadcast_reaches_every_port() {
        let mut out = Outbox::new(3);
        out.broadcast(&Payload::Exit);
        for port in 0..3 {
            assert_eq!(out.pending(port).len(), 1);
            assert_eq!(out.pending(port)[0].name(), "EXIT");
        }
    }

    #[test]
    fn flush_pushes_and_clears() {
        let cfg = QueueConfig::default();
        let (tx_a, mut rx_a) = command_queue("a", &cfg);
        let (tx_b, rx_b) = command_queue("b", &cfg);
        drop(rx_b);
        let mut senders = vec![tx_a, tx_b];
        let mut metrics = StageMetrics::default();

        let mut out = Outbox::new(2);
        out.send(0, Payload::Exit);
        out.send(1, Payload::Exit);
        let disconnected = out.flush(&mut senders, &mut metrics);

        assert!(disconnected);
        assert!(out.is_empty());
        assert_eq!(metrics.commands_emitted, 1);
        assert_eq!(metrics.push_failures, 1);
        assert_eq!(rx_a.try_pop_all().len(), 1);
    }
}
