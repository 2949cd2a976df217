//! Single-producer, single-consumer command queues.
//!
//! A queue is an unbounded crossbeam channel split into a [`QueueSender`]
//! and a [`QueueReceiver`]. Neither half is `Clone`, so a queue always has
//! exactly one producer stage and one consumer stage.
//!
//! Draining is poll-based: [`QueueReceiver::drain_into`] returns at once
//! with whatever was present when it was called, possibly nothing. A stage
//! never blocks waiting on a peer.

use std::error::Error;
use std::fmt;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tristage_core::Command;

use crate::config::QueueConfig;

/// Error returned by [`QueueSender::push`].
#[derive(Debug, PartialEq)]
pub enum PushError {
    /// The consumer half was dropped: its stage has terminated.
    Disconnected {
        /// Queue name.
        queue: &'static str,
        /// The command that could not be delivered.
        command: Command,
    },
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected { queue, command } => {
                write!(f, "queue {queue} is disconnected, dropped {}", command.name())
            }
        }
    }
}

impl Error for PushError {}

/// Create a named queue and return its producer and consumer halves.
pub fn command_queue(name: &'static str, config: &QueueConfig) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (
        QueueSender {
            name,
            tx,
            depth_warning: config.depth_warning.max(1),
            high_water: 0,
            warned: false,
            warnings: 0,
        },
        QueueReceiver {
            name,
            rx,
            held: None,
            closed: false,
        },
    )
}

/// Producer half of a command queue.
pub struct QueueSender {
    name: &'static str,
    tx: Sender<Command>,
    depth_warning: usize,
    high_water: usize,
    warned: bool,
    warnings: u64,
}

impl QueueSender {
    /// Enqueue a command. Never blocks.
    ///
    /// Fails only if the consumer has terminated; the command is handed
    /// back inside the error.
    pub fn push(&mut self, command: Command) -> Result<(), PushError> {
        let before = self.tx.len();
        self.tx
            .send(command)
            .map_err(|e| PushError::Disconnected {
                queue: self.name,
                command: e.into_inner(),
            })?;
        self.observe_depth(before);
        Ok(())
    }

    /// `before` is the depth seen just ahead of the push. The warning
    /// re-arms once the consumer has brought that to half the threshold
    /// or below.
    fn observe_depth(&mut self, before: usize) {
        if self.warned && before <= self.depth_warning / 2 {
            self.warned = false;
        }
        let depth = self.tx.len();
        self.high_water = self.high_water.max(depth);
        if !self.warned && depth >= self.depth_warning {
            self.warned = true;
            self.warnings += 1;
            tracing::warn!(
                queue = self.name,
                depth,
                threshold = self.depth_warning,
                "queue depth crossed warning threshold; consumer is falling behind"
            );
        }
    }

    /// Queue name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Commands currently waiting in the queue.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Largest depth observed right after a push.
    pub fn high_water_mark(&self) -> usize {
        self.high_water
    }

    /// Times the depth warning has fired.
    pub fn depth_warnings(&self) -> u64 {
        self.warnings
    }
}

impl fmt::Debug for QueueSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSender")
            .field("name", &self.name)
            .field("len", &self.tx.len())
            .field("high_water", &self.high_water)
            .field("warned", &self.warned)
            .finish()
    }
}

/// Consumer half of a command queue.
pub struct QueueReceiver {
    name: &'static str,
    rx: Receiver<Command>,
    // Taken by the closing poll; logically still at the head of the queue.
    held: Option<Command>,
    closed: bool,
}

impl QueueReceiver {
    /// Move every command present at call time into `out`, in FIFO order.
    ///
    /// Returns the number of commands moved. Never blocks, and never moves
    /// a command pushed after the call began; those are left for the next
    /// call.
    pub fn drain_into(&mut self, out: &mut Vec<Command>) -> usize {
        let available = self.len();
        let mut moved = 0;
        if let Some(command) = self.held.take() {
            out.push(command);
            moved += 1;
        }
        while moved < available {
            match self.rx.try_recv() {
                Ok(command) => {
                    out.push(command);
                    moved += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    return moved;
                }
            }
        }
        self.poll_closed();
        moved
    }

    /// Distinguish an empty queue from a closed one. A command that lands
    /// in between is held back for the next drain.
    fn poll_closed(&mut self) {
        if self.closed || self.held.is_some() {
            return;
        }
        match self.rx.try_recv() {
            Ok(command) => self.held = Some(command),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.closed = true,
        }
    }

    /// Pop every command currently available. Never blocks.
    pub fn try_pop_all(&mut self) -> Vec<Command> {
        let mut out = Vec::new();
        self.drain_into(&mut out);
        out
    }

    /// Whether the producer half has been dropped and the queue observed
    /// empty. Updated by draining.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Queue name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Commands currently waiting in the queue.
    pub fn len(&self) -> usize {
        self.rx.len() + usize::from(self.held.is_some())
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.held.is_none() && self.rx.is_empty()
    }
}

impl fmt::Debug for QueueReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueReceiver")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("closed", &self.closed)
            .finish()
    }
}

// Both halves move into stage threads.
const _: fn() = || {
    fn assert<T: Send>() {}
    assert::<QueueSender>();
    assert::<QueueReceiver>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;
    use tristage_core::{encode, Arg, Payload};

    fn numbered(i: i64) -> Command {
        encode("SEQ", [Arg::Int(i)]).unwrap()
    }

    fn seq_of(cmd: &Command) -> i64 {
        cmd.args()[0].as_i64().unwrap()
    }

    #[test]
    fn empty_queue_drains_nothing() {
        let (_tx, mut rx) = command_queue("test", &QueueConfig::default());
        assert!(rx.try_pop_all().is_empty());
        assert!(!rx.is_closed());
    }

    #[test]
    fn drain_preserves_fifo() {
        let (mut tx, mut rx) = command_queue("test", &QueueConfig::default());
        for i in 0..10 {
            tx.push(numbered(i)).unwrap();
        }
        assert_eq!(tx.len(), 10);
        let got: Vec<i64> = rx.try_pop_all().iter().map(seq_of).collect();
        assert_eq!(got, (0..10).collect::<Vec<_>>());
        assert!(rx.is_empty());
    }

    #[test]
    fn closed_is_reported_only_after_queue_is_empty() {
        let (mut tx, mut rx) = command_queue("test", &QueueConfig::default());
        tx.push(Payload::Exit.into_command()).unwrap();
        drop(tx);
        let first = rx.try_pop_all();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name(), "EXIT");
        // The extra poll already saw the disconnect.
        assert!(rx.is_closed());
        assert!(rx.try_pop_all().is_empty());
    }

    #[test]
    fn push_to_dropped_consumer_returns_command() {
        let (mut tx, rx) = command_queue("orphan", &QueueConfig::default());
        drop(rx);
        let cmd = Payload::Exit.into_command();
        match tx.push(cmd.clone()) {
            Err(PushError::Disconnected { queue, command }) => {
                assert_eq!(queue, "orphan");
                assert_eq!(command, cmd);
            }
            other => panic!("expected Disconnected, got {other:?}"),
        }
    }

    #[test]
    fn high_water_mark_tracks_peak_depth() {
        let (mut tx, mut rx) = command_queue("hw", &QueueConfig { depth_warning: 3 });
        for i in 0..5 {
            tx.push(numbered(i)).unwrap();
        }
        rx.try_pop_all();
        tx.push(numbered(5)).unwrap();
        assert_eq!(tx.high_water_mark(), 5);
        assert_eq!(tx.len(), 1);
    }

    #[test]
    fn depth_warning_fires_once_per_crossing() {
        let (mut tx, _rx) = command_queue("slow", &QueueConfig { depth_warning: 3 });
        for i in 0..2 {
            tx.push(numbered(i)).unwrap();
        }
        assert!(!tx.warned);
        for i in 2..10 {
            tx.push(numbered(i)).unwrap();
        }
        assert!(tx.warned);
        assert_eq!(tx.depth_warnings(), 1);
    }

    #[test]
    fn depth_warning_rearms_after_consumer_catches_up() {
        let (mut tx, mut rx) = command_queue("slow", &QueueConfig { depth_warning: 3 });
        for i in 0..3 {
            tx.push(numbered(i)).unwrap();
        }
        assert!(tx.warned);

        rx.try_pop_all();
        tx.push(numbered(3)).unwrap();
        assert_eq!(tx.len(), 1);
        assert!(!tx.warned);

        tx.push(numbered(4)).unwrap();
        tx.push(numbered(5)).unwrap();
        assert_eq!(tx.depth_warnings(), 2);
    }

    #[test]
    fn threshold_of_one_rearms_between_bursts() {
        let (mut tx, mut rx) = command_queue("tight", &QueueConfig { depth_warning: 1 });
        tx.push(numbered(0)).unwrap();
        tx.push(numbered(1)).unwrap();
        assert_eq!(tx.depth_warnings(), 1);

        rx.try_pop_all();
        tx.push(numbered(2)).unwrap();
        assert_eq!(tx.depth_warnings(), 2);
    }

    #[test]
    fn command_caught_by_closing_poll_is_held_in_order() {
        let (mut tx, mut rx) = command_queue("race", &QueueConfig::default());
        tx.push(numbered(0)).unwrap();
        // Stands in for a push landing between the last pop and the
        // closing poll.
        rx.poll_closed();
        assert!(!rx.is_closed());
        assert_eq!(rx.len(), 1);

        tx.push(numbered(1)).unwrap();
        drop(tx);
        let got: Vec<i64> = rx.try_pop_all().iter().map(seq_of).collect();
        assert_eq!(got, vec![0, 1]);
        assert!(rx.is_closed());
    }

    #[test]
    fn drain_moves_at_most_what_was_present() {
        let (mut tx, mut rx) = command_queue("bounded", &QueueConfig::default());
        tx.push(numbered(0)).unwrap();
        rx.poll_closed();
        tx.push(numbered(1)).unwrap();
        tx.push(numbered(2)).unwrap();

        let mut out = Vec::new();
        assert_eq!(rx.drain_into(&mut out), 3);
        assert_eq!(out.iter().map(seq_of).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(rx.is_empty());
    }

    #[test]
    fn cross_thread_delivery_is_ordered_and_lossless() {
        let (mut tx, mut rx) = command_queue("xthread", &QueueConfig::default());
        let producer = thread::spawn(move || {
            for i in 0..10_000 {
                tx.push(numbered(i)).unwrap();
            }
        });

        let mut seen = Vec::with_capacity(10_000);
        let mut batch = Vec::new();
        while !rx.is_closed() {
            batch.clear();
            rx.drain_into(&mut batch);
            seen.extend(batch.iter().map(seq_of));
            thread::yield_now();
        }
        producer.join().unwrap();
        assert_eq!(seen, (0..10_000).collect::<Vec<_>>());
    }

    proptest! {
        #[test]
        fn interleaved_pushes_and_polls_keep_order(
            chunks in proptest::collection::vec(0usize..20, 1..20),
        ) {
            let (mut tx, mut rx) = command_queue("prop", &QueueConfig::default());
            let mut next = 0i64;
            let mut seen = Vec::new();
            for chunk in chunks {
                for _ in 0..chunk {
                    tx.push(numbered(next)).unwrap();
                    next += 1;
                }
                seen.extend(rx.try_pop_all().iter().map(seq_of));
            }
            prop_assert_eq!(seen, (0..next).collect::<Vec<_>>());
        }
    }
}
