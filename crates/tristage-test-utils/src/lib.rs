//! Test utilities for tristage development.
//!
//! [`ScriptedHost`] stands in for a window and input device: it replays
//! scripted events one batch per frame and records every frame it is
//! asked to present. The free functions build queues and collect what a
//! stage pushed onto them.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use tristage_core::{Command, Key, Modifiers, ObjectId};
use tristage_engine::{
    command_queue, Frame, HostError, HostEvent, LatencyReport, PresentationHost, QueueConfig,
    QueueReceiver, QueueSender,
};

// ── ScriptedHost ───────────────────────────────────────────────────

/// Snapshot of one presented frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedFrame {
    pub drawables: Vec<(ObjectId, [f64; 2])>,
    pub dots: usize,
    pub latency: Option<LatencyReport>,
}

/// A [`PresentationHost`] driven by a script.
///
/// Each poll hands out the next scripted batch (possibly empty). Once the
/// script runs out the host idles, or requests a close if built with
/// [`close_when_done`](ScriptedHost::close_when_done).
#[derive(Debug, Default)]
pub struct ScriptedHost {
    script: VecDeque<Vec<HostEvent>>,
    close_when_done: bool,
    fail_on_poll: Option<usize>,
    polls: usize,
    frames: Vec<RecordedFrame>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch of events for one frame.
    pub fn then(mut self, events: impl IntoIterator<Item = HostEvent>) -> Self {
        self.script.push_back(events.into_iter().collect());
        self
    }

    /// Queue `n` frames with no input.
    pub fn idle(mut self, n: usize) -> Self {
        for _ in 0..n {
            self.script.push_back(Vec::new());
        }
        self
    }

    /// Request a window close once the script is exhausted.
    pub fn close_when_done(mut self) -> Self {
        self.close_when_done = true;
        self
    }

    /// Fail with [`HostError::DeviceLost`] on the `n`th poll (0-based).
    pub fn fail_on_poll(mut self, n: usize) -> Self {
        self.fail_on_poll = Some(n);
        self
    }

    /// Every frame presented so far.
    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    /// The most recent frame.
    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }
}

impl PresentationHost for ScriptedHost {
    fn poll_events(&mut self, events: &mut Vec<HostEvent>) -> Result<(), HostError> {
        let poll = self.polls;
        self.polls += 1;
        if self.fail_on_poll == Some(poll) {
            return Err(HostError::DeviceLost {
                reason: format!("scripted failure on poll {poll}"),
            });
        }
        match self.script.pop_front() {
            Some(batch) => events.extend(batch),
            None if self.close_when_done => events.push(HostEvent::CloseRequested),
            None => {}
        }
        Ok(())
    }

    fn present(&mut self, frame: &Frame<'_>) -> Result<(), HostError> {
        self.frames.push(RecordedFrame {
            drawables: frame
                .drawables
                .iter()
                .map(|(id, d)| (*id, d.position))
                .collect(),
            dots: frame.dots.len(),
            latency: frame.latency.copied(),
        });
        Ok(())
    }
}

// ── Event builders ─────────────────────────────────────────────────

pub fn key_press(key: &str) -> HostEvent {
    HostEvent::KeyPress {
        key: Key::new(key),
        modifiers: Modifiers::NONE,
    }
}

pub fn key_release(key: &str) -> HostEvent {
    HostEvent::KeyRelease {
        key: Key::new(key),
        modifiers: Modifiers::NONE,
    }
}

// ── Queue helpers ──────────────────────────────────────────────────

/// A queue with the default configuration.
pub fn queue(name: &'static str) -> (QueueSender, QueueReceiver) {
    command_queue(name, &QueueConfig::default())
}

/// Names of the given commands, in order.
pub fn names(commands: &[Command]) -> Vec<&str> {
    commands.iter().map(Command::name).collect()
}

/// Drain `rx` until its producer is dropped, or panic after `timeout`.
pub fn collect_until_closed(rx: &mut QueueReceiver, timeout: Duration) -> Vec<Command> {
    let deadline = Instant::now() + timeout;
    let mut out = Vec::new();
    while !rx.is_closed() {
        rx.drain_into(&mut out);
        assert!(
            Instant::now() < deadline,
            "queue {} still open after {timeout:?}",
            rx.name()
        );
        thread::yield_now();
    }
    out
}
