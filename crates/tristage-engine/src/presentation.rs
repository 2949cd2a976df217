//! The presentation stage: turns drawables into frames and host input into
//! commands.
//!
//! Presentation drains two queues, drawables from physics first and then
//! stats from state, and writes user input back to the state stage. It is
//! the stage that runs on the controlling thread, because the host it owns
//! usually cannot leave it.

use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use tristage_core::{DispatchError, ObjectId, Payload, Timestamp};

use crate::host::{Dot, Drawable, Frame, HostEvent, PresentationHost};
use crate::stage::{Control, Outbox, Stage};

// ── LatencyReport ──────────────────────────────────────────────────

/// Input latency measured from a `DEBUG_TIME` probe.
///
/// All three intervals come from the same `now` reading, so
/// `presentation_to_state + state_to_presentation == round_trip` up to
/// floating-point rounding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencyReport {
    /// Input capture to probe arrival, in seconds.
    pub round_trip: f64,
    /// Input capture to state-stage handling, in seconds.
    pub presentation_to_state: f64,
    /// State-stage handling to probe arrival, in seconds.
    pub state_to_presentation: f64,
}

impl LatencyReport {
    /// Measure the intervals of a probe stamped at `sent_by_presentation`
    /// and `sent_by_state` and received at `now`.
    pub fn measure(sent_by_presentation: Timestamp, sent_by_state: Timestamp, now: Timestamp) -> Self {
        Self {
            round_trip: now.seconds_since(sent_by_presentation),
            presentation_to_state: sent_by_state.seconds_since(sent_by_presentation),
            state_to_presentation: now.seconds_since(sent_by_state),
        }
    }
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "round trip {:.4}s, presentation->state {:.4}s, state->presentation {:.4}s",
            self.round_trip, self.presentation_to_state, self.state_to_presentation
        )
    }
}

// ── PresentationStage ──────────────────────────────────────────────

/// Stage that owns the presentation host.
pub struct PresentationStage<H> {
    host: H,
    drawables: IndexMap<ObjectId, Drawable>,
    dots: Vec<Dot>,
    last_latency: Option<LatencyReport>,
    events: Vec<HostEvent>,
    frames: u64,
}

impl<H: PresentationHost> PresentationStage<H> {
    /// Inbound port carrying drawables from physics.
    pub const DRAW_IN: usize = 0;
    /// Inbound port carrying stats from state.
    pub const STATS_IN: usize = 1;
    /// Outbound port carrying user input to state.
    pub const USER_OUT: usize = 0;

    /// Wrap `host`.
    pub fn new(host: H) -> Self {
        Self {
            host,
            drawables: IndexMap::new(),
            dots: Vec::new(),
            last_latency: None,
            events: Vec::new(),
            frames: 0,
        }
    }

    /// The host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Give the host back.
    pub fn into_host(self) -> H {
        self.host
    }

    /// Current drawables.
    pub fn drawables(&self) -> &IndexMap<ObjectId, Drawable> {
        &self.drawables
    }

    /// Debug dots received so far.
    pub fn dots(&self) -> &[Dot] {
        &self.dots
    }

    /// Most recent latency measurement.
    pub fn last_latency(&self) -> Option<&LatencyReport> {
        self.last_latency.as_ref()
    }

    /// Frames handed to the host.
    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    fn record_latency(&mut self, sent_by_presentation: Timestamp, sent_by_state: Timestamp) {
        let report = LatencyReport::measure(sent_by_presentation, sent_by_state, Timestamp::now());
        tracing::info!(
            round_trip = report.round_trip,
            presentation_to_state = report.presentation_to_state,
            state_to_presentation = report.state_to_presentation,
            "input latency: {report}"
        );
        self.last_latency = Some(report);
    }

    /// Translate one host event. Returns `Control::Exit` on a close request.
    fn translate(event: HostEvent, out: &mut Outbox) -> Control {
        match event {
            HostEvent::KeyPress { key, modifiers } => out.send(
                Self::USER_OUT,
                Payload::UserKeyPress {
                    key,
                    modifiers,
                    sent_at: Timestamp::now(),
                },
            ),
            HostEvent::KeyRelease { key, modifiers } => {
                out.send(Self::USER_OUT, Payload::UserKeyRelease { key, modifiers })
            }
            HostEvent::MousePress {
                x,
                y,
                button,
                modifiers,
            } => tracing::info!(x, y, button, modifiers = modifiers.0, "mouse press"),
            HostEvent::CloseRequested => {
                tracing::info!("window close requested");
                return Control::Exit;
            }
        }
        Control::Continue
    }
}

impl<H> fmt::Debug for PresentationStage<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentationStage")
            .field("drawables", &self.drawables.len())
            .field("dots", &self.dots.len())
            .field("last_latency", &self.last_latency)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl<H: PresentationHost> Stage for PresentationStage<H> {
    fn name(&self) -> &'static str {
        "presentation"
    }

    fn inbound_ports(&self) -> &'static [&'static str] {
        &["draw", "stats"]
    }

    fn outbound_ports(&self) -> &'static [&'static str] {
        &["user_input"]
    }

    fn handle(&mut self, payload: Payload, _out: &mut Outbox) -> Result<Control, DispatchError> {
        match payload {
            Payload::DrawObject { id, position } => {
                self.drawables.insert(id, Drawable { position });
            }
            Payload::EraseObject { id } => {
                self.drawables.shift_remove(&id);
            }
            Payload::DebugDotScreen { x, y, radius } => self.dots.push(Dot { x, y, radius }),
            Payload::DebugTime {
                sent_by_presentation,
                sent_by_state,
            } => self.record_latency(sent_by_presentation, sent_by_state),
            other => {
                return Err(DispatchError::UnknownCommand {
                    name: other.name().to_owned(),
                })
            }
        }
        Ok(Control::Continue)
    }

    fn update(&mut self, _dt: Duration, out: &mut Outbox) -> Control {
        let mut events = std::mem::take(&mut self.events);
        events.clear();
        if let Err(err) = self.host.poll_events(&mut events) {
            tracing::error!(error = %err, "presentation host failed");
            self.events = events;
            return Control::Exit;
        }

        let mut control = Control::Continue;
        for event in events.drain(..) {
            if Self::translate(event, out) == Control::Exit {
                control = Control::Exit;
            }
        }
        self.events = events;
        if control == Control::Exit {
            return control;
        }

        let frame = Frame {
            drawables: &self.drawables,
            dots: &self.dots,
            latency: self.last_latency.as_ref(),
        };
        if let Err(err) = self.host.present(&frame) {
            tracing::error!(error = %err, "presentation host failed");
            return Control::Exit;
        }
        self.frames += 1;
        Control::Continue
    }
}
