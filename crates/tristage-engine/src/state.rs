//! The state stage: authoritative game state and input handling.

use std::time::Duration;

use indexmap::IndexSet;
use tristage_core::{DispatchError, Key, ObjectId, Payload, Timestamp};

use crate::physics::Body;
use crate::stage::{Control, Outbox, Stage};

/// Stage that consumes user input and drives physics and the stats display.
///
/// Every key press is answered with a `DEBUG_TIME` probe on the stats port
/// so presentation can measure round-trip input latency. `ESCAPE` shuts the
/// pipeline down; `SPACE` asks presentation to draw a debug dot.
#[derive(Debug, Default)]
pub struct StateStage {
    held_keys: IndexSet<Key>,
    pending: Vec<Payload>,
    presses: u64,
}

impl StateStage {
    /// Outbound port to the physics stage.
    pub const PHYSICS_OUT: usize = 0;
    /// Outbound port to the presentation stage's stats input.
    pub const STATS_OUT: usize = 1;

    /// Debug dot drawn when `SPACE` is pressed: `(x, y, radius)`.
    pub const DEBUG_DOT: (f64, f64, f64) = (10.0, 20.0, 15.0);

    /// A state stage with an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// A state stage whose first update publishes `scene` to physics.
    pub fn with_scene(scene: impl IntoIterator<Item = (ObjectId, Body)>) -> Self {
        let mut stage = Self::new();
        for (id, body) in scene {
            stage.spawn(id, body);
        }
        stage
    }

    /// Publish `body` to physics on the next update.
    pub fn spawn(&mut self, id: ObjectId, body: Body) {
        self.pending.push(Payload::ObjectUpdate {
            id,
            position: body.position,
            velocity: body.velocity,
        });
    }

    /// Remove an object from physics on the next update.
    pub fn despawn(&mut self, id: ObjectId) {
        self.pending.push(Payload::ObjectRemove { id });
    }

    /// Keys currently held, in press order.
    pub fn held_keys(&self) -> &IndexSet<Key> {
        &self.held_keys
    }

    /// Key presses handled so far.
    pub fn presses(&self) -> u64 {
        self.presses
    }

    fn key_pressed(&mut self, key: Key, sent_at: Timestamp, out: &mut Outbox) -> Control {
        self.presses += 1;
        let control = match key.as_str() {
            Key::ESCAPE => Control::Exit,
            Key::SPACE => {
                let (x, y, radius) = Self::DEBUG_DOT;
                out.send(Self::STATS_OUT, Payload::DebugDotScreen { x, y, radius });
                Control::Continue
            }
            _ => Control::Continue,
        };
        self.held_keys.insert(key);
        out.send(
            Self::STATS_OUT,
            Payload::DebugTime {
                sent_by_presentation: sent_at,
                sent_by_state: Timestamp::now(),
            },
        );
        control
    }
}

impl Stage for StateStage {
    fn name(&self) -> &'static str {
        "state"
    }

    fn inbound_ports(&self) -> &'static [&'static str] {
        &["user_input"]
    }

    fn outbound_ports(&self) -> &'static [&'static str] {
        &["object_updates", "stats"]
    }

    fn handle(&mut self, payload: Payload, out: &mut Outbox) -> Result<Control, DispatchError> {
        match payload {
            Payload::UserKeyPress { key, sent_at, .. } => Ok(self.key_pressed(key, sent_at, out)),
            Payload::UserKeyRelease { key, .. } => {
                self.held_keys.shift_remove(&key);
                Ok(Control::Continue)
            }
            other => Err(DispatchError::UnknownCommand {
                name: other.name().to_owned(),
            }),
        }
    }

    fn update(&mut self, _dt: Duration, out: &mut Outbox) -> Control {
        for payload in self.pending.drain(..) {
            out.send(Self::PHYSICS_OUT, payload);
        }
        Control::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tristage_core::Modifiers;

    fn press(key: &str, sent_at: Timestamp) -> Payload {
        Payload::UserKeyPress {
            key: Key::new(key),
            modifiers: Modifiers::NONE,
            sent_at,
        }
    }

    fn stats(out: &Outbox) -> Vec<Payload> {
        out.pending(StateStage::STATS_OUT)
            .iter()
            .map(|c| Payload::from_command(c).unwrap())
            .collect()
    }

    #[test]
    fn space_buffers_dot_and_one_latency_probe() {
        let mut stage = StateStage::new();
        let mut out = Outbox::new(2);
        let t0 = Timestamp::now();
        let control = stage.handle(press("SPACE", t0), &mut out).unwrap();
        assert_eq!(control, Control::Continue);

        let stats = stats(&out);
        assert_eq!(stats.len(), 2);
        assert_eq!(
            stats[0],
            Payload::DebugDotScreen {
                x: 10.0,
                y: 20.0,
                radius: 15.0
            }
        );
        match stats[1] {
            Payload::DebugTime {
                sent_by_presentation,
                sent_by_state,
            } => {
                assert_eq!(sent_by_presentation, t0);
                assert!(sent_by_state >= t0);
            }
            ref other => panic!("expected DEBUG_TIME, got {other:?}"),
        }
        assert!(out.pending(StateStage::PHYSICS_OUT).is_empty());
    }

    #[test]
    fn every_press_is_probed() {
        let mut stage = StateStage::new();
        let mut out = Outbox::new(2);
        stage.handle(press("A", Timestamp::now()), &mut out).unwrap();
        stage.handle(press("B", Timestamp::now()), &mut out).unwrap();
        let probes = stats(&out)
            .into_iter()
            .filter(|p| matches!(p, Payload::DebugTime { .. }))
            .count();
        assert_eq!(probes, 2);
        assert_eq!(stage.presses(), 2);
    }

    #[test]
    fn escape_requests_exit() {
        let mut stage = StateStage::new();
        let mut out = Outbox::new(2);
        let control = stage
            .handle(press(Key::ESCAPE, Timestamp::now()), &mut out)
            .unwrap();
        assert_eq!(control, Control::Exit);
    }

    #[test]
    fn release_clears_held_key() {
        let mut stage = StateStage::new();
        let mut out = Outbox::new(2);
        stage.handle(press("A", Timestamp::now()), &mut out).unwrap();
        stage.handle(press("B", Timestamp::now()), &mut out).unwrap();
        stage
            .handle(
                Payload::UserKeyRelease {
                    key: Key::new("A"),
                    modifiers: Modifiers::NONE,
                },
                &mut out,
            )
            .unwrap();
        let held: Vec<&str> = stage.held_keys().iter().map(Key::as_str).collect();
        assert_eq!(held, vec!["B"]);
    }

    #[test]
    fn scene_is_published_on_first_update_only() {
        let body = Body {
            position: [1.0, 2.0],
            velocity: [0.5, 0.0],
        };
        let mut stage = StateStage::with_scene([(ObjectId(1), body), (ObjectId(2), body)]);
        let mut out = Outbox::new(2);
        stage.update(Duration::ZERO, &mut out);
        assert_eq!(out.pending(StateStage::PHYSICS_OUT).len(), 2);

        out.clear();
        stage.update(Duration::ZERO, &mut out);
        assert!(out.is_empty());

        stage.despawn(ObjectId(1));
        stage.update(Duration::ZERO, &mut out);
        let sent = Payload::from_command(&out.pending(StateStage::PHYSICS_OUT)[0]).unwrap();
        assert_eq!(sent, Payload::ObjectRemove { id: ObjectId(1) });
    }

    #[test]
    fn drawables_are_not_for_state() {
        let mut stage = StateStage::new();
        let mut out = Outbox::new(2);
        let err = stage
            .handle(Payload::EraseObject { id: ObjectId(1) }, &mut out)
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownCommand { .. }));
    }
}
