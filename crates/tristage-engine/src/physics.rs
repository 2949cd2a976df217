//! The physics stage: owns the body table and tells presentation what to
//! draw.
//!
//! Bodies arrive from the state stage as `OBJECT_UPDATE` commands and are
//! forwarded as `DRAW_OBJECT` once per iteration, only when they changed.
//! No integration is performed; positions are drawn as received.

use std::time::Duration;

use indexmap::{IndexMap, IndexSet};
use tristage_core::{DispatchError, ObjectId, Payload};

use crate::stage::{Control, Outbox, Stage};

/// Kinematic state of one object.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Body {
    /// Position.
    pub position: [f64; 2],
    /// Velocity.
    pub velocity: [f64; 2],
}

/// Stage that mirrors object state and emits drawables.
#[derive(Debug, Default)]
pub struct PhysicsStage {
    bodies: IndexMap<ObjectId, Body>,
    dirty: IndexSet<ObjectId>,
}

impl PhysicsStage {
    /// Outbound port carrying drawables to presentation.
    pub const DRAW_OUT: usize = 0;

    /// An empty physics stage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current bodies, in insertion order.
    pub fn bodies(&self) -> &IndexMap<ObjectId, Body> {
        &self.bodies
    }

    /// Look up one body.
    pub fn body(&self, id: ObjectId) -> Option<&Body> {
        self.bodies.get(&id)
    }
}

impl Stage for PhysicsStage {
    fn name(&self) -> &'static str {
        "physics"
    }

    fn inbound_ports(&self) -> &'static [&'static str] {
        &["object_updates"]
    }

    fn outbound_ports(&self) -> &'static [&'static str] {
        &["draw"]
    }

    fn handle(&mut self, payload: Payload, out: &mut Outbox) -> Result<Control, DispatchError> {
        match payload {
            Payload::ObjectUpdate {
                id,
                position,
                velocity,
            } => {
                self.bodies.insert(id, Body { position, velocity });
                self.dirty.insert(id);
            }
            Payload::ObjectRemove { id } => {
                self.dirty.shift_remove(&id);
                if self.bodies.shift_remove(&id).is_some() {
                    out.send(Self::DRAW_OUT, Payload::EraseObject { id });
                } else {
                    tracing::debug!(%id, "remove for unknown object");
                }
            }
            other => {
                return Err(DispatchError::UnknownCommand {
                    name: other.name().to_owned(),
                })
            }
        }
        Ok(Control::Continue)
    }

    fn update(&mut self, _dt: Duration, out: &mut Outbox) -> Control {
        for id in self.dirty.drain(..) {
            if let Some(body) = self.bodies.get(&id) {
                out.send(
                    Self::DRAW_OUT,
                    Payload::DrawObject {
                        id,
                        position: body.position,
                    },
                );
            }
        }
        Control::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(id: u64, x: f64, y: f64) -> Payload {
        Payload::ObjectUpdate {
            id: ObjectId(id),
            position: [x, y],
            velocity: [0.0, 0.0],
        }
    }

    fn drawn(out: &Outbox) -> Vec<Payload> {
        out.pending(PhysicsStage::DRAW_OUT)
            .iter()
            .map(|c| Payload::from_command(c).unwrap())
            .collect()
    }

    #[test]
    fn updates_are_drawn_once_per_iteration() {
        let mut stage = PhysicsStage::new();
        let mut out = Outbox::new(1);
        stage.handle(update(1, 1.0, 2.0), &mut out).unwrap();
        stage.handle(update(1, 3.0, 4.0), &mut out).unwrap();
        stage.handle(update(2, 5.0, 6.0), &mut out).unwrap();
        assert!(out.is_empty());

        stage.update(Duration::ZERO, &mut out);
        assert_eq!(
            drawn(&out),
            vec![
                Payload::DrawObject {
                    id: ObjectId(1),
                    position: [3.0, 4.0]
                },
                Payload::DrawObject {
                    id: ObjectId(2),
                    position: [5.0, 6.0]
                },
            ]
        );

        out.clear();
        stage.update(Duration::ZERO, &mut out);
        assert!(out.is_empty(), "clean bodies are not redrawn");
    }

    #[test]
    fn remove_erases_and_cancels_pending_draw() {
        let mut stage = PhysicsStage::new();
        let mut out = Outbox::new(1);
        stage.handle(update(9, 0.0, 0.0), &mut out).unwrap();
        stage
            .handle(Payload::ObjectRemove { id: ObjectId(9) }, &mut out)
            .unwrap();
        stage.update(Duration::ZERO, &mut out);

        assert_eq!(drawn(&out), vec![Payload::EraseObject { id: ObjectId(9) }]);
        assert!(stage.body(ObjectId(9)).is_none());
    }

    #[test]
    fn removing_unknown_object_emits_nothing() {
        let mut stage = PhysicsStage::new();
        let mut out = Outbox::new(1);
        stage
            .handle(Payload::ObjectRemove { id: ObjectId(1) }, &mut out)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn foreign_commands_are_unknown() {
        let mut stage = PhysicsStage::new();
        let mut out = Outbox::new(1);
        let err = stage
            .handle(
                Payload::DebugDotScreen {
                    x: 0.0,
                    y: 0.0,
                    radius: 1.0,
                },
                &mut out,
            )
            .unwrap_err();
        assert_eq!(err.command_name(), "DEBUG_DOT_SCREEN");
    }
}
