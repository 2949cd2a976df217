//! Typed command payloads.
//!
//! [`Payload`] is the sum type every stage dispatches on with an exhaustive
//! `match`. Converting a payload into a [`Command`] is infallible;
//! converting a dequeued command back into a payload is where argument
//! counts and types are checked.

use smallvec::smallvec;

use crate::error::DispatchError;
use crate::id::{Key, Modifiers, ObjectId};
use crate::protocol::{Arg, ArgKind, Command};
use crate::time::Timestamp;

/// Command tags understood by the built-in stages.
pub mod names {
    /// Stop the receiving stage and propagate downstream.
    pub const EXIT: &str = "EXIT";
    /// A key was pressed on the presentation host.
    pub const USER_KEY_PRESS: &str = "USER_KEY_PRESS";
    /// A key was released on the presentation host.
    pub const USER_KEY_RELEASE: &str = "USER_KEY_RELEASE";
    /// Round-trip latency probe answered by the state stage.
    pub const DEBUG_TIME: &str = "DEBUG_TIME";
    /// Draw a debug dot on the render surface.
    pub const DEBUG_DOT_SCREEN: &str = "DEBUG_DOT_SCREEN";
    /// Authoritative object state for the physics stage.
    pub const OBJECT_UPDATE: &str = "OBJECT_UPDATE";
    /// Remove an object from the physics stage.
    pub const OBJECT_REMOVE: &str = "OBJECT_REMOVE";
    /// Drawable position for the presentation stage.
    pub const DRAW_OBJECT: &str = "DRAW_OBJECT";
    /// Remove a drawable from the presentation stage.
    pub const ERASE_OBJECT: &str = "ERASE_OBJECT";
}

/// All command payloads exchanged between stages.
///
/// # Examples
///
/// ```
/// use tristage_core::{Key, Modifiers, Payload, Timestamp};
///
/// let press = Payload::UserKeyPress {
///     key: Key::new("SPACE"),
///     modifiers: Modifiers::NONE,
///     sent_at: Timestamp(12.5),
/// };
/// let cmd = press.clone().into_command();
/// assert_eq!(cmd.name(), "USER_KEY_PRESS");
/// assert_eq!(Payload::from_command(&cmd).unwrap(), press);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Shut down. Carries no arguments; extra ones are ignored.
    Exit,
    /// A key press captured by the presentation host.
    UserKeyPress {
        /// Symbolic key name.
        key: Key,
        /// Modifier bitmask.
        modifiers: Modifiers,
        /// Capture time on the presentation side.
        sent_at: Timestamp,
    },
    /// A key release captured by the presentation host.
    UserKeyRelease {
        /// Symbolic key name.
        key: Key,
        /// Modifier bitmask.
        modifiers: Modifiers,
    },
    /// Latency probe reply.
    DebugTime {
        /// When the presentation stage captured the originating input.
        sent_by_presentation: Timestamp,
        /// When the state stage handled it.
        sent_by_state: Timestamp,
    },
    /// Debug dot to draw.
    DebugDotScreen {
        /// Centre x.
        x: f64,
        /// Centre y.
        y: f64,
        /// Radius.
        radius: f64,
    },
    /// Authoritative object state pushed from the state stage to physics.
    ObjectUpdate {
        /// Object id.
        id: ObjectId,
        /// Position.
        position: [f64; 2],
        /// Velocity.
        velocity: [f64; 2],
    },
    /// Object removed by the state stage.
    ObjectRemove {
        /// Object id.
        id: ObjectId,
    },
    /// Drawable object position pushed from physics to presentation.
    DrawObject {
        /// Object id.
        id: ObjectId,
        /// Position.
        position: [f64; 2],
    },
    /// Drawable removed.
    EraseObject {
        /// Object id.
        id: ObjectId,
    },
}

impl Payload {
    /// The command tag for this payload.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Exit => names::EXIT,
            Self::UserKeyPress { .. } => names::USER_KEY_PRESS,
            Self::UserKeyRelease { .. } => names::USER_KEY_RELEASE,
            Self::DebugTime { .. } => names::DEBUG_TIME,
            Self::DebugDotScreen { .. } => names::DEBUG_DOT_SCREEN,
            Self::ObjectUpdate { .. } => names::OBJECT_UPDATE,
            Self::ObjectRemove { .. } => names::OBJECT_REMOVE,
            Self::DrawObject { .. } => names::DRAW_OBJECT,
            Self::EraseObject { .. } => names::ERASE_OBJECT,
        }
    }

    /// Encode into a queue-ready [`Command`].
    pub fn into_command(self) -> Command {
        let name = self.name();
        let args = match self {
            Self::Exit => smallvec![],
            Self::UserKeyPress {
                key,
                modifiers,
                sent_at,
            } => smallvec![
                Arg::Text(key.0),
                Arg::from(modifiers.0),
                Arg::Float(sent_at.0)
            ],
            Self::UserKeyRelease { key, modifiers } => {
                smallvec![Arg::Text(key.0), Arg::from(modifiers.0)]
            }
            Self::DebugTime {
                sent_by_presentation,
                sent_by_state,
            } => smallvec![
                Arg::Float(sent_by_presentation.0),
                Arg::Float(sent_by_state.0)
            ],
            Self::DebugDotScreen { x, y, radius } => {
                smallvec![Arg::Float(x), Arg::Float(y), Arg::Float(radius)]
            }
            Self::ObjectUpdate {
                id,
                position,
                velocity,
            } => smallvec![
                object_arg(id),
                Arg::Float(position[0]),
                Arg::Float(position[1]),
                Arg::Float(velocity[0]),
                Arg::Float(velocity[1])
            ],
            Self::ObjectRemove { id } | Self::EraseObject { id } => smallvec![object_arg(id)],
            Self::DrawObject { id, position } => smallvec![
                object_arg(id),
                Arg::Float(position[0]),
                Arg::Float(position[1])
            ],
        };
        Command::from_static(name, args)
    }

    /// Validate a dequeued command and decode it into a payload.
    ///
    /// Fails with [`DispatchError::InsufficientArguments`] when the command
    /// is shorter than its kind requires, [`DispatchError::InvalidArgument`]
    /// when an argument has the wrong type, and
    /// [`DispatchError::UnknownCommand`] for unregistered names. Trailing
    /// extra arguments are ignored.
    pub fn from_command(command: &Command) -> Result<Self, DispatchError> {
        let r = ArgReader::new(command);
        let payload = match command.name() {
            names::EXIT => Self::Exit,
            names::USER_KEY_PRESS => {
                r.require(3)?;
                Self::UserKeyPress {
                    key: Key(r.text(0)?),
                    modifiers: r.modifiers(1)?,
                    sent_at: Timestamp(r.number(2)?),
                }
            }
            names::USER_KEY_RELEASE => {
                r.require(2)?;
                Self::UserKeyRelease {
                    key: Key(r.text(0)?),
                    modifiers: r.modifiers(1)?,
                }
            }
            names::DEBUG_TIME => {
                r.require(2)?;
                Self::DebugTime {
                    sent_by_presentation: Timestamp(r.number(0)?),
                    sent_by_state: Timestamp(r.number(1)?),
                }
            }
            names::DEBUG_DOT_SCREEN => {
                r.require(3)?;
                Self::DebugDotScreen {
                    x: r.number(0)?,
                    y: r.number(1)?,
                    radius: r.number(2)?,
                }
            }
            names::OBJECT_UPDATE => {
                r.require(5)?;
                Self::ObjectUpdate {
                    id: r.object(0)?,
                    position: [r.number(1)?, r.number(2)?],
                    velocity: [r.number(3)?, r.number(4)?],
                }
            }
            names::OBJECT_REMOVE => {
                r.require(1)?;
                Self::ObjectRemove { id: r.object(0)? }
            }
            names::DRAW_OBJECT => {
                r.require(3)?;
                Self::DrawObject {
                    id: r.object(0)?,
                    position: [r.number(1)?, r.number(2)?],
                }
            }
            names::ERASE_OBJECT => {
                r.require(1)?;
                Self::EraseObject { id: r.object(0)? }
            }
            other => {
                return Err(DispatchError::UnknownCommand {
                    name: other.to_owned(),
                })
            }
        };
        Ok(payload)
    }
}

impl From<Payload> for Command {
    fn from(payload: Payload) -> Self {
        payload.into_command()
    }
}

fn object_arg(id: ObjectId) -> Arg {
    // Ids above i64::MAX wrap; the decoder reverses the cast.
    Arg::Int(id.0 as i64)
}

/// Positional argument accessors that build dispatch errors on failure.
struct ArgReader<'a> {
    command: &'a Command,
}

impl<'a> ArgReader<'a> {
    fn new(command: &'a Command) -> Self {
        Self { command }
    }

    fn require(&self, required: usize) -> Result<(), DispatchError> {
        if self.command.args().len() < required {
            return Err(DispatchError::InsufficientArguments {
                name: self.command.name().to_owned(),
                required,
                args: self.command.args().to_vec(),
            });
        }
        Ok(())
    }

    fn invalid(&self, index: usize, expected: ArgKind) -> DispatchError {
        DispatchError::InvalidArgument {
            name: self.command.name().to_owned(),
            index,
            expected,
            args: self.command.args().to_vec(),
        }
    }

    fn text(&self, index: usize) -> Result<String, DispatchError> {
        self.command.args()[index]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| self.invalid(index, ArgKind::Text))
    }

    fn number(&self, index: usize) -> Result<f64, DispatchError> {
        self.command.args()[index]
            .as_f64()
            .ok_or_else(|| self.invalid(index, ArgKind::Number))
    }

    fn int(&self, index: usize) -> Result<i64, DispatchError> {
        self.command.args()[index]
            .as_i64()
            .ok_or_else(|| self.invalid(index, ArgKind::Int))
    }

    fn modifiers(&self, index: usize) -> Result<Modifiers, DispatchError> {
        let raw = self.int(index)?;
        u32::try_from(raw)
            .map(Modifiers)
            .map_err(|_| self.invalid(index, ArgKind::Int))
    }

    fn object(&self, index: usize) -> Result<ObjectId, DispatchError> {
        Ok(ObjectId(self.int(index)? as u64))
    }
}
