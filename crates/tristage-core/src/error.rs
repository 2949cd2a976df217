//! Error types for the command protocol.
//!
//! [`ProtocolError`] is fatal to the call that produced it: a malformed
//! command is never enqueued. [`DispatchError`] is recovered locally by the
//! consuming stage, which reports the offending command and moves on to the
//! next one in its batch. Neither ever crosses a queue.

use std::error::Error;
use std::fmt;

use crate::protocol::{Arg, ArgKind};

/// Errors from [`encode`](crate::encode).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// The command name is not a tag (empty, or contains characters other
    /// than ASCII letters, digits and `_`).
    InvalidCommandShape {
        /// The rejected name.
        name: String,
    },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCommandShape { name } => {
                write!(f, "command name {name:?} is not a tag")
            }
        }
    }
}

impl Error for ProtocolError {}

/// Errors raised while dispatching a dequeued command.
///
/// Each variant carries the command name and, where useful, a copy of the
/// arguments so the diagnostic line can show the offending payload.
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchError {
    /// The command has fewer arguments than its kind requires.
    InsufficientArguments {
        /// Command name.
        name: String,
        /// Number of arguments the kind requires.
        required: usize,
        /// The arguments that were received.
        args: Vec<Arg>,
    },
    /// An argument has the wrong type for its position.
    InvalidArgument {
        /// Command name.
        name: String,
        /// Position of the offending argument.
        index: usize,
        /// What the kind expects at `index`.
        expected: ArgKind,
        /// The arguments that were received.
        args: Vec<Arg>,
    },
    /// No handler is registered for this name in the consuming stage.
    UnknownCommand {
        /// Command name.
        name: String,
    },
}

impl DispatchError {
    /// Name of the command that failed to dispatch.
    pub fn command_name(&self) -> &str {
        match self {
            Self::InsufficientArguments { name, .. }
            | Self::InvalidArgument { name, .. }
            | Self::UnknownCommand { name } => name,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientArguments {
                name,
                required,
                args,
            } => write!(
                f,
                "not enough arguments for {name}: need {required}, got {} {args:?}",
                args.len()
            ),
            Self::InvalidArgument {
                name,
                index,
                expected,
                args,
            } => write!(
                f,
                "argument {index} of {name} should be {expected}: {args:?}"
            ),
            Self::UnknownCommand { name } => write!(f, "unknown command {name}"),
        }
    }
}

impl Error for DispatchError {}
