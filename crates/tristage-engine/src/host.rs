//! Boundary between the presentation stage and the window/input layer.
//!
//! The engine never draws or reads devices itself. A [`PresentationHost`]
//! reports raw input as [`HostEvent`]s and receives a [`Frame`] to present
//! once per presentation iteration.

use std::error::Error;
use std::fmt;

use indexmap::IndexMap;
use tristage_core::{Key, Modifiers, ObjectId};

use crate::presentation::LatencyReport;

/// A raw input or window event.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    /// A key went down.
    KeyPress {
        /// Symbolic key name.
        key: Key,
        /// Modifiers held.
        modifiers: Modifiers,
    },
    /// A key came up.
    KeyRelease {
        /// Symbolic key name.
        key: Key,
        /// Modifiers held.
        modifiers: Modifiers,
    },
    /// A mouse button went down.
    MousePress {
        /// Cursor x.
        x: f64,
        /// Cursor y.
        y: f64,
        /// Button number.
        button: u32,
        /// Modifiers held.
        modifiers: Modifiers,
    },
    /// The user asked to close the window.
    CloseRequested,
}

/// Unrecoverable host failure. Fatal to the presentation stage, which
/// shuts the pipeline down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostError {
    /// The render surface or input device could not be initialised.
    InitFailed {
        /// Host-provided detail.
        reason: String,
    },
    /// The device went away mid-run.
    DeviceLost {
        /// Host-provided detail.
        reason: String,
    },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed { reason } => write!(f, "presentation host failed to start: {reason}"),
            Self::DeviceLost { reason } => write!(f, "presentation device lost: {reason}"),
        }
    }
}

impl Error for HostError {}

/// Something physics told presentation to draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Drawable {
    /// Position.
    pub position: [f64; 2],
}

/// A debug dot requested by the state stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dot {
    /// Centre x.
    pub x: f64,
    /// Centre y.
    pub y: f64,
    /// Radius.
    pub radius: f64,
}

/// Everything the presentation stage wants on screen this iteration.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    /// Drawables, in first-seen order.
    pub drawables: &'a IndexMap<ObjectId, Drawable>,
    /// Debug dots, oldest first.
    pub dots: &'a [Dot],
    /// Most recent input latency measurement.
    pub latency: Option<&'a LatencyReport>,
}

/// Window and input device driven by a
/// [`PresentationStage`](crate::PresentationStage).
pub trait PresentationHost {
    /// Append pending input and window events to `events`. Must not block.
    fn poll_events(&mut self, events: &mut Vec<HostEvent>) -> Result<(), HostError>;

    /// Present one frame.
    fn present(&mut self, frame: &Frame<'_>) -> Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_error_display_includes_reason() {
        let err = HostError::DeviceLost {
            reason: "surface destroyed".into(),
        };
        assert_eq!(err.to_string(), "presentation device lost: surface destroyed");
    }
}
