//! tristage: a real-time simulation split into state, physics and
//! presentation stages that share nothing but command queues.
//!
//! This is the facade crate re-exporting the public API of the sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use tristage::prelude::*;
//!
//! // A host with no window: it closes on the first frame.
//! struct Headless;
//! impl PresentationHost for Headless {
//!     fn poll_events(&mut self, events: &mut Vec<HostEvent>) -> Result<(), HostError> {
//!         events.push(HostEvent::CloseRequested);
//!         Ok(())
//!     }
//!     fn present(&mut self, _frame: &Frame<'_>) -> Result<(), HostError> {
//!         Ok(())
//!     }
//! }
//!
//! let mut pipeline = Pipeline::launch(
//!     PipelineConfig::default(),
//!     StateStage::new(),
//!     PhysicsStage::new(),
//! )
//! .unwrap();
//! let (_presentation, report) = pipeline
//!     .run_presentation(PresentationStage::new(Headless))
//!     .unwrap();
//! assert!(report.state_joined && report.physics_joined);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tristage-core` | `Command`, `Payload`, protocol, timestamps, errors |
//! | [`engine`] | `tristage-engine` | Queues, stage loop, stages, pipeline |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Command protocol, payloads, ids and errors (`tristage-core`).
pub use tristage_core as types;

/// Queues, the stage loop and the three stages (`tristage-engine`).
///
/// [`engine::Pipeline`] wires everything together; [`engine::StageRunner`]
/// drives a single stage by hand.
pub use tristage_engine as engine;

/// Common imports for typical tristage usage.
///
/// ```rust
/// use tristage::prelude::*;
/// ```
pub mod prelude {
    // Protocol
    pub use tristage_core::{
        decode, encode, Arg, Command, Key, Modifiers, ObjectId, Payload, Timestamp,
    };

    // Errors
    pub use tristage_core::{DispatchError, ProtocolError};
    pub use tristage_engine::{ConfigError, HostError, PushError};

    // Stages
    pub use tristage_engine::{
        Body, Control, Outbox, PhysicsStage, PresentationStage, Stage, StateStage,
    };

    // Host boundary
    pub use tristage_engine::{Frame, HostEvent, PresentationHost};

    // Engine
    pub use tristage_engine::{
        Lifecycle, Pipeline, PipelineConfig, ShutdownReport, StageConfig, StageMetrics,
        StageRunner,
    };
}
