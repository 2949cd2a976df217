//! Stage loop, queues and wiring for the tristage pipeline.
//!
//! Three stages run independent loops and talk only through four
//! single-producer, single-consumer [`queue`]s. Each stage is plain logic
//! implementing [`Stage`]; a [`StageRunner`] drives it through the
//! drain, dispatch, update and flush phases and the coordinated
//! `Running → Draining → Stopped` shutdown. [`Pipeline`] wires the
//! [`StateStage`], [`PhysicsStage`] and [`PresentationStage`] together.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod host;
pub mod metrics;
pub mod physics;
pub mod pipeline;
pub mod presentation;
pub mod queue;
pub mod runner;
pub mod stage;
pub mod state;

pub use config::{ConfigError, PipelineConfig, PortDirection, QueueConfig, StageConfig};
pub use host::{Dot, Drawable, Frame, HostError, HostEvent, PresentationHost};
pub use metrics::StageMetrics;
pub use physics::{Body, PhysicsStage};
pub use pipeline::{Pipeline, ShutdownReport};
pub use presentation::{LatencyReport, PresentationStage};
pub use queue::{command_queue, PushError, QueueReceiver, QueueSender};
pub use runner::{Lifecycle, StageOutcome, StageRunner};
pub use stage::{Control, Outbox, Stage};
pub use state::StateStage;
