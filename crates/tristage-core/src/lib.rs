//! Core types for the tristage pipeline.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! single message type that crosses every queue ([`Command`]), the typed
//! [`Payload`] each stage dispatches on, the process-wide [`Timestamp`]
//! clock, and the error taxonomy shared by all stages.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod command;
pub mod error;
pub mod id;
pub mod protocol;
pub mod time;

pub use command::Payload;
pub use error::{DispatchError, ProtocolError};
pub use id::{Key, Modifiers, ObjectId};
pub use protocol::{decode, encode, Arg, ArgKind, Args, Command};
pub use time::Timestamp;
