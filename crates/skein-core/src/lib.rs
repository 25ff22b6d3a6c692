//! Core types and identifiers for the Skein network simulation.
//!
//! This is the leaf crate with zero internal Skein dependencies. It defines
//! the strongly-typed identifiers, the packet and port type tables, the
//! tunable settings object, and the error types shared across the workspace.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod settings;
pub mod types;

// Re-export core types at crate root for convenience.
pub use error::{EditError, GameOverReason};
pub use id::{BulkGroupId, PacketId, PortDirection, PortRef, SystemId, WireId};
pub use settings::Settings;
pub use types::{BulkKind, MessengerKind, PacketType, PortShape};
