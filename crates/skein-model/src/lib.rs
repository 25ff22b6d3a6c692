//! Data model for the Skein network simulation.
//!
//! Defines the mutable simulation graph: typed [`Packet`]s, single-slot
//! [`Port`]s, directed [`WireConnection`]s with bends, polymorphic
//! [`SystemNode`]s, and the [`GameLevel`] that owns them all.
//!
//! Packets themselves are owned by the engine's packet store; everything
//! in this crate holds [`PacketId`](skein_core::PacketId)s, so a packet's
//! location is always exactly one slot.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod level;
pub mod packet;
pub mod port;
pub mod system;
pub mod wire;

pub use level::{GameLevel, PacketInjection};
pub use packet::{Packet, PacketKind};
pub use port::Port;
pub use system::{SystemKind, SystemNode, MAX_STORAGE, SYSTEM_SIZE};
pub use wire::{WireBend, WireConnection, MAX_BENDS, MAX_BULK_PASSAGES};
