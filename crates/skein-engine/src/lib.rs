//! Deterministic tick engine for the Skein network simulation.
//!
//! [`Engine`] owns the level and the packet store and runs the fixed
//! per-tick pipeline: injection, wire kinematics, wire↔port transfer,
//! system processing, anti-trojan scan, storage flush, collision, and
//! cleanup. Every tick is an atomic transaction on [`GameState`]; all
//! randomness flows through one seedable generator, so a rewind is a
//! reset plus replay.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod abilities;
pub mod collision;
pub mod config;
pub mod engine;
pub mod flow;
pub mod metrics;
pub mod movement;
pub mod policies;
pub mod state;
pub mod transfer;
pub mod wiring;

pub use abilities::{Abilities, Ability};
pub use config::EngineConfig;
pub use engine::{Engine, Mode};
pub use metrics::TickMetrics;
pub use state::{GameState, LevelStartSnapshot};
