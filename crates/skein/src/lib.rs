//! Skein: a deterministic packet-routing network simulation.
//!
//! This is the top-level facade crate that re-exports the public API
//! from all Skein sub-crates. For most users, adding `skein` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use skein::prelude::*;
//!
//! // A tiny level: a reference source wired to a reference sink.
//! let json = r#"{
//!     "levelId": "demo",
//!     "name": "Demo",
//!     "description": "",
//!     "initialWireLength": 1000.0,
//!     "levelDuration": 30.0,
//!     "systems": [
//!         { "type": "ReferenceSystem", "id": "src",
//!           "position": { "x": 0.0, "y": 0.0 },
//!           "outputPorts": [
//!               { "shape": "SQUARE", "position": { "x": 20.0, "y": 0.0 } }
//!           ] },
//!         { "type": "ReferenceSystem", "id": "dst",
//!           "position": { "x": 200.0, "y": 0.0 },
//!           "inputPorts": [
//!               { "shape": "SQUARE", "position": { "x": 180.0, "y": 0.0 } }
//!           ] }
//!     ],
//!     "packetSchedule": [
//!         { "time": 1.0, "packetType": "SQUARE_MESSENGER", "sourceId": "src" }
//!     ]
//! }"#;
//! let level = skein::level::load_level(json).unwrap();
//! let src = level.system_by_label("src").unwrap().id;
//! let dst = level.system_by_label("dst").unwrap().id;
//!
//! let mut engine = Engine::new(level, EngineConfig::with_seed(42));
//! engine
//!     .create_wire(PortRef::output(src, 0), PortRef::input(dst, 0))
//!     .unwrap();
//! engine.enter_simulation_mode();
//! for _ in 0..200 {
//!     engine.tick(0.05);
//! }
//! assert_eq!(engine.delivered_count(), 1);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `skein-core` | Ids, packet/port tables, settings, errors |
//! | [`geometry`] | `skein-geometry` | Points, vectors, rectangles, wire paths |
//! | [`model`] | `skein-model` | Packets, ports, wires, systems, levels |
//! | [`engine`] | `skein-engine` | The tick engine, wiring edits, time travel |
//! | [`level`] | `skein-level` | JSON level-file codec and validation |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core ids, type tables, settings, and errors (`skein-core`).
pub use skein_core as types;

/// 2D geometry and wire paths (`skein-geometry`).
pub use skein_geometry as geometry;

/// The data model: packets, ports, wires, systems, levels
/// (`skein-model`).
pub use skein_model as model;

/// The deterministic tick engine and editing API (`skein-engine`).
pub use skein_engine as engine;

/// JSON level-file loading and validation (`skein-level`).
pub use skein_level as level;

/// Common imports for typical Skein usage.
pub mod prelude {
    pub use skein_core::{
        EditError, GameOverReason, PacketId, PacketType, PortDirection, PortRef, PortShape,
        Settings, SystemId, WireId,
    };
    pub use skein_engine::{Abilities, Ability, Engine, EngineConfig, Mode, TickMetrics};
    pub use skein_geometry::{Point2D, Vec2D};
    pub use skein_level::{load_level, LevelError};
    pub use skein_model::{GameLevel, Packet, PacketInjection, SystemKind, SystemNode};
}
