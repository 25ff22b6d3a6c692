//! JSON level-file codec and validation.
//!
//! A level file carries the level header, the polymorphic system list
//! (tagged by `type`), optional pre-placed wires, and the packet
//! schedule. Wires reference ports structurally: by parent system id,
//! shape, direction, and position within one pixel. Loading resolves
//! every reference to dense ids and binds each schedule entry to its
//! source system.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod raw;
mod validate;

pub use raw::{RawInjection, RawLevel, RawPoint, RawPort, RawPortRef, RawSystem, RawWire, SystemTypeTag};
pub use validate::LevelValidationReport;

use std::error::Error;
use std::fmt;

use skein_core::{PortDirection, PortRef};
use skein_geometry::Point2D;
use skein_model::{GameLevel, PacketInjection, Port, SystemKind, WireBend};

/// Position slack when matching a wire's port reference, in pixels.
pub const PORT_MATCH_TOLERANCE: f64 = 1.0;

/// Errors surfaced while loading a level file.
#[derive(Debug)]
pub enum LevelError {
    /// The file is not valid JSON or does not match the schema.
    Parse(serde_json::Error),
    /// Two systems share the same id.
    DuplicateSystemId {
        /// The offending id.
        id: String,
    },
    /// A schedule entry names a system that does not exist.
    UnknownScheduleSource {
        /// The missing system id.
        id: String,
    },
    /// A wire references a system that does not exist.
    UnknownWireSystem {
        /// The missing system id.
        id: String,
    },
    /// A wire's port reference matches no port on its system.
    UnmatchedPort {
        /// The system searched.
        system: String,
    },
    /// A wire's endpoints have the same direction.
    InvalidWireDirection,
}

impl fmt::Display for LevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "parse error: {e}"),
            Self::DuplicateSystemId { id } => write!(f, "duplicate system id '{id}'"),
            Self::UnknownScheduleSource { id } => {
                write!(f, "schedule references unknown system '{id}'")
            }
            Self::UnknownWireSystem { id } => write!(f, "wire references unknown system '{id}'"),
            Self::UnmatchedPort { system } => {
                write!(f, "wire port matches nothing on system '{system}'")
            }
            Self::InvalidWireDirection => write!(f, "wire endpoints have the same direction"),
        }
    }
}

impl Error for LevelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for LevelError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

/// Parse a level from JSON text.
pub fn load_level(json: &str) -> Result<GameLevel, LevelError> {
    let raw: RawLevel = serde_json::from_str(json)?;
    build_level(raw)
}

/// Build a [`GameLevel`] from parsed raw data.
pub fn build_level(raw: RawLevel) -> Result<GameLevel, LevelError> {
    let mut level = GameLevel::new(
        raw.level_id,
        raw.name,
        raw.description,
        raw.initial_wire_length,
        raw.level_duration,
    );
    level.tutorial = raw.tutorial;

    // Systems and ports; ids must be unique.
    let mut seen: Vec<String> = Vec::new();
    for system in &raw.systems {
        if seen.contains(&system.id) {
            return Err(LevelError::DuplicateSystemId {
                id: system.id.clone(),
            });
        }
        seen.push(system.id.clone());

        let kind = match system.kind {
            SystemTypeTag::NormalSystem => SystemKind::Normal,
            SystemTypeTag::ReferenceSystem => SystemKind::reference(),
            SystemTypeTag::SpySystem => SystemKind::Spy,
            SystemTypeTag::SaboteurSystem => SystemKind::Saboteur,
            SystemTypeTag::VpnSystem => SystemKind::Vpn,
            SystemTypeTag::AntiTrojanSystem => SystemKind::anti_trojan(),
            SystemTypeTag::DistributorSystem => SystemKind::Distributor,
            SystemTypeTag::MergerSystem => SystemKind::merger(),
        };
        let center = Point2D::new(system.position.x, system.position.y);
        let id = level.add_system(system.id.clone(), kind, center);
        let node = level.system_mut(id).expect("freshly added system");
        for port in &system.input_ports {
            let position = Point2D::new(port.position.x, port.position.y);
            node.input_ports.push(Port::new(
                port.shape,
                PortDirection::Input,
                center,
                position - center,
            ));
        }
        for port in &system.output_ports {
            let position = Point2D::new(port.position.x, port.position.y);
            node.output_ports.push(Port::new(
                port.shape,
                PortDirection::Output,
                center,
                position - center,
            ));
        }
    }

    // Wires, matched structurally and normalized output→input.
    for wire in &raw.wire_connections {
        let a = resolve_port(&level, &wire.source)?;
        let b = resolve_port(&level, &wire.destination)?;
        if a.direction == b.direction {
            return Err(LevelError::InvalidWireDirection);
        }
        let (source, destination) = if a.direction == PortDirection::Output {
            (a, b)
        } else {
            (b, a)
        };
        let start = level.port(source).map(|p| p.position).unwrap_or_default();
        let end = level
            .port(destination)
            .map(|p| p.position)
            .unwrap_or_default();
        let id = level.add_wire(source, destination, start.distance_to(end));
        for bend in &wire.bends {
            let node = level.wire_mut(id).expect("freshly added wire");
            node.bends
                .push(WireBend::new(Point2D::new(bend.x, bend.y)));
        }
        if let Some(port) = level.port_mut(source) {
            port.connected = true;
        }
        if let Some(port) = level.port_mut(destination) {
            port.connected = true;
        }
    }

    // Schedule, bound to source systems by string id.
    for entry in &raw.packet_schedule {
        let source = level
            .system_by_label(&entry.source_id)
            .map(|s| s.id)
            .ok_or_else(|| LevelError::UnknownScheduleSource {
                id: entry.source_id.clone(),
            })?;
        level
            .schedule
            .push(PacketInjection::new(entry.time, entry.packet_type, source));
    }
    level
        .schedule
        .sort_by(|a, b| a.time.total_cmp(&b.time));

    Ok(level)
}

fn resolve_port(level: &GameLevel, raw: &RawPortRef) -> Result<PortRef, LevelError> {
    let system = level
        .system_by_label(&raw.system_id)
        .ok_or_else(|| LevelError::UnknownWireSystem {
            id: raw.system_id.clone(),
        })?;
    let target = Point2D::new(raw.position.x, raw.position.y);
    let matches = |port: &Port| {
        port.shape == raw.shape && port.position.distance_to(target) <= PORT_MATCH_TOLERANCE
    };
    for (index, port) in system.input_ports.iter().enumerate() {
        if matches(port) {
            return Ok(PortRef::input(system.id, index as u16));
        }
    }
    for (index, port) in system.output_ports.iter().enumerate() {
        if matches(port) {
            return Ok(PortRef::output(system.id, index as u16));
        }
    }
    Err(LevelError::UnmatchedPort {
        system: raw.system_id.clone(),
    })
}

/// Serialize a level back to raw form (ports and wires in file terms).
pub fn to_raw(level: &GameLevel) -> RawLevel {
    let systems = level
        .systems()
        .map(|s| RawSystem {
            kind: tag_for(&s.kind),
            id: s.label.clone(),
            position: raw::RawPoint {
                x: s.position.x,
                y: s.position.y,
            },
            input_ports: s.input_ports.iter().map(raw_port).collect(),
            output_ports: s.output_ports.iter().map(raw_port).collect(),
        })
        .collect();
    let wire_connections = level
        .active_wires()
        .filter_map(|w| {
            let source = raw_port_ref(level, w.source)?;
            let destination = raw_port_ref(level, w.destination)?;
            Some(RawWire {
                source,
                destination,
                bends: w
                    .bends
                    .iter()
                    .map(|b| raw::RawPoint {
                        x: b.position.x,
                        y: b.position.y,
                    })
                    .collect(),
            })
        })
        .collect();
    let packet_schedule = level
        .schedule
        .iter()
        .filter_map(|inj| {
            let source_id = level.system(inj.source)?.label.clone();
            Some(raw::RawInjection {
                time: inj.time,
                packet_type: inj.packet_type,
                source_id,
            })
        })
        .collect();
    RawLevel {
        level_id: level.level_id.clone(),
        name: level.name.clone(),
        description: level.description.clone(),
        initial_wire_length: level.initial_wire_length,
        level_duration: level.level_duration,
        tutorial: level.tutorial,
        systems,
        wire_connections,
        packet_schedule,
    }
}

fn tag_for(kind: &SystemKind) -> SystemTypeTag {
    match kind {
        SystemKind::Normal => SystemTypeTag::NormalSystem,
        SystemKind::Reference { .. } => SystemTypeTag::ReferenceSystem,
        SystemKind::Spy => SystemTypeTag::SpySystem,
        SystemKind::Saboteur => SystemTypeTag::SaboteurSystem,
        SystemKind::Vpn => SystemTypeTag::VpnSystem,
        SystemKind::AntiTrojan { .. } => SystemTypeTag::AntiTrojanSystem,
        SystemKind::Distributor => SystemTypeTag::DistributorSystem,
        SystemKind::Merger { .. } => SystemTypeTag::MergerSystem,
    }
}

fn raw_port(port: &Port) -> RawPort {
    RawPort {
        shape: port.shape,
        position: raw::RawPoint {
            x: port.position.x,
            y: port.position.y,
        },
    }
}

fn raw_port_ref(level: &GameLevel, port_ref: PortRef) -> Option<RawPortRef> {
    let system = level.system(port_ref.system)?;
    let port = level.port(port_ref)?;
    Some(RawPortRef {
        system_id: system.label.clone(),
        shape: port.shape,
        position: raw::RawPoint {
            x: port.position.x,
            y: port.position.y,
        },
    })
}

/// Validate a loaded level's port balance.
pub fn validate_level(level: &GameLevel) -> LevelValidationReport {
    validate::validate(level)
}
