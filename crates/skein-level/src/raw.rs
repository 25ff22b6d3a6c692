//! Raw (wire-format) level structures, mirrored one-to-one from the
//! JSON schema.

use serde::{Deserialize, Serialize};
use skein_core::{PacketType, PortShape};

/// A 2D point in file terms.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// The polymorphic system tag carried in the `type` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemTypeTag {
    /// A normal forwarding system.
    NormalSystem,
    /// A reference source/sink.
    ReferenceSystem,
    /// A spy system.
    SpySystem,
    /// A saboteur system.
    SaboteurSystem,
    /// A VPN system.
    #[serde(rename = "VPNSystem")]
    VpnSystem,
    /// An anti-trojan system.
    AntiTrojanSystem,
    /// A distributor system.
    DistributorSystem,
    /// A merger system.
    MergerSystem,
}

/// A port on a system, in file terms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawPort {
    /// The port's shape.
    pub shape: PortShape,
    /// Absolute position.
    pub position: RawPoint,
}

/// One system entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSystem {
    /// The polymorphic type tag.
    #[serde(rename = "type")]
    pub kind: SystemTypeTag,
    /// Unique system id.
    pub id: String,
    /// Centre position.
    pub position: RawPoint,
    /// Input ports, in order.
    #[serde(default)]
    pub input_ports: Vec<RawPort>,
    /// Output ports, in order.
    #[serde(default)]
    pub output_ports: Vec<RawPort>,
}

/// A structural reference to one port: system id plus shape and
/// position (matched within one pixel).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPortRef {
    /// Id of the owning system.
    pub system_id: String,
    /// Shape of the referenced port.
    pub shape: PortShape,
    /// Position of the referenced port.
    pub position: RawPoint,
}

/// A pre-placed wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWire {
    /// One endpoint; direction is normalized at load.
    pub source: RawPortRef,
    /// The other endpoint.
    pub destination: RawPortRef,
    /// Optional bend positions, in path order.
    #[serde(default)]
    pub bends: Vec<RawPoint>,
}

/// One scheduled injection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInjection {
    /// Injection time in seconds of temporal progress.
    pub time: f64,
    /// What to inject.
    pub packet_type: PacketType,
    /// String id of the source system.
    pub source_id: String,
}

/// A complete level file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLevel {
    /// Stable level id.
    pub level_id: String,
    /// Display name.
    pub name: String,
    /// Display description.
    #[serde(default)]
    pub description: String,
    /// Total wire budget.
    pub initial_wire_length: f64,
    /// Nominal duration in seconds.
    pub level_duration: f64,
    /// Tutorial flag; relaxes speed damage and connectivity.
    #[serde(default)]
    pub tutorial: bool,
    /// Systems, in file order.
    pub systems: Vec<RawSystem>,
    /// Pre-placed wires; may be empty or omitted.
    #[serde(default)]
    pub wire_connections: Vec<RawWire>,
    /// The packet schedule.
    #[serde(default)]
    pub packet_schedule: Vec<RawInjection>,
}
