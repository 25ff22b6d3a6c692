//! Strongly-typed identifiers for systems, wires, packets, and ports.
//!
//! All cross-references in the simulation graph are ids into owning
//! collections, never direct handles: the level owns systems and wires,
//! systems own their ports, and the engine owns the packet store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a system (node) within a level.
///
/// Assigned densely by the level as systems are added; the string id from
/// a level file is kept separately on the node for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SystemId(pub u32);

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sys{}", self.0)
    }
}

impl From<u32> for SystemId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a wire connection (directed edge) within a level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WireId(pub u32);

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wire{}", self.0)
    }
}

impl From<u32> for WireId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies a packet in the engine's packet store.
///
/// Allocated from a monotonic per-engine counter, never randomly, so that
/// a rewind-and-replay of the same seed reproduces identical ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PacketId(pub u64);

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pkt{}", self.0)
    }
}

impl From<u64> for PacketId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifies the group of bit packets split from one bulk packet.
///
/// A distributor stamps every bit it produces with the same group id; a
/// merger reassembles a group once enough of its bits have arrived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BulkGroupId(pub u64);

impl fmt::Display for BulkGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bulk{}", self.0)
    }
}

impl From<u64> for BulkGroupId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Whether a port receives packets into its system or emits them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// The port accepts packets arriving from a wire.
    Input,
    /// The port hands packets off to an outgoing wire.
    Output,
}

impl PortDirection {
    /// The opposite direction.
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// A stable reference to one port on one system.
///
/// Ports are owned by their system and addressed positionally within the
/// system's input or output port list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// The owning system.
    pub system: SystemId,
    /// Which port list the port lives in.
    pub direction: PortDirection,
    /// Index into that list.
    pub index: u16,
}

impl PortRef {
    /// Construct a reference to an input port.
    pub fn input(system: SystemId, index: u16) -> Self {
        Self {
            system,
            direction: PortDirection::Input,
            index,
        }
    }

    /// Construct a reference to an output port.
    pub fn output(system: SystemId, index: u16) -> Self {
        Self {
            system,
            direction: PortDirection::Output,
            index,
        }
    }

    /// Whether this reference points at an input port.
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}[{}]", self.system, self.direction, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(SystemId(3).to_string(), "sys3");
        assert_eq!(WireId(7).to_string(), "wire7");
        assert_eq!(PacketId(11).to_string(), "pkt11");
        assert_eq!(BulkGroupId(2).to_string(), "bulk2");
    }

    #[test]
    fn port_ref_constructors() {
        let p = PortRef::output(SystemId(1), 2);
        assert!(!p.is_input());
        assert_eq!(p.index, 2);
        assert_eq!(p.direction.opposite(), PortDirection::Input);
    }
}
