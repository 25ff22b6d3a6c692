//! Packet and port type tables.
//!
//! [`PacketType`] is the fixed catalogue of packet kinds with their base
//! sizes and coin values; [`PortShape`] is the port geometry used by the
//! compatibility predicate. Compatibility never refuses acceptance; it
//! only selects movement profiles and routing priority.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The shape of a port.
///
/// All shapes may connect to all shapes; shape only matters for the
/// packet-compatibility predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortShape {
    /// Square port, the natural home of square messengers.
    Square,
    /// Triangle port, the natural home of triangle messengers.
    Triangle,
    /// Hexagon port, the natural home of small messengers.
    Hexagon,
}

impl PortShape {
    /// All shapes, in declaration order.
    pub const ALL: [PortShape; 3] = [PortShape::Square, PortShape::Triangle, PortShape::Hexagon];
}

impl fmt::Display for PortShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Square => write!(f, "square"),
            Self::Triangle => write!(f, "triangle"),
            Self::Hexagon => write!(f, "hexagon"),
        }
    }
}

/// The three messenger variants, which differ only in size, coin value,
/// and movement profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessengerKind {
    /// Size 1, hexagon-compatible. Accelerates from compatible ports,
    /// decelerates from incompatible ones, reverses on collision.
    Small,
    /// Size 2, square-compatible. Full speed from compatible ports, half
    /// speed from incompatible ones.
    Square,
    /// Size 3, triangle-compatible. Constant speed from compatible ports,
    /// accelerates from incompatible ones.
    Triangle,
}

impl MessengerKind {
    /// All messenger kinds, in declaration order.
    pub const ALL: [MessengerKind; 3] = [
        MessengerKind::Small,
        MessengerKind::Square,
        MessengerKind::Triangle,
    ];

    /// The port shape this messenger is compatible with.
    pub fn home_shape(self) -> PortShape {
        match self {
            Self::Small => PortShape::Hexagon,
            Self::Square => PortShape::Square,
            Self::Triangle => PortShape::Triangle,
        }
    }

    /// The packet type corresponding to this messenger kind.
    pub fn packet_type(self) -> PacketType {
        match self {
            Self::Small => PacketType::SmallMessenger,
            Self::Square => PacketType::SquareMessenger,
            Self::Triangle => PacketType::TriangleMessenger,
        }
    }
}

/// The two bulk variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulkKind {
    /// Size 8. Constant speed on straight runs, faster through bends.
    Small,
    /// Size 10. Slower, with a periodic perpendicular deflection.
    Large,
}

impl BulkKind {
    /// The packet type corresponding to this bulk kind.
    pub fn packet_type(self) -> PacketType {
        match self {
            Self::Small => PacketType::BulkSmall,
            Self::Large => PacketType::BulkLarge,
        }
    }
}

/// The catalogue of packet types with their fixed base sizes and coin
/// values.
///
/// `Protected` has no fixed size here: a protected packet's size is
/// derived at construction as twice the wrapped messenger's base size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketType {
    /// Square messenger, size 2, coin 2.
    SquareMessenger,
    /// Triangle messenger, size 3, coin 3.
    TriangleMessenger,
    /// Small (hexagon) messenger, size 1, coin 1.
    SmallMessenger,
    /// Protected wrapper around a messenger; size derived, coin 5.
    Protected,
    /// Confidential packet, size 4, coin 3.
    Confidential,
    /// Protected confidential packet, size 6, coin 4.
    ConfidentialProtected,
    /// Small bulk packet, size 8, coin 8.
    BulkSmall,
    /// Large bulk packet, size 10, coin 10.
    BulkLarge,
    /// Trojan packet, size 2, coin 0.
    Trojan,
    /// Bit packet produced by splitting a bulk, size 1, coin 0.
    BitPacket,
}

impl PacketType {
    /// Human-readable display name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::SquareMessenger => "Square Messenger",
            Self::TriangleMessenger => "Triangle Messenger",
            Self::SmallMessenger => "Small Messenger",
            Self::Protected => "Protected",
            Self::Confidential => "Confidential",
            Self::ConfidentialProtected => "Protected Confidential",
            Self::BulkSmall => "Small Bulk",
            Self::BulkLarge => "Large Bulk",
            Self::Trojan => "Trojan",
            Self::BitPacket => "Bit Packet",
        }
    }

    /// Base size. Zero for `Protected`, whose size is derived from the
    /// wrapped messenger at construction.
    pub fn base_size(self) -> u32 {
        match self {
            Self::SquareMessenger => 2,
            Self::TriangleMessenger => 3,
            Self::SmallMessenger => 1,
            Self::Protected => 0,
            Self::Confidential => 4,
            Self::ConfidentialProtected => 6,
            Self::BulkSmall => 8,
            Self::BulkLarge => 10,
            Self::Trojan => 2,
            Self::BitPacket => 1,
        }
    }

    /// Coin value awarded when the packet enters a system.
    pub fn base_coin_value(self) -> u32 {
        match self {
            Self::SquareMessenger => 2,
            Self::TriangleMessenger => 3,
            Self::SmallMessenger => 1,
            Self::Protected => 5,
            Self::Confidential => 3,
            Self::ConfidentialProtected => 4,
            Self::BulkSmall => 8,
            Self::BulkLarge => 10,
            Self::Trojan => 0,
            Self::BitPacket => 0,
        }
    }

    /// Whether this is one of the three messenger types.
    pub fn is_messenger(self) -> bool {
        matches!(
            self,
            Self::SquareMessenger | Self::TriangleMessenger | Self::SmallMessenger
        )
    }

    /// Whether this is a protected type.
    pub fn is_protected(self) -> bool {
        matches!(self, Self::Protected | Self::ConfidentialProtected)
    }

    /// Whether this is a confidential type.
    pub fn is_confidential(self) -> bool {
        matches!(self, Self::Confidential | Self::ConfidentialProtected)
    }

    /// Whether this is a bulk type.
    pub fn is_bulk(self) -> bool {
        matches!(self, Self::BulkSmall | Self::BulkLarge)
    }

    /// The messenger kind, if this is a messenger type.
    pub fn messenger_kind(self) -> Option<MessengerKind> {
        match self {
            Self::SmallMessenger => Some(MessengerKind::Small),
            Self::SquareMessenger => Some(MessengerKind::Square),
            Self::TriangleMessenger => Some(MessengerKind::Triangle),
            _ => None,
        }
    }

    /// The bulk kind, if this is a bulk type.
    pub fn bulk_kind(self) -> Option<BulkKind> {
        match self {
            Self::BulkSmall => Some(BulkKind::Small),
            Self::BulkLarge => Some(BulkKind::Large),
            _ => None,
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
