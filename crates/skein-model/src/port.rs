//! Ports: single-capacity slots on a system.

use skein_core::{PacketId, PacketType, PortDirection, PortShape};
use skein_geometry::{Point2D, Vec2D};

/// A typed endpoint on a system holding at most one packet.
#[derive(Clone, Debug, PartialEq)]
pub struct Port {
    /// The port's shape; drives the compatibility predicate.
    pub shape: PortShape,
    /// Whether the port receives or emits packets.
    pub direction: PortDirection,
    /// Absolute position.
    pub position: Point2D,
    /// Offset from the owning system's centre, preserved across system
    /// moves.
    pub offset: Vec2D,
    /// Whether a wire is attached.
    pub connected: bool,
    /// The packet currently held, if any.
    pub packet: Option<PacketId>,
}

impl Port {
    /// Construct an unconnected, empty port at an offset from the system
    /// centre.
    pub fn new(shape: PortShape, direction: PortDirection, center: Point2D, offset: Vec2D) -> Self {
        Self {
            shape,
            direction,
            position: center + offset,
            offset,
            connected: false,
            packet: None,
        }
    }

    /// Whether the slot is free.
    pub fn is_empty(&self) -> bool {
        self.packet.is_none()
    }

    /// Compatibility predicate for movement mechanics.
    ///
    /// Messengers match their home shape; every other type is compatible
    /// everywhere. Compatibility never refuses acceptance.
    pub fn is_compatible_with(&self, packet_type: PacketType) -> bool {
        match packet_type.messenger_kind() {
            Some(kind) => self.shape == kind.home_shape(),
            None => true,
        }
    }

    /// Take the held packet out of the slot.
    pub fn release(&mut self) -> Option<PacketId> {
        self.packet.take()
    }

    /// Re-derive the absolute position after the owning system moved.
    pub fn reposition(&mut self, center: Point2D) {
        self.position = center + self.offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::PacketId;

    fn port(shape: PortShape) -> Port {
        Port::new(
            shape,
            PortDirection::Input,
            Point2D::new(100.0, 100.0),
            Vec2D::new(-20.0, 0.0),
        )
    }

    #[test]
    fn position_derives_from_offset() {
        let p = port(PortShape::Square);
        assert_eq!(p.position, Point2D::new(80.0, 100.0));
    }

    #[test]
    fn messenger_compatibility_by_shape() {
        assert!(port(PortShape::Square).is_compatible_with(PacketType::SquareMessenger));
        assert!(!port(PortShape::Square).is_compatible_with(PacketType::SmallMessenger));
        assert!(port(PortShape::Hexagon).is_compatible_with(PacketType::SmallMessenger));
        assert!(port(PortShape::Triangle).is_compatible_with(PacketType::TriangleMessenger));
    }

    #[test]
    fn non_messengers_are_always_compatible() {
        for shape in PortShape::ALL {
            let p = port(shape);
            assert!(p.is_compatible_with(PacketType::Confidential));
            assert!(p.is_compatible_with(PacketType::BulkLarge));
            assert!(p.is_compatible_with(PacketType::Protected));
            assert!(p.is_compatible_with(PacketType::Trojan));
            assert!(p.is_compatible_with(PacketType::BitPacket));
        }
    }

    #[test]
    fn release_empties_the_slot() {
        let mut p = port(PortShape::Hexagon);
        p.packet = Some(PacketId(9));
        assert!(!p.is_empty());
        assert_eq!(p.release(), Some(PacketId(9)));
        assert!(p.is_empty());
        assert_eq!(p.release(), None);
    }

    #[test]
    fn reposition_tracks_system_center() {
        let mut p = port(PortShape::Square);
        p.reposition(Point2D::new(50.0, 60.0));
        assert_eq!(p.position, Point2D::new(30.0, 60.0));
    }
}
