//! Wire connections: directed, single-capacity edges with bends.

use skein_core::{PacketId, PortRef, WireId};
use skein_geometry::Point2D;
use smallvec::SmallVec;

/// Maximum bends per wire.
pub const MAX_BENDS: usize = 3;

/// Bulk passages after which a wire is destroyed.
pub const MAX_BULK_PASSAGES: u32 = 3;

/// Default radius within which a bend may be dragged.
pub const DEFAULT_BEND_MOVE_RADIUS: f64 = 50.0;

/// A control point shaping a wire's path.
#[derive(Clone, Debug, PartialEq)]
pub struct WireBend {
    /// The bend's position; always pinned exactly on the path.
    pub position: Point2D,
    /// How far the bend may be dragged from its current position in one
    /// move.
    pub max_move_radius: f64,
    /// Whether the bend may be moved at all.
    pub movable: bool,
}

impl WireBend {
    /// Construct a movable bend with the default move radius.
    pub fn new(position: Point2D) -> Self {
        Self {
            position,
            max_move_radius: DEFAULT_BEND_MOVE_RADIUS,
            movable: true,
        }
    }

    /// Whether a move to `target` stays within the bend's radius.
    pub fn within_move_radius(&self, target: Point2D) -> bool {
        self.position.distance_to(target) <= self.max_move_radius
    }
}

/// A directed edge from an output port to an input port.
///
/// Carries at most one in-flight packet and is destroyed by its third
/// bulk-packet passage.
#[derive(Clone, Debug, PartialEq)]
pub struct WireConnection {
    /// Unique id within the level.
    pub id: WireId,
    /// The output port the wire starts at.
    pub source: PortRef,
    /// The input port the wire ends at.
    pub destination: PortRef,
    /// Ordered control points between the endpoints.
    pub bends: SmallVec<[WireBend; MAX_BENDS]>,
    /// Budget consumed by this wire, in the current path style.
    pub wire_length: f64,
    /// False once removed or merged away.
    pub active: bool,
    /// True once destroyed by bulk passages; destroyed wires never carry
    /// packets again.
    pub destroyed: bool,
    /// How many bulk packets have entered this wire.
    pub bulk_passages: u32,
    /// The packet currently in flight, if any.
    pub packet: Option<PacketId>,
}

impl WireConnection {
    /// Construct an active, empty wire.
    ///
    /// Endpoint normalization (output→input) is the wiring controller's
    /// job; this constructor trusts its arguments.
    pub fn new(id: WireId, source: PortRef, destination: PortRef, wire_length: f64) -> Self {
        Self {
            id,
            source,
            destination,
            bends: SmallVec::new(),
            wire_length,
            active: true,
            destroyed: false,
            bulk_passages: 0,
            packet: None,
        }
    }

    /// Whether the wire can take a new packet: empty, active, and not
    /// destroyed.
    pub fn can_accept_packet(&self) -> bool {
        self.packet.is_none() && self.active && !self.destroyed
    }

    /// Record a bulk packet entering this wire.
    ///
    /// Returns `true` when this passage destroyed the wire.
    pub fn record_bulk_passage(&mut self) -> bool {
        self.bulk_passages += 1;
        if self.bulk_passages >= MAX_BULK_PASSAGES {
            self.destroyed = true;
            self.active = false;
            true
        } else {
            false
        }
    }

    /// Whether the wire still has bend capacity.
    pub fn can_add_bend(&self) -> bool {
        self.bends.len() < MAX_BENDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::{PortRef, SystemId};

    fn wire() -> WireConnection {
        WireConnection::new(
            WireId(0),
            PortRef::output(SystemId(0), 0),
            PortRef::input(SystemId(1), 0),
            100.0,
        )
    }

    #[test]
    fn fresh_wire_accepts() {
        assert!(wire().can_accept_packet());
    }

    #[test]
    fn occupied_wire_refuses() {
        let mut w = wire();
        w.packet = Some(PacketId(1));
        assert!(!w.can_accept_packet());
    }

    #[test]
    fn third_bulk_passage_destroys() {
        let mut w = wire();
        assert!(!w.record_bulk_passage());
        assert!(!w.record_bulk_passage());
        assert!(!w.destroyed);
        assert!(w.record_bulk_passage());
        assert!(w.destroyed);
        assert!(!w.active);
        assert!(!w.can_accept_packet());
    }

    #[test]
    fn bend_capacity_is_three() {
        let mut w = wire();
        for i in 0..MAX_BENDS {
            assert!(w.can_add_bend(), "bend {i} should fit");
            w.bends.push(WireBend::new(Point2D::new(i as f64, 0.0)));
        }
        assert!(!w.can_add_bend());
    }

    #[test]
    fn bend_move_radius_bounds_moves() {
        let b = WireBend::new(Point2D::new(0.0, 0.0));
        assert!(b.within_move_radius(Point2D::new(50.0, 0.0)));
        assert!(!b.within_move_radius(Point2D::new(51.0, 0.0)));
    }
}
