//! Levels: the mutable graph of systems, wires, and scheduled injections.

use indexmap::IndexMap;
use skein_core::{PacketType, PortRef, SystemId, WireId};
use skein_geometry::{PathStyle, Point2D, WirePath};

use crate::port::Port;
use crate::system::{SystemKind, SystemNode};
use crate::wire::WireConnection;

/// A scheduled creation of one packet at a source system.
#[derive(Clone, Debug, PartialEq)]
pub struct PacketInjection {
    /// Temporal-progress time at which the injection becomes due.
    pub time: f64,
    /// What to inject.
    pub packet_type: PacketType,
    /// The reference system that emits the packet.
    pub source: SystemId,
    /// True once the packet has been placed on an outgoing wire. A due
    /// injection that cannot be placed stays unexecuted and retries.
    pub executed: bool,
}

impl PacketInjection {
    /// Construct an unexecuted injection.
    pub fn new(time: f64, packet_type: PacketType, source: SystemId) -> Self {
        Self {
            time,
            packet_type,
            source,
            executed: false,
        }
    }
}

/// A level: systems, wires, wire budget, duration, and the injection
/// schedule.
#[derive(Clone, Debug)]
pub struct GameLevel {
    /// Stable level identifier from the level file.
    pub level_id: String,
    /// Display name.
    pub name: String,
    /// Display description.
    pub description: String,
    /// Total wire length the player may spend.
    pub initial_wire_length: f64,
    /// Nominal level duration in seconds.
    pub level_duration: f64,
    /// Tutorial levels relax speed damage and use undirected
    /// connectivity.
    pub tutorial: bool,
    /// Scheduled injections, ordered by time.
    pub schedule: Vec<PacketInjection>,
    systems: IndexMap<SystemId, SystemNode>,
    wires: IndexMap<WireId, WireConnection>,
    next_system: u32,
    next_wire: u32,
}

impl GameLevel {
    /// Construct an empty level.
    pub fn new(
        level_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        initial_wire_length: f64,
        level_duration: f64,
    ) -> Self {
        Self {
            level_id: level_id.into(),
            name: name.into(),
            description: description.into(),
            initial_wire_length,
            level_duration,
            tutorial: false,
            schedule: Vec::new(),
            systems: IndexMap::new(),
            wires: IndexMap::new(),
            next_system: 0,
            next_wire: 0,
        }
    }

    // ── Systems ──────────────────────────────────────────────────

    /// Add a system and return its id.
    pub fn add_system(
        &mut self,
        label: impl Into<String>,
        kind: SystemKind,
        position: Point2D,
    ) -> SystemId {
        let id = SystemId(self.next_system);
        self.next_system += 1;
        self.systems
            .insert(id, SystemNode::new(id, label, kind, position));
        id
    }

    /// All systems, in insertion order.
    pub fn systems(&self) -> impl Iterator<Item = &SystemNode> {
        self.systems.values()
    }

    /// Mutable iteration over all systems.
    pub fn systems_mut(&mut self) -> impl Iterator<Item = &mut SystemNode> {
        self.systems.values_mut()
    }

    /// Ids of all systems, in insertion order.
    pub fn system_ids(&self) -> Vec<SystemId> {
        self.systems.keys().copied().collect()
    }

    /// Number of systems.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// The system with this id.
    pub fn system(&self, id: SystemId) -> Option<&SystemNode> {
        self.systems.get(&id)
    }

    /// Mutable access to the system with this id.
    pub fn system_mut(&mut self, id: SystemId) -> Option<&mut SystemNode> {
        self.systems.get_mut(&id)
    }

    /// Resolve a system by its level-file string id.
    pub fn system_by_label(&self, label: &str) -> Option<&SystemNode> {
        self.systems.values().find(|s| s.label == label)
    }

    /// All reference systems.
    pub fn reference_systems(&self) -> impl Iterator<Item = &SystemNode> {
        self.systems.values().filter(|s| s.kind.is_reference())
    }

    /// Reference systems bound as sources: those the schedule injects
    /// from.
    pub fn source_systems(&self) -> Vec<SystemId> {
        self.systems
            .values()
            .filter(|s| {
                s.kind.is_reference() && self.schedule.iter().any(|inj| inj.source == s.id)
            })
            .map(|s| s.id)
            .collect()
    }

    // ── Ports ────────────────────────────────────────────────────

    /// The port a reference addresses, if it exists.
    pub fn port(&self, port: PortRef) -> Option<&Port> {
        self.systems
            .get(&port.system)?
            .port(port.direction, port.index as usize)
    }

    /// Mutable access to the port a reference addresses.
    pub fn port_mut(&mut self, port: PortRef) -> Option<&mut Port> {
        self.systems
            .get_mut(&port.system)?
            .port_mut(port.direction, port.index as usize)
    }

    // ── Wires ────────────────────────────────────────────────────

    /// Add a wire and return its id.
    ///
    /// `source` must be an output port and `destination` an input port;
    /// the wiring controller normalizes and validates before calling.
    pub fn add_wire(&mut self, source: PortRef, destination: PortRef, length: f64) -> WireId {
        let id = WireId(self.next_wire);
        self.next_wire += 1;
        self.wires
            .insert(id, WireConnection::new(id, source, destination, length));
        id
    }

    /// All wires ever created, in insertion order (inactive included).
    pub fn wires(&self) -> impl Iterator<Item = &WireConnection> {
        self.wires.values()
    }

    /// Mutable iteration over all wires.
    pub fn wires_mut(&mut self) -> impl Iterator<Item = &mut WireConnection> {
        self.wires.values_mut()
    }

    /// Active wires only.
    pub fn active_wires(&self) -> impl Iterator<Item = &WireConnection> {
        self.wires.values().filter(|w| w.active)
    }

    /// Ids of active wires, in insertion order.
    pub fn active_wire_ids(&self) -> Vec<WireId> {
        self.wires
            .values()
            .filter(|w| w.active)
            .map(|w| w.id)
            .collect()
    }

    /// The wire with this id.
    pub fn wire(&self, id: WireId) -> Option<&WireConnection> {
        self.wires.get(&id)
    }

    /// Mutable access to the wire with this id.
    pub fn wire_mut(&mut self, id: WireId) -> Option<&mut WireConnection> {
        self.wires.get_mut(&id)
    }

    /// The active wire leaving this output port, if any.
    pub fn wire_from_output(&self, port: PortRef) -> Option<WireId> {
        self.wires
            .values()
            .find(|w| w.active && w.source == port)
            .map(|w| w.id)
    }

    /// The active wire feeding this input port, if any.
    pub fn wire_into_input(&self, port: PortRef) -> Option<WireId> {
        self.wires
            .values()
            .find(|w| w.active && w.destination == port)
            .map(|w| w.id)
    }

    /// Whether an active wire already joins these two ports (either
    /// orientation).
    pub fn has_wire_between(&self, a: PortRef, b: PortRef) -> bool {
        self.wires.values().any(|w| {
            w.active
                && ((w.source == a && w.destination == b) || (w.source == b && w.destination == a))
        })
    }

    /// Control points of a wire's path: source port, bends, destination
    /// port.
    pub fn wire_control_points(&self, id: WireId) -> Option<Vec<Point2D>> {
        let wire = self.wires.get(&id)?;
        let source = self.port(wire.source)?.position;
        let destination = self.port(wire.destination)?.position;
        let mut points = Vec::with_capacity(wire.bends.len() + 2);
        points.push(source);
        points.extend(wire.bends.iter().map(|b| b.position));
        points.push(destination);
        Some(points)
    }

    /// The sampled path of a wire in the given style.
    pub fn wire_path(&self, id: WireId, smooth: bool) -> Option<WirePath> {
        let control = self.wire_control_points(id)?;
        Some(WirePath::new(&control, PathStyle::from_smooth(smooth)))
    }

    /// Total path length of a wire in the given style.
    pub fn wire_total_length(&self, id: WireId, smooth: bool) -> Option<f64> {
        self.wire_path(id, smooth).map(|p| p.total_length())
    }

    /// Sum of all active wires' recorded lengths.
    pub fn consumed_wire_length(&self) -> f64 {
        self.wires
            .values()
            .filter(|w| w.active)
            .map(|w| w.wire_length)
            .sum()
    }

    /// The destination system reached through an output port's wire, if
    /// the port is wired.
    pub fn destination_of_output(&self, port: PortRef) -> Option<SystemId> {
        let wire = self.wires.get(&self.wire_from_output(port)?)?;
        Some(wire.destination.system)
    }

    /// Whether the level has at least one source and one reference sink.
    pub fn is_valid(&self) -> bool {
        !self.source_systems().is_empty() && self.reference_systems().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::{PortDirection, PortShape, SystemId};
    use skein_geometry::Vec2D;

    fn two_system_level() -> (GameLevel, SystemId, SystemId) {
        let mut level = GameLevel::new("t1", "test", "", 1000.0, 60.0);
        let a = level.add_system("a", SystemKind::reference(), Point2D::new(0.0, 0.0));
        let b = level.add_system("b", SystemKind::reference(), Point2D::new(200.0, 0.0));
        let sys_a = level.system_mut(a).unwrap();
        sys_a.output_ports.push(Port::new(
            PortShape::Square,
            PortDirection::Output,
            Point2D::new(0.0, 0.0),
            Vec2D::new(20.0, 0.0),
        ));
        let sys_b = level.system_mut(b).unwrap();
        sys_b.input_ports.push(Port::new(
            PortShape::Square,
            PortDirection::Input,
            Point2D::new(200.0, 0.0),
            Vec2D::new(-20.0, 0.0),
        ));
        (level, a, b)
    }

    #[test]
    fn system_ids_are_dense() {
        let (level, a, b) = two_system_level();
        assert_eq!(a, SystemId(0));
        assert_eq!(b, SystemId(1));
        assert_eq!(level.system_count(), 2);
    }

    #[test]
    fn wire_lookup_by_port() {
        let (mut level, a, b) = two_system_level();
        let out = PortRef::output(a, 0);
        let inp = PortRef::input(b, 0);
        let id = level.add_wire(out, inp, 160.0);
        assert_eq!(level.wire_from_output(out), Some(id));
        assert_eq!(level.wire_into_input(inp), Some(id));
        assert!(level.has_wire_between(inp, out));
        assert_eq!(level.destination_of_output(out), Some(b));
    }

    #[test]
    fn inactive_wires_are_not_found_by_port() {
        let (mut level, a, b) = two_system_level();
        let out = PortRef::output(a, 0);
        let id = level.add_wire(out, PortRef::input(b, 0), 160.0);
        level.wire_mut(id).unwrap().active = false;
        assert_eq!(level.wire_from_output(out), None);
        assert_eq!(level.consumed_wire_length(), 0.0);
    }

    #[test]
    fn wire_control_points_include_bends() {
        let (mut level, a, b) = two_system_level();
        let id = level.add_wire(PortRef::output(a, 0), PortRef::input(b, 0), 160.0);
        level
            .wire_mut(id)
            .unwrap()
            .bends
            .push(crate::wire::WireBend::new(Point2D::new(100.0, 50.0)));
        let control = level.wire_control_points(id).unwrap();
        assert_eq!(control.len(), 3);
        assert_eq!(control[1], Point2D::new(100.0, 50.0));
    }

    #[test]
    fn source_systems_follow_schedule() {
        let (mut level, a, _) = two_system_level();
        assert!(level.source_systems().is_empty());
        level
            .schedule
            .push(PacketInjection::new(2.0, PacketType::SquareMessenger, a));
        assert_eq!(level.source_systems(), vec![a]);
        assert!(level.is_valid());
    }

    #[test]
    fn polyline_wire_length_is_straight_distance() {
        let (mut level, a, b) = two_system_level();
        let id = level.add_wire(PortRef::output(a, 0), PortRef::input(b, 0), 0.0);
        // Ports sit at x=20 and x=180.
        let len = level.wire_total_length(id, false).unwrap();
        assert!((len - 160.0).abs() < 1e-9);
    }
}
