//! Systems: graph nodes with ports, storage, and a behavior policy.

use skein_core::{PacketId, PortDirection, PortRef, SystemId};
use skein_geometry::{Point2D, Rect};

use crate::port::Port;

/// Bounded storage capacity for every system except the distributor.
pub const MAX_STORAGE: usize = 5;

/// Side length of a system's square bounds, in pixels.
pub const SYSTEM_SIZE: f64 = 40.0;

/// Default anti-trojan influence radius, in pixels.
pub const DEFAULT_SCAN_RADIUS: f64 = 120.0;

/// Per-variant state and policy selector for a system.
#[derive(Clone, Debug, PartialEq)]
pub enum SystemKind {
    /// Forwards packets by the shared routing rules.
    Normal,
    /// Source and/or sink; finalizes deliveries instead of forwarding.
    Reference {
        /// Packets delivered here, each counted exactly once.
        delivered: u64,
    },
    /// Destroys confidentials, strips protection, teleports the rest.
    Spy,
    /// Adds noise, sometimes converts to trojans, routes incompatibly.
    Saboteur,
    /// Wraps messengers and confidentials in protection.
    Vpn,
    /// Converts trojans within its influence radius back to messengers.
    AntiTrojan {
        /// Influence radius of the per-tick scan, in pixels.
        scan_radius: f64,
    },
    /// Splits bulk packets into bits; unlimited storage.
    Distributor,
    /// Reassembles bit groups into bulk packets.
    Merger {
        /// Bits collected and awaiting reassembly.
        pending: Vec<PacketId>,
    },
}

impl SystemKind {
    /// An anti-trojan with the default scan radius.
    pub fn anti_trojan() -> Self {
        Self::AntiTrojan {
            scan_radius: DEFAULT_SCAN_RADIUS,
        }
    }

    /// A merger with an empty pending pool.
    pub fn merger() -> Self {
        Self::Merger {
            pending: Vec::new(),
        }
    }

    /// A reference system with no deliveries yet.
    pub fn reference() -> Self {
        Self::Reference { delivered: 0 }
    }

    /// Whether this is a reference system.
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }
}

/// A node in the network graph.
#[derive(Clone, Debug, PartialEq)]
pub struct SystemNode {
    /// Unique id within the level.
    pub id: SystemId,
    /// The string id from the level file, kept for diagnostics.
    pub label: String,
    /// Per-variant state and policy selector.
    pub kind: SystemKind,
    /// Centre position.
    pub position: Point2D,
    /// Input ports, in file order.
    pub input_ports: Vec<Port>,
    /// Output ports, in file order.
    pub output_ports: Vec<Port>,
    /// Stored packets waiting for a free output port.
    pub storage: Vec<PacketId>,
    /// False while deactivated (temporarily or permanently).
    pub active: bool,
    /// Seconds of deactivation remaining.
    pub deactivation_timer: f64,
    /// True once permanently failed.
    pub failed: bool,
    /// Whether the all-ports-connected indicator is lit.
    pub indicator_visible: bool,
}

impl SystemNode {
    /// Construct an active, empty system.
    pub fn new(id: SystemId, label: impl Into<String>, kind: SystemKind, position: Point2D) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
            position,
            input_ports: Vec::new(),
            output_ports: Vec::new(),
            storage: Vec::new(),
            active: true,
            deactivation_timer: 0.0,
            failed: false,
            indicator_visible: false,
        }
    }

    /// The system's square bounds, for wire-crossing checks.
    pub fn bounds(&self) -> Rect {
        Rect::centered(self.position, SYSTEM_SIZE, SYSTEM_SIZE)
    }

    /// The port addressed by direction and index, if it exists.
    pub fn port(&self, direction: PortDirection, index: usize) -> Option<&Port> {
        match direction {
            PortDirection::Input => self.input_ports.get(index),
            PortDirection::Output => self.output_ports.get(index),
        }
    }

    /// Mutable access to the port addressed by direction and index.
    pub fn port_mut(&mut self, direction: PortDirection, index: usize) -> Option<&mut Port> {
        match direction {
            PortDirection::Input => self.input_ports.get_mut(index),
            PortDirection::Output => self.output_ports.get_mut(index),
        }
    }

    /// References to every port on this system, inputs first.
    pub fn port_refs(&self) -> impl Iterator<Item = PortRef> + '_ {
        let id = self.id;
        let inputs = (0..self.input_ports.len()).map(move |i| PortRef::input(id, i as u16));
        let outputs = (0..self.output_ports.len()).map(move |i| PortRef::output(id, i as u16));
        inputs.chain(outputs)
    }

    /// Packets currently inside the system: storage plus held ports (and
    /// a merger's pending pool).
    pub fn total_packet_count(&self) -> usize {
        let in_ports = self
            .input_ports
            .iter()
            .chain(&self.output_ports)
            .filter(|p| p.packet.is_some())
            .count();
        let pending = match &self.kind {
            SystemKind::Merger { pending } => pending.len(),
            _ => 0,
        };
        self.storage.len() + in_ports + pending
    }

    /// Whether storage can take another packet.
    pub fn has_storage_space(&self) -> bool {
        matches!(self.kind, SystemKind::Distributor) || self.storage.len() < MAX_STORAGE
    }

    /// Temporarily deactivate for `duration` seconds.
    pub fn deactivate(&mut self, duration: f64) {
        self.active = false;
        self.deactivation_timer = duration;
    }

    /// Advance the deactivation timer; reactivates unless failed.
    pub fn update_deactivation_timer(&mut self, dt: f64) {
        if self.deactivation_timer > 0.0 {
            self.deactivation_timer -= dt;
            if self.deactivation_timer <= 0.0 {
                self.deactivation_timer = 0.0;
                if !self.failed {
                    self.active = true;
                }
            }
        }
    }

    /// Whether every existing port is connected.
    ///
    /// One-sided systems (sources, sinks) count as connected when their
    /// only side is fully wired; portless systems are trivially connected.
    pub fn all_ports_connected(&self) -> bool {
        let inputs_ok = self.input_ports.iter().all(|p| p.connected);
        let outputs_ok = self.output_ports.iter().all(|p| p.connected);
        if self.input_ports.is_empty() {
            outputs_ok
        } else if self.output_ports.is_empty() {
            inputs_ok
        } else {
            inputs_ok && outputs_ok
        }
    }

    /// Reposition the system and its ports.
    pub fn set_position(&mut self, position: Point2D) {
        self.position = position;
        for port in self.input_ports.iter_mut().chain(&mut self.output_ports) {
            port.reposition(position);
        }
    }
}
