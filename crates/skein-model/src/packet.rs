//! Packets: the typed, kinematic objects that travel the network.

use skein_core::{BulkGroupId, BulkKind, MessengerKind, PacketId, PacketType, WireId};
use skein_geometry::{Point2D, Vec2D};

/// Default per-packet lifetime in seconds.
pub const DEFAULT_MAX_TRAVEL_TIME: f64 = 30.0;

/// Default base speed in pixels per second.
pub const DEFAULT_BASE_SPEED: f64 = 50.0;

/// Per-variant state of a packet.
///
/// The shared kinematic header lives on [`Packet`]; this enum carries only
/// what differs between types.
#[derive(Clone, Debug, PartialEq)]
pub enum PacketKind {
    /// A plain messenger.
    Messenger(MessengerKind),
    /// A messenger wrapped by a VPN system. `movement` is re-rolled on
    /// every wire entry and drives the kinematic profile; `original` is
    /// restored when the wrapper is stripped.
    Protected {
        /// The wrapped messenger type.
        original: MessengerKind,
        /// The movement profile currently in effect.
        movement: MessengerKind,
    },
    /// A confidential packet.
    Confidential,
    /// A protected confidential packet, which keeps its distance from
    /// other traffic.
    ConfidentialProtected,
    /// A bulk packet.
    Bulk {
        /// Which bulk variant.
        kind: BulkKind,
        /// Distance travelled since the last perpendicular deflection
        /// (large bulk only).
        since_deflection: f64,
    },
    /// A fragment of a split bulk packet.
    Bit {
        /// Group shared by all bits of the original bulk.
        group: BulkGroupId,
        /// Number of bits the original bulk split into.
        group_size: u32,
        /// Display color index shared by the group.
        color: u32,
    },
    /// A trojan.
    Trojan,
}

/// A packet: common kinematic state plus a [`PacketKind`] variant.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    /// Unique id within the engine's packet store.
    pub id: PacketId,
    /// Per-variant state.
    pub kind: PacketKind,
    /// Size; the loss bound for noise.
    pub size: u32,
    /// Accumulated noise. Strictly above `size` the packet is lost.
    pub noise_level: f64,
    /// Current position.
    pub position: Point2D,
    /// Current velocity, used for collision math and system speed checks.
    pub velocity: Vec2D,
    /// Scalar speed along the wire tangent, px/s.
    pub base_speed: f64,
    /// False once the packet has been delivered, destroyed, or lost.
    pub active: bool,
    /// Set when a rule (off-wire, spy, collision, ...) lost the packet.
    pub lost: bool,
    /// Set exactly once when a reference system finalizes delivery.
    pub delivered: bool,
    /// Set when the packet was transformed away (bulk split, bits
    /// merged); exempt from loss counting.
    pub consumed: bool,
    /// Seconds travelled on the current wire.
    pub travel_time: f64,
    /// Lifetime bound; exceeding it destroys the packet.
    pub max_travel_time: f64,
    /// Arc-length progress along the current wire, in [0, 1].
    pub path_progress: f64,
    /// The wire currently carrying this packet, if any.
    pub current_wire: Option<WireId>,
    /// True while returning toward the wire's source end.
    pub reversing: bool,
    /// Set when a small messenger or bit reversed off a collision and
    /// should retry its destination.
    pub retry_destination: bool,
    /// Set when the packet lands in an input port; consumed for the
    /// one-shot coin award.
    pub coin_award_pending: bool,
    /// Set when the packet exits through an incompatible port; consumed
    /// at the next wire entry as a 2x speed multiplier.
    pub pending_exit_boost: bool,
    /// Compatibility of the port the packet most recently entered a wire
    /// from; selects the acceleration profile.
    pub entry_compatible: bool,
    /// Accumulated displacement off the wire path (shockwaves, bulk
    /// deflection). Checked against the off-wire threshold and then
    /// snapped away by the kinematics pass.
    pub path_offset: Vec2D,
    /// Where the current leg started.
    pub source_position: Point2D,
    /// Where the current leg ends.
    pub destination_position: Point2D,
}

impl Packet {
    /// Construct a packet of the given type at a position.
    ///
    /// `Protected` and `ConfidentialProtected` are produced by VPN
    /// conversion, not direct construction, but are accepted here for
    /// schedule completeness: a scheduled `Protected` wraps a square
    /// messenger.
    pub fn new(id: PacketId, packet_type: PacketType, position: Point2D) -> Self {
        let kind = match packet_type {
            PacketType::SquareMessenger => PacketKind::Messenger(MessengerKind::Square),
            PacketType::TriangleMessenger => PacketKind::Messenger(MessengerKind::Triangle),
            PacketType::SmallMessenger => PacketKind::Messenger(MessengerKind::Small),
            PacketType::Protected => PacketKind::Protected {
                original: MessengerKind::Square,
                movement: MessengerKind::Square,
            },
            PacketType::Confidential => PacketKind::Confidential,
            PacketType::ConfidentialProtected => PacketKind::ConfidentialProtected,
            PacketType::BulkSmall => PacketKind::Bulk {
                kind: BulkKind::Small,
                since_deflection: 0.0,
            },
            PacketType::BulkLarge => PacketKind::Bulk {
                kind: BulkKind::Large,
                since_deflection: 0.0,
            },
            PacketType::Trojan => PacketKind::Trojan,
            PacketType::BitPacket => PacketKind::Bit {
                group: BulkGroupId(0),
                group_size: 0,
                color: 0,
            },
        };
        let size = match &kind {
            // Protected size is twice the wrapped messenger's base size.
            PacketKind::Protected { original, .. } => original.packet_type().base_size() * 2,
            _ => packet_type.base_size(),
        };
        let noise_level = match kind {
            PacketKind::Trojan => 1.0,
            _ => 0.0,
        };
        Self {
            id,
            kind,
            size,
            noise_level,
            position,
            velocity: Vec2D::ZERO,
            base_speed: DEFAULT_BASE_SPEED,
            active: true,
            lost: false,
            delivered: false,
            consumed: false,
            travel_time: 0.0,
            max_travel_time: DEFAULT_MAX_TRAVEL_TIME,
            path_progress: 0.0,
            current_wire: None,
            reversing: false,
            retry_destination: false,
            coin_award_pending: false,
            pending_exit_boost: false,
            entry_compatible: true,
            path_offset: Vec2D::ZERO,
            source_position: position,
            destination_position: position,
        }
    }

    /// Construct a bit packet belonging to a bulk group.
    pub fn bit(
        id: PacketId,
        group: BulkGroupId,
        group_size: u32,
        color: u32,
        position: Point2D,
        velocity: Vec2D,
    ) -> Self {
        let mut packet = Self::new(id, PacketType::BitPacket, position);
        packet.kind = PacketKind::Bit {
            group,
            group_size,
            color,
        };
        packet.velocity = velocity;
        packet
    }

    /// The catalogue type corresponding to this packet's current kind.
    pub fn packet_type(&self) -> PacketType {
        match &self.kind {
            PacketKind::Messenger(m) => m.packet_type(),
            PacketKind::Protected { .. } => PacketType::Protected,
            PacketKind::Confidential => PacketType::Confidential,
            PacketKind::ConfidentialProtected => PacketType::ConfidentialProtected,
            PacketKind::Bulk { kind, .. } => kind.packet_type(),
            PacketKind::Bit { .. } => PacketType::BitPacket,
            PacketKind::Trojan => PacketType::Trojan,
        }
    }

    /// Coin value awarded when this packet enters a system.
    pub fn coin_value(&self) -> u32 {
        self.packet_type().base_coin_value()
    }

    /// Whether the packet currently rides a wire.
    pub fn is_on_wire(&self) -> bool {
        self.current_wire.is_some()
    }

    /// Advance free-floating motion and the lifetime clock.
    ///
    /// Packets on wires are moved by the kinematics pass instead, but the
    /// lifetime clock ticks either way.
    pub fn update_position(&mut self, dt: f64) {
        if !self.active {
            return;
        }
        self.travel_time += dt;
        if self.travel_time > self.max_travel_time {
            self.active = false;
            return;
        }
        if !self.is_on_wire() {
            self.position += self.velocity * dt;
        }
    }

    /// Whether noise has strictly exceeded size.
    ///
    /// `noise == size` survives; only strictly greater is lost.
    pub fn noise_exceeded(&self) -> bool {
        self.noise_level > self.size as f64
    }

    /// Whether the lifetime bound was exceeded.
    pub fn travel_time_exceeded(&self) -> bool {
        self.travel_time > self.max_travel_time
    }

    /// Reverse travel direction in place.
    pub fn reverse_direction(&mut self) {
        self.reversing = true;
        self.velocity = -self.velocity;
    }

    /// Begin returning to the source end of the current leg.
    ///
    /// The endpoints swap roles while the path frame stays fixed, so the
    /// packet's physical position is unchanged: progress now counts down
    /// toward the old source. (Measured against the swapped endpoints
    /// the remaining distance is `1 − p`.)
    pub fn return_to_source(&mut self) {
        if self.is_on_wire() {
            self.reversing = true;
            std::mem::swap(&mut self.source_position, &mut self.destination_position);
        } else {
            self.reverse_direction();
        }
    }

    /// Place the packet onto a wire: resets progress and the per-wire
    /// clock, and re-rolls a protected packet's movement profile via the
    /// supplied picker.
    pub fn enter_wire(&mut self, wire: WireId, reroll_movement: impl FnOnce() -> MessengerKind) {
        self.current_wire = Some(wire);
        self.path_progress = 0.0;
        self.reversing = false;
        self.travel_time = 0.0;
        self.path_offset = Vec2D::ZERO;
        if let PacketKind::Protected { movement, .. } = &mut self.kind {
            *movement = reroll_movement();
        }
    }

    /// Remove the packet from its wire.
    pub fn leave_wire(&mut self) {
        self.current_wire = None;
        self.path_progress = 0.0;
        self.path_offset = Vec2D::ZERO;
    }

    /// Apply a collision shockwave displacement.
    ///
    /// Small messengers and bits reverse and retry instead of drifting;
    /// everything else is pushed off its path. Trojans take double noise.
    pub fn apply_shockwave(&mut self, displacement: Vec2D) {
        if !self.active {
            return;
        }
        self.noise_level += match self.kind {
            PacketKind::Trojan => 1.0,
            _ => 0.5,
        };
        match self.kind {
            PacketKind::Messenger(MessengerKind::Small) | PacketKind::Bit { .. } => {
                self.reverse_direction();
                self.retry_destination = true;
            }
            PacketKind::Protected {
                movement: MessengerKind::Small,
                ..
            } => {
                self.reverse_direction();
                self.retry_destination = true;
            }
            _ => {
                self.position += displacement;
                self.path_offset = self.path_offset + displacement;
            }
        }
    }

    /// Strip a protected wrapper, restoring the original type and size.
    ///
    /// Plain and protected confidentials both revert to the base
    /// confidential. No-op for anything else.
    pub fn revert_from_protected(&mut self) {
        match self.kind {
            PacketKind::Protected { original, .. } => {
                self.kind = PacketKind::Messenger(original);
                self.size = original.packet_type().base_size();
            }
            PacketKind::ConfidentialProtected => {
                self.kind = PacketKind::Confidential;
                self.size = PacketType::Confidential.base_size();
            }
            _ => {}
        }
    }

    /// Wrap a messenger into a protected packet (VPN conversion).
    ///
    /// No-op for non-messengers.
    pub fn convert_to_protected(&mut self, movement: MessengerKind) {
        if let PacketKind::Messenger(original) = self.kind {
            self.kind = PacketKind::Protected { original, movement };
            self.size = original.packet_type().base_size() * 2;
        } else if self.kind == PacketKind::Confidential {
            self.kind = PacketKind::ConfidentialProtected;
            self.size = PacketType::ConfidentialProtected.base_size();
        }
    }

    /// Convert to a trojan (saboteur conversion).
    pub fn convert_to_trojan(&mut self) {
        self.kind = PacketKind::Trojan;
        self.size = PacketType::Trojan.base_size();
        if self.noise_level < 1.0 {
            self.noise_level = 1.0;
        }
    }

    /// Convert a trojan back to a square messenger (anti-trojan sweep).
    ///
    /// Position and velocity are preserved; noise resets.
    pub fn convert_from_trojan(&mut self) {
        self.kind = PacketKind::Messenger(MessengerKind::Square);
        self.size = PacketType::SquareMessenger.base_size();
        self.noise_level = 0.0;
    }

    /// Halve speed when entering an occupied system (confidential only).
    pub fn adjust_speed_for_occupancy(&mut self, system_has_others: bool) {
        if system_has_others && self.packet_type() == PacketType::Confidential {
            self.velocity = self.velocity * 0.5;
            self.base_speed *= 0.5;
        }
    }
}
