//! The mutable simulation context.

use indexmap::IndexMap;
use skein_core::{BulkGroupId, GameOverReason, PacketId, Settings};
use skein_model::{GameLevel, Packet, SystemKind};

/// The three observables captured at level start and restored on
/// restart.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelStartSnapshot {
    /// Coin balance at level start.
    pub coins: u64,
    /// Lost-packet count at level start.
    pub lost_packets: u64,
    /// Remaining wire budget at level start.
    pub remaining_wire_length: f64,
}

/// The mutable simulation context: the level, the packet store, and all
/// run-scoped counters and flags.
///
/// Packets live here and nowhere else; wires, ports, and storage refer
/// to them by id.
#[derive(Clone, Debug)]
pub struct GameState {
    /// The level being played.
    pub level: GameLevel,
    /// Every live packet, keyed by id in creation order.
    pub packets: IndexMap<PacketId, Packet>,
    /// Tunable settings.
    pub settings: Settings,
    /// Wire budget still available for edits.
    pub remaining_wire_length: f64,
    /// Coin balance.
    pub coins: u64,
    /// Packets counted lost so far.
    pub lost_packets: u64,
    /// Seconds of simulation since the level started.
    pub level_timer: f64,
    /// The injection clock; drives the packet schedule.
    pub temporal_progress: f64,
    /// Whether ticking is suspended.
    pub paused: bool,
    /// Set once a game-over predicate fired.
    pub game_over: bool,
    /// Set once the level-complete predicate fired.
    pub level_complete: bool,
    /// The reason the simulation ended, if it has.
    pub last_game_over_reason: GameOverReason,
    next_packet_id: u64,
    next_bulk_group: u64,
}

impl GameState {
    /// Construct a state for a level.
    ///
    /// Wires already present in the level count as consumed budget.
    pub fn new(level: GameLevel, settings: Settings) -> Self {
        let remaining = level.initial_wire_length - level.consumed_wire_length();
        Self {
            level,
            packets: IndexMap::new(),
            settings,
            remaining_wire_length: remaining,
            coins: 0,
            lost_packets: 0,
            level_timer: 0.0,
            temporal_progress: 0.0,
            paused: false,
            game_over: false,
            level_complete: false,
            last_game_over_reason: GameOverReason::None,
            next_packet_id: 0,
            next_bulk_group: 0,
        }
    }

    /// Allocate the next packet id.
    pub fn alloc_packet_id(&mut self) -> PacketId {
        let id = PacketId(self.next_packet_id);
        self.next_packet_id += 1;
        id
    }

    /// Allocate the next bulk-group id.
    pub fn alloc_bulk_group(&mut self) -> BulkGroupId {
        let id = BulkGroupId(self.next_bulk_group);
        self.next_bulk_group += 1;
        id
    }

    /// The packet with this id, if still live.
    pub fn packet(&self, id: PacketId) -> Option<&Packet> {
        self.packets.get(&id)
    }

    /// Mutable access to the packet with this id.
    pub fn packet_mut(&mut self, id: PacketId) -> Option<&mut Packet> {
        self.packets.get_mut(&id)
    }

    /// Insert a freshly constructed packet into the store.
    pub fn insert_packet(&mut self, packet: Packet) {
        self.packets.insert(packet.id, packet);
    }

    /// Number of live packets.
    pub fn active_packet_count(&self) -> usize {
        self.packets.values().filter(|p| p.active).count()
    }

    /// Total packets the schedule will ever inject.
    pub fn total_injected(&self) -> usize {
        self.level.schedule.len()
    }

    /// Packets delivered across all reference systems.
    pub fn delivered_count(&self) -> u64 {
        self.level
            .systems()
            .filter_map(|s| match s.kind {
                SystemKind::Reference { delivered } => Some(delivered),
                _ => None,
            })
            .sum()
    }

    /// Loss percentage: lost over total scheduled, in [0, 100].
    pub fn packet_loss_pct(&self) -> f64 {
        let total = self.total_injected();
        if total == 0 {
            0.0
        } else {
            (self.lost_packets as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        }
    }

    /// Add coins.
    pub fn add_coins(&mut self, amount: u64) {
        self.coins += amount;
    }

    /// Spend coins; returns false (and changes nothing) when short.
    pub fn spend_coins(&mut self, amount: u64) -> bool {
        if self.coins >= amount {
            self.coins -= amount;
            true
        } else {
            false
        }
    }

    /// Capture the restart snapshot.
    pub fn snapshot(&self) -> LevelStartSnapshot {
        LevelStartSnapshot {
            coins: self.coins,
            lost_packets: self.lost_packets,
            remaining_wire_length: self.remaining_wire_length,
        }
    }

    /// Restore the restart snapshot and reset run-scoped state.
    ///
    /// The level graph itself (wires, port shapes, system health) is the
    /// caller's responsibility; this clears timers, flags, packets, and
    /// the id counters.
    pub fn restore(&mut self, snapshot: LevelStartSnapshot) {
        self.coins = snapshot.coins;
        self.lost_packets = snapshot.lost_packets;
        self.remaining_wire_length = snapshot.remaining_wire_length;
        self.packets.clear();
        self.level_timer = 0.0;
        self.temporal_progress = 0.0;
        self.paused = false;
        self.game_over = false;
        self.level_complete = false;
        self.last_game_over_reason = GameOverReason::None;
        self.next_packet_id = 0;
        self.next_bulk_group = 0;
        for injection in &mut self.level.schedule {
            injection.executed = false;
        }
    }
}
