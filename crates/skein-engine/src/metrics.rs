//! Cumulative simulation counters.

/// Event counters accumulated across a simulation run.
///
/// All counters are cumulative since the last reset (level start or
/// rewind); consumers read them between ticks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickMetrics {
    /// Ticks executed.
    pub ticks: u64,
    /// Packets successfully injected onto a wire.
    pub injected: u64,
    /// Injection attempts deferred for lack of an available wire.
    pub deferred_injections: u64,
    /// Packets finalized by reference systems.
    pub delivered: u64,
    /// Packets counted lost.
    pub lost: u64,
    /// Collision events (each destroys two packets).
    pub collisions: u64,
    /// Packets struck by a shockwave.
    pub shockwaves: u64,
    /// Spy teleports.
    pub teleports: u64,
    /// Saboteur conversions to trojan.
    pub trojan_conversions: u64,
    /// Trojans converted back by anti-trojan scans.
    pub trojans_cleansed: u64,
    /// Bulk packets split by distributors.
    pub bulk_splits: u64,
    /// Bulk packets reassembled by mergers.
    pub bulk_merges: u64,
    /// Systems deactivated by high-speed packets.
    pub systems_damaged: u64,
    /// Wires destroyed by bulk passages.
    pub wires_destroyed: u64,
}
