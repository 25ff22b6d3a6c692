//! Per-system packet processing policies.
//!
//! Each system kind decides what happens to a packet released from one
//! of its input ports. The shared routine (speed damage, bulk side
//! effects, confidential slowdown, port-priority routing) is a
//! standalone function the variants call when they want the default.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use skein_core::{PacketId, PacketType, PortRef, PortShape, SystemId};
use skein_geometry::Vec2D;
use skein_model::{Packet, PacketKind, SystemKind};
use tracing::{debug, info, warn};

use crate::metrics::TickMetrics;
use crate::state::GameState;
use crate::transfer::{finalize_delivery, load_packet_on_wire};

/// Probability that a saboteur converts a packet into a trojan.
pub const TROJAN_CONVERSION_PROBABILITY: f64 = 0.3;

/// Release packets from input ports and run each system's policy.
///
/// Coin awards are consumed at the moment of release: one award per
/// system entry per packet.
pub(crate) fn process_inputs(state: &mut GameState, rng: &mut ChaCha8Rng, metrics: &mut TickMetrics) {
    let system_ids = state.level.system_ids();
    for system_id in system_ids {
        // Award coins for any packet that landed in an input port, even
        // on a deactivated system.
        let pending: Vec<PacketId> = state
            .level
            .system(system_id)
            .map(|s| {
                s.input_ports
                    .iter()
                    .filter_map(|p| p.packet)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        for packet_id in pending {
            let coin = state
                .packet_mut(packet_id)
                .filter(|p| p.coin_award_pending)
                .map(|p| {
                    p.coin_award_pending = false;
                    p.coin_value() as u64
                })
                .unwrap_or(0);
            state.add_coins(coin);
        }

        let active = state
            .level
            .system(system_id)
            .map(|s| s.active)
            .unwrap_or(false);
        if !active {
            continue;
        }

        let port_count = state
            .level
            .system(system_id)
            .map(|s| s.input_ports.len())
            .unwrap_or(0);
        for index in 0..port_count {
            let port_ref = PortRef::input(system_id, index as u16);
            let Some(packet_id) = state.level.port_mut(port_ref).and_then(|p| p.release()) else {
                continue;
            };
            if state.packet(packet_id).map(|p| p.active) != Some(true) {
                continue;
            }
            process_packet(state, rng, metrics, system_id, packet_id);
        }
    }
}

/// Run one system's policy on one released packet.
pub(crate) fn process_packet(
    state: &mut GameState,
    rng: &mut ChaCha8Rng,
    metrics: &mut TickMetrics,
    system_id: SystemId,
    packet_id: PacketId,
) {
    let Some(kind) = state.level.system(system_id).map(|s| discriminant(&s.kind)) else {
        return;
    };
    match kind {
        Policy::Normal | Policy::AntiTrojan => {
            process_packet_base(state, rng, metrics, system_id, packet_id)
        }
        Policy::Reference => finalize_delivery(state, metrics, system_id, packet_id),
        Policy::Spy => process_spy(state, rng, metrics, system_id, packet_id),
        Policy::Saboteur => process_saboteur(state, rng, metrics, system_id, packet_id),
        Policy::Vpn => {
            let movement = random_messenger(rng);
            if let Some(packet) = state.packet_mut(packet_id) {
                packet.convert_to_protected(movement);
            }
            process_packet_base(state, rng, metrics, system_id, packet_id)
        }
        Policy::Distributor => process_distributor(state, rng, metrics, system_id, packet_id),
        Policy::Merger => process_merger(state, rng, metrics, system_id, packet_id),
    }
}

/// Policy selector decoupled from the variant payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Policy {
    Normal,
    Reference,
    Spy,
    Saboteur,
    Vpn,
    AntiTrojan,
    Distributor,
    Merger,
}

fn discriminant(kind: &SystemKind) -> Policy {
    match kind {
        SystemKind::Normal => Policy::Normal,
        SystemKind::Reference { .. } => Policy::Reference,
        SystemKind::Spy => Policy::Spy,
        SystemKind::Saboteur => Policy::Saboteur,
        SystemKind::Vpn => Policy::Vpn,
        SystemKind::AntiTrojan { .. } => Policy::AntiTrojan,
        SystemKind::Distributor => Policy::Distributor,
        SystemKind::Merger { .. } => Policy::Merger,
    }
}

fn random_messenger(rng: &mut ChaCha8Rng) -> skein_core::MessengerKind {
    skein_core::MessengerKind::ALL[rng.gen_range(0..skein_core::MessengerKind::ALL.len())]
}

// ── Shared base policy ───────────────────────────────────────────

/// The shared processing routine: speed damage, bulk side effects,
/// confidential slowdown, then port-priority routing.
pub(crate) fn process_packet_base(
    state: &mut GameState,
    rng: &mut ChaCha8Rng,
    metrics: &mut TickMetrics,
    system_id: SystemId,
    packet_id: PacketId,
) {
    // 1. High-speed packets damage the system and are destroyed.
    if !state.level.tutorial {
        let speed = state
            .packet(packet_id)
            .map(|p| p.velocity.magnitude())
            .unwrap_or(0.0);
        if speed > state.settings.speed_damage_threshold {
            let duration = state.settings.speed_damage_deactivation_time;
            if let Some(system) = state.level.system_mut(system_id) {
                system.deactivate(duration);
            }
            if let Some(packet) = state.packet_mut(packet_id) {
                packet.active = false;
            }
            metrics.systems_damaged += 1;
            warn!(system = %system_id, speed, "system damaged by high-speed packet");
            return;
        }
    }

    // 2. Bulk arrivals wreck the neighbourhood.
    let is_bulk = state
        .packet(packet_id)
        .map(|p| p.packet_type().is_bulk())
        .unwrap_or(false);
    if is_bulk {
        bulk_side_effects(state, rng, system_id, packet_id);
    }

    // 3. Plain confidentials stagger into occupied systems.
    let occupied = state
        .level
        .system(system_id)
        .map(|s| s.total_packet_count() > 0)
        .unwrap_or(false);
    if let Some(packet) = state.packet_mut(packet_id) {
        packet.adjust_speed_for_occupancy(occupied);
    }

    // 4–5. Route to a port, else storage, else destroy.
    route_or_store(state, rng, system_id, packet_id);
}

/// Route to an output port by priority, falling back to storage and then
/// to destruction.
fn route_or_store(
    state: &mut GameState,
    rng: &mut ChaCha8Rng,
    system_id: SystemId,
    packet_id: PacketId,
) {
    let Some(packet_type) = state.packet(packet_id).map(|p| p.packet_type()) else {
        return;
    };
    if let Some(port_ref) = find_available_output_port(state, rng, system_id, packet_type) {
        place_on_output_port(state, port_ref, packet_id);
    } else {
        store_or_drop(state, system_id, packet_id);
    }
}

/// Priority port selection: empty + compatible first, then any empty;
/// both must lead through an active wire to a live destination. Ties
/// break randomly.
pub(crate) fn find_available_output_port(
    state: &GameState,
    rng: &mut ChaCha8Rng,
    system_id: SystemId,
    packet_type: PacketType,
) -> Option<PortRef> {
    let Some(system) = state.level.system(system_id) else {
        return None;
    };
    let mut compatible = Vec::new();
    let mut other = Vec::new();
    for (index, port) in system.output_ports.iter().enumerate() {
        if !port.is_empty() {
            continue;
        }
        let port_ref = PortRef::output(system_id, index as u16);
        let Some(wire_id) = state.level.wire_from_output(port_ref) else {
            continue;
        };
        let destination_live = state
            .level
            .wire(wire_id)
            .and_then(|w| state.level.system(w.destination.system))
            .map(|s| s.active && !s.failed)
            .unwrap_or(false);
        if !destination_live {
            continue;
        }
        if port.is_compatible_with(packet_type) {
            compatible.push(port_ref);
        } else {
            other.push(port_ref);
        }
    }
    let pool = if !compatible.is_empty() {
        compatible
    } else {
        other
    };
    if pool.is_empty() {
        None
    } else {
        Some(pool[rng.gen_range(0..pool.len())])
    }
}

/// Put a packet into an output port slot, flagging the incompatible-exit
/// boost for messenger-class packets.
pub(crate) fn place_on_output_port(state: &mut GameState, port_ref: PortRef, packet_id: PacketId) {
    let (compatible, position) = match state.level.port(port_ref) {
        Some(port) => (
            state
                .packet(packet_id)
                .map(|p| port.is_compatible_with(p.packet_type()))
                .unwrap_or(true),
            port.position,
        ),
        None => return,
    };
    if let Some(packet) = state.packet_mut(packet_id) {
        packet.position = position;
        if !compatible {
            let boosts = matches!(
                packet.kind,
                PacketKind::Messenger(_) | PacketKind::Protected { .. }
            );
            if boosts {
                packet.pending_exit_boost = true;
            }
        }
    }
    if let Some(port) = state.level.port_mut(port_ref) {
        port.packet = Some(packet_id);
    }
}

/// Store a packet if the system has space, otherwise destroy it.
pub(crate) fn store_or_drop(state: &mut GameState, system_id: SystemId, packet_id: PacketId) {
    let (has_space, position) = state
        .level
        .system(system_id)
        .map(|s| (s.has_storage_space(), s.position))
        .unwrap_or((false, skein_geometry::Point2D::default()));
    if has_space {
        if let Some(packet) = state.packet_mut(packet_id) {
            packet.position = position;
        }
        if let Some(system) = state.level.system_mut(system_id) {
            system.storage.push(packet_id);
        }
    } else {
        if let Some(packet) = state.packet_mut(packet_id) {
            packet.active = false;
            packet.lost = true;
        }
        debug!(packet = %packet_id, system = %system_id, "packet dropped: storage full");
    }
}

/// Bulk arrival: destroy every other stored packet and mutate one random
/// port's shape.
fn bulk_side_effects(
    state: &mut GameState,
    rng: &mut ChaCha8Rng,
    system_id: SystemId,
    packet_id: PacketId,
) {
    let stored: Vec<PacketId> = state
        .level
        .system(system_id)
        .map(|s| s.storage.clone())
        .unwrap_or_default();
    for stored_id in stored {
        if stored_id == packet_id {
            continue;
        }
        if let Some(packet) = state.packet_mut(stored_id) {
            if packet.active {
                packet.active = false;
                packet.lost = true;
            }
        }
    }

    // Mutate one port to a different random shape.
    let Some(system) = state.level.system(system_id) else {
        return;
    };
    let total_ports = system.input_ports.len() + system.output_ports.len();
    if total_ports == 0 {
        return;
    }
    let pick = rng.gen_range(0..total_ports);
    let current = {
        let system = state.level.system(system_id).expect("system checked above");
        if pick < system.input_ports.len() {
            system.input_ports[pick].shape
        } else {
            system.output_ports[pick - system.input_ports.len()].shape
        }
    };
    let mut replacement = PortShape::ALL[rng.gen_range(0..PortShape::ALL.len())];
    while replacement == current {
        replacement = PortShape::ALL[rng.gen_range(0..PortShape::ALL.len())];
    }
    if let Some(system) = state.level.system_mut(system_id) {
        let inputs = system.input_ports.len();
        let port = if pick < inputs {
            &mut system.input_ports[pick]
        } else {
            &mut system.output_ports[pick - inputs]
        };
        port.shape = replacement;
        debug!(system = %system_id, shape = %replacement, "bulk arrival mutated a port shape");
    }
}

// ── Spy ──────────────────────────────────────────────────────────

fn process_spy(
    state: &mut GameState,
    rng: &mut ChaCha8Rng,
    metrics: &mut TickMetrics,
    system_id: SystemId,
    packet_id: PacketId,
) {
    let packet_type = match state.packet(packet_id) {
        Some(p) => p.packet_type(),
        None => return,
    };

    // The base confidential variant dies here.
    if packet_type == PacketType::Confidential {
        if let Some(packet) = state.packet_mut(packet_id) {
            packet.active = false;
            packet.lost = true;
        }
        info!(packet = %packet_id, system = %system_id, "spy destroyed confidential packet");
        return;
    }

    // Protection is stripped, then the packet moves on normally.
    if packet_type.is_protected() {
        if let Some(packet) = state.packet_mut(packet_id) {
            packet.revert_from_protected();
        }
        process_packet_base(state, rng, metrics, system_id, packet_id);
        return;
    }

    // Everything else may exit from any spy system, this one included.
    let spies: Vec<SystemId> = state
        .level
        .systems()
        .filter(|s| matches!(s.kind, SystemKind::Spy))
        .map(|s| s.id)
        .collect();
    if spies.is_empty() {
        process_packet_base(state, rng, metrics, system_id, packet_id);
        return;
    }
    let target = spies[rng.gen_range(0..spies.len())];
    if target == system_id {
        process_packet_base(state, rng, metrics, system_id, packet_id);
        return;
    }
    teleport_to_spy(state, rng, metrics, target, packet_id);
}

/// Drop a packet at another spy system's exit: empty compatible port,
/// any empty port, storage, or loss. Teleports bypass input ports, so no
/// coin is awarded at the target.
fn teleport_to_spy(
    state: &mut GameState,
    rng: &mut ChaCha8Rng,
    metrics: &mut TickMetrics,
    target: SystemId,
    packet_id: PacketId,
) {
    metrics.teleports += 1;
    if let (Some(packet), Some(position)) = (
        state.packets.get_mut(&packet_id),
        state.level.system(target).map(|s| s.position),
    ) {
        packet.position = position;
        packet.coin_award_pending = false;
    }
    let Some(packet_type) = state.packet(packet_id).map(|p| p.packet_type()) else {
        return;
    };
    if let Some(port_ref) = find_available_output_port(state, rng, target, packet_type) {
        place_on_output_port(state, port_ref, packet_id);
    } else {
        store_or_drop(state, target, packet_id);
    }
    debug!(packet = %packet_id, target = %target, "spy teleported packet");
}

// ── Saboteur ─────────────────────────────────────────────────────

fn process_saboteur(
    state: &mut GameState,
    rng: &mut ChaCha8Rng,
    metrics: &mut TickMetrics,
    system_id: SystemId,
    packet_id: PacketId,
) {
    if let Some(packet) = state.packet_mut(packet_id) {
        // Protection comes off first and shields against conversion.
        packet.revert_from_protected();
        if packet.noise_level == 0.0 {
            packet.noise_level = 1.0;
        }
    }
    if rng.gen_bool(TROJAN_CONVERSION_PROBABILITY) {
        if let Some(packet) = state.packet_mut(packet_id) {
            packet.convert_to_trojan();
        }
        metrics.trojan_conversions += 1;
        info!(packet = %packet_id, system = %system_id, "saboteur converted packet to trojan");
    }

    // Route to an incompatible port by preference.
    let Some(packet_type) = state.packet(packet_id).map(|p| p.packet_type()) else {
        return;
    };
    let incompatible: Vec<PortRef> = state
        .level
        .system(system_id)
        .map(|s| {
            s.output_ports
                .iter()
                .enumerate()
                .filter(|(_, p)| p.is_empty() && !p.is_compatible_with(packet_type))
                .map(|(i, _)| PortRef::output(system_id, i as u16))
                .collect()
        })
        .unwrap_or_default();
    if !incompatible.is_empty() {
        let port_ref = incompatible[rng.gen_range(0..incompatible.len())];
        place_on_output_port(state, port_ref, packet_id);
    } else {
        store_or_drop(state, system_id, packet_id);
    }
}

// ── Distributor ──────────────────────────────────────────────────

fn process_distributor(
    state: &mut GameState,
    rng: &mut ChaCha8Rng,
    metrics: &mut TickMetrics,
    system_id: SystemId,
    packet_id: PacketId,
) {
    let is_bulk = state
        .packet(packet_id)
        .map(|p| p.packet_type().is_bulk())
        .unwrap_or(false);
    if !is_bulk {
        process_packet_base(state, rng, metrics, system_id, packet_id);
        return;
    }

    bulk_side_effects(state, rng, system_id, packet_id);

    let (size, velocity, position) = match state.packet(packet_id) {
        Some(p) => (p.size, p.velocity, p.position),
        None => return,
    };
    let group = state.alloc_bulk_group();
    let color: u32 = rng.gen_range(0..0xFF_FFFF);

    if let Some(packet) = state.packet_mut(packet_id) {
        packet.active = false;
        packet.consumed = true;
    }

    // One bit per unit of size, all stored; the storage flush drains
    // them to outputs on later ticks.
    for _ in 0..size {
        let bit_id = state.alloc_packet_id();
        let bit = Packet::bit(bit_id, group, size, color, position, velocity);
        state.insert_packet(bit);
        if let Some(system) = state.level.system_mut(system_id) {
            system.storage.push(bit_id);
        }
    }
    metrics.bulk_splits += 1;
    info!(packet = %packet_id, system = %system_id, bits = size, "distributor split bulk packet");
}

// ── Merger ───────────────────────────────────────────────────────

fn process_merger(
    state: &mut GameState,
    rng: &mut ChaCha8Rng,
    metrics: &mut TickMetrics,
    system_id: SystemId,
    packet_id: PacketId,
) {
    let bit_info = match state.packet(packet_id).map(|p| p.kind.clone()) {
        Some(PacketKind::Bit {
            group, group_size, ..
        }) => Some((group, group_size)),
        _ => None,
    };
    let Some((group, group_size)) = bit_info else {
        process_packet_base(state, rng, metrics, system_id, packet_id);
        return;
    };

    let position = state
        .level
        .system(system_id)
        .map(|s| s.position)
        .unwrap_or_default();
    if let Some(packet) = state.packet_mut(packet_id) {
        packet.position = position;
    }
    if let Some(SystemKind::Merger { pending }) =
        state.level.system_mut(system_id).map(|s| &mut s.kind)
    {
        pending.push(packet_id);
    }

    // Collect the group's live members from the pool.
    let members: Vec<PacketId> = match state.level.system(system_id).map(|s| &s.kind) {
        Some(SystemKind::Merger { pending }) => pending
            .iter()
            .copied()
            .filter(|id| {
                state
                    .packet(*id)
                    .map(|p| {
                        p.active
                            && matches!(p.kind, PacketKind::Bit { group: g, .. } if g == group)
                    })
                    .unwrap_or(false)
            })
            .collect(),
        _ => Vec::new(),
    };
    if group_size == 0 || (members.len() as u32) < group_size {
        return;
    }

    // Reassemble: small bulk under ten bits, large from ten up.
    let bulk_type = if members.len() < 10 {
        PacketType::BulkSmall
    } else {
        PacketType::BulkLarge
    };
    let velocity = members
        .first()
        .and_then(|id| state.packet(*id))
        .map(|p| p.velocity)
        .unwrap_or(Vec2D::ZERO);
    for member in &members {
        if let Some(packet) = state.packet_mut(*member) {
            packet.active = false;
            packet.consumed = true;
        }
    }
    if let Some(SystemKind::Merger { pending }) =
        state.level.system_mut(system_id).map(|s| &mut s.kind)
    {
        pending.retain(|id| !members.contains(id));
    }

    let bulk_id = state.alloc_packet_id();
    let mut bulk = Packet::new(bulk_id, bulk_type, position);
    bulk.velocity = velocity;
    state.insert_packet(bulk);
    route_or_store(state, rng, system_id, bulk_id);
    metrics.bulk_merges += 1;
    info!(system = %system_id, bits = members.len(), kind = %bulk_type, "merger reassembled bulk packet");
}

// ── Tick-level system passes ─────────────────────────────────────

/// Convert trojans within each anti-trojan system's influence radius.
pub(crate) fn anti_trojan_scan(state: &mut GameState, metrics: &mut TickMetrics) {
    let scanners: Vec<(SystemId, skein_geometry::Point2D, f64)> = state
        .level
        .systems()
        .filter(|s| s.active && !s.failed)
        .filter_map(|s| match s.kind {
            SystemKind::AntiTrojan { scan_radius } => Some((s.id, s.position, scan_radius)),
            _ => None,
        })
        .collect();
    if scanners.is_empty() {
        return;
    }
    let targets: Vec<PacketId> = state
        .packets
        .values()
        .filter(|p| p.active && matches!(p.kind, PacketKind::Trojan))
        .filter(|p| {
            scanners
                .iter()
                .any(|(_, pos, radius)| p.position.distance_to(*pos) <= *radius)
        })
        .map(|p| p.id)
        .collect();
    for id in targets {
        if let Some(packet) = state.packet_mut(id) {
            packet.convert_from_trojan();
        }
        metrics.trojans_cleansed += 1;
        info!(packet = %id, "anti-trojan scan converted trojan");
    }
}

/// Move at most one stored packet per system to an output port, pushing
/// it straight onto its wire when possible.
pub(crate) fn storage_flush(state: &mut GameState, rng: &mut ChaCha8Rng, metrics: &mut TickMetrics) {
    let system_ids = state.level.system_ids();
    for system_id in system_ids {
        let active = state
            .level
            .system(system_id)
            .map(|s| s.active)
            .unwrap_or(false);
        if !active {
            continue;
        }
        let stored: Vec<PacketId> = state
            .level
            .system(system_id)
            .map(|s| s.storage.clone())
            .unwrap_or_default();
        for packet_id in stored {
            if state.packet(packet_id).map(|p| p.active) != Some(true) {
                continue;
            }
            let Some(packet_type) = state.packet(packet_id).map(|p| p.packet_type()) else {
                continue;
            };
            let Some(port_ref) = flushable_output_port(state, system_id, packet_type) else {
                continue;
            };
            if let Some(system) = state.level.system_mut(system_id) {
                system.storage.retain(|id| *id != packet_id);
            }
            place_on_output_port(state, port_ref, packet_id);
            if let Some(wire_id) = state.level.wire_from_output(port_ref) {
                if state
                    .level
                    .wire(wire_id)
                    .map(|w| w.can_accept_packet())
                    .unwrap_or(false)
                {
                    if let Some(port) = state.level.port_mut(port_ref) {
                        port.packet = None;
                    }
                    load_packet_on_wire(state, rng, metrics, wire_id, packet_id);
                }
            }
            break; // One packet per system per tick.
        }
    }
}

/// An empty output port with a wire that can take the packet now,
/// compatible ports first. Deterministic order: flushes do not tie-break
/// randomly.
fn flushable_output_port(
    state: &GameState,
    system_id: SystemId,
    packet_type: PacketType,
) -> Option<PortRef> {
    let system = state.level.system(system_id)?;
    let candidate = |compatible_only: bool| {
        system
            .output_ports
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_empty())
            .filter(|(_, p)| !compatible_only || p.is_compatible_with(packet_type))
            .map(|(i, _)| PortRef::output(system_id, i as u16))
            .find(|port_ref| {
                state
                    .level
                    .wire_from_output(*port_ref)
                    .and_then(|w| state.level.wire(w))
                    .map(|w| {
                        w.can_accept_packet()
                            && state
                                .level
                                .system(w.destination.system)
                                .map(|s| !s.failed)
                                .unwrap_or(false)
                    })
                    .unwrap_or(false)
            })
    };
    candidate(true).or_else(|| candidate(false))
}

// ── Failure ──────────────────────────────────────────────────────

/// Permanently fail a system: revert a VPN's protected packets, send
/// en-route packets back to their sources, and clear the input ports.
pub(crate) fn fail_system(state: &mut GameState, system_id: SystemId) {
    let is_vpn = matches!(
        state.level.system(system_id).map(|s| &s.kind),
        Some(SystemKind::Vpn)
    );
    {
        let Some(system) = state.level.system_mut(system_id) else {
            return;
        };
        system.failed = true;
        system.active = false;
        system.deactivation_timer = 0.0;
    }
    info!(system = %system_id, "system failed permanently");

    if is_vpn {
        revert_protected_in_system(state, system_id);
    }

    // Packets on wires heading here turn around.
    let inbound: Vec<PacketId> = state
        .level
        .wires()
        .filter(|w| w.destination.system == system_id)
        .filter_map(|w| w.packet)
        .collect();
    for packet_id in inbound {
        if let Some(packet) = state.packet_mut(packet_id) {
            if packet.active && !packet.reversing {
                packet.return_to_source();
                debug!(packet = %packet_id, "packet returning to source after system failure");
            }
        }
    }

    // Packets already in the input ports are sent back along their
    // feeding wires; with nowhere to go they are lost.
    let port_count = state
        .level
        .system(system_id)
        .map(|s| s.input_ports.len())
        .unwrap_or(0);
    for index in 0..port_count {
        let port_ref = PortRef::input(system_id, index as u16);
        let Some(packet_id) = state.level.port_mut(port_ref).and_then(|p| p.release()) else {
            continue;
        };
        let wire = state.level.wire_into_input(port_ref).filter(|w| {
            state
                .level
                .wire(*w)
                .map(|w| w.packet.is_none())
                .unwrap_or(false)
        });
        match wire {
            Some(wire_id) => {
                if let Some(wire) = state.level.wire_mut(wire_id) {
                    wire.packet = Some(packet_id);
                }
                if let Some(packet) = state.packet_mut(packet_id) {
                    packet.current_wire = Some(wire_id);
                    packet.path_progress = 1.0;
                    packet.reversing = true;
                    packet.travel_time = 0.0;
                    std::mem::swap(&mut packet.source_position, &mut packet.destination_position);
                }
            }
            None => {
                if let Some(packet) = state.packet_mut(packet_id) {
                    packet.active = false;
                    packet.lost = true;
                }
            }
        }
    }
}

/// Strip protection from every packet held in a system's storage and
/// ports (VPN failure).
pub(crate) fn revert_protected_in_system(state: &mut GameState, system_id: SystemId) {
    let mut held: Vec<PacketId> = Vec::new();
    if let Some(system) = state.level.system(system_id) {
        held.extend(system.storage.iter().copied());
        held.extend(
            system
                .input_ports
                .iter()
                .chain(&system.output_ports)
                .filter_map(|p| p.packet),
        );
    }
    for packet_id in held {
        if let Some(packet) = state.packet_mut(packet_id) {
            packet.revert_from_protected();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use skein_core::{PortDirection, Settings, SystemId};
    use skein_geometry::Point2D;
    use skein_model::{GameLevel, Port, MAX_STORAGE};

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(11)
    }

    /// A system with one square input, `shapes` output ports wired to a
    /// live reference sink each.
    fn system_with_outputs(kind: SystemKind, shapes: &[PortShape]) -> (GameState, SystemId) {
        let mut level = GameLevel::new("t", "t", "", 10_000.0, 60.0);
        let sys = level.add_system("sys", kind, Point2D::new(0.0, 0.0));
        level.system_mut(sys).unwrap().input_ports.push(Port::new(
            PortShape::Square,
            PortDirection::Input,
            Point2D::new(0.0, 0.0),
            skein_geometry::Vec2D::new(-20.0, 0.0),
        ));
        for (i, shape) in shapes.iter().enumerate() {
            level.system_mut(sys).unwrap().output_ports.push(Port::new(
                *shape,
                PortDirection::Output,
                Point2D::new(0.0, 0.0),
                skein_geometry::Vec2D::new(20.0, i as f64 * 10.0),
            ));
            let sink = level.add_system(
                format!("sink{i}"),
                SystemKind::reference(),
                Point2D::new(200.0, i as f64 * 100.0),
            );
            level.system_mut(sink).unwrap().input_ports.push(Port::new(
                *shape,
                PortDirection::Input,
                Point2D::new(200.0, i as f64 * 100.0),
                skein_geometry::Vec2D::new(-20.0, 0.0),
            ));
            level.add_wire(
                PortRef::output(sys, i as u16),
                PortRef::input(sink, 0),
                100.0,
            );
        }
        (GameState::new(level, Settings::default()), sys)
    }

    fn spawn(state: &mut GameState, ty: PacketType) -> PacketId {
        let id = state.alloc_packet_id();
        state.insert_packet(Packet::new(id, ty, Point2D::new(0.0, 0.0)));
        id
    }

    // ── Base routing ─────────────────────────────────────────────

    #[test]
    fn base_prefers_compatible_port() {
        let (mut state, sys) =
            system_with_outputs(SystemKind::Normal, &[PortShape::Triangle, PortShape::Square]);
        let id = spawn(&mut state, PacketType::SquareMessenger);
        process_packet_base(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        let square_port = state.level.port(PortRef::output(sys, 1)).unwrap();
        assert_eq!(square_port.packet, Some(id));
        assert!(!state.packet(id).unwrap().pending_exit_boost);
    }

    #[test]
    fn base_falls_back_to_incompatible_with_boost() {
        let (mut state, sys) = system_with_outputs(SystemKind::Normal, &[PortShape::Triangle]);
        let id = spawn(&mut state, PacketType::SquareMessenger);
        process_packet_base(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        let port = state.level.port(PortRef::output(sys, 0)).unwrap();
        assert_eq!(port.packet, Some(id));
        assert!(state.packet(id).unwrap().pending_exit_boost);
    }

    #[test]
    fn base_stores_when_no_port_available() {
        let (mut state, sys) = system_with_outputs(SystemKind::Normal, &[]);
        let id = spawn(&mut state, PacketType::SquareMessenger);
        process_packet_base(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        assert!(state.level.system(sys).unwrap().storage.contains(&id));
    }

    #[test]
    fn base_drops_when_storage_full() {
        let (mut state, sys) = system_with_outputs(SystemKind::Normal, &[]);
        for _ in 0..MAX_STORAGE {
            let filler = spawn(&mut state, PacketType::SmallMessenger);
            state.level.system_mut(sys).unwrap().storage.push(filler);
        }
        let id = spawn(&mut state, PacketType::SquareMessenger);
        process_packet_base(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        let p = state.packet(id).unwrap();
        assert!(!p.active);
        assert!(p.lost);
    }

    #[test]
    fn speed_damage_deactivates_and_destroys() {
        let (mut state, sys) = system_with_outputs(SystemKind::Normal, &[PortShape::Square]);
        let id = spawn(&mut state, PacketType::SquareMessenger);
        state.packet_mut(id).unwrap().velocity = skein_geometry::Vec2D::new(200.0, 0.0);
        let mut m = TickMetrics::default();
        process_packet_base(&mut state, &mut rng(), &mut m, sys, id);
        let system = state.level.system(sys).unwrap();
        assert!(!system.active);
        assert_eq!(system.deactivation_timer, 10.0);
        assert!(!state.packet(id).unwrap().active);
        assert_eq!(m.systems_damaged, 1);
    }

    #[test]
    fn tutorial_levels_skip_speed_damage() {
        let (mut state, sys) = system_with_outputs(SystemKind::Normal, &[PortShape::Square]);
        state.level.tutorial = true;
        let id = spawn(&mut state, PacketType::SquareMessenger);
        state.packet_mut(id).unwrap().velocity = skein_geometry::Vec2D::new(200.0, 0.0);
        process_packet_base(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        assert!(state.level.system(sys).unwrap().active);
        assert!(state.packet(id).unwrap().active);
    }

    #[test]
    fn bulk_arrival_destroys_stored_and_mutates_a_port() {
        let (mut state, sys) = system_with_outputs(SystemKind::Normal, &[PortShape::Square]);
        let stored = spawn(&mut state, PacketType::SmallMessenger);
        state.level.system_mut(sys).unwrap().storage.push(stored);
        let shapes_before: Vec<PortShape> = {
            let s = state.level.system(sys).unwrap();
            s.input_ports
                .iter()
                .chain(&s.output_ports)
                .map(|p| p.shape)
                .collect()
        };
        let id = spawn(&mut state, PacketType::BulkSmall);
        process_packet_base(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        assert!(!state.packet(stored).unwrap().active);
        assert!(state.packet(stored).unwrap().lost);
        let shapes_after: Vec<PortShape> = {
            let s = state.level.system(sys).unwrap();
            s.input_ports
                .iter()
                .chain(&s.output_ports)
                .map(|p| p.shape)
                .collect()
        };
        assert_ne!(shapes_before, shapes_after);
        assert_eq!(
            shapes_before
                .iter()
                .zip(&shapes_after)
                .filter(|(a, b)| a != b)
                .count(),
            1
        );
    }

    // ── Reference ────────────────────────────────────────────────

    #[test]
    fn reference_finalizes_instead_of_forwarding() {
        let (mut state, sys) = system_with_outputs(SystemKind::reference(), &[PortShape::Square]);
        let id = spawn(&mut state, PacketType::TriangleMessenger);
        state.packet_mut(id).unwrap().coin_award_pending = true;
        process_packet(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        let p = state.packet(id).unwrap();
        assert!(!p.active);
        assert!(p.delivered);
        assert_eq!(state.coins, 3);
        assert_eq!(state.delivered_count(), 1);
        // Nothing was forwarded.
        assert!(state
            .level
            .port(PortRef::output(sys, 0))
            .unwrap()
            .is_empty());
    }

    // ── Spy ──────────────────────────────────────────────────────

    #[test]
    fn spy_destroys_plain_confidential() {
        let (mut state, sys) = system_with_outputs(SystemKind::Spy, &[PortShape::Square]);
        let id = spawn(&mut state, PacketType::Confidential);
        process_packet(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        let p = state.packet(id).unwrap();
        assert!(!p.active);
        assert!(p.lost);
    }

    #[test]
    fn spy_strips_protection_and_forwards() {
        let (mut state, sys) = system_with_outputs(SystemKind::Spy, &[PortShape::Triangle]);
        let id = spawn(&mut state, PacketType::TriangleMessenger);
        state
            .packet_mut(id)
            .unwrap()
            .convert_to_protected(skein_core::MessengerKind::Small);
        process_packet(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        let p = state.packet(id).unwrap();
        assert_eq!(p.packet_type(), PacketType::TriangleMessenger);
        assert!(p.active);
        // Routed out the lone (compatible) port.
        assert_eq!(
            state.level.port(PortRef::output(sys, 0)).unwrap().packet,
            Some(id)
        );
    }

    #[test]
    fn spy_does_not_destroy_protected_confidential() {
        let (mut state, sys) = system_with_outputs(SystemKind::Spy, &[PortShape::Square]);
        let id = spawn(&mut state, PacketType::ConfidentialProtected);
        process_packet(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        let p = state.packet(id).unwrap();
        assert!(p.active);
        assert_eq!(p.packet_type(), PacketType::Confidential);
    }

    #[test]
    fn lone_spy_processes_normally() {
        let (mut state, sys) = system_with_outputs(SystemKind::Spy, &[PortShape::Square]);
        let id = spawn(&mut state, PacketType::SquareMessenger);
        process_packet(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        // Only one spy exists; the packet routes out of this one.
        assert_eq!(
            state.level.port(PortRef::output(sys, 0)).unwrap().packet,
            Some(id)
        );
    }

    // ── Saboteur ─────────────────────────────────────────────────

    #[test]
    fn saboteur_adds_noise_and_routes_incompatibly() {
        let (mut state, sys) =
            system_with_outputs(SystemKind::Saboteur, &[PortShape::Square, PortShape::Hexagon]);
        let id = spawn(&mut state, PacketType::SquareMessenger);
        process_packet(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        let p = state.packet(id).unwrap();
        assert!(p.noise_level >= 1.0);
        // Never the compatible square port: either it went to the
        // hexagon port or (if converted to trojan, compatible anywhere)
        // into storage.
        assert_ne!(
            state.level.port(PortRef::output(sys, 0)).unwrap().packet,
            Some(id)
        );
    }

    #[test]
    fn saboteur_leaves_protected_unconverted() {
        // Protection is stripped first; the revealed messenger is then
        // fair game for noise but was never a trojan candidate while
        // wrapped. Run many seeds: the revealed packet must never still
        // be protected.
        for seed in 0..20 {
            let (mut state, sys) = system_with_outputs(SystemKind::Saboteur, &[]);
            let id = spawn(&mut state, PacketType::SquareMessenger);
            state
                .packet_mut(id)
                .unwrap()
                .convert_to_protected(skein_core::MessengerKind::Square);
            let mut r = ChaCha8Rng::seed_from_u64(seed);
            process_packet(&mut state, &mut r, &mut TickMetrics::default(), sys, id);
            assert!(!state.packet(id).unwrap().packet_type().is_protected());
        }
    }

    // ── VPN ──────────────────────────────────────────────────────

    #[test]
    fn vpn_wraps_messengers() {
        let (mut state, sys) = system_with_outputs(SystemKind::Vpn, &[PortShape::Square]);
        let id = spawn(&mut state, PacketType::SmallMessenger);
        process_packet(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        let p = state.packet(id).unwrap();
        assert_eq!(p.packet_type(), PacketType::Protected);
        assert_eq!(p.size, 2); // twice the small messenger's size 1
    }

    #[test]
    fn vpn_upgrades_confidentials() {
        let (mut state, sys) = system_with_outputs(SystemKind::Vpn, &[PortShape::Square]);
        let id = spawn(&mut state, PacketType::Confidential);
        process_packet(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        assert_eq!(
            state.packet(id).unwrap().packet_type(),
            PacketType::ConfidentialProtected
        );
    }

    #[test]
    fn vpn_failure_reverts_held_packets() {
        let (mut state, sys) = system_with_outputs(SystemKind::Vpn, &[PortShape::Square]);
        let stored = spawn(&mut state, PacketType::SmallMessenger);
        state
            .packet_mut(stored)
            .unwrap()
            .convert_to_protected(skein_core::MessengerKind::Triangle);
        state.level.system_mut(sys).unwrap().storage.push(stored);
        fail_system(&mut state, sys);
        assert_eq!(
            state.packet(stored).unwrap().packet_type(),
            PacketType::SmallMessenger
        );
        assert!(state.level.system(sys).unwrap().failed);
    }

    // ── Distributor & Merger ─────────────────────────────────────

    #[test]
    fn distributor_splits_bulk_into_bits() {
        let (mut state, sys) = system_with_outputs(SystemKind::Distributor, &[PortShape::Square]);
        let id = spawn(&mut state, PacketType::BulkSmall);
        let mut m = TickMetrics::default();
        process_packet(&mut state, &mut rng(), &mut m, sys, id);
        let original = state.packet(id).unwrap();
        assert!(!original.active);
        assert!(original.consumed);
        let storage = &state.level.system(sys).unwrap().storage;
        assert_eq!(storage.len(), 8);
        let first_bit = state.packet(storage[0]).unwrap();
        match first_bit.kind {
            PacketKind::Bit { group_size, .. } => assert_eq!(group_size, 8),
            _ => panic!("expected bit packet"),
        }
        assert_eq!(m.bulk_splits, 1);
    }

    #[test]
    fn distributor_forwards_non_bulk_normally() {
        let (mut state, sys) = system_with_outputs(SystemKind::Distributor, &[PortShape::Square]);
        let id = spawn(&mut state, PacketType::SquareMessenger);
        process_packet(&mut state, &mut rng(), &mut TickMetrics::default(), sys, id);
        assert_eq!(
            state.level.port(PortRef::output(sys, 0)).unwrap().packet,
            Some(id)
        );
    }

    #[test]
    fn merger_reassembles_once_group_is_complete() {
        let (mut state, sys) = system_with_outputs(SystemKind::merger(), &[PortShape::Square]);
        let group = state.alloc_bulk_group();
        let mut m = TickMetrics::default();
        let mut bit_ids = Vec::new();
        for _ in 0..8 {
            let bit_id = state.alloc_packet_id();
            let bit = Packet::bit(
                bit_id,
                group,
                8,
                7,
                Point2D::new(0.0, 0.0),
                skein_geometry::Vec2D::new(50.0, 0.0),
            );
            state.insert_packet(bit);
            bit_ids.push(bit_id);
        }
        for (i, bit_id) in bit_ids.iter().enumerate() {
            process_packet(&mut state, &mut rng(), &mut m, sys, *bit_id);
            if i < 7 {
                assert_eq!(m.bulk_merges, 0, "must wait for the full group");
            }
        }
        assert_eq!(m.bulk_merges, 1);
        // All bits consumed.
        for bit_id in &bit_ids {
            let bit = state.packet(*bit_id).unwrap();
            assert!(!bit.active);
            assert!(bit.consumed);
        }
        // A small bulk (8 bits < 10) now sits on the output port.
        let out = state.level.port(PortRef::output(sys, 0)).unwrap();
        let bulk = state.packet(out.packet.unwrap()).unwrap();
        assert_eq!(bulk.packet_type(), PacketType::BulkSmall);
        assert_eq!(bulk.velocity, skein_geometry::Vec2D::new(50.0, 0.0));
    }

    // ── Failure ──────────────────────────────────────────────────

    #[test]
    fn failing_destination_turns_wire_packets_around() {
        let (mut state, sys) = system_with_outputs(SystemKind::Normal, &[PortShape::Square]);
        // Find the wire into the sink and put a packet on it.
        let wire_id = state.level.active_wire_ids()[0];
        let sink = state.level.wire(wire_id).unwrap().destination.system;
        let id = spawn(&mut state, PacketType::SquareMessenger);
        let mut m = TickMetrics::default();
        crate::transfer::load_packet_on_wire(&mut state, &mut rng(), &mut m, wire_id, id);
        state.packet_mut(id).unwrap().path_progress = 0.4;
        fail_system(&mut state, sink);
        let p = state.packet(id).unwrap();
        assert!(p.reversing);
        assert!((p.path_progress - 0.4).abs() < 1e-12);
    }

    // ── Anti-trojan scan ─────────────────────────────────────────

    #[test]
    fn scan_converts_trojans_in_radius_only() {
        let (mut state, _) = system_with_outputs(SystemKind::anti_trojan(), &[]);
        let near = spawn(&mut state, PacketType::Trojan);
        state.packet_mut(near).unwrap().position = Point2D::new(100.0, 0.0);
        let far = spawn(&mut state, PacketType::Trojan);
        state.packet_mut(far).unwrap().position = Point2D::new(500.0, 0.0);
        let mut m = TickMetrics::default();
        anti_trojan_scan(&mut state, &mut m);
        assert_eq!(
            state.packet(near).unwrap().packet_type(),
            PacketType::SquareMessenger
        );
        assert_eq!(state.packet(far).unwrap().packet_type(), PacketType::Trojan);
        assert_eq!(m.trojans_cleansed, 1);
    }

    // ── Storage flush ────────────────────────────────────────────

    #[test]
    fn flush_moves_one_stored_packet_to_wire() {
        let (mut state, sys) = system_with_outputs(SystemKind::Normal, &[PortShape::Square]);
        let a = spawn(&mut state, PacketType::SquareMessenger);
        let b = spawn(&mut state, PacketType::SquareMessenger);
        let system = state.level.system_mut(sys).unwrap();
        system.storage.push(a);
        system.storage.push(b);
        let mut m = TickMetrics::default();
        storage_flush(&mut state, &mut rng(), &mut m);
        // One flushed straight onto the wire, one still stored.
        let wire_id = state.level.wire_from_output(PortRef::output(sys, 0));
        assert!(wire_id.is_some());
        assert_eq!(
            state.level.wire(wire_id.unwrap()).unwrap().packet,
            Some(a)
        );
        assert_eq!(state.level.system(sys).unwrap().storage, vec![b]);
    }
}
