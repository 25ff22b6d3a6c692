//! Wire↔port packet transfer.
//!
//! One pass moves packets in both directions per wire: a packet waiting
//! on the source port is loaded onto an empty wire, and a packet that
//! has reached the far end is handed into the destination port. The
//! pass runs twice per tick so an arrival can be forwarded in the same
//! tick it lands.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use skein_core::{MessengerKind, PacketId, SystemId, WireId};
use skein_model::{PacketKind, SystemKind};
use tracing::{debug, info};

use crate::metrics::TickMetrics;
use crate::movement::entry_speed;
use crate::state::GameState;

/// Distance to the destination port under which a packet counts as
/// arrived, in pixels.
pub const ARRIVAL_THRESHOLD: f64 = 5.0;

/// Load a packet onto a wire.
///
/// Initializes progress, position, and velocity from the wire path,
/// applies the entry-speed rules (including a pending incompatible-exit
/// boost), and records bulk passages. Returns `false` if the wire cannot
/// accept.
pub(crate) fn load_packet_on_wire(
    state: &mut GameState,
    rng: &mut ChaCha8Rng,
    metrics: &mut TickMetrics,
    wire_id: WireId,
    packet_id: PacketId,
) -> bool {
    let smooth = state.settings.smooth_wire_curves;
    let Some(wire) = state.level.wire(wire_id) else {
        return false;
    };
    if !wire.can_accept_packet() {
        return false;
    }
    let source = wire.source;
    let Some(path) = state.level.wire_path(wire_id, smooth) else {
        return false;
    };

    let Some(packet_type) = state.packet(packet_id).map(|p| p.packet_type()) else {
        return false;
    };
    let compatible = state
        .level
        .port(source)
        .map(|p| p.is_compatible_with(packet_type))
        .unwrap_or(true);

    // Bulk entry counts against the wire; the third passage destroys it,
    // though the bulk itself completes this transit.
    if packet_type.is_bulk() {
        if let Some(wire) = state.level.wire_mut(wire_id) {
            if wire.record_bulk_passage() {
                metrics.wires_destroyed += 1;
                info!(wire = %wire_id, "wire destroyed by bulk passages");
            }
        }
    }

    if let Some(wire) = state.level.wire_mut(wire_id) {
        wire.packet = Some(packet_id);
    }

    let start = path.position_at(0.0);
    let end = path.position_at(1.0);
    let tangent = path.tangent_at(0.0);
    if let Some(packet) = state.packets.get_mut(&packet_id) {
        packet.enter_wire(wire_id, || {
            MessengerKind::ALL[rng.gen_range(0..MessengerKind::ALL.len())]
        });
        let mut speed = entry_speed(&packet.kind, compatible, packet.base_speed);
        if packet.pending_exit_boost {
            speed *= 2.0;
            packet.pending_exit_boost = false;
        }
        packet.base_speed = speed;
        packet.entry_compatible = compatible;
        packet.position = start;
        packet.velocity = tangent * speed;
        packet.source_position = start;
        packet.destination_position = end;
        debug!(packet = %packet_id, wire = %wire_id, speed, compatible, "packet loaded on wire");
    }
    true
}

/// One bidirectional transfer step over every wire.
pub(crate) fn transfer_pass(state: &mut GameState, rng: &mut ChaCha8Rng, metrics: &mut TickMetrics) {
    let wire_ids: Vec<WireId> = state.level.wires().map(|w| w.id).collect();
    for wire_id in wire_ids {
        load_from_source_port(state, rng, metrics, wire_id);
        deliver_to_destination(state, metrics, wire_id);
    }
}

/// Move a packet waiting on the wire's source port onto the wire.
fn load_from_source_port(
    state: &mut GameState,
    rng: &mut ChaCha8Rng,
    metrics: &mut TickMetrics,
    wire_id: WireId,
) {
    let Some(wire) = state.level.wire(wire_id) else {
        return;
    };
    if !wire.can_accept_packet() {
        return;
    }
    let source = wire.source;
    // Don't feed a wire whose destination has failed; the packet waits
    // on the port instead.
    let dest_healthy = state
        .level
        .system(wire.destination.system)
        .map(|s| !s.failed)
        .unwrap_or(false);
    if !dest_healthy {
        return;
    }
    let Some(packet_id) = state.level.port(source).and_then(|p| p.packet) else {
        return;
    };
    if !state.packet(packet_id).map(|p| p.active).unwrap_or(false) {
        return;
    }
    if let Some(port) = state.level.port_mut(source) {
        port.packet = None;
    }
    load_packet_on_wire(state, rng, metrics, wire_id, packet_id);
}

/// Hand an arrived packet into the destination port, or back into the
/// source port when it is returning.
fn deliver_to_destination(state: &mut GameState, metrics: &mut TickMetrics, wire_id: WireId) {
    let Some(wire) = state.level.wire(wire_id) else {
        return;
    };
    let Some(packet_id) = wire.packet else {
        return;
    };
    let destination = wire.destination;
    let source = wire.source;

    let Some(packet) = state.packet(packet_id) else {
        return;
    };
    if !packet.active {
        return;
    }

    if packet.reversing {
        // A returning packet ends its journey back at the source port.
        let Some(port_pos) = state.level.port(source).map(|p| p.position) else {
            return;
        };
        if packet.position.distance_to(port_pos) > ARRIVAL_THRESHOLD {
            return;
        }
        if state.level.port(source).map(|p| p.is_empty()) != Some(true) {
            return;
        }
        if let Some(wire) = state.level.wire_mut(wire_id) {
            wire.packet = None;
        }
        if let Some(packet) = state.packets.get_mut(&packet_id) {
            packet.leave_wire();
            packet.reversing = false;
            packet.position = port_pos;
        }
        if let Some(port) = state.level.port_mut(source) {
            port.packet = Some(packet_id);
        }
        debug!(packet = %packet_id, wire = %wire_id, "returned packet parked at source port");
        return;
    }

    let Some(port_pos) = state.level.port(destination).map(|p| p.position) else {
        return;
    };
    if packet.position.distance_to(port_pos) > ARRIVAL_THRESHOLD {
        return;
    }
    if state.level.port(destination).map(|p| p.is_empty()) != Some(true) {
        return;
    }

    if let Some(wire) = state.level.wire_mut(wire_id) {
        wire.packet = None;
    }
    if let Some(packet) = state.packets.get_mut(&packet_id) {
        packet.leave_wire();
        packet.position = port_pos;
        packet.coin_award_pending = true;
    }
    if let Some(port) = state.level.port_mut(destination) {
        port.packet = Some(packet_id);
    }
    debug!(packet = %packet_id, wire = %wire_id, "packet transferred to input port");

    // A reference destination finalizes delivery on the spot.
    if state
        .level
        .system(destination.system)
        .map(|s| s.kind.is_reference())
        .unwrap_or(false)
    {
        finalize_delivery(state, metrics, destination.system, packet_id);
        if let Some(port) = state.level.port_mut(destination) {
            port.packet = None;
        }
    }
}

/// Finalize a delivery at a reference system, exactly once per packet.
pub(crate) fn finalize_delivery(
    state: &mut GameState,
    metrics: &mut TickMetrics,
    system: SystemId,
    packet_id: PacketId,
) {
    let coin = {
        let Some(packet) = state.packets.get_mut(&packet_id) else {
            return;
        };
        let coin = if packet.coin_award_pending {
            packet.coin_award_pending = false;
            packet.coin_value() as u64
        } else {
            0
        };
        packet.active = false;
        if packet.delivered {
            coin
        } else {
            packet.delivered = true;
            metrics.delivered += 1;
            if let Some(SystemKind::Reference { delivered }) =
                state.level.system_mut(system).map(|s| &mut s.kind)
            {
                *delivered += 1;
            }
            info!(packet = %packet_id, system = %system, "packet delivered");
            coin
        }
    };
    state.add_coins(coin);
}

/// Push packets sitting on output ports of active systems onto their
/// wires.
pub(crate) fn push_outputs_to_wires(
    state: &mut GameState,
    rng: &mut ChaCha8Rng,
    metrics: &mut TickMetrics,
) {
    let system_ids = state.level.system_ids();
    for system_id in system_ids {
        let Some(system) = state.level.system(system_id) else {
            continue;
        };
        if !system.active {
            continue;
        }
        let outputs: Vec<(skein_core::PortRef, PacketId)> = system
            .output_ports
            .iter()
            .enumerate()
            .filter_map(|(i, p)| {
                p.packet
                    .map(|id| (skein_core::PortRef::output(system_id, i as u16), id))
            })
            .collect();
        for (port_ref, packet_id) in outputs {
            let Some(wire_id) = state.level.wire_from_output(port_ref) else {
                continue;
            };
            // Don't feed a wire whose destination has failed; the packet
            // waits on the port instead.
            let dest_healthy = state
                .level
                .wire(wire_id)
                .and_then(|w| state.level.system(w.destination.system))
                .map(|s| !s.failed)
                .unwrap_or(false);
            if !dest_healthy {
                continue;
            }
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
    }
}
