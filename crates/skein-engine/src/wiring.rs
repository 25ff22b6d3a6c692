//! Editing-time wiring operations.
//!
//! Wire creation and removal, bend placement, system moves, and wire
//! merging, all against the shared wire-length budget. Every rejection
//! is an [`EditError`] with no state change.

use skein_core::{EditError, PortDirection, PortRef, SystemId, WireId};
use skein_geometry::{nearest_control_segment, Point2D};
use skein_model::{SystemKind, WireBend};
use tracing::debug;

use crate::state::GameState;

/// Coin cost of adding one bend.
pub const BEND_COIN_COST: u64 = 1;

/// Create a wire between two ports.
///
/// Endpoints are normalized so the source is the output port. The
/// straight segment must not cross any uninvolved system's bounds, and
/// the straight-line length is charged against the budget.
pub(crate) fn create_wire(
    state: &mut GameState,
    a: PortRef,
    b: PortRef,
) -> Result<WireId, EditError> {
    let port_a = state.level.port(a).ok_or(EditError::UnknownPort)?;
    let port_b = state.level.port(b).ok_or(EditError::UnknownPort)?;

    if a.system == b.system {
        return Err(EditError::SameSystem);
    }
    if a.direction == b.direction {
        return Err(EditError::SameDirection);
    }
    if port_a.connected || port_b.connected {
        return Err(EditError::PortAlreadyConnected);
    }
    if state.level.has_wire_between(a, b) {
        return Err(EditError::DuplicateWire);
    }

    let (source, destination) = if a.direction == PortDirection::Output {
        (a, b)
    } else {
        (b, a)
    };
    let start = state
        .level
        .port(source)
        .map(|p| p.position)
        .ok_or(EditError::UnknownPort)?;
    let end = state
        .level
        .port(destination)
        .map(|p| p.position)
        .ok_or(EditError::UnknownPort)?;

    // The segment may only touch the two systems it connects.
    let crosses = state
        .level
        .systems()
        .filter(|s| s.id != a.system && s.id != b.system)
        .any(|s| s.bounds().intersects_segment(start, end));
    if crosses {
        return Err(EditError::CrossesSystem);
    }

    let length = start.distance_to(end);
    if length > state.remaining_wire_length {
        return Err(EditError::InsufficientWire {
            required: length,
            available: state.remaining_wire_length,
        });
    }

    let id = state.level.add_wire(source, destination, length);
    if let Some(port) = state.level.port_mut(source) {
        port.connected = true;
    }
    if let Some(port) = state.level.port_mut(destination) {
        port.connected = true;
    }
    state.remaining_wire_length -= length;
    debug!(wire = %id, length, "wire created");
    Ok(id)
}

/// Remove a wire, restoring its recorded length to the budget.
pub(crate) fn remove_wire(state: &mut GameState, id: WireId) -> Result<(), EditError> {
    let (source, destination, length) = {
        let wire = state.level.wire(id).ok_or(EditError::UnknownWire)?;
        if !wire.active {
            return Err(EditError::UnknownWire);
        }
        (wire.source, wire.destination, wire.wire_length)
    };
    if let Some(port) = state.level.port_mut(source) {
        port.connected = false;
    }
    if let Some(port) = state.level.port_mut(destination) {
        port.connected = false;
    }
    if let Some(wire) = state.level.wire_mut(id) {
        wire.active = false;
        wire.packet = None;
    }
    state.remaining_wire_length += length;
    debug!(wire = %id, restored = length, "wire removed");
    Ok(())
}

/// Add a bend to a wire at (the projection of) `position`.
///
/// Costs one coin plus the path-length increase. The bend is inserted at
/// the control segment nearest the requested position and pinned onto
/// it.
pub(crate) fn add_bend(
    state: &mut GameState,
    id: WireId,
    position: Point2D,
) -> Result<usize, EditError> {
    let smooth = state.settings.smooth_wire_curves;
    {
        let wire = state.level.wire(id).ok_or(EditError::UnknownWire)?;
        if !wire.active {
            return Err(EditError::UnknownWire);
        }
        if !wire.can_add_bend() {
            return Err(EditError::BendLimitReached);
        }
    }
    if state.coins < BEND_COIN_COST {
        return Err(EditError::InsufficientCoins);
    }

    let control = state
        .level
        .wire_control_points(id)
        .ok_or(EditError::UnknownWire)?;
    let (segment, pinned) =
        nearest_control_segment(&control, position).ok_or(EditError::UnknownWire)?;

    let old_length = state
        .level
        .wire(id)
        .map(|w| w.wire_length)
        .ok_or(EditError::UnknownWire)?;
    if let Some(wire) = state.level.wire_mut(id) {
        wire.bends.insert(segment, WireBend::new(pinned));
    }
    let new_length = state
        .level
        .wire_total_length(id, smooth)
        .ok_or(EditError::UnknownWire)?;
    let delta = new_length - old_length;
    if delta > state.remaining_wire_length {
        if let Some(wire) = state.level.wire_mut(id) {
            wire.bends.remove(segment);
        }
        return Err(EditError::InsufficientWire {
            required: delta,
            available: state.remaining_wire_length,
        });
    }

    state.remaining_wire_length -= delta;
    if let Some(wire) = state.level.wire_mut(id) {
        wire.wire_length = new_length;
    }
    state.spend_coins(BEND_COIN_COST);
    debug!(wire = %id, index = segment, "bend added");
    Ok(segment)
}

/// Move a bend, adjusting the budget by the length change.
///
/// The target must stay within the bend's move radius and outside the
/// bounds of both endpoint systems.
pub(crate) fn move_bend(
    state: &mut GameState,
    id: WireId,
    index: usize,
    position: Point2D,
) -> Result<(), EditError> {
    let smooth = state.settings.smooth_wire_curves;
    let (source_system, destination_system, old_position) = {
        let wire = state.level.wire(id).ok_or(EditError::UnknownWire)?;
        if !wire.active {
            return Err(EditError::UnknownWire);
        }
        let bend = wire.bends.get(index).ok_or(EditError::BendOutOfRange)?;
        if !bend.movable || !bend.within_move_radius(position) {
            return Err(EditError::OutsideMoveRadius);
        }
        (wire.source.system, wire.destination.system, bend.position)
    };

    for system_id in [source_system, destination_system] {
        if let Some(system) = state.level.system(system_id) {
            if system.bounds().contains(position) {
                return Err(EditError::BendInsideSystem);
            }
        }
    }

    let old_length = state
        .level
        .wire(id)
        .map(|w| w.wire_length)
        .ok_or(EditError::UnknownWire)?;
    if let Some(wire) = state.level.wire_mut(id) {
        wire.bends[index].position = position;
    }
    let new_length = state
        .level
        .wire_total_length(id, smooth)
        .ok_or(EditError::UnknownWire)?;
    let delta = new_length - old_length;
    if delta > state.remaining_wire_length {
        if let Some(wire) = state.level.wire_mut(id) {
            wire.bends[index].position = old_position;
        }
        return Err(EditError::InsufficientWire {
            required: delta,
            available: state.remaining_wire_length,
        });
    }

    state.remaining_wire_length -= delta;
    if let Some(wire) = state.level.wire_mut(id) {
        wire.wire_length = new_length;
    }
    Ok(())
}

/// Move a system, carrying its ports and re-budgeting every incident
/// wire. The move reverts if any incident wire would cross another
/// system or the budget would be exceeded.
pub(crate) fn move_system(
    state: &mut GameState,
    id: SystemId,
    position: Point2D,
) -> Result<(), EditError> {
    let smooth = state.settings.smooth_wire_curves;
    let old_position = {
        let system = state.level.system(id).ok_or(EditError::UnknownSystem)?;
        if matches!(system.kind, SystemKind::Reference { .. }) {
            return Err(EditError::ImmovableSystem);
        }
        system.position
    };

    let incident: Vec<WireId> = state
        .level
        .active_wires()
        .filter(|w| w.source.system == id || w.destination.system == id)
        .map(|w| w.id)
        .collect();

    // Tentatively move, then validate.
    if let Some(system) = state.level.system_mut(id) {
        system.set_position(position);
    }

    let revert = |state: &mut GameState| {
        if let Some(system) = state.level.system_mut(id) {
            system.set_position(old_position);
        }
    };

    let mut delta = 0.0;
    for wire_id in &incident {
        let Some(wire) = state.level.wire(*wire_id) else {
            continue;
        };
        let (src_sys, dst_sys) = (wire.source.system, wire.destination.system);
        let (Some(start), Some(end)) = (
            state.level.port(wire.source).map(|p| p.position),
            state.level.port(wire.destination).map(|p| p.position),
        ) else {
            continue;
        };
        let crosses = state
            .level
            .systems()
            .filter(|s| s.id != src_sys && s.id != dst_sys)
            .any(|s| s.bounds().intersects_segment(start, end));
        if crosses {
            revert(state);
            return Err(EditError::CrossesSystem);
        }
        let new_length = state
            .level
            .wire_total_length(*wire_id, smooth)
            .unwrap_or(0.0);
        let old_length = state
            .level
            .wire(*wire_id)
            .map(|w| w.wire_length)
            .unwrap_or(0.0);
        delta += new_length - old_length;
    }

    if delta > state.remaining_wire_length {
        revert(state);
        return Err(EditError::InsufficientWire {
            required: delta,
            available: state.remaining_wire_length,
        });
    }

    for wire_id in &incident {
        let new_length = state
            .level
            .wire_total_length(*wire_id, smooth)
            .unwrap_or(0.0);
        if let Some(wire) = state.level.wire_mut(*wire_id) {
            wire.wire_length = new_length;
        }
    }
    state.remaining_wire_length -= delta;
    debug!(system = %id, "system moved");
    Ok(())
}

/// Merge two wires sharing a common port into one direct wire.
///
/// The new wire's recorded length is the sum of the two old lengths; the
/// shared port is disconnected and the old wires deactivated.
pub(crate) fn merge_wires(
    state: &mut GameState,
    first: WireId,
    second: WireId,
) -> Result<WireId, EditError> {
    let (f_src, f_dst, f_len) = {
        let wire = state.level.wire(first).ok_or(EditError::UnknownWire)?;
        if !wire.active {
            return Err(EditError::UnknownWire);
        }
        (wire.source, wire.destination, wire.wire_length)
    };
    let (s_src, s_dst, s_len) = {
        let wire = state.level.wire(second).ok_or(EditError::UnknownWire)?;
        if !wire.active {
            return Err(EditError::UnknownWire);
        }
        (wire.source, wire.destination, wire.wire_length)
    };

    // Find the shared endpoint and the two outer ports.
    let pairs = [
        (f_src, s_src),
        (f_src, s_dst),
        (f_dst, s_src),
        (f_dst, s_dst),
    ];
    let common = pairs
        .iter()
        .find(|(x, y)| x == y)
        .map(|(x, _)| *x)
        .ok_or(EditError::NoCommonPort)?;
    let outer_first = if f_src == common { f_dst } else { f_src };
    let outer_second = if s_src == common { s_dst } else { s_src };

    if outer_first.system == outer_second.system {
        return Err(EditError::SameSystem);
    }
    if outer_first.direction == outer_second.direction {
        return Err(EditError::SameDirection);
    }

    let (source, destination) = if outer_first.direction == PortDirection::Output {
        (outer_first, outer_second)
    } else {
        (outer_second, outer_first)
    };

    for id in [first, second] {
        if let Some(wire) = state.level.wire_mut(id) {
            wire.active = false;
            wire.packet = None;
        }
    }
    if let Some(port) = state.level.port_mut(common) {
        port.connected = false;
    }

    let merged = state.level.add_wire(source, destination, f_len + s_len);
    debug!(first = %first, second = %second, merged = %merged, "wires merged");
    Ok(merged)
}

/// Switch the path-sampling style, re-budgeting every active wire so the
/// budget invariant survives the change. Toggling twice is a no-op.
pub(crate) fn set_smooth_curves(state: &mut GameState, smooth: bool) {
    if state.settings.smooth_wire_curves == smooth {
        return;
    }
    state.settings.smooth_wire_curves = smooth;
    let ids = state.level.active_wire_ids();
    for id in ids {
        let Some(new_length) = state.level.wire_total_length(id, smooth) else {
            continue;
        };
        if let Some(wire) = state.level.wire_mut(id) {
            state.remaining_wire_length += wire.wire_length - new_length;
            wire.wire_length = new_length;
        }
    }
}
