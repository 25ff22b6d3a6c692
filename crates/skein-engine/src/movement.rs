//! Per-tick packet kinematics.
//!
//! Moves every on-wire packet along its sampled path: type-specific
//! entry speeds and acceleration profiles, bulk bend/deflection rules,
//! confidential spacing, ability effects, and the off-wire loss rule.
//! Packets resting in ports or storage only age their lifetime clock.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use skein_core::{BulkKind, MessengerKind, PacketId, WireId};
use skein_geometry::{Point2D, Vec2D, WirePath};
use skein_model::{Packet, PacketKind};
use tracing::debug;

use crate::abilities::Abilities;
use crate::state::GameState;

/// Reference speed for messenger-class packets, px/s.
pub const MESSENGER_SPEED: f64 = 100.0;

/// Magnitude of constant acceleration and deceleration, px/s².
pub const ACCELERATION: f64 = 30.0;

/// Floor below which deceleration stops shaving speed, px/s.
pub const MIN_SPEED: f64 = 10.0;

/// Small bulk speed on straight runs / through bend zones, px/s.
pub const BULK_SMALL_SPEED: (f64, f64) = (100.0, 150.0);

/// Large bulk speed, px/s.
pub const BULK_LARGE_SPEED: f64 = 80.0;

/// Distance between large-bulk perpendicular deflections, px.
pub const DEFLECTION_INTERVAL: f64 = 50.0;

/// Fraction of speed used as the deflection displacement.
pub const DEFLECTION_FRACTION: f64 = 0.1;

/// Radius around a bend within which small bulk runs at bend speed, px.
pub const BEND_ZONE_RADIUS: f64 = 30.0;

/// Gain applied to confidential-protected spacing adjustments.
pub const SPACING_GAIN: f64 = 0.15;

/// Scalar acceleration profile applied along the wire tangent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccelerationType {
    /// Speed holds steady.
    ConstantVelocity,
    /// Speed grows by [`ACCELERATION`] each second.
    ConstantAcceleration,
    /// Speed shrinks by [`ACCELERATION`] each second, floored at
    /// [`MIN_SPEED`].
    Deceleration,
}

/// Speed a packet takes when entering a wire, given the compatibility of
/// the port it left through.
pub fn entry_speed(kind: &PacketKind, compatible: bool, fallback: f64) -> f64 {
    match kind {
        PacketKind::Messenger(m) => messenger_entry_speed(*m, compatible),
        PacketKind::Protected { movement, .. } => messenger_entry_speed(*movement, compatible),
        PacketKind::Bit { .. } => messenger_entry_speed(MessengerKind::Small, compatible),
        PacketKind::Bulk {
            kind: BulkKind::Small,
            ..
        } => BULK_SMALL_SPEED.0,
        PacketKind::Bulk {
            kind: BulkKind::Large,
            ..
        } => BULK_LARGE_SPEED,
        PacketKind::Confidential | PacketKind::ConfidentialProtected | PacketKind::Trojan => {
            fallback
        }
    }
}

fn messenger_entry_speed(kind: MessengerKind, compatible: bool) -> f64 {
    match kind {
        // Square: full from compatible, half from incompatible.
        MessengerKind::Square => {
            if compatible {
                MESSENGER_SPEED
            } else {
                MESSENGER_SPEED * 0.5
            }
        }
        // Small and Triangle start at the reference speed; the profile
        // does the differentiating.
        MessengerKind::Small | MessengerKind::Triangle => MESSENGER_SPEED,
    }
}

/// Acceleration profile for a packet, given entry-port compatibility.
pub fn accel_profile(kind: &PacketKind, compatible: bool) -> AccelerationType {
    match kind {
        PacketKind::Messenger(m) => messenger_profile(*m, compatible),
        PacketKind::Protected { movement, .. } => messenger_profile(*movement, compatible),
        PacketKind::Bit { .. } => messenger_profile(MessengerKind::Small, compatible),
        _ => AccelerationType::ConstantVelocity,
    }
}

fn messenger_profile(kind: MessengerKind, compatible: bool) -> AccelerationType {
    match kind {
        MessengerKind::Small => {
            if compatible {
                AccelerationType::ConstantAcceleration
            } else {
                AccelerationType::Deceleration
            }
        }
        MessengerKind::Square => AccelerationType::ConstantVelocity,
        MessengerKind::Triangle => {
            if compatible {
                AccelerationType::ConstantVelocity
            } else {
                AccelerationType::ConstantAcceleration
            }
        }
    }
}

/// Advance every packet one tick.
pub(crate) fn update_kinematics(
    state: &mut GameState,
    abilities: &Abilities,
    rng: &mut ChaCha8Rng,
    dt: f64,
) {
    let smooth = state.settings.smooth_wire_curves;
    let threshold = state.settings.off_wire_loss_threshold;
    let spacing = state.settings.confidential_spacing;

    // Position snapshot for the spacing rule, taken before anything
    // moves so the adjustment is order-independent.
    let positions: Vec<(PacketId, Point2D)> = state
        .packets
        .values()
        .filter(|p| p.active)
        .map(|p| (p.id, p.position))
        .collect();

    // Wires carrying a packet; a destroyed wire still carries its
    // in-flight packet to termination.
    let carrying: Vec<(WireId, PacketId)> = state
        .level
        .wires()
        .filter_map(|w| w.packet.map(|p| (w.id, p)))
        .collect();

    for (wire_id, packet_id) in carrying {
        let Some(path) = state.level.wire_path(wire_id, smooth) else {
            continue;
        };
        let bend_positions: Vec<Point2D> = state
            .level
            .wire(wire_id)
            .map(|w| w.bends.iter().map(|b| b.position).collect())
            .unwrap_or_default();

        let aergia = abilities.aergia_suppresses(wire_id);
        let Some(packet) = state.packets.get_mut(&packet_id) else {
            continue;
        };
        if !packet.active {
            continue;
        }

        packet.travel_time += dt;
        if packet.travel_time_exceeded() {
            packet.active = false;
            debug!(packet = %packet.id, "packet exceeded max travel time on wire");
            continue;
        }

        step_on_wire(
            packet,
            &path,
            &bend_positions,
            &positions,
            spacing,
            threshold,
            aergia,
            abilities.eliphas,
            rng,
            dt,
        );
    }

    // Packets at rest in ports, storage, or a merger pool only age.
    let resting: Vec<PacketId> = state
        .packets
        .values()
        .filter(|p| p.active && !p.is_on_wire())
        .map(|p| p.id)
        .collect();
    for id in resting {
        if let Some(packet) = state.packets.get_mut(&id) {
            packet.travel_time += dt;
            if packet.travel_time_exceeded() {
                packet.active = false;
                debug!(packet = %packet.id, "packet expired while held");
            }
        }
    }

    if abilities.anahita {
        for packet in state.packets.values_mut().filter(|p| p.active) {
            packet.noise_level = 0.0;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn step_on_wire(
    packet: &mut Packet,
    path: &WirePath,
    bends: &[Point2D],
    positions: &[(PacketId, Point2D)],
    spacing: f64,
    threshold: f64,
    aergia: bool,
    eliphas: bool,
    rng: &mut ChaCha8Rng,
    dt: f64,
) {
    let total = path.total_length();
    if total <= 0.0 {
        return;
    }

    // Acceleration profile, unless Aergia pins this wire.
    if !aergia {
        match accel_profile(&packet.kind, packet.entry_compatible) {
            AccelerationType::ConstantVelocity => {}
            AccelerationType::ConstantAcceleration => packet.base_speed += ACCELERATION * dt,
            AccelerationType::Deceleration => {
                packet.base_speed = (packet.base_speed - ACCELERATION * dt).max(MIN_SPEED)
            }
        }
    }

    // Bulk packets override the scalar speed outright.
    let mut speed = packet.base_speed;
    match &mut packet.kind {
        PacketKind::Bulk {
            kind: BulkKind::Small,
            ..
        } => {
            let near_bend = bends
                .iter()
                .any(|b| b.distance_to(packet.position) <= BEND_ZONE_RADIUS);
            speed = if near_bend {
                BULK_SMALL_SPEED.1
            } else {
                BULK_SMALL_SPEED.0
            };
        }
        PacketKind::Bulk {
            kind: BulkKind::Large,
            since_deflection,
        } => {
            speed = BULK_LARGE_SPEED;
            *since_deflection += speed * dt;
            if *since_deflection >= DEFLECTION_INTERVAL {
                *since_deflection = 0.0;
                let tangent = path.tangent_at(packet.path_progress);
                let side = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                let shove = tangent.perpendicular() * (speed * DEFLECTION_FRACTION * side);
                packet.path_offset = packet.path_offset + shove;
            }
        }
        _ => {}
    }

    // Protected confidentials nudge their speed to keep their distance.
    if packet.kind == PacketKind::ConfidentialProtected {
        let tangent = path.tangent_at(packet.path_progress);
        let mut adjustment = Vec2D::ZERO;
        let mut count = 0u32;
        for (other_id, other_pos) in positions {
            if *other_id == packet.id {
                continue;
            }
            let distance = packet.position.distance_to(*other_pos);
            if distance < spacing && distance > 0.0 {
                let away = (packet.position - *other_pos).normalize();
                adjustment = adjustment + away * ((spacing - distance) * SPACING_GAIN);
                count += 1;
            }
        }
        if count > 0 {
            speed += (adjustment * (1.0 / count as f64)).dot(tangent);
        }
    }

    // Advance arc-length progress; reversing packets head back toward
    // the source end.
    let delta = speed * dt / total;
    packet.path_progress = if packet.reversing {
        (packet.path_progress - delta).clamp(0.0, 1.0)
    } else {
        (packet.path_progress + delta).clamp(0.0, 1.0)
    };

    let on_path = path.position_at(packet.path_progress);
    let tangent = path.tangent_at(packet.path_progress);
    let direction = if packet.reversing { -1.0 } else { 1.0 };
    packet.velocity = tangent * (speed * direction);

    if eliphas {
        packet.path_offset = Vec2D::ZERO;
    }

    // Off-wire rule: drift beyond the threshold loses the packet;
    // anything inside snaps back to the path.
    let drifted = on_path + packet.path_offset;
    let closest = path.closest_point(drifted);
    if closest.distance > threshold {
        packet.lost = true;
        packet.active = false;
        packet.position = drifted;
        debug!(packet = %packet.id, deviation = closest.distance, "packet went off-wire");
        return;
    }
    packet.position = closest.point;
    packet.path_progress = closest.progress;
    packet.path_offset = Vec2D::ZERO;
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::{PacketId, PacketType};

    fn messenger(kind: MessengerKind) -> PacketKind {
        PacketKind::Messenger(kind)
    }

    // ── Entry speeds ─────────────────────────────────────────────

    #[test]
    fn square_messenger_halves_from_incompatible() {
        assert_eq!(entry_speed(&messenger(MessengerKind::Square), true, 50.0), 100.0);
        assert_eq!(entry_speed(&messenger(MessengerKind::Square), false, 50.0), 50.0);
    }

    #[test]
    fn small_and_triangle_keep_reference_speed() {
        for kind in [MessengerKind::Small, MessengerKind::Triangle] {
            assert_eq!(entry_speed(&messenger(kind), true, 50.0), 100.0);
            assert_eq!(entry_speed(&messenger(kind), false, 50.0), 100.0);
        }
    }

    #[test]
    fn protected_follows_its_movement_kind() {
        let kind = PacketKind::Protected {
            original: MessengerKind::Triangle,
            movement: MessengerKind::Square,
        };
        assert_eq!(entry_speed(&kind, false, 50.0), 50.0);
    }

    #[test]
    fn confidential_keeps_fallback_speed() {
        assert_eq!(entry_speed(&PacketKind::Confidential, true, 50.0), 50.0);
        assert_eq!(entry_speed(&PacketKind::Trojan, false, 42.0), 42.0);
    }

    // ── Profiles ─────────────────────────────────────────────────

    #[test]
    fn small_profile_flips_with_compatibility() {
        assert_eq!(
            accel_profile(&messenger(MessengerKind::Small), true),
            AccelerationType::ConstantAcceleration
        );
        assert_eq!(
            accel_profile(&messenger(MessengerKind::Small), false),
            AccelerationType::Deceleration
        );
    }

    #[test]
    fn triangle_accelerates_only_when_incompatible() {
        assert_eq!(
            accel_profile(&messenger(MessengerKind::Triangle), true),
            AccelerationType::ConstantVelocity
        );
        assert_eq!(
            accel_profile(&messenger(MessengerKind::Triangle), false),
            AccelerationType::ConstantAcceleration
        );
    }

    #[test]
    fn bit_packets_move_like_small_messengers() {
        let bit = PacketKind::Bit {
            group: skein_core::BulkGroupId(0),
            group_size: 8,
            color: 0,
        };
        assert_eq!(accel_profile(&bit, true), AccelerationType::ConstantAcceleration);
        assert_eq!(entry_speed(&bit, true, 50.0), 100.0);
    }

    // ── On-wire stepping ─────────────────────────────────────────

    fn straight_path() -> WirePath {
        WirePath::new(
            &[Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0)],
            skein_geometry::PathStyle::Polyline,
        )
    }

    fn test_packet() -> Packet {
        let mut p = Packet::new(
            PacketId(0),
            PacketType::SquareMessenger,
            Point2D::new(0.0, 0.0),
        );
        p.current_wire = Some(WireId(0));
        p.base_speed = 50.0;
        p
    }

    fn step(packet: &mut Packet, path: &WirePath, dt: f64) {
        let mut rng = {
            use rand::SeedableRng;
            ChaCha8Rng::seed_from_u64(0)
        };
        step_on_wire(
            packet,
            path,
            &[],
            &[],
            60.0,
            20.0,
            false,
            false,
            &mut rng,
            dt,
        );
    }

    #[test]
    fn progress_advances_with_speed() {
        let path = straight_path();
        let mut p = test_packet();
        step(&mut p, &path, 1.0);
        assert!((p.path_progress - 0.5).abs() < 1e-9);
        assert_eq!(p.position, Point2D::new(50.0, 0.0));
        assert_eq!(p.velocity, Vec2D::new(50.0, 0.0));
    }

    #[test]
    fn reversing_packet_moves_backward() {
        let path = straight_path();
        let mut p = test_packet();
        p.path_progress = 0.8;
        p.reversing = true;
        step(&mut p, &path, 1.0);
        assert!((p.path_progress - 0.3).abs() < 1e-9);
        assert_eq!(p.velocity, Vec2D::new(-50.0, 0.0));
    }

    #[test]
    fn drift_beyond_threshold_loses_packet() {
        let path = straight_path();
        let mut p = test_packet();
        p.path_offset = Vec2D::new(0.0, 25.0);
        step(&mut p, &path, 0.01);
        assert!(p.lost);
        assert!(!p.active);
    }

    #[test]
    fn drift_at_threshold_snaps_back() {
        let path = straight_path();
        let mut p = test_packet();
        p.path_offset = Vec2D::new(0.0, 20.0);
        step(&mut p, &path, 0.01);
        assert!(!p.lost);
        assert!(p.active);
        assert_eq!(p.position.y, 0.0);
        assert_eq!(p.path_offset, Vec2D::ZERO);
    }

    #[test]
    fn deceleration_floors_at_min_speed() {
        let path = straight_path();
        let mut p = test_packet();
        p.kind = PacketKind::Messenger(MessengerKind::Small);
        p.entry_compatible = false;
        p.base_speed = 12.0;
        step(&mut p, &path, 1.0);
        assert_eq!(p.base_speed, MIN_SPEED);
    }

    #[test]
    fn large_bulk_deflects_every_interval() {
        let path = straight_path();
        let mut p = test_packet();
        p.kind = PacketKind::Bulk {
            kind: BulkKind::Large,
            since_deflection: 49.9,
        };
        step(&mut p, &path, 0.5);
        // 80 px/s for 0.5 s crosses the 50 px boundary; the offset is
        // consumed by the same step's snap, but the counter reset proves
        // the deflection fired.
        match p.kind {
            PacketKind::Bulk {
                since_deflection, ..
            } => assert!(since_deflection < 49.9),
            _ => unreachable!(),
        }
    }
}
