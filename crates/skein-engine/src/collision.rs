//! Collision detection and shockwaves among on-wire packets.
//!
//! Two on-wire packets closer than the collision radius destroy each
//! other; the impact emits a shockwave that pushes every other on-wire
//! packet within range off its path (with linear falloff) and raises its
//! noise. Airyaman suppresses collisions outright; Atar suppresses only
//! the shockwaves.

use skein_core::PacketId;
use skein_geometry::Point2D;
use tracing::info;

use crate::abilities::Abilities;
use crate::metrics::TickMetrics;
use crate::state::GameState;

/// Run the collision check for one tick.
pub(crate) fn check_collisions(
    state: &mut GameState,
    abilities: &Abilities,
    metrics: &mut TickMetrics,
) {
    if abilities.airyaman {
        return;
    }
    let radius = state.settings.collision_radius;

    let on_wire: Vec<(PacketId, Point2D)> = state
        .packets
        .values()
        .filter(|p| p.active && p.is_on_wire())
        .map(|p| (p.id, p.position))
        .collect();

    // Pairwise sweep; a packet destroyed by an earlier pair no longer
    // collides.
    let mut destroyed: Vec<PacketId> = Vec::new();
    let mut centers: Vec<Point2D> = Vec::new();
    for i in 0..on_wire.len() {
        for j in i + 1..on_wire.len() {
            let (a, pos_a) = on_wire[i];
            let (b, pos_b) = on_wire[j];
            if destroyed.contains(&a) || destroyed.contains(&b) {
                continue;
            }
            if pos_a.distance_to(pos_b) < radius {
                destroyed.push(a);
                destroyed.push(b);
                centers.push(pos_a.midpoint(pos_b));
                metrics.collisions += 1;
                info!(first = %a, second = %b, "packets collided");
            }
        }
    }

    for id in &destroyed {
        if let Some(packet) = state.packet_mut(*id) {
            packet.active = false;
            packet.lost = true;
        }
    }

    if abilities.atar {
        return;
    }

    let shock_radius = state.settings.shockwave_radius;
    let impulse = state.settings.shockwave_impulse;
    for center in centers {
        let struck: Vec<PacketId> = state
            .packets
            .values()
            .filter(|p| p.active && p.is_on_wire() && !destroyed.contains(&p.id))
            .filter(|p| p.position.distance_to(center) <= shock_radius)
            .map(|p| p.id)
            .collect();
        for id in struck {
            if let Some(packet) = state.packet_mut(id) {
                let offset = packet.position - center;
                let distance = offset.magnitude();
                let falloff = 1.0 - distance / shock_radius;
                let direction = if distance > 0.0 {
                    offset.normalize()
                } else {
                    skein_geometry::Vec2D::new(0.0, 1.0)
                };
                packet.apply_shockwave(direction * (impulse * falloff));
                metrics.shockwaves += 1;
            }
        }
    }
}
