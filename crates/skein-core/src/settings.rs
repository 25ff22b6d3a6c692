//! Tunable simulation settings.

use serde::{Deserialize, Serialize};

/// Tunable knobs recognized by the engine.
///
/// Field names mirror the keys of the JSON configuration object; every
/// field has a default so partial configuration objects deserialize.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Pixels a packet may drift from its wire path before it is lost.
    pub off_wire_loss_threshold: f64,
    /// Sample wire paths as smooth curves (`true`) or rigid polylines.
    pub smooth_wire_curves: bool,
    /// Percentage of permanently failed systems that triggers game over.
    pub failed_systems_game_over_percent: f64,
    /// Packet speed (px/s) above which a system takes damage on entry.
    pub speed_damage_threshold: f64,
    /// Seconds a speed-damaged system stays deactivated.
    pub speed_damage_deactivation_time: f64,
    /// Target spacing (px) a protected confidential packet tries to keep
    /// from every other packet on the network.
    pub confidential_spacing: f64,
    /// Distance (px) under which two on-wire packets collide.
    pub collision_radius: f64,
    /// Radius (px) of the shockwave emitted by a collision.
    pub shockwave_radius: f64,
    /// Peak positional impulse (px) a shockwave applies at its centre.
    pub shockwave_impulse: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            off_wire_loss_threshold: 20.0,
            smooth_wire_curves: true,
            failed_systems_game_over_percent: 50.0,
            speed_damage_threshold: 150.0,
            speed_damage_deactivation_time: 10.0,
            confidential_spacing: 60.0,
            collision_radius: 8.0,
            shockwave_radius: 60.0,
            shockwave_impulse: 40.0,
        }
    }
}
