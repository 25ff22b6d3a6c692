//! Ability effects applied by the kinematics and collision passes.
//!
//! Only the in-engine effects live here; the activation economy
//! (cooldowns, costs, targeting UI) is an external concern.

use skein_core::WireId;

/// The abilities the engine recognizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ability {
    /// Zeroes every active packet's noise each tick.
    Anahita,
    /// Suppresses collision shockwaves (collisions still destroy the
    /// colliding pair).
    Atar,
    /// Suppresses collisions entirely.
    Airyaman,
    /// Zeroes acceleration on one targeted wire.
    Aergia,
    /// Permits a system move; the move itself is the editing-time
    /// `move_system` operation.
    Sisyphus,
    /// Realigns packets to their wire path centre each tick.
    Eliphas,
}

/// Which ability effects are currently live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Abilities {
    /// Anahita: zero noise.
    pub anahita: bool,
    /// Atar: no shockwaves.
    pub atar: bool,
    /// Airyaman: no collisions.
    pub airyaman: bool,
    /// Sisyphus: a system move is permitted.
    pub sisyphus: bool,
    /// Eliphas: packets snap back to path centre.
    pub eliphas: bool,
    /// Aergia: the wire on which acceleration is zeroed, if targeted.
    pub aergia_target: Option<WireId>,
}

impl Abilities {
    /// Switch one ability on or off. Switching Aergia off clears its
    /// target; switching it on without a target has no effect until
    /// [`Abilities::target_aergia`] is called.
    pub fn set_active(&mut self, ability: Ability, active: bool) {
        match ability {
            Ability::Anahita => self.anahita = active,
            Ability::Atar => self.atar = active,
            Ability::Airyaman => self.airyaman = active,
            Ability::Sisyphus => self.sisyphus = active,
            Ability::Eliphas => self.eliphas = active,
            Ability::Aergia => {
                if !active {
                    self.aergia_target = None;
                }
            }
        }
    }

    /// Point Aergia at a wire.
    pub fn target_aergia(&mut self, wire: WireId) {
        self.aergia_target = Some(wire);
    }

    /// Whether Aergia suppresses acceleration on this wire.
    pub fn aergia_suppresses(&self, wire: WireId) -> bool {
        self.aergia_target == Some(wire)
    }
}
