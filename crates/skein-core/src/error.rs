//! Error and terminal-condition types shared across the workspace.
//!
//! Editing rejections are surfaced as [`EditError`] values with a single
//! explanatory reason and no state change. Rule losses, placement
//! deferrals, and system damage are ordinary simulation outcomes, not
//! errors; only [`GameOverReason`] halts the engine.

use std::error::Error;
use std::fmt;

/// Why a wiring-controller edit was rejected.
///
/// Every variant leaves the level untouched; callers may retry with
/// different arguments.
#[derive(Clone, Debug, PartialEq)]
pub enum EditError {
    /// Edits are only accepted in editing mode.
    NotInEditingMode,
    /// Both endpoints belong to the same system.
    SameSystem,
    /// Both endpoints have the same direction (input-input or
    /// output-output).
    SameDirection,
    /// One of the endpoints already carries a wire.
    PortAlreadyConnected,
    /// A wire between these two ports already exists.
    DuplicateWire,
    /// The straight segment between the endpoints crosses the bounds of a
    /// system that is not one of the wire's own endpoints.
    CrossesSystem,
    /// The edit needs more wire length than remains in the budget.
    InsufficientWire {
        /// Length the edit would consume.
        required: f64,
        /// Length still available.
        available: f64,
    },
    /// The edit costs coins the player does not have.
    InsufficientCoins,
    /// The wire already carries the maximum number of bends.
    BendLimitReached,
    /// The bend index does not exist on this wire.
    BendOutOfRange,
    /// The new bend position is beyond the bend's move radius.
    OutsideMoveRadius,
    /// The bend position lies inside an endpoint system's bounds.
    BendInsideSystem,
    /// Reference systems cannot be moved.
    ImmovableSystem,
    /// The two wires share no common port, so they cannot be merged.
    NoCommonPort,
    /// No system with this id exists in the level.
    UnknownSystem,
    /// No wire with this id exists in the level, or it is inactive.
    UnknownWire,
    /// No port matches this reference.
    UnknownPort,
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInEditingMode => write!(f, "edits are only accepted in editing mode"),
            Self::SameSystem => write!(f, "both ports belong to the same system"),
            Self::SameDirection => write!(f, "ports have the same direction"),
            Self::PortAlreadyConnected => write!(f, "port already carries a wire"),
            Self::DuplicateWire => write!(f, "a wire between these ports already exists"),
            Self::CrossesSystem => write!(f, "wire would pass over another system"),
            Self::InsufficientWire {
                required,
                available,
            } => write!(
                f,
                "insufficient wire length: need {required:.1}, have {available:.1}"
            ),
            Self::InsufficientCoins => write!(f, "not enough coins"),
            Self::BendLimitReached => write!(f, "wire already has the maximum number of bends"),
            Self::BendOutOfRange => write!(f, "bend index out of range"),
            Self::OutsideMoveRadius => write!(f, "bend move exceeds its radius"),
            Self::BendInsideSystem => write!(f, "bend would sit inside an endpoint system"),
            Self::ImmovableSystem => write!(f, "reference systems cannot be moved"),
            Self::NoCommonPort => write!(f, "wires share no common port"),
            Self::UnknownSystem => write!(f, "unknown system id"),
            Self::UnknownWire => write!(f, "unknown or inactive wire id"),
            Self::UnknownPort => write!(f, "unknown port reference"),
        }
    }
}

impl Error for EditError {}

/// The terminal condition that ended a simulation, if any.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GameOverReason {
    /// The simulation has not ended.
    #[default]
    None,
    /// Packet loss exceeded 50% of all scheduled injections.
    ExcessivePacketLoss,
    /// The level timer ran past the level duration.
    TimeLimitExceeded,
    /// No route remains from any live source to any live destination.
    NetworkDisconnected,
    /// Too large a share of systems failed permanently.
    ExcessiveSystemFailures,
}

impl fmt::Display for GameOverReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::ExcessivePacketLoss => write!(f, "excessive packet loss"),
            Self::TimeLimitExceeded => write!(f, "time limit exceeded"),
            Self::NetworkDisconnected => write!(f, "network disconnected"),
            Self::ExcessiveSystemFailures => write!(f, "excessive system failures"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_error_displays_budget_numbers() {
        let err = EditError::InsufficientWire {
            required: 120.5,
            available: 40.25,
        };
        let msg = err.to_string();
        assert!(msg.contains("120.5"));
        assert!(msg.contains("40.2"));
    }

    #[test]
    fn game_over_reason_defaults_to_none() {
        assert_eq!(GameOverReason::default(), GameOverReason::None);
    }
}
