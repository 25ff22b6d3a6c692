//! End-of-level and game-over predicates.

use std::collections::{HashSet, VecDeque};

use skein_core::{GameOverReason, SystemId};

use crate::state::GameState;

/// Loss percentage beyond which the game is over and at or below which a
/// level may complete.
pub const LOSS_LIMIT_PCT: f64 = 50.0;

/// Grace period past the level duration before an idle network times
/// out, in seconds.
pub const TIME_LIMIT_GRACE: f64 = 5.0;

/// Minimum elapsed time for non-tutorial early completion, in seconds.
pub const EARLY_COMPLETION_MIN_TIME: f64 = 5.0;

/// The first matching game-over reason, if any.
///
/// Order is fixed: excessive loss, time limit, disconnection, excessive
/// failures.
pub(crate) fn check_game_over(state: &GameState) -> Option<GameOverReason> {
    if state.packet_loss_pct() > LOSS_LIMIT_PCT {
        return Some(GameOverReason::ExcessivePacketLoss);
    }
    if state.level_timer > state.level.level_duration {
        let lingering = state.active_packet_count() > 0;
        if lingering || state.level_timer > state.level.level_duration + TIME_LIMIT_GRACE {
            return Some(GameOverReason::TimeLimitExceeded);
        }
    }
    if network_disconnected(state) {
        return Some(GameOverReason::NetworkDisconnected);
    }
    if excessive_failures(state) {
        return Some(GameOverReason::ExcessiveSystemFailures);
    }
    None
}

/// Whether the level is complete.
///
/// All injections executed, no packets in flight, acceptable loss, and
/// either the timer has elapsed or (non-tutorial) at least one delivery
/// after five seconds. Tutorial levels also accept a bare timer elapse
/// once every injection has executed.
pub(crate) fn check_level_complete(state: &GameState) -> bool {
    let all_executed = state.level.schedule.iter().all(|inj| inj.executed);
    if !all_executed {
        return false;
    }
    let timer_elapsed = state.level_timer >= state.level.level_duration;
    if state.level.tutorial && timer_elapsed {
        return true;
    }

    let drained = state.active_packet_count() == 0;
    let acceptable_loss = state.packet_loss_pct() <= LOSS_LIMIT_PCT;
    if !drained || !acceptable_loss {
        return false;
    }
    if timer_elapsed {
        return true;
    }
    !state.level.tutorial
        && state.delivered_count() >= 1
        && state.level_timer >= EARLY_COMPLETION_MIN_TIME
}

/// No directed route from any live source to any live destination.
///
/// Sources are reference systems the schedule injects from; every
/// reference system is a potential destination. Tutorial levels fall
/// back to undirected reachability before declaring disconnection.
pub(crate) fn network_disconnected(state: &GameState) -> bool {
    let sources: Vec<SystemId> = state
        .level
        .source_systems()
        .into_iter()
        .filter(|id| state.level.system(*id).map(|s| !s.failed).unwrap_or(false))
        .collect();
    let destinations: HashSet<SystemId> = state
        .level
        .reference_systems()
        .filter(|s| !s.failed)
        .map(|s| s.id)
        .collect();
    if sources.is_empty() || destinations.is_empty() {
        return false;
    }

    if reachable(state, &sources, &destinations, false) {
        return false;
    }
    if state.level.tutorial && reachable(state, &sources, &destinations, true) {
        return false;
    }
    true
}

fn reachable(
    state: &GameState,
    sources: &[SystemId],
    destinations: &HashSet<SystemId>,
    undirected: bool,
) -> bool {
    // Edges along active, non-destroyed wires between non-failed systems.
    let mut edges: Vec<(SystemId, SystemId)> = Vec::new();
    for wire in state.level.active_wires() {
        if wire.destroyed {
            continue;
        }
        let from = wire.source.system;
        let to = wire.destination.system;
        let healthy = |id: SystemId| state.level.system(id).map(|s| !s.failed).unwrap_or(false);
        if !healthy(from) || !healthy(to) {
            continue;
        }
        edges.push((from, to));
        if undirected {
            edges.push((to, from));
        }
    }

    // A route must reach a sink other than the node it started from.
    for &start in sources {
        let mut visited: HashSet<SystemId> = HashSet::new();
        let mut queue: VecDeque<SystemId> = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            if destinations.contains(&current) && current != start {
                return true;
            }
            for &(from, to) in &edges {
                if from == current && visited.insert(to) {
                    queue.push_back(to);
                }
            }
        }
    }
    false
}

/// Whether the share of permanently failed systems exceeds the limit.
pub(crate) fn excessive_failures(state: &GameState) -> bool {
    let total = state.level.system_count();
    if total == 0 {
        return false;
    }
    let failed = state.level.systems().filter(|s| s.failed).count();
    let pct = failed as f64 * 100.0 / total as f64;
    pct > state.settings.failed_systems_game_over_percent
}
