//! The tick controller.
//!
//! [`Engine`] owns the [`GameState`] and executes the fixed per-tick
//! pipeline: injection, timers, kinematics, two wire-transfer passes
//! around system processing, the anti-trojan scan, storage flush,
//! collision, and cleanup. It also carries the editing-mode API and
//! time travel (rewind = reset + replay; fast-forward = substeps).

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use skein_core::{
    EditError, GameOverReason, PacketId, PortRef, SystemId, WireId,
};
use skein_geometry::Point2D;
use skein_model::{GameLevel, Packet, SystemKind};
use tracing::{debug, info};

use crate::abilities::{Abilities, Ability};
use crate::collision::check_collisions;
use crate::config::EngineConfig;
use crate::flow::{check_game_over, check_level_complete};
use crate::metrics::TickMetrics;
use crate::movement::update_kinematics;
use crate::policies::{anti_trojan_scan, fail_system, process_inputs, storage_flush};
use crate::state::{GameState, LevelStartSnapshot};
use crate::transfer::{load_packet_on_wire, push_outputs_to_wires, transfer_pass};
use crate::wiring;

/// Substep size used by time travel, in seconds.
pub const TIME_TRAVEL_STEP: f64 = 0.1;

/// Whether the engine is accepting edits or simulating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Wiring edits are accepted; the clock is stopped.
    Editing,
    /// The tick pipeline runs; edits are frozen.
    Simulation,
}

/// The deterministic tick controller.
pub struct Engine {
    state: GameState,
    mode: Mode,
    rng: ChaCha8Rng,
    config: EngineConfig,
    abilities: Abilities,
    metrics: TickMetrics,
    /// Level graph and observables captured when simulation starts,
    /// restored by rewind and restart.
    pristine: Option<(GameLevel, LevelStartSnapshot)>,
}

impl Engine {
    /// Construct an engine in editing mode.
    pub fn new(level: GameLevel, config: EngineConfig) -> Self {
        let state = GameState::new(level, config.settings);
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            state,
            mode: Mode::Editing,
            rng,
            config,
            abilities: Abilities::default(),
            metrics: TickMetrics::default(),
            pristine: None,
        }
    }

    // ── Mode control ─────────────────────────────────────────────

    /// The current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Freeze edits and start simulating.
    ///
    /// Captures the level graph and the start snapshot so rewind and
    /// restart can reproduce the run, and reseeds the generator.
    pub fn enter_simulation_mode(&mut self) {
        if self.mode == Mode::Simulation {
            return;
        }
        self.pristine = Some((self.state.level.clone(), self.state.snapshot()));
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.metrics = TickMetrics::default();
        self.mode = Mode::Simulation;
        info!(level = %self.state.level.level_id, "simulation started");
    }

    /// Stop simulating and accept edits again.
    pub fn enter_editing_mode(&mut self) {
        self.mode = Mode::Editing;
    }

    /// Pause or resume ticking.
    pub fn set_paused(&mut self, paused: bool) {
        self.state.paused = paused;
    }

    /// Restart the level: restore the captured graph and observables,
    /// clear packets, and return to editing mode.
    pub fn restart_level(&mut self) {
        if let Some((level, snapshot)) = self.pristine.clone() {
            self.state.level = level;
            self.state.restore(snapshot);
        } else {
            let snapshot = self.state.snapshot();
            self.state.restore(snapshot);
        }
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.metrics = TickMetrics::default();
        self.mode = Mode::Editing;
        info!(level = %self.state.level.level_id, "level restarted");
    }

    // ── Ticking ──────────────────────────────────────────────────

    /// Advance the simulation by `dt` seconds.
    ///
    /// No-op outside simulation mode, while paused, or after the level
    /// ended.
    pub fn tick(&mut self, dt: f64) {
        if self.mode != Mode::Simulation
            || self.state.paused
            || self.state.game_over
            || self.state.level_complete
        {
            return;
        }
        self.step(dt);
    }

    /// One unconditional pipeline step (also used by time travel).
    fn step(&mut self, dt: f64) {
        let state = &mut self.state;

        // 1. Clocks.
        state.temporal_progress += dt;
        state.level_timer += dt;

        // 2. Due injections; failures defer and retry.
        Self::process_injections(state, &mut self.rng, &mut self.metrics);

        // 3. Deactivation timers and indicators.
        for system in state.level.systems_mut() {
            system.update_deactivation_timer(dt);
        }
        for system in state.level.systems_mut() {
            system.indicator_visible = system.all_ports_connected();
        }

        // 4. Kinematics along wires.
        update_kinematics(state, &self.abilities, &mut self.rng, dt);

        // 5. First transfer pass: arrivals into input ports (reference
        //    destinations finalize immediately).
        transfer_pass(state, &mut self.rng, &mut self.metrics);

        // 6. System processing: coins, release, per-system policy.
        process_inputs(state, &mut self.rng, &mut self.metrics);

        // 7. Anti-trojan sweep.
        anti_trojan_scan(state, &mut self.metrics);

        // 8. Second transfer pass: forward what was just placed on
        //    output ports in the same tick.
        transfer_pass(state, &mut self.rng, &mut self.metrics);

        // 9. Storage flush (one per system) and output-port push.
        storage_flush(state, &mut self.rng, &mut self.metrics);
        push_outputs_to_wires(state, &mut self.rng, &mut self.metrics);

        // 10. Collisions among on-wire packets.
        check_collisions(state, &self.abilities, &mut self.metrics);

        // 11. Cleanup and end conditions.
        Self::cleanup(state, &mut self.metrics);
        self.metrics.ticks += 1;

        if !state.game_over && !state.level_complete {
            if let Some(reason) = check_game_over(state) {
                state.game_over = true;
                state.last_game_over_reason = reason;
                info!(%reason, "game over");
            } else if check_level_complete(state) {
                state.level_complete = true;
                info!(level = %state.level.level_id, "level complete");
            }
        }
    }

    /// Place due injections onto outgoing wires; unplaceable injections
    /// stay pending and retry next tick.
    fn process_injections(state: &mut GameState, rng: &mut ChaCha8Rng, metrics: &mut TickMetrics) {
        if !Self::reference_systems_ready(state) {
            return;
        }
        let now = state.temporal_progress;
        let due: Vec<usize> = state
            .level
            .schedule
            .iter()
            .enumerate()
            .filter(|(_, inj)| !inj.executed && inj.time <= now)
            .map(|(i, _)| i)
            .collect();

        for index in due {
            let (packet_type, source) = {
                let inj = &state.level.schedule[index];
                (inj.packet_type, inj.source)
            };

            // Compatible connected ports first, then the rest.
            let Some(system) = state.level.system(source) else {
                continue;
            };
            let mut candidates: Vec<PortRef> = Vec::new();
            let mut fallback: Vec<PortRef> = Vec::new();
            for (i, port) in system.output_ports.iter().enumerate() {
                if !port.connected {
                    continue;
                }
                let port_ref = PortRef::output(source, i as u16);
                if port.is_compatible_with(packet_type) {
                    candidates.push(port_ref);
                } else {
                    fallback.push(port_ref);
                }
            }
            candidates.extend(fallback);

            let mut placed = false;
            for port_ref in candidates {
                let Some(wire_id) = state.level.wire_from_output(port_ref) else {
                    continue;
                };
                if state
                    .level
                    .wire(wire_id)
                    .map(|w| w.can_accept_packet())
                    != Some(true)
                {
                    continue;
                }
                let position = state
                    .level
                    .port(port_ref)
                    .map(|p| p.position)
                    .unwrap_or_default();
                let id = state.alloc_packet_id();
                state.insert_packet(Packet::new(id, packet_type, position));
                if load_packet_on_wire(state, rng, metrics, wire_id, id) {
                    state.level.schedule[index].executed = true;
                    metrics.injected += 1;
                    debug!(packet = %id, time = now, "injection placed on wire");
                    placed = true;
                } else {
                    state.packets.shift_remove(&id);
                }
                break;
            }
            if !placed {
                metrics.deferred_injections += 1;
                debug!(index, time = now, "injection deferred: no available wire");
            }
        }
    }

    /// Injection gate: at least one reference output and one reference
    /// input must be wired before packets flow.
    fn reference_systems_ready(state: &GameState) -> bool {
        let mut any_output = false;
        let mut any_input = false;
        for system in state.level.reference_systems() {
            any_output |= system.output_ports.iter().any(|p| p.connected);
            any_input |= system.input_ports.iter().any(|p| p.connected);
        }
        any_output && any_input
    }

    /// Remove finished packets from every holder, counting losses
    /// exactly once.
    fn cleanup(state: &mut GameState, metrics: &mut TickMetrics) {
        let finished: Vec<PacketId> = state
            .packets
            .values()
            .filter(|p| {
                !p.active || p.lost || p.noise_exceeded() || p.travel_time_exceeded()
            })
            .map(|p| p.id)
            .collect();
        if finished.is_empty() {
            return;
        }

        for id in &finished {
            let lost = {
                let Some(packet) = state.packet_mut(*id) else {
                    continue;
                };
                packet.active = false;
                if !packet.delivered && !packet.consumed {
                    packet.lost = true;
                }
                packet.lost
            };
            if lost {
                state.lost_packets += 1;
                metrics.lost += 1;
                debug!(packet = %id, "packet counted lost");
            }
        }

        // Detach from every holder.
        for wire in state.level.wires_mut() {
            if let Some(id) = wire.packet {
                if finished.contains(&id) {
                    wire.packet = None;
                }
            }
        }
        for system in state.level.systems_mut() {
            for port in system
                .input_ports
                .iter_mut()
                .chain(&mut system.output_ports)
            {
                if let Some(id) = port.packet {
                    if finished.contains(&id) {
                        port.packet = None;
                    }
                }
            }
            system.storage.retain(|id| !finished.contains(id));
            if let SystemKind::Merger { pending } = &mut system.kind {
                pending.retain(|id| !finished.contains(id));
            }
        }
        for id in &finished {
            state.packets.shift_remove(id);
        }
    }

    // ── Time travel ──────────────────────────────────────────────

    /// Jump the simulation to absolute time `target`.
    ///
    /// Rewinding restores the captured level and snapshot, reseeds the
    /// generator, and replays from zero; fast-forwarding substeps from
    /// the current time. Both use fixed substeps.
    pub fn time_travel_to(&mut self, target: f64) {
        if self.mode != Mode::Simulation {
            return;
        }
        let target = target.max(0.0);
        let now = self.state.temporal_progress;
        if (target - now).abs() < 1e-9 {
            return;
        }
        if target < now {
            info!(from = now, to = target, "rewinding");
            if let Some((level, snapshot)) = self.pristine.clone() {
                self.state.level = level;
                self.state.restore(snapshot);
            }
            self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
            self.metrics = TickMetrics::default();
            self.replay_to(target);
        } else {
            info!(from = now, to = target, "fast-forwarding");
            self.replay_to(target);
        }
    }

    fn replay_to(&mut self, target: f64) {
        while self.state.temporal_progress < target - 1e-9 {
            if self.state.game_over {
                break;
            }
            let dt = TIME_TRAVEL_STEP.min(target - self.state.temporal_progress);
            self.step(dt);
        }
    }

    // ── Editing operations ───────────────────────────────────────

    /// Create a wire between two ports.
    pub fn create_wire(&mut self, a: PortRef, b: PortRef) -> Result<WireId, EditError> {
        self.require_editing()?;
        wiring::create_wire(&mut self.state, a, b)
    }

    /// Remove a wire and refund its length.
    pub fn remove_wire(&mut self, id: WireId) -> Result<(), EditError> {
        self.require_editing()?;
        wiring::remove_wire(&mut self.state, id)
    }

    /// Add a bend to a wire near `position`; returns the bend index.
    pub fn add_bend(&mut self, id: WireId, position: Point2D) -> Result<usize, EditError> {
        self.require_editing()?;
        wiring::add_bend(&mut self.state, id, position)
    }

    /// Move an existing bend.
    pub fn move_bend(
        &mut self,
        id: WireId,
        index: usize,
        position: Point2D,
    ) -> Result<(), EditError> {
        self.require_editing()?;
        wiring::move_bend(&mut self.state, id, index, position)
    }

    /// Move a non-reference system, re-budgeting its wires.
    pub fn move_system(&mut self, id: SystemId, position: Point2D) -> Result<(), EditError> {
        self.require_editing()?;
        wiring::move_system(&mut self.state, id, position)
    }

    /// Merge two wires that share a common port.
    pub fn merge_wires(&mut self, first: WireId, second: WireId) -> Result<WireId, EditError> {
        self.require_editing()?;
        wiring::merge_wires(&mut self.state, first, second)
    }

    /// Switch smooth-curve path sampling, re-budgeting all wires.
    pub fn set_smooth_curves(&mut self, smooth: bool) {
        wiring::set_smooth_curves(&mut self.state, smooth);
    }

    fn require_editing(&self) -> Result<(), EditError> {
        if self.mode == Mode::Editing {
            Ok(())
        } else {
            Err(EditError::NotInEditingMode)
        }
    }

    // ── Abilities and failure injection ──────────────────────────

    /// Toggle an ability's engine-side effect.
    pub fn set_ability_active(&mut self, ability: Ability, active: bool) {
        self.abilities.set_active(ability, active);
    }

    /// Point Aergia at a wire.
    pub fn set_ability_target(&mut self, wire: WireId) {
        self.abilities.target_aergia(wire);
    }

    /// Permanently fail a system, returning its en-route packets.
    pub fn fail_system(&mut self, id: SystemId) {
        fail_system(&mut self.state, id);
    }

    // ── Queries ──────────────────────────────────────────────────

    /// The full mutable state, for tests and tooling.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Mutable state access for tooling; ordinary consumers should use
    /// the editing API and queries.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    /// Current coin balance.
    pub fn coins(&self) -> u64 {
        self.state.coins
    }

    /// Current packet-loss percentage.
    pub fn packet_loss_pct(&self) -> f64 {
        self.state.packet_loss_pct()
    }

    /// Packets delivered so far.
    pub fn delivered_count(&self) -> u64 {
        self.state.delivered_count()
    }

    /// Packets lost so far.
    pub fn lost_count(&self) -> u64 {
        self.state.lost_packets
    }

    /// Wire budget still available.
    pub fn remaining_wire_length(&self) -> f64 {
        self.state.remaining_wire_length
    }

    /// Whether the level has completed.
    pub fn is_level_complete(&self) -> bool {
        self.state.level_complete
    }

    /// Whether the simulation ended in failure.
    pub fn is_game_over(&self) -> bool {
        self.state.game_over
    }

    /// Why the simulation ended, if it has.
    pub fn game_over_reason(&self) -> GameOverReason {
        self.state.last_game_over_reason
    }

    /// Cumulative event counters.
    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::{PacketType, PortDirection, PortShape};
    use skein_geometry::Vec2D;
    use skein_model::{PacketInjection, Port};

    /// source → sink, square ports, one injection at t=1.
    fn simple_engine() -> Engine {
        let mut level = GameLevel::new("t1", "test", "", 1000.0, 30.0);
        let src = level.add_system("src", SystemKind::reference(), Point2D::new(0.0, 0.0));
        let dst = level.add_system("dst", SystemKind::reference(), Point2D::new(200.0, 0.0));
        level.system_mut(src).unwrap().output_ports.push(Port::new(
            PortShape::Square,
            PortDirection::Output,
            Point2D::new(0.0, 0.0),
            Vec2D::new(20.0, 0.0),
        ));
        level.system_mut(dst).unwrap().input_ports.push(Port::new(
            PortShape::Square,
            PortDirection::Input,
            Point2D::new(200.0, 0.0),
            Vec2D::new(-20.0, 0.0),
        ));
        level
            .schedule
            .push(PacketInjection::new(1.0, PacketType::SquareMessenger, src));
        let mut engine = Engine::new(level, EngineConfig::with_seed(1));
        let a = PortRef::output(SystemId(0), 0);
        let b = PortRef::input(SystemId(1), 0);
        engine.create_wire(a, b).unwrap();
        engine
    }

    fn run(engine: &mut Engine, seconds: f64) {
        let steps = (seconds / 0.05).round() as usize;
        for _ in 0..steps {
            engine.tick(0.05);
        }
    }

    #[test]
    fn ticks_do_nothing_in_editing_mode() {
        let mut engine = simple_engine();
        engine.tick(1.0);
        assert_eq!(engine.state().temporal_progress, 0.0);
    }

    #[test]
    fn single_packet_end_to_end() {
        let mut engine = simple_engine();
        engine.enter_simulation_mode();
        run(&mut engine, 10.0);
        assert_eq!(engine.delivered_count(), 1);
        assert_eq!(engine.lost_count(), 0);
        // One system entry at the sink: +2 coins.
        assert_eq!(engine.coins(), 2);
        assert_eq!(engine.metrics().injected, 1);
    }

    #[test]
    fn edits_are_frozen_during_simulation() {
        let mut engine = simple_engine();
        engine.enter_simulation_mode();
        let wire = engine.state().level.active_wire_ids()[0];
        assert_eq!(engine.remove_wire(wire), Err(EditError::NotInEditingMode));
    }

    #[test]
    fn injection_defers_without_a_ready_network() {
        let mut level = GameLevel::new("t2", "test", "", 1000.0, 30.0);
        let src = level.add_system("src", SystemKind::reference(), Point2D::new(0.0, 0.0));
        level.system_mut(src).unwrap().output_ports.push(Port::new(
            PortShape::Square,
            PortDirection::Output,
            Point2D::new(0.0, 0.0),
            Vec2D::new(20.0, 0.0),
        ));
        level
            .schedule
            .push(PacketInjection::new(0.5, PacketType::SquareMessenger, src));
        let mut engine = Engine::new(level, EngineConfig::with_seed(1));
        engine.enter_simulation_mode();
        run(&mut engine, 2.0);
        assert_eq!(engine.metrics().injected, 0);
        assert!(!engine.state().level.schedule[0].executed);
    }

    #[test]
    fn restart_restores_snapshot() {
        let mut engine = simple_engine();
        engine.enter_simulation_mode();
        run(&mut engine, 10.0);
        assert_eq!(engine.delivered_count(), 1);
        engine.restart_level();
        assert_eq!(engine.mode(), Mode::Editing);
        assert_eq!(engine.coins(), 0);
        assert_eq!(engine.delivered_count(), 0);
        assert_eq!(engine.state().level_timer, 0.0);
        assert!(!engine.state().level.schedule[0].executed);
        assert!(engine.state().packets.is_empty());
    }

    #[test]
    fn rewind_then_replay_reproduces_state() {
        let mut engine = simple_engine();
        engine.enter_simulation_mode();
        run(&mut engine, 6.0);
        let coins_at_6 = engine.coins();
        let delivered_at_6 = engine.delivered_count();

        engine.time_travel_to(2.0);
        assert!(engine.state().temporal_progress < 2.1);
        engine.time_travel_to(6.0);
        assert_eq!(engine.coins(), coins_at_6);
        assert_eq!(engine.delivered_count(), delivered_at_6);
    }

    #[test]
    fn time_travel_to_same_time_is_a_noop() {
        let mut engine = simple_engine();
        engine.enter_simulation_mode();
        run(&mut engine, 3.0);
        let before_coins = engine.coins();
        let before_time = engine.state().temporal_progress;
        engine.time_travel_to(before_time);
        assert_eq!(engine.coins(), before_coins);
        assert_eq!(engine.state().temporal_progress, before_time);
    }

    #[test]
    fn pause_stops_the_clock() {
        let mut engine = simple_engine();
        engine.enter_simulation_mode();
        engine.set_paused(true);
        engine.tick(1.0);
        assert_eq!(engine.state().temporal_progress, 0.0);
        engine.set_paused(false);
        engine.tick(1.0);
        assert!(engine.state().temporal_progress > 0.0);
    }
}
