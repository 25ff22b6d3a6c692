//! Property tests for the universal simulation invariants.

use proptest::prelude::*;
use skein_core::{PacketId, PacketType};
use skein_engine::{Engine, EngineConfig};
use skein_model::SystemKind;
use skein_test_utils::{chain_level, chain_ports, ChainSpec};

/// Every active packet must sit in exactly one holder: one wire slot,
/// one port slot, one storage entry, or one merger pool entry.
fn assert_location_exclusive(engine: &Engine) {
    let state = engine.state();
    for packet in state.packets.values().filter(|p| p.active) {
        let mut holders = 0usize;
        for wire in state.level.wires() {
            if wire.packet == Some(packet.id) {
                holders += 1;
            }
        }
        for system in state.level.systems() {
            for port in system.input_ports.iter().chain(&system.output_ports) {
                if port.packet == Some(packet.id) {
                    holders += 1;
                }
            }
            holders += system.storage.iter().filter(|id| **id == packet.id).count();
            if let SystemKind::Merger { pending } = &system.kind {
                holders += pending.iter().filter(|id| **id == packet.id).count();
            }
        }
        assert_eq!(
            holders, 1,
            "packet {} held by {holders} locations",
            packet.id
        );
    }
}

/// Wires and ports hold at most one packet (structurally guaranteed;
/// checked against duplicated ids across holders).
fn assert_no_shared_ids(engine: &Engine) {
    let state = engine.state();
    let mut seen: Vec<PacketId> = Vec::new();
    let mut claim = |id: PacketId| {
        assert!(!seen.contains(&id), "packet {id} held twice");
        seen.push(id);
    };
    for wire in state.level.wires() {
        if let Some(id) = wire.packet {
            claim(id);
        }
    }
    for system in state.level.systems() {
        for port in system.input_ports.iter().chain(&system.output_ports) {
            if let Some(id) = port.packet {
                claim(id);
            }
        }
        for id in &system.storage {
            claim(*id);
        }
        if let SystemKind::Merger { pending } = &system.kind {
            for id in pending {
                claim(*id);
            }
        }
    }
}

fn arb_packet_type() -> impl Strategy<Value = PacketType> {
    prop::sample::select(vec![
        PacketType::SquareMessenger,
        PacketType::TriangleMessenger,
        PacketType::SmallMessenger,
        PacketType::Confidential,
        PacketType::Trojan,
    ])
}

fn arb_relay() -> impl Strategy<Value = u8> {
    0u8..5
}

fn relay_kind(tag: u8) -> SystemKind {
    match tag {
        0 => SystemKind::Normal,
        1 => SystemKind::Vpn,
        2 => SystemKind::Saboteur,
        3 => SystemKind::Spy,
        _ => SystemKind::anti_trojan(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn packets_live_in_exactly_one_place(
        seed in 0u64..1000,
        relay in arb_relay(),
        schedule in prop::collection::vec((0.5f64..8.0, arb_packet_type()), 1..5),
    ) {
        let mut spec = ChainSpec::source_relay_sink();
        spec.kinds[1] = relay_kind(relay);
        spec.injections = schedule;
        let (level, ids) = chain_level(&spec);
        let mut engine = Engine::new(level, EngineConfig::with_seed(seed));
        for i in 0..ids.len() - 1 {
            let (out, inp) = chain_ports(&ids, i);
            engine.create_wire(out, inp).unwrap();
        }
        engine.enter_simulation_mode();

        for _ in 0..300 {
            engine.tick(0.05);
            assert_location_exclusive(&engine);
            assert_no_shared_ids(&engine);
        }
    }

    #[test]
    fn loss_percentage_stays_in_range(
        seed in 0u64..1000,
        schedule in prop::collection::vec((0.5f64..6.0, arb_packet_type()), 1..6),
    ) {
        let mut spec = ChainSpec::source_relay_sink();
        spec.kinds[1] = SystemKind::Saboteur;
        spec.injections = schedule;
        let (level, ids) = chain_level(&spec);
        let mut engine = Engine::new(level, EngineConfig::with_seed(seed));
        for i in 0..ids.len() - 1 {
            let (out, inp) = chain_ports(&ids, i);
            engine.create_wire(out, inp).unwrap();
        }
        engine.enter_simulation_mode();

        for _ in 0..400 {
            engine.tick(0.05);
            let pct = engine.packet_loss_pct();
            prop_assert!((0.0..=100.0).contains(&pct));
        }
        // Whatever happened, every scheduled packet is accounted for at
        // most once.
        let total = engine.state().total_injected() as u64;
        prop_assert!(engine.lost_count() + engine.delivered_count() <= total);
    }

    #[test]
    fn delivered_count_is_monotone(
        seed in 0u64..1000,
        schedule in prop::collection::vec((0.5f64..6.0, arb_packet_type()), 1..4),
    ) {
        let mut spec = ChainSpec::source_relay_sink();
        spec.injections = schedule;
        let (level, ids) = chain_level(&spec);
        let mut engine = Engine::new(level, EngineConfig::with_seed(seed));
        for i in 0..ids.len() - 1 {
            let (out, inp) = chain_ports(&ids, i);
            engine.create_wire(out, inp).unwrap();
        }
        engine.enter_simulation_mode();

        let mut last = 0;
        for _ in 0..300 {
            engine.tick(0.05);
            let delivered = engine.delivered_count();
            prop_assert!(delivered >= last);
            last = delivered;
        }
    }
}
