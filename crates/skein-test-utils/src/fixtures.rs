//! Level fixtures.

use skein_core::{PacketType, PortDirection, PortRef, PortShape, SystemId};
use skein_geometry::{Point2D, Vec2D};
use skein_model::{GameLevel, PacketInjection, Port, SystemKind};

/// Horizontal spacing between chain systems, in pixels.
pub const CHAIN_SPACING: f64 = 200.0;

/// Offset of a port from its system centre, in pixels.
pub const PORT_OFFSET: f64 = 20.0;

/// Description of one chain: system kinds in order, port shapes used
/// throughout, and scheduled injections.
pub struct ChainSpec {
    /// System kinds from source to sink. The first and last should be
    /// reference systems for a playable level.
    pub kinds: Vec<SystemKind>,
    /// Shape given to every port in the chain unless overridden.
    pub shape: PortShape,
    /// Per-system input-port shape overrides: `(system index, shape)`.
    pub input_overrides: Vec<(usize, PortShape)>,
    /// Per-system output-port shape overrides: `(system index, shape)`.
    pub output_overrides: Vec<(usize, PortShape)>,
    /// Injections: `(time, packet type)`, all from the first system.
    pub injections: Vec<(f64, PacketType)>,
    /// Wire budget.
    pub wire_budget: f64,
    /// Level duration in seconds.
    pub duration: f64,
}

impl ChainSpec {
    /// A reference → normal → reference chain of square ports.
    pub fn source_relay_sink() -> Self {
        Self {
            kinds: vec![
                SystemKind::reference(),
                SystemKind::Normal,
                SystemKind::reference(),
            ],
            shape: PortShape::Square,
            input_overrides: Vec::new(),
            output_overrides: Vec::new(),
            injections: vec![(2.0, PacketType::SquareMessenger)],
            wire_budget: 5_000.0,
            duration: 60.0,
        }
    }
}

/// Build an unwired chain level from a spec, returning the level and the
/// system ids in order.
///
/// Every system except the last gets one output port; every system
/// except the first gets one input port. Ports sit `PORT_OFFSET` px
/// left/right of the system centre.
pub fn chain_level(spec: &ChainSpec) -> (GameLevel, Vec<SystemId>) {
    let mut level = GameLevel::new("fixture", "fixture", "", spec.wire_budget, spec.duration);
    let mut ids = Vec::with_capacity(spec.kinds.len());

    for (index, kind) in spec.kinds.iter().enumerate() {
        let center = Point2D::new(index as f64 * CHAIN_SPACING, 0.0);
        let id = level.add_system(format!("sys-{index}"), kind.clone(), center);
        let input_shape = spec
            .input_overrides
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, s)| *s)
            .unwrap_or(spec.shape);
        let output_shape = spec
            .output_overrides
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, s)| *s)
            .unwrap_or(spec.shape);
        let node = level.system_mut(id).expect("freshly added system");
        if index > 0 {
            node.input_ports.push(Port::new(
                input_shape,
                PortDirection::Input,
                center,
                Vec2D::new(-PORT_OFFSET, 0.0),
            ));
        }
        if index + 1 < spec.kinds.len() {
            node.output_ports.push(Port::new(
                output_shape,
                PortDirection::Output,
                center,
                Vec2D::new(PORT_OFFSET, 0.0),
            ));
        }
        ids.push(id);
    }

    if let Some(&first) = ids.first() {
        for (time, packet_type) in &spec.injections {
            level
                .schedule
                .push(PacketInjection::new(*time, *packet_type, first));
        }
    }

    (level, ids)
}

/// Port references for wiring consecutive chain systems: the output of
/// `from` and the input of `from + 1`.
pub fn chain_ports(ids: &[SystemId], from: usize) -> (PortRef, PortRef) {
    (
        PortRef::output(ids[from], 0),
        PortRef::input(ids[from + 1], 0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_has_expected_ports() {
        let (level, ids) = chain_level(&ChainSpec::source_relay_sink());
        assert_eq!(ids.len(), 3);
        assert!(level.system(ids[0]).unwrap().input_ports.is_empty());
        assert_eq!(level.system(ids[0]).unwrap().output_ports.len(), 1);
        assert_eq!(level.system(ids[1]).unwrap().input_ports.len(), 1);
        assert_eq!(level.system(ids[1]).unwrap().output_ports.len(), 1);
        assert!(level.system(ids[2]).unwrap().output_ports.is_empty());
        assert_eq!(level.schedule.len(), 1);
        assert_eq!(level.source_systems(), vec![ids[0]]);
    }

    #[test]
    fn overrides_change_input_shapes() {
        let mut spec = ChainSpec::source_relay_sink();
        spec.input_overrides.push((1, PortShape::Triangle));
        let (level, ids) = chain_level(&spec);
        assert_eq!(
            level.system(ids[1]).unwrap().input_ports[0].shape,
            PortShape::Triangle
        );
        assert_eq!(
            level.system(ids[2]).unwrap().input_ports[0].shape,
            PortShape::Square
        );
    }
}
