//! Port-balance validation for loaded levels.

use std::collections::BTreeMap;
use std::fmt;

use skein_core::PortShape;
use skein_model::GameLevel;

/// Result of checking whether a level's ports can all be wired.
///
/// A level is fully wirable only when input and output counts balance
/// overall and per shape; imbalances are reported, not fatal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelValidationReport {
    /// Total input ports.
    pub input_ports: usize,
    /// Total output ports.
    pub output_ports: usize,
    /// Input port count per shape.
    pub input_shapes: BTreeMap<PortShape, usize>,
    /// Output port count per shape.
    pub output_shapes: BTreeMap<PortShape, usize>,
}

impl LevelValidationReport {
    /// Whether input and output counts balance overall.
    pub fn balanced(&self) -> bool {
        self.input_ports == self.output_ports
    }

    /// Whether every shape has matching input and output counts.
    pub fn shapes_balanced(&self) -> bool {
        PortShape::ALL.iter().all(|shape| {
            self.input_shapes.get(shape).copied().unwrap_or(0)
                == self.output_shapes.get(shape).copied().unwrap_or(0)
        })
    }
}

impl fmt::Display for LevelValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inputs / {} outputs ({})",
            self.input_ports,
            self.output_ports,
            if self.balanced() && self.shapes_balanced() {
                "balanced"
            } else {
                "imbalanced"
            }
        )
    }
}

pub(crate) fn validate(level: &GameLevel) -> LevelValidationReport {
    let mut report = LevelValidationReport {
        input_ports: 0,
        output_ports: 0,
        input_shapes: BTreeMap::new(),
        output_shapes: BTreeMap::new(),
    };
    for system in level.systems() {
        for port in &system.input_ports {
            report.input_ports += 1;
            *report.input_shapes.entry(port.shape).or_insert(0) += 1;
        }
        for port in &system.output_ports {
            report.output_ports += 1;
            *report.output_shapes.entry(port.shape).or_insert(0) += 1;
        }
    }
    report
}
