use thiserror::Error;

use crate::grid_field::FieldKind;

/// Failures of the solver core. All of them happen during initialization;
/// a running simulation step never returns an error.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("could not allocate {cells} cells for the {kind:?} field")]
    ResourceAllocation { kind: FieldKind, cells: usize },

    #[error("a {n}x{n} grid has more cells than can be addressed")]
    GridTooLarge { n: usize },

    #[error("invalid simulation parameters: {0}")]
    InvalidConfig(String),
}
