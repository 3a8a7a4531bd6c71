//! Simulation error kinds.

use crate::grid::{Group, Position};
use thiserror::Error;

/// Errors raised by the simulation engine.
///
/// Engine operations return [`anyhow::Result`]; use
/// `error.downcast_ref::<SimError>()` to match on the kind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no empty cell available to relocate into")]
    NoVacancy,

    #[error("simulation has not been set up")]
    NotSetUp,

    #[error("no agent of group {group:?} at {pos:?}")]
    StaleAgent { pos: Position, group: Group },

    #[error("no equilibrium reached after {steps} steps")]
    NotConverged { steps: usize },
}
