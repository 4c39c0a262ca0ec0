use crate::AgentId;
use thiserror::Error;

/// Errors emitted by the simulation core.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// A placement or move targeted a location outside the configured domain.
    #[error("position {position} lies outside the {width}x{height} domain")]
    OutOfBounds {
        position: String,
        width: String,
        height: String,
    },
    /// Configuration values that cannot be used to build a simulation.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// A reducer that needs at least one agent was evaluated on an empty population.
    #[error("reducer `{0}` requires a non-empty population")]
    EmptyPopulation(&'static str),
    /// The agent id has never been placed in the spatial index.
    #[error("agent {0} is not registered in the spatial index")]
    UnknownAgent(AgentId),
    #[error("i/o error while exporting: {0}")]
    Io(#[from] std::io::Error),
}

impl SimulationError {
    pub(crate) fn out_of_bounds(
        position: impl std::fmt::Debug,
        width: impl std::fmt::Display,
        height: impl std::fmt::Display,
    ) -> Self {
        SimulationError::OutOfBounds {
            position: format!("{:?}", position),
            width: width.to_string(),
            height: height.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;
