pub mod application;
pub mod infrastructure;

pub use application::{Simulation, SimulationOptions, SimulationReport};
pub use infrastructure::{load_session_config, CliError, LogConfig, Result};
