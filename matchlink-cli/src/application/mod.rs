pub mod simulation;

pub use simulation::{Simulation, SimulationOptions, SimulationReport};
