//! Vacancy KMC Core Library
//!
//! Kinetic Monte Carlo for a single vacancy diffusing through a bcc alloy,
//! with migration barriers supplied by a learned predictor.
//!
//! ## Pipeline
//!
//! At start-up the atoms are snapped onto a periodic voxel mesh and indexed
//! in a [`LatticeState`]. Every step then:
//! 1. extracts the masked neighborhood of the vacancy ([`encoding`])
//! 2. aligns it onto each of the eight body-diagonal jump directions
//! 3. asks the [`BarrierPredictor`] for eight barriers
//! 4. samples a jump and a residence time and swaps the vacancy ([`kmc`])
//!
//! Runs are driven by [`Simulation`], configured from a [`SimulationConfig`]
//! and recorded as an event log from which [`trajectory`] rebuilds frames.

// Core types and utilities
pub mod core_types;
pub mod error;

// Lattice and encoding
pub mod encoding;
pub mod grid;

// Event selection and barriers
pub mod kmc;
pub mod predictor;

// Runs, input and output
pub mod config;
pub mod io;
pub mod simulation;
pub mod structure;
pub mod trajectory;

// Re-export core types
pub use core_types::{AtomId, AtomRecord, AtomType, Configuration, ElectronVolts, Hertz, Kelvin};
pub use core_types::{Offset, Vec3};
pub use error::KmcError;

// Re-export lattice and encoding types
pub use encoding::{FeatureMaps, LatticeEncoder, Observation, NUM_PATHS};
pub use grid::{GridIndex, LatticeState, VoxelMesh};

// Re-export simulation types
pub use config::{ConfigError, SimulationConfig, VacancySelection};
pub use kmc::{JumpEvent, KmcEngine, RateParams};
pub use predictor::{BarrierPredictor, ConstantPredictor, MlpPredictor};
pub use simulation::{RunSummary, Simulation, SimulationError, SimulationParams};
pub use trajectory::{reconstruct, AtomSelection};
