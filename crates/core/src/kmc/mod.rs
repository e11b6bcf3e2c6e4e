//! Kinetic Monte Carlo event selection

pub mod engine;

pub use engine::{JumpEvent, KmcEngine, RateParams};
