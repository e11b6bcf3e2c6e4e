//! Encoding of the vacancy neighborhood into predictor input
//!
//! - [`environment`]: window geometry, static mask, periodic extraction
//! - [`symmetry`]: the eight body-diagonal paths and their canonical alignment
//! - [`encoder`]: both stages wired together for one simulation step

pub mod encoder;
pub mod environment;
pub mod symmetry;

pub use encoder::{LatticeEncoder, Observation};
pub use environment::{EnvironmentMask, LocalCube, LocalEnvironment, LocalWindow};
pub use symmetry::{
    align_offsets, alignment_angle, diffusion_directions, DiffusionPath, FeatureMaps, PathSet,
    NUM_PATHS,
};
