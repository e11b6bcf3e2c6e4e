//! Voxel grid, atom assignment and the live occupancy state

pub mod assign;
pub mod lattice_state;
pub mod mesh;

// Re-export main types
pub use assign::*;
pub use lattice_state::*;
pub use mesh::*;
