//! Vector type aliases for positions and lattice offsets.

use nalgebra::Vector3;

/// 3D vector type for continuous positions and box lengths.
///
/// This is a simple alias for `nalgebra::Vector3<f64>`, used for atom
/// coordinates read from dumps and for mesh extents.
pub type Vec3 = Vector3<f64>;

/// Integer displacement between two voxels, in voxel units.
///
/// Mask entries, diffusion directions and aligned coordinates are all offsets
/// relative to the vacancy.
pub type Offset = Vector3<i64>;
