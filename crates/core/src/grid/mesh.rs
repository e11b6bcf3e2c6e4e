//! Regular periodic voxel mesh covering the simulation box
//!
//! Mesh points are origin-anchored at `index * voxel_size`. The per-axis voxel
//! count is `round(box_length / voxel_size)`, so the effective mesh size can
//! differ slightly from the box it was built from. The mesh tiles space
//! periodically; every index arithmetic goes through [`GridIndex::wrapped`].

use crate::core_types::{Offset, Vec3};
use crate::error::KmcError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Integer voxel coordinate `(i, j, k)` along `(x, y, z)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[usize; 3]", into = "[usize; 3]")]
pub struct GridIndex {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl GridIndex {
    #[inline]
    pub const fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }

    /// Row-major position in a dense buffer: `(i * ny + j) * nz + k`
    #[inline]
    pub fn linear(self, dims: [usize; 3]) -> usize {
        (self.i * dims[1] + self.j) * dims[2] + self.k
    }

    /// Inverse of [`GridIndex::linear`]
    #[inline]
    pub fn from_linear(index: usize, dims: [usize; 3]) -> Self {
        let k = index % dims[2];
        let j = (index / dims[2]) % dims[1];
        let i = index / (dims[1] * dims[2]);
        Self { i, j, k }
    }

    /// Displace by `offset` and wrap back into `dims` on every axis
    #[inline]
    pub fn wrapped(self, offset: &Offset, dims: [usize; 3]) -> Self {
        let wrap = |base: usize, delta: i64, n: usize| -> usize {
            (base as i64 + delta).rem_euclid(n as i64) as usize
        };
        Self {
            i: wrap(self.i, offset.x, dims[0]),
            j: wrap(self.j, offset.y, dims[1]),
            k: wrap(self.k, offset.z, dims[2]),
        }
    }
}

impl From<[usize; 3]> for GridIndex {
    fn from(v: [usize; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<GridIndex> for [usize; 3] {
    fn from(g: GridIndex) -> Self {
        [g.i, g.j, g.k]
    }
}

impl fmt::Display for GridIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.i, self.j, self.k)
    }
}

/// Immutable voxel mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoxelMesh {
    /// Voxel counts `(nx, ny, nz)`
    dims: [usize; 3],
    /// Edge length of one voxel
    voxel_size: f64,
    /// `dims * voxel_size` per axis; the periodic box the mesh actually tiles
    mesh_size: Vec3,
}

impl VoxelMesh {
    /// Build the mesh for a periodic box
    ///
    /// # Errors
    ///
    /// Returns [`KmcError::InvalidMesh`] if the voxel size or any box length is
    /// not finite and positive, or if an axis rounds to zero voxels.
    pub fn new(box_lengths: Vec3, voxel_size: f64) -> Result<Self, KmcError> {
        if !(voxel_size.is_finite() && voxel_size > 0.0) {
            return Err(KmcError::InvalidMesh(format!(
                "voxel size must be finite and positive, got {voxel_size}"
            )));
        }

        let mut dims = [0usize; 3];
        for axis in 0..3 {
            let length = box_lengths[axis];
            if !(length.is_finite() && length > 0.0) {
                return Err(KmcError::InvalidMesh(format!(
                    "box length along axis {axis} must be finite and positive, got {length}"
                )));
            }
            let count = (length / voxel_size).round();
            if count < 1.0 {
                return Err(KmcError::InvalidMesh(format!(
                    "box length {length} along axis {axis} is shorter than one voxel ({voxel_size})"
                )));
            }
            dims[axis] = count as usize;
        }

        let mesh_size = Vec3::new(
            dims[0] as f64 * voxel_size,
            dims[1] as f64 * voxel_size,
            dims[2] as f64 * voxel_size,
        );
        if (mesh_size - box_lengths).amax() > 1e-6 {
            warn!(
                "Effective mesh size ({:.4}, {:.4}, {:.4}) differs from box ({:.4}, {:.4}, {:.4})",
                mesh_size.x, mesh_size.y, mesh_size.z, box_lengths.x, box_lengths.y, box_lengths.z
            );
        }

        info!(
            "Voxel mesh built: {}x{}x{} voxels, voxel_size={}",
            dims[0], dims[1], dims[2], voxel_size
        );

        Ok(Self {
            dims,
            voxel_size,
            mesh_size,
        })
    }

    /// Voxel counts `(nx, ny, nz)`
    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    #[inline]
    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    /// Effective periodic box covered by the mesh
    #[inline]
    pub fn mesh_size(&self) -> Vec3 {
        self.mesh_size
    }

    /// Total number of voxels
    #[inline]
    pub fn len(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian coordinate of a mesh point
    #[inline]
    pub fn point(&self, index: GridIndex) -> Vec3 {
        Vec3::new(
            index.i as f64 * self.voxel_size,
            index.j as f64 * self.voxel_size,
            index.k as f64 * self.voxel_size,
        )
    }

    /// All mesh points in row-major order
    pub fn points(&self) -> impl Iterator<Item = (GridIndex, Vec3)> + '_ {
        (0..self.len()).map(move |linear| {
            let index = GridIndex::from_linear(linear, self.dims);
            (index, self.point(index))
        })
    }

    /// Closest mesh point to `position` under periodic wrap-around, and the
    /// minimum-image distance to it
    ///
    /// On a rectilinear periodic grid the nearest point separates per axis,
    /// so rounding each coordinate to the nearest voxel is exact.
    pub fn nearest_site(&self, position: &Vec3) -> (GridIndex, f64) {
        let mut index = [0usize; 3];
        let mut distance_sq = 0.0;
        for axis in 0..3 {
            let n = self.dims[axis];
            let length = self.mesh_size[axis];
            let nearest = (position[axis] / self.voxel_size).round() as i64;
            let wrapped = nearest.rem_euclid(n as i64) as usize;

            let mut delta = position[axis] - wrapped as f64 * self.voxel_size;
            delta -= length * (delta / length).round();

            index[axis] = wrapped;
            distance_sq += delta * delta;
        }
        (GridIndex::from(index), distance_sq.sqrt())
    }
}
