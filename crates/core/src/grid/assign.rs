//! Snapping continuous atom coordinates onto the voxel mesh
//!
//! Each atom goes to its periodic nearest mesh point. The lookup is a pure map
//! over the atom list and runs on the rayon pool; the dense grids are filled
//! sequentially afterwards so collisions are reported deterministically.

use crate::core_types::{AtomId, AtomRecord, AtomType, EMPTY_SITE};
use crate::error::KmcError;
use crate::grid::{GridIndex, VoxelMesh};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::info;

/// Maximum distance between an atom and its mesh point, in box length units
pub const SNAP_TOLERANCE: f64 = 1e-3;

/// Dense id and type grids shaped like the mesh. Empty voxels hold 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrids {
    dims: [usize; 3],
    ids: Vec<AtomId>,
    types: Vec<AtomType>,
}

impl OccupancyGrids {
    /// Wrap raw row-major buffers
    ///
    /// # Errors
    ///
    /// Returns [`KmcError::GridShape`] if either buffer length differs from
    /// `nx * ny * nz`.
    pub fn from_raw(
        dims: [usize; 3],
        ids: Vec<AtomId>,
        types: Vec<AtomType>,
    ) -> Result<Self, KmcError> {
        let expected = dims[0] * dims[1] * dims[2];
        for found in [ids.len(), types.len()] {
            if found != expected {
                return Err(KmcError::GridShape { expected, found });
            }
        }
        Ok(Self { dims, ids, types })
    }

    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Row-major id buffer
    #[inline]
    pub fn ids(&self) -> &[AtomId] {
        &self.ids
    }

    /// Row-major type buffer
    #[inline]
    pub fn types(&self) -> &[AtomType] {
        &self.types
    }

    #[inline]
    pub fn id_at(&self, index: GridIndex) -> AtomId {
        self.ids[index.linear(self.dims)]
    }

    #[inline]
    pub fn type_at(&self, index: GridIndex) -> AtomType {
        self.types[index.linear(self.dims)]
    }

    /// Number of occupied voxels
    pub fn occupied(&self) -> usize {
        self.ids.iter().filter(|&&id| id != EMPTY_SITE).count()
    }

    pub(crate) fn into_parts(self) -> ([usize; 3], Vec<AtomId>, Vec<AtomType>) {
        (self.dims, self.ids, self.types)
    }
}

/// Assign every atom to its nearest mesh point
///
/// # Errors
///
/// - [`KmcError::InvalidAtomId`] if an atom carries id 0
/// - [`KmcError::DuplicateAtomId`] if an id repeats
/// - [`KmcError::GeometryMismatch`] if an atom is not within
///   [`SNAP_TOLERANCE`] of a mesh point
/// - [`KmcError::DuplicateSite`] if two atoms land on the same voxel
pub fn assign_atoms(atoms: &[AtomRecord], mesh: &VoxelMesh) -> Result<OccupancyGrids, KmcError> {
    let snapped: Vec<(GridIndex, f64)> = atoms
        .par_iter()
        .map(|atom| mesh.nearest_site(&atom.position))
        .collect();

    let dims = mesh.dims();
    let mut ids = vec![EMPTY_SITE; mesh.len()];
    let mut types = vec![0; mesh.len()];
    let mut seen = FxHashSet::default();
    seen.reserve(atoms.len());

    for (atom, &(index, distance)) in atoms.iter().zip(&snapped) {
        if atom.id == EMPTY_SITE {
            return Err(KmcError::InvalidAtomId);
        }
        if !seen.insert(atom.id) {
            return Err(KmcError::DuplicateAtomId(atom.id));
        }
        if distance.is_nan() || distance >= SNAP_TOLERANCE {
            return Err(KmcError::GeometryMismatch {
                id: atom.id,
                distance,
            });
        }

        let linear = index.linear(dims);
        if ids[linear] != EMPTY_SITE {
            return Err(KmcError::DuplicateSite {
                index,
                first: ids[linear],
                second: atom.id,
            });
        }
        ids[linear] = atom.id;
        types[linear] = atom.atom_type;
    }

    info!(
        "Assigned {} atoms onto {} voxels",
        atoms.len(),
        mesh.len()
    );

    Ok(OccupancyGrids { dims, ids, types })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Vec3;

    fn mesh_10() -> VoxelMesh {
        VoxelMesh::new(Vec3::new(10.0, 10.0, 10.0), 1.0).unwrap()
    }

    #[test]
    fn test_assign_places_atoms() {
        let atoms = vec![
            AtomRecord::new(1, 2, Vec3::new(0.0, 0.0, 0.0)),
            AtomRecord::new(2, 1, Vec3::new(3.0, 4.0, 5.0)),
            AtomRecord::new(3, 1, Vec3::new(9.9999, 0.0, 1.0)),
        ];
        let grids = assign_atoms(&atoms, &mesh_10()).unwrap();

        assert_eq!(grids.occupied(), 3);
        assert_eq!(grids.id_at(GridIndex::new(0, 0, 0)), 1);
        assert_eq!(grids.type_at(GridIndex::new(0, 0, 0)), 2);
        assert_eq!(grids.id_at(GridIndex::new(3, 4, 5)), 2);
        // Wrapped across the upper x boundary
        assert_eq!(grids.id_at(GridIndex::new(0, 0, 1)), 3);
        assert_eq!(grids.id_at(GridIndex::new(1, 1, 1)), EMPTY_SITE);
    }

    #[test]
    fn test_offlattice_atom_is_fatal() {
        let atoms = vec![AtomRecord::new(7, 1, Vec3::new(2.01, 0.0, 0.0))];
        match assign_atoms(&atoms, &mesh_10()) {
            Err(KmcError::GeometryMismatch { id, distance }) => {
                assert_eq!(id, 7);
                assert!((distance - 0.01).abs() < 1e-9);
            }
            other => panic!("expected geometry mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_nan_position_is_fatal() {
        let atoms = vec![AtomRecord::new(4, 1, Vec3::new(f64::NAN, 0.0, 0.0))];
        match assign_atoms(&atoms, &mesh_10()) {
            Err(KmcError::GeometryMismatch { id, distance }) => {
                assert_eq!(id, 4);
                assert!(distance.is_nan());
            }
            other => panic!("expected geometry mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_collisions_and_bad_ids() {
        let mesh = mesh_10();

        let colliding = vec![
            AtomRecord::new(1, 1, Vec3::new(1.0, 1.0, 1.0)),
            AtomRecord::new(2, 1, Vec3::new(1.0, 1.0, 1.0)),
        ];
        assert_eq!(
            assign_atoms(&colliding, &mesh),
            Err(KmcError::DuplicateSite {
                index: GridIndex::new(1, 1, 1),
                first: 1,
                second: 2,
            })
        );

        let zero_id = vec![AtomRecord::new(0, 1, Vec3::zeros())];
        assert_eq!(assign_atoms(&zero_id, &mesh), Err(KmcError::InvalidAtomId));

        let repeated = vec![
            AtomRecord::new(4, 1, Vec3::new(1.0, 0.0, 0.0)),
            AtomRecord::new(4, 1, Vec3::new(2.0, 0.0, 0.0)),
        ];
        assert_eq!(
            assign_atoms(&repeated, &mesh),
            Err(KmcError::DuplicateAtomId(4))
        );
    }

    #[test]
    fn test_from_raw_checks_shape() {
        assert!(OccupancyGrids::from_raw([1, 1, 3], vec![1, 2, 3], vec![1, 0, 1]).is_ok());
        assert_eq!(
            OccupancyGrids::from_raw([1, 1, 3], vec![1, 2], vec![1, 0, 1]),
            Err(KmcError::GridShape {
                expected: 3,
                found: 2
            })
        );
    }
}
