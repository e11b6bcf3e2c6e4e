//! Per-step observation of the vacancy neighborhood

use super::environment::{EnvironmentMask, LocalEnvironment, LocalWindow};
use super::symmetry::{FeatureMaps, PathSet, NUM_PATHS};
use crate::core_types::{AtomId, EMPTY_SITE};
use crate::error::KmcError;
use crate::grid::{GridIndex, LatticeState, VoxelMesh};

/// Everything the predictor and the event engine need for one step
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Vacancy site the environment was centered on
    pub center: GridIndex,
    pub environment: LocalEnvironment,
    /// Candidate jump targets, aligned with [`diffusion_directions`](super::diffusion_directions)
    pub neighbor_ids: [AtomId; NUM_PATHS],
    pub features: FeatureMaps,
}

/// Static mask and path set, built once from the initial lattice
#[derive(Debug, Clone)]
pub struct LatticeEncoder {
    mesh: VoxelMesh,
    mask: EnvironmentMask,
    paths: PathSet,
}

impl LatticeEncoder {
    /// Detect the mask around the initial vacancy and precompute alignments
    ///
    /// # Errors
    ///
    /// Propagates [`KmcError::WindowTooSmall`], [`KmcError::MissingNeighbor`]
    /// and vacancy lookup failures.
    pub fn new(mesh: VoxelMesh, state: &LatticeState, cutoff: f64) -> Result<Self, KmcError> {
        let window = LocalWindow::from_cutoff(cutoff, mesh.voxel_size())?;
        let mask = EnvironmentMask::detect(state, window, cutoff, mesh.voxel_size())?;
        let paths = PathSet::new(&mask)?;
        Ok(Self { mesh, mask, paths })
    }

    #[inline]
    pub fn mesh(&self) -> &VoxelMesh {
        &self.mesh
    }

    #[inline]
    pub fn mask(&self) -> &EnvironmentMask {
        &self.mask
    }

    #[inline]
    pub fn paths(&self) -> &PathSet {
        &self.paths
    }

    /// Extract the environment around the current vacancy, read the eight
    /// neighbor ids and build the aligned feature maps
    ///
    /// # Errors
    ///
    /// Returns [`KmcError::VacancyNotFound`] on corrupted state and
    /// [`KmcError::MissingNeighbor`] if a first-neighbor voxel is empty.
    pub fn observe(&self, state: &LatticeState) -> Result<Observation, KmcError> {
        let center = state.vacancy_site()?;
        let environment = self.mask.extract(state, center);

        let mut neighbor_ids = [EMPTY_SITE; NUM_PATHS];
        for (slot, direction) in neighbor_ids.iter_mut().zip(self.paths.directions()) {
            let id = environment.id_at(direction);
            if id == EMPTY_SITE {
                return Err(KmcError::MissingNeighbor(*direction));
            }
            *slot = id;
        }

        let features = self.paths.feature_maps(&environment);

        Ok(Observation {
            center,
            environment,
            neighbor_ids,
            features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{AtomRecord, Vec3};
    use crate::grid::assign_atoms;

    /// 4x4x4 bcc cells of lattice constant 2 on a unit voxel mesh
    fn bcc_state(vacancy_id: AtomId) -> (VoxelMesh, LatticeState) {
        let mut atoms = Vec::new();
        let mut id = 1;
        for i in 0..4 {
            for j in 0..4 {
                for k in 0..4 {
                    for basis in [0.0, 1.0] {
                        let position = Vec3::new(
                            2.0 * i as f64 + basis,
                            2.0 * j as f64 + basis,
                            2.0 * k as f64 + basis,
                        );
                        let atom_type = if id == vacancy_id { 0 } else { 1 + id % 2 };
                        atoms.push(AtomRecord::new(id, atom_type, position));
                        id += 1;
                    }
                }
            }
        }
        let mesh = VoxelMesh::new(Vec3::new(8.0, 8.0, 8.0), 1.0).unwrap();
        let grids = assign_atoms(&atoms, &mesh).unwrap();
        let state = LatticeState::new(grids, vacancy_id).unwrap();
        (mesh, state)
    }

    #[test]
    fn test_encoder_reads_neighbors() {
        // id 1 sits at the origin
        let (mesh, state) = bcc_state(1);
        let encoder = LatticeEncoder::new(mesh, &state, 2.9).unwrap();
        // first shell (8) + second shell (6) + (2,2,0)-type (12)
        assert_eq!(encoder.mask().len(), 26);

        let observation = encoder.observe(&state).unwrap();
        assert_eq!(observation.center, GridIndex::new(0, 0, 0));

        let dims = state.dims();
        for (id, direction) in observation
            .neighbor_ids
            .iter()
            .zip(encoder.paths().directions())
        {
            let site = GridIndex::new(0, 0, 0).wrapped(direction, dims);
            assert_eq!(*id, state.id_at(site));
        }
        // (-1, -1, -1) wraps to (7, 7, 7)
        assert_eq!(
            observation.neighbor_ids[7],
            state.id_at(GridIndex::new(7, 7, 7))
        );
        assert_eq!(observation.features.len(), NUM_PATHS);
    }

    #[test]
    fn test_observation_follows_vacancy() {
        let (mesh, mut state) = bcc_state(1);
        let encoder = LatticeEncoder::new(mesh, &state, 2.9).unwrap();

        let first = encoder.observe(&state).unwrap();
        let jump_id = first.neighbor_ids[0];
        state.swap(1, jump_id).unwrap();

        let second = encoder.observe(&state).unwrap();
        assert_eq!(second.center, GridIndex::new(1, 1, 1));
        // The atom that jumped now sits on the (-1, -1, -1) neighbor
        assert_eq!(second.neighbor_ids[7], jump_id);
    }

    #[test]
    fn test_window_too_small_for_cutoff() {
        let (mesh, state) = bcc_state(1);
        assert!(matches!(
            LatticeEncoder::new(mesh, &state, 1.2),
            Err(KmcError::WindowTooSmall { .. })
        ));
    }
}
