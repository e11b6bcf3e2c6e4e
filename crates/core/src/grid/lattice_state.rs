//! Live occupancy of the voxel lattice
//!
//! Three views of the same occupancy are kept in lockstep:
//! - `id -> (type, index)`
//! - `index -> (id, type)`
//! - dense row-major id and type grids
//!
//! Restricted to occupied voxels the views are exact inverses. The only
//! mutation is [`LatticeState::swap`], which permutes all of them together, so
//! the set of ids and the set of occupied voxels never change over a run.

use crate::core_types::{AtomId, AtomType, EMPTY_SITE, VACANCY_TYPE};
use crate::error::KmcError;
use crate::grid::{GridIndex, OccupancyGrids};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Where one atom sits and what species it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub atom_type: AtomType,
    pub index: GridIndex,
}

/// Snapshot of `id -> (type, index)`, ordered by id
pub type SiteMap = BTreeMap<AtomId, SiteRecord>;

/// Bijective id/site bookkeeping for the single-vacancy lattice
#[derive(Debug, Clone)]
pub struct LatticeState {
    dims: [usize; 3],
    id_grid: Vec<AtomId>,
    type_grid: Vec<AtomType>,
    by_id: FxHashMap<AtomId, (AtomType, GridIndex)>,
    by_index: FxHashMap<GridIndex, (AtomId, AtomType)>,
    vacancy_id: AtomId,
}

impl LatticeState {
    /// Scan every voxel and index the occupied ones
    ///
    /// # Errors
    ///
    /// - [`KmcError::VacancyNotFound`] if `vacancy_id` is not on the grid
    /// - [`KmcError::VacancyCount`] unless the vacancy is the one and only
    ///   occupied voxel of type 0
    pub fn new(grids: OccupancyGrids, vacancy_id: AtomId) -> Result<Self, KmcError> {
        let (dims, id_grid, type_grid) = grids.into_parts();

        let occupied = id_grid.iter().filter(|&&id| id != EMPTY_SITE).count();
        let mut by_id = FxHashMap::default();
        let mut by_index = FxHashMap::default();
        by_id.reserve(occupied);
        by_index.reserve(occupied);

        let mut type_zero = Vec::new();
        for (linear, (&id, &atom_type)) in id_grid.iter().zip(&type_grid).enumerate() {
            if id == EMPTY_SITE {
                continue;
            }
            let index = GridIndex::from_linear(linear, dims);
            if by_id.insert(id, (atom_type, index)).is_some() {
                return Err(KmcError::DuplicateAtomId(id));
            }
            by_index.insert(index, (id, atom_type));
            if atom_type == VACANCY_TYPE {
                type_zero.push(id);
            }
        }

        if !by_id.contains_key(&vacancy_id) {
            return Err(KmcError::VacancyNotFound(vacancy_id));
        }
        if type_zero != [vacancy_id] {
            return Err(KmcError::VacancyCount {
                vacancy_id,
                type_zero,
            });
        }

        info!(
            "Lattice state built: {} atoms, vacancy {} at {}",
            by_id.len(),
            vacancy_id,
            by_id[&vacancy_id].1
        );

        Ok(Self {
            dims,
            id_grid,
            type_grid,
            by_id,
            by_index,
            vacancy_id,
        })
    }

    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    #[inline]
    pub fn vacancy_id(&self) -> AtomId {
        self.vacancy_id
    }

    /// Number of atoms, vacancy included
    #[inline]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// `(type, index)` of an atom
    #[inline]
    pub fn lookup_by_id(&self, id: AtomId) -> Option<(AtomType, GridIndex)> {
        self.by_id.get(&id).copied()
    }

    /// `(id, type)` of the atom on a voxel, `None` for empty voxels
    #[inline]
    pub fn lookup_by_coordinate(&self, index: GridIndex) -> Option<(AtomId, AtomType)> {
        self.by_index.get(&index).copied()
    }

    /// Current voxel of the vacancy
    ///
    /// # Errors
    ///
    /// Returns [`KmcError::VacancyNotFound`] if the vacancy id has vanished,
    /// which only happens on corrupted state.
    pub fn vacancy_site(&self) -> Result<GridIndex, KmcError> {
        self.lookup_by_id(self.vacancy_id)
            .map(|(_, index)| index)
            .ok_or(KmcError::VacancyNotFound(self.vacancy_id))
    }

    /// Dense-grid id at a voxel (0 when empty)
    #[inline]
    pub fn id_at(&self, index: GridIndex) -> AtomId {
        self.id_grid[index.linear(self.dims)]
    }

    /// Dense-grid type at a voxel (0 when empty or vacancy)
    #[inline]
    pub fn type_at(&self, index: GridIndex) -> AtomType {
        self.type_grid[index.linear(self.dims)]
    }

    /// Row-major id grid
    #[inline]
    pub fn id_grid(&self) -> &[AtomId] {
        &self.id_grid
    }

    /// Row-major type grid
    #[inline]
    pub fn type_grid(&self) -> &[AtomType] {
        &self.type_grid
    }

    /// All atom ids, in no particular order
    pub fn ids(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.by_id.keys().copied()
    }

    /// Exchange the sites of `vacancy_id` and `jump_id`
    ///
    /// Afterwards `vacancy_id` maps to `(vacancy_type, jump_index)` and
    /// `jump_id` maps to `(jump_type, vacancy_index)`. The inverse map and both
    /// dense grids receive the same exchange.
    ///
    /// # Errors
    ///
    /// - [`KmcError::VacancyNotFound`] if `vacancy_id` is unknown
    /// - [`KmcError::UnknownAtom`] if `jump_id` is unknown
    pub fn swap(&mut self, vacancy_id: AtomId, jump_id: AtomId) -> Result<(), KmcError> {
        let (vacancy_type, vacancy_index) = self
            .lookup_by_id(vacancy_id)
            .ok_or(KmcError::VacancyNotFound(vacancy_id))?;
        let (jump_type, jump_index) = self
            .lookup_by_id(jump_id)
            .ok_or(KmcError::UnknownAtom(jump_id))?;

        self.by_id.insert(vacancy_id, (vacancy_type, jump_index));
        self.by_id.insert(jump_id, (jump_type, vacancy_index));

        self.by_index.insert(vacancy_index, (jump_id, jump_type));
        self.by_index.insert(jump_index, (vacancy_id, vacancy_type));

        let v = vacancy_index.linear(self.dims);
        let j = jump_index.linear(self.dims);
        self.id_grid.swap(v, j);
        self.type_grid.swap(v, j);

        Ok(())
    }

    /// Ordered `id -> (type, index)` snapshot, the initial map handed to the
    /// trajectory writer
    pub fn site_map(&self) -> SiteMap {
        self.by_id
            .iter()
            .map(|(&id, &(atom_type, index))| (id, SiteRecord { atom_type, index }))
            .collect()
    }

    /// Check that all views agree and that the vacancy is the sole type-0 atom
    ///
    /// # Errors
    ///
    /// Returns [`KmcError::Corrupted`] describing the first disagreement.
    pub fn verify(&self) -> Result<(), KmcError> {
        if self.by_id.len() != self.by_index.len() {
            return Err(KmcError::Corrupted(format!(
                "{} ids but {} occupied sites",
                self.by_id.len(),
                self.by_index.len()
            )));
        }

        for (&id, &(atom_type, index)) in &self.by_id {
            if self.by_index.get(&index) != Some(&(id, atom_type)) {
                return Err(KmcError::Corrupted(format!(
                    "atom {id} maps to {index} but that site holds {:?}",
                    self.by_index.get(&index)
                )));
            }
            if self.id_at(index) != id || self.type_at(index) != atom_type {
                return Err(KmcError::Corrupted(format!(
                    "dense grids disagree with atom {id} at {index}"
                )));
            }
            if (atom_type == VACANCY_TYPE) != (id == self.vacancy_id) {
                return Err(KmcError::Corrupted(format!(
                    "atom {id} has type {atom_type}, vacancy is {}",
                    self.vacancy_id
                )));
            }
        }

        let occupied = self.id_grid.iter().filter(|&&id| id != EMPTY_SITE).count();
        if occupied != self.by_id.len() {
            return Err(KmcError::Corrupted(format!(
                "dense grid has {occupied} occupied voxels, maps have {}",
                self.by_id.len()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    /// Three atoms in a row, the middle one is the vacancy
    fn row_of_three() -> LatticeState {
        let grids = OccupancyGrids::from_raw([1, 1, 3], vec![1, 2, 3], vec![1, 0, 1]).unwrap();
        LatticeState::new(grids, 2).unwrap()
    }

    #[test]
    fn test_build_maps() {
        let state = row_of_three();
        assert_eq!(state.len(), 3);
        assert_eq!(state.lookup_by_id(1), Some((1, GridIndex::new(0, 0, 0))));
        assert_eq!(state.lookup_by_id(2), Some((0, GridIndex::new(0, 0, 1))));
        assert_eq!(
            state.lookup_by_coordinate(GridIndex::new(0, 0, 2)),
            Some((3, 1))
        );
        assert_eq!(state.vacancy_site().unwrap(), GridIndex::new(0, 0, 1));
        state.verify().unwrap();
    }

    #[test]
    fn test_swap_scenario() {
        let mut state = row_of_three();
        state.swap(2, 1).unwrap();

        let expected_by_id: SiteMap = [
            (1, SiteRecord { atom_type: 1, index: GridIndex::new(0, 0, 1) }),
            (2, SiteRecord { atom_type: 0, index: GridIndex::new(0, 0, 0) }),
            (3, SiteRecord { atom_type: 1, index: GridIndex::new(0, 0, 2) }),
        ]
        .into_iter()
        .collect();
        assert_eq!(state.site_map(), expected_by_id);

        assert_eq!(state.lookup_by_coordinate(GridIndex::new(0, 0, 0)), Some((2, 0)));
        assert_eq!(state.lookup_by_coordinate(GridIndex::new(0, 0, 1)), Some((1, 1)));
        assert_eq!(state.lookup_by_coordinate(GridIndex::new(0, 0, 2)), Some((3, 1)));

        assert_eq!(state.id_grid(), &[2, 1, 3]);
        assert_eq!(state.type_grid(), &[0, 1, 1]);
        state.verify().unwrap();
    }

    #[test]
    fn test_swap_back_restores_state() {
        let mut state = row_of_three();
        let before = state.site_map();
        state.swap(2, 3).unwrap();
        state.swap(2, 3).unwrap();
        assert_eq!(state.site_map(), before);
    }

    #[test]
    fn test_swap_unknown_ids() {
        let mut state = row_of_three();
        assert_eq!(state.swap(2, 99), Err(KmcError::UnknownAtom(99)));
        assert_eq!(state.swap(42, 1), Err(KmcError::VacancyNotFound(42)));
        // Failed swaps leave the state untouched
        state.verify().unwrap();
        assert_eq!(state.vacancy_site().unwrap(), GridIndex::new(0, 0, 1));
    }

    #[test]
    fn test_swaps_conserve_ids() {
        let grids = OccupancyGrids::from_raw(
            [2, 2, 2],
            vec![1, 0, 2, 3, 0, 4, 5, 6],
            vec![1, 0, 2, 1, 0, 0, 2, 1],
        )
        .unwrap();
        let mut state = LatticeState::new(grids, 4).unwrap();
        let ids_before: FxHashSet<_> = state.ids().collect();

        for jump in [1, 3, 6, 2, 5, 1] {
            state.swap(4, jump).unwrap();
            state.verify().unwrap();
        }

        let ids_after: FxHashSet<_> = state.ids().collect();
        assert_eq!(ids_before, ids_after);
        // Empty voxels stay empty
        assert_eq!(state.id_at(GridIndex::new(0, 0, 1)), EMPTY_SITE);
        assert_eq!(state.id_at(GridIndex::new(1, 0, 0)), EMPTY_SITE);
    }

    #[test]
    fn test_vacancy_validation() {
        let grids = OccupancyGrids::from_raw([1, 1, 3], vec![1, 2, 3], vec![1, 0, 1]).unwrap();
        assert_eq!(
            LatticeState::new(grids.clone(), 9).unwrap_err(),
            KmcError::VacancyNotFound(9)
        );
        assert_eq!(
            LatticeState::new(grids, 1).unwrap_err(),
            KmcError::VacancyCount {
                vacancy_id: 1,
                type_zero: vec![2]
            }
        );

        let two_vacancies =
            OccupancyGrids::from_raw([1, 1, 3], vec![1, 2, 3], vec![0, 0, 1]).unwrap();
        assert!(matches!(
            LatticeState::new(two_vacancies, 2),
            Err(KmcError::VacancyCount { .. })
        ));
    }
}
