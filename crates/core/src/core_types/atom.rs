//! Atom records and whole-configuration snapshots

use crate::core_types::Vec3;
use serde::{Deserialize, Serialize};

/// Atom identifier. Id 0 is reserved for empty voxels and never names an atom.
pub type AtomId = u32;

/// Atom species. Type 0 marks the vacancy.
pub type AtomType = u32;

/// Grid sentinel for a voxel with no atom
pub const EMPTY_SITE: AtomId = 0;

/// Species value carried by the vacancy
pub const VACANCY_TYPE: AtomType = 0;

/// One atom as read from a structure file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtomRecord {
    pub id: AtomId,
    pub atom_type: AtomType,
    /// Cartesian position in box length units
    pub position: Vec3,
}

impl AtomRecord {
    pub fn new(id: AtomId, atom_type: AtomType, position: Vec3) -> Self {
        Self {
            id,
            atom_type,
            position,
        }
    }
}

/// A periodic box with its atoms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Timestep label carried through from the dump header
    pub timestep: u64,
    /// `[lo, hi]` per axis
    pub bounds: [[f64; 2]; 3],
    pub atoms: Vec<AtomRecord>,
}

impl Configuration {
    /// Box edge lengths (`hi - lo` per axis)
    pub fn box_lengths(&self) -> Vec3 {
        Vec3::new(
            self.bounds[0][1] - self.bounds[0][0],
            self.bounds[1][1] - self.bounds[1][0],
            self.bounds[2][1] - self.bounds[2][0],
        )
    }

    /// Number of atoms, vacancy included
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}
