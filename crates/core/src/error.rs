//! Failure modes of the lattice encoder and the KMC event engine
//!
//! Every variant aborts the run. The simulation is deterministic for a given
//! seed, so nothing here is retried.

use crate::core_types::{AtomId, Offset};
use crate::grid::GridIndex;
use std::fmt;

/// Errors raised while building or advancing the lattice simulation
#[derive(Debug, Clone, PartialEq)]
pub enum KmcError {
    /// Box lengths or voxel size are non-positive, non-finite, or round to zero voxels
    InvalidMesh(String),
    /// An atom sits farther than the snap tolerance from its nearest mesh point
    GeometryMismatch {
        id: AtomId,
        distance: f64,
    },
    /// Atom id 0 is reserved for empty voxels
    InvalidAtomId,
    /// The same atom id appears twice in the input
    DuplicateAtomId(AtomId),
    /// Two atoms snapped onto the same voxel
    DuplicateSite {
        index: GridIndex,
        first: AtomId,
        second: AtomId,
    },
    /// Dense grid buffers do not match the declared dimensions
    GridShape {
        expected: usize,
        found: usize,
    },
    /// The designated vacancy id is not present in the lattice
    VacancyNotFound(AtomId),
    /// No atoms to choose a vacancy from
    EmptyStructure,
    /// The lattice must hold exactly one type-0 site and it must carry the vacancy id
    VacancyCount {
        vacancy_id: AtomId,
        type_zero: Vec<AtomId>,
    },
    /// A jump target id is not present in the lattice
    UnknownAtom(AtomId),
    /// The local window cannot hold the first-neighbor shell
    WindowTooSmall {
        cutoff: f64,
        voxel_size: f64,
    },
    /// A diffusion neighbor is empty or outside the environment mask
    MissingNeighbor(Offset),
    /// The rate sum is zero or not finite, so no event can be sampled
    DegenerateRates(f64),
    /// The barrier predictor did not honor its contract
    PredictorContract(String),
    /// Structure generation was given unusable species data
    InvalidSpecies(String),
    /// The bijection between ids and sites was found broken
    Corrupted(String),
}

impl fmt::Display for KmcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KmcError::InvalidMesh(msg) => write!(f, "Invalid mesh: {msg}"),
            KmcError::GeometryMismatch { id, distance } => write!(
                f,
                "Atom {id} is {distance:.3e} away from the nearest mesh point; input is not on the voxel lattice"
            ),
            KmcError::InvalidAtomId => write!(f, "Atom id 0 is reserved for empty sites"),
            KmcError::DuplicateAtomId(id) => write!(f, "Atom id {id} appears more than once"),
            KmcError::DuplicateSite {
                index,
                first,
                second,
            } => write!(f, "Atoms {first} and {second} both snap to voxel {index}"),
            KmcError::GridShape { expected, found } => {
                write!(f, "Grid buffer holds {found} cells, expected {expected}")
            }
            KmcError::VacancyNotFound(id) => write!(f, "Vacancy id {id} not found in lattice"),
            KmcError::EmptyStructure => write!(f, "Structure holds no atoms to place a vacancy on"),
            KmcError::VacancyCount {
                vacancy_id,
                type_zero,
            } => write!(
                f,
                "Expected vacancy {vacancy_id} to be the only type-0 site, found {type_zero:?}"
            ),
            KmcError::UnknownAtom(id) => write!(f, "Atom id {id} not found in lattice"),
            KmcError::WindowTooSmall { cutoff, voxel_size } => write!(
                f,
                "Cutoff {cutoff} with voxel size {voxel_size} gives a window without first neighbors"
            ),
            KmcError::MissingNeighbor(offset) => write!(
                f,
                "Diffusion neighbor at offset ({}, {}, {}) is not an occupied mask site",
                offset.x, offset.y, offset.z
            ),
            KmcError::DegenerateRates(sum) => {
                write!(f, "Degenerate jump rates: total rate is {sum}")
            }
            KmcError::PredictorContract(msg) => write!(f, "Predictor contract violated: {msg}"),
            KmcError::InvalidSpecies(msg) => write!(f, "Invalid species: {msg}"),
            KmcError::Corrupted(msg) => write!(f, "Lattice state corrupted: {msg}"),
        }
    }
}

impl std::error::Error for KmcError {}
