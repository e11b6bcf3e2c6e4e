//! Alignment of the local environment onto one canonical jump direction
//!
//! A bcc vacancy has eight first neighbors along the body diagonals. The
//! barrier predictor only knows environments in which the jump goes along
//! `(1, 1, 1)`, so for every other diagonal the masked offsets are rotated
//! about z (quarter turns chosen from the signs of x and y) and mirrored in z
//! when the diagonal points down. Only positions are relabeled; the type
//! values are copied as they are.

use super::environment::{EnvironmentMask, LocalCube, LocalEnvironment, LocalWindow};
use crate::core_types::Offset;
use crate::error::KmcError;
use nalgebra::{DMatrix, Rotation2, Vector2};
use std::f64::consts::{FRAC_PI_2, PI};

/// Number of first-neighbor jump directions
pub const NUM_PATHS: usize = 8;

/// The eight body diagonals, x sign outermost, z sign innermost, positive first
pub fn diffusion_directions() -> [Offset; NUM_PATHS] {
    let mut directions = [Offset::zeros(); NUM_PATHS];
    let mut n = 0;
    for x in [1, -1] {
        for y in [1, -1] {
            for z in [1, -1] {
                directions[n] = Offset::new(x, y, z);
                n += 1;
            }
        }
    }
    directions
}

/// Rotation about z that brings the direction's `(x, y)` into the first quadrant
pub fn alignment_angle(direction: &Offset) -> f64 {
    match (direction.x >= 0, direction.y >= 0) {
        (true, true) => 0.0,
        (true, false) => FRAC_PI_2,
        (false, true) => -FRAC_PI_2,
        (false, false) => PI,
    }
}

/// Apply the direction's rotation and mirror to every offset
pub fn align_offsets(direction: &Offset, offsets: &[Offset]) -> Vec<Offset> {
    let rotation = Rotation2::new(alignment_angle(direction));
    let mirror = if direction.z < 0 { -1 } else { 1 };

    offsets
        .iter()
        .map(|offset| {
            let xy = rotation * Vector2::new(offset.x as f64, offset.y as f64);
            Offset::new(
                xy.x.round() as i64,
                xy.y.round() as i64,
                mirror * offset.z,
            )
        })
        .collect()
}

/// One jump direction with its precomputed mask permutation
#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionPath {
    direction: Offset,
    /// `aligned[m]` is where mask offset `m` lands in the canonical frame
    aligned: Vec<Offset>,
}

impl DiffusionPath {
    /// Relative offset of the neighbor this path jumps to
    #[inline]
    pub fn direction(&self) -> &Offset {
        &self.direction
    }

    #[inline]
    pub fn aligned_offsets(&self) -> &[Offset] {
        &self.aligned
    }
}

/// The eight diffusion paths, built once from the mask
#[derive(Debug, Clone, PartialEq)]
pub struct PathSet {
    window: LocalWindow,
    mask: Vec<Offset>,
    paths: Vec<DiffusionPath>,
}

impl PathSet {
    /// Precompute the alignment of every direction
    ///
    /// # Errors
    ///
    /// Returns [`KmcError::MissingNeighbor`] if a first neighbor of the
    /// vacancy is not part of the mask; the environment would then carry no
    /// information about the jumping atom.
    pub fn new(mask: &EnvironmentMask) -> Result<Self, KmcError> {
        let mut paths = Vec::with_capacity(NUM_PATHS);
        for direction in diffusion_directions() {
            if !mask.contains(&direction) {
                return Err(KmcError::MissingNeighbor(direction));
            }
            paths.push(DiffusionPath {
                direction,
                aligned: align_offsets(&direction, mask.offsets()),
            });
        }

        Ok(Self {
            window: mask.window(),
            mask: mask.offsets().to_vec(),
            paths,
        })
    }

    #[inline]
    pub fn paths(&self) -> &[DiffusionPath] {
        &self.paths
    }

    pub fn directions(&self) -> impl Iterator<Item = &Offset> {
        self.paths.iter().map(DiffusionPath::direction)
    }

    /// Build the eight canonical type maps for one environment
    ///
    /// Map 0 is the local type cube as observed. Map `d` holds, at the
    /// aligned position of every mask offset, the type found at that offset.
    pub fn feature_maps(&self, environment: &LocalEnvironment) -> FeatureMaps {
        let types = &environment.types;
        let maps = self
            .paths
            .iter()
            .enumerate()
            .map(|(d, path)| {
                if d == 0 {
                    return types.clone();
                }
                let mut cube = LocalCube::zeros(self.window);
                for (original, aligned) in self.mask.iter().zip(&path.aligned) {
                    cube.set(aligned, types.get(original));
                }
                cube
            })
            .collect();

        FeatureMaps { maps }
    }
}

/// Predictor input: one aligned type cube per diffusion direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureMaps {
    maps: Vec<LocalCube>,
}

impl FeatureMaps {
    #[inline]
    pub fn maps(&self) -> &[LocalCube] {
        &self.maps
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Length of one flattened map
    pub fn feature_len(&self) -> usize {
        self.maps.first().map_or(0, |m| m.as_slice().len())
    }

    pub fn flattened(&self) -> Vec<Vec<f64>> {
        self.maps.iter().map(LocalCube::flatten).collect()
    }

    /// One row per direction, one column per window voxel
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.len(), self.feature_len(), |row, col| {
            f64::from(self.maps[row].as_slice()[col])
        })
    }
}
