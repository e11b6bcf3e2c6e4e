//! Local environment around the vacancy
//!
//! The window is a cube of odd edge `2r + 1` centered on the vacancy, with
//! `r = floor(cutoff / voxel_size - 0.5)`. The mask is the list of window
//! offsets that were occupied around the initial vacancy and lie strictly
//! inside the cutoff sphere. It is detected once and reused every step by
//! re-centering on the current vacancy and wrapping periodically.

use crate::core_types::{AtomId, AtomType, Offset};
use crate::error::KmcError;
use crate::grid::{GridIndex, LatticeState};
use tracing::info;

/// Geometry of the cubic window around the vacancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalWindow {
    radius: usize,
}

impl LocalWindow {
    /// Window for a cutoff radius, both in box length units
    ///
    /// # Errors
    ///
    /// Returns [`KmcError::WindowTooSmall`] if the window would not reach the
    /// first-neighbor shell (radius below one voxel).
    pub fn from_cutoff(cutoff: f64, voxel_size: f64) -> Result<Self, KmcError> {
        let radius = (cutoff / voxel_size - 0.5).floor();
        if radius.is_nan() || radius < 1.0 {
            return Err(KmcError::WindowTooSmall { cutoff, voxel_size });
        }
        Ok(Self {
            radius: radius as usize,
        })
    }

    /// Window with an explicit radius in voxels
    pub const fn with_radius(radius: usize) -> Self {
        Self { radius }
    }

    #[inline]
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Edge length in voxels, always odd
    #[inline]
    pub fn size(&self) -> usize {
        2 * self.radius + 1
    }

    /// Number of voxels in the window
    #[inline]
    pub fn volume(&self) -> usize {
        self.size().pow(3)
    }

    /// Whether an offset from the center falls inside the window
    #[inline]
    pub fn contains(&self, offset: &Offset) -> bool {
        let r = self.radius as i64;
        offset.iter().all(|&c| (-r..=r).contains(&c))
    }

    /// Row-major position of an offset inside the window cube
    #[inline]
    pub fn cube_index(&self, offset: &Offset) -> usize {
        let r = self.radius as i64;
        let n = self.size();
        let (i, j, k) = (
            (offset.x + r) as usize,
            (offset.y + r) as usize,
            (offset.z + r) as usize,
        );
        (i * n + j) * n + k
    }

    /// Every offset in the window, x outermost and z innermost
    pub fn offsets(&self) -> impl Iterator<Item = Offset> {
        let r = self.radius as i64;
        (-r..=r).flat_map(move |i| {
            (-r..=r).flat_map(move |j| (-r..=r).map(move |k| Offset::new(i, j, k)))
        })
    }
}

/// Dense cube of values over the window, zero outside the mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCube {
    window: LocalWindow,
    values: Vec<u32>,
}

impl LocalCube {
    pub fn zeros(window: LocalWindow) -> Self {
        Self {
            window,
            values: vec![0; window.volume()],
        }
    }

    #[inline]
    pub fn window(&self) -> LocalWindow {
        self.window
    }

    /// Value at an offset from the window center
    #[inline]
    pub fn get(&self, offset: &Offset) -> u32 {
        self.values[self.window.cube_index(offset)]
    }

    #[inline]
    pub fn set(&mut self, offset: &Offset, value: u32) {
        let index = self.window.cube_index(offset);
        self.values[index] = value;
    }

    /// Row-major values
    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.values
    }

    /// Row-major values as predictor input
    pub fn flatten(&self) -> Vec<f64> {
        self.values.iter().map(|&v| f64::from(v)).collect()
    }
}

/// Local id and type cubes around the vacancy for one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEnvironment {
    pub ids: LocalCube,
    pub types: LocalCube,
}

/// Static set of occupied offsets around the vacancy
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentMask {
    window: LocalWindow,
    offsets: Vec<Offset>,
}

impl EnvironmentMask {
    /// Detect the mask from the occupancy around the current vacancy
    ///
    /// An offset is kept when the wrapped voxel holds a nonzero type and its
    /// Euclidean length times `voxel_size` is below `cutoff`. The vacancy's
    /// own voxel has type 0 and is never part of the mask.
    ///
    /// # Errors
    ///
    /// Returns [`KmcError::VacancyNotFound`] on corrupted state.
    pub fn detect(
        state: &LatticeState,
        window: LocalWindow,
        cutoff: f64,
        voxel_size: f64,
    ) -> Result<Self, KmcError> {
        let center = state.vacancy_site()?;
        let dims = state.dims();

        let offsets: Vec<Offset> = window
            .offsets()
            .filter(|offset| {
                let length = (offset.x * offset.x + offset.y * offset.y + offset.z * offset.z)
                    as f64;
                length.sqrt() * voxel_size < cutoff
                    && state.type_at(center.wrapped(offset, dims)) != 0
            })
            .collect();

        info!(
            "Environment mask detected: {} sites in a {}^3 window around {}",
            offsets.len(),
            window.size(),
            center
        );

        Ok(Self { window, offsets })
    }

    /// Build a mask from explicit offsets
    pub fn from_offsets(window: LocalWindow, offsets: Vec<Offset>) -> Self {
        Self { window, offsets }
    }

    #[inline]
    pub fn window(&self) -> LocalWindow {
        self.window
    }

    /// Mask offsets in detection order
    #[inline]
    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn contains(&self, offset: &Offset) -> bool {
        self.offsets.contains(offset)
    }

    /// Read the masked neighborhood of `center` into fresh id and type cubes
    ///
    /// Each lattice coordinate is `(center + offset)` wrapped into the mesh.
    pub fn extract(&self, state: &LatticeState, center: GridIndex) -> LocalEnvironment {
        let dims = state.dims();
        let mut ids = LocalCube::zeros(self.window);
        let mut types = LocalCube::zeros(self.window);

        for offset in &self.offsets {
            let site = center.wrapped(offset, dims);
            ids.set(offset, state.id_at(site));
            types.set(offset, state.type_at(site));
        }

        LocalEnvironment { ids, types }
    }
}

impl LocalEnvironment {
    /// Atom id at an offset, 0 if the offset is outside the mask
    #[inline]
    pub fn id_at(&self, offset: &Offset) -> AtomId {
        self.ids.get(offset)
    }

    #[inline]
    pub fn type_at(&self, offset: &Offset) -> AtomType {
        self.types.get(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::OccupancyGrids;

    /// Fully occupied simple-cubic 10x10x10 lattice, ids in row-major order
    /// starting at 1, type 1 + (k % 2), vacancy on `vacancy`.
    fn simple_cubic(vacancy: GridIndex) -> LatticeState {
        let dims = [10, 10, 10];
        let ids: Vec<AtomId> = (1..=1000).collect();
        let mut types: Vec<AtomType> = (0..1000)
            .map(|linear| 1 + (GridIndex::from_linear(linear, dims).k % 2) as u32)
            .collect();
        let vacancy_linear = vacancy.linear(dims);
        types[vacancy_linear] = 0;
        let grids = OccupancyGrids::from_raw(dims, ids, types).unwrap();
        LatticeState::new(grids, vacancy_linear as u32 + 1).unwrap()
    }

    #[test]
    fn test_window_size_formula() {
        // floor(2.9 - 0.5) = 2
        let window = LocalWindow::from_cutoff(2.9, 1.0).unwrap();
        assert_eq!(window.radius(), 2);
        assert_eq!(window.size(), 5);
        // floor(6.0 / 1.62 - 0.5) = floor(3.2037) = 3
        assert_eq!(LocalWindow::from_cutoff(6.0, 1.62).unwrap().size(), 7);
        // floor(3.2 - 0.5) = 2
        assert_eq!(LocalWindow::from_cutoff(3.2, 1.0).unwrap().radius(), 2);
        assert!(matches!(
            LocalWindow::from_cutoff(1.2, 1.0),
            Err(KmcError::WindowTooSmall { .. })
        ));
        assert!(matches!(
            LocalWindow::from_cutoff(f64::NAN, 1.0),
            Err(KmcError::WindowTooSmall { .. })
        ));
    }

    #[test]
    fn test_window_offsets_order() {
        let window = LocalWindow::with_radius(1);
        let offsets: Vec<_> = window.offsets().collect();
        assert_eq!(offsets.len(), 27);
        assert_eq!(offsets[0], Offset::new(-1, -1, -1));
        assert_eq!(offsets[1], Offset::new(-1, -1, 0));
        assert_eq!(offsets[26], Offset::new(1, 1, 1));
        for (position, offset) in offsets.iter().enumerate() {
            assert_eq!(window.cube_index(offset), position);
        }
    }

    #[test]
    fn test_flattened_layout_is_x_major() {
        let window = LocalWindow::with_radius(1);
        let mut cube = LocalCube::zeros(window);
        cube.set(&Offset::new(1, -1, -1), 7);
        cube.set(&Offset::new(-1, 1, -1), 5);
        cube.set(&Offset::new(-1, -1, 1), 3);

        let flat = cube.flatten();
        // x strides by 9, y by 3, z by 1
        assert_eq!(flat[18], 7.0);
        assert_eq!(flat[6], 5.0);
        assert_eq!(flat[2], 3.0);
        assert_eq!(flat.iter().filter(|&&v| v != 0.0).count(), 3);
    }

    #[test]
    fn test_mask_excludes_vacancy_and_far_sites() {
        let state = simple_cubic(GridIndex::new(5, 5, 5));
        let window = LocalWindow::from_cutoff(2.9, 1.0).unwrap();
        let mask = EnvironmentMask::detect(&state, window, 2.9, 1.0).unwrap();

        assert!(!mask.contains(&Offset::new(0, 0, 0)));
        assert!(mask.contains(&Offset::new(1, 1, 1)));
        assert!(mask.contains(&Offset::new(-2, 0, 0)));
        // sqrt(8) = 2.83 < 2.9 but sqrt(9) = 3 is not
        assert!(mask.contains(&Offset::new(2, 2, 0)));
        assert!(!mask.contains(&Offset::new(2, 2, 1)));
        assert!(!mask.contains(&Offset::new(2, 2, 2)));
    }

    #[test]
    fn test_extract_wraps_periodically() {
        let vacancy = GridIndex::new(0, 0, 0);
        let state = simple_cubic(vacancy);
        let window = LocalWindow::from_cutoff(2.9, 1.0).unwrap();
        let mask = EnvironmentMask::detect(&state, window, 2.9, 1.0).unwrap();
        let env = mask.extract(&state, vacancy);

        let dims = state.dims();
        let expect = |i, j, k| state.id_at(GridIndex::new(i, j, k));
        assert_eq!(env.id_at(&Offset::new(-1, 0, 0)), expect(9, 0, 0));
        assert_eq!(env.id_at(&Offset::new(-2, 0, 0)), expect(8, 0, 0));
        assert_eq!(env.id_at(&Offset::new(0, -2, -1)), expect(0, 8, 9));
        assert_eq!(env.id_at(&Offset::new(1, -1, 2)), expect(1, 9, 2));
        assert_eq!(env.id_at(&Offset::new(0, 0, 0)), 0);
        assert_eq!(env.type_at(&Offset::new(0, 0, -1)), 1 + (9 % 2) as u32);

        for offset in mask.offsets() {
            let site = vacancy.wrapped(offset, dims);
            assert_eq!(env.id_at(offset), state.id_at(site));
            assert_eq!(env.type_at(offset), state.type_at(site));
        }
    }

    #[test]
    fn test_unmasked_positions_stay_zero() {
        let state = simple_cubic(GridIndex::new(3, 3, 3));
        let window = LocalWindow::from_cutoff(2.9, 1.0).unwrap();
        let mask = EnvironmentMask::detect(&state, window, 2.9, 1.0).unwrap();
        let env = mask.extract(&state, GridIndex::new(3, 3, 3));

        let nonzero = env.ids.as_slice().iter().filter(|&&v| v != 0).count();
        assert_eq!(nonzero, mask.len());
        assert_eq!(env.ids.get(&Offset::new(2, 2, 2)), 0);
    }
}
