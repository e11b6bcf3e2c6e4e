//! Initial id to site map, persisted as JSON for trajectory reconstruction

use super::IoError;
use crate::core_types::AtomId;
use crate::grid::{LatticeState, SiteMap, VoxelMesh};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Lattice snapshot taken before the first jump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitMap {
    /// Mesh voxel counts
    pub dims: [usize; 3],
    pub voxel_size: f64,
    pub vacancy_id: AtomId,
    pub sites: SiteMap,
}

impl InitMap {
    pub fn capture(mesh: &VoxelMesh, state: &LatticeState) -> Self {
        Self {
            dims: mesh.dims(),
            voxel_size: mesh.voxel_size(),
            vacancy_id: state.vacancy_id(),
            sites: state.site_map(),
        }
    }

    /// Periodic box spanned by the mesh
    pub fn box_lengths(&self) -> [f64; 3] {
        self.dims.map(|n| n as f64 * self.voxel_size)
    }
}

/// Write the map as pretty-printed JSON
///
/// # Errors
///
/// Returns [`IoError::Io`] or [`IoError::Json`].
pub fn write_init_map(path: impl AsRef<Path>, map: &InitMap) -> Result<(), IoError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| IoError::Io(format!("{}: {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, map)?;
    writer.flush()?;
    info!("Saved initial map of {} atoms to {}", map.sites.len(), path.display());
    Ok(())
}

/// Load a map written by [`write_init_map`]
///
/// # Errors
///
/// Returns [`IoError::Io`] or [`IoError::Json`].
pub fn read_init_map(path: impl AsRef<Path>) -> Result<InitMap, IoError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IoError::Io(format!("{}: {e}", path.display())))?;
    let map = serde_json::from_reader(BufReader::new(file))?;
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridIndex, OccupancyGrids, SiteRecord};

    #[test]
    fn test_capture_and_json() {
        let mesh = VoxelMesh::new(crate::core_types::Vec3::new(1.0, 1.0, 3.0), 1.0).unwrap();
        let grids = OccupancyGrids::from_raw([1, 1, 3], vec![1, 2, 3], vec![1, 0, 1]).unwrap();
        let state = LatticeState::new(grids, 2).unwrap();

        let map = InitMap::capture(&mesh, &state);
        assert_eq!(map.vacancy_id, 2);
        assert_eq!(map.box_lengths(), [1.0, 1.0, 3.0]);
        assert_eq!(
            map.sites[&3],
            SiteRecord {
                atom_type: 1,
                index: GridIndex::new(0, 0, 2)
            }
        );

        let json = serde_json::to_string(&map).unwrap();
        let back: InitMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
