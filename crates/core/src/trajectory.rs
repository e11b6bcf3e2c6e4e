//! Trajectory reconstruction from the initial map and the event log
//!
//! Replaying a run only needs the sites: every logged jump exchanges the
//! sites of the vacancy and the jumping atom, and species never change. Frame
//! `n` is the lattice after the first `n` jumps; frames are emitted for every
//! `n` divisible by the interval, starting with the initial lattice.

use crate::core_types::{AtomId, AtomRecord, Configuration, Vec3};
use crate::error::KmcError;
use crate::grid::{SiteMap, SiteRecord};
use crate::io::{write_dump, DumpError, InitMap};
use crate::kmc::JumpEvent;
use rustc_hash::FxHashSet;
use std::io::Write;
use tracing::info;

/// Which atoms appear in the frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomSelection {
    /// Every atom in the initial map
    All,
    /// Only the vacancy and atoms that jumped at least once
    Effective,
}

/// Replays jumps over an initial map
#[derive(Debug, Clone)]
pub struct Replay {
    sites: SiteMap,
    vacancy_id: AtomId,
    voxel_size: f64,
    bounds: [[f64; 2]; 3],
    applied: u64,
}

impl Replay {
    /// Start from the initial map, restricted to `selection`
    ///
    /// # Errors
    ///
    /// Returns [`KmcError::VacancyNotFound`] if the map does not hold the
    /// vacancy and [`KmcError::UnknownAtom`] for a logged id it does not hold.
    pub fn new(
        init_map: &InitMap,
        jump_ids: &[AtomId],
        selection: AtomSelection,
    ) -> Result<Self, KmcError> {
        let vacancy_id = init_map.vacancy_id;
        if !init_map.sites.contains_key(&vacancy_id) {
            return Err(KmcError::VacancyNotFound(vacancy_id));
        }
        if let Some(&unknown) = jump_ids.iter().find(|&&id| !init_map.sites.contains_key(&id)) {
            return Err(KmcError::UnknownAtom(unknown));
        }

        let sites = match selection {
            AtomSelection::All => init_map.sites.clone(),
            AtomSelection::Effective => {
                let mut keep: FxHashSet<AtomId> = jump_ids.iter().copied().collect();
                keep.insert(vacancy_id);
                init_map
                    .sites
                    .iter()
                    .filter(|(id, _)| keep.contains(*id))
                    .map(|(&id, &record)| (id, record))
                    .collect()
            }
        };

        Ok(Self {
            sites,
            vacancy_id,
            voxel_size: init_map.voxel_size,
            bounds: init_map.box_lengths().map(|length| [0.0, length]),
            applied: 0,
        })
    }

    /// Number of jumps applied so far
    #[inline]
    pub fn applied(&self) -> u64 {
        self.applied
    }

    #[inline]
    pub fn sites(&self) -> &SiteMap {
        &self.sites
    }

    /// Exchange the sites of the vacancy and `jump_id`
    ///
    /// # Errors
    ///
    /// Returns [`KmcError::UnknownAtom`] if `jump_id` is not tracked.
    pub fn apply(&mut self, jump_id: AtomId) -> Result<(), KmcError> {
        let jump_index = self
            .sites
            .get(&jump_id)
            .map(|r| r.index)
            .ok_or(KmcError::UnknownAtom(jump_id))?;
        let vacancy = self
            .sites
            .get_mut(&self.vacancy_id)
            .ok_or(KmcError::VacancyNotFound(self.vacancy_id))?;
        let vacancy_index = std::mem::replace(&mut vacancy.index, jump_index);
        if let Some(jumper) = self.sites.get_mut(&jump_id) {
            jumper.index = vacancy_index;
        }
        self.applied += 1;
        Ok(())
    }

    /// Current lattice as a configuration, ids ascending, coordinates
    /// `index * voxel_size`
    pub fn frame(&self) -> Configuration {
        let atoms = self
            .sites
            .iter()
            .map(|(&id, &SiteRecord { atom_type, index })| {
                let position = Vec3::new(index.i as f64, index.j as f64, index.k as f64)
                    * self.voxel_size;
                AtomRecord::new(id, atom_type, position)
            })
            .collect();
        Configuration {
            timestep: self.applied,
            bounds: self.bounds,
            atoms,
        }
    }
}

/// Jump ids from a parsed event log
///
/// A leading `(vacancy_id, 0)` record written at the start of a run is a
/// header, not a jump, and is dropped.
pub fn logged_jumps(init_map: &InitMap, events: &[JumpEvent]) -> Vec<AtomId> {
    let skip = match events.first() {
        Some(first) if first.jump_id == init_map.vacancy_id && first.jump_time == 0.0 => 1,
        _ => 0,
    };
    events[skip..].iter().map(|e| e.jump_id).collect()
}

/// Replay `jump_ids` and collect a frame every `interval` jumps
///
/// # Errors
///
/// As [`Replay::new`]; an interval of 0 is treated as 1.
pub fn reconstruct(
    init_map: &InitMap,
    jump_ids: &[AtomId],
    interval: u64,
    selection: AtomSelection,
) -> Result<Vec<Configuration>, KmcError> {
    let mut frames = Vec::new();
    replay_frames(init_map, jump_ids, interval, selection, |frame| {
        frames.push(frame);
        Ok::<(), KmcError>(())
    })?;
    Ok(frames)
}

/// Replay and stream frames straight into a dump writer
///
/// Returns the number of frames written.
///
/// # Errors
///
/// Replay failures and write failures, as [`TrajectoryError`].
pub fn write_trajectory<W: Write>(
    writer: &mut W,
    init_map: &InitMap,
    jump_ids: &[AtomId],
    interval: u64,
    selection: AtomSelection,
) -> Result<usize, TrajectoryError> {
    let mut written = 0;
    replay_frames(init_map, jump_ids, interval, selection, |frame| {
        write_dump(writer, &frame)?;
        written += 1;
        Ok::<(), TrajectoryError>(())
    })?;
    writer.flush().map_err(DumpError::from)?;
    info!(
        "Wrote {} frames over {} jumps (interval {})",
        written,
        jump_ids.len(),
        interval
    );
    Ok(written)
}

fn replay_frames<E: From<KmcError>>(
    init_map: &InitMap,
    jump_ids: &[AtomId],
    interval: u64,
    selection: AtomSelection,
    mut emit: impl FnMut(Configuration) -> Result<(), E>,
) -> Result<(), E> {
    let interval = interval.max(1);
    let mut replay = Replay::new(init_map, jump_ids, selection)?;
    emit(replay.frame())?;
    for &jump_id in jump_ids {
        replay.apply(jump_id)?;
        if replay.applied() % interval == 0 {
            emit(replay.frame())?;
        }
    }
    Ok(())
}

/// Reconstruction failures
#[derive(Debug, Clone, PartialEq)]
pub enum TrajectoryError {
    Replay(KmcError),
    Write(DumpError),
}

impl std::fmt::Display for TrajectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrajectoryError::Replay(e) => write!(f, "Replay failed: {e}"),
            TrajectoryError::Write(e) => write!(f, "Writing frames failed: {e}"),
        }
    }
}

impl std::error::Error for TrajectoryError {}

impl From<KmcError> for TrajectoryError {
    fn from(e: KmcError) -> Self {
        TrajectoryError::Replay(e)
    }
}

impl From<DumpError> for TrajectoryError {
    fn from(e: DumpError) -> Self {
        TrajectoryError::Write(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridIndex;

    /// Row of four voxels, vacancy 2 at index 1
    fn row_map() -> InitMap {
        let site = |atom_type, k| SiteRecord {
            atom_type,
            index: GridIndex::new(0, 0, k),
        };
        InitMap {
            dims: [1, 1, 4],
            voxel_size: 2.0,
            vacancy_id: 2,
            sites: [(1, site(1, 0)), (2, site(0, 1)), (3, site(2, 2)), (4, site(1, 3))]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_replay_swaps_sites_only() {
        let mut replay = Replay::new(&row_map(), &[3, 4], AtomSelection::All).unwrap();
        replay.apply(3).unwrap();
        replay.apply(4).unwrap();

        let sites = replay.sites();
        assert_eq!(sites[&2].index, GridIndex::new(0, 0, 3));
        assert_eq!(sites[&3].index, GridIndex::new(0, 0, 1));
        assert_eq!(sites[&4].index, GridIndex::new(0, 0, 2));
        // Species stay with their atoms
        assert_eq!(sites[&3].atom_type, 2);
        assert_eq!(sites[&2].atom_type, 0);
    }

    #[test]
    fn test_frames_at_interval() {
        let frames = reconstruct(&row_map(), &[3, 4, 4, 3], 2, AtomSelection::All).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].timestep, 0);
        assert_eq!(frames[1].timestep, 2);
        assert_eq!(frames[2].timestep, 4);
        assert_eq!(frames[0].bounds[2], [0.0, 8.0]);
        // Back where it started after jumping forth and back
        assert_eq!(frames[2].atoms, frames[0].atoms);
        assert_eq!(frames[1].atoms[1].position, Vec3::new(0.0, 0.0, 6.0));
    }

    #[test]
    fn test_effective_selection() {
        let frames = reconstruct(&row_map(), &[3], 1, AtomSelection::Effective).unwrap();
        let ids: Vec<_> = frames[1].atoms.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_log_header_is_dropped() {
        let event = |jump_id, jump_time| JumpEvent { jump_id, jump_time };
        let map = row_map();
        assert_eq!(
            logged_jumps(&map, &[event(2, 0.0), event(3, 1e-9)]),
            vec![3]
        );
        assert_eq!(logged_jumps(&map, &[event(3, 1e-9)]), vec![3]);
        assert!(logged_jumps(&map, &[]).is_empty());
    }

    #[test]
    fn test_unknown_ids_rejected() {
        assert_eq!(
            reconstruct(&row_map(), &[3, 9], 1, AtomSelection::All),
            Err(KmcError::UnknownAtom(9))
        );
    }

    #[test]
    fn test_write_trajectory_counts_frames() {
        let mut buffer = Vec::new();
        let written =
            write_trajectory(&mut buffer, &row_map(), &[3, 4, 4], 1, AtomSelection::All).unwrap();
        assert_eq!(written, 4);
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.matches("ITEM: TIMESTEP").count(), 4);
        assert!(text.contains("3 2 0.00 0.00 2.00\n"));
    }
}
