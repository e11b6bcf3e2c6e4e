//! Initial structure generation and vacancy placement
//!
//! Random alloys are built on a bcc lattice with species drawn independently
//! per site from the requested concentrations. The vacancy is an ordinary atom
//! whose type is set to 0 before the lattice is assigned.

use crate::core_types::{AtomId, AtomRecord, AtomType, Configuration, Vec3, VACANCY_TYPE};
use crate::error::KmcError;
use crate::io::round2;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::info;

/// Fractional coordinates of the bcc basis
pub const BCC_BASIS: [[f64; 3]; 2] = [[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]];

/// Build a periodic bcc supercell
///
/// Atoms of the corner sublattice come first, then the body-center sublattice;
/// within each, cells are visited x outermost. Ids run from 1. Coordinates are
/// rounded to two decimals.
///
/// # Arguments
///
/// * `lattice_constant` - Cubic cell edge
/// * `cells` - Unit cells along x, y, z
/// * `species` - `(type, concentration)` pairs; concentrations are relative
///   weights and need not sum to one
/// * `rng` - Source for the species draw
///
/// # Errors
///
/// Returns [`KmcError::InvalidSpecies`] for an empty species list, a type of
/// 0, or weights that are negative, non-finite or all zero, and
/// [`KmcError::InvalidMesh`] for a non-positive lattice constant or cell count.
pub fn build_bcc<R: Rng + ?Sized>(
    lattice_constant: f64,
    cells: [usize; 3],
    species: &[(AtomType, f64)],
    rng: &mut R,
) -> Result<Configuration, KmcError> {
    if !(lattice_constant.is_finite() && lattice_constant > 0.0) {
        return Err(KmcError::InvalidMesh(format!(
            "lattice constant must be finite and positive, got {lattice_constant}"
        )));
    }
    if cells.contains(&0) {
        return Err(KmcError::InvalidMesh(format!(
            "cell counts must be positive, got {cells:?}"
        )));
    }
    if let Some(&(atom_type, _)) = species.iter().find(|(t, _)| *t == VACANCY_TYPE) {
        return Err(KmcError::InvalidSpecies(format!(
            "type {atom_type} is reserved for the vacancy"
        )));
    }
    let weights = WeightedIndex::new(species.iter().map(|&(_, c)| c))
        .map_err(|e| KmcError::InvalidSpecies(format!("{e} in {species:?}")))?;

    let total = 2 * cells[0] * cells[1] * cells[2];
    let mut atoms = Vec::with_capacity(total);
    let mut id: AtomId = 1;
    for basis in BCC_BASIS {
        for i in 0..cells[0] {
            for j in 0..cells[1] {
                for k in 0..cells[2] {
                    let fractional = Vec3::new(
                        i as f64 + basis[0],
                        j as f64 + basis[1],
                        k as f64 + basis[2],
                    );
                    let position = (fractional * lattice_constant).map(round2);
                    let atom_type = species[weights.sample(rng)].0;
                    atoms.push(AtomRecord::new(id, atom_type, position));
                    id += 1;
                }
            }
        }
    }

    let bounds = cells.map(|n| [0.0, round2(n as f64 * lattice_constant)]);
    info!(
        "Built bcc supercell: {}x{}x{} cells, a={}, {} atoms",
        cells[0],
        cells[1],
        cells[2],
        lattice_constant,
        atoms.len()
    );

    Ok(Configuration {
        timestep: 0,
        bounds,
        atoms,
    })
}

/// Turn atom `id` into the vacancy by setting its type to 0
///
/// # Errors
///
/// Returns [`KmcError::VacancyNotFound`] if no atom carries `id`.
pub fn designate_vacancy(config: &mut Configuration, id: AtomId) -> Result<(), KmcError> {
    let atom = config
        .atoms
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or(KmcError::VacancyNotFound(id))?;
    atom.atom_type = VACANCY_TYPE;
    Ok(())
}

/// Uniformly random atom id
///
/// # Errors
///
/// Returns [`KmcError::EmptyStructure`] if the configuration has no atoms.
pub fn pick_random_vacancy<R: Rng + ?Sized>(
    config: &Configuration,
    rng: &mut R,
) -> Result<AtomId, KmcError> {
    config
        .atoms
        .choose(rng)
        .map(|a| a.id)
        .ok_or(KmcError::EmptyStructure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_bcc_layout() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = build_bcc(3.24, [2, 3, 4], &[(1, 1.0)], &mut rng).unwrap();

        assert_eq!(config.len(), 48);
        assert_eq!(config.bounds[1], [0.0, 9.72]);
        assert_eq!(config.atoms[0].position, Vec3::zeros());
        assert_eq!(config.atoms[1].position, Vec3::new(0.0, 0.0, 3.24));
        // First body-center atom
        assert_eq!(config.atoms[24].id, 25);
        assert_eq!(config.atoms[24].position, Vec3::new(1.62, 1.62, 1.62));
        assert!(config.atoms.iter().all(|a| a.atom_type == 1));
    }

    #[test]
    fn test_species_follow_concentrations() {
        let mut rng = StdRng::seed_from_u64(11);
        let config = build_bcc(2.87, [10, 10, 10], &[(1, 0.75), (2, 0.25)], &mut rng).unwrap();
        let minority = config.atoms.iter().filter(|a| a.atom_type == 2).count();
        let fraction = minority as f64 / config.len() as f64;
        // 2000 draws, standard deviation ~0.01
        assert!((fraction - 0.25).abs() < 0.05, "fraction {fraction}");
    }

    #[test]
    fn test_same_seed_same_structure() {
        let species = [(1, 0.5), (2, 0.3), (3, 0.2)];
        let a = build_bcc(2.87, [4, 4, 4], &species, &mut StdRng::seed_from_u64(5)).unwrap();
        let b = build_bcc(2.87, [4, 4, 4], &species, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_species() {
        let mut rng = StdRng::seed_from_u64(0);
        for species in [
            vec![],
            vec![(0, 1.0)],
            vec![(1, -0.5), (2, 1.0)],
            vec![(1, 0.0)],
        ] {
            assert!(matches!(
                build_bcc(2.87, [2, 2, 2], &species, &mut rng),
                Err(KmcError::InvalidSpecies(_))
            ));
        }
    }

    #[test]
    fn test_vacancy_designation() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut config = build_bcc(2.87, [2, 2, 2], &[(1, 1.0)], &mut rng).unwrap();

        designate_vacancy(&mut config, 5).unwrap();
        assert_eq!(config.atoms[4].atom_type, VACANCY_TYPE);
        assert_eq!(
            designate_vacancy(&mut config, 99),
            Err(KmcError::VacancyNotFound(99))
        );

        let picked = pick_random_vacancy(&config, &mut rng).unwrap();
        assert!((1..=16).contains(&picked));
    }

    #[test]
    fn test_random_vacancy_needs_atoms() {
        let mut rng = StdRng::seed_from_u64(0);
        let empty = Configuration {
            timestep: 0,
            bounds: [[0.0, 3.0]; 3],
            atoms: Vec::new(),
        };
        assert_eq!(
            pick_random_vacancy(&empty, &mut rng),
            Err(KmcError::EmptyStructure)
        );
    }
}
