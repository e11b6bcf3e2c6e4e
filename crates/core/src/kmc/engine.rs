//! Residence-time KMC step for a single vacancy
//!
//! Given the eight candidate neighbors and their predicted barriers:
//!
//! 1. `rate_k = attempt_frequency * exp(-barrier_k / (k_B * T))`
//! 2. pick neighbor `k` with probability `rate_k / sum(rates)`
//! 3. draw `u` in (0, 1) and advance time by `-ln(u) / sum(rates)`
//! 4. swap the vacancy with the chosen neighbor
//!
//! Both draws use the same rate array and come from the caller's RNG, so a
//! fixed seed and barrier sequence reproduce the same events.

use crate::core_types::{AtomId, ElectronVolts, Hertz, Kelvin};
use crate::encoding::NUM_PATHS;
use crate::error::KmcError;
use crate::grid::LatticeState;
use rand::distr::weighted::WeightedIndex;
use rand::distr::{Distribution, Open01};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fixed run constants entering the rate law
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateParams {
    pub attempt_frequency: Hertz,
    /// eV/K
    pub boltzmann_constant: f64,
    pub temperature: Kelvin,
}

impl RateParams {
    /// `k_B * T`
    #[inline]
    pub fn thermal_energy(&self) -> ElectronVolts {
        ElectronVolts::thermal(self.boltzmann_constant, self.temperature)
    }
}

/// One accepted jump: which atom moved and how long the system waited
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpEvent {
    pub jump_id: AtomId,
    pub jump_time: f64,
}

/// Samples and applies one vacancy jump per call
#[derive(Debug, Clone)]
pub struct KmcEngine {
    params: RateParams,
    vacancy_id: AtomId,
}

impl KmcEngine {
    pub fn new(params: RateParams, vacancy_id: AtomId) -> Self {
        Self { params, vacancy_id }
    }

    #[inline]
    pub fn params(&self) -> &RateParams {
        &self.params
    }

    #[inline]
    pub fn vacancy_id(&self) -> AtomId {
        self.vacancy_id
    }

    /// Arrhenius rate for every direction. Barriers are used as given.
    pub fn jump_rates(&self, barriers: &[f64; NUM_PATHS]) -> [f64; NUM_PATHS] {
        let kt = *self.params.thermal_energy();
        let nu = *self.params.attempt_frequency;
        barriers.map(|barrier| nu * (-barrier / kt).exp())
    }

    /// Draw the direction and waiting time without touching the lattice
    ///
    /// Returns the chosen direction index and the event.
    ///
    /// # Errors
    ///
    /// - [`KmcError::PredictorContract`] unless exactly eight barriers are given
    /// - [`KmcError::DegenerateRates`] if the rate sum is zero or not finite
    pub fn sample_event<R: Rng + ?Sized>(
        &self,
        neighbor_ids: &[AtomId; NUM_PATHS],
        barriers: &[f64],
        rng: &mut R,
    ) -> Result<(usize, JumpEvent), KmcError> {
        let barriers: &[f64; NUM_PATHS] = barriers.try_into().map_err(|_| {
            KmcError::PredictorContract(format!(
                "expected {NUM_PATHS} barriers, got {}",
                barriers.len()
            ))
        })?;
        if barriers.iter().any(|&b| b < 0.0) {
            warn!("Negative barrier in {:?}", barriers);
        }

        let rates = self.jump_rates(barriers);
        let total: f64 = rates.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(KmcError::DegenerateRates(total));
        }

        let direction = WeightedIndex::new(rates)
            .map_err(|_| KmcError::DegenerateRates(total))?
            .sample(rng);
        let u: f64 = rng.sample(Open01);
        let jump_time = -u.ln() / total;

        debug!(
            "direction={} jump_id={} jump_time={:.3e} rate_sum={:.3e}",
            direction, neighbor_ids[direction], jump_time, total
        );

        Ok((
            direction,
            JumpEvent {
                jump_id: neighbor_ids[direction],
                jump_time,
            },
        ))
    }

    /// Sample one event and apply it to the lattice
    ///
    /// The lattice is only mutated after both random draws succeeded.
    ///
    /// # Errors
    ///
    /// Everything [`KmcEngine::sample_event`] returns, plus swap failures.
    pub fn execute<R: Rng + ?Sized>(
        &self,
        state: &mut LatticeState,
        neighbor_ids: &[AtomId; NUM_PATHS],
        barriers: &[f64],
        rng: &mut R,
    ) -> Result<JumpEvent, KmcError> {
        let (_, event) = self.sample_event(neighbor_ids, barriers, rng)?;
        state.swap(self.vacancy_id, event.jump_id)?;
        Ok(event)
    }
}
