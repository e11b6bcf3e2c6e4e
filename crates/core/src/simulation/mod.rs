//! Vacancy diffusion driver
//!
//! `Simulation` owns the lattice and everything that reads or mutates it:
//! - the encoder (static mask and diffusion paths)
//! - the event engine (rate law and sampling)
//! - the barrier predictor
//! - the single seeded RNG all draws come from
//!
//! Steps are strictly sequential; step n + 1 observes the lattice as step n
//! left it.

mod runner;

pub use runner::{execute, from_config};

use crate::config::ConfigError;
use crate::core_types::{AtomId, Configuration};
use crate::encoding::{LatticeEncoder, Observation, NUM_PATHS};
use crate::error::KmcError;
use crate::grid::{assign_atoms, LatticeState, VoxelMesh};
use crate::io::{DumpError, EventSink, InitMap, IoError};
use crate::kmc::{JumpEvent, KmcEngine, RateParams};
use crate::predictor::{BarrierPredictor, ModelError};
use rand::rngs::StdRng;
use std::fmt;
use tracing::{debug, info};

/// Geometry and physics of one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    pub rates: RateParams,
    pub voxel_size: f64,
    pub cutoff: f64,
    pub vacancy_id: AtomId,
    /// Label of the first step
    pub init_step: u64,
}

/// Totals reported after [`Simulation::run`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub steps: u64,
    /// Step counter after the run, `init_step` included
    pub final_step: u64,
    /// Simulated time accumulated over the whole simulation
    pub elapsed_time: f64,
    pub vacancy_id: AtomId,
}

/// Anything that can stop a run
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    Config(ConfigError),
    Dump(DumpError),
    Io(IoError),
    Model(ModelError),
    Kmc(KmcError),
    /// Worker pool for atom assignment could not be created
    ThreadPool(String),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Config(e) => write!(f, "{e}"),
            SimulationError::Dump(e) => write!(f, "{e}"),
            SimulationError::Io(e) => write!(f, "{e}"),
            SimulationError::Model(e) => write!(f, "{e}"),
            SimulationError::Kmc(e) => write!(f, "{e}"),
            SimulationError::ThreadPool(msg) => write!(f, "Failed to build thread pool: {msg}"),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Config(e) => Some(e),
            SimulationError::Dump(e) => Some(e),
            SimulationError::Io(e) => Some(e),
            SimulationError::Model(e) => Some(e),
            SimulationError::Kmc(e) => Some(e),
            SimulationError::ThreadPool(_) => None,
        }
    }
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        SimulationError::Config(e)
    }
}

impl From<DumpError> for SimulationError {
    fn from(e: DumpError) -> Self {
        SimulationError::Dump(e)
    }
}

impl From<IoError> for SimulationError {
    fn from(e: IoError) -> Self {
        SimulationError::Io(e)
    }
}

impl From<ModelError> for SimulationError {
    fn from(e: ModelError) -> Self {
        SimulationError::Model(e)
    }
}

impl From<KmcError> for SimulationError {
    fn from(e: KmcError) -> Self {
        SimulationError::Kmc(e)
    }
}

/// Single-vacancy KMC simulation
pub struct Simulation<P: BarrierPredictor> {
    encoder: LatticeEncoder,
    state: LatticeState,
    engine: KmcEngine,
    predictor: P,
    rng: StdRng,
    step: u64,
    time: f64,
}

impl<P: BarrierPredictor> Simulation<P> {
    /// Snap the configuration onto the mesh and prepare the first step
    ///
    /// The vacancy atom must already carry type 0 in `configuration`.
    ///
    /// # Errors
    ///
    /// Any [`KmcError`] from mesh construction, assignment, lattice indexing
    /// or mask detection.
    pub fn new(
        params: SimulationParams,
        configuration: &Configuration,
        predictor: P,
        rng: StdRng,
    ) -> Result<Self, KmcError> {
        let mesh = VoxelMesh::new(configuration.box_lengths(), params.voxel_size)?;
        let grids = assign_atoms(&configuration.atoms, &mesh)?;
        let state = LatticeState::new(grids, params.vacancy_id)?;
        let encoder = LatticeEncoder::new(mesh, &state, params.cutoff)?;

        info!(
            "Simulation ready: {} atoms, vacancy {}, T={}, predictor={}",
            state.len(),
            params.vacancy_id,
            params.rates.temperature,
            predictor.name()
        );

        Ok(Self {
            encoder,
            state,
            engine: KmcEngine::new(params.rates, params.vacancy_id),
            predictor,
            rng,
            step: params.init_step,
            time: 0.0,
        })
    }

    #[inline]
    pub fn state(&self) -> &LatticeState {
        &self.state
    }

    #[inline]
    pub fn encoder(&self) -> &LatticeEncoder {
        &self.encoder
    }

    #[inline]
    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    #[inline]
    pub fn vacancy_id(&self) -> AtomId {
        self.engine.vacancy_id()
    }

    /// Current step label
    #[inline]
    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// Simulated time since construction
    #[inline]
    pub fn elapsed_time(&self) -> f64 {
        self.time
    }

    /// Snapshot of the current id to site map with mesh metadata
    pub fn init_map(&self) -> InitMap {
        InitMap::capture(self.encoder.mesh(), &self.state)
    }

    /// Observe the current environment without advancing
    ///
    /// # Errors
    ///
    /// As [`LatticeEncoder::observe`].
    pub fn observe(&self) -> Result<Observation, KmcError> {
        self.encoder.observe(&self.state)
    }

    /// Advance by one jump
    ///
    /// # Errors
    ///
    /// - [`KmcError::PredictorContract`] if the predictor does not return
    ///   exactly eight barriers
    /// - [`KmcError::DegenerateRates`] if no event can be sampled
    /// - lookup failures on corrupted state
    pub fn step(&mut self) -> Result<JumpEvent, KmcError> {
        let observation = self.encoder.observe(&self.state)?;
        let barriers = self.predictor.predict(&observation.features)?;
        if barriers.len() != NUM_PATHS {
            return Err(KmcError::PredictorContract(format!(
                "predictor '{}' returned {} barriers, expected {NUM_PATHS}",
                self.predictor.name(),
                barriers.len()
            )));
        }

        let event = self.engine.execute(
            &mut self.state,
            &observation.neighbor_ids,
            &barriers,
            &mut self.rng,
        )?;
        self.step += 1;
        self.time += event.jump_time;

        debug!(
            "step={} vacancy_from={} jump_id={} time={:.3e}",
            self.step, observation.center, event.jump_id, self.time
        );
        Ok(event)
    }

    /// Run `steps` jumps, recording each into `sink`
    ///
    /// The sink is flushed on every exit path; a flush failure after a step
    /// error does not mask the step error.
    ///
    /// # Errors
    ///
    /// The first step or sink failure.
    pub fn run<S: EventSink + ?Sized>(
        &mut self,
        steps: u64,
        sink: &mut S,
    ) -> Result<RunSummary, SimulationError> {
        info!("Running {} steps from step {}", steps, self.step);
        let first_step = self.step;

        let outcome = self.run_inner(steps, sink);
        let flushed = sink.flush();
        outcome?;
        flushed?;

        let summary = RunSummary {
            steps: self.step - first_step,
            final_step: self.step,
            elapsed_time: self.time,
            vacancy_id: self.vacancy_id(),
        };
        info!(
            "Run finished: {} steps, simulated time {:.4e} s",
            summary.steps, summary.elapsed_time
        );
        Ok(summary)
    }

    fn run_inner<S: EventSink + ?Sized>(
        &mut self,
        steps: u64,
        sink: &mut S,
    ) -> Result<(), SimulationError> {
        for _ in 0..steps {
            let event = self.step()?;
            sink.record(&event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{Hertz, Kelvin};
    use crate::encoding::FeatureMaps;
    use crate::predictor::ConstantPredictor;
    use crate::structure::{build_bcc, designate_vacancy};
    use rand::SeedableRng;

    fn params(vacancy_id: AtomId) -> SimulationParams {
        SimulationParams {
            rates: RateParams {
                attempt_frequency: Hertz::new(1e13),
                boltzmann_constant: 8.617333e-5,
                temperature: Kelvin::new(900.0),
            },
            voxel_size: 1.5,
            cutoff: 4.2,
            vacancy_id,
            init_step: 0,
        }
    }

    fn configuration(vacancy_id: AtomId) -> Configuration {
        let mut rng = StdRng::seed_from_u64(2);
        let mut config = build_bcc(3.0, [5, 5, 5], &[(1, 0.5), (2, 0.5)], &mut rng).unwrap();
        designate_vacancy(&mut config, vacancy_id).unwrap();
        config
    }

    /// Returns seven barriers
    struct ShortPredictor;

    impl BarrierPredictor for ShortPredictor {
        fn predict(&self, _: &FeatureMaps) -> Result<Vec<f64>, KmcError> {
            Ok(vec![0.5; 7])
        }

        fn name(&self) -> &'static str {
            "short"
        }
    }

    /// Sink that fails after a fixed number of records
    struct FailingSink {
        accepted: usize,
        limit: usize,
        flushed: bool,
    }

    impl EventSink for FailingSink {
        fn record(&mut self, _: &JumpEvent) -> Result<(), IoError> {
            if self.accepted == self.limit {
                return Err(IoError::Io("disk full".to_string()));
            }
            self.accepted += 1;
            Ok(())
        }

        fn flush(&mut self) -> Result<(), IoError> {
            self.flushed = true;
            Ok(())
        }
    }

    #[test]
    fn test_steps_advance_counters() {
        let mut sim = Simulation::new(
            params(10),
            &configuration(10),
            ConstantPredictor::new(0.6),
            StdRng::seed_from_u64(1),
        )
        .unwrap();

        let mut events: Vec<JumpEvent> = Vec::new();
        let summary = sim.run(25, &mut events).unwrap();
        assert_eq!(summary.steps, 25);
        assert_eq!(sim.step_count(), 25);
        assert_eq!(events.len(), 25);
        let total: f64 = events.iter().map(|e| e.jump_time).sum();
        approx::assert_relative_eq!(total, sim.elapsed_time(), max_relative = 1e-12);
        sim.state().verify().unwrap();
    }

    #[test]
    fn test_predictor_cardinality_enforced() {
        let mut sim = Simulation::new(
            params(10),
            &configuration(10),
            ShortPredictor,
            StdRng::seed_from_u64(1),
        )
        .unwrap();
        let before = sim.state().site_map();
        assert!(matches!(sim.step(), Err(KmcError::PredictorContract(_))));
        assert_eq!(sim.state().site_map(), before);
    }

    #[test]
    fn test_sink_is_flushed_on_error() {
        let mut sim = Simulation::new(
            params(10),
            &configuration(10),
            ConstantPredictor::new(0.6),
            StdRng::seed_from_u64(1),
        )
        .unwrap();
        let mut sink = FailingSink {
            accepted: 0,
            limit: 3,
            flushed: false,
        };
        let result = sim.run(10, &mut sink);
        assert!(matches!(result, Err(SimulationError::Io(_))));
        assert!(sink.flushed);
        assert_eq!(sink.accepted, 3);
    }

    #[test]
    fn test_init_step_offsets_counter() {
        let mut p = params(10);
        p.init_step = 500;
        let mut sim = Simulation::new(
            p,
            &configuration(10),
            ConstantPredictor::new(0.6),
            StdRng::seed_from_u64(1),
        )
        .unwrap();
        let mut events: Vec<JumpEvent> = Vec::new();
        let summary = sim.run(3, &mut events).unwrap();
        assert_eq!(summary.final_step, 503);
        assert_eq!(summary.steps, 3);
    }
}
