//! Building and running a simulation from a [`SimulationConfig`]

use super::{RunSummary, Simulation, SimulationError, SimulationParams};
use crate::config::{SimulationConfig, VacancySelection};
use crate::io::{read_dump_file, write_init_map, EventLog, EventSink, IoError};
use crate::kmc::JumpEvent;
use crate::predictor::MlpPredictor;
use crate::structure::{designate_vacancy, pick_random_vacancy};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use tracing::info;

/// Load the structure and model and build the simulation
///
/// The RNG is seeded once from `config.seed`; a random vacancy is drawn from
/// it before the first step. Atom assignment runs on a dedicated rayon pool
/// when `num_threads` is set.
///
/// # Errors
///
/// Any dump, model, thread pool or lattice construction failure.
pub fn from_config(config: &SimulationConfig) -> Result<Simulation<MlpPredictor>, SimulationError> {
    let mut structure = read_dump_file(&config.structure)?;
    let predictor = MlpPredictor::load(&config.model_weights)?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let vacancy_id = match config.vacancy {
        VacancySelection::Fixed { id } => id,
        VacancySelection::Random => pick_random_vacancy(&structure, &mut rng)?,
    };
    designate_vacancy(&mut structure, vacancy_id)?;
    info!("Vacancy atom id: {}", vacancy_id);

    let params = SimulationParams {
        rates: config.rate_params(),
        voxel_size: config.voxel_size,
        cutoff: config.cutoff,
        vacancy_id,
        init_step: config.init_step,
    };

    let build = move || Simulation::new(params, &structure, predictor, rng);
    let simulation = match config.num_threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| SimulationError::ThreadPool(e.to_string()))?;
            info!("Using {} threads for atom assignment", threads);
            pool.install(build)?
        }
        None => build()?,
    };
    Ok(simulation)
}

/// Full run: prepare the output directory, save the initial map, simulate and
/// write the event log
///
/// The output directory is created if missing; existing files named by the
/// configuration are overwritten.
///
/// # Errors
///
/// Any failure from [`from_config`], file output, or the simulation itself.
pub fn execute(config: &SimulationConfig) -> Result<RunSummary, SimulationError> {
    fs::create_dir_all(&config.output_dir).map_err(|e| {
        IoError::Io(format!("{}: {e}", config.output_dir.display()))
    })?;

    let mut simulation = from_config(config)?;
    write_init_map(config.init_map_path(), &simulation.init_map())?;

    let mut log = EventLog::create(config.log_path())?;
    if config.log_vacancy_id {
        log.record(&JumpEvent {
            jump_id: simulation.vacancy_id(),
            jump_time: 0.0,
        })?;
    }

    let summary = simulation.run(config.num_steps, &mut log)?;
    log.finish()?;
    info!("Event log written to {}", config.log_path().display());
    Ok(summary)
}
