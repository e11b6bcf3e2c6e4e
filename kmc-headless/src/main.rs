use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vacancy_kmc_core::io::{read_event_log_file, read_init_map, write_dump_file};
use vacancy_kmc_core::simulation;
use vacancy_kmc_core::structure::build_bcc;
use vacancy_kmc_core::trajectory::{logged_jumps, write_trajectory};
use vacancy_kmc_core::{AtomSelection, AtomType, SimulationConfig};

/// Vacancy diffusion KMC with learned migration barriers
#[derive(Parser, Debug)]
#[command(name = "kmc-headless")]
#[command(about = "Single-vacancy kinetic Monte Carlo on bcc alloys", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log per-step events (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a simulation from a JSON configuration
    Run {
        /// Configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Generate a random bcc alloy as a LAMMPS dump
    BuildBcc {
        /// Cubic lattice constant
        #[arg(short = 'a', long)]
        lattice_constant: f64,

        /// Unit cells along x, y and z
        #[arg(long, num_args = 3, required = true, value_names = ["NX", "NY", "NZ"])]
        cells: Vec<usize>,

        /// Species as TYPE:CONCENTRATION, repeatable (e.g. --species 1:0.9 --species 2:0.1)
        #[arg(long = "species", required = true, value_parser = parse_species)]
        species: Vec<(AtomType, f64)>,

        /// Seed for the species draw
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Output dump file
        #[arg(short, long, default_value = "init.dump")]
        output: PathBuf,
    },
    /// Rebuild trajectory frames from an initial map and an event log
    Reconstruct {
        /// Initial map written by `run`
        #[arg(long)]
        init_map: PathBuf,

        /// Event log written by `run`
        #[arg(long)]
        log: PathBuf,

        /// Emit a frame every N jumps
        #[arg(short, long, default_value_t = 1)]
        interval: u64,

        /// Only include the vacancy and atoms that jumped
        #[arg(long)]
        effective: bool,

        /// Output dump file
        #[arg(short, long, default_value = "configs.dump")]
        output: PathBuf,
    },
}

fn parse_species(s: &str) -> Result<(AtomType, f64), String> {
    let (atom_type, concentration) = s
        .split_once(':')
        .ok_or_else(|| format!("expected TYPE:CONCENTRATION, got '{s}'"))?;
    let atom_type = atom_type
        .trim()
        .parse()
        .map_err(|e| format!("invalid type '{atom_type}': {e}"))?;
    let concentration = concentration
        .trim()
        .parse()
        .map_err(|e| format!("invalid concentration '{concentration}': {e}"))?;
    Ok((atom_type, concentration))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run { config } => {
            let config = SimulationConfig::load(&config)?;
            let summary = simulation::execute(&config)?;
            info!(
                "Done: {} jumps, final step {}, simulated time {:.4e} s",
                summary.steps, summary.final_step, summary.elapsed_time
            );
        }
        Commands::BuildBcc {
            lattice_constant,
            cells,
            species,
            seed,
            output,
        } => {
            let cells: [usize; 3] = cells
                .try_into()
                .map_err(|_| "expected exactly three cell counts")?;
            let mut rng = StdRng::seed_from_u64(seed);
            let structure = build_bcc(lattice_constant, cells, &species, &mut rng)?;
            write_dump_file(&output, &structure)?;
        }
        Commands::Reconstruct {
            init_map,
            log,
            interval,
            effective,
            output,
        } => {
            let init_map = read_init_map(&init_map)?;
            let events = read_event_log_file(&log)?;
            let jumps = logged_jumps(&init_map, &events);
            let selection = if effective {
                AtomSelection::Effective
            } else {
                AtomSelection::All
            };

            let mut writer = BufWriter::new(File::create(&output)?);
            let frames = write_trajectory(&mut writer, &init_map, &jumps, interval, selection)?;
            info!("Wrote {} frames to {}", frames, output.display());
        }
    }

    Ok(())
}
