use capsula::core::rayon;
use capsula::prelude::*;

use clap::{Parser, Subcommand};
use kdam::BarExt;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
struct ScalingSettings {
    n_capsules: usize,
    n_threads: usize,
    n_ticks: u64,
    parallel: bool,
}

impl ScalingSettings {
    fn setup(&self) -> SimulationSetup {
        let side = (8.0 * self.n_capsules as f64).sqrt().max(20.0);
        let mut setup = SimulationSetup::default();
        setup.domain.max = [side, side, 1.0];
        setup.n_initial = self.n_capsules;
        setup.settings.parallel = self.parallel;
        setup.settings.rng_seed = 1;
        setup
    }
}

fn run_simulation(settings: &ScalingSettings) -> Result<(), Box<dyn std::error::Error>> {
    let setup = settings.setup();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.n_threads)
        .build()?;
    pool.install(|| -> Result<(), SimulationError> {
        let mut simulation = Simulation::new(&setup)?;
        for _ in 0..settings.n_ticks {
            simulation.tick()?;
        }
        Ok(())
    })?;
    Ok(())
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct BenchmarkResult {
    settings: ScalingSettings,
    /// Wall time of every sample in nanoseconds
    times: Vec<u128>,
}

impl BenchmarkResult {
    fn store_to_file(&self, args: &CLIArgs, prefix: &str) -> Result<(), Box<dyn std::error::Error>> {
        let storage_path = args.storage_base_path().join(prefix);
        std::fs::create_dir_all(&storage_path)?;
        let index = std::fs::read_dir(&storage_path)?.count();
        let file = std::fs::File::create(storage_path.join(format!("{index:010}.json")))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

fn run_samples(
    args: &CLIArgs,
    settings: Vec<ScalingSettings>,
    prefix: &str,
) -> Result<Vec<BenchmarkResult>, Box<dyn std::error::Error>> {
    let mut bar = if args.no_output {
        None
    } else {
        Some(kdam::tqdm!(
            desc = prefix,
            total = settings.len() * args.sample_size,
            position = 0
        ))
    };
    let mut results = Vec::new();
    for setting in settings.into_iter() {
        // Warm-up
        run_simulation(&setting)?;
        let mut times = Vec::with_capacity(args.sample_size);
        for _ in 0..args.sample_size {
            let now = std::time::Instant::now();
            std::hint::black_box(run_simulation(&setting))?;
            times.push(now.elapsed().as_nanos());
            if let Some(bar) = bar.as_mut() {
                bar.set_description(format!(
                    "Capsules: {} Threads: {}",
                    setting.n_capsules, setting.n_threads
                ));
                bar.update(1)?;
            }
        }
        let result = BenchmarkResult {
            settings: setting,
            times,
        };
        if !args.no_save {
            result.store_to_file(args, prefix)?;
        }
        results.push(result);
    }
    Ok(results)
}

#[derive(Subcommand, Debug)]
enum SubCommand {
    /// Thread scaling benchmark
    Threads {
        /// List of thread configurations to benchmark
        threads: Vec<usize>,
        #[arg(short, long, default_value_t = 2000)]
        n_capsules: usize,
    },
    /// Colony size scaling benchmark
    Size {
        /// List of initial population sizes to benchmark
        sizes: Vec<usize>,
        #[arg(short, long, default_value_t = 1)]
        n_threads: usize,
    },
}

/// Measure the wall time of relaxing growing colonies
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CLIArgs {
    /// Name of the current runs such as name of the device to be benchmarked
    #[arg(required = true)]
    name: String,

    /// Output directory of benchmark results
    #[arg(short, long, default_value_t = format!("benchmark_results"))]
    output_directory: String,

    #[command(subcommand)]
    commands: Option<SubCommand>,

    /// Number of samples to be generated for each measurement
    #[arg(short, long, default_value_t = 5)]
    sample_size: usize,

    /// Number of ticks of every sample
    #[arg(long, default_value_t = 10)]
    n_ticks: u64,

    /// Do not save results
    #[arg(long, default_value_t = false)]
    no_save: bool,

    /// Disables output
    #[arg(long, default_value_t = false)]
    no_output: bool,
}

impl CLIArgs {
    fn storage_base_path(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(&self.output_directory).join(&self.name)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CLIArgs::parse();

    if let Some(command) = &args.commands {
        if !args.no_output {
            println!("Generating Results for device {}", args.name);
        }
        let results = match command {
            SubCommand::Threads {
                threads,
                n_capsules,
            } => {
                let settings = threads
                    .iter()
                    .map(|n_threads| ScalingSettings {
                        n_capsules: *n_capsules,
                        n_threads: *n_threads,
                        n_ticks: args.n_ticks,
                        parallel: true,
                    })
                    .collect();
                run_samples(&args, settings, "thread-scaling")?
            }
            SubCommand::Size { sizes, n_threads } => {
                let settings = sizes
                    .iter()
                    .map(|n_capsules| ScalingSettings {
                        n_capsules: *n_capsules,
                        n_threads: *n_threads,
                        n_ticks: args.n_ticks,
                        parallel: *n_threads > 1,
                    })
                    .collect();
                run_samples(&args, settings, "colony-size")?
            }
        };
        if !args.no_output {
            for result in results.iter() {
                let mean = result.times.iter().sum::<u128>() / result.times.len().max(1) as u128;
                println!(
                    "{:>8} capsules {:>3} threads: {:.3} ms",
                    result.settings.n_capsules,
                    result.settings.n_threads,
                    mean as f64 * 1e-6
                );
            }
        }
    }
    Ok(())
}
