//! PNR command-line interface.
//!
//! Run reflectivity calculations from TOML job files:
//! ```sh
//! pnr run job.toml
//! pnr profile job.toml
//! pnr validate job.toml
//! pnr resolutions
//! ```

mod config;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pnr_profile::generate_sublayers;
use pnr_resolution::{ResolutionModel, ResolutionSpec};

#[derive(Parser)]
#[command(name = "pnr")]
#[command(about = "Specular reflectivity of magnetic multilayers for polarised neutrons")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the configured channels and compare with any data files.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the sublayer discretisation of the sample.
    Profile {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output file (default: <output directory>/profile.csv).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without computing reflectivity.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// List the built-in resolution models and their default parameters.
    Resolutions,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("PNR Reflectivity");
            println!("================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_job(&job)?;
            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            if job.output.save_csv {
                runner::write_curves_csv(&result, &out_dir.join("reflectivity.csv"), &job)?;
                if !result.fits.is_empty() {
                    runner::write_fits_csv(&result.fits, &out_dir.join("fits.csv"))?;
                }
            }
            if job.output.save_json {
                runner::write_json(&result, &out_dir.join("reflectivity.json"))?;
            }
            if job.output.save_profile {
                let profile = generate_sublayers(&job.stack)?;
                runner::write_profile_csv(&profile, &out_dir.join("profile.csv"))?;
            }

            println!("Calculation complete.");
            Ok(())
        }
        Commands::Profile { config, output } => {
            let job = config::load_config(&config)?;
            let profile = generate_sublayers(&job.stack)?;
            let path = output.unwrap_or_else(|| PathBuf::from(&job.output.directory).join("profile.csv"));
            runner::write_profile_csv(&profile, &path)?;
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let profile = generate_sublayers(&job.stack)?;
            let q = job.q.values();
            let sigma = job.resolution.sigma(&q)?;
            pnr_resolution::validate_grid(&q, &sigma)?;
            for data in &job.data {
                runner::load_measurement(data, &job.resolution)?;
            }
            println!("Configuration is valid: {}", config.display());
            println!(
                "  {} layers -> {} sublayers, {} Q points, {} channels, {} data files",
                job.stack.len(),
                profile.len(),
                q.len(),
                job.channels.len(),
                job.data.len()
            );
            Ok(())
        }
        Commands::Resolutions => {
            println!("Built-in resolution models ([resolution] kind = ...):");
            println!();
            for spec in ResolutionSpec::builtins() {
                let table = toml::to_string(&spec)?;
                println!("  {}", spec.name());
                for line in table.lines() {
                    println!("    {line}");
                }
                println!();
            }
            Ok(())
        }
    }
}
