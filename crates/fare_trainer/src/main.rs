//! taxifare CLI
//!
//! Trains taxi fare, distance and time models and serves predictions, either
//! through the interactive menu or one-shot subcommands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taxifare_core::{persist, ReducedRecord, Target};
use taxifare_trainer::shell::{default_trip, train_and_save, ManualField, Shell};
use taxifare_trainer::{evaluate_dataset, AppConfig};

#[derive(Parser, Debug)]
#[command(name = "taxifare")]
#[command(author = "taxifare Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic GBDT taxi fare prediction", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the train/test datasets
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory for model artifacts (defaults to the data directory)
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the fare model, then open the interactive menu (default)
    Shell,

    /// Train and save a model
    Train {
        #[arg(long, default_value = "fare")]
        target: Target,
    },

    /// Evaluate a saved model on the test dataset
    Evaluate {
        #[arg(long, default_value = "fare")]
        target: Target,
    },

    /// Predict one trip with a saved model; unset fields take the manual defaults
    Predict {
        #[arg(long, default_value = "fare")]
        target: Target,

        /// Trip distance
        #[arg(long)]
        distance: Option<f32>,

        /// Trip time in minutes
        #[arg(long)]
        minutes: Option<f32>,

        /// Passenger count
        #[arg(long)]
        passengers: Option<f32>,
    },
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    if let Some(dir) = &args.data_dir {
        config.paths.data_dir = dir.clone();
    }
    if let Some(dir) = &args.model_dir {
        config.paths.model_dir = Some(dir.clone());
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_logging(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.logging.level, args.verbose);

    info!("taxifare v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", config.paths.data_dir.display());
    info!("Model directory: {}", config.model_dir().display());

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.command.unwrap_or(Command::Shell) {
        Command::Shell => {
            let model = train_and_save(&config, Target::Fare, &mut out)
                .context("Failed to train the fare model")?;
            let stdin = io::stdin();
            let mut shell = Shell::new(config, model, stdin.lock(), out);
            shell.run().context("Shell terminated")?;
        }
        Command::Train { target } => {
            let model = train_and_save(&config, target, &mut out)
                .with_context(|| format!("Failed to train the {target} model"))?;
            info!("Model hash: {}", model.hash_hex()?);
        }
        Command::Evaluate { target } => {
            let path = config.model_path(target);
            let model = persist::load(&path)
                .with_context(|| format!("Failed to load model {}", path.display()))?;
            let metrics = evaluate_dataset(&model, &config.test_path())
                .with_context(|| format!("Failed to evaluate the {target} model"))?;
            writeln!(out, "{target} model on {} rows", metrics.count)?;
            writeln!(out, "{metrics}")?;
        }
        Command::Predict {
            target,
            distance,
            minutes,
            passengers,
        } => {
            let mut trip = default_trip();
            let overrides = [
                (ManualField::Distance, distance),
                (ManualField::Minutes, minutes),
                (ManualField::Passengers, passengers),
            ];
            for (field, value) in overrides {
                if let Some(value) = value {
                    field.apply(&mut trip, value);
                }
            }

            let path = config.model_path(target);
            let model = persist::load(&path)
                .with_context(|| format!("Failed to load model {}", path.display()))?;
            let prediction = match target {
                Target::Fare => model.predict(&trip)?,
                Target::Distance | Target::Time => model.predict(&ReducedRecord::from(&trip))?,
            };
            writeln!(out, "{prediction}")?;
        }
    }

    Ok(())
}
