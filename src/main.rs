//! CNN Zoo CLI
//!
//! Inspect the architectures without allocating weights, or build one with
//! random weights and time its forward pass on the default backend.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use cnn_zoo::backend::{backend_name, default_device, DefaultBackend};
use cnn_zoo::inference::{run_benchmark, BenchmarkConfig};
use cnn_zoo::model::{Architecture, FeatureShape, ModelConfig};
use cnn_zoo::utils::logging::{init_logging, LogConfig};
use cnn_zoo::utils::{format_number, format_param_size};

/// Classic CNN architectures built with Burn
#[derive(Parser, Debug)]
#[command(name = "cnn_zoo")]
#[command(version)]
#[command(about = "Composable VGG and Xception builders with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Options selecting a model
#[derive(Args, Debug)]
struct ModelArgs {
    /// Architecture family (vgg or xception)
    #[arg(short, long, default_value = "vgg")]
    arch: Architecture,

    /// VGG layer count (16 or 19)
    #[arg(short, long, default_value = "16")]
    layers: usize,

    /// Input shape as H,W,C (architecture default if omitted)
    #[arg(short, long, value_parser = parse_input_shape)]
    input: Option<[usize; 3]>,

    /// Number of output classes
    #[arg(short, long, default_value = "1000")]
    classes: usize,

    /// Load the model configuration from a JSON file instead
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ModelArgs {
    fn to_config(&self) -> Result<ModelConfig> {
        if let Some(path) = &self.config {
            return ModelConfig::load(path)
                .with_context(|| format!("Failed to load config from {:?}", path));
        }

        let config = ModelConfig {
            architecture: self.arch,
            n_layers: self.layers,
            input_shape: self.input,
            num_classes: self.classes,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the layer-by-layer summary of a model
    Summary {
        #[command(flatten)]
        model: ModelArgs,

        /// Write the summary as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a model with random weights and benchmark its forward pass
    Forward {
        #[command(flatten)]
        model: ModelArgs,

        /// Batch size for each forward pass
        #[arg(short, long, default_value = "1")]
        batch_size: usize,

        /// Number of timed iterations
        #[arg(long, default_value = "10")]
        iterations: usize,

        /// Number of warmup iterations
        #[arg(long, default_value = "2")]
        warmup: usize,

        /// Write benchmark results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a default model configuration file
    InitConfig {
        /// Architecture family (vgg or xception)
        #[arg(short, long, default_value = "vgg")]
        arch: Architecture,

        /// Output JSON file
        #[arg(short, long, default_value = "model_config.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Summary { model, output } => {
            cmd_summary(&model, output.as_deref())?;
        }

        Commands::Forward {
            model,
            batch_size,
            iterations,
            warmup,
            output,
        } => {
            let bench = BenchmarkConfig {
                warmup_iterations: warmup,
                iterations,
                batch_size,
                verbose: cli.verbose,
            };
            cmd_forward(&model, bench, output.as_deref())?;
        }

        Commands::InitConfig { arch, output } => {
            cmd_init_config(arch, &output)?;
        }
    }

    Ok(())
}

fn parse_input_shape(s: &str) -> std::result::Result<[usize; 3], String> {
    let dims = s
        .split(',')
        .map(|d| d.trim().parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid input shape '{}': {}", s, e))?;

    match dims.as_slice() {
        &[h, w, c] => Ok([h, w, c]),
        _ => Err(format!(
            "invalid input shape '{}': expected H,W,C (e.g. 224,224,3)",
            s
        )),
    }
}

fn cmd_summary(model: &ModelArgs, output: Option<&Path>) -> Result<()> {
    let config = model.to_config()?;
    info!("Summarizing {} ({:?})", config.architecture, config.input_shape());

    let summary = config.summary()?;
    println!("{}", summary);

    let params = summary.total_params();
    println!(
        "{} {} ({})",
        "Output:".green(),
        summary.output().to_string().bold(),
        format_param_size(params)
    );

    if let Some(path) = output {
        std::fs::write(path, summary.to_json()?)
            .with_context(|| format!("Failed to write summary to {:?}", path))?;
        println!("{} {:?}", "Summary written to".green(), path);
    }

    Ok(())
}

fn cmd_forward(model: &ModelArgs, bench: BenchmarkConfig, output: Option<&Path>) -> Result<()> {
    bench.validate()?;
    let config = model.to_config()?;
    let device = default_device();

    println!("{}", "Building model...".cyan());
    println!("  Architecture: {}", config.architecture);
    println!("  Input shape: {:?}", config.input_shape());
    println!("  Backend: {}", backend_name());

    let zoo_model = config.init::<DefaultBackend>(&device)?;
    let params = burn::module::Module::num_params(&zoo_model);
    println!(
        "  Parameters: {} ({})",
        format_number(params),
        format_param_size(params)
    );

    println!();
    println!("{}", "Running benchmark...".green().bold());
    let input = FeatureShape::from_hwc(config.input_shape())?;
    let result = run_benchmark(&zoo_model, input, bench, &device)?;

    println!();
    println!("{}", result);
    println!(
        "  {} [{}, {}]",
        "Output shape:".green(),
        result.output_dims[0],
        result.output_dims[1]
    );
    println!(
        "  {} {} ± {} ms",
        "Mean latency:".green(),
        format!("{:.2}", result.latency.mean_ms).bold(),
        format!("{:.2}", result.latency.std_ms)
    );

    if let Some(path) = output {
        result.save(path)?;
        println!("{} {:?}", "Results saved to".green(), path);
    }

    Ok(())
}

fn cmd_init_config(arch: Architecture, output: &Path) -> Result<()> {
    let config = match arch {
        Architecture::Vgg => ModelConfig::default(),
        Architecture::Xception => ModelConfig::xception(),
    };

    config.save(output)?;
    println!(
        "{} {} config written to {:?}",
        "Done:".green().bold(),
        arch,
        output
    );

    Ok(())
}
