use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixels_core::estimator;
use pixels_core::pipeline::{self, DownscaleSettings};

#[derive(Parser)]
#[command(name = "pixels")]
#[command(about = "Turn images into grid-sampled pixel art")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Downscale an image to a fixed grid width
    Downscale {
        /// Input image (PNG, JPEG or WebP)
        #[arg(short, long)]
        input: PathBuf,

        /// Output PNG file path
        #[arg(short, long)]
        output: PathBuf,

        /// Grid width in cells; estimated from the image when omitted
        #[arg(short, long)]
        grid: Option<u32>,

        /// JSON file with downscale settings
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Keep the sampled colors instead of snapping to a palette
        #[arg(long)]
        no_quantize: bool,

        /// Palette size when quantizing
        #[arg(long)]
        max_colors: Option<usize>,

        /// Upper bound on k-means passes
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Seed for palette initialisation
        #[arg(long)]
        seed: Option<u32>,
    },
    /// Recommend a grid width for an image
    Estimate {
        /// Input image (PNG, JPEG or WebP)
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn load_settings(path: Option<&PathBuf>) -> Result<DownscaleSettings> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid settings file {}", path.display()))
        }
        None => Ok(DownscaleSettings::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixels_core=warn,pixels=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Downscale {
            input,
            output,
            grid,
            settings,
            no_quantize,
            max_colors,
            max_iterations,
            seed,
        } => {
            let mut settings = load_settings(settings.as_ref())?;
            if no_quantize {
                settings.quantize = false;
            }
            if let Some(max_colors) = max_colors {
                settings.max_colors = max_colors;
            }
            if let Some(max_iterations) = max_iterations {
                settings.max_iterations = max_iterations;
            }
            if let Some(seed) = seed {
                settings.seed = seed;
            }
            settings.grid_width = match grid {
                Some(grid) => grid,
                None => {
                    let estimated = pipeline::estimate_file(&input)
                        .with_context(|| format!("Failed to estimate grid for {}", input.display()))?;
                    tracing::info!("Using estimated grid width {}", estimated);
                    estimated
                }
            };

            let report = pipeline::downscale_file(&input, &output, &settings)
                .with_context(|| format!("Failed to downscale {}", input.display()))?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Original size: {:?}", report.original_size);
                println!("Final size: {:?}", report.final_size);
                println!("Palette colors: {}", report.palette_size);
                println!("Output saved to: {}", output.display());
            }
        }
        Commands::Estimate { input } => {
            let img = pixels_core::codec::open(&input)
                .with_context(|| format!("Failed to load {}", input.display()))?;
            let stats = estimator::edge_stats(&img)?;
            let grid = estimator::estimate_grid_size(&img)?;

            if cli.json {
                let value = serde_json::json!({ "gridSize": grid, "edges": stats });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Edge density: {:.4} ({} of {} pixels)", stats.density, stats.edge_count, stats.total_pixels);
                println!("Suggested grid: {}", grid);
            }
        }
    }

    Ok(())
}
