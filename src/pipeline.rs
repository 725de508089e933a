//! Pixel Art Pipeline
//!
//! Orchestrates the transform:
//! 1. Optional k-means palette extraction (once per call)
//! 2. Grid sampling with per-channel medians
//! 3. Snapping each cell to the palette
//!
//! Grid estimation is a separate entry point that callers use to pick a grid
//! width before downscaling.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::codec;
use crate::error::Result;
use crate::quantizer::{KMeansQuantizer, DEFAULT_SEED};
use crate::sampler;

pub use crate::estimator::estimate_grid_size;

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownscaleSettings {
    /// Output width in cells (default: 32)
    pub grid_width: u32,
    /// Restrict output colors to a k-means palette (default: true)
    pub quantize: bool,
    /// Palette size when quantizing (default: 32)
    pub max_colors: usize,
    /// Upper bound on k-means passes (default: 20)
    pub max_iterations: usize,
    /// Seed for centroid initialisation (default: 1234)
    pub seed: u32,
}

impl Default for DownscaleSettings {
    fn default() -> Self {
        Self {
            grid_width: 32,
            quantize: true,
            max_colors: 32,
            max_iterations: 20,
            seed: DEFAULT_SEED,
        }
    }
}

impl DownscaleSettings {
    fn quantizer(&self) -> KMeansQuantizer {
        KMeansQuantizer::new(self.max_colors, self.max_iterations).with_seed(self.seed)
    }
}

/// Downscaled image together with the grid width that produced it
#[derive(Debug, Clone)]
pub struct Downscaled {
    pub grid: u32,
    pub image: RgbaImage,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownscaleReport {
    pub original_size: (u32, u32),
    pub final_size: (u32, u32),
    pub grid: u32,
    /// Number of palette entries used; 0 when quantization is off
    pub palette_size: usize,
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Downscale `img` to `grid_width` columns, optionally limited to
/// `max_colors` dominant colors.
pub fn downscale(img: &RgbaImage, grid_width: u32, quantize: bool, max_colors: usize) -> Result<Downscaled> {
    let settings = DownscaleSettings {
        grid_width,
        quantize,
        max_colors,
        ..DownscaleSettings::default()
    };
    downscale_with_settings(img, &settings)
}

pub fn downscale_with_settings(img: &RgbaImage, settings: &DownscaleSettings) -> Result<Downscaled> {
    Ok(run(img, settings)?.0)
}

/// Keep the source resolution and only reduce the palette
pub fn reduce_colors(img: &RgbaImage, max_colors: usize) -> Result<RgbaImage> {
    Ok(downscale(img, img.width(), true, max_colors)?.image)
}

fn run(img: &RgbaImage, settings: &DownscaleSettings) -> Result<(Downscaled, usize)> {
    let (width, height) = img.dimensions();
    // Validate geometry before paying for clustering
    sampler::GridSpec::new(width, height, settings.grid_width)?;

    let palette = if settings.quantize {
        let palette = settings.quantizer().find_dominant_colors(img)?;
        tracing::debug!("Found {} dominant colors", palette.len());
        palette
    } else {
        Vec::new()
    };

    let image = sampler::sample(img, settings.grid_width, &palette)?;

    tracing::info!(
        "Downscaled {}x{} to {}x{} ({} palette colors)",
        width,
        height,
        image.width(),
        image.height(),
        palette.len()
    );

    Ok((
        Downscaled {
            grid: settings.grid_width,
            image,
        },
        palette.len(),
    ))
}

/// Decode `input_path`, downscale it and write the result as PNG.
pub fn downscale_file(input_path: &Path, output_path: &Path, settings: &DownscaleSettings) -> Result<DownscaleReport> {
    let img = codec::open(input_path)?;
    let original_size = img.dimensions();

    let (result, palette_size) = run(&img, settings)?;
    codec::save_png(&result.image, output_path)?;

    Ok(DownscaleReport {
        original_size,
        final_size: result.image.dimensions(),
        grid: result.grid,
        palette_size,
    })
}

/// Decode `input_path` and recommend a grid width for it
pub fn estimate_file(input_path: &Path) -> Result<u32> {
    estimate_grid_size(&codec::open(input_path)?)
}
