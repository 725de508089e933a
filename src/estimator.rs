//! Grid size estimation from edge density.
//!
//! Busy images (many strong local gradients) get a finer recommended grid than
//! flat ones; larger images get a finer grid than small ones.

use image::RgbaImage;
use serde::Serialize;
use crate::error::{Result, PixelsError};

/// Minimum gradient (exclusive) for a pixel to count as an edge
pub const EDGE_THRESHOLD: u8 = 24;
pub const MIN_GRID_SIZE: u32 = 8;
pub const MAX_GRID_SIZE: u32 = 512;

const BASE_GRID_SIZE: f64 = 12.0;
const DENSITY_EXPONENT: f64 = 0.6;
const REFERENCE_DIMENSION: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeStats {
    pub edge_count: usize,
    pub total_pixels: usize,
    /// Edge pixels over all pixels, border included
    pub density: f64,
}

/// Luma of an 8-bit pixel, truncated
fn to_gray(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) as u8
}

/// Count interior pixels whose vertical or horizontal gradient exceeds
/// [`EDGE_THRESHOLD`].
pub fn edge_stats(img: &RgbaImage) -> Result<EdgeStats> {
    let (width, height) = img.dimensions();
    if width < 3 || height < 3 {
        return Err(PixelsError::InvalidDimensions {
            width,
            height,
            reason: "edge analysis needs at least 3x3 pixels",
        });
    }

    let gray: Vec<u8> = img.pixels().map(|p| to_gray(p[0], p[1], p[2])).collect();
    let w = width as usize;
    let h = height as usize;

    let mut edge_count = 0usize;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let up = gray[(y - 1) * w + x];
            let down = gray[(y + 1) * w + x];
            let left = gray[y * w + x - 1];
            let right = gray[y * w + x + 1];

            if up.abs_diff(down) > EDGE_THRESHOLD || left.abs_diff(right) > EDGE_THRESHOLD {
                edge_count += 1;
            }
        }
    }

    let total_pixels = w * h;
    Ok(EdgeStats {
        edge_count,
        total_pixels,
        density: edge_count as f64 / total_pixels as f64,
    })
}

/// Grid size suggested for a given edge density and source size, clamped to
/// `[MIN_GRID_SIZE, MAX_GRID_SIZE]`.
pub fn grid_size_for(density: f64, width: u32, height: u32) -> u32 {
    let density_factor = (density * 100.0).powf(DENSITY_EXPONENT);
    let max_dimension = width.max(height) as f64;
    let suggested = (BASE_GRID_SIZE * (1.0 + density_factor) * (max_dimension / REFERENCE_DIMENSION).log10()).round();

    (suggested * 2.0).clamp(MIN_GRID_SIZE as f64, MAX_GRID_SIZE as f64) as u32
}

/// Recommend a grid width for `img`. Fails for images under 3x3.
pub fn estimate_grid_size(img: &RgbaImage) -> Result<u32> {
    let stats = edge_stats(img)?;
    let (width, height) = img.dimensions();
    let grid = grid_size_for(stats.density, width, height);

    tracing::debug!(
        edge_count = stats.edge_count,
        density = stats.density,
        grid,
        "Estimated grid size"
    );

    Ok(grid)
}
