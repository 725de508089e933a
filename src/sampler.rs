//! Grid Sampling
//!
//! Partitions a source image into `grid_width x grid_height` cells and emits
//! one representative color per cell.

use image::{ImageBuffer, Rgba, RgbaImage};
use crate::error::{Result, PixelsError};
use crate::quantizer::find_closest_color;

/// Color used for an empty first cell
pub const EMPTY_CELL_FALLBACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

// ============================================================================
// GRID GEOMETRY
// ============================================================================

/// Output grid dimensions and the fractional source span of one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub grid_width: u32,
    pub grid_height: u32,
    pub cell_width: f64,
    pub cell_height: f64,
    source_width: u32,
    source_height: u32,
}

impl GridSpec {
    /// Derive the grid for a `width x height` source. The height keeps the
    /// source aspect ratio and never drops below one row.
    pub fn new(width: u32, height: u32, grid_width: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PixelsError::InvalidDimensions {
                width,
                height,
                reason: "image has no pixels",
            });
        }
        if grid_width == 0 {
            return Err(PixelsError::InvalidParameter(
                "grid width must be at least 1".to_string(),
            ));
        }

        let grid_height = ((height as f64 * grid_width as f64 / width as f64).round() as u32).max(1);

        Ok(Self {
            grid_width,
            grid_height,
            cell_width: width as f64 / grid_width as f64,
            cell_height: height as f64 / grid_height as f64,
            source_width: width,
            source_height: height,
        })
    }

    /// Source pixel ranges `(x_range, y_range)` covered by grid cell (x, y)
    pub fn cell_bounds(&self, x: u32, y: u32) -> (std::ops::Range<u32>, std::ops::Range<u32>) {
        let span = |i: u32, size: f64, limit: u32| {
            let start = ((i as f64 * size).floor() as u32).min(limit);
            let end = (((i + 1) as f64 * size).floor() as u32).min(limit);
            start..end
        };
        (
            span(x, self.cell_width, self.source_width),
            span(y, self.cell_height, self.source_height),
        )
    }
}

// ============================================================================
// CELL COLOR
// ============================================================================

/// Median of each channel taken independently.
///
/// Every channel is sorted on its own and the element at `len / 2` is kept, so
/// the result may combine channels from different source pixels. Returns
/// `None` for an empty slice.
pub fn per_channel_median(pixels: &[Rgba<u8>]) -> Option<Rgba<u8>> {
    if pixels.is_empty() {
        return None;
    }

    let median_index = pixels.len() / 2;
    let mut channel = Vec::with_capacity(pixels.len());
    let mut median = [0u8; 4];

    for (c, out) in median.iter_mut().enumerate() {
        channel.clear();
        channel.extend(pixels.iter().map(|p| p[c]));
        let (_, value, _) = channel.select_nth_unstable(median_index);
        *out = *value;
    }

    Some(Rgba(median))
}

// ============================================================================
// SAMPLING
// ============================================================================

/// Downsample `img` to `grid_width` columns.
///
/// When `palette` is non-empty every emitted color is snapped to its nearest
/// entry. Cells that cover no source pixels repeat the previous emitted color
/// (or [`EMPTY_CELL_FALLBACK`] for the first cell).
pub fn sample(img: &RgbaImage, grid_width: u32, palette: &[Rgba<u8>]) -> Result<RgbaImage> {
    let (width, height) = img.dimensions();
    let grid = GridSpec::new(width, height, grid_width)?;

    tracing::debug!(
        "Sampling {}x{} into {}x{} grid (cell {:.3}x{:.3})",
        width,
        height,
        grid.grid_width,
        grid.grid_height,
        grid.cell_width,
        grid.cell_height
    );

    let mut output: RgbaImage = ImageBuffer::new(grid.grid_width, grid.grid_height);
    let max_cell = (grid.cell_width.ceil() * grid.cell_height.ceil()) as usize;
    let mut cell_pixels: Vec<Rgba<u8>> = Vec::with_capacity(max_cell);
    let mut previous: Option<Rgba<u8>> = None;
    let mut empty_cells = 0usize;

    for y in 0..grid.grid_height {
        for x in 0..grid.grid_width {
            let (xs, ys) = grid.cell_bounds(x, y);

            cell_pixels.clear();
            for cy in ys {
                for cx in xs.clone() {
                    cell_pixels.push(*img.get_pixel(cx, cy));
                }
            }

            let color = match per_channel_median(&cell_pixels) {
                Some(median) if palette.is_empty() => median,
                Some(median) => find_closest_color(&median, palette)?,
                None => {
                    empty_cells += 1;
                    match previous {
                        Some(color) => color,
                        None if palette.is_empty() => EMPTY_CELL_FALLBACK,
                        None => find_closest_color(&EMPTY_CELL_FALLBACK, palette)?,
                    }
                }
            };

            output.put_pixel(x, y, color);
            previous = Some(color);
        }
    }

    if empty_cells > 0 {
        tracing::warn!(
            empty_cells,
            "Grid is finer than the source; empty cells reuse the previous color"
        );
    }

    Ok(output)
}
