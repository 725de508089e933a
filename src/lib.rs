pub mod access;
pub mod codec;
pub mod error;
pub mod estimator;
pub mod pipeline;
pub mod quantizer;
pub mod sampler;
pub mod service;
pub mod transport;

use std::path::PathBuf;
use error::Result;
use pipeline::{DownscaleReport, DownscaleSettings};

pub use error::PixelsError;
pub use estimator::estimate_grid_size;
pub use pipeline::{downscale, downscale_with_settings, reduce_colors, Downscaled};
pub use quantizer::{find_closest_color, KMeansQuantizer};
pub use sampler::{per_channel_median, sample, GridSpec};

/// Downscale a file off the async runtime's worker threads
pub async fn downscale_image_command(
    input_path: String,
    output_path: String,
    settings: DownscaleSettings,
) -> Result<DownscaleReport> {
    let input = PathBuf::from(input_path);
    let output = PathBuf::from(output_path);

    tokio::task::spawn_blocking(move || {
        pipeline::downscale_file(&input, &output, &settings)
    })
    .await
    .map_err(|e| PixelsError::Processing(format!("Task join error: {}", e)))?
}

pub async fn estimate_grid_size_command(input_path: String) -> Result<u32> {
    let input = PathBuf::from(input_path);

    tokio::task::spawn_blocking(move || {
        pipeline::estimate_file(&input)
    })
    .await
    .map_err(|e| PixelsError::Processing(format!("Task join error: {}", e)))?
}
