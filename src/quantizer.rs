//! K-Means Color Quantization
//!
//! Derives a small dominant-color palette with Lloyd's algorithm and maps
//! arbitrary colors onto it.
//!
//! Runs are fully deterministic: centroid seeding and empty-cluster reseeding
//! draw from an [`Lcg`] owned by the run, never from global state.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use crate::error::{Result, PixelsError};

/// Upper bound on the number of points fed to clustering
pub const MAX_KMEANS_PIXELS: usize = 50_000;

/// Default starting state of the seeding generator
pub const DEFAULT_SEED: u32 = 1234;

const LCG_MULTIPLIER: u64 = 9301;
const LCG_INCREMENT: u64 = 49297;
const LCG_MODULUS: u64 = 233_280;

type Point = [i32; 3];

// ============================================================================
// SEEDED GENERATOR
// ============================================================================

/// Linear congruential generator used for centroid seeding.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self { state: seed as u64 }
    }

    /// Advance the state and return a value in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        self.state = (self.state * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
        self.state as f64 / LCG_MODULUS as f64
    }

    /// Draw an index in `0..len`
    fn next_index(&mut self, len: usize) -> usize {
        ((self.next_f64() * len as f64) as usize).min(len - 1)
    }
}

// ============================================================================
// SETTINGS & RESULTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeansQuantizer {
    /// Requested palette size (default: 32)
    pub max_colors: usize,
    /// Upper bound on reassignment passes (default: 20)
    pub max_iterations: usize,
    /// Generator seed (default: 1234)
    pub seed: u32,
}

impl Default for KMeansQuantizer {
    fn default() -> Self {
        Self {
            max_colors: 32,
            max_iterations: 20,
            seed: DEFAULT_SEED,
        }
    }
}

/// Outcome of one clustering run
#[derive(Debug, Clone)]
pub struct Clustering {
    pub palette: Vec<Rgba<u8>>,
    /// Reassignment passes actually performed
    pub iterations: usize,
    pub converged: bool,
    /// Points clustered after subsampling
    pub sample_size: usize,
}

// ============================================================================
// CLUSTERING
// ============================================================================

impl KMeansQuantizer {
    pub fn new(max_colors: usize, max_iterations: usize) -> Self {
        Self {
            max_colors,
            max_iterations,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Palette of at most `max_colors` dominant colors, in centroid order.
    pub fn find_dominant_colors(&self, img: &RgbaImage) -> Result<Vec<Rgba<u8>>> {
        Ok(self.cluster(img)?.palette)
    }

    /// Run k-means over the image and report how it went.
    pub fn cluster(&self, img: &RgbaImage) -> Result<Clustering> {
        if self.max_colors == 0 {
            return Err(PixelsError::InvalidParameter(
                "max_colors must be at least 1".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(PixelsError::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        let dataset = subsample(collect_points(img));
        if dataset.is_empty() {
            return Ok(Clustering {
                palette: Vec::new(),
                iterations: 0,
                converged: true,
                sample_size: 0,
            });
        }

        let mut rng = Lcg::new(self.seed);
        let k = self.max_colors.min(dataset.len());
        let mut centroids: Vec<Point> = (0..k)
            .map(|_| dataset[rng.next_index(dataset.len())])
            .collect();

        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;

            let mut means = vec![RunningMean::default(); k];
            for point in &dataset {
                means[nearest_centroid(point, &centroids)].push(point);
            }

            let mut all_equal = true;
            for (centroid, mean) in centroids.iter_mut().zip(&means) {
                let updated = mean
                    .value()
                    .unwrap_or_else(|| dataset[rng.next_index(dataset.len())]);

                all_equal &= updated == *centroid;
                *centroid = updated;
            }

            if all_equal {
                converged = true;
                break;
            }
        }

        tracing::debug!(
            k,
            iterations,
            converged,
            sample_size = dataset.len(),
            "k-means finished"
        );

        let palette = centroids
            .iter()
            .map(|c| Rgba([clamp_channel(c[0]), clamp_channel(c[1]), clamp_channel(c[2]), 255]))
            .collect();

        Ok(Clustering {
            palette,
            iterations,
            converged,
            sample_size: dataset.len(),
        })
    }
}

/// RGB triples of every pixel in row-major order; alpha is ignored
fn collect_points(img: &RgbaImage) -> Vec<Point> {
    img.pixels()
        .map(|p| [p[0] as i32, p[1] as i32, p[2] as i32])
        .collect()
}

/// Keep every `stride`-th point when the dataset exceeds the cap
fn subsample(dataset: Vec<Point>) -> Vec<Point> {
    if dataset.len() <= MAX_KMEANS_PIXELS {
        return dataset;
    }
    let stride = dataset.len().div_ceil(MAX_KMEANS_PIXELS);
    dataset.into_iter().step_by(stride).collect()
}

fn squared_distance(a: &Point, b: &Point) -> i64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = (x - y) as i64;
            d * d
        })
        .sum()
}

/// Index of the closest centroid; the lowest index wins on ties
fn nearest_centroid(point: &Point, centroids: &[Point]) -> usize {
    let mut best_index = 0;
    let mut best_dist = i64::MAX;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_index = i;
        }
    }
    best_index
}

/// Incremental per-cluster mean, updated point by point in dataset order
#[derive(Debug, Clone, Default)]
struct RunningMean {
    mean: [f64; 3],
    count: usize,
}

impl RunningMean {
    fn push(&mut self, point: &Point) {
        self.count += 1;
        for (m, &v) in self.mean.iter_mut().zip(point) {
            *m += (v as f64 - *m) / self.count as f64;
        }
    }

    /// Mean rounded half away from zero; `None` when nothing was pushed
    fn value(&self) -> Option<Point> {
        if self.count == 0 {
            return None;
        }
        Some(self.mean.map(|m| m.round() as i32))
    }
}

fn clamp_channel(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

// ============================================================================
// NEAREST PALETTE ENTRY
// ============================================================================

/// Squared RGB distance between two colors; alpha is ignored
pub fn color_distance(a: &Rgba<u8>, b: &Rgba<u8>) -> u32 {
    (0..3)
        .map(|c| {
            let d = a[c] as i32 - b[c] as i32;
            (d * d) as u32
        })
        .sum()
}

/// First palette entry at minimal RGB distance from `color`.
pub fn find_closest_color(color: &Rgba<u8>, palette: &[Rgba<u8>]) -> Result<Rgba<u8>> {
    let mut best = *palette.first().ok_or(PixelsError::EmptyPalette)?;
    let mut best_dist = color_distance(color, &best);

    for candidate in &palette[1..] {
        let dist = color_distance(color, candidate);
        if dist < best_dist {
            best_dist = dist;
            best = *candidate;
        }
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    fn two_tone(width: u32, height: u32) -> RgbaImage {
        ImageBuffer::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([250, 10, 10, 255])
            } else {
                Rgba([10, 10, 250, 255])
            }
        })
    }

    #[test]
    fn test_lcg_sequence() {
        let mut rng = Lcg::new(DEFAULT_SEED);
        // (1234 * 9301 + 49297) % 233280 = 96011
        let first = rng.next_f64();
        assert!((first - 96011.0 / 233280.0).abs() < 1e-12);
        let second = rng.next_f64();
        assert!((0.0..1.0).contains(&second));
        assert_ne!(first, second);
    }

    #[test]
    fn test_subsample_stride() {
        let points: Vec<Point> = (0..120_000).map(|i| [i % 256, 0, 0]).collect();
        let sampled = subsample(points);
        // stride = ceil(120000 / 50000) = 3
        assert_eq!(sampled.len(), 40_000);
        assert_eq!(sampled[1], [3, 0, 0]);
    }

    #[test]
    fn test_nearest_centroid_ties_prefer_lowest_index() {
        let centroids = [[0, 0, 0], [10, 0, 0], [0, 0, 0]];
        assert_eq!(nearest_centroid(&[5, 0, 0], &centroids), 0);
        assert_eq!(nearest_centroid(&[9, 0, 0], &centroids), 1);
    }

    #[test]
    fn test_running_mean_rounds() {
        let mut mean = RunningMean::default();
        assert_eq!(mean.value(), None);
        mean.push(&[1, 2, 3]);
        mean.push(&[2, 3, 4]);
        assert_eq!(mean.value(), Some([2, 3, 4]));
    }

    #[test]
    fn test_two_tone_palette() {
        let img = two_tone(8, 8);
        let palette = KMeansQuantizer::new(2, 20).find_dominant_colors(&img).unwrap();
        assert_eq!(palette.len(), 2);
        assert!(palette.contains(&Rgba([250, 10, 10, 255])));
        assert!(palette.contains(&Rgba([10, 10, 250, 255])));
    }

    #[test]
    fn test_palette_size_capped_by_pixel_count() {
        let img: RgbaImage = ImageBuffer::from_pixel(2, 2, Rgba([1, 2, 3, 40]));
        let clustering = KMeansQuantizer::new(32, 5).cluster(&img).unwrap();
        assert_eq!(clustering.palette.len(), 4);
        assert!(clustering.iterations <= 5);
        assert!(clustering.palette.iter().all(|c| *c == Rgba([1, 2, 3, 255])));
    }

    #[test]
    fn test_iterations_bounded() {
        let img: RgbaImage = ImageBuffer::from_fn(40, 40, |x, y| {
            Rgba([(x * 6) as u8, (y * 6) as u8, ((x + y) * 3) as u8, 255])
        });
        let clustering = KMeansQuantizer::new(8, 1).cluster(&img).unwrap();
        assert_eq!(clustering.iterations, 1);
        assert_eq!(clustering.palette.len(), 8);
    }

    #[test]
    fn test_deterministic_runs() {
        let img: RgbaImage = ImageBuffer::from_fn(30, 20, |x, y| {
            Rgba([(x * 8) as u8, (y * 12) as u8, (x * y) as u8, 255])
        });
        let quantizer = KMeansQuantizer::new(6, 20).with_seed(99);
        let a = quantizer.find_dominant_colors(&img).unwrap();
        let b = quantizer.find_dominant_colors(&img).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_zero_colors() {
        let img = two_tone(4, 4);
        let err = KMeansQuantizer::new(0, 20).find_dominant_colors(&img).unwrap_err();
        assert!(matches!(err, PixelsError::InvalidParameter(_)));
        let err = KMeansQuantizer::new(4, 0).find_dominant_colors(&img).unwrap_err();
        assert!(matches!(err, PixelsError::InvalidParameter(_)));
    }

    #[test]
    fn test_closest_color_empty_palette() {
        let err = find_closest_color(&Rgba([0, 0, 0, 255]), &[]).unwrap_err();
        assert!(matches!(err, PixelsError::EmptyPalette));
    }

    #[test]
    fn test_closest_color_idempotent() {
        let palette = [
            Rgba([0, 0, 0, 255]),
            Rgba([200, 30, 30, 255]),
            Rgba([30, 200, 30, 255]),
        ];
        for color in &palette {
            assert_eq!(find_closest_color(color, &palette).unwrap(), *color);
        }
    }

    #[test]
    fn test_closest_color_ignores_alpha_and_keeps_first_tie() {
        let palette = [Rgba([10, 0, 0, 255]), Rgba([30, 0, 0, 255])];
        // equidistant from both entries
        let closest = find_closest_color(&Rgba([20, 0, 0, 0]), &palette).unwrap();
        assert_eq!(closest, Rgba([10, 0, 0, 255]));
    }
}
