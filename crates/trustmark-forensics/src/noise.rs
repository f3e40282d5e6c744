// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-tile noise statistics over the high-pass residual of a luma image.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;

/// JPEG block size; blockiness is measured across this grid.
const BLOCK: u32 = 8;

/// Scale factor turning a median absolute deviation into a Gaussian sigma.
pub(crate) const MAD_TO_SIGMA: f64 = 1.4826;

/// Statistics for one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TileStats {
    /// Robust noise level of the residual.
    pub noise_sigma: f64,
    /// Mean step across 8px block boundaries over the mean step inside blocks.
    pub blockiness: f64,
    /// 90th-percentile luma.
    pub background: f64,
}

/// Overlapping tiles laid out row-major.
#[derive(Debug, Clone)]
pub(crate) struct TileGrid {
    pub cols: u32,
    pub rows: u32,
    pub tile: u32,
    pub stride: u32,
    pub tiles: Vec<TileStats>,
}

impl TileGrid {
    pub fn get(&self, col: u32, row: u32) -> &TileStats {
        &self.tiles[(row * self.cols + col) as usize]
    }

    /// Pixel origin of a tile.
    pub fn origin(&self, col: u32, row: u32) -> (u32, u32) {
        (col * self.stride, row * self.stride)
    }
}

/// Compute the tile grid. `None` when the image is smaller than one tile.
pub(crate) fn tile_grid(gray: &GrayImage, tile: u32, stride: u32) -> Option<TileGrid> {
    let (width, height) = gray.dimensions();
    if tile == 0 || stride == 0 || width < tile || height < tile {
        return None;
    }
    let cols = (width - tile) / stride + 1;
    let rows = (height - tile) / stride + 1;

    // Blur in f32 so a flat area leaves an exactly zero residual.
    let luma: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(width, height, |x, y| Luma([gray.get_pixel(x, y).0[0] as f32]));
    let blurred = gaussian_blur_f32(&luma, 1.0);
    let residual: Vec<f32> = luma
        .as_raw()
        .iter()
        .zip(blurred.as_raw())
        .map(|(&value, &smooth)| value - smooth)
        .collect();

    let mut tiles = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        for col in 0..cols {
            let (x0, y0) = (col * stride, row * stride);
            tiles.push(TileStats {
                noise_sigma: residual_sigma(&residual, width, x0, y0, tile),
                blockiness: blockiness(gray, x0, y0, tile),
                background: percentile_luma(gray, x0, y0, tile, 0.9),
            });
        }
    }

    Some(TileGrid {
        cols,
        rows,
        tile,
        stride,
        tiles,
    })
}

/// 1.4826 × median |residual| using a histogram, interpolated within the median bin.
fn residual_sigma(residual: &[f32], width: u32, x0: u32, y0: u32, tile: u32) -> f64 {
    let mut histogram = [0u32; 256];
    for y in y0..y0 + tile {
        let start = (y * width + x0) as usize;
        for &value in &residual[start..start + tile as usize] {
            histogram[value.abs().round().min(255.0) as usize] += 1;
        }
    }
    MAD_TO_SIGMA * histogram_median(&histogram, tile * tile)
}

fn histogram_median(histogram: &[u32; 256], total: u32) -> f64 {
    let half = total as f64 / 2.0;
    let mut below = 0u32;
    for (bin, &count) in histogram.iter().enumerate() {
        if count > 0 && (below + count) as f64 >= half {
            let fraction = (half - below as f64) / count as f64;
            return (bin as f64 + fraction - 0.5).max(0.0);
        }
        below += count;
    }
    0.0
}

fn blockiness(gray: &GrayImage, x0: u32, y0: u32, tile: u32) -> f64 {
    let mut boundary = (0u64, 0u64);
    let mut interior = (0u64, 0u64);

    let mut record = |position: u32, step: u64| {
        let bucket = if position % BLOCK == 0 {
            &mut boundary
        } else {
            &mut interior
        };
        bucket.0 += step;
        bucket.1 += 1;
    };

    for y in y0..y0 + tile {
        for x in x0 + 1..x0 + tile {
            let step = gray.get_pixel(x, y).0[0].abs_diff(gray.get_pixel(x - 1, y).0[0]);
            record(x, step as u64);
        }
    }
    for y in y0 + 1..y0 + tile {
        for x in x0..x0 + tile {
            let step = gray.get_pixel(x, y).0[0].abs_diff(gray.get_pixel(x, y - 1).0[0]);
            record(y, step as u64);
        }
    }

    let mean = |(sum, count): (u64, u64)| {
        if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        }
    };
    let inside = mean(interior);
    if inside < 0.5 || boundary.1 == 0 {
        return 1.0;
    }
    mean(boundary) / inside
}

fn percentile_luma(gray: &GrayImage, x0: u32, y0: u32, tile: u32, quantile: f64) -> f64 {
    let mut histogram = [0u32; 256];
    for y in y0..y0 + tile {
        for x in x0..x0 + tile {
            histogram[gray.get_pixel(x, y).0[0] as usize] += 1;
        }
    }
    let target = (quantile * (tile * tile) as f64).ceil() as u32;
    let mut seen = 0u32;
    for (value, &count) in histogram.iter().enumerate() {
        seen += count;
        if seen >= target {
            return value as f64;
        }
    }
    255.0
}

/// Median of a slice (NaN-free input); 0.0 when empty.
pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median and MAD-based sigma, the spread floored at `floor`.
pub(crate) fn robust_center(values: &[f64], floor: f64) -> (f64, f64) {
    let center = median(values);
    let deviations: Vec<f64> = values.iter().map(|value| (value - center).abs()).collect();
    let spread = (MAD_TO_SIGMA * median(&deviations)).max(floor);
    (center, spread)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_image_has_no_noise_and_neutral_blockiness() {
        let gray = GrayImage::from_pixel(64, 64, Luma([128u8]));
        let grid = tile_grid(&gray, 32, 16).expect("grid");
        assert_eq!((grid.cols, grid.rows), (3, 3));
        for tile in &grid.tiles {
            assert_eq!(tile.noise_sigma, 0.0);
            assert_eq!(tile.blockiness, 1.0);
            assert_eq!(tile.background, 128.0);
        }
    }

    #[test]
    fn image_smaller_than_tile_has_no_grid() {
        let gray = GrayImage::from_pixel(20, 40, Luma([0u8]));
        assert!(tile_grid(&gray, 32, 16).is_none());
    }

    #[test]
    fn block_edges_raise_blockiness() {
        // Constant 8x8 blocks with alternating levels: all steps sit on the grid.
        let gray = GrayImage::from_fn(32, 32, |x, y| {
            let level = if (x / 8 + y / 8) % 2 == 0 { 100 } else { 120 };
            // Mild in-block texture so the interior mean is non-zero.
            Luma([level + ((x + y) % 2) as u8])
        });
        let grid = tile_grid(&gray, 32, 32).expect("grid");
        assert!(grid.tiles[0].blockiness > 5.0, "{:?}", grid.tiles[0]);
    }

    #[test]
    fn histogram_median_interpolates() {
        let mut histogram = [0u32; 256];
        histogram[0] = 10;
        assert_eq!(histogram_median(&histogram, 10), 0.0);

        histogram[0] = 0;
        histogram[4] = 10;
        assert!((histogram_median(&histogram, 10) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn robust_center_ignores_outliers() {
        let (center, spread) = robust_center(&[1.0, 1.0, 1.1, 0.9, 50.0], 0.1);
        assert!((center - 1.0).abs() < 1e-9);
        assert!(spread < 0.2);
    }

    #[test]
    fn median_of_even_count() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }
}
