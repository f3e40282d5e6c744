// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paste detection: tiles whose noise level or compression signature departs
// from the rest of the image are grouped into candidate regions.

use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use trustmark_core::ForensicsConfig;
use tracing::debug;

use crate::noise::{TileGrid, median, robust_center, tile_grid};

/// Spread floors keep near-uniform images from turning tiny wobbles into outliers.
const NOISE_SPREAD_FLOOR: f64 = 0.1;
const BLOCK_SPREAD_FLOOR: f64 = 0.15;

/// A candidate tampered rectangle inside one image.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImageRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Mean noise sigma of the member tiles.
    pub noise_sigma: f64,
    /// Median tile noise sigma of the whole image.
    pub background_noise_sigma: f64,
    pub blockiness: f64,
    /// Mean 90th-percentile luma of the member tiles.
    pub background_level: f64,
    /// Same, over the non-anomalous tiles in a one-tile ring around the region.
    pub surround_level: f64,
    /// Closeness of this region's signature to the nearest other region, 0..=1.
    pub similarity: f64,
}

impl ImageRegion {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// The region's paper tone differs from what surrounds it.
    pub fn background_shift(&self) -> f64 {
        (self.background_level - self.surround_level).abs()
    }
}

/// Run paste detection on a decoded image.
pub(crate) fn find_regions(gray: &GrayImage, config: &ForensicsConfig) -> Vec<ImageRegion> {
    let Some(grid) = tile_grid(gray, config.tile_size, config.tile_stride) else {
        return Vec::new();
    };

    let noise: Vec<f64> = grid.tiles.iter().map(|tile| tile.noise_sigma).collect();
    let background_noise = median(&noise);
    if background_noise < config.min_background_noise {
        debug!(background_noise, "Image too clean for noise analysis");
        return Vec::new();
    }

    let log_noise: Vec<f64> = noise.iter().map(|sigma| signature_noise(*sigma)).collect();
    let block: Vec<f64> = grid.tiles.iter().map(|tile| tile.blockiness).collect();
    let (noise_center, noise_spread) = robust_center(&log_noise, NOISE_SPREAD_FLOOR);
    let (block_center, block_spread) = robust_center(&block, BLOCK_SPREAD_FLOOR);

    let mask = GrayImage::from_fn(grid.cols, grid.rows, |col, row| {
        let index = (row * grid.cols + col) as usize;
        let noise_z = (log_noise[index] - noise_center).abs() / noise_spread;
        let block_z = (block[index] - block_center).abs() / block_spread;
        if noise_z > config.deviation_sigmas || block_z > config.deviation_sigmas {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
    let mut components: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();
    for (col, row, label) in labels.enumerate_pixels() {
        if label.0[0] != 0 {
            components.entry(label.0[0]).or_default().push((col, row));
        }
    }

    let (width, height) = gray.dimensions();
    let max_area = config.max_region_fraction * (width as f64 * height as f64);
    let global_background = median(&grid.tiles.iter().map(|tile| tile.background).collect::<Vec<_>>());

    let mut regions: Vec<ImageRegion> = components
        .values()
        .map(|tiles| {
            build_region(&grid, &mask, tiles, background_noise, global_background)
        })
        .filter(|region| {
            let area = region.area();
            area >= config.min_region_area as u64 && (area as f64) <= max_area
        })
        .collect();

    score_similarity(&mut regions, noise_spread, block_spread);
    debug!(
        tiles = grid.tiles.len(),
        components = components.len(),
        regions = regions.len(),
        "Paste detection finished"
    );
    regions
}

fn signature_noise(sigma: f64) -> f64 {
    (sigma + 0.5).ln()
}

fn build_region(
    grid: &TileGrid,
    mask: &GrayImage,
    tiles: &[(u32, u32)],
    background_noise: f64,
    global_background: f64,
) -> ImageRegion {
    let min_col = tiles.iter().map(|(col, _)| *col).min().unwrap_or(0);
    let max_col = tiles.iter().map(|(col, _)| *col).max().unwrap_or(0);
    let min_row = tiles.iter().map(|(_, row)| *row).min().unwrap_or(0);
    let max_row = tiles.iter().map(|(_, row)| *row).max().unwrap_or(0);

    let (x, y) = grid.origin(min_col, min_row);
    let (x_end, y_end) = {
        let (x_last, y_last) = grid.origin(max_col, max_row);
        (x_last + grid.tile, y_last + grid.tile)
    };

    let count = tiles.len() as f64;
    let mean_of = |field: fn(&crate::noise::TileStats) -> f64| {
        tiles.iter().map(|(col, row)| field(grid.get(*col, *row))).sum::<f64>() / count
    };

    let ring: Vec<f64> = (min_row.saturating_sub(1)..=(max_row + 1).min(grid.rows - 1))
        .flat_map(|row| {
            (min_col.saturating_sub(1)..=(max_col + 1).min(grid.cols - 1)).map(move |col| (col, row))
        })
        .filter(|(col, row)| mask.get_pixel(*col, *row).0[0] == 0)
        .map(|(col, row)| grid.get(col, row).background)
        .collect();
    let surround_level = if ring.is_empty() {
        global_background
    } else {
        ring.iter().sum::<f64>() / ring.len() as f64
    };

    ImageRegion {
        x,
        y,
        width: x_end - x,
        height: y_end - y,
        noise_sigma: mean_of(|tile| tile.noise_sigma),
        background_noise_sigma: background_noise,
        blockiness: mean_of(|tile| tile.blockiness),
        background_level: mean_of(|tile| tile.background),
        surround_level,
        similarity: 0.0,
    }
}

/// Similarity to the nearest other region: 1 / (1 + d) over the
/// spread-normalised (log-noise, blockiness) signature.
fn score_similarity(regions: &mut [ImageRegion], noise_spread: f64, block_spread: f64) {
    let signatures: Vec<(f64, f64)> = regions
        .iter()
        .map(|region| (signature_noise(region.noise_sigma), region.blockiness))
        .collect();

    for (index, region) in regions.iter_mut().enumerate() {
        let nearest = signatures
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != index)
            .map(|(_, (noise, block))| {
                let dn = (signatures[index].0 - noise) / noise_spread;
                let db = (signatures[index].1 - block) / block_spread;
                (dn * dn + db * db).sqrt()
            })
            .min_by(|a, b| a.total_cmp(b));
        region.similarity = nearest.map_or(0.0, |distance| 1.0 / (1.0 + distance));
    }
}
