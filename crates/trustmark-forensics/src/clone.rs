// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Copy-move detection: identical textured blocks repeated across an image.

use std::collections::HashMap;

use image::GrayImage;
use tracing::debug;

const BLOCK: u32 = 16;
/// 8x8 grid of 2x2 cells per block.
const HASH_BINS: u32 = 8;
const MIN_STD_DEV: f64 = 15.0;
/// Manhattan distance below which two matches count as the same spot.
const MIN_DISTANCE: u32 = 64;
const MAX_MEAN_ABS_DIFF: f64 = 3.0;
const MIN_GROUP: usize = 10;
const MAX_PIXELS: u64 = 2_000_000;

/// Positions (top-left, pixels) sharing one block pattern.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CloneGroup {
    pub positions: Vec<(u32, u32)>,
}

pub(crate) fn find_clones(gray: &GrayImage) -> Vec<CloneGroup> {
    let (width, height) = gray.dimensions();
    if width < BLOCK || height < BLOCK {
        return Vec::new();
    }
    if width as u64 * height as u64 > MAX_PIXELS {
        debug!(width, height, "Image too large for clone detection");
        return Vec::new();
    }

    let mut buckets: HashMap<Vec<u8>, Vec<(u32, u32)>> = HashMap::new();
    for y in (0..=height - BLOCK).step_by(BLOCK as usize) {
        for x in (0..=width - BLOCK).step_by(BLOCK as usize) {
            if std_dev(gray, x, y) < MIN_STD_DEV {
                continue;
            }
            buckets.entry(block_hash(gray, x, y)).or_default().push((x, y));
        }
    }

    let mut groups = Vec::new();
    for candidates in buckets.values().filter(|entries| entries.len() >= MIN_GROUP) {
        let mut verified: Vec<(u32, u32)> = Vec::new();
        for (i, &a) in candidates.iter().enumerate() {
            for &b in &candidates[i + 1..] {
                if a.0.abs_diff(b.0) + a.1.abs_diff(b.1) < MIN_DISTANCE {
                    continue;
                }
                if mean_abs_diff(gray, a, b) < MAX_MEAN_ABS_DIFF {
                    for position in [a, b] {
                        if !verified.contains(&position) {
                            verified.push(position);
                        }
                    }
                }
            }
        }
        if verified.len() < MIN_GROUP || is_grid_pattern(&verified) {
            continue;
        }
        verified.sort_unstable_by_key(|&(x, y)| (y, x));
        groups.push(CloneGroup { positions: verified });
    }
    groups.sort_by_key(|group| group.positions.first().copied());
    groups
}

/// Repeats confined to one or two rows or columns are tables and rulings.
fn is_grid_pattern(positions: &[(u32, u32)]) -> bool {
    let distinct = |mut values: Vec<u32>| {
        values.sort_unstable();
        values.dedup();
        values.len()
    };
    let xs = distinct(positions.iter().map(|(x, _)| *x).collect());
    let ys = distinct(positions.iter().map(|(_, y)| *y).collect());
    xs <= 2 || ys <= 2
}

fn block_pixels(gray: &GrayImage, x0: u32, y0: u32) -> impl Iterator<Item = u8> + '_ {
    (y0..y0 + BLOCK).flat_map(move |y| (x0..x0 + BLOCK).map(move |x| gray.get_pixel(x, y).0[0]))
}

fn std_dev(gray: &GrayImage, x0: u32, y0: u32) -> f64 {
    let count = (BLOCK * BLOCK) as f64;
    let (sum, sum_sq) = block_pixels(gray, x0, y0).fold((0.0, 0.0), |(sum, sum_sq), value| {
        let value = value as f64;
        (sum + value, sum_sq + value * value)
    });
    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0).sqrt()
}

/// Mean of each 2x2 cell, quantised to 16 levels.
fn block_hash(gray: &GrayImage, x0: u32, y0: u32) -> Vec<u8> {
    let cell = BLOCK / HASH_BINS;
    let mut hash = Vec::with_capacity((HASH_BINS * HASH_BINS) as usize);
    for by in 0..HASH_BINS {
        for bx in 0..HASH_BINS {
            let mut sum = 0u32;
            for y in 0..cell {
                for x in 0..cell {
                    sum += gray.get_pixel(x0 + bx * cell + x, y0 + by * cell + y).0[0] as u32;
                }
            }
            hash.push((sum / (cell * cell) / 16) as u8);
        }
    }
    hash
}

fn mean_abs_diff(gray: &GrayImage, a: (u32, u32), b: (u32, u32)) -> f64 {
    let total: u32 = block_pixels(gray, a.0, a.1)
        .zip(block_pixels(gray, b.0, b.1))
        .map(|(p, q)| p.abs_diff(q) as u32)
        .sum();
    total as f64 / (BLOCK * BLOCK) as f64
}
