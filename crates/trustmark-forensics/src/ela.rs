// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error level analysis: re-save a JPEG at a known quality and look for areas
// whose recompression error stands out. Content pasted in after the last save
// has not settled onto the JPEG grid and changes more than the rest.

use std::collections::BTreeMap;

use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, ImageFormat, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use trustmark_core::error::{Result, TrustmarkError};
use tracing::debug;

/// Amplification of the per-pixel recompression error.
const ERROR_SCALE: u16 = 20;
/// Error above mean + this many standard deviations is suspicious.
const THRESHOLD_SIGMAS: f64 = 3.0;
/// Smaller zones are speckle.
const MIN_ZONE_AREA: u32 = 500;
/// Share of the image that makes an image suspicious.
pub(crate) const SUSPICIOUS_RATIO: f64 = 0.03;
/// Share of the image that makes the edit a major one.
pub(crate) const MAJOR_RATIO: f64 = 0.05;

/// One connected run of high-error pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Zone {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Pixels in the zone.
    pub area: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ElaOutcome {
    pub zones: Vec<Zone>,
    /// Zone pixels over image pixels.
    pub ratio: f64,
}

impl ElaOutcome {
    pub fn is_suspicious(&self) -> bool {
        self.ratio > SUSPICIOUS_RATIO
    }
}

/// Full pass: recompress, threshold, group.
pub(crate) fn analyze(gray: &GrayImage, quality: u8) -> Result<ElaOutcome> {
    let levels = error_levels(gray, quality)?;
    let zones = suspicious_zones(&levels);
    let total: u64 = zones.iter().map(|zone| zone.area as u64).sum();
    let pixels = gray.width() as u64 * gray.height() as u64;
    let ratio = if pixels == 0 {
        0.0
    } else {
        total as f64 / pixels as f64
    };
    debug!(zones = zones.len(), ratio, "Error level analysis finished");
    Ok(ElaOutcome { zones, ratio })
}

/// |original − recompressed| × 20, saturating at 255.
pub(crate) fn error_levels(gray: &GrayImage, quality: u8) -> Result<GrayImage> {
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, quality)
        .encode_image(gray)
        .map_err(|err| TrustmarkError::MalformedImage(format!("JPEG re-encode failed: {err}")))?;
    let resaved = image::load_from_memory_with_format(&encoded, ImageFormat::Jpeg)
        .map_err(|err| TrustmarkError::MalformedImage(format!("JPEG re-decode failed: {err}")))?
        .to_luma8();

    Ok(GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let before = gray.get_pixel(x, y).0[0];
        let after = resaved.get_pixel(x, y).0[0];
        let error = before.abs_diff(after) as u16 * ERROR_SCALE;
        Luma([error.min(255) as u8])
    }))
}

/// Zones of 8-connected pixels above mean + 3σ of the error map.
pub(crate) fn suspicious_zones(levels: &GrayImage) -> Vec<Zone> {
    let count = levels.as_raw().len() as f64;
    if count == 0.0 {
        return Vec::new();
    }
    let mean = levels.as_raw().iter().map(|v| *v as f64).sum::<f64>() / count;
    let variance = levels
        .as_raw()
        .iter()
        .map(|v| (*v as f64 - mean).powi(2))
        .sum::<f64>()
        / count;
    let threshold = mean + THRESHOLD_SIGMAS * variance.sqrt();

    let mask = GrayImage::from_fn(levels.width(), levels.height(), |x, y| {
        if levels.get_pixel(x, y).0[0] as f64 > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    // label -> (min_x, min_y, max_x, max_y, pixels)
    let mut bounds: BTreeMap<u32, (u32, u32, u32, u32, u32)> = BTreeMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0];
        if label == 0 {
            continue;
        }
        let entry = bounds.entry(label).or_insert((x, y, x, y, 0));
        entry.0 = entry.0.min(x);
        entry.1 = entry.1.min(y);
        entry.2 = entry.2.max(x);
        entry.3 = entry.3.max(y);
        entry.4 += 1;
    }

    bounds
        .into_values()
        .filter(|(.., area)| *area >= MIN_ZONE_AREA)
        .map(|(x0, y0, x1, y1, area)| Zone {
            x: x0,
            y: y0,
            width: x1 - x0 + 1,
            height: y1 - y0 + 1,
            area,
        })
        .collect()
}
