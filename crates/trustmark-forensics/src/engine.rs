// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Forensics engine: runs the metadata checks and the pixel-level paste and
// clone detectors over every embedded image and folds the outcome into one
// module result.

use image::GrayImage;
use serde_json::json;
use trustmark_core::error::Result;
use trustmark_core::{
    DocumentFacts, EmbeddedImage, Flag, ForensicsConfig, ImageEncoding, ModuleResult, Severity,
};
use tracing::{debug, info, instrument, warn};

use crate::checks;
use crate::clone::find_clones;
use crate::decode::decode_luma;
use crate::ela::{self, ElaOutcome, MAJOR_RATIO};
use crate::regions::{ImageRegion, find_regions};

/// Name under which the engine reports.
pub const MODULE_NAME: &str = "images";

/// Image-forensics engine.
///
/// Stateless between calls; one engine can serve any number of documents.
#[derive(Debug, Clone, Default)]
pub struct ForensicsEngine {
    config: ForensicsConfig,
}

/// What pixel analysis made of one image.
enum PixelOutcome {
    Analyzed(Vec<Flag>),
    /// Left out; the reason is logged.
    Skipped(&'static str),
}

impl ForensicsEngine {
    // -- Construction ---------------------------------------------------------

    pub fn new(config: ForensicsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForensicsConfig {
        &self.config
    }

    // -- Analysis -------------------------------------------------------------

    /// Analyse every embedded image of a document.
    ///
    /// Never fails: undecodable images are logged and lower the confidence.
    #[instrument(skip_all, fields(images = facts.images.len()))]
    pub fn analyze(&self, facts: &DocumentFacts) -> ModuleResult {
        if facts.images.is_empty() {
            let flags = checks::no_images(facts).into_iter().collect();
            return ModuleResult::from_flags(MODULE_NAME, flags, image_confidence(0, 0));
        }

        let created = facts.metadata.creation_date;
        let mut flags: Vec<Flag> = checks::excessive_count(facts).into_iter().collect();
        let mut analyzed = 0usize;

        for (index, image) in facts.images.iter().enumerate() {
            let page_dpi = facts.page(image.page).and_then(|page| page.dpi);
            flags.extend(checks::resolution_conflict(
                &facts.images,
                index,
                page_dpi,
                self.config.resolution_ratio,
            ));
            flags.extend(checks::exif_flags(
                image,
                index,
                created,
                self.config.exif_tolerance_days,
            ));
            flags.extend(checks::screenshot(image, index, self.config.screenshot_tolerance));
            flags.extend(checks::heavy_compression(
                image,
                index,
                self.config.heavy_compression_ratio,
            ));

            match self.pixel_flags(image, index) {
                Ok(PixelOutcome::Analyzed(found)) => {
                    analyzed += 1;
                    flags.extend(found);
                }
                Ok(PixelOutcome::Skipped(reason)) => {
                    debug!(index, width = image.width, height = image.height, reason, "Image skipped");
                }
                Err(err) => {
                    warn!(index, page = image.page, error = %err, "Image could not be decoded");
                }
            }
        }

        let confidence = image_confidence(analyzed, facts.images.len());
        info!(
            total = facts.images.len(),
            analyzed,
            flags = flags.len(),
            confidence,
            "Image forensics complete"
        );
        ModuleResult::from_flags(MODULE_NAME, flags, confidence)
    }

    /// Decode one image and run the pixel detectors on it.
    fn pixel_flags(&self, image: &EmbeddedImage, index: usize) -> Result<PixelOutcome> {
        let Some(gray) = decode_luma(image, self.config.max_pixels)? else {
            return Ok(PixelOutcome::Skipped("above pixel cap"));
        };
        if gray.width().min(gray.height()) < self.config.min_image_side {
            return Ok(PixelOutcome::Skipped("below minimum side"));
        }

        let mut flags: Vec<Flag> = find_regions(&gray, &self.config)
            .iter()
            .map(|region| self.paste_flag(image, index, region))
            .collect();
        if self.config.clone_detection {
            flags.extend(clone_flags(&gray, image, index));
        }
        if self.config.ela && image.encoding == ImageEncoding::Jpeg {
            match ela::analyze(&gray, self.config.ela_quality) {
                Ok(outcome) => flags.extend(ela_flag(image, index, &outcome)),
                Err(err) => warn!(index, error = %err, "Error level analysis failed"),
            }
        }
        Ok(PixelOutcome::Analyzed(flags))
    }

    fn paste_flag(&self, image: &EmbeddedImage, index: usize, region: &ImageRegion) -> Flag {
        let severity = if region.background_shift() > self.config.background_delta {
            Severity::High
        } else {
            Severity::Medium
        };
        Flag::new(
            severity,
            "IMAGES_PASTE_NOISE_ANOMALY",
            format!(
                "Image {} on page {} has a {}x{} area at ({}, {}) whose grain does not match the rest of the image",
                index + 1,
                image.page,
                region.width,
                region.height,
                region.x,
                region.y
            ),
        )
        .with_detail("page", image.page)
        .with_detail("image_index", index)
        .with_detail("x", region.x)
        .with_detail("y", region.y)
        .with_detail("width", region.width)
        .with_detail("height", region.height)
        .with_detail("noise_sigma", round3(region.noise_sigma))
        .with_detail("background_noise_sigma", round3(region.background_noise_sigma))
        .with_detail("blockiness", round3(region.blockiness))
        .with_detail("similarity", round3(region.similarity))
    }
}

fn clone_flags(gray: &GrayImage, image: &EmbeddedImage, index: usize) -> Vec<Flag> {
    find_clones(gray)
        .into_iter()
        .map(|group| {
            let positions: Vec<serde_json::Value> =
                group.positions.iter().map(|(x, y)| json!([x, y])).collect();
            Flag::new(
                Severity::Medium,
                "IMAGES_CLONED_REGION",
                format!(
                    "Image {} on page {} repeats the same block {} times",
                    index + 1,
                    image.page,
                    group.positions.len()
                ),
            )
            .with_detail("page", image.page)
            .with_detail("image_index", index)
            .with_detail("copies", group.positions.len())
            .with_detail("positions", positions)
        })
        .collect()
}

fn ela_flag(image: &EmbeddedImage, index: usize, outcome: &ElaOutcome) -> Option<Flag> {
    if !outcome.is_suspicious() {
        return None;
    }
    let (severity, code, extent) = if outcome.ratio > MAJOR_RATIO {
        (Severity::High, "IMAGES_ELA_MAJOR_EDIT", "significant")
    } else {
        (Severity::Medium, "IMAGES_ELA_MINOR_EDIT", "possible")
    };
    let zones: Vec<serde_json::Value> = outcome
        .zones
        .iter()
        .map(|zone| {
            json!({
                "x": zone.x,
                "y": zone.y,
                "width": zone.width,
                "height": zone.height,
                "area": zone.area,
            })
        })
        .collect();
    Some(
        Flag::new(
            severity,
            code,
            format!(
                "Image {} on page {} shows {extent} re-save artifacts ({:.1}% of the image, {} zone(s))",
                index + 1,
                image.page,
                outcome.ratio * 100.0,
                outcome.zones.len()
            ),
        )
        .with_detail("page", image.page)
        .with_detail("image_index", index)
        .with_detail("ratio", round3(outcome.ratio))
        .with_detail("zones", zones),
    )
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Confidence from the share of images that reached pixel analysis.
///
/// No images at all is a neutral 0.5.
pub fn image_confidence(analyzed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.5;
    }
    let base = if analyzed == 0 {
        0.2
    } else {
        (0.5 + 0.1 * analyzed as f64).min(0.9)
    };
    base * (0.5 + 0.5 * analyzed as f64 / total as f64)
}
