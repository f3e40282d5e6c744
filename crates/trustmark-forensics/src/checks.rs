// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Checks that need only the image's declared properties, never its pixels.
// They run even for images that cannot be decoded.

use chrono::{DateTime, NaiveDateTime, Utc};
use trustmark_core::{DocumentFacts, EmbeddedImage, Flag, ImageEncoding, Severity};

use crate::noise::median;

/// Common display resolutions, landscape.
const SCREEN_RESOLUTIONS: [(u32, u32); 10] = [
    (1920, 1080),
    (1366, 768),
    (1536, 864),
    (1440, 900),
    (2560, 1440),
    (3840, 2160),
    (1280, 720),
    (1280, 800),
    (1024, 768),
    (2880, 1800),
];

/// Anything at or below this is a screen, not a print, resolution.
const SCREEN_DPI: f32 = 96.0;

/// Text length above which an image-free document looks unusual.
const NO_IMAGES_TEXT_CHARS: usize = 500;

/// More images per page than this is unusual for a business document.
const MAX_IMAGES_PER_PAGE: f64 = 15.0;

const EDITING_SOFTWARE: [&str; 7] = [
    "photoshop",
    "gimp",
    "paint.net",
    "pixelmator",
    "affinity",
    "snapseed",
    "picsart",
];

/// EXIF date keys, most specific first.
const EXIF_DATE_KEYS: [&str; 3] = ["DateTimeOriginal", "DateTimeDigitized", "DateTime"];

/// Compare the image DPI with the page DPI, or with the median of the other
/// images on the same page when the page declares none.
pub fn resolution_conflict(
    images: &[EmbeddedImage],
    index: usize,
    page_dpi: Option<f32>,
    ratio_tolerance: f64,
) -> Option<Flag> {
    let image = images.get(index)?;
    let dpi = image.dpi.filter(|dpi| *dpi > 0.0)? as f64;

    let reference = match page_dpi.filter(|dpi| *dpi > 0.0) {
        Some(page) => page as f64,
        None => {
            let others: Vec<f64> = images
                .iter()
                .enumerate()
                .filter(|(other, candidate)| *other != index && candidate.page == image.page)
                .filter_map(|(_, candidate)| candidate.dpi.filter(|dpi| *dpi > 0.0))
                .map(f64::from)
                .collect();
            if others.is_empty() {
                return None;
            }
            median(&others)
        }
    };

    let ratio = (dpi / reference).max(reference / dpi);
    (ratio > ratio_tolerance).then(|| {
        Flag::new(
            Severity::High,
            "IMAGES_RESOLUTION_CONFLICT",
            format!(
                "Image {} on page {} is at {dpi:.0} dpi while its surroundings are at {reference:.0} dpi",
                index + 1,
                image.page
            ),
        )
        .with_detail("page", image.page)
        .with_detail("image_index", index)
        .with_detail("image_dpi", dpi)
        .with_detail("reference_dpi", reference)
        .with_detail("ratio", ratio)
    })
}

/// EXIF capture date against document creation, and image-editor traces.
pub fn exif_flags(
    image: &EmbeddedImage,
    index: usize,
    created: Option<DateTime<Utc>>,
    tolerance_days: i64,
) -> Vec<Flag> {
    let Some(exif) = &image.exif else {
        return Vec::new();
    };
    let mut flags = Vec::new();

    let captured = EXIF_DATE_KEYS
        .iter()
        .filter_map(|key| exif.get(*key))
        .find_map(|value| parse_exif_date(value));
    if let (Some(captured), Some(created)) = (captured, created) {
        let gap_days = (created - captured).num_days().abs();
        if gap_days > tolerance_days {
            flags.push(
                Flag::new(
                    Severity::Medium,
                    "IMAGES_EXIF_DATE_MISMATCH",
                    format!(
                        "Image {} was captured on {} but the document was created on {} ({gap_days} days apart)",
                        index + 1,
                        captured.format("%Y-%m-%d"),
                        created.format("%Y-%m-%d"),
                    ),
                )
                .with_detail("page", image.page)
                .with_detail("image_index", index)
                .with_detail("gap_days", gap_days),
            );
        }
    }

    if let Some(software) = exif.get("Software") {
        let lowered = software.to_lowercase();
        if EDITING_SOFTWARE.iter().any(|editor| lowered.contains(editor)) {
            flags.push(
                Flag::new(
                    Severity::Low,
                    "IMAGES_EXIF_EDITING_SOFTWARE",
                    format!("Image {} was saved by image editing software: {software}", index + 1),
                )
                .with_detail("page", image.page)
                .with_detail("image_index", index)
                .with_detail("software", software.as_str()),
            );
        }
    }

    flags
}

/// `YYYY:MM:DD HH:MM:SS`, taken as UTC.
pub fn parse_exif_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Dimensions of a screen capture without print resolution.
pub fn screenshot(image: &EmbeddedImage, index: usize, tolerance: u32) -> Option<Flag> {
    let (width, height) = (image.width, image.height);
    let mut fuzzy = false;
    let mut exact = false;
    for (screen_w, screen_h) in SCREEN_RESOLUTIONS {
        for (w, h) in [(screen_w, screen_h), (screen_h, screen_w)] {
            if width.abs_diff(w) < tolerance && height.abs_diff(h) < tolerance {
                fuzzy = true;
                exact |= width == w && height == h;
            }
        }
    }
    if !fuzzy {
        return None;
    }

    let severity = match image.dpi {
        None => Severity::Medium,
        Some(dpi) if dpi <= SCREEN_DPI => Severity::Medium,
        Some(_) if exact => Severity::Low,
        Some(_) => return None,
    };
    Some(
        Flag::new(
            severity,
            "IMAGES_SCREENSHOT_DETECTED",
            format!(
                "Image {} is {width}x{height}, a common screen size; the page may be a screenshot",
                index + 1
            ),
        )
        .with_detail("page", image.page)
        .with_detail("image_index", index)
        .with_detail("width", width)
        .with_detail("height", height),
    )
}

/// JPEG data far smaller than its pixel count suggests.
pub fn heavy_compression(image: &EmbeddedImage, index: usize, max_ratio: f64) -> Option<Flag> {
    if image.encoding != ImageEncoding::Jpeg || image.data.is_empty() {
        return None;
    }
    let uncompressed = image.width as f64 * image.height as f64 * 3.0;
    let ratio = uncompressed / image.data.len() as f64;
    (ratio > max_ratio).then(|| {
        Flag::new(
            Severity::Medium,
            "IMAGES_HEAVY_COMPRESSION",
            format!(
                "Image {} is compressed {ratio:.0}:1, which destroys detail and hides edits",
                index + 1
            ),
        )
        .with_detail("page", image.page)
        .with_detail("image_index", index)
        .with_detail("ratio", ratio)
    })
}

/// A text-heavy document without a single image (no logo, stamp or signature).
pub fn no_images(facts: &DocumentFacts) -> Option<Flag> {
    let chars = facts.pages.iter().map(|page| page.text.chars().count()).sum::<usize>();
    (facts.images.is_empty() && chars > NO_IMAGES_TEXT_CHARS).then(|| {
        Flag::new(
            Severity::Low,
            "IMAGES_NO_IMAGES",
            "Document has substantial text but no images (no logo, stamp or signature)",
        )
    })
}

/// Far more images per page than any invoice or statement needs, typical of a
/// page rebuilt from cut-out pieces.
pub fn excessive_count(facts: &DocumentFacts) -> Option<Flag> {
    let pages = facts.page_count();
    let count = facts.images.len();
    let per_page = if pages == 0 {
        count as f64
    } else {
        count as f64 / pages as f64
    };
    (per_page > MAX_IMAGES_PER_PAGE).then(|| {
        Flag::new(
            Severity::Medium,
            "IMAGES_EXCESSIVE_COUNT",
            format!("Document has {count} images for {pages} page(s)"),
        )
        .with_detail("image_count", count)
        .with_detail("page_count", pages)
        .with_detail("images_per_page", (per_page * 10.0).round() / 10.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use chrono::TimeZone;
    use trustmark_core::PageFacts;

    fn image(page: u32, dpi: Option<f32>) -> EmbeddedImage {
        EmbeddedImage {
            page,
            width: 400,
            height: 300,
            dpi,
            ..Default::default()
        }
    }

    #[test]
    fn low_dpi_image_on_print_page_conflicts() {
        let images = vec![image(1, Some(72.0))];
        let flag = resolution_conflict(&images, 0, Some(300.0), 2.0).expect("conflict");
        assert_eq!(flag.severity, Severity::High);
        assert_eq!(flag.code, "IMAGES_RESOLUTION_CONFLICT");
        assert_eq!(flag.detail("page"), Some(&1.into()));

        let matching = vec![image(1, Some(300.0))];
        assert!(resolution_conflict(&matching, 0, Some(300.0), 2.0).is_none());
    }

    #[test]
    fn reference_falls_back_to_sibling_images() {
        let images = vec![
            image(1, Some(300.0)),
            image(1, Some(310.0)),
            image(1, Some(100.0)),
            image(2, Some(100.0)),
        ];
        assert!(resolution_conflict(&images, 2, None, 2.0).is_some());
        assert!(resolution_conflict(&images, 0, None, 2.0).is_none());
        // Alone on its page, nothing to compare with.
        assert!(resolution_conflict(&images, 3, None, 2.0).is_none());
    }

    #[test]
    fn image_without_dpi_is_skipped() {
        let images = vec![image(1, None)];
        assert!(resolution_conflict(&images, 0, Some(300.0), 2.0).is_none());
    }

    fn with_exif(entries: &[(&str, &str)]) -> EmbeddedImage {
        EmbeddedImage {
            exif: Some(
                entries
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..image(1, Some(300.0))
        }
    }

    #[test]
    fn old_photo_in_new_document() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single();
        let photo = with_exif(&[("DateTimeOriginal", "2019:06:01 10:15:00")]);
        let flags = exif_flags(&photo, 0, created, 30);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].code, "IMAGES_EXIF_DATE_MISMATCH");
        assert_eq!(flags[0].severity, Severity::Medium);

        let recent = with_exif(&[("DateTime", "2024:02:20 08:00:00")]);
        assert!(exif_flags(&recent, 0, created, 30).is_empty());
        assert!(exif_flags(&photo, 0, None, 30).is_empty());
    }

    #[test]
    fn editor_software_is_noted() {
        let edited = with_exif(&[("Software", "Adobe Photoshop 25.0 (Windows)")]);
        let flags = exif_flags(&edited, 4, None, 30);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].code, "IMAGES_EXIF_EDITING_SOFTWARE");
        assert_eq!(flags[0].severity, Severity::Low);
        assert_eq!(flags[0].detail("image_index"), Some(&4.into()));

        let camera = with_exif(&[("Software", "Camera firmware 1.2")]);
        assert!(exif_flags(&camera, 0, None, 30).is_empty());
    }

    #[test]
    fn parses_exif_dates() {
        let parsed = parse_exif_date("2021:12:31 23:59:58").expect("valid");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2021, 12, 31, 23, 59, 58).unwrap());
        assert!(parse_exif_date("2021-12-31").is_none());
        assert!(parse_exif_date("0000:00:00 00:00:00").is_none());
    }

    #[test]
    fn screen_sized_images() {
        let sized = |width, height, dpi| EmbeddedImage {
            width,
            height,
            dpi,
            ..image(1, None)
        };

        let capture = screenshot(&sized(1920, 1080, None), 0, 50).expect("screenshot");
        assert_eq!(capture.severity, Severity::Medium);
        // Portrait orientation and near-miss sizes still match.
        assert!(screenshot(&sized(1080, 1900, Some(72.0)), 0, 50).is_some());
        // Print resolution: only an exact match is worth a low flag.
        let exact = screenshot(&sized(1366, 768, Some(300.0)), 0, 50).expect("exact");
        assert_eq!(exact.severity, Severity::Low);
        assert!(screenshot(&sized(1370, 770, Some(300.0)), 0, 50).is_none());
        assert!(screenshot(&sized(800, 600, None), 0, 50).is_none());
    }

    #[test]
    fn heavily_compressed_jpeg() {
        let jpeg = |len| EmbeddedImage {
            encoding: ImageEncoding::Jpeg,
            data: vec![0u8; len],
            ..image(1, None)
        };
        // 400x300x3 = 360000 bytes uncompressed.
        assert!(heavy_compression(&jpeg(3_000), 0, 50.0).is_some());
        assert!(heavy_compression(&jpeg(30_000), 0, 50.0).is_none());

        let raw = EmbeddedImage {
            encoding: ImageEncoding::Raw { components: 1 },
            data: vec![0u8; 10],
            ..image(1, None)
        };
        assert!(heavy_compression(&raw, 0, 50.0).is_none());
    }

    #[test]
    fn text_heavy_document_without_images() {
        let mut facts = DocumentFacts {
            pages: vec![PageFacts {
                number: 1,
                text: "x".repeat(600),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(no_images(&facts).map(|flag| flag.severity), Some(Severity::Low));

        facts.images.push(image(1, None));
        assert!(no_images(&facts).is_none());

        facts.images.clear();
        facts.pages[0].text = "short".into();
        assert!(no_images(&facts).is_none());
    }

    #[test]
    fn many_images_per_page() {
        let mut facts = DocumentFacts {
            pages: vec![
                PageFacts { number: 1, ..Default::default() },
                PageFacts { number: 2, ..Default::default() },
            ],
            images: vec![image(1, None); 30],
            ..Default::default()
        };
        assert!(excessive_count(&facts).is_none());

        facts.images.push(image(2, None));
        let flag = excessive_count(&facts).expect("31 images on 2 pages");
        assert_eq!(flag.severity, Severity::Medium);
        assert_eq!(flag.detail("images_per_page"), Some(&serde_json::json!(15.5)));
    }
}
