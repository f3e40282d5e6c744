// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoding embedded image payloads into 8-bit luma buffers.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageError, ImageReader, Limits, Luma, RgbImage};
use trustmark_core::error::{Result, TrustmarkError};
use trustmark_core::{EmbeddedImage, ImageEncoding};
use tracing::{debug, instrument};

/// Worst-case decoded bytes per pixel (16-bit RGBA).
const MAX_BYTES_PER_PIXEL: u64 = 8;

/// Decode an embedded image to greyscale.
///
/// JPEG and PNG payloads go through `image` with decoder limits derived from
/// `max_pixels`, so a stream whose real size exceeds what the PDF declares is
/// refused before its buffer is allocated. Raw samples are interpreted with the
/// declared dimensions and component count.
///
/// Returns `Ok(None)` when the image holds more than `max_pixels` pixels.
#[instrument(skip(image), fields(page = image.page, width = image.width, height = image.height))]
pub fn decode_luma(image: &EmbeddedImage, max_pixels: u64) -> Result<Option<GrayImage>> {
    if image.width as u64 * image.height as u64 > max_pixels {
        return Ok(None);
    }
    let gray = match &image.encoding {
        ImageEncoding::Jpeg | ImageEncoding::Png => match decode_encoded(&image.data, max_pixels)? {
            Some(decoded) => decoded.to_luma8(),
            None => return Ok(None),
        },
        ImageEncoding::Raw { components } => decode_raw(image, *components)?,
        ImageEncoding::Other(filter) => {
            return Err(TrustmarkError::MalformedImage(format!(
                "unsupported image encoding '{filter}'"
            )));
        }
    };
    if gray.width() as u64 * gray.height() as u64 > max_pixels {
        debug!(width = gray.width(), height = gray.height(), "Decoded image above pixel cap");
        return Ok(None);
    }

    debug!(width = gray.width(), height = gray.height(), "Image decoded to luma");
    Ok(Some(gray))
}

fn decode_encoded(data: &[u8], max_pixels: u64) -> Result<Option<DynamicImage>> {
    let malformed = |err: &dyn std::fmt::Display| {
        TrustmarkError::MalformedImage(format!("failed to decode image: {err}"))
    };
    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|err| malformed(&err))?;
    reader.limits(pixel_limits(max_pixels));

    match reader.decode() {
        Ok(decoded) => Ok(Some(decoded)),
        Err(ImageError::Limits(err)) => {
            debug!(error = %err, "Decoder limits exceeded");
            Ok(None)
        }
        Err(err) => Err(malformed(&err)),
    }
}

fn pixel_limits(max_pixels: u64) -> Limits {
    let side = u32::try_from(max_pixels).unwrap_or(u32::MAX);
    let mut limits = Limits::default();
    limits.max_image_width = Some(side);
    limits.max_image_height = Some(side);
    limits.max_alloc = Some(max_pixels.saturating_mul(MAX_BYTES_PER_PIXEL).max(1 << 20));
    limits
}

fn decode_raw(image: &EmbeddedImage, components: u8) -> Result<GrayImage> {
    let pixels = image.width as usize * image.height as usize;
    let expected = pixels * components as usize;
    let samples = image.data.get(..expected).ok_or_else(|| {
        TrustmarkError::MalformedImage(format!(
            "raw image holds {} bytes, {}x{}x{} needs {expected}",
            image.data.len(),
            image.width,
            image.height,
            components
        ))
    })?;

    let too_small = || TrustmarkError::MalformedImage("raw sample buffer too small".into());
    match components {
        1 => GrayImage::from_raw(image.width, image.height, samples.to_vec()).ok_or_else(too_small),
        3 => RgbImage::from_raw(image.width, image.height, samples.to_vec())
            .map(|rgb| DynamicImage::ImageRgb8(rgb).to_luma8())
            .ok_or_else(too_small),
        4 => {
            let mut gray = GrayImage::new(image.width, image.height);
            for (pixel, cmyk) in gray.pixels_mut().zip(samples.chunks_exact(4)) {
                *pixel = Luma([cmyk_luma(cmyk)]);
            }
            Ok(gray)
        }
        other => Err(TrustmarkError::MalformedImage(format!(
            "unsupported component count {other}"
        ))),
    }
}

/// Naive CMYK -> RGB -> Rec. 601 luma.
fn cmyk_luma(cmyk: &[u8]) -> u8 {
    let k = cmyk[3] as u32;
    let channel = |c: u8| 255u32.saturating_sub(c as u32 + k) as f32;
    let (r, g, b) = (channel(cmyk[0]), channel(cmyk[1]), channel(cmyk[2]));
    (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8
}
