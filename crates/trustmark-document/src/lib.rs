// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// trustmark-document: Ingestion layer for the Trustmark analyzer.
//
// Turns a PDF into `DocumentFacts`: information-dictionary metadata, per-page
// text, font usage with line positions, embedded raster images with their
// placement resolution and EXIF tags, and structural features such as
// incremental updates, JavaScript and embedded files.

pub mod exif;
pub mod integrity;
pub mod pdf;

// Re-export the primary entry points so callers can use `trustmark_document::PdfExtractor`.
pub use integrity::hash_bytes;
pub use pdf::extractor::PdfExtractor;
