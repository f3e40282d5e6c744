// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document facts: the immutable bundle an ingestion layer hands to the
// detection modules, plus the per-call analysis context.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the document text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextSource {
    /// Extracted from the PDF's own text layer.
    #[default]
    Native,
    /// Recognised from rendered pages because no text layer was usable.
    Ocr,
}

/// One page of the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFacts {
    /// 1-based page number.
    pub number: u32,
    pub width_pt: f32,
    pub height_pt: f32,
    /// Known render or scan resolution of the page, when the producer declared one.
    pub dpi: Option<f32>,
    pub text: String,
}

/// Document information dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub producer: Option<String>,
    pub creator: Option<String>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
    /// Every entry exactly as found, decoded to text.
    pub raw: BTreeMap<String, String>,
}

impl DocumentMetadata {
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
            && self.producer.is_none()
            && self.creator.is_none()
            && self.author.is_none()
            && self.title.is_none()
            && self.creation_date.is_none()
            && self.modification_date.is_none()
    }
}

/// Encoding of an embedded raster image's `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageEncoding {
    /// A complete JPEG file (`DCTDecode` stream).
    Jpeg,
    /// A complete PNG file.
    Png,
    /// Decoded 8-bit samples, `components` per pixel, row-major.
    Raw { components: u8 },
    /// A filter this crate cannot decode (`JPXDecode`, `JBIG2Decode`, ...).
    Other(String),
}

impl Default for ImageEncoding {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

/// A raster image embedded in the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedImage {
    pub page: u32,
    pub width: u32,
    pub height: u32,
    /// Declared or estimated placement resolution.
    pub dpi: Option<f32>,
    pub encoding: ImageEncoding,
    /// Encoded bytes as stored in the document.
    #[serde(skip)]
    pub data: Vec<u8>,
    /// Capture metadata, when the image carried any.
    pub exif: Option<BTreeMap<String, String>>,
}

/// Position of one use of a font.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontOccurrence {
    pub page: u32,
    /// 1-based text line; 0 when line positions are unknown.
    pub line: u32,
}

/// A font referenced by the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontUsage {
    /// Name as declared, possibly with a `ABCDEF+` subset prefix.
    pub name: String,
    pub subset: bool,
    pub embedded: bool,
    pub occurrences: Vec<FontOccurrence>,
}

impl FontUsage {
    /// Name without the subset prefix.
    pub fn base_name(&self) -> &str {
        strip_subset_prefix(&self.name)
    }
}

/// Strip a six-uppercase-letter subset tag (`ABCDEF+Helvetica`).
pub fn strip_subset_prefix(name: &str) -> &str {
    let bytes = name.as_bytes();
    if bytes.len() > 7 && bytes[6] == b'+' && bytes[..6].iter().all(u8::is_ascii_uppercase) {
        &name[7..]
    } else {
        name
    }
}

/// Low-level structural features of the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureFacts {
    /// Number of `%%EOF` markers; more than one means incremental updates.
    pub eof_markers: u32,
    pub has_javascript: bool,
    pub embedded_files: u32,
    pub has_acroform: bool,
    pub hidden_annotations: u32,
    pub has_signature: bool,
}

/// A decoded QR/barcode payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrPayload {
    pub page: u32,
    pub data: String,
}

/// Everything the detection modules may look at for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentFacts {
    pub file_hash: String,
    pub pages: Vec<PageFacts>,
    pub text_source: TextSource,
    pub metadata: DocumentMetadata,
    pub images: Vec<EmbeddedImage>,
    pub fonts: Vec<FontUsage>,
    pub structure: StructureFacts,
    pub qr_payloads: Vec<QrPayload>,
    /// Whether the ingestion layer ran a barcode pass at all.
    pub qr_scanned: bool,
}

impl DocumentFacts {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Full document text, pages separated by newlines.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn page(&self, number: u32) -> Option<&PageFacts> {
        self.pages.iter().find(|page| page.number == number)
    }

    pub fn is_ocr(&self) -> bool {
        self.text_source == TextSource::Ocr
    }
}

/// Per-call values that are not facts about the document itself.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    /// Reference instant for date sanity checks.
    pub now: DateTime<Utc>,
    /// Domains the document is expected to link to (sender, issuer).
    pub expected_domains: Vec<String>,
    /// Issuer name as the caller knows it, if any.
    pub issuer_name: Option<String>,
}

impl AnalysisContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            expected_domains: Vec::new(),
            issuer_name: None,
        }
    }

    pub fn with_expected_domains(mut self, domains: impl IntoIterator<Item = String>) -> Self {
        self.expected_domains = domains.into_iter().collect();
        self
    }

    pub fn with_issuer_name(mut self, name: Option<String>) -> Self {
        self.issuer_name = name;
        self
    }
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}
