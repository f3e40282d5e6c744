// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF extractor: open a document with `lopdf` and build the `DocumentFacts`
// bundle the detection modules analyze.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::{Dictionary, Document, Object};
use tracing::{debug, info, instrument, warn};
use trustmark_core::error::{Result, TrustmarkError};
use trustmark_core::{
    DocumentFacts, DocumentMetadata, EmbeddedImage, FontOccurrence, FontUsage, ImageEncoding,
    PageFacts, TextSource, strip_subset_prefix,
};

use crate::exif::read_jpeg_exif;
use crate::integrity::hash_bytes;
use crate::pdf::content::{PageScan, scan_operations};
use crate::pdf::date::parse_pdf_date;
use crate::pdf::objects::{
    get, get_dict, has_name, inherited, integer, name, rectangle_size, resolve, resolve_dict, text,
};
use crate::pdf::structure;

/// US Letter, used when a page declares no usable `/MediaBox`.
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Baselines closer than this (points) belong to the same text line.
const LINE_TOLERANCE: f32 = 2.0;

/// A single image covering this share of the page is treated as the page
/// raster, and its resolution becomes the page resolution.
const PAGE_RASTER_COVERAGE: f32 = 0.9;

/// Extracts analyzable facts from a PDF.
///
/// Wraps `lopdf::Document` together with the raw bytes, which are needed for
/// hashing and for counting incremental-update markers.
pub struct PdfExtractor {
    document: Document,
    raw: Vec<u8>,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

impl PdfExtractor {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let raw = std::fs::read(path_ref)?;
        let mut extractor = Self::from_bytes(raw)?;
        extractor.source_path = Some(path_ref.display().to_string());
        Ok(extractor)
    }

    /// Create an extractor from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = raw.len()))]
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self> {
        let document = Document::load_mem(&raw).map_err(|err| {
            TrustmarkError::Extraction(format!("failed to load PDF from memory: {}", err))
        })?;

        if document.trailer.has(b"Encrypt") {
            return Err(TrustmarkError::Extraction(
                "document is encrypted and cannot be inspected".into(),
            ));
        }

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self {
            document,
            raw,
            source_path: None,
        })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Return the source path if the extractor was created via [`PdfExtractor::open`].
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    // -- Extraction -----------------------------------------------------------

    /// Build the complete facts bundle.
    ///
    /// Sub-structures that cannot be read (one page's text, one font, one
    /// image stream) are skipped with a warning; only an unreadable document
    /// fails, and that already happened at construction.
    #[instrument(skip(self), fields(path = self.source_path.as_deref().unwrap_or("<memory>")))]
    pub fn extract(&self) -> DocumentFacts {
        let file_hash = hash_bytes(&self.raw);
        let metadata = self.metadata();

        let mut pages = Vec::new();
        let mut images = Vec::new();
        let mut fonts: BTreeMap<String, FontUsage> = BTreeMap::new();

        for (number, page_id) in self.document.get_pages() {
            let Ok(page) = self.document.get_dictionary(page_id) else {
                warn!(page = number, "page object is not a dictionary, skipping");
                continue;
            };

            let (width_pt, height_pt) = inherited(&self.document, page, b"MediaBox")
                .and_then(rectangle_size)
                .unwrap_or(DEFAULT_PAGE_SIZE);

            let text = self.document.extract_text(&[number]).unwrap_or_else(|err| {
                warn!(page = number, %err, "text extraction failed");
                String::new()
            });

            let scan = match self.document.get_and_decode_page_content(page_id) {
                Ok(content) => scan_operations(&content.operations),
                Err(err) => {
                    debug!(page = number, %err, "content stream not decodable");
                    PageScan::default()
                }
            };

            let resources = inherited(&self.document, page, b"Resources")
                .and_then(|object| resolve_dict(&self.document, object));

            if let Some(resources) = resources {
                self.collect_fonts(number, resources, &scan, &mut fonts);
            }

            let page_images = resources
                .map(|resources| self.collect_images(number, resources, &scan, (width_pt, height_pt)))
                .unwrap_or_default();

            let dpi = page_raster_dpi(&page_images, &scan, (width_pt, height_pt));

            pages.push(PageFacts {
                number,
                width_pt,
                height_pt,
                dpi,
                text,
            });
            images.extend(page_images.into_iter().map(|(_, image)| image));
        }

        let structure = structure::inspect(&self.document, &self.raw);

        info!(
            pages = pages.len(),
            images = images.len(),
            fonts = fonts.len(),
            eof_markers = structure.eof_markers,
            "Document facts extracted"
        );

        DocumentFacts {
            file_hash,
            pages,
            text_source: TextSource::Native,
            metadata,
            images,
            fonts: fonts.into_values().collect(),
            structure,
            qr_payloads: Vec::new(),
            qr_scanned: false,
        }
    }

    /// Read the trailer's `/Info` dictionary.
    pub fn metadata(&self) -> DocumentMetadata {
        let Some(info) = get_dict(&self.document, &self.document.trailer, b"Info") else {
            return DocumentMetadata::default();
        };

        let raw: BTreeMap<String, String> = info
            .iter()
            .filter_map(|(key, value)| {
                let value = resolve(&self.document, value).and_then(text)?;
                Some((String::from_utf8_lossy(key).into_owned(), value))
            })
            .collect();

        let field = |key: &str| raw.get(key).map(|value| value.trim().to_string()).filter(|v| !v.is_empty());

        DocumentMetadata {
            producer: field("Producer"),
            creator: field("Creator"),
            author: field("Author"),
            title: field("Title"),
            creation_date: raw.get("CreationDate").and_then(|date| parse_pdf_date(date)),
            modification_date: raw.get("ModDate").and_then(|date| parse_pdf_date(date)),
            raw,
        }
    }

    // -- Helpers --------------------------------------------------------------

    fn collect_fonts(
        &self,
        page_number: u32,
        resources: &Dictionary,
        scan: &PageScan,
        fonts: &mut BTreeMap<String, FontUsage>,
    ) {
        let Some(font_dict) = get_dict(&self.document, resources, b"Font") else {
            return;
        };

        let lines = scan.font_lines(LINE_TOLERANCE);

        for (resource_name, font_object) in font_dict.iter() {
            let Some(font) = resolve_dict(&self.document, font_object) else {
                continue;
            };
            let Some(base_font) = get(&self.document, font, b"BaseFont").and_then(text) else {
                continue;
            };

            let subset = strip_subset_prefix(&base_font) != base_font;
            let embedded = subset || self.font_is_embedded(font);

            let usage = fonts.entry(base_font.clone()).or_insert_with(|| FontUsage {
                name: base_font.clone(),
                subset,
                embedded,
                occurrences: Vec::new(),
            });
            usage.embedded |= embedded;

            let before = usage.occurrences.len();
            for (_, line) in lines.iter().filter(|(font, _)| font == resource_name) {
                let occurrence = FontOccurrence {
                    page: page_number,
                    line: *line,
                };
                if !usage.occurrences.contains(&occurrence) {
                    usage.occurrences.push(occurrence);
                }
            }
            if usage.occurrences.len() == before {
                usage.occurrences.push(FontOccurrence {
                    page: page_number,
                    line: 0,
                });
            }
        }
    }

    /// A font is embedded when its descriptor (or its CID descendant's)
    /// carries a font program.
    fn font_is_embedded(&self, font: &Dictionary) -> bool {
        let has_program = |descriptor: &Dictionary| {
            [&b"FontFile"[..], &b"FontFile2"[..], &b"FontFile3"[..]]
                .iter()
                .any(|key| descriptor.has(key))
        };

        if let Some(descriptor) = get_dict(&self.document, font, b"FontDescriptor") {
            return has_program(descriptor);
        }

        match get(&self.document, font, b"DescendantFonts") {
            Some(Object::Array(descendants)) => descendants
                .iter()
                .filter_map(|descendant| resolve_dict(&self.document, descendant))
                .filter_map(|descendant| get_dict(&self.document, descendant, b"FontDescriptor"))
                .any(has_program),
            _ => false,
        }
    }

    fn collect_images(
        &self,
        page_number: u32,
        resources: &Dictionary,
        scan: &PageScan,
        page_size: (f32, f32),
    ) -> Vec<(Vec<u8>, EmbeddedImage)> {
        let Some(xobjects) = get_dict(&self.document, resources, b"XObject") else {
            return Vec::new();
        };

        let mut images = Vec::new();
        for (resource_name, object) in xobjects.iter() {
            let Some(Object::Stream(stream)) = resolve(&self.document, object) else {
                continue;
            };
            if !has_name(&stream.dict, b"Subtype", b"Image") {
                continue;
            }

            let dimension = |key: &[u8]| {
                get(&self.document, &stream.dict, key)
                    .and_then(integer)
                    .filter(|value| *value > 0)
                    .map(|value| value as u32)
            };
            let (Some(width), Some(height)) = (dimension(b"Width"), dimension(b"Height")) else {
                warn!(page = page_number, "image XObject without dimensions, skipping");
                continue;
            };

            let (encoding, data) = self.image_payload(stream, width, height);
            let exif = match encoding {
                ImageEncoding::Jpeg => read_jpeg_exif(&data),
                _ => None,
            };

            let dpi = scan
                .placements
                .get(resource_name)
                .filter(|(drawn_width, _)| *drawn_width > 0.0)
                .map(|(drawn_width, _)| width as f32 / (drawn_width / 72.0))
                .or_else(|| {
                    // Never drawn through `Do`: assume it spans the page width.
                    (page_size.0 > 0.0).then(|| width as f32 / (page_size.0 / 72.0))
                });

            debug!(
                page = page_number,
                width,
                height,
                dpi = dpi.unwrap_or_default(),
                encoding = ?encoding,
                "Embedded image found"
            );

            images.push((
                resource_name.clone(),
                EmbeddedImage {
                    page: page_number,
                    width,
                    height,
                    dpi,
                    encoding,
                    data,
                    exif,
                },
            ));
        }
        images
    }

    /// Classify an image stream and produce bytes the forensics engine can decode.
    fn image_payload(&self, stream: &lopdf::Stream, width: u32, height: u32) -> (ImageEncoding, Vec<u8>) {
        let filters: Vec<Vec<u8>> = match get(&self.document, &stream.dict, b"Filter") {
            Some(Object::Name(filter)) => vec![filter.clone()],
            Some(Object::Array(list)) => list.iter().filter_map(name).map(<[u8]>::to_vec).collect(),
            _ => Vec::new(),
        };

        match filters.as_slice() {
            [only] if only.as_slice() == b"DCTDecode" => (ImageEncoding::Jpeg, stream.content.clone()),
            [] => self.raw_samples(stream, stream.content.clone(), width, height),
            [only] if only.as_slice() == b"FlateDecode" => match stream.decompressed_content() {
                Ok(samples) => self.raw_samples(stream, samples, width, height),
                Err(err) => {
                    debug!(%err, "Flate image stream not decodable");
                    (ImageEncoding::Other("FlateDecode".into()), stream.content.clone())
                }
            },
            other => {
                let names: Vec<String> = other
                    .iter()
                    .map(|filter| String::from_utf8_lossy(filter).into_owned())
                    .collect();
                (ImageEncoding::Other(names.join(",")), stream.content.clone())
            }
        }
    }

    /// Accept decoded samples only when they are 8-bit Gray/RGB/CMYK of the declared size.
    fn raw_samples(
        &self,
        stream: &lopdf::Stream,
        samples: Vec<u8>,
        width: u32,
        height: u32,
    ) -> (ImageEncoding, Vec<u8>) {
        let bits = get(&self.document, &stream.dict, b"BitsPerComponent").and_then(integer);
        let components: Option<u8> = match get(&self.document, &stream.dict, b"ColorSpace").and_then(name) {
            Some(b"DeviceGray") => Some(1),
            Some(b"DeviceRGB") => Some(3),
            Some(b"DeviceCMYK") => Some(4),
            _ => None,
        };

        match (bits, components) {
            (Some(8), Some(components))
                if samples.len() >= width as usize * height as usize * components as usize =>
            {
                (ImageEncoding::Raw { components }, samples)
            }
            _ => (ImageEncoding::Other("unsupported sample layout".into()), samples),
        }
    }
}

/// Resolution of a page that is itself a raster (a scan): the DPI of an image
/// drawn over nearly the whole page.
fn page_raster_dpi(
    images: &[(Vec<u8>, EmbeddedImage)],
    scan: &PageScan,
    (page_width, page_height): (f32, f32),
) -> Option<f32> {
    let page_area = page_width * page_height;
    if page_area <= 0.0 {
        return None;
    }
    images.iter().find_map(|(resource_name, image)| {
        let (drawn_width, drawn_height) = scan.placements.get(resource_name)?;
        (drawn_width * drawn_height >= PAGE_RASTER_COVERAGE * page_area)
            .then_some(image.dpi)
            .flatten()
    })
}
