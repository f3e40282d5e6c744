// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end extraction from PDFs assembled in memory with lopdf.

use chrono::{Datelike, Timelike};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use trustmark_core::ImageEncoding;
use trustmark_document::PdfExtractor;

/// One A4 page with two fonts on the same line, a 100x100 grey image drawn
/// at 72x72 pt, and a populated info dictionary. Returns the serialised bytes.
fn invoice_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "ABCDEF+Arial-BoldMT",
        "Encoding" => "WinAnsiEncoding",
    });
    let image = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 100,
            "Height" => 100,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![128u8; 100 * 100],
    ));

    let resources = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => regular, "F2" => bold },
        "XObject" => dictionary! { "Im1" => image },
    });

    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 760.into()]),
            Operation::new("Tj", vec![Object::string_literal("Invoice total")]),
            Operation::new("Tf", vec!["F2".into(), 12.into()]),
            Operation::new("Tj", vec![Object::string_literal("1250.00")]),
            Operation::new("ET", vec![]),
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![72.into(), 0.into(), 0.into(), 72.into(), 300.into(), 300.into()],
            ),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content.encode().expect("content encodes");
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Producer" => Object::string_literal("iLovePDF"),
        "Creator" => Object::string_literal("Microsoft Word"),
        "CreationDate" => Object::string_literal("D:20240301090000Z"),
        "ModDate" => Object::string_literal("D:20240305120000+01'00'"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("document saves");
    bytes
}

#[test]
fn extracts_metadata() {
    let facts = PdfExtractor::from_bytes(invoice_pdf()).expect("loads").extract();

    assert_eq!(facts.metadata.producer.as_deref(), Some("iLovePDF"));
    assert_eq!(facts.metadata.creator.as_deref(), Some("Microsoft Word"));

    let created = facts.metadata.creation_date.expect("creation date");
    assert_eq!((created.year(), created.month(), created.day()), (2024, 3, 1));
    let modified = facts.metadata.modification_date.expect("modification date");
    assert_eq!((modified.day(), modified.hour()), (5, 11));
    assert!(facts.metadata.raw.contains_key("Producer"));
}

#[test]
fn extracts_pages_and_hash() {
    let bytes = invoice_pdf();
    let expected_hash = trustmark_document::hash_bytes(&bytes);
    let facts = PdfExtractor::from_bytes(bytes).expect("loads").extract();

    assert_eq!(facts.file_hash, expected_hash);
    assert_eq!(facts.page_count(), 1);
    let page = &facts.pages[0];
    assert_eq!(page.number, 1);
    assert_eq!((page.width_pt, page.height_pt), (595.0, 842.0));
    assert_eq!(facts.structure.eof_markers, 1);
    assert!(!facts.structure.has_javascript);
}

#[test]
fn extracts_fonts_with_line_positions() {
    let facts = PdfExtractor::from_bytes(invoice_pdf()).expect("loads").extract();

    assert_eq!(facts.fonts.len(), 2);
    let bold = facts
        .fonts
        .iter()
        .find(|font| font.base_name() == "Arial-BoldMT")
        .expect("subset font listed");
    assert!(bold.subset);
    assert!(bold.embedded);

    let regular = facts
        .fonts
        .iter()
        .find(|font| font.name == "Helvetica")
        .expect("regular font listed");
    assert!(!regular.subset);
    assert!(!regular.embedded);

    // Both fonts share the first text line of page 1.
    assert_eq!(regular.occurrences[0].page, 1);
    assert_eq!(regular.occurrences[0].line, 1);
    assert_eq!(bold.occurrences[0].line, 1);
}

#[test]
fn extracts_images_with_placement_dpi() {
    let facts = PdfExtractor::from_bytes(invoice_pdf()).expect("loads").extract();

    assert_eq!(facts.images.len(), 1);
    let image = &facts.images[0];
    assert_eq!((image.width, image.height), (100, 100));
    assert_eq!(image.encoding, ImageEncoding::Raw { components: 1 });
    assert_eq!(image.data.len(), 100 * 100);
    let dpi = image.dpi.expect("dpi from placement");
    assert!((dpi - 100.0).abs() < 0.01, "expected 100 dpi, got {dpi}");

    // The image covers a small part of the page, so the page keeps no raster DPI.
    assert_eq!(facts.pages[0].dpi, None);
}

#[test]
fn incremental_update_adds_eof_marker() {
    let mut bytes = invoice_pdf();
    bytes.extend_from_slice(b"\n% appended revision\n%%EOF\n");
    let facts = PdfExtractor::from_bytes(bytes).expect("loads").extract();
    assert_eq!(facts.structure.eof_markers, 2);
}

#[test]
fn opens_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("invoice.pdf");
    std::fs::write(&path, invoice_pdf()).expect("write pdf");

    let extractor = PdfExtractor::open(&path).expect("opens");
    assert_eq!(extractor.page_count(), 1);
    assert!(extractor.source_path().is_some());
}
