// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Full pipeline: PDF bytes in, scored report and JSON out.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use trustmark_core::{AnalyzerConfig, RiskLevel, TrustmarkError};
use trustmark_engine::Orchestrator;
use trustmark_engine::report::{WireReport, from_json, to_json_pretty};

/// A one-page PDF with a single line of Helvetica text.
fn pdf(producer: &str, line: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 760.into()]),
            Operation::new("Tj", vec![Object::string_literal(line)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().expect("content encodes")));
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
        "Producer" => Object::string_literal(producer),
        "CreationDate" => Object::string_literal("D:20240301090000Z"),
        "ModDate" => Object::string_literal("D:20240301090000Z"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("document saves");
    bytes
}

fn orchestrator() -> Orchestrator {
    Orchestrator::new(AnalyzerConfig::default()).expect("default config is valid")
}

#[tokio::test]
async fn clean_document_is_low_risk() {
    let report = orchestrator()
        .analyze_bytes(pdf("pdfTeX-1.40.25", "Invoice total 120.00"))
        .await
        .expect("analysis runs");

    assert_eq!(report.file_hash.len(), 64);
    assert_eq!(report.module_results.len(), 6);
    assert_eq!(report.risk_level, RiskLevel::Low);
    assert!(report.trust_score >= 80);
    assert!(!report.low_confidence);
    assert!(report.summary.starts_with("This document appears legitimate."));
}

#[tokio::test]
async fn ai_generated_document_is_critical() {
    let report = orchestrator()
        .analyze_bytes(pdf("ChatGPT", "Invoice total 120.00"))
        .await
        .expect("analysis runs");

    assert!(report.trust_score <= 24);
    assert_eq!(report.risk_level, RiskLevel::Critical);
    let codes: Vec<&str> = report.flags().map(|flag| flag.code.as_str()).collect();
    assert!(codes.contains(&"META_AI_GENERATED"));
    assert!(report.summary.starts_with("Do not trust this document"));
}

#[tokio::test]
async fn analyzes_files_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("invoice.pdf");
    let bytes = pdf("pdfTeX-1.40.25", "Invoice total 120.00");
    std::fs::write(&path, &bytes).expect("write pdf");

    let from_file = orchestrator().analyze_file(&path).await.expect("analysis runs");
    let from_bytes = orchestrator().analyze_bytes(bytes).await.expect("analysis runs");
    assert_eq!(from_file.file_hash, from_bytes.file_hash);
    assert_eq!(from_file.trust_score, from_bytes.trust_score);
}

#[tokio::test]
async fn missing_file_is_an_error() {
    let outcome = orchestrator().analyze_file("/nonexistent/invoice.pdf").await;
    assert!(matches!(outcome, Err(TrustmarkError::Io(_))));
}

#[tokio::test]
async fn json_round_trip() {
    let report = orchestrator()
        .analyze_bytes(pdf("iLovePDF", "Invoice total 120.00"))
        .await
        .expect("analysis runs");

    let json = to_json_pretty(&report).expect("serializes");
    let parsed = from_json(&json).expect("parses");
    assert_eq!(parsed.trust_score, report.trust_score);
    assert_eq!(parsed.risk_level, report.risk_level);
    let original: Vec<&str> = report.flags().map(|flag| flag.code.as_str()).collect();
    assert_eq!(parsed.flag_codes().collect::<Vec<_>>(), original);
    assert_eq!(parsed, WireReport::from(&report));
}
