// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Visual markers module: watermark words, converter stamps and QR-code
// link targets.

use std::sync::LazyLock;

use regex::Regex;
use trustmark_core::error::Result;
use trustmark_core::{AnalysisContext, DocumentFacts, Flag, ModuleKind, ModuleResult, QrPayload, Severity};
use tracing::{debug, instrument};
use url::Url;

use crate::traits::DetectionModule;

/// (code suffix, whole-word alternatives, severity).
const WATERMARKS: &[(&str, &str, Severity)] = &[
    ("SPECIMEN", "specimen|spécimen", Severity::High),
    ("COPY", "copy|copie", Severity::Medium),
    ("DRAFT", "draft|brouillon", Severity::Medium),
    ("DUPLICATE", "duplicate|duplicata", Severity::Medium),
    ("VOID", "void|annulé|annule", Severity::High),
    ("CANCELLED", "cancelled|canceled", Severity::High),
    ("NOT_VALID", r"not\s+valid|non\s+valide|invalide", Severity::High),
    ("SAMPLE", "sample|example|exemple|échantillon|echantillon", Severity::Medium),
    ("TEST", "test|essai", Severity::Low),
    ("CONFIDENTIAL", "confidential|confidentiel", Severity::Low),
];

const ONLINE_CONVERTERS: &[&str] = &[
    "ilovepdf",
    "smallpdf",
    "sejda",
    "pdf24",
    "sodapdf",
    "pdfcandy",
    "online2pdf",
    "pdf2go",
    "cloudconvert",
    "zamzar",
    "freepdfconvert",
    "hipdf",
];

const URL_SHORTENERS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "t.co",
    "goo.gl",
    "ow.ly",
    "is.gd",
    "buff.ly",
    "rebrand.ly",
    "cutt.ly",
    "shorturl.at",
];

const SUSPICIOUS_TLDS: &[&str] = &[
    "xyz", "top", "club", "work", "click", "link", "tk", "ml", "ga", "cf", "gq",
];

/// Domains that show up in footers everywhere and say nothing about the issuer.
const GENERIC_DOMAINS: &[&str] = &["google", "facebook", "twitter", "linkedin"];

const OCR_CONFIDENCE_FACTOR: f64 = 0.8;

static WATERMARK_PATTERNS: LazyLock<Vec<(&'static str, Regex, Severity)>> = LazyLock::new(|| {
    WATERMARKS
        .iter()
        .map(|(kind, words, severity)| {
            let regex = Regex::new(&format!(r"(?i)\b(?:{words})\b")).expect("watermark regex");
            (*kind, regex, *severity)
        })
        .collect()
});

static CREATED_WITH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:created|converted|generated)\s+(?:with|by)\s+([\w.\-]+)")
        .expect("created-with regex")
});

static CONVERTER_NOTICES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:trial\s+version|version\s+d'essai|unregistered|non\s+enregistré|evaluation\s+copy|watermark(?:ed)?\s+by|filigrane\s+par)\b",
    )
    .expect("converter notice regex")
});

static EMAIL_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\w.+\-]+@([\w\-]+\.[\w.\-]+)").expect("email regex")
});

static TEXT_URL_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:https?://|www\.)([\w\-]+(?:\.[\w\-]+)+)").expect("url regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct VisualModule;

impl DetectionModule for VisualModule {
    fn name(&self) -> &str {
        ModuleKind::Visual.name()
    }

    #[instrument(skip_all, name = "visual")]
    fn analyze(&self, facts: &DocumentFacts, ctx: &AnalysisContext) -> Result<ModuleResult> {
        let text = facts.text();

        let mut flags = watermark_flags(&text);
        flags.extend(converter_flag(&text));

        let expected: Vec<String> = if ctx.expected_domains.is_empty() {
            infer_domains(&text)
        } else {
            ctx.expected_domains.iter().map(|domain| normalise_host(domain)).collect()
        };
        for payload in &facts.qr_payloads {
            flags.extend(qr_flags(payload, &expected));
        }

        let mut confidence = if facts.qr_scanned { 0.9 } else { 0.7 };
        if facts.is_ocr() {
            confidence *= OCR_CONFIDENCE_FACTOR;
        }

        debug!(
            qr_payloads = facts.qr_payloads.len(),
            expected_domains = expected.len(),
            flags = flags.len(),
            "Visual checks done"
        );
        Ok(ModuleResult::from_flags(self.name(), flags, confidence))
    }
}

fn watermark_flags(text: &str) -> Vec<Flag> {
    WATERMARK_PATTERNS
        .iter()
        .filter_map(|(kind, regex, severity)| {
            let found = regex.find(text)?;
            Some(
                Flag::new(
                    *severity,
                    format!("VISUAL_WATERMARK_{kind}"),
                    format!("Document is marked \"{}\"", found.as_str()),
                )
                .with_detail("text", found.as_str()),
            )
        })
        .collect()
}

/// One flag for every converter trace together; online services raise it to high.
fn converter_flag(text: &str) -> Option<Flag> {
    let lowered = text.to_lowercase();
    let mut traces: Vec<String> = Vec::new();
    let mut online = false;

    for caps in CREATED_WITH.captures_iter(text) {
        if let Some(tool) = caps.get(1) {
            let tool = tool.as_str().to_lowercase();
            online |= ONLINE_CONVERTERS.iter().any(|name| tool.contains(name));
            traces.push(caps[0].to_string());
        }
    }
    for name in ONLINE_CONVERTERS.iter().filter(|name| lowered.contains(**name)) {
        online = true;
        if !traces.iter().any(|trace| trace.to_lowercase().contains(name)) {
            traces.push((*name).to_string());
        }
    }
    traces.extend(CONVERTER_NOTICES.find_iter(text).map(|found| found.as_str().to_string()));

    if traces.is_empty() {
        return None;
    }
    let severity = if online { Severity::High } else { Severity::Medium };
    Some(
        Flag::new(
            severity,
            "VISUAL_CONVERTER_WATERMARK",
            format!("Converter watermark in the text: {}", traces.join("; ")),
        )
        .with_detail("matches", traces),
    )
}

fn qr_flags(payload: &QrPayload, expected: &[String]) -> Vec<Flag> {
    let data = payload.data.trim();
    let lowered = data.to_lowercase();
    if !(lowered.starts_with("http://") || lowered.starts_with("https://")) {
        return Vec::new();
    }
    let Some(host) = Url::parse(data).ok().and_then(|url| url.host_str().map(normalise_host)) else {
        return Vec::new();
    };

    let flag = |severity, code: &str, message: String| {
        Flag::new(severity, code, message)
            .with_detail("page", payload.page)
            .with_detail("url", data)
            .with_detail("domain", host.clone())
    };

    if URL_SHORTENERS.iter().any(|shortener| host_matches(&host, shortener)) {
        return vec![flag(
            Severity::High,
            "VISUAL_QR_URL_SHORTENER",
            format!("QR code hides its target behind the URL shortener {host}"),
        )];
    }

    let mut flags = Vec::new();
    if let Some(tld) = host.rsplit('.').next()
        && SUSPICIOUS_TLDS.contains(&tld)
    {
        flags.push(flag(
            Severity::Medium,
            "VISUAL_QR_SUSPICIOUS_TLD",
            format!("QR code points to a .{tld} domain"),
        ));
    }
    if !expected.is_empty() && !expected.iter().any(|domain| host_matches(&host, domain)) {
        flags.push(
            flag(
                Severity::Critical,
                "VISUAL_QR_DOMAIN_MISMATCH",
                format!("QR code points to {host}, expected {}", expected.join(", ")),
            )
            .with_detail("expected_domains", expected.to_vec()),
        );
    }
    flags
}

fn normalise_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    if let Some(bare) = host.strip_prefix("www.") {
        return bare.to_string();
    }
    host
}

/// Equal to `domain` or one of its subdomains.
fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Issuer domains named in the text through e-mail addresses and links.
fn infer_domains(text: &str) -> Vec<String> {
    let mut domains: Vec<String> = Vec::new();
    let found = EMAIL_DOMAIN
        .captures_iter(text)
        .chain(TEXT_URL_HOST.captures_iter(text))
        .filter_map(|caps| caps.get(1).map(|host| normalise_host(host.as_str())));
    for domain in found {
        if GENERIC_DOMAINS.iter().any(|generic| domain.contains(generic)) {
            continue;
        }
        if !domains.contains(&domain) {
            domains.push(domain);
        }
    }
    domains
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustmark_core::{PageFacts, TextSource};

    fn facts(text: &str, qr: &[&str]) -> DocumentFacts {
        DocumentFacts {
            pages: vec![PageFacts {
                number: 1,
                width_pt: 595.0,
                height_pt: 842.0,
                dpi: None,
                text: text.to_string(),
            }],
            qr_payloads: qr
                .iter()
                .map(|data| QrPayload {
                    page: 1,
                    data: data.to_string(),
                })
                .collect(),
            qr_scanned: true,
            ..Default::default()
        }
    }

    fn run(facts: &DocumentFacts, ctx: &AnalysisContext) -> ModuleResult {
        VisualModule.analyze(facts, ctx).unwrap()
    }

    fn codes(result: &ModuleResult) -> Vec<&str> {
        result.flags.iter().map(|flag| flag.code.as_str()).collect()
    }

    #[test]
    fn clean_document() {
        let result = run(&facts("Facture ACME, contact@acme.fr", &[]), &AnalysisContext::default());
        assert!(result.flags.is_empty());
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn watermark_words_are_whole_words() {
        let result = run(
            &facts("SPÉCIMEN - Duplicata - testing contest", &[]),
            &AnalysisContext::default(),
        );
        assert_eq!(
            codes(&result),
            vec!["VISUAL_WATERMARK_SPECIMEN", "VISUAL_WATERMARK_DUPLICATE"]
        );
        assert_eq!(result.flags[0].severity, Severity::High);
    }

    #[test]
    fn not_valid_spans_whitespace() {
        let result = run(&facts("NON  VALIDE", &[]), &AnalysisContext::default());
        assert_eq!(codes(&result), vec!["VISUAL_WATERMARK_NOT_VALID"]);
    }

    #[test]
    fn converter_watermarks() {
        let result = run(&facts("Converted with Smallpdf", &[]), &AnalysisContext::default());
        assert_eq!(codes(&result), vec!["VISUAL_CONVERTER_WATERMARK"]);
        assert_eq!(result.flags[0].severity, Severity::High);

        let result = run(&facts("PDF Maker - trial version", &[]), &AnalysisContext::default());
        assert_eq!(codes(&result), vec!["VISUAL_CONVERTER_WATERMARK"]);
        assert_eq!(result.flags[0].severity, Severity::Medium);
    }

    #[test]
    fn shortener_stops_further_qr_checks() {
        let ctx = AnalysisContext::default().with_expected_domains(["acme.fr".to_string()]);
        let result = run(&facts("", &["https://bit.ly/3xYz"]), &ctx);
        assert_eq!(codes(&result), vec!["VISUAL_QR_URL_SHORTENER"]);
    }

    #[test]
    fn qr_domain_against_expected() {
        let ctx = AnalysisContext::default().with_expected_domains(["acme.fr".to_string()]);
        let ok = run(&facts("", &["https://pay.acme.fr/i/42", "https://www.acme.fr"]), &ctx);
        assert!(ok.flags.is_empty());

        let bad = run(&facts("", &["https://acme-payments.xyz/i/42"]), &ctx);
        assert_eq!(
            codes(&bad),
            vec!["VISUAL_QR_SUSPICIOUS_TLD", "VISUAL_QR_DOMAIN_MISMATCH"]
        );
        assert_eq!(bad.flags[1].severity, Severity::Critical);
        assert_eq!(bad.flags[1].detail("domain"), Some(&"acme-payments.xyz".into()));
    }

    #[test]
    fn expected_domains_inferred_from_text() {
        let text = "Contact: billing@acme.fr - www.acme.fr - suivez-nous sur linkedin.com";
        assert_eq!(infer_domains(text), vec!["acme.fr".to_string()]);

        let result = run(&facts(text, &["https://evil.example/pay"]), &AnalysisContext::default());
        assert_eq!(codes(&result), vec!["VISUAL_QR_DOMAIN_MISMATCH"]);
    }

    #[test]
    fn mismatch_skipped_without_any_domain() {
        let result = run(&facts("Aucun contact", &["https://evil.example/pay"]), &AnalysisContext::default());
        assert!(result.flags.is_empty());
    }

    #[test]
    fn non_url_payloads_are_ignored() {
        let result = run(&facts("", &["BCD\n001\n1\nSCT"]), &AnalysisContext::default());
        assert!(result.flags.is_empty());
    }

    #[test]
    fn confidence_without_qr_scan_and_with_ocr() {
        let mut facts = facts("", &[]);
        facts.qr_scanned = false;
        facts.text_source = TextSource::Ocr;
        let result = run(&facts, &AnalysisContext::default());
        assert!((result.confidence - 0.56).abs() < 1e-9);
    }
}
