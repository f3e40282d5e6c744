// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content module: internal consistency of the document text: dates that
// contradict each other, company identifiers with bad checksums, invoice
// references and amounts.

pub mod dates;
pub mod identifiers;
pub mod references;

use chrono::{Duration, NaiveDate};
use trustmark_core::error::Result;
use trustmark_core::{AnalysisContext, DocumentFacts, Flag, ModuleKind, ModuleResult, Severity};
use tracing::{debug, instrument};

use crate::traits::DetectionModule;
use dates::{DateKind, ExtractedDate};
use identifiers::CompanyIdentifiers;

/// Dates further ahead than this are nonsense rather than typos.
const FAR_FUTURE_DAYS: i64 = 365;
/// Slack for dates on the same day in different time zones.
const SAME_DAY_TOLERANCE_DAYS: i64 = 1;
/// The same amount more often than this looks like copy-paste.
const REPEATED_AMOUNT_LIMIT: usize = 3;
/// OCR misreads digits; trust its text less.
const OCR_CONFIDENCE_FACTOR: f64 = 0.7;

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentModule;

impl DetectionModule for ContentModule {
    fn name(&self) -> &str {
        ModuleKind::Content.name()
    }

    #[instrument(skip_all, name = "content")]
    fn analyze(&self, facts: &DocumentFacts, ctx: &AnalysisContext) -> Result<ModuleResult> {
        let text = facts.text();
        if text.trim().is_empty() {
            debug!("No text to check");
            return Ok(ModuleResult::from_flags(self.name(), Vec::new(), 0.1));
        }

        let today = ctx.now.date_naive();
        let dates = dates::extract_dates(&text);
        let ids = identifiers::extract(&text);

        let mut flags = Vec::new();
        flags.extend(out_of_range_dates(&dates, today));
        let invoice_date = dates
            .iter()
            .find(|date| date.kind == Some(DateKind::Invoice))
            .map(|date| date.date);
        if let Some(invoice_date) = invoice_date {
            flags.extend(anachronisms(&dates, invoice_date, today));
        }
        flags.extend(identifier_flags(&ids, &text));
        flags.extend(reference_flags(&text, invoice_date));
        flags.extend(
            references::repeated_amounts(&text, REPEATED_AMOUNT_LIMIT)
                .into_iter()
                .map(|(amount, count)| {
                    Flag::new(
                        Severity::Low,
                        "CONTENT_REPEATED_AMOUNT",
                        format!("Amount {amount} appears {count} times"),
                    )
                    .with_detail("amount", amount)
                    .with_detail("count", count)
                }),
        );

        let mut confidence = date_confidence(&dates);
        if facts.is_ocr() {
            confidence *= OCR_CONFIDENCE_FACTOR;
        }

        debug!(
            dates = dates.len(),
            sirets = ids.sirets.len(),
            sirens = ids.sirens.len(),
            vats = ids.vats.len(),
            flags = flags.len(),
            "Content checks done"
        );
        Ok(ModuleResult::from_flags(self.name(), flags, confidence))
    }
}

fn date_confidence(dates: &[ExtractedDate]) -> f64 {
    let typed = dates.iter().filter(|date| date.kind.is_some()).count();
    match (typed, dates.len()) {
        (2.., _) => 0.9,
        (_, 2..) => 0.7,
        (_, 1) => 0.5,
        _ => 0.3,
    }
}

// -- Dates -------------------------------------------------------------------

fn out_of_range_dates(dates: &[ExtractedDate], today: NaiveDate) -> Vec<Flag> {
    let far_future = today + Duration::days(FAR_FUTURE_DAYS);
    let Some(epoch) = NaiveDate::from_ymd_opt(2000, 1, 1) else {
        return Vec::new();
    };

    let mut flags = Vec::new();
    let mut seen: Vec<NaiveDate> = Vec::new();
    for extracted in dates {
        if seen.contains(&extracted.date) {
            continue;
        }
        seen.push(extracted.date);
        if extracted.date > far_future {
            flags.push(
                Flag::new(
                    Severity::Critical,
                    "CONTENT_FAR_FUTURE_DATE",
                    format!("Date {} is more than a year in the future", extracted.date),
                )
                .with_detail("date", extracted.date.to_string()),
            );
        } else if extracted.date < epoch {
            flags.push(
                Flag::new(
                    Severity::Medium,
                    "CONTENT_VERY_OLD_DATE",
                    format!("Date {} predates 2000", extracted.date),
                )
                .with_detail("date", extracted.date.to_string()),
            );
        }
    }
    flags
}

/// Dates that cannot be in that order relative to the invoice date.
fn anachronisms(dates: &[ExtractedDate], invoice: NaiveDate, today: NaiveDate) -> Vec<Flag> {
    let tolerance = Duration::days(SAME_DAY_TOLERANCE_DAYS);
    let mut flags = Vec::new();

    let first_of = |kind: DateKind, bad: &dyn Fn(NaiveDate) -> bool| {
        dates
            .iter()
            .filter(|date| date.kind == Some(kind))
            .map(|date| date.date)
            .find(|date| bad(*date))
    };

    if let Some(service) = first_of(DateKind::Service, &|date| date > invoice + tolerance) {
        flags.push(anachronism(
            "CONTENT_ANACHRONISM_SERVICE",
            format!("Service date {service} is after the invoice date {invoice}"),
            DateKind::Service,
            service,
            invoice,
        ));
    }
    if let Some(due) = first_of(DateKind::Due, &|date| date < invoice - tolerance) {
        flags.push(anachronism(
            "CONTENT_ANACHRONISM_DUE",
            format!("Due date {due} is before the invoice date {invoice}"),
            DateKind::Due,
            due,
            invoice,
        ));
    }
    if let Some(order) = first_of(DateKind::Order, &|date| date > invoice + tolerance) {
        flags.push(anachronism(
            "CONTENT_ANACHRONISM_ORDER",
            format!("Order date {order} is after the invoice date {invoice}"),
            DateKind::Order,
            order,
            invoice,
        ));
    }
    if invoice > today + tolerance {
        flags.push(
            Flag::new(
                Severity::Critical,
                "CONTENT_FUTURE_INVOICE_DATE",
                format!("Invoice date {invoice} is in the future"),
            )
            .with_detail("invoice_date", invoice.to_string()),
        );
    }
    flags
}

fn anachronism(code: &str, message: String, kind: DateKind, date: NaiveDate, invoice: NaiveDate) -> Flag {
    Flag::new(Severity::High, code, message)
        .with_detail("kind", kind.as_str())
        .with_detail("date", date.to_string())
        .with_detail("invoice_date", invoice.to_string())
}

// -- Identifiers -------------------------------------------------------------

fn identifier_flags(ids: &CompanyIdentifiers, text: &str) -> Vec<Flag> {
    let mut flags = Vec::new();

    for siret in ids.sirets.iter().filter(|id| !id.valid) {
        flags.push(
            Flag::new(
                Severity::High,
                "CONTENT_INVALID_SIRET",
                format!("SIRET {} fails its checksum", siret.value),
            )
            .with_detail("siret", siret.value.clone()),
        );
    }
    for siren in ids.sirens.iter().filter(|id| !id.valid) {
        flags.push(
            Flag::new(
                Severity::High,
                "CONTENT_INVALID_SIREN",
                format!("SIREN {} fails its checksum", siren.value),
            )
            .with_detail("siren", siren.value.clone()),
        );
    }
    for vat in ids.vats.iter().filter(|id| !id.valid) {
        flags.push(
            Flag::new(
                Severity::High,
                "CONTENT_INVALID_VAT",
                format!("VAT number {} has the wrong key", vat.value),
            )
            .with_detail("vat", vat.value.clone()),
        );
    }

    let company_sirens = ids.valid_sirens();
    if !company_sirens.is_empty() {
        for vat_siren in ids.vat_sirens() {
            if !company_sirens.contains(&vat_siren) {
                flags.push(
                    Flag::new(
                        Severity::Critical,
                        "CONTENT_SIREN_VAT_MISMATCH",
                        format!(
                            "VAT number belongs to SIREN {vat_siren}, the document names {}",
                            company_sirens.join(", ")
                        ),
                    )
                    .with_detail("vat_siren", vat_siren)
                    .with_detail("sirens", company_sirens.clone()),
                );
            }
        }
    }

    if ids.is_empty() && text.to_lowercase().contains("facture") {
        flags.push(Flag::new(
            Severity::Medium,
            "CONTENT_MISSING_COMPANY_ID",
            "Invoice carries no SIRET, SIREN or RCS registration",
        ));
    }
    flags
}

// -- References --------------------------------------------------------------

fn reference_flags(text: &str, invoice_date: Option<NaiveDate>) -> Vec<Flag> {
    let refs = references::invoice_references(text);
    let mut flags = Vec::new();

    if refs.len() > 1 {
        flags.push(
            Flag::new(
                Severity::Critical,
                "CONTENT_INCONSISTENT_REFERENCES",
                format!("Document carries {} different invoice numbers", refs.len()),
            )
            .with_detail("references", refs.clone()),
        );
    }

    let Some(invoice_date) = invoice_date else {
        return flags;
    };
    for reference in &refs {
        let Some(unit) = references::reference_date(reference)
            .and_then(|encoded| encoded.mismatch_with(invoice_date))
        else {
            continue;
        };
        let severity = match unit {
            "year" => Severity::High,
            "month" => Severity::Medium,
            _ => Severity::Low,
        };
        flags.push(
            Flag::new(
                severity,
                "CONTENT_REFERENCE_DATE_MISMATCH",
                format!("Invoice number {reference} encodes a different {unit} than {invoice_date}"),
            )
            .with_detail("reference", reference.clone())
            .with_detail("unit", unit)
            .with_detail("invoice_date", invoice_date.to_string()),
        );
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use trustmark_core::{PageFacts, TextSource};

    fn facts(text: &str) -> DocumentFacts {
        DocumentFacts {
            pages: vec![PageFacts {
                number: 1,
                width_pt: 595.0,
                height_pt: 842.0,
                dpi: None,
                text: text.to_string(),
            }],
            ..Default::default()
        }
    }

    fn ctx() -> AnalysisContext {
        AnalysisContext::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
    }

    fn run(text: &str) -> ModuleResult {
        ContentModule.analyze(&facts(text), &ctx()).unwrap()
    }

    fn codes(result: &ModuleResult) -> Vec<&str> {
        result.flags.iter().map(|flag| flag.code.as_str()).collect()
    }

    const CLEAN: &str = "FACTURE N° FAC-2024-0042\n\
        ACME SAS - SIRET : 552 081 317 66522 - TVA : FR 03 552 081 317\n\
        Date de facture : 15/03/2024\n\
        Date d'échéance : 14/04/2024\n\
        Date de livraison : 10/03/2024\n\
        Total TTC : 1 250,00 €";

    #[test]
    fn clean_invoice() {
        let result = run(CLEAN);
        assert!(result.flags.is_empty(), "{:?}", codes(&result));
        assert_eq!(result.score, 100);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn empty_text() {
        let result = run("   \n");
        assert!(result.flags.is_empty());
        assert_eq!(result.score, 100);
        assert_eq!(result.confidence, 0.1);
    }

    #[test]
    fn ocr_text_is_trusted_less() {
        let mut facts = facts(CLEAN);
        facts.text_source = TextSource::Ocr;
        let result = ContentModule.analyze(&facts, &ctx()).unwrap();
        assert!((result.confidence - 0.63).abs() < 1e-9);
    }

    #[test]
    fn confidence_follows_dates() {
        assert_eq!(run("Rien ici").confidence, 0.3);
        assert_eq!(run("Le 01/02/2024").confidence, 0.5);
        assert_eq!(run("01/02/2024\n03/02/2024").confidence, 0.7);
    }

    #[test]
    fn service_after_invoice() {
        let result = run("SIREN 552081317\nDate de facture : 15/03/2024\nDate de livraison : 20/03/2024");
        assert_eq!(codes(&result), vec!["CONTENT_ANACHRONISM_SERVICE"]);
        assert_eq!(result.flags[0].severity, Severity::High);
    }

    #[test]
    fn due_before_invoice_and_order_after() {
        let result = run(
            "SIREN 552081317\nDate de facture : 15/03/2024\nDate d'échéance : 01/03/2024\nDate de commande : 18/03/2024",
        );
        assert_eq!(
            codes(&result),
            vec!["CONTENT_ANACHRONISM_DUE", "CONTENT_ANACHRONISM_ORDER"]
        );
    }

    #[test]
    fn one_day_tolerance() {
        let result = run("SIREN 552081317\nDate de facture : 15/03/2024\nDate de livraison : 16/03/2024");
        assert!(result.flags.is_empty());
    }

    #[test]
    fn future_and_ancient_dates() {
        let result = run("SIREN 552081317\nDate de facture : 10/07/2024\nArchive 1998-01-01\nValable jusqu'au 01/01/2030");
        assert_eq!(
            codes(&result),
            vec![
                "CONTENT_VERY_OLD_DATE",
                "CONTENT_FAR_FUTURE_DATE",
                "CONTENT_FUTURE_INVOICE_DATE"
            ]
        );
        assert!(result.has_critical());
    }

    #[test]
    fn bad_checksums() {
        let result = run("SIRET 552 081 317 66523\nSIREN : 552081318\nTVA FR04552081317");
        assert_eq!(
            codes(&result),
            vec!["CONTENT_INVALID_SIRET", "CONTENT_INVALID_SIREN", "CONTENT_INVALID_VAT"]
        );
    }

    #[test]
    fn vat_from_another_company() {
        // 732829320 is a valid SIREN with VAT key 44.
        let result = run("SIREN 552081317\nTVA FR44732829320");
        assert_eq!(codes(&result), vec!["CONTENT_SIREN_VAT_MISMATCH"]);
        assert_eq!(result.flags[0].severity, Severity::Critical);
    }

    #[test]
    fn invoice_without_company_id() {
        let result = run("Facture pour services rendus");
        assert_eq!(codes(&result), vec!["CONTENT_MISSING_COMPANY_ID"]);
        assert!(run("Receipt for services").flags.is_empty());
    }

    #[test]
    fn two_invoice_numbers() {
        let result = run("RCS Paris\nFacture n° 2024-0042\nInvoice # 2024-0043");
        assert_eq!(codes(&result), vec!["CONTENT_INCONSISTENT_REFERENCES"]);
    }

    #[test]
    fn reference_encodes_another_month() {
        let result = run("RCS Paris\nFacture n° FAC-202402-0042\nDate de facture : 15/03/2024");
        assert_eq!(codes(&result), vec!["CONTENT_REFERENCE_DATE_MISMATCH"]);
        assert_eq!(result.flags[0].severity, Severity::Medium);
        assert_eq!(result.flags[0].detail("unit"), Some(&"month".into()));
    }

    #[test]
    fn amount_repeated() {
        let result = run("RCS Paris\n100,00 € 100,00 € 100,00 € 100,00 €");
        assert_eq!(codes(&result), vec!["CONTENT_REPEATED_AMOUNT"]);
    }
}
