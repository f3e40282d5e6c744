// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External verification module: checks the companies and VAT numbers named
// in the text against a registry.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trustmark_core::error::Result;
use trustmark_core::{AnalysisContext, DocumentFacts, Flag, ModuleKind, ModuleResult, Severity};
use tracing::{debug, instrument, warn};

use crate::content::identifiers;
use crate::traits::{DetectionModule, RegistryClient};

/// Word-overlap (Jaccard) needed for two company names to match.
const NAME_MATCH_THRESHOLD: f64 = 0.8;

/// Legal-form tokens ignored when comparing company names.
const LEGAL_FORMS: &[&str] = &[
    "SA", "SAS", "SASU", "SARL", "EURL", "SNC", "SCI", "SCOP", "SEL", "GIE", "SE", "SCA",
];

/// A registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub siren: String,
    pub name: String,
    /// Struck off or ceased trading.
    #[serde(default)]
    pub closed: bool,
}

/// Registry answer for a VAT number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VatStatus {
    Valid,
    Invalid,
    /// The registry cannot say; the number is not counted as checked.
    Unknown,
}

/// Registry backed by a map, for tests and offline use.
///
/// A VAT number is valid when its SIREN belongs to an open company here.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    records: HashMap<String, CompanyRecord>,
}

impl InMemoryRegistry {
    pub fn new(records: impl IntoIterator<Item = CompanyRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.siren.clone(), record))
                .collect(),
        }
    }

    pub fn insert(&mut self, record: CompanyRecord) {
        self.records.insert(record.siren.clone(), record);
    }
}

impl RegistryClient for InMemoryRegistry {
    fn lookup_siren(&self, siren: &str) -> Result<Option<CompanyRecord>> {
        Ok(self.records.get(siren).cloned())
    }

    fn check_vat(&self, vat: &str) -> Result<VatStatus> {
        let open = vat
            .get(4..)
            .and_then(|siren| self.records.get(siren))
            .is_some_and(|record| !record.closed);
        Ok(if open { VatStatus::Valid } else { VatStatus::Invalid })
    }
}

/// Upper-cased words of a company name, without punctuation or legal form.
fn name_words(name: &str) -> BTreeSet<String> {
    name.to_uppercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty() && !LEGAL_FORMS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Whether two company names designate the same company, tolerating legal
/// forms, punctuation, case and a little word drift.
pub fn company_names_match(a: &str, b: &str) -> bool {
    let (a, b) = (name_words(a), name_words(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let shared = a.intersection(&b).count() as f64;
    let total = a.union(&b).count() as f64;
    shared / total >= NAME_MATCH_THRESHOLD
}

pub struct ExternalModule {
    client: Arc<dyn RegistryClient>,
}

/// Running tally of registry lookups.
#[derive(Default)]
struct Lookups {
    flags: Vec<Flag>,
    attempted: usize,
    answered: usize,
}

impl Lookups {
    fn failed(&mut self, kind: &str, value: &str, err: impl std::fmt::Display) {
        self.flags.push(
            Flag::new(
                Severity::Low,
                "EXTERNAL_VERIFICATION_FAILED",
                format!("{} {value} could not be checked: {err}", kind.to_uppercase()),
            )
            .with_detail(kind, value.to_string()),
        );
    }
}

impl ExternalModule {
    pub fn new(client: Arc<dyn RegistryClient>) -> Self {
        Self { client }
    }

    fn check_siren(&self, siren: &str, issuer: Option<&str>, tally: &mut Lookups) {
        tally.attempted += 1;
        let record = match self.client.lookup_siren(siren) {
            Ok(record) => record,
            Err(err) => {
                warn!(siren = %siren, error = %err, "Registry lookup failed");
                tally.failed("siren", siren, err);
                return;
            }
        };
        tally.answered += 1;

        let Some(record) = record else {
            tally.flags.push(
                Flag::new(
                    Severity::High,
                    "EXTERNAL_SIREN_NOT_FOUND",
                    format!("SIREN {siren} is not in the company registry"),
                )
                .with_detail("siren", siren.to_string()),
            );
            return;
        };

        if record.closed {
            tally.flags.push(
                Flag::new(
                    Severity::Critical,
                    "EXTERNAL_COMPANY_CLOSED",
                    format!("{} (SIREN {siren}) is closed", record.name),
                )
                .with_detail("siren", siren.to_string())
                .with_detail("name", record.name.clone()),
            );
        }
        let mismatch = issuer.filter(|issuer| {
            !record.name.trim().is_empty() && !company_names_match(issuer, &record.name)
        });
        if let Some(issuer) = mismatch {
            tally.flags.push(
                Flag::new(
                    Severity::High,
                    "EXTERNAL_COMPANY_NAME_MISMATCH",
                    format!(
                        "SIREN {siren} is registered to {}, not {issuer}",
                        record.name
                    ),
                )
                .with_detail("siren", siren.to_string())
                .with_detail("name_in_document", issuer.to_string())
                .with_detail("name_in_registry", record.name),
            );
        }
    }

    fn check_vat(&self, vat: &str, tally: &mut Lookups) {
        match self.client.check_vat(vat) {
            Ok(VatStatus::Unknown) => debug!(vat = %vat, "Registry has no VAT data"),
            Ok(status) => {
                tally.attempted += 1;
                tally.answered += 1;
                if status == VatStatus::Invalid {
                    tally.flags.push(
                        Flag::new(
                            Severity::Critical,
                            "EXTERNAL_VAT_INVALID",
                            format!("VAT number {vat} is not registered as valid"),
                        )
                        .with_detail("vat", vat.to_string()),
                    );
                }
            }
            Err(err) => {
                warn!(vat = %vat, error = %err, "VAT check failed");
                tally.attempted += 1;
                tally.failed("vat", vat, err);
            }
        }
    }
}

impl DetectionModule for ExternalModule {
    fn name(&self) -> &str {
        ModuleKind::External.name()
    }

    #[instrument(skip_all, name = "external")]
    fn analyze(&self, facts: &DocumentFacts, ctx: &AnalysisContext) -> Result<ModuleResult> {
        let ids = identifiers::extract(&facts.text());
        let issuer = ctx
            .issuer_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        let mut tally = Lookups::default();
        for siren in ids.valid_sirens() {
            self.check_siren(&siren, issuer, &mut tally);
        }
        for vat in ids.valid_vats() {
            self.check_vat(&vat, &mut tally);
        }

        if tally.attempted == 0 {
            debug!("No company identifier to verify");
            return Ok(ModuleResult::from_flags(self.name(), tally.flags, 0.1));
        }
        let confidence = 0.9 * tally.answered as f64 / tally.attempted as f64;
        debug!(attempted = tally.attempted, answered = tally.answered, "Registry checks done");
        Ok(ModuleResult::from_flags(self.name(), tally.flags, confidence))
    }
}
