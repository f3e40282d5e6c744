// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trait seams: the detection module contract and the two collaborators
// (issuer templates, company registry) that live outside this crate.

use trustmark_core::error::Result;
use trustmark_core::{AnalysisContext, DocumentFacts, ModuleResult};

use crate::external::{CompanyRecord, VatStatus};
use crate::template::IssuerTemplate;

/// One independent detector.
///
/// Implementations are pure with respect to the facts they are given: no
/// shared mutable state, safe to run concurrently with every other module.
pub trait DetectionModule: Send + Sync {
    /// Stable lowercase name, also used as the weight key.
    fn name(&self) -> &str;

    /// Inspect the document. An `Err` is turned into a neutral failed result
    /// by the orchestrator; it never aborts the analysis.
    fn analyze(&self, facts: &DocumentFacts, ctx: &AnalysisContext) -> Result<ModuleResult>;
}

/// Source of known issuer layouts.
pub trait TemplateStore: Send + Sync {
    /// Find the template of the issuer this document claims to come from.
    /// Returns Ok(None) when the issuer is unknown.
    fn find(&self, facts: &DocumentFacts) -> Result<Option<IssuerTemplate>>;
}

/// Company registry lookups.
pub trait RegistryClient: Send + Sync {
    /// Look up a 9-digit SIREN. Returns Ok(None) when no such company exists.
    fn lookup_siren(&self, siren: &str) -> Result<Option<CompanyRecord>>;

    /// Check an intra-community VAT number (`FR` + key + SIREN).
    ///
    /// Registries without VAT data keep the default and leave every number
    /// unchecked.
    fn check_vat(&self, _vat: &str) -> Result<VatStatus> {
        Ok(VatStatus::Unknown)
    }
}
