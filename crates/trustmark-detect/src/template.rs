// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template module: compares the document with the known layout of the
// issuer it claims to come from.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trustmark_core::error::{Result, TrustmarkError};
use trustmark_core::{AnalysisContext, DocumentFacts, Flag, ModuleKind, ModuleResult, Severity};
use tracing::{debug, instrument};

use crate::content::identifiers;
use crate::fonts::family;
use crate::traits::{DetectionModule, TemplateStore};

/// Page sizes closer than this (points) are the same paper.
const PAGE_SIZE_TOLERANCE_PT: f32 = 2.0;

/// What documents from one issuer normally look like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerTemplate {
    pub issuer: String,
    /// SIRENs the issuer invoices under.
    #[serde(default)]
    pub sirens: Vec<String>,
    /// Substring expected in the producer (or creator) field.
    #[serde(default)]
    pub producer: Option<String>,
    /// Lower-case font families every genuine document uses.
    #[serde(default)]
    pub font_families: Vec<String>,
    /// Width and height of the first page, in points.
    #[serde(default)]
    pub page_size: Option<(f32, f32)>,
}

// -- Store -------------------------------------------------------------------

/// Templates held in memory, matched on the SIRENs found in the text.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateStore {
    templates: Vec<IssuerTemplate>,
}

impl InMemoryTemplateStore {
    pub fn new(templates: Vec<IssuerTemplate>) -> Self {
        Self { templates }
    }

    /// Load a JSON array of templates.
    pub fn from_json(source: &str) -> Result<Self> {
        let templates: Vec<IssuerTemplate> = serde_json::from_str(source)
            .map_err(|err| TrustmarkError::Configuration(format!("invalid template file: {err}")))?;
        Ok(Self::new(templates))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn find(&self, facts: &DocumentFacts) -> Result<Option<IssuerTemplate>> {
        let sirens = identifiers::extract(&facts.text()).valid_sirens();
        Ok(self
            .templates
            .iter()
            .find(|template| template.sirens.iter().any(|siren| sirens.contains(siren)))
            .cloned())
    }
}

// -- Module ------------------------------------------------------------------

pub struct TemplateModule {
    store: Arc<dyn TemplateStore>,
}

impl TemplateModule {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }
}

impl DetectionModule for TemplateModule {
    fn name(&self) -> &str {
        ModuleKind::Template.name()
    }

    #[instrument(skip_all, name = "template")]
    fn analyze(&self, facts: &DocumentFacts, _ctx: &AnalysisContext) -> Result<ModuleResult> {
        let Some(template) = self.store.find(facts)? else {
            debug!("No issuer template matched");
            return Ok(ModuleResult::from_flags(self.name(), Vec::new(), 0.2));
        };

        let mut flags = Vec::new();
        flags.extend(producer_flag(&template, facts));
        flags.extend(font_flag(&template, facts));
        flags.extend(page_size_flag(&template, facts));

        debug!(issuer = %template.issuer, flags = flags.len(), "Template comparison done");
        Ok(ModuleResult::from_flags(self.name(), flags, 0.85))
    }
}

fn producer_flag(template: &IssuerTemplate, facts: &DocumentFacts) -> Option<Flag> {
    let expected = template.producer.as_deref()?;
    let needle = expected.to_lowercase();
    let metadata = &facts.metadata;
    let matches = [metadata.producer.as_deref(), metadata.creator.as_deref()]
        .into_iter()
        .flatten()
        .any(|value| value.to_lowercase().contains(&needle));
    if matches {
        return None;
    }
    let actual = metadata.producer.as_deref().unwrap_or("unknown");
    Some(
        Flag::new(
            Severity::High,
            "TEMPLATE_PRODUCER_MISMATCH",
            format!(
                "{} documents are produced by {expected}, this one by {actual}",
                template.issuer
            ),
        )
        .with_detail("issuer", template.issuer.clone())
        .with_detail("expected", expected)
        .with_detail("actual", actual),
    )
}

fn font_flag(template: &IssuerTemplate, facts: &DocumentFacts) -> Option<Flag> {
    let present: BTreeSet<String> = facts.fonts.iter().map(family).collect();
    let missing: Vec<&str> = template
        .font_families
        .iter()
        .map(String::as_str)
        .filter(|expected| !present.contains(&expected.to_lowercase()))
        .collect();
    if missing.is_empty() {
        return None;
    }
    Some(
        Flag::new(
            Severity::Medium,
            "TEMPLATE_FONT_MISMATCH",
            format!("Fonts usual for {} are missing: {}", template.issuer, missing.join(", ")),
        )
        .with_detail("issuer", template.issuer.clone())
        .with_detail("missing", missing),
    )
}

fn page_size_flag(template: &IssuerTemplate, facts: &DocumentFacts) -> Option<Flag> {
    let (width, height) = template.page_size?;
    let page = facts.pages.first()?;
    let off = (page.width_pt - width).abs() > PAGE_SIZE_TOLERANCE_PT
        || (page.height_pt - height).abs() > PAGE_SIZE_TOLERANCE_PT;
    if !off {
        return None;
    }
    Some(
        Flag::new(
            Severity::Low,
            "TEMPLATE_PAGE_SIZE_MISMATCH",
            format!(
                "Page is {:.0}x{:.0} pt, {} uses {width:.0}x{height:.0} pt",
                page.width_pt, page.height_pt, template.issuer
            ),
        )
        .with_detail("expected", vec![width, height])
        .with_detail("actual", vec![page.width_pt, page.height_pt]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustmark_core::{DocumentMetadata, FontUsage, PageFacts};

    fn acme() -> IssuerTemplate {
        IssuerTemplate {
            issuer: "ACME".into(),
            sirens: vec!["552081317".into()],
            producer: Some("SAP".into()),
            font_families: vec!["helvetica".into()],
            page_size: Some((595.0, 842.0)),
        }
    }

    fn facts(producer: &str, font: &str, width: f32) -> DocumentFacts {
        DocumentFacts {
            pages: vec![PageFacts {
                number: 1,
                width_pt: width,
                height_pt: 842.0,
                dpi: None,
                text: "ACME SAS - SIREN 552 081 317".into(),
            }],
            metadata: DocumentMetadata {
                producer: Some(producer.into()),
                ..Default::default()
            },
            fonts: vec![FontUsage {
                name: font.into(),
                subset: false,
                embedded: true,
                occurrences: Vec::new(),
            }],
            ..Default::default()
        }
    }

    fn module(templates: Vec<IssuerTemplate>) -> TemplateModule {
        TemplateModule::new(Arc::new(InMemoryTemplateStore::new(templates)))
    }

    fn codes(result: &ModuleResult) -> Vec<&str> {
        result.flags.iter().map(|flag| flag.code.as_str()).collect()
    }

    #[test]
    fn no_template_is_low_confidence() {
        let result = module(Vec::new())
            .analyze(&facts("SAP NetWeaver", "Helvetica", 595.0), &AnalysisContext::default())
            .unwrap();
        assert!(result.flags.is_empty());
        assert_eq!(result.score, 100);
        assert_eq!(result.confidence, 0.2);
    }

    #[test]
    fn matching_document() {
        let result = module(vec![acme()])
            .analyze(&facts("SAP NetWeaver", "Helvetica-Bold", 594.0), &AnalysisContext::default())
            .unwrap();
        assert!(result.flags.is_empty(), "{:?}", codes(&result));
        assert_eq!(result.confidence, 0.85);
    }

    #[test]
    fn everything_differs() {
        let result = module(vec![acme()])
            .analyze(&facts("Microsoft Word", "Calibri", 612.0), &AnalysisContext::default())
            .unwrap();
        assert_eq!(
            codes(&result),
            vec![
                "TEMPLATE_PRODUCER_MISMATCH",
                "TEMPLATE_FONT_MISMATCH",
                "TEMPLATE_PAGE_SIZE_MISMATCH"
            ]
        );
    }

    #[test]
    fn store_failure_propagates() {
        struct Broken;
        impl TemplateStore for Broken {
            fn find(&self, _facts: &DocumentFacts) -> Result<Option<IssuerTemplate>> {
                Err(TrustmarkError::Collaborator("template database offline".into()))
            }
        }
        let module = TemplateModule::new(Arc::new(Broken));
        assert!(module.analyze(&DocumentFacts::default(), &AnalysisContext::default()).is_err());
    }

    #[test]
    fn templates_from_json() {
        let store = InMemoryTemplateStore::from_json(
            r#"[{"issuer": "ACME", "sirens": ["552081317"], "page_size": [595.0, 842.0]}]"#,
        )
        .unwrap();
        assert_eq!(store.len(), 1);
        let found = store.find(&facts("x", "y", 595.0)).unwrap().unwrap();
        assert_eq!(found.issuer, "ACME");
        assert!(found.producer.is_none());

        assert!(InMemoryTemplateStore::from_json("{").is_err());
    }
}
