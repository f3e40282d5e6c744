// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metadata module: producer/creator software and the info-dictionary
// timestamps.

use chrono::{DateTime, Duration, Utc};
use trustmark_core::error::Result;
use trustmark_core::{AnalysisContext, DocumentFacts, DocumentMetadata, Flag, ModuleKind, ModuleResult, Severity};
use tracing::{debug, instrument};

use crate::traits::DetectionModule;

const AI_GENERATORS: &[&str] = &[
    "chatgpt",
    "openai",
    "claude",
    "anthropic",
    "gemini",
    "bard",
    "copilot",
    "jasper ai",
    "copy.ai",
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

const EDITING_TOOLS: &[&str] = &[
    "nitro",
    "foxit phantompdf",
    "pdfelement",
    "pdf-xchange editor",
    "libreoffice",
    "google docs",
    "canva",
    "inkscape",
    "gimp",
    "photoshop",
];

/// Modification later than creation by more than this counts as an edit.
const MODIFICATION_GRACE_SECONDS: i64 = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataModule;

impl DetectionModule for MetadataModule {
    fn name(&self) -> &str {
        ModuleKind::Metadata.name()
    }

    #[instrument(skip_all, name = "metadata")]
    fn analyze(&self, facts: &DocumentFacts, ctx: &AnalysisContext) -> Result<ModuleResult> {
        let metadata = &facts.metadata;
        if metadata.is_empty() {
            let flag = Flag::new(
                Severity::Medium,
                "META_NO_METADATA",
                "Document has no metadata at all; it was probably stripped",
            );
            return Ok(ModuleResult::from_flags(self.name(), vec![flag], 0.4));
        }

        let mut flags = Vec::new();
        flags.extend(software_flag(metadata));
        flags.extend(date_flags(metadata, ctx.now));
        if metadata.producer.is_none() && metadata.creator.is_none() {
            flags.push(Flag::new(
                Severity::Low,
                "META_NO_PRODUCER",
                "Document does not say which software produced it",
            ));
        }

        debug!(flags = flags.len(), "Metadata checks done");
        Ok(ModuleResult::from_flags(self.name(), flags, 0.9))
    }
}

/// At most one flag for producer and creator together, most severe wins.
fn software_flag(metadata: &DocumentMetadata) -> Option<Flag> {
    let fields = [
        ("producer", metadata.producer.as_deref()),
        ("creator", metadata.creator.as_deref()),
    ];
    let tiers: [(&[&str], Severity, &str, &str); 3] = [
        (AI_GENERATORS, Severity::Critical, "META_AI_GENERATED", "an AI generator"),
        (ONLINE_CONVERTERS, Severity::High, "META_ONLINE_CONVERTER", "an online converter"),
        (EDITING_TOOLS, Severity::Medium, "META_SUSPICIOUS_PRODUCER", "an editing tool"),
    ];

    for (names, severity, code, label) in tiers {
        for (field, value) in fields {
            let Some(value) = value else { continue };
            let lowered = value.to_lowercase();
            if let Some(name) = names.iter().find(|name| lowered.contains(**name)) {
                return Some(
                    Flag::new(severity, code, format!("Document {field} is {label}: {value}"))
                        .with_detail("field", field)
                        .with_detail("value", value)
                        .with_detail("matched", *name),
                );
            }
        }
    }
    None
}

fn date_flags(metadata: &DocumentMetadata, now: DateTime<Utc>) -> Vec<Flag> {
    let mut flags = Vec::new();

    if let Some(created) = metadata.creation_date
        && created > now + Duration::days(1)
    {
        flags.push(
            Flag::new(
                Severity::Critical,
                "META_FUTURE_CREATION_DATE",
                format!("Creation date {} is in the future", created.format("%Y-%m-%d")),
            )
            .with_detail("creation_date", created.to_rfc3339()),
        );
    }

    if let (Some(created), Some(modified)) = (metadata.creation_date, metadata.modification_date) {
        let gap = modified - created;
        if gap > Duration::seconds(MODIFICATION_GRACE_SECONDS) {
            flags.push(
                Flag::new(
                    Severity::Critical,
                    "META_DOCUMENT_MODIFIED",
                    format!("Document was modified {} after it was created", describe_gap(gap)),
                )
                .with_detail("creation_date", created.to_rfc3339())
                .with_detail("modification_date", modified.to_rfc3339()),
            );
        } else if modified < created {
            flags.push(
                Flag::new(
                    Severity::High,
                    "META_IMPOSSIBLE_DATES",
                    "Modification date is earlier than the creation date",
                )
                .with_detail("creation_date", created.to_rfc3339())
                .with_detail("modification_date", modified.to_rfc3339()),
            );
        }
    }

    flags
}

/// Whole days from 24 h up, otherwise hours with one decimal.
fn describe_gap(gap: Duration) -> String {
    if gap >= Duration::hours(24) {
        let days = gap.num_days();
        format!("{days} day{}", if days == 1 { "" } else { "s" })
    } else {
        format!("{:.1} hours", gap.num_seconds() as f64 / 3600.0)
    }
}
