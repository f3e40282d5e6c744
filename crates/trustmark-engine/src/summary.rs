// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Summary generator: a one-sentence verdict followed by the most severe
// findings, grouped by what they mean to a reader rather than by module.

use std::collections::BTreeMap;

use trustmark_core::{Flag, ModuleResult, RiskLevel, Severity};

pub const LOW_CONFIDENCE_PREFIX: &str = "Low confidence: most checks could not be completed.";

/// Bullets per theme.
const MAX_BULLETS_PER_THEME: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Theme {
    Tampering,
    Dates,
    Identity,
    Origin,
    Security,
    Visual,
    Images,
    Fonts,
    Other,
}

impl Theme {
    /// Order in which themes are reported.
    pub const ORDER: [Theme; 9] = [
        Self::Tampering,
        Self::Dates,
        Self::Identity,
        Self::Origin,
        Self::Security,
        Self::Visual,
        Self::Images,
        Self::Fonts,
        Self::Other,
    ];

    /// Themes that can pick a specific verdict.
    fn drives_verdict(self) -> bool {
        matches!(
            self,
            Self::Origin | Self::Tampering | Self::Dates | Self::Identity | Self::Security
        )
    }
}

pub fn theme_of(code: &str) -> Theme {
    match code {
        "META_AI_GENERATED"
        | "META_ONLINE_CONVERTER"
        | "META_SUSPICIOUS_PRODUCER"
        | "META_NO_METADATA"
        | "META_NO_PRODUCER"
        | "TEMPLATE_PRODUCER_MISMATCH" => Theme::Origin,
        "META_DOCUMENT_MODIFIED"
        | "META_FUTURE_CREATION_DATE"
        | "META_IMPOSSIBLE_DATES"
        | "STRUCT_INCREMENTAL_UPDATES"
        | "FONTS_EXCESSIVE_DIVERSITY"
        | "FONTS_HIGH_DIVERSITY"
        | "FONTS_MIXED_SUBSETS"
        | "FONTS_MIDLINE_CHANGE"
        | "IMAGES_PASTE_NOISE_ANOMALY"
        | "IMAGES_CLONED_REGION"
        | "IMAGES_ELA_MAJOR_EDIT"
        | "IMAGES_ELA_MINOR_EDIT" => Theme::Tampering,
        "CONTENT_REFERENCE_DATE_MISMATCH" | "CONTENT_INCONSISTENT_REFERENCES" => Theme::Identity,
        code if code.starts_with("CONTENT_") && (code.contains("DATE") || code.contains("ANACHRONISM")) => {
            Theme::Dates
        }
        code if code.starts_with("CONTENT_INVALID_")
            || code.starts_with("EXTERNAL_")
            || code == "CONTENT_SIREN_VAT_MISMATCH"
            || code == "CONTENT_MISSING_COMPANY_ID" =>
        {
            Theme::Identity
        }
        code if code.starts_with("STRUCT_") => Theme::Security,
        code if code.starts_with("VISUAL_") => Theme::Visual,
        code if code.starts_with("IMAGES_") => Theme::Images,
        code if code.starts_with("FONTS_") || code.starts_with("TEMPLATE_") => Theme::Fonts,
        _ => Theme::Other,
    }
}

/// Theme with the largest summed severity points, among those that drive
/// the verdict. Ties go to the earlier theme in [`Theme::ORDER`].
fn dominant_theme(grouped: &BTreeMap<Theme, Vec<&Flag>>) -> Option<Theme> {
    let mut best: Option<(Theme, u32)> = None;
    for theme in Theme::ORDER.into_iter().filter(|theme| theme.drives_verdict()) {
        let Some(flags) = grouped.get(&theme) else { continue };
        let total: u32 = flags.iter().map(|flag| flag.severity.points()).sum();
        if best.is_none_or(|(_, best_total)| total > best_total) {
            best = Some((theme, total));
        }
    }
    best.map(|(theme, _)| theme)
}

pub fn verdict(risk: RiskLevel, dominant: Option<Theme>) -> &'static str {
    match (risk, dominant) {
        (RiskLevel::Critical, Some(Theme::Tampering)) => {
            "Do not trust this document: it has been tampered with."
        }
        (RiskLevel::Critical, Some(Theme::Dates)) => {
            "Do not trust this document: its dates indicate fabrication."
        }
        (RiskLevel::Critical, Some(Theme::Identity)) => {
            "Do not trust this document: its identity information is fraudulent."
        }
        (RiskLevel::Critical, Some(Theme::Security)) => {
            "Do not trust this document: it contains dangerous content."
        }
        (RiskLevel::Critical, _) => "Do not trust this document.",
        (RiskLevel::High, Some(Theme::Tampering)) => "This document has been altered after creation.",
        (RiskLevel::High, Some(Theme::Dates)) => "This document contains suspicious date inconsistencies.",
        (RiskLevel::High, Some(Theme::Identity)) => "The originator of this document could not be verified.",
        (RiskLevel::High, Some(Theme::Origin)) => "This document was created with suspicious tools.",
        (RiskLevel::High, _) => "This document is likely fraudulent.",
        (RiskLevel::Medium, Some(Theme::Tampering)) => "This document may have been edited.",
        (RiskLevel::Medium, Some(Theme::Dates)) => "Dates in this document are inconsistent.",
        (RiskLevel::Medium, Some(Theme::Origin)) => "The origin of this document raises questions.",
        (RiskLevel::Medium, _) => "This document has issues that need verification.",
        (RiskLevel::Low, _) => "This document appears legitimate.",
    }
}

/// Verdict plus up to two non-low findings per theme, most severe first.
pub fn summarize(results: &[ModuleResult], risk: RiskLevel, low_confidence: bool) -> String {
    let mut grouped: BTreeMap<Theme, Vec<&Flag>> = BTreeMap::new();
    for flag in results.iter().flat_map(|result| result.flags.iter()) {
        grouped.entry(theme_of(&flag.code)).or_default().push(flag);
    }

    let mut parts: Vec<String> = Vec::new();
    if low_confidence {
        parts.push(LOW_CONFIDENCE_PREFIX.to_string());
    }
    parts.push(verdict(risk, dominant_theme(&grouped)).to_string());

    let mut bullets: Vec<String> = Vec::new();
    for theme in Theme::ORDER {
        let Some(flags) = grouped.get(&theme) else { continue };
        let mut ranked: Vec<&Flag> = flags
            .iter()
            .copied()
            .filter(|flag| flag.severity > Severity::Low)
            .collect();
        // Stable: equal severities keep detection order.
        ranked.sort_by(|a, b| b.severity.cmp(&a.severity));

        let mut taken = 0;
        for flag in ranked {
            if taken == MAX_BULLETS_PER_THEME {
                break;
            }
            let sentence = sentence(&flag.message);
            if !bullets.contains(&sentence) {
                bullets.push(sentence);
                taken += 1;
            }
        }
    }
    parts.extend(bullets);
    parts.join(" ")
}

fn sentence(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.ends_with(['.', '!', '?']) {
        trimmed.to_string()
    } else {
        format!("{trimmed}.")
    }
}
