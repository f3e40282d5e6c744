// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font consistency module: how many families, which ones, whether they are
// embedded, and whether a line switches font half-way through.

use std::collections::{BTreeMap, BTreeSet};

use trustmark_core::error::Result;
use trustmark_core::{AnalysisContext, DocumentFacts, Flag, FontUsage, ModuleKind, ModuleResult, Severity};
use tracing::{debug, instrument};

use crate::traits::DetectionModule;

const EXCESSIVE_FAMILIES: usize = 10;
const HIGH_FAMILIES: usize = 7;

/// Compared with spaces removed, so `TimesNewRomanPSMT` matches.
const SYSTEM_FONTS: &[&str] = &[
    "arial",
    "calibri",
    "times new roman",
    "comic sans",
    "courier new",
    "verdana",
    "tahoma",
    "trebuchet",
    "georgia",
    "cambria",
    "consolas",
    "segoe",
];

const PROFESSIONAL_FONTS: &[&str] = &[
    "helvetica",
    "myriad",
    "minion",
    "frutiger",
    "univers",
    "futura",
    "gotham",
    "avenir",
    "roboto",
    "open sans",
    "lato",
    "source sans",
];

/// Families of the standard 14 PDF fonts, which readers always have.
const STANDARD_FONTS: &[&str] = &["helvetica", "times", "courier", "symbol", "zapfdingbats"];

/// Glyph fonts that legitimately sit next to text on the same line.
const SYMBOL_FONTS: &[&str] = &["symbol", "dingbat", "wingding"];

#[derive(Debug, Clone, Copy, Default)]
pub struct FontsModule;

impl DetectionModule for FontsModule {
    fn name(&self) -> &str {
        ModuleKind::Fonts.name()
    }

    #[instrument(skip_all, name = "fonts")]
    fn analyze(&self, facts: &DocumentFacts, _ctx: &AnalysisContext) -> Result<ModuleResult> {
        let fonts = &facts.fonts;
        if fonts.is_empty() {
            return Ok(ModuleResult::from_flags(self.name(), Vec::new(), 0.3));
        }

        let mut flags = Vec::new();
        flags.extend(diversity_flag(fonts));
        flags.extend(system_fonts_flag(fonts));
        flags.extend(embedding_flag(fonts));
        flags.extend(mixed_subset_flags(fonts));
        flags.extend(midline_change_flag(fonts));

        let confidence = if fonts.len() >= 3 { 0.9 } else { 0.7 };
        debug!(fonts = fonts.len(), flags = flags.len(), "Font checks done");
        Ok(ModuleResult::from_flags(self.name(), flags, confidence))
    }
}

/// `ABCDEF+Arial-BoldMT` becomes `arial`.
pub fn family(font: &FontUsage) -> String {
    font.base_name()
        .split(['-', ','])
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

fn squash(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase()
}

fn contains_any(name: &str, list: &[&str]) -> bool {
    let squashed = squash(name);
    list.iter().any(|entry| squashed.contains(&squash(entry)))
}

fn diversity_flag(fonts: &[FontUsage]) -> Option<Flag> {
    let families: BTreeSet<String> = fonts.iter().map(family).collect();
    let count = families.len();
    let (severity, code) = if count > EXCESSIVE_FAMILIES {
        (Severity::High, "FONTS_EXCESSIVE_DIVERSITY")
    } else if count > HIGH_FAMILIES {
        (Severity::Medium, "FONTS_HIGH_DIVERSITY")
    } else {
        return None;
    };
    Some(
        Flag::new(severity, code, format!("Document uses {count} different font families"))
            .with_detail("font_count", count)
            .with_detail("fonts", families.into_iter().collect::<Vec<_>>()),
    )
}

fn system_fonts_flag(fonts: &[FontUsage]) -> Option<Flag> {
    let found: BTreeSet<&str> = fonts
        .iter()
        .map(FontUsage::base_name)
        .filter(|name| contains_any(name, SYSTEM_FONTS) && !contains_any(name, PROFESSIONAL_FONTS))
        .collect();
    if found.is_empty() {
        return None;
    }
    let names: Vec<&str> = found.into_iter().collect();
    Some(
        Flag::new(
            Severity::Low,
            "FONTS_SYSTEM_FONTS",
            format!("Document uses common system fonts: {}", names.join(", ")),
        )
        .with_detail("system_fonts", names),
    )
}

fn embedding_flag(fonts: &[FontUsage]) -> Option<Flag> {
    let missing: Vec<&str> = fonts
        .iter()
        .filter(|font| !font.embedded && !contains_any(font.base_name(), STANDARD_FONTS))
        .map(FontUsage::base_name)
        .collect();
    if missing.is_empty() {
        return None;
    }
    Some(
        Flag::new(
            Severity::Low,
            "FONTS_NOT_EMBEDDED",
            format!("Some fonts are not embedded: {}", missing.join(", ")),
        )
        .with_detail("non_embedded_fonts", missing),
    )
}

fn mixed_subset_flags(fonts: &[FontUsage]) -> Vec<Flag> {
    let mut groups: BTreeMap<String, Vec<&FontUsage>> = BTreeMap::new();
    for font in fonts {
        groups.entry(font.base_name().to_lowercase()).or_default().push(font);
    }
    groups
        .into_iter()
        .filter(|(_, group)| group.iter().any(|f| f.subset) && group.iter().any(|f| !f.subset))
        .map(|(base, group)| {
            let variants: Vec<&str> = group.iter().map(|font| font.name.as_str()).collect();
            Flag::new(
                Severity::Low,
                "FONTS_MIXED_SUBSETS",
                format!("Font '{base}' appears both as a subset and in full"),
            )
            .with_detail("font_name", base)
            .with_detail("variants", variants)
        })
        .collect()
}

/// A text line set in two different families, usually an edited value.
fn midline_change_flag(fonts: &[FontUsage]) -> Option<Flag> {
    let mut lines: BTreeMap<(u32, u32), BTreeSet<String>> = BTreeMap::new();
    for font in fonts {
        let name = family(font);
        if contains_any(&name, SYMBOL_FONTS) {
            continue;
        }
        for occurrence in font.occurrences.iter().filter(|occ| occ.line > 0) {
            lines
                .entry((occurrence.page, occurrence.line))
                .or_default()
                .insert(name.clone());
        }
    }
    let ((page, line), families) = lines.into_iter().find(|(_, families)| families.len() > 1)?;
    let families: Vec<String> = families.into_iter().collect();
    Some(
        Flag::new(
            Severity::Medium,
            "FONTS_MIDLINE_CHANGE",
            format!(
                "Font changes mid-line on page {page}, line {line}: {}",
                families.join(" / ")
            ),
        )
        .with_detail("page", page)
        .with_detail("line", line)
        .with_detail("fonts", families),
    )
}
