// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Evidence types: flags, per-module results, and the final analysis report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a single finding.
///
/// Ordered so that `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Points deducted from a module's local score for one flag of this severity.
    pub fn points(self) -> u32 {
        match self {
            Self::Low => 5,
            Self::Medium => 15,
            Self::High => 30,
            Self::Critical => 50,
        }
    }

    /// Lowercase wire keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub severity: Severity,
    /// Stable identifier, unique within the emitting module's vocabulary.
    pub code: String,
    pub message: String,
    /// Auxiliary structured data (pixel regions, offending values, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, serde_json::Value>>,
}

impl Flag {
    pub fn new(severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Attach one detail entry, builder style.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Look up a detail entry.
    pub fn detail(&self, key: &str) -> Option<&serde_json::Value> {
        self.details.as_ref().and_then(|details| details.get(key))
    }
}

/// Module-local score: 100 minus the severity points of every flag, floored at 0.
pub fn deduction_score(flags: &[Flag]) -> u8 {
    let deducted: u32 = flags.iter().map(|flag| flag.severity.points()).sum();
    100u32.saturating_sub(deducted) as u8
}

/// Output of one detection module for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub module_name: String,
    /// Detection order.
    pub flags: Vec<Flag>,
    /// The module's own opinion of legitimacy, 0–100.
    pub score: u8,
    /// Self-assessed reliability of `score`, 0.0–1.0.
    pub confidence: f64,
}

impl ModuleResult {
    /// Build a result whose score follows the severity-deduction table.
    pub fn from_flags(module_name: impl Into<String>, flags: Vec<Flag>, confidence: f64) -> Self {
        let score = deduction_score(&flags);
        Self {
            module_name: module_name.into(),
            flags,
            score,
            confidence: clamp_confidence(confidence),
        }
    }

    /// Neutral stand-in for a module that could not complete.
    pub fn failed(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            flags: Vec::new(),
            score: 50,
            confidence: 0.0,
        }
    }

    pub fn has_critical(&self) -> bool {
        self.flags.iter().any(|flag| flag.severity == Severity::Critical)
    }

    /// Highest severity among this module's flags.
    pub fn max_severity(&self) -> Option<Severity> {
        self.flags.iter().map(|flag| flag.severity).max()
    }
}

/// Clamp into [0, 1]; NaN counts as no confidence at all.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Risk classification derived from the final trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Step function: 80–100 LOW, 50–79 MEDIUM, 25–49 HIGH, 0–24 CRITICAL.
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Self::Low,
            50..=79 => Self::Medium,
            25..=49 => Self::High,
            _ => Self::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The built-in detection modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Metadata,
    Content,
    Visual,
    Fonts,
    Images,
    Structure,
    Template,
    External,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 8] = [
        Self::Metadata,
        Self::Content,
        Self::Visual,
        Self::Fonts,
        Self::Images,
        Self::Structure,
        Self::Template,
        Self::External,
    ];

    /// Name used in module results and the JSON report.
    pub fn name(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Content => "content",
            Self::Visual => "visual",
            Self::Fonts => "fonts",
            Self::Images => "images",
            Self::Structure => "structure",
            Self::Template => "template",
            Self::External => "external",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Final output for one analyzed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Correlates log lines for one analysis call.
    pub analysis_id: Uuid,
    /// SHA-256 of the input bytes (lowercase hex).
    pub file_hash: String,
    pub trust_score: u8,
    pub risk_level: RiskLevel,
    /// One entry per module that ran, in registration order.
    pub module_results: Vec<ModuleResult>,
    pub summary: String,
    pub analysis_time_ms: u64,
    /// Set when no module produced usable evidence.
    pub low_confidence: bool,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisReport {
    /// All flags across modules, in module then detection order.
    pub fn flags(&self) -> impl Iterator<Item = &Flag> {
        self.module_results.iter().flat_map(|result| result.flags.iter())
    }

    pub fn module(&self, name: &str) -> Option<&ModuleResult> {
        self.module_results.iter().find(|result| result.module_name == name)
    }
}
