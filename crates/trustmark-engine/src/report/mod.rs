// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External report form. The wire layout is fixed; flag details, the
// analysis id and timestamps stay internal.

pub mod json;

use serde::{Deserialize, Serialize};
use trustmark_core::{AnalysisReport, Flag, ModuleResult, RiskLevel, Severity};

pub use json::{from_json, to_json, to_json_pretty};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFlag {
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireModule {
    pub name: String,
    pub score: u8,
    pub confidence: f64,
    pub flags: Vec<WireFlag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireReport {
    pub file_hash: String,
    pub trust_score: u8,
    pub risk_level: RiskLevel,
    pub analysis_time_ms: u64,
    pub modules: Vec<WireModule>,
    pub summary: String,
}

impl WireReport {
    /// Flag codes across modules, in report order.
    pub fn flag_codes(&self) -> impl Iterator<Item = &str> {
        self.modules
            .iter()
            .flat_map(|module| module.flags.iter().map(|flag| flag.code.as_str()))
    }
}

impl From<&Flag> for WireFlag {
    fn from(flag: &Flag) -> Self {
        Self {
            severity: flag.severity,
            code: flag.code.clone(),
            message: flag.message.clone(),
        }
    }
}

impl From<&ModuleResult> for WireModule {
    fn from(result: &ModuleResult) -> Self {
        Self {
            name: result.module_name.clone(),
            score: result.score,
            confidence: result.confidence,
            flags: result.flags.iter().map(WireFlag::from).collect(),
        }
    }
}

impl From<&AnalysisReport> for WireReport {
    fn from(report: &AnalysisReport) -> Self {
        Self {
            file_hash: report.file_hash.clone(),
            trust_score: report.trust_score,
            risk_level: report.risk_level,
            analysis_time_ms: report.analysis_time_ms,
            modules: report.module_results.iter().map(WireModule::from).collect(),
            summary: report.summary.clone(),
        }
    }
}
