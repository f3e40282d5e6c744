// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON encoding of the wire report.

use trustmark_core::AnalysisReport;
use trustmark_core::error::Result;

use super::WireReport;

pub fn to_json(report: &AnalysisReport) -> Result<String> {
    Ok(serde_json::to_string(&WireReport::from(report))?)
}

pub fn to_json_pretty(report: &AnalysisReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(&WireReport::from(report))?)
}

/// Several reports as one pretty-printed JSON array.
pub fn to_json_array_pretty(reports: &[AnalysisReport]) -> Result<String> {
    let wire: Vec<WireReport> = reports.iter().map(WireReport::from).collect();
    Ok(serde_json::to_string_pretty(&wire)?)
}

pub fn from_json(source: &str) -> Result<WireReport> {
    Ok(serde_json::from_str(source)?)
}
