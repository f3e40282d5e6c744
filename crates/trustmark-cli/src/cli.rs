// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Argument parsing, configuration overrides and text rendering.

use std::path::{Path, PathBuf};

use clap::Parser;
use trustmark_core::error::{Result, TrustmarkError};
use trustmark_core::human_errors::humanize_error;
use trustmark_core::{AnalysisReport, AnalyzerConfig, RiskLevel};

#[derive(Parser, Debug)]
#[command(name = "trustmark")]
#[command(author, version, about = "Score how far a PDF document can be trusted")]
pub struct Args {
    /// PDF files to analyze
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Print a JSON array of reports instead of text
    #[arg(long)]
    pub json: bool,

    /// TOML analyzer configuration
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Domain QR codes are expected to point at (repeatable)
    #[arg(long = "expected-domain", value_name = "DOMAIN")]
    pub expected_domains: Vec<String>,

    /// Company the documents claim to come from, checked against the registry
    #[arg(long, value_name = "NAME")]
    pub issuer_name: Option<String>,

    /// Per-module time budget in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// List every flag under each module
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Configuration file (or defaults) with command-line overrides applied.
    pub fn analyzer_config(&self) -> Result<AnalyzerConfig> {
        let mut config = match &self.config {
            Some(path) => AnalyzerConfig::from_file(path)?,
            None => AnalyzerConfig::default(),
        };
        if let Some(timeout_ms) = self.timeout_ms {
            config.module_timeout_ms = timeout_ms;
        }
        config.expected_domains.extend(self.expected_domains.iter().cloned());
        if let Some(name) = &self.issuer_name {
            config.issuer_name = Some(name.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

// -- Exit status --------------------------------------------------------------

pub const EXIT_OK: u8 = 0;
pub const EXIT_HIGH: u8 = 1;
pub const EXIT_CRITICAL: u8 = 2;
pub const EXIT_ERROR: u8 = 3;

/// Exit status for one file.
pub fn status_for(risk: RiskLevel) -> u8 {
    match risk {
        RiskLevel::Low | RiskLevel::Medium => EXIT_OK,
        RiskLevel::High => EXIT_HIGH,
        RiskLevel::Critical => EXIT_CRITICAL,
    }
}

// -- Rendering ----------------------------------------------------------------

/// `CRITICAL  18/100  3 flags  invoice.pdf`
pub fn headline(report: &AnalysisReport, path: &Path) -> String {
    let flags = report.flags().count();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    format!(
        "{:<8}  {:>3}/100  {} flag{}  {}",
        report.risk_level.as_str(),
        report.trust_score,
        flags,
        if flags == 1 { "" } else { "s" },
        name
    )
}

/// Flags per module, indented under the headline.
pub fn details(report: &AnalysisReport) -> Vec<String> {
    let mut lines = Vec::new();
    for result in &report.module_results {
        lines.push(format!(
            "  {} score={} confidence={:.2}",
            result.module_name, result.score, result.confidence
        ));
        for flag in &result.flags {
            lines.push(format!("    [{}] {}: {}", flag.severity, flag.code, flag.message));
        }
    }
    lines
}

/// Plain-English rendering of an error for one file.
pub fn error_lines(path: &Path, err: &TrustmarkError) -> Vec<String> {
    let human = humanize_error(err);
    vec![
        format!("error: {}: {}", path.display(), human.message),
        format!("  {}", human.suggestion),
    ]
}
