// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Trustmark.

use thiserror::Error;

/// Top-level error type for all Trustmark operations.
///
/// Only [`TrustmarkError::Extraction`], [`TrustmarkError::Configuration`] and
/// [`TrustmarkError::Cancelled`] ever reach the caller of an analysis. The
/// module-level variants are recovered inside the orchestrator or the
/// forensics engine.
#[derive(Debug, Error)]
pub enum TrustmarkError {
    // -- Document errors --
    #[error("document extraction failed: {0}")]
    Extraction(String),

    #[error("malformed image: {0}")]
    MalformedImage(String),

    // -- Module errors --
    #[error("module {module} failed: {reason}")]
    Module { module: String, reason: String },

    #[error("module {module} timed out after {timeout_ms} ms")]
    ModuleTimeout { module: String, timeout_ms: u64 },

    #[error("collaborator unavailable: {0}")]
    Collaborator(String),

    #[error("analysis cancelled")]
    Cancelled,

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("configuration file could not be parsed: {0}")]
    ConfigFormat(#[from] toml::de::Error),

    // -- I/O and serialization --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TrustmarkError {
    /// Shorthand for a module failure with a formatted reason.
    pub fn module(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Module {
            module: module.into(),
            reason: reason.into(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TrustmarkError>;
