// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trustmark: Evidence types, document facts and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod facts;
pub mod human_errors;
pub mod types;

pub use config::{AnalyzerConfig, EnabledModules, ForensicsConfig, ModuleWeights};
pub use error::TrustmarkError;
pub use facts::*;
pub use types::*;
