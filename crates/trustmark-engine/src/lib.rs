// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// trustmark-engine: runs the detection modules side by side, folds their
// results into one trust score and writes the report.

pub mod orchestrator;
pub mod report;
pub mod scoring;
pub mod summary;

pub use orchestrator::{CancelToken, Orchestrator};
pub use scoring::{Aggregate, aggregate};
pub use summary::summarize;
