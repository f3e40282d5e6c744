// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: load a document with `lopdf` and extract the facts the
// detection modules consume.

pub mod content;
pub mod date;
pub mod extractor;
pub mod objects;
pub mod structure;

pub use extractor::PdfExtractor;
