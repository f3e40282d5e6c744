// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// trustmark-forensics: pixel- and metadata-level checks on the raster images
// embedded in a document.
//
// The engine never fails as a whole: an image that cannot be decoded only
// lowers the module's confidence.

pub mod checks;
pub mod decode;
pub mod engine;

mod clone;
mod ela;
mod noise;
mod regions;

pub use engine::ForensicsEngine;
