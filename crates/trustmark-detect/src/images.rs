// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Images module: the forensics engine behind the common module contract.

use trustmark_core::error::Result;
use trustmark_core::{AnalysisContext, DocumentFacts, ForensicsConfig, ModuleResult};
use trustmark_forensics::ForensicsEngine;
use trustmark_forensics::engine::MODULE_NAME;

use crate::traits::DetectionModule;

#[derive(Debug, Clone, Default)]
pub struct ImagesModule {
    engine: ForensicsEngine,
}

impl ImagesModule {
    pub fn new(config: ForensicsConfig) -> Self {
        Self {
            engine: ForensicsEngine::new(config),
        }
    }
}

impl DetectionModule for ImagesModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    /// Never fails: per-image problems are absorbed by the engine.
    fn analyze(&self, facts: &DocumentFacts, _ctx: &AnalysisContext) -> Result<ModuleResult> {
        Ok(self.engine.analyze(facts))
    }
}
