// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structure module: incremental saves and active or hidden content.

use trustmark_core::error::Result;
use trustmark_core::{AnalysisContext, DocumentFacts, Flag, ModuleKind, ModuleResult, Severity};
use tracing::{debug, instrument};

use crate::traits::DetectionModule;

#[derive(Debug, Clone, Copy, Default)]
pub struct StructureModule;

impl DetectionModule for StructureModule {
    fn name(&self) -> &str {
        ModuleKind::Structure.name()
    }

    #[instrument(skip_all, name = "structure")]
    fn analyze(&self, facts: &DocumentFacts, _ctx: &AnalysisContext) -> Result<ModuleResult> {
        let structure = &facts.structure;
        let mut flags = Vec::new();

        if structure.eof_markers > 1 {
            let revisions = structure.eof_markers - 1;
            // Signing always appends one revision.
            let severity = match (structure.has_signature, revisions) {
                (true, _) => Severity::Low,
                (false, 1) => Severity::Medium,
                (false, _) => Severity::High,
            };
            flags.push(
                Flag::new(
                    severity,
                    "STRUCT_INCREMENTAL_UPDATES",
                    format!("File was saved {revisions} more time(s) after it was first written"),
                )
                .with_detail("eof_markers", structure.eof_markers)
                .with_detail("signed", structure.has_signature),
            );
        }
        if structure.has_javascript {
            flags.push(Flag::new(
                Severity::High,
                "STRUCT_JAVASCRIPT_DETECTED",
                "Document contains JavaScript",
            ));
        }
        if structure.embedded_files > 0 {
            flags.push(
                Flag::new(
                    Severity::Medium,
                    "STRUCT_EMBEDDED_FILES",
                    format!("Document carries {} embedded file(s)", structure.embedded_files),
                )
                .with_detail("count", structure.embedded_files),
            );
        }
        if structure.has_acroform {
            flags.push(Flag::new(
                Severity::Low,
                "STRUCT_ACROFORM_DETECTED",
                "Document has fillable form fields",
            ));
        }
        if structure.hidden_annotations > 0 {
            flags.push(
                Flag::new(
                    Severity::Medium,
                    "STRUCT_HIDDEN_ANNOTATIONS",
                    format!("{} annotation(s) are hidden", structure.hidden_annotations),
                )
                .with_detail("count", structure.hidden_annotations),
            );
        }

        debug!(flags = flags.len(), "Structure checks done");
        Ok(ModuleResult::from_flags(self.name(), flags, 0.95))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustmark_core::StructureFacts;

    fn run(structure: StructureFacts) -> ModuleResult {
        let facts = DocumentFacts {
            structure,
            ..Default::default()
        };
        StructureModule.analyze(&facts, &AnalysisContext::default()).unwrap()
    }

    #[test]
    fn single_revision_is_clean() {
        let result = run(StructureFacts {
            eof_markers: 1,
            ..Default::default()
        });
        assert!(result.flags.is_empty());
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn incremental_update_severity() {
        let severity = |eof_markers, has_signature| {
            run(StructureFacts {
                eof_markers,
                has_signature,
                ..Default::default()
            })
            .flags[0]
                .severity
        };
        assert_eq!(severity(2, false), Severity::Medium);
        assert_eq!(severity(4, false), Severity::High);
        assert_eq!(severity(2, true), Severity::Low);
    }

    #[test]
    fn active_and_hidden_content() {
        let result = run(StructureFacts {
            eof_markers: 1,
            has_javascript: true,
            embedded_files: 2,
            has_acroform: true,
            hidden_annotations: 1,
            has_signature: false,
        });
        let codes: Vec<&str> = result.flags.iter().map(|flag| flag.code.as_str()).collect();
        assert_eq!(
            codes,
            vec![
                "STRUCT_JAVASCRIPT_DETECTED",
                "STRUCT_EMBEDDED_FILES",
                "STRUCT_ACROFORM_DETECTED",
                "STRUCT_HIDDEN_ANNOTATIONS"
            ]
        );
        assert_eq!(result.score, 100 - 30 - 15 - 5 - 15);
    }
}
