// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scoring engine: confidence-weighted average of module scores, with a hard
// ceiling whenever any module raised a critical flag.

use trustmark_core::{ModuleResult, ModuleWeights, RiskLevel, clamp_confidence};

/// Highest score a document with a critical flag can get.
pub const CRITICAL_CEILING: u8 = 24;

/// Score used when no module produced usable evidence.
pub const NEUTRAL_SCORE: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregate {
    pub trust_score: u8,
    pub risk_level: RiskLevel,
    pub low_confidence: bool,
}

/// `round(Σ score·w·c / Σ w·c)`, clamped to 0–100, then capped at
/// [`CRITICAL_CEILING`] if any flag is critical. The cap only ever lowers.
///
/// Confidences are clamped to 0–1 (NaN counts as 0) and scores to 100, so a
/// misbehaving module can only remove its own evidence.
pub fn aggregate(results: &[ModuleResult], weights: &ModuleWeights) -> Aggregate {
    let (weighted, denominator) = results.iter().fold((0.0, 0.0), |(sum, denom), result| {
        let factor = weights.weight_for(&result.module_name) * clamp_confidence(result.confidence);
        (sum + result.score.min(100) as f64 * factor, denom + factor)
    });

    let low_confidence = !(denominator > 0.0 && denominator.is_finite());
    let mut trust_score = if low_confidence {
        NEUTRAL_SCORE
    } else {
        (weighted / denominator).round().clamp(0.0, 100.0) as u8
    };

    if results.iter().any(ModuleResult::has_critical) {
        trust_score = trust_score.min(CRITICAL_CEILING);
    }

    Aggregate {
        trust_score,
        risk_level: RiskLevel::from_score(trust_score),
        low_confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use trustmark_core::{Flag, ModuleKind, Severity, deduction_score};

    fn result(kind: ModuleKind, score: u8, confidence: f64) -> ModuleResult {
        ModuleResult {
            module_name: kind.name().to_string(),
            flags: Vec::new(),
            score,
            confidence,
        }
    }

    fn critical(kind: ModuleKind) -> ModuleResult {
        ModuleResult::from_flags(
            kind.name(),
            vec![Flag::new(Severity::Critical, "TEST_CRITICAL", "critical")],
            0.9,
        )
    }

    #[test]
    fn weighted_by_weight_and_confidence() {
        let results = vec![
            result(ModuleKind::Metadata, 100, 0.9),
            result(ModuleKind::Content, 40, 0.5),
        ];
        // (100·1.0·0.9 + 40·1.2·0.5) / (0.9 + 0.6) = 114 / 1.5 = 76
        let aggregate = aggregate(&results, &ModuleWeights::default());
        assert_eq!(aggregate.trust_score, 76);
        assert_eq!(aggregate.risk_level, RiskLevel::Medium);
        assert!(!aggregate.low_confidence);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        let results = vec![
            result(ModuleKind::Metadata, 80, 1.0),
            result(ModuleKind::Fonts, 81, 1.0),
        ];
        assert_eq!(aggregate(&results, &ModuleWeights::default()).trust_score, 81);
    }

    #[test]
    fn all_failed_is_neutral_and_low_confidence() {
        let results = vec![ModuleResult::failed("metadata"), ModuleResult::failed("content")];
        let aggregate = aggregate(&results, &ModuleWeights::default());
        assert_eq!(aggregate.trust_score, 50);
        assert_eq!(aggregate.risk_level, RiskLevel::Medium);
        assert!(aggregate.low_confidence);

        assert!(super::aggregate(&[], &ModuleWeights::default()).low_confidence);
    }

    #[test]
    fn zero_weight_counts_as_no_evidence() {
        let weights = ModuleWeights {
            metadata: 0.0,
            ..ModuleWeights::default()
        };
        let results = vec![result(ModuleKind::Metadata, 10, 1.0)];
        assert!(aggregate(&results, &weights).low_confidence);
    }

    #[test]
    fn critical_flag_caps_the_score() {
        let results = vec![
            result(ModuleKind::Metadata, 100, 1.0),
            result(ModuleKind::Content, 100, 1.0),
            result(ModuleKind::Visual, 100, 1.0),
            result(ModuleKind::Fonts, 100, 1.0),
            critical(ModuleKind::Images),
        ];
        let aggregate = aggregate(&results, &ModuleWeights::default());
        assert_eq!(aggregate.trust_score, 24);
        assert_eq!(aggregate.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn ceiling_never_raises() {
        let mut low = critical(ModuleKind::Metadata);
        low.score = 0;
        let aggregate = aggregate(&[low], &ModuleWeights::default());
        assert_eq!(aggregate.trust_score, 0);
    }

    #[test]
    fn custom_modules_use_custom_weight() {
        let mut weights = ModuleWeights::default();
        weights.custom.insert("watermark".into(), 3.0);
        let results = vec![
            result(ModuleKind::Metadata, 100, 1.0),
            ModuleResult {
                module_name: "watermark".into(),
                flags: Vec::new(),
                score: 0,
                confidence: 1.0,
            },
        ];
        // 100 / (1 + 3)
        assert_eq!(aggregate(&results, &weights).trust_score, 25);
    }

    #[test]
    fn out_of_range_module_output_only_loses_its_own_evidence() {
        let metadata = ModuleResult::from_flags(
            "metadata",
            vec![Flag::new(Severity::High, "META_ONLINE_CONVERTER", "converted")],
            0.9,
        );
        let nan = ModuleResult {
            module_name: "custom".into(),
            flags: Vec::new(),
            score: 100,
            confidence: f64::NAN,
        };
        let aggregate = aggregate(&[metadata.clone(), nan], &ModuleWeights::default());
        assert_eq!(aggregate.trust_score, 70);
        assert!(!aggregate.low_confidence);

        // Confidence above 1 and score above 100 are clamped.
        let loud = ModuleResult {
            module_name: "custom".into(),
            flags: Vec::new(),
            score: 250,
            confidence: 5.0,
        };
        // (70·0.9 + 100·1.0) / 1.9 = 85.8
        assert_eq!(super::aggregate(&[metadata, loud], &ModuleWeights::default()).trust_score, 86);
    }

    // -- Properties ----------------------------------------------------------

    fn arb_severity() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Low),
            Just(Severity::Medium),
            Just(Severity::High),
            Just(Severity::Critical),
        ]
    }

    fn arb_result() -> impl Strategy<Value = ModuleResult> {
        (
            prop::sample::select(ModuleKind::ALL.to_vec()),
            prop::collection::vec(arb_severity(), 0..6),
            0.0f64..=1.0,
        )
            .prop_map(|(kind, severities, confidence)| {
                let flags = severities
                    .into_iter()
                    .map(|severity| Flag::new(severity, "PROP", "generated"))
                    .collect();
                ModuleResult::from_flags(kind.name(), flags, confidence)
            })
    }

    fn arb_weights() -> impl Strategy<Value = ModuleWeights> {
        prop::collection::vec(0.0f64..5.0, 8).prop_map(|w| ModuleWeights {
            metadata: w[0],
            content: w[1],
            visual: w[2],
            fonts: w[3],
            images: w[4],
            structure: w[5],
            template: w[6],
            external: w[7],
            ..ModuleWeights::default()
        })
    }

    proptest! {
        #[test]
        fn score_stays_in_range(results in prop::collection::vec(arb_result(), 0..8), weights in arb_weights()) {
            let aggregate = aggregate(&results, &weights);
            prop_assert!(aggregate.trust_score <= 100);
            prop_assert_eq!(aggregate.risk_level, RiskLevel::from_score(aggregate.trust_score));
        }

        #[test]
        fn any_critical_caps_at_24(
            mut results in prop::collection::vec(arb_result(), 0..8),
            weights in arb_weights(),
            position in any::<prop::sample::Index>(),
        ) {
            let injected = critical(ModuleKind::Content);
            let at = position.index(results.len() + 1);
            results.insert(at, injected);
            prop_assert!(aggregate(&results, &weights).trust_score <= CRITICAL_CEILING);
        }

        #[test]
        fn clean_documents_are_low_risk(
            confidences in prop::collection::vec(0.01f64..=1.0, 1..8),
        ) {
            let results: Vec<ModuleResult> = confidences
                .iter()
                .zip(ModuleKind::ALL)
                .map(|(confidence, kind)| ModuleResult::from_flags(kind.name(), Vec::new(), *confidence))
                .collect();
            let aggregate = aggregate(&results, &ModuleWeights::default());
            prop_assert!(aggregate.trust_score >= 80);
            prop_assert_eq!(aggregate.risk_level, RiskLevel::Low);
        }

        #[test]
        fn module_score_never_rises_with_more_flags(
            severities in prop::collection::vec(arb_severity(), 0..10),
            extra in arb_severity(),
        ) {
            let mut flags: Vec<Flag> = severities
                .iter()
                .map(|severity| Flag::new(*severity, "PROP", "generated"))
                .collect();
            let before = deduction_score(&flags);
            flags.push(Flag::new(extra, "PROP", "generated"));
            prop_assert!(deduction_score(&flags) <= before);
        }

        #[test]
        fn module_score_ignores_flag_order(severities in prop::collection::vec(arb_severity(), 0..10)) {
            let flags: Vec<Flag> = severities
                .iter()
                .map(|severity| Flag::new(*severity, "PROP", "generated"))
                .collect();
            let mut reversed = flags.clone();
            reversed.reverse();
            prop_assert_eq!(deduction_score(&flags), deduction_score(&reversed));
        }
    }
}
