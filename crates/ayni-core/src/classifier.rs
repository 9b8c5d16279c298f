// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Balance & Exchange Classification
// ─────────────────────────────────────────────────────────────────────
//! Derives the ayni balance and the exchange type of one exchange.
//!
//! The balance is `(T - F) * (1 - I/2)`, in [-1, 1]. It never increases
//! with F and never decreases with T; indeterminacy only pulls it
//! toward zero.
//!
//! The exchange type comes from an ordered decision sequence. Order
//! matters: single-layer and multi-layer adversarial prompts have
//! distinct layer-count signatures, so the layer-count branch must run
//! before the balance-only fallbacks or one category absorbs the other.
//! Any trust violation overrides the whole sequence.

use std::collections::BTreeSet;

use ayni_types::{
    ClassificationThresholds, EvaluationSet, ExchangeAssessment, ExchangeType, MergedScore,
    TrustViolation,
};

/// Reciprocity balance from a merged triple.
pub fn ayni_balance(truth: f64, indeterminacy: f64, falsehood: f64) -> f64 {
    ((truth - falsehood) * (1.0 - indeterminacy / 2.0)).clamp(-1.0, 1.0)
}

/// Ordered exchange-type decision, before trust-field override.
pub fn exchange_type(
    balance: f64,
    layer_count: usize,
    hint_extractive: bool,
    thresholds: &ClassificationThresholds,
) -> ExchangeType {
    if balance > thresholds.reciprocal_threshold {
        ExchangeType::Reciprocal
    } else if layer_count > 1
        && (balance < thresholds.multilayer_extractive_threshold || hint_extractive)
    {
        ExchangeType::Extractive
    } else if balance < thresholds.manipulative_threshold {
        ExchangeType::Manipulative
    } else if hint_extractive {
        ExchangeType::Extractive
    } else {
        ExchangeType::Borderline
    }
}

/// Balance and classification engine.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    thresholds: ClassificationThresholds,
}

impl Classifier {
    pub fn new(thresholds: ClassificationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ClassificationThresholds {
        &self.thresholds
    }

    /// Exchange type with trust-field override applied.
    pub fn classify(
        &self,
        balance: f64,
        layer_count: usize,
        hint_extractive: bool,
        violations: &BTreeSet<TrustViolation>,
    ) -> ExchangeType {
        if !violations.is_empty() {
            return ExchangeType::WORST;
        }
        exchange_type(balance, layer_count, hint_extractive, &self.thresholds)
    }

    /// Build the final assessment for one exchange.
    pub fn assess(
        &self,
        evaluation_set: EvaluationSet,
        layer_count: usize,
        violations: BTreeSet<TrustViolation>,
    ) -> ExchangeAssessment {
        let merged: MergedScore = evaluation_set.merged();
        let ayni_balance = ayni_balance(merged.truth, merged.indeterminacy, merged.falsehood);
        let hint_extractive = evaluation_set.hints_extractive();
        let exchange_type = self.classify(ayni_balance, layer_count, hint_extractive, &violations);

        if !violations.is_empty() {
            let tags: Vec<&str> = violations.iter().map(TrustViolation::as_tag).collect();
            log::warn!(
                "TRUST VIOLATION: [{}] forces {exchange_type} (balance {ayni_balance:.4})",
                tags.join(", ")
            );
        } else {
            log::debug!(
                "exchange classified {exchange_type}: balance {ayni_balance:.4}, F {:.4} ({}), layers {layer_count}",
                merged.falsehood,
                merged.worst_lens
            );
        }

        ExchangeAssessment {
            ayni_balance,
            exchange_type,
            violations,
            merged,
            hint_extractive,
            evaluation_set,
        }
    }
}
