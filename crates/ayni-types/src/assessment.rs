// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Exchange Assessment
// ─────────────────────────────────────────────────────────────────────

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::evaluation::{EvaluationSet, MergedScore};
use crate::violation::TrustViolation;

/// Bumped whenever a member is added to [`ExchangeType`].
pub const EXCHANGE_TYPE_SCHEMA_VERSION: u32 = 1;

/// Derived classification of one exchange.
///
/// Variants are declared in severity order, so `Ord` ranks
/// `Extractive` as the worst case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeType {
    Reciprocal,
    Borderline,
    Manipulative,
    Extractive,
}

impl ExchangeType {
    pub const WORST: Self = Self::Extractive;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reciprocal => "reciprocal",
            Self::Borderline => "borderline",
            Self::Manipulative => "manipulative",
            Self::Extractive => "extractive",
        }
    }
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final judgment for one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeAssessment {
    /// Reciprocity balance in [-1, 1].
    pub ayni_balance: f64,
    pub exchange_type: ExchangeType,
    /// Structural and lens-flagged violations, verbatim.
    pub violations: BTreeSet<TrustViolation>,
    pub merged: MergedScore,
    /// Whether any lens hinted "extractive".
    pub hint_extractive: bool,
    pub evaluation_set: EvaluationSet,
}

impl ExchangeAssessment {
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Maximum lens falsehood for this exchange.
    pub fn max_falsehood(&self) -> f64 {
        self.merged.falsehood
    }

    pub fn refusals(&self) -> usize {
        self.evaluation_set.refusals()
    }
}
