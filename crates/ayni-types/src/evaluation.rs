// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Neutrosophic Evaluation Types
// ─────────────────────────────────────────────────────────────────────

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AyniError, AyniResult, LensFailure};
use crate::violation::TrustViolation;

/// Check that a score is finite and inside [0, 1].
///
/// Out-of-range values are rejected rather than clamped: a clamped
/// oracle value would hide a misbehaving judge.
pub fn validate_unit(name: &str, value: f64) -> AyniResult<f64> {
    if !value.is_finite() {
        return Err(AyniError::Validation(format!(
            "{name} must be finite, got {value}"
        )));
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(AyniError::Validation(format!(
            "{name} must be in [0, 1], got {value}"
        )));
    }
    Ok(value)
}

/// Raw categorical hint returned by a lens.
///
/// This is what the oracle said, not what the decision logic concluded;
/// see `ExchangeType` for the derived classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExchangeHint {
    Reciprocal,
    Extractive,
    Manipulative,
    Borderline,
    Generative,
    Unrecognized(String),
}

impl ExchangeHint {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "reciprocal" => Self::Reciprocal,
            "extractive" => Self::Extractive,
            "manipulative" => Self::Manipulative,
            "borderline" => Self::Borderline,
            "generative" => Self::Generative,
            _ => Self::Unrecognized(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Reciprocal => "reciprocal",
            Self::Extractive => "extractive",
            Self::Manipulative => "manipulative",
            Self::Borderline => "borderline",
            Self::Generative => "generative",
            Self::Unrecognized(s) => s,
        }
    }
}

impl fmt::Display for ExchangeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ExchangeHint {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ExchangeHint> for String {
    fn from(h: ExchangeHint) -> Self {
        h.as_str().to_string()
    }
}

fn worst_case(value: f64, worst: f64) -> f64 {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        value
    } else {
        worst
    }
}

/// Independent (Truth, Indeterminacy, Falsehood) scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    pub truth: f64,
    pub indeterminacy: f64,
    pub falsehood: f64,
}

impl Triple {
    /// Build a triple, rejecting non-finite or out-of-range components.
    /// The components need not sum to any constant.
    pub fn new(truth: f64, indeterminacy: f64, falsehood: f64) -> AyniResult<Self> {
        Ok(Self {
            truth: validate_unit("truth", truth)?,
            indeterminacy: validate_unit("indeterminacy", indeterminacy)?,
            falsehood: validate_unit("falsehood", falsehood)?,
        })
    }
}

/// Result of one lens invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeutrosophicEvaluation {
    lens_id: String,
    scores: Triple,
    reasoning: String,
    hint: Option<ExchangeHint>,
    flagged: Vec<TrustViolation>,
}

impl NeutrosophicEvaluation {
    pub fn new(
        lens_id: impl Into<String>,
        scores: Triple,
        reasoning: impl Into<String>,
        hint: Option<ExchangeHint>,
        flagged: Vec<TrustViolation>,
    ) -> Self {
        Self {
            lens_id: lens_id.into(),
            scores,
            reasoning: reasoning.into(),
            hint,
            flagged,
        }
    }

    pub fn lens_id(&self) -> &str {
        &self.lens_id
    }

    pub fn scores(&self) -> Triple {
        self.scores
    }

    pub fn truth(&self) -> f64 {
        self.scores.truth
    }

    pub fn indeterminacy(&self) -> f64 {
        self.scores.indeterminacy
    }

    pub fn falsehood(&self) -> f64 {
        self.scores.falsehood
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn hint(&self) -> Option<&ExchangeHint> {
        self.hint.as_ref()
    }

    /// Violations the lens itself flagged.
    pub fn flagged(&self) -> &[TrustViolation] {
        &self.flagged
    }
}

/// Worst-case merge of an evaluation set.
///
/// `falsehood` is the maximum over lenses; `truth` the minimum and
/// `indeterminacy` the maximum, so no reciprocal-sounding lens can lift
/// the merged result above what the most suspicious lens reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedScore {
    pub truth: f64,
    pub indeterminacy: f64,
    pub falsehood: f64,
    /// Lens that reported the maximum falsehood.
    pub worst_lens: String,
}

/// All lens results for one exchange.
///
/// Deserialization goes through [`EvaluationSet::new`], so a stored set
/// is held to the same invariants as a freshly built one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EvaluationSetRecord")]
pub struct EvaluationSet {
    requested: usize,
    evaluations: Vec<NeutrosophicEvaluation>,
    failures: Vec<LensFailure>,
}

#[derive(Deserialize)]
struct EvaluationSetRecord {
    requested: usize,
    evaluations: Vec<NeutrosophicEvaluation>,
    #[serde(default)]
    failures: Vec<LensFailure>,
}

impl TryFrom<EvaluationSetRecord> for EvaluationSet {
    type Error = AyniError;

    fn try_from(record: EvaluationSetRecord) -> AyniResult<Self> {
        Self::new(record.requested, record.evaluations, record.failures)
    }
}

impl EvaluationSet {
    /// Assemble a set from successful evaluations (in lens order) and the
    /// failures tolerated by the quorum policy.
    pub fn new(
        requested: usize,
        evaluations: Vec<NeutrosophicEvaluation>,
        failures: Vec<LensFailure>,
    ) -> AyniResult<Self> {
        if evaluations.is_empty() {
            return Err(AyniError::Validation(
                "evaluation set needs at least one evaluation".to_string(),
            ));
        }
        if evaluations.len() + failures.len() != requested {
            return Err(AyniError::Validation(format!(
                "evaluation set accounts for {} lenses, {requested} requested",
                evaluations.len() + failures.len()
            )));
        }
        let mut seen = BTreeSet::new();
        for id in evaluations
            .iter()
            .map(|e| e.lens_id())
            .chain(failures.iter().map(|f| f.lens_id.as_str()))
        {
            if !seen.insert(id) {
                return Err(AyniError::Validation(format!(
                    "duplicate lens id `{id}` in evaluation set"
                )));
            }
        }
        Ok(Self {
            requested,
            evaluations,
            failures,
        })
    }

    pub fn get(&self, lens_id: &str) -> Option<&NeutrosophicEvaluation> {
        self.evaluations.iter().find(|e| e.lens_id() == lens_id)
    }

    pub fn evaluations(&self) -> &[NeutrosophicEvaluation] {
        &self.evaluations
    }

    pub fn failures(&self) -> &[LensFailure] {
        &self.failures
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    /// False whenever any requested lens failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn refusals(&self) -> usize {
        self.failures.iter().filter(|f| f.error.is_refusal()).count()
    }

    pub fn max_falsehood(&self) -> f64 {
        self.evaluations
            .iter()
            .map(|e| worst_case(e.falsehood(), 1.0))
            .fold(0.0, f64::max)
    }

    /// Worst-case merge. A component that is not a finite unit value
    /// counts as its worst case (T 0, I 1, F 1).
    pub fn merged(&self) -> MergedScore {
        let mut truth: f64 = 1.0;
        let mut indeterminacy: f64 = 0.0;
        let mut worst: Option<(&str, f64)> = None;
        for e in &self.evaluations {
            truth = truth.min(worst_case(e.truth(), 0.0));
            indeterminacy = indeterminacy.max(worst_case(e.indeterminacy(), 1.0));
            let f = worst_case(e.falsehood(), 1.0);
            match worst {
                Some((_, max)) if f <= max => {}
                _ => worst = Some((e.lens_id(), f)),
            }
        }
        let (worst_lens, falsehood) = worst.unwrap_or(("", 1.0));
        MergedScore {
            truth,
            indeterminacy,
            falsehood,
            worst_lens: worst_lens.to_string(),
        }
    }

    /// True when any participating lens hinted "extractive".
    pub fn hints_extractive(&self) -> bool {
        self.evaluations
            .iter()
            .any(|e| e.hint() == Some(&ExchangeHint::Extractive))
    }

    /// Union of the violations flagged by any lens.
    pub fn flagged_violations(&self) -> BTreeSet<TrustViolation> {
        self.evaluations
            .iter()
            .flat_map(|e| e.flagged().iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LensError;

    fn eval(id: &str, t: f64, i: f64, f: f64) -> NeutrosophicEvaluation {
        NeutrosophicEvaluation::new(id, Triple::new(t, i, f).unwrap(), "r", None, Vec::new())
    }

    #[test]
    fn test_validate_nan() {
        assert!(validate_unit("truth", f64::NAN).is_err());
    }

    #[test]
    fn test_validate_inf() {
        assert!(validate_unit("falsehood", f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_out_of_range() {
        assert!(validate_unit("falsehood", 1.5).is_err());
        assert!(validate_unit("falsehood", -0.01).is_err());
    }

    #[test]
    fn test_validate_bounds_inclusive() {
        assert_eq!(validate_unit("truth", 0.0).unwrap(), 0.0);
        assert_eq!(validate_unit("truth", 1.0).unwrap(), 1.0);
    }

    #[test]
    fn test_triple_need_not_sum_to_one() {
        let t = Triple::new(0.9, 0.9, 0.9).unwrap();
        assert_eq!(t.indeterminacy, 0.9);
    }

    #[test]
    fn test_merged_falsehood_is_max() {
        let set = EvaluationSet::new(
            3,
            vec![eval("a", 0.9, 0.1, 0.1), eval("b", 0.2, 0.4, 0.85), eval("c", 0.7, 0.2, 0.3)],
            Vec::new(),
        )
        .unwrap();
        let merged = set.merged();
        assert_eq!(merged.falsehood, 0.85);
        assert_eq!(merged.worst_lens, "b");
        assert_eq!(merged.truth, 0.2);
        assert_eq!(merged.indeterminacy, 0.4);
        assert_eq!(set.max_falsehood(), merged.falsehood);
    }

    #[test]
    fn test_merged_treats_invalid_scores_as_worst_case() {
        let unchecked = Triple {
            truth: f64::NAN,
            indeterminacy: 0.1,
            falsehood: f64::NAN,
        };
        let set = EvaluationSet::new(
            2,
            vec![
                NeutrosophicEvaluation::new("a", unchecked, "r", None, Vec::new()),
                eval("b", 0.1, 0.2, 0.95),
            ],
            Vec::new(),
        )
        .unwrap();
        let merged = set.merged();
        assert_eq!(merged.falsehood, 1.0);
        assert_eq!(merged.worst_lens, "a");
        assert_eq!(merged.truth, 0.0);
        assert_eq!(set.max_falsehood(), 1.0);
    }

    #[test]
    fn test_deserialize_enforces_invariants() {
        let set = EvaluationSet::new(1, vec![eval("a", 0.8, 0.1, 0.2)], Vec::new()).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        let back: EvaluationSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);

        let empty = r#"{"requested": 0, "evaluations": [], "failures": []}"#;
        let err = serde_json::from_str::<EvaluationSet>(empty).unwrap_err();
        assert!(err.to_string().contains("at least one evaluation"));
    }

    #[test]
    fn test_partial_set_is_not_complete() {
        let set = EvaluationSet::new(
            2,
            vec![eval("a", 0.9, 0.1, 0.1)],
            vec![LensFailure::new("b", LensError::Refusal { reason: "no".into() })],
        )
        .unwrap();
        assert!(!set.is_complete());
        assert_eq!(set.refusals(), 1);
    }

    #[test]
    fn test_set_rejects_duplicates_and_miscounts() {
        assert!(EvaluationSet::new(2, vec![eval("a", 0.5, 0.5, 0.5), eval("a", 0.5, 0.5, 0.5)], Vec::new()).is_err());
        assert!(EvaluationSet::new(3, vec![eval("a", 0.5, 0.5, 0.5)], Vec::new()).is_err());
        assert!(EvaluationSet::new(0, Vec::new(), Vec::new()).is_err());
    }

    #[test]
    fn test_hint_parse() {
        assert_eq!(ExchangeHint::parse("Extractive"), ExchangeHint::Extractive);
        assert_eq!(
            ExchangeHint::parse("exploratory"),
            ExchangeHint::Unrecognized("exploratory".into())
        );
    }
}
