// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Neutrosophic Evaluator
// ─────────────────────────────────────────────────────────────────────
//! Single-lens evaluation: invoke the oracle, pre-process its reply,
//! decode it strictly, and apply the lens's scoring policy.
//!
//! Decoding is two-stage. [`preprocess`] tolerates the wrappers judges
//! habitually add (reasoning blocks, markdown fences, prose around the
//! object). [`decode`] is strict: anything that is not a complete,
//! bounded verdict is a `LensError::Parse` carrying the raw reply.
//! There is no neutral fallback score.

use std::sync::Arc;

use serde::Deserialize;

use ayni_types::{
    Artifact, AyniError, AyniResult, ExchangeHint, LensError, LensSpec, NeutrosophicEvaluation,
    ScoringPolicy, TrustViolation, Triple,
};

use crate::oracle::{EvaluatorOracle, OracleReply, OracleRequest};

/// A decoded, bounded oracle verdict before lens scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub scores: Triple,
    pub reasoning: String,
    pub hint: Option<ExchangeHint>,
    pub flagged: Vec<TrustViolation>,
}

#[derive(Deserialize)]
struct WireVerdict {
    truth: f64,
    indeterminacy: f64,
    falsehood: f64,
    reasoning: String,
    #[serde(default)]
    exchange_type: Option<String>,
    #[serde(default)]
    violations: Vec<String>,
}

/// Strip known wrapper markers around the verdict object.
pub fn preprocess(raw: &str) -> &str {
    let mut text = raw.trim();

    // Reasoning models emit <think>…</think> before the answer.
    if let Some(end) = text.rfind("</think>") {
        text = text[end + "</think>".len()..].trim();
    }

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            text = after[..end].trim();
        }
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Decode a pre-processed reply into a bounded verdict.
pub fn decode(text: &str) -> Result<Verdict, String> {
    let wire: WireVerdict = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let scores = Triple::new(wire.truth, wire.indeterminacy, wire.falsehood)
        .map_err(|e| e.to_string())?;
    Ok(Verdict {
        scores,
        reasoning: wire.reasoning,
        hint: wire
            .exchange_type
            .filter(|h| !h.trim().is_empty())
            .map(|h| ExchangeHint::parse(&h)),
        flagged: wire
            .violations
            .iter()
            .filter(|v| !v.trim().is_empty())
            .map(|v| TrustViolation::from_tag(v))
            .collect(),
    })
}

/// Maps a decoded verdict to the lens's final scores.
///
/// Competing per-lens formulas each fix one false-negative class while
/// regressing another, so the formula is chosen per lens.
pub trait LensScoring: Send + Sync {
    fn score(&self, verdict: &Verdict) -> Triple;
}

impl LensScoring for ScoringPolicy {
    fn score(&self, verdict: &Verdict) -> Triple {
        match *self {
            ScoringPolicy::Direct => verdict.scores,
            ScoringPolicy::ViolationFloor { floor } => {
                let mut scores = verdict.scores;
                if !verdict.flagged.is_empty() {
                    scores.falsehood = scores.falsehood.max(floor.clamp(0.0, 1.0));
                }
                scores
            }
        }
    }
}

/// One evaluation perspective.
#[derive(Clone)]
pub struct Lens {
    id: String,
    template: String,
    scoring: Arc<dyn LensScoring>,
}

impl Lens {
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
            scoring: Arc::new(ScoringPolicy::Direct),
        }
    }

    pub fn from_spec(spec: &LensSpec) -> Self {
        Self {
            id: spec.id.clone(),
            template: spec.template.clone(),
            scoring: Arc::new(spec.scoring.clone()),
        }
    }

    /// Replace the scoring policy with a custom one.
    pub fn with_scoring(mut self, scoring: Arc<dyn LensScoring>) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl std::fmt::Debug for Lens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lens").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Evaluate one lens against the full artifact.
///
/// A failure comes back as `AyniError::Lens` with the lens id and the
/// layer snapshot attached.
pub async fn evaluate_lens(
    oracle: &dyn EvaluatorOracle,
    lens: &Lens,
    artifact: Arc<Artifact>,
) -> AyniResult<NeutrosophicEvaluation> {
    let snapshot = artifact.snapshot();
    run_lens(oracle, lens, artifact)
        .await
        .map_err(|source| AyniError::Lens {
            lens_id: lens.id.clone(),
            source,
            snapshot,
        })
}

/// Ensemble-side lens call; failures stay per lens.
pub(crate) async fn run_lens(
    oracle: &dyn EvaluatorOracle,
    lens: &Lens,
    artifact: Arc<Artifact>,
) -> Result<NeutrosophicEvaluation, LensError> {
    let request = OracleRequest {
        lens_id: lens.id.clone(),
        instruction: lens.template.clone(),
        artifact,
    };

    let raw = match oracle.evaluate(&request).await? {
        OracleReply::Completion(text) => text,
        OracleReply::Refused(reason) => {
            log::warn!("lens `{}` refused to evaluate: {reason}", lens.id);
            return Err(LensError::Refusal { reason });
        }
    };

    let verdict = decode(preprocess(&raw)).map_err(|reason| {
        log::warn!("lens `{}` returned an undecodable verdict: {reason}", lens.id);
        LensError::Parse {
            reason,
            raw: raw.clone(),
        }
    })?;

    // Policy output must satisfy the same bounds as the oracle's.
    let scored = lens.scoring.score(&verdict);
    let scores = Triple::new(scored.truth, scored.indeterminacy, scored.falsehood).map_err(|e| {
        log::warn!("lens `{}` scoring policy produced an invalid triple: {e}", lens.id);
        LensError::Parse {
            reason: format!("scoring policy output rejected: {e}"),
            raw: raw.clone(),
        }
    })?;
    Ok(NeutrosophicEvaluation::new(
        lens.id.clone(),
        scores,
        verdict.reasoning,
        verdict.hint,
        verdict.flagged,
    ))
}
