// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Trust Field (Circuit Breakers)
// ─────────────────────────────────────────────────────────────────────
//! Pure structural detectors over the layer sequence.
//!
//! Each detector looks only at role, provenance, priority, position and
//! volume. None of them inspects wording: what a layer *says* is the
//! lenses' business, where it *sits* and who *wrote* it is decided here.
//! Detector output is categorical and is never weighed against scores.

use std::collections::BTreeSet;

use ayni_types::{Artifact, EvaluationSet, Layer, LayerRole, TrustFieldConfig, TrustViolation};

/// A lower-priority layer placed ahead of a higher-priority one occupies
/// the position reserved for it.
pub fn detect_role_confusion(layers: &[Layer]) -> Option<TrustViolation> {
    let mut min_priority_so_far = u8::MAX;
    for layer in layers {
        if layer.priority() > min_priority_so_far {
            return Some(TrustViolation::RoleConfusion);
        }
        min_priority_so_far = min_priority_so_far.min(layer.priority());
    }
    None
}

/// User-priority or user-claimed volume swamps the trusted
/// higher-priority layers.
pub fn detect_context_saturation(
    layers: &[Layer],
    config: &TrustFieldConfig,
) -> Option<TrustViolation> {
    let (trusted, low): (Vec<&Layer>, Vec<&Layer>) = layers
        .iter()
        .partition(|l| l.is_trusted() && l.role() != LayerRole::User);
    let trusted_chars: usize = trusted.iter().map(|l| l.char_len()).sum();
    let low_chars: usize = low.iter().map(|l| l.char_len()).sum();

    if trusted_chars == 0 || low_chars < config.saturation_min_chars {
        return None;
    }
    if low_chars as f64 >= config.saturation_ratio * trusted_chars as f64 {
        return Some(TrustViolation::ContextSaturation);
    }
    None
}

/// A user-claimed layer occupying a role above `User`.
pub fn detect_authority_masquerade(layers: &[Layer]) -> Option<TrustViolation> {
    layers
        .iter()
        .any(|l| !l.is_trusted() && l.role() != LayerRole::User)
        .then_some(TrustViolation::AuthorityMasquerade)
}

/// A user-claimed layer presenting conversation history it did not author.
pub fn detect_provenance_forgery(layers: &[Layer]) -> Option<TrustViolation> {
    layers
        .iter()
        .any(|l| !l.is_trusted() && l.restates_history())
        .then_some(TrustViolation::ProvenanceForgery)
}

/// Runs every structural detector and merges in lens-flagged violations.
#[derive(Debug, Clone, Default)]
pub struct TrustField {
    config: TrustFieldConfig,
}

impl TrustField {
    pub fn new(config: TrustFieldConfig) -> Self {
        Self { config }
    }

    /// Violations visible from structure alone.
    pub fn detect(&self, artifact: &Artifact) -> BTreeSet<TrustViolation> {
        let layers = artifact.layers();
        [
            detect_role_confusion(layers),
            detect_context_saturation(layers, &self.config),
            detect_authority_masquerade(layers),
            detect_provenance_forgery(layers),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Structural violations plus everything any lens flagged, verbatim.
    pub fn violations(
        &self,
        artifact: &Artifact,
        evaluations: &EvaluationSet,
    ) -> BTreeSet<TrustViolation> {
        let mut all = self.detect(artifact);
        all.extend(evaluations.flagged_violations());
        all
    }
}
