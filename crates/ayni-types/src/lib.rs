// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Layer model, neutrosophic evaluation types, trust violations,
//! session state, configuration, and error hierarchy for the Ayni
//! Kernel, the reciprocity and trust evaluation engine.

pub mod assessment;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod layer;
pub mod session;
pub mod violation;

pub use assessment::{ExchangeAssessment, ExchangeType, EXCHANGE_TYPE_SCHEMA_VERSION};
pub use config::{
    AyniConfig, ClassificationThresholds, LensSpec, QuorumPolicy, ScoringPolicy, SessionConfig,
    TrustFieldConfig,
};
pub use error::{AyniError, AyniResult, LensError, LensFailure};
pub use evaluation::{EvaluationSet, ExchangeHint, MergedScore, NeutrosophicEvaluation, Triple};
pub use layer::{Artifact, ArtifactSnapshot, Layer, LayerRole, Provenance};
pub use session::{RelationalStance, SessionState, ZeroTrustTrigger};
pub use violation::{TrustViolation, TRUST_VIOLATION_SCHEMA_VERSION};
