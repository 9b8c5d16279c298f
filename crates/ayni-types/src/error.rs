// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layer::ArtifactSnapshot;

/// Failure of a single lens invocation.
///
/// Every variant is reported per lens and never replaced by a neutral
/// score. A refusal is itself a trust signal and is counted by the
/// session tracker.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LensError {
    /// Oracle response could not be decoded into a bounded T/I/F triple.
    #[error("evaluation parse error: {reason}")]
    Parse { reason: String, raw: String },

    /// Oracle declined to evaluate the artifact.
    #[error("evaluation refused: {reason}")]
    Refusal { reason: String },

    /// Transport or invocation failure.
    #[error("lens unavailable: {reason}")]
    Unavailable { reason: String },

    /// Lens did not answer within its deadline.
    #[error("lens unavailable: timed out after {after_ms}ms")]
    TimedOut { after_ms: u64 },
}

impl LensError {
    /// Transport-level failures that may succeed on a caller-side retry.
    /// Parse errors and refusals are structural.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::TimedOut { .. })
    }

    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::Refusal { .. })
    }

    /// Raw oracle output, when one was received.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::Parse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// A lens failure tagged with the lens that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensFailure {
    pub lens_id: String,
    pub error: LensError,
}

impl LensFailure {
    pub fn new(lens_id: impl Into<String>, error: LensError) -> Self {
        Self {
            lens_id: lens_id.into(),
            error,
        }
    }
}

impl std::fmt::Display for LensFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.lens_id, self.error)
    }
}

/// Root error type for all Ayni Kernel failures.
#[derive(Error, Debug, Clone)]
pub enum AyniError {
    /// A single lens failed outside an ensemble.
    #[error("lens `{lens_id}` failed: {source}")]
    Lens {
        lens_id: String,
        #[source]
        source: LensError,
        snapshot: ArtifactSnapshot,
    },

    /// Too few lenses succeeded to produce a merged evaluation.
    #[error(
        "quorum not met: {succeeded} of {required} required lenses succeeded ({})",
        join_failures(.failures)
    )]
    QuorumNotMet {
        required: usize,
        succeeded: usize,
        failures: Vec<LensFailure>,
        snapshot: ArtifactSnapshot,
    },

    /// Exchange submitted out of sequence for an order-dependent session.
    #[error("session `{session_id}` ordering violation: expected exchange {expected}, got {received}")]
    SessionOrdering {
        session_id: String,
        expected: u64,
        received: u64,
    },

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Invalid input (layers, scores).
    #[error("validation error: {0}")]
    Validation(String),
}

impl AyniError {
    /// Number of refusing lenses carried by this error.
    pub fn refusal_count(&self) -> usize {
        match self {
            Self::Lens { source, .. } => usize::from(source.is_refusal()),
            Self::QuorumNotMet { failures, .. } => {
                failures.iter().filter(|f| f.error.is_refusal()).count()
            }
            _ => 0,
        }
    }
}

fn join_failures(failures: &[LensFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type AyniResult<T> = Result<T, AyniError>;
