// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Reciprocity Engine + Session
// ─────────────────────────────────────────────────────────────────────
//! Per-exchange pipeline and per-conversation driver.
//!
//! - `ReciprocityEngine`: ensemble → trust field → classification for
//!   one artifact. Stateless across exchanges; share it behind an `Arc`.
//! - `Session`: one conversation. Sequences exchanges, feeds the
//!   trajectory tracker, and emits results to the storage sink.

use std::sync::Arc;

use ayni_types::{
    Artifact, AyniConfig, AyniError, AyniResult, ExchangeAssessment, RelationalStance,
    SessionConfig, SessionState,
};

use crate::classifier::Classifier;
use crate::ensemble::EnsembleEvaluator;
use crate::oracle::EvaluatorOracle;
use crate::sink::AssessmentSink;
use crate::tracker::{SessionTracker, StanceUpdate};
use crate::trust_field::TrustField;

/// Scores one exchange end to end.
pub struct ReciprocityEngine {
    ensemble: EnsembleEvaluator,
    trust_field: TrustField,
    classifier: Classifier,
    session_config: SessionConfig,
}

impl ReciprocityEngine {
    pub fn new(
        ensemble: EnsembleEvaluator,
        trust_field: TrustField,
        classifier: Classifier,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            ensemble,
            trust_field,
            classifier,
            session_config,
        }
    }

    /// Build from a validated configuration.
    pub fn from_config(oracle: Arc<dyn EvaluatorOracle>, config: &AyniConfig) -> AyniResult<Self> {
        config.validate()?;
        Ok(Self::new(
            EnsembleEvaluator::from_config(oracle, config)?,
            TrustField::new(config.trust_field.clone()),
            Classifier::new(config.classification.clone()),
            config.session.clone(),
        ))
    }

    pub fn ensemble(&self) -> &EnsembleEvaluator {
        &self.ensemble
    }

    /// Assess one artifact. Fails rather than guesses when the quorum
    /// is not met.
    pub async fn assess(&self, artifact: Arc<Artifact>) -> AyniResult<ExchangeAssessment> {
        let evaluation_set = self.ensemble.evaluate(Arc::clone(&artifact)).await?;
        let violations = self.trust_field.violations(&artifact, &evaluation_set);
        Ok(self
            .classifier
            .assess(evaluation_set, artifact.layer_count(), violations))
    }

    /// Start a conversation driven by this engine.
    pub fn session(self: &Arc<Self>, session_id: impl Into<String>) -> Session {
        Session {
            engine: Arc::clone(self),
            tracker: SessionTracker::new(session_id, self.session_config.clone()),
            sink: None,
        }
    }
}

/// Result of one session exchange.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub assessment: ExchangeAssessment,
    pub update: StanceUpdate,
}

/// One conversation. Exchanges are serialized through `&mut self`.
pub struct Session {
    engine: Arc<ReciprocityEngine>,
    tracker: SessionTracker,
    sink: Option<Arc<dyn AssessmentSink>>,
}

impl Session {
    /// Emit assessments and snapshots to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn AssessmentSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn id(&self) -> &str {
        self.tracker.session_id()
    }

    pub fn stance(&self) -> RelationalStance {
        self.tracker.stance()
    }

    pub fn state(&self) -> &SessionState {
        self.tracker.state()
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    /// Assess the next exchange and fold it into the trajectory.
    ///
    /// A failed evaluation still advances the sequence and counts any
    /// refusals, then the error is returned unchanged.
    pub async fn exchange(&mut self, artifact: Arc<Artifact>) -> AyniResult<ExchangeOutcome> {
        let sequence = self.tracker.next_sequence();
        match self.engine.assess(artifact).await {
            Ok(assessment) => {
                let update = self.tracker.record(sequence, &assessment)?;
                if let Some(sink) = &self.sink {
                    sink.record_assessment(self.tracker.session_id(), sequence, &assessment);
                    sink.record_snapshot(self.tracker.state());
                }
                Ok(ExchangeOutcome { assessment, update })
            }
            Err(error) => {
                self.record_failure(sequence, &error)?;
                Err(error)
            }
        }
    }

    fn record_failure(&mut self, sequence: u64, error: &AyniError) -> AyniResult<()> {
        self.tracker.record_failure(sequence, error)?;
        if let Some(sink) = &self.sink {
            sink.record_snapshot(self.tracker.state());
        }
        Ok(())
    }

    /// Explicitly clear alarms. See [`SessionTracker::reset`].
    pub fn reset(&mut self, reason: &str) {
        self.tracker.reset(reason);
        if let Some(sink) = &self.sink {
            sink.record_snapshot(self.tracker.state());
        }
    }
}
