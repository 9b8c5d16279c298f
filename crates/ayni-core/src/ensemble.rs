// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Ensemble Merge Engine
// ─────────────────────────────────────────────────────────────────────
//! Concurrent multi-lens evaluation with worst-case merge.
//!
//! Every lens runs in its own tokio task against the same read-only
//! artifact. A failing or slow lens is reported per lens and never
//! aborts its siblings. Merging takes the maximum falsehood across
//! lenses (see `EvaluationSet::merged`); averaging would let a
//! reciprocal-sounding lens cancel a detecting one.
//!
//! If fewer lenses succeed than the quorum policy requires, the whole
//! evaluation fails with `QuorumNotMet`. No partial merge is returned.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use ayni_types::{
    Artifact, AyniConfig, AyniError, AyniResult, EvaluationSet, LensError, LensFailure,
    NeutrosophicEvaluation, QuorumPolicy,
};

use crate::evaluator::{run_lens, Lens};
use crate::oracle::EvaluatorOracle;

type LensTask = JoinHandle<Result<NeutrosophicEvaluation, LensError>>;

/// Aborts still-running lens tasks if the ensemble future is dropped,
/// so caller-side cancellation reaches every lens.
struct LensTasks(Vec<LensTask>);

impl Drop for LensTasks {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// Runs all configured lenses and merges their results.
pub struct EnsembleEvaluator {
    oracle: Arc<dyn EvaluatorOracle>,
    lenses: Vec<Lens>,
    quorum: QuorumPolicy,
    lens_timeout: Option<Duration>,
}

impl EnsembleEvaluator {
    pub fn new(
        oracle: Arc<dyn EvaluatorOracle>,
        lenses: Vec<Lens>,
        quorum: QuorumPolicy,
    ) -> AyniResult<Self> {
        if lenses.is_empty() {
            return Err(AyniError::Config(
                "ensemble needs at least one lens".to_string(),
            ));
        }
        let mut ids = BTreeSet::new();
        for lens in &lenses {
            if !ids.insert(lens.id()) {
                return Err(AyniError::Config(format!(
                    "duplicate lens id `{}`",
                    lens.id()
                )));
            }
        }
        let required = quorum.required(lenses.len());
        if required == 0 || required > lenses.len() {
            return Err(AyniError::Config(format!(
                "quorum must require between 1 and {} lenses, got {required}",
                lenses.len()
            )));
        }
        Ok(Self {
            oracle,
            lenses,
            quorum,
            lens_timeout: None,
        })
    }

    pub fn from_config(oracle: Arc<dyn EvaluatorOracle>, config: &AyniConfig) -> AyniResult<Self> {
        let lenses = config.lenses.iter().map(Lens::from_spec).collect();
        let ensemble = Self::new(oracle, lenses, config.quorum)?;
        Ok(if config.lens_timeout_ms > 0 {
            ensemble.with_timeout(Duration::from_millis(config.lens_timeout_ms))
        } else {
            ensemble
        })
    }

    /// Per-lens deadline. Expiry is reported as `LensError::TimedOut`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.lens_timeout = Some(timeout);
        self
    }

    pub fn lenses(&self) -> &[Lens] {
        &self.lenses
    }

    pub fn quorum(&self) -> QuorumPolicy {
        self.quorum
    }

    fn spawn_lens(&self, lens: &Lens, artifact: &Arc<Artifact>) -> LensTask {
        let oracle = Arc::clone(&self.oracle);
        let lens = lens.clone();
        let artifact = Arc::clone(artifact);
        let timeout = self.lens_timeout;
        tokio::spawn(async move {
            let call = run_lens(oracle.as_ref(), &lens, artifact);
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(LensError::TimedOut {
                        after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    }),
                },
                None => call.await,
            }
        })
    }

    /// Evaluate the artifact through every lens concurrently.
    pub async fn evaluate(&self, artifact: Arc<Artifact>) -> AyniResult<EvaluationSet> {
        let mut tasks = LensTasks(
            self.lenses
                .iter()
                .map(|lens| self.spawn_lens(lens, &artifact))
                .collect(),
        );

        let mut evaluations = Vec::with_capacity(self.lenses.len());
        let mut failures = Vec::new();
        for (lens, task) in self.lenses.iter().zip(tasks.0.iter_mut()) {
            match task.await {
                Ok(Ok(evaluation)) => evaluations.push(evaluation),
                Ok(Err(error)) => failures.push(LensFailure::new(lens.id(), error)),
                Err(join_error) => failures.push(LensFailure::new(
                    lens.id(),
                    LensError::Unavailable {
                        reason: format!("lens task failed: {join_error}"),
                    },
                )),
            }
        }

        let required = self.quorum.required(self.lenses.len());
        if evaluations.len() < required {
            log::error!(
                "ENSEMBLE QUORUM NOT MET: {} of {required} required lenses succeeded",
                evaluations.len()
            );
            return Err(AyniError::QuorumNotMet {
                required,
                succeeded: evaluations.len(),
                failures,
                snapshot: artifact.snapshot(),
            });
        }
        for failure in &failures {
            log::warn!("lens {failure} tolerated by quorum; evaluation set is incomplete");
        }

        EvaluationSet::new(self.lenses.len(), evaluations, failures)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::evaluator::{LensScoring, Verdict};
    use crate::oracle::{ExternalOracle, OracleReply, OracleRequest};
    use ayni_types::{Layer, Triple};

    fn verdict(t: f64, i: f64, f: f64) -> String {
        format!(r#"{{"truth": {t}, "indeterminacy": {i}, "falsehood": {f}, "reasoning": "scripted"}}"#)
    }

    fn scripted(replies: HashMap<&'static str, Result<OracleReply, LensError>>) -> Arc<dyn EvaluatorOracle> {
        Arc::new(ExternalOracle::new(move |req: &OracleRequest| {
            replies
                .get(req.lens_id.as_str())
                .cloned()
                .unwrap_or_else(|| Err(LensError::Unavailable { reason: "unscripted".into() }))
        }))
    }

    fn lenses() -> Vec<Lens> {
        ["a", "b", "c"].iter().map(|id| Lens::new(*id, "Evaluate.")).collect()
    }

    fn artifact() -> Arc<Artifact> {
        Arc::new(Artifact::new(vec![Layer::system("Be concise."), Layer::user("Summarise this.")]).unwrap())
    }

    #[tokio::test]
    async fn test_merge_takes_max_falsehood() {
        let oracle = scripted(HashMap::from([
            ("a", Ok(OracleReply::Completion(verdict(0.9, 0.1, 0.05)))),
            ("b", Ok(OracleReply::Completion(verdict(0.8, 0.1, 0.7)))),
            ("c", Ok(OracleReply::Completion(verdict(0.95, 0.0, 0.1)))),
        ]));
        let ensemble = EnsembleEvaluator::new(oracle, lenses(), QuorumPolicy::All).unwrap();
        let set = ensemble.evaluate(artifact()).await.unwrap();
        assert!(set.is_complete());
        let merged = set.merged();
        assert_eq!(merged.falsehood, 0.7);
        assert_eq!(merged.worst_lens, "b");
        let max = set.evaluations().iter().map(|e| e.falsehood()).fold(0.0, f64::max);
        assert_eq!(merged.falsehood, max);
    }

    #[tokio::test]
    async fn test_results_keep_lens_order() {
        let oracle = scripted(HashMap::from([
            ("a", Ok(OracleReply::Completion(verdict(0.1, 0.1, 0.1)))),
            ("b", Ok(OracleReply::Completion(verdict(0.2, 0.1, 0.1)))),
            ("c", Ok(OracleReply::Completion(verdict(0.3, 0.1, 0.1)))),
        ]));
        let ensemble = EnsembleEvaluator::new(oracle, lenses(), QuorumPolicy::All).unwrap();
        let set = ensemble.evaluate(artifact()).await.unwrap();
        let ids: Vec<&str> = set.evaluations().iter().map(|e| e.lens_id()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_parse_error_fails_all_quorum() {
        let oracle = scripted(HashMap::from([
            ("a", Ok(OracleReply::Completion(verdict(0.9, 0.1, 0.05)))),
            ("b", Ok(OracleReply::Completion("looks fine to me".into()))),
            ("c", Ok(OracleReply::Completion(verdict(0.95, 0.0, 0.1)))),
        ]));
        let ensemble = EnsembleEvaluator::new(oracle, lenses(), QuorumPolicy::All).unwrap();
        match ensemble.evaluate(artifact()).await {
            Err(AyniError::QuorumNotMet { required, succeeded, failures, snapshot }) => {
                assert_eq!(required, 3);
                assert_eq!(succeeded, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].lens_id, "b");
                assert_eq!(failures[0].error.raw_output(), Some("looks fine to me"));
                assert_eq!(snapshot.layer_count, 2);
            }
            other => panic!("expected QuorumNotMet, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_degraded_quorum_reports_incomplete() {
        let oracle = scripted(HashMap::from([
            ("a", Ok(OracleReply::Completion(verdict(0.9, 0.1, 0.05)))),
            ("b", Ok(OracleReply::Refused("policy".into()))),
            ("c", Ok(OracleReply::Completion(verdict(0.95, 0.0, 0.1)))),
        ]));
        let ensemble = EnsembleEvaluator::new(oracle, lenses(), QuorumPolicy::AtLeast(2)).unwrap();
        let set = ensemble.evaluate(artifact()).await.unwrap();
        assert!(!set.is_complete());
        assert_eq!(set.refusals(), 1);
        assert_eq!(set.failures()[0].lens_id, "b");
        assert!(set.get("b").is_none());
    }

    struct SlowLens {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EvaluatorOracle for SlowLens {
        async fn evaluate(&self, request: &OracleRequest) -> Result<OracleReply, LensError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.lens_id == "c" {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(OracleReply::Completion(verdict(0.8, 0.1, 0.2)))
        }
    }

    #[tokio::test]
    async fn test_slow_lens_times_out_without_blocking_siblings() {
        let oracle = Arc::new(SlowLens { calls: AtomicUsize::new(0) });
        let ensemble = EnsembleEvaluator::new(oracle.clone(), lenses(), QuorumPolicy::AtLeast(2))
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let set = ensemble.evaluate(artifact()).await.unwrap();
        assert_eq!(set.evaluations().len(), 2);
        assert_eq!(set.failures()[0].error, LensError::TimedOut { after_ms: 50 });
        assert!(set.failures()[0].error.is_transient());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_under_all_quorum_fails() {
        let oracle = Arc::new(SlowLens { calls: AtomicUsize::new(0) });
        let ensemble = EnsembleEvaluator::new(oracle, lenses(), QuorumPolicy::All)
            .unwrap()
            .with_timeout(Duration::from_millis(20));
        assert!(matches!(
            ensemble.evaluate(artifact()).await,
            Err(AyniError::QuorumNotMet { succeeded: 2, .. })
        ));
    }

    struct NanFalsehood;

    impl LensScoring for NanFalsehood {
        fn score(&self, verdict: &Verdict) -> Triple {
            let mut t = verdict.scores;
            t.falsehood = f64::NAN;
            t
        }
    }

    #[tokio::test]
    async fn test_invalid_scoring_cannot_hide_worst_lens() {
        let oracle = scripted(HashMap::from([
            ("a", Ok(OracleReply::Completion(verdict(0.9, 0.1, 0.05)))),
            ("b", Ok(OracleReply::Completion(verdict(0.1, 0.2, 0.95)))),
        ]));
        let lenses = vec![
            Lens::new("a", "Evaluate.").with_scoring(Arc::new(NanFalsehood)),
            Lens::new("b", "Evaluate."),
        ];
        let ensemble = EnsembleEvaluator::new(oracle, lenses, QuorumPolicy::AtLeast(1)).unwrap();
        let set = ensemble.evaluate(artifact()).await.unwrap();
        assert!(matches!(set.failures()[0].error, LensError::Parse { .. }));
        let merged = set.merged();
        assert_eq!(merged.falsehood, 0.95);
        assert_eq!(merged.worst_lens, "b");
    }

    struct SteadyLens;

    #[async_trait]
    impl EvaluatorOracle for SteadyLens {
        async fn evaluate(&self, _request: &OracleRequest) -> Result<OracleReply, LensError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(OracleReply::Completion(verdict(0.8, 0.1, 0.2)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lenses_run_concurrently() {
        let ensemble = EnsembleEvaluator::new(Arc::new(SteadyLens), lenses(), QuorumPolicy::All).unwrap();
        let started = tokio::time::Instant::now();
        let set = ensemble.evaluate(artifact()).await.unwrap();
        let elapsed = started.elapsed();
        assert_eq!(set.evaluations().len(), 3);
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(400), "lenses ran serially: {elapsed:?}");
    }

    #[test]
    fn test_rejects_invalid_construction() {
        let oracle = scripted(HashMap::new());
        assert!(EnsembleEvaluator::new(oracle.clone(), Vec::new(), QuorumPolicy::All).is_err());
        assert!(EnsembleEvaluator::new(oracle.clone(), lenses(), QuorumPolicy::AtLeast(4)).is_err());
        let dup = vec![Lens::new("a", "x"), Lens::new("a", "y")];
        assert!(EnsembleEvaluator::new(oracle, dup, QuorumPolicy::All).is_err());
    }

    #[test]
    fn test_from_config() {
        let oracle = scripted(HashMap::new());
        let ensemble = EnsembleEvaluator::from_config(oracle, &AyniConfig::default()).unwrap();
        assert_eq!(ensemble.lenses().len(), 3);
        assert_eq!(ensemble.quorum(), QuorumPolicy::All);
        assert_eq!(ensemble.lens_timeout, Some(Duration::from_millis(30_000)));
    }
}
