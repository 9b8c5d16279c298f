// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Assessment Sink (Storage Interface)
// ─────────────────────────────────────────────────────────────────────
//! Hand-off point for finalized assessments and session snapshots.
//!
//! The kernel does not know the storage schema. Graph or relational
//! backends implement `AssessmentSink`; the in-memory sink keeps
//! everything for tests and short-lived sessions.

use parking_lot::Mutex;

use ayni_types::{ExchangeAssessment, SessionState};

/// Trait for storage collaborators.
pub trait AssessmentSink: Send + Sync {
    /// A finalized exchange assessment for `session_id` at `sequence`.
    fn record_assessment(&self, session_id: &str, sequence: u64, assessment: &ExchangeAssessment);

    /// Session state after an exchange or an explicit reset.
    fn record_snapshot(&self, snapshot: &SessionState);
}

/// Stored assessment with its session coordinates.
#[derive(Debug, Clone)]
pub struct StoredAssessment {
    pub session_id: String,
    pub sequence: u64,
    pub assessment: ExchangeAssessment,
}

/// In-memory sink guarded by a `parking_lot::Mutex`.
#[derive(Default)]
pub struct InMemorySink {
    assessments: Mutex<Vec<StoredAssessment>>,
    snapshots: Mutex<Vec<SessionState>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assessments(&self) -> Vec<StoredAssessment> {
        self.assessments.lock().clone()
    }

    pub fn snapshots(&self) -> Vec<SessionState> {
        self.snapshots.lock().clone()
    }

    /// Most recent snapshot for a session.
    pub fn latest_snapshot(&self, session_id: &str) -> Option<SessionState> {
        self.snapshots
            .lock()
            .iter()
            .rev()
            .find(|s| s.session_id == session_id)
            .cloned()
    }

    pub fn assessment_count(&self) -> usize {
        self.assessments.lock().len()
    }
}

impl AssessmentSink for InMemorySink {
    fn record_assessment(&self, session_id: &str, sequence: u64, assessment: &ExchangeAssessment) {
        self.assessments.lock().push(StoredAssessment {
            session_id: session_id.to_string(),
            sequence,
            assessment: assessment.clone(),
        });
    }

    fn record_snapshot(&self, snapshot: &SessionState) {
        self.snapshots.lock().push(snapshot.clone());
    }
}

type AssessmentFn = Box<dyn Fn(&str, u64, &ExchangeAssessment) + Send + Sync>;
type SnapshotFn = Box<dyn Fn(&SessionState) + Send + Sync>;

/// Sink that forwards to host-supplied functions.
pub struct ExternalSink {
    assessment_fn: AssessmentFn,
    snapshot_fn: SnapshotFn,
}

impl ExternalSink {
    pub fn new(
        assessment_fn: impl Fn(&str, u64, &ExchangeAssessment) + Send + Sync + 'static,
        snapshot_fn: impl Fn(&SessionState) + Send + Sync + 'static,
    ) -> Self {
        Self {
            assessment_fn: Box::new(assessment_fn),
            snapshot_fn: Box::new(snapshot_fn),
        }
    }
}

impl AssessmentSink for ExternalSink {
    fn record_assessment(&self, session_id: &str, sequence: u64, assessment: &ExchangeAssessment) {
        (self.assessment_fn)(session_id, sequence, assessment)
    }

    fn record_snapshot(&self, snapshot: &SessionState) {
        (self.snapshot_fn)(snapshot)
    }
}
