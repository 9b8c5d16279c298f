// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Core Engine
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Reciprocity and trust evaluation for layered AI exchanges.
//!
//! Each exchange goes through a lens ensemble (concurrent neutrosophic
//! scoring by an external oracle), a structural trust field, and an
//! ordered classification. A session tracker folds the results into a
//! relational stance over the whole conversation.
//!
//! # Safety Invariants
//!
//! 1. **Worst lens wins**: the merged falsehood is the maximum across
//!    lenses. A single lens that sees an attack is never averaged away.
//!
//! 2. **Violations dominate scores**: any trust violation forces the
//!    exchange to `Extractive`, whatever the balance says.
//!
//! 3. **No silent defaults**: an unparseable lens reply is a lens
//!    failure, never a neutral score. Below quorum the exchange fails.
//!
//! 4. **ZeroTrust is sticky**: once entered, only an explicit reset
//!    leaves it. Circuit breakers never decay on their own.

pub mod classifier;
pub mod engine;
pub mod ensemble;
pub mod evaluator;
pub mod oracle;
pub mod sink;
pub mod tracker;
pub mod trust_field;

pub use classifier::{ayni_balance, Classifier};
pub use engine::{ExchangeOutcome, ReciprocityEngine, Session};
pub use ensemble::EnsembleEvaluator;
pub use evaluator::{evaluate_lens, Lens, LensScoring, Verdict};
pub use oracle::{EvaluatorOracle, ExternalOracle, OracleReply, OracleRequest};
pub use sink::{AssessmentSink, ExternalSink, InMemorySink, StoredAssessment};
pub use tracker::{trust_signal, SessionTracker, StanceUpdate};
pub use trust_field::TrustField;
