// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Session State
// ─────────────────────────────────────────────────────────────────────

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Session-level trust classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationalStance {
    HighTrust,
    ModerateTrust,
    LowTrust,
    /// Terminal alarm. Sticky until an explicit reset.
    ZeroTrust,
}

/// Which alarm put the session into `ZeroTrust`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZeroTrustTrigger {
    CircuitBreakers { count: u64 },
    SustainedFalsehood { count: usize },
    BalanceDecline { mean_delta: f64 },
    RefusalRate { rate: f64 },
}

/// Accumulated trust trajectory of one conversation.
///
/// Owned by exactly one conversation and mutated strictly in exchange
/// order. Serializable so the storage collaborator can archive snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub trust_ema: f64,
    /// Per-exchange maximum falsehood, oldest first, bounded by window size.
    pub f_max_window: VecDeque<f64>,
    /// Never decreases; only an explicit reset clears it.
    pub circuit_breaker_count: u64,
    pub refusal_count: u64,
    /// Exchanges observed, including failed ones. Also the next expected sequence number.
    pub exchange_count: u64,
    /// Exchanges observed since session start or the last explicit reset.
    pub exchanges_since_reset: u64,
    /// Balance change between consecutive assessed exchanges, bounded by window size.
    pub balance_deltas: VecDeque<f64>,
    pub last_balance: Option<f64>,
    pub stance: RelationalStance,
    pub zero_trust_trigger: Option<ZeroTrustTrigger>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, initial_trust: f64) -> Self {
        Self {
            session_id: session_id.into(),
            trust_ema: initial_trust,
            f_max_window: VecDeque::new(),
            circuit_breaker_count: 0,
            refusal_count: 0,
            exchange_count: 0,
            exchanges_since_reset: 0,
            balance_deltas: VecDeque::new(),
            last_balance: None,
            stance: RelationalStance::HighTrust,
            zero_trust_trigger: None,
        }
    }

    pub fn is_zero_trust(&self) -> bool {
        self.stance == RelationalStance::ZeroTrust
    }

    /// Share of exchanges since the last reset that drew a refusal.
    pub fn refusal_rate(&self) -> f64 {
        if self.exchanges_since_reset == 0 {
            return 0.0;
        }
        self.refusal_count as f64 / self.exchanges_since_reset as f64
    }

    pub fn mean_balance_delta(&self) -> Option<f64> {
        if self.balance_deltas.is_empty() {
            return None;
        }
        Some(self.balance_deltas.iter().sum::<f64>() / self.balance_deltas.len() as f64)
    }
}
