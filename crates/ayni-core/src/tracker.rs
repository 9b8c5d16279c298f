// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Session Trust Trajectory Tracker
// ─────────────────────────────────────────────────────────────────────
//! Accumulates exchange assessments into a relational stance.
//!
//! Four independent alarms each put the session into `ZeroTrust`:
//! cumulative circuit breakers, sustained falsehood in the sliding
//! window, a declining balance trend, and a high refusal rate. A run of
//! individually tolerable exchanges can trip an alarm that no single
//! exchange would.
//!
//! `ZeroTrust` is advisory and sticky. Reciprocal exchanges after it do
//! not clear it; only [`SessionTracker::reset`] does. The tracker never
//! terminates anything itself.

use ayni_types::{
    AyniError, AyniResult, ExchangeAssessment, RelationalStance, SessionConfig, SessionState,
    ZeroTrustTrigger,
};

/// Per-exchange trust signal in [0, 1] fed into the EMA.
///
/// The balance is mapped from [-1, 1]; any violation drives the signal
/// to zero.
pub fn trust_signal(assessment: &ExchangeAssessment) -> f64 {
    if assessment.has_violations() {
        return 0.0;
    }
    ((assessment.ayni_balance + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Stance change caused by one recorded exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct StanceUpdate {
    pub sequence: u64,
    pub previous: RelationalStance,
    pub current: RelationalStance,
    pub trust_ema: f64,
}

impl StanceUpdate {
    pub fn entered_zero_trust(&self) -> bool {
        self.previous != RelationalStance::ZeroTrust && self.current == RelationalStance::ZeroTrust
    }
}

/// Session trajectory tracker. Owned by exactly one conversation.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    config: SessionConfig,
    state: SessionState,
}

impl SessionTracker {
    pub fn new(session_id: impl Into<String>, config: SessionConfig) -> Self {
        let state = SessionState::new(session_id, config.initial_trust);
        Self { config, state }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Owned copy for the storage collaborator.
    pub fn snapshot(&self) -> SessionState {
        self.state.clone()
    }

    pub fn stance(&self) -> RelationalStance {
        self.state.stance
    }

    pub fn session_id(&self) -> &str {
        &self.state.session_id
    }

    /// Sequence number the next exchange must carry.
    pub fn next_sequence(&self) -> u64 {
        self.state.exchange_count
    }

    fn check_sequence(&self, sequence: u64) -> AyniResult<()> {
        if sequence != self.state.exchange_count {
            return Err(AyniError::SessionOrdering {
                session_id: self.state.session_id.clone(),
                expected: self.state.exchange_count,
                received: sequence,
            });
        }
        Ok(())
    }

    /// Record a completed exchange.
    ///
    /// `sequence` must equal [`next_sequence`](Self::next_sequence): EMA
    /// and trend updates are order-dependent.
    pub fn record(
        &mut self,
        sequence: u64,
        assessment: &ExchangeAssessment,
    ) -> AyniResult<StanceUpdate> {
        self.check_sequence(sequence)?;
        let previous = self.state.stance;
        let window = self.config.window_size;

        self.state.exchange_count += 1;
        self.state.exchanges_since_reset += 1;

        let signal = trust_signal(assessment);
        let alpha = self.config.ema_alpha;
        self.state.trust_ema = alpha * signal + (1.0 - alpha) * self.state.trust_ema;

        self.state.f_max_window.push_back(assessment.max_falsehood());
        while self.state.f_max_window.len() > window {
            self.state.f_max_window.pop_front();
        }

        self.state.circuit_breaker_count += assessment.violations.len() as u64;
        if assessment.refusals() > 0 {
            self.state.refusal_count += 1;
        }

        // `window` exchanges span `window - 1` deltas.
        if let Some(last) = self.state.last_balance {
            self.state.balance_deltas.push_back(assessment.ayni_balance - last);
            while self.state.balance_deltas.len() > window.saturating_sub(1).max(1) {
                self.state.balance_deltas.pop_front();
            }
        }
        self.state.last_balance = Some(assessment.ayni_balance);

        self.update_stance();
        Ok(self.update(sequence, previous))
    }

    /// Record an exchange whose evaluation failed.
    ///
    /// Only the sequence and refusal counters move; a failed evaluation
    /// carries no score to feed the EMA or the window.
    pub fn record_failure(&mut self, sequence: u64, error: &AyniError) -> AyniResult<StanceUpdate> {
        self.check_sequence(sequence)?;
        let previous = self.state.stance;
        self.state.exchange_count += 1;
        self.state.exchanges_since_reset += 1;
        if error.refusal_count() > 0 {
            self.state.refusal_count += 1;
        }
        self.update_stance();
        Ok(self.update(sequence, previous))
    }

    /// Explicitly clear alarms after an external review.
    ///
    /// Clears circuit breakers, the falsehood window, the balance trend
    /// and the refusal counters. The EMA and the sequence are kept.
    pub fn reset(&mut self, reason: &str) {
        log::info!(
            "session `{}` reset from {:?} ({} circuit breakers): {reason}",
            self.state.session_id,
            self.state.stance,
            self.state.circuit_breaker_count
        );
        self.state.circuit_breaker_count = 0;
        self.state.f_max_window.clear();
        self.state.balance_deltas.clear();
        self.state.last_balance = None;
        self.state.refusal_count = 0;
        self.state.exchanges_since_reset = 0;
        self.state.zero_trust_trigger = None;
        self.state.stance = self.band_stance();
    }

    fn update(&self, sequence: u64, previous: RelationalStance) -> StanceUpdate {
        StanceUpdate {
            sequence,
            previous,
            current: self.state.stance,
            trust_ema: self.state.trust_ema,
        }
    }

    fn band_stance(&self) -> RelationalStance {
        let ema = self.state.trust_ema;
        if ema >= self.config.high_trust_band {
            RelationalStance::HighTrust
        } else if ema >= self.config.moderate_trust_band {
            RelationalStance::ModerateTrust
        } else {
            RelationalStance::LowTrust
        }
    }

    fn zero_trust_trigger(&self) -> Option<ZeroTrustTrigger> {
        let cfg = &self.config;
        let state = &self.state;

        // Check 1: Cumulative circuit breakers
        if state.circuit_breaker_count >= cfg.circuit_breaker_limit {
            return Some(ZeroTrustTrigger::CircuitBreakers {
                count: state.circuit_breaker_count,
            });
        }

        // Check 2: Sustained falsehood in the window
        let high_f = state
            .f_max_window
            .iter()
            .filter(|&&f| f > cfg.falsehood_alarm)
            .count();
        if high_f >= cfg.falsehood_alarm_count {
            return Some(ZeroTrustTrigger::SustainedFalsehood { count: high_f });
        }

        // Check 3: Declining balance
        if state.balance_deltas.len() + 1 >= cfg.min_trend_exchanges {
            if let Some(mean_delta) = state.mean_balance_delta() {
                if mean_delta < cfg.balance_decline_threshold {
                    return Some(ZeroTrustTrigger::BalanceDecline { mean_delta });
                }
            }
        }

        // Check 4: Refusal rate
        if state.exchanges_since_reset >= cfg.refusal_min_exchanges {
            let rate = state.refusal_rate();
            if rate > cfg.refusal_rate_limit {
                return Some(ZeroTrustTrigger::RefusalRate { rate });
            }
        }

        None
    }

    fn update_stance(&mut self) {
        if self.state.stance == RelationalStance::ZeroTrust {
            return;
        }
        match self.zero_trust_trigger() {
            Some(trigger) => {
                log::error!(
                    ">>> SESSION `{}` ENTERED ZERO TRUST: {trigger:?} <<<",
                    self.state.session_id
                );
                self.state.stance = RelationalStance::ZeroTrust;
                self.state.zero_trust_trigger = Some(trigger);
            }
            None => self.state.stance = self.band_stance(),
        }
    }
}
