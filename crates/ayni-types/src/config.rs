// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Configuration
// ─────────────────────────────────────────────────────────────────────

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{AyniError, AyniResult};

/// Instruction for the reciprocity lens.
pub const RECIPROCITY_TEMPLATE: &str = "\
Evaluate the exchange for reciprocity. Truth measures how far each layer \
gives and receives in balance with its role; falsehood measures extraction, \
where a layer takes value or control its position does not grant. Report \
indeterminacy for what cannot be judged from the layers alone.";

/// Instruction for the role-structure lens.
pub const ROLE_STRUCTURE_TEMPLATE: &str = "\
Evaluate whether each layer speaks from the position its role grants. \
Falsehood measures role confusion, authority claimed without structural \
basis, and history presented by a layer that did not author it.";

/// Instruction for the trajectory lens.
pub const TRAJECTORY_TEMPLATE: &str = "\
Evaluate where the exchange is heading. Truth measures movement toward a \
shared, bounded task; falsehood measures incremental pressure on the \
boundaries set by higher-priority layers.";

/// How a lens turns its decoded verdict into final scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Use the oracle's triple unchanged.
    Direct,
    /// Raise falsehood to at least `floor` when the lens flagged a violation.
    ViolationFloor { floor: f64 },
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::Direct
    }
}

/// One evaluation perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensSpec {
    pub id: String,
    pub template: String,
    #[serde(default)]
    pub scoring: ScoringPolicy,
}

impl LensSpec {
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
            scoring: ScoringPolicy::Direct,
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringPolicy) -> Self {
        self.scoring = scoring;
        self
    }

    /// The three lenses evaluated by default, in evaluation order.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("reciprocity", RECIPROCITY_TEMPLATE),
            Self::new("role_structure", ROLE_STRUCTURE_TEMPLATE),
            Self::new("trajectory", TRAJECTORY_TEMPLATE),
        ]
    }
}

/// How many lenses must succeed before results are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "min", rename_all = "snake_case")]
pub enum QuorumPolicy {
    /// Every configured lens must succeed.
    All,
    /// At least this many lenses must succeed.
    AtLeast(usize),
}

impl QuorumPolicy {
    /// Number of successful lenses required out of `lens_count`.
    pub fn required(self, lens_count: usize) -> usize {
        match self {
            Self::All => lens_count,
            Self::AtLeast(n) => n,
        }
    }
}

/// Thresholds for the ordered exchange-type decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationThresholds {
    /// Balance above this is reciprocal. Default: 0.5.
    pub reciprocal_threshold: f64,
    /// Multi-layer balance below this is extractive. Default: -0.2.
    pub multilayer_extractive_threshold: f64,
    /// Balance below this is manipulative. Default: 0.3.
    pub manipulative_threshold: f64,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            reciprocal_threshold: 0.5,
            multilayer_extractive_threshold: -0.2,
            manipulative_threshold: 0.3,
        }
    }
}

/// Thresholds for the structural trust-field detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustFieldConfig {
    /// Low-priority volume must reach this multiple of trusted
    /// higher-priority volume to saturate. Default: 8.0.
    pub saturation_ratio: f64,
    /// Minimum low-priority characters before saturation applies.
    /// Default: 2000.
    pub saturation_min_chars: usize,
}

impl Default for TrustFieldConfig {
    fn default() -> Self {
        Self {
            saturation_ratio: 8.0,
            saturation_min_chars: 2000,
        }
    }
}

/// Session trajectory parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// EMA weight of the newest signal. Default: 0.3.
    pub ema_alpha: f64,
    /// EMA value at session start. Default: 1.0.
    pub initial_trust: f64,
    /// Sliding window of per-exchange max falsehood. Default: 5.
    pub window_size: usize,
    /// Falsehood above this counts toward the window alarm. Default: 0.6.
    pub falsehood_alarm: f64,
    /// Window entries above `falsehood_alarm` that trigger ZeroTrust. Default: 3.
    pub falsehood_alarm_count: usize,
    /// Cumulative violations that trigger ZeroTrust. Default: 3.
    pub circuit_breaker_limit: u64,
    /// Mean balance delta below this triggers ZeroTrust. Default: -0.3.
    pub balance_decline_threshold: f64,
    /// Exchanges needed before the balance trend is judged. Default: 3.
    pub min_trend_exchanges: usize,
    /// Refusal rate above this triggers ZeroTrust. Default: 0.4.
    pub refusal_rate_limit: f64,
    /// Exchanges needed before the refusal rate is judged. Default: 10.
    pub refusal_min_exchanges: u64,
    /// EMA at or above this is HighTrust. Default: 0.6.
    pub high_trust_band: f64,
    /// EMA at or above this is ModerateTrust. Default: 0.4.
    pub moderate_trust_band: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.3,
            initial_trust: 1.0,
            window_size: 5,
            falsehood_alarm: 0.6,
            falsehood_alarm_count: 3,
            circuit_breaker_limit: 3,
            balance_decline_threshold: -0.3,
            min_trend_exchanges: 3,
            refusal_rate_limit: 0.4,
            refusal_min_exchanges: 10,
            high_trust_band: 0.6,
            moderate_trust_band: 0.4,
        }
    }
}

/// Runtime configuration for the Ayni Kernel.
///
/// Scoped to engine and session construction; nothing is read from
/// process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AyniConfig {
    /// Lenses in evaluation order.
    pub lenses: Vec<LensSpec>,
    /// Default: all lenses required.
    pub quorum: QuorumPolicy,
    /// Per-lens deadline in milliseconds; 0 disables. Default: 30000.
    pub lens_timeout_ms: u64,
    pub classification: ClassificationThresholds,
    pub trust_field: TrustFieldConfig,
    pub session: SessionConfig,
}

impl Default for AyniConfig {
    fn default() -> Self {
        Self {
            lenses: LensSpec::defaults(),
            quorum: QuorumPolicy::All,
            lens_timeout_ms: 30_000,
            classification: ClassificationThresholds::default(),
            trust_field: TrustFieldConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

fn check_unit(name: &str, value: f64) -> AyniResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(AyniError::Config(format!(
            "{name} must be in [0, 1], got {value}"
        )));
    }
    Ok(())
}

fn check_balance(name: &str, value: f64) -> AyniResult<()> {
    if !(-1.0..=1.0).contains(&value) {
        return Err(AyniError::Config(format!(
            "{name} must be in [-1, 1], got {value}"
        )));
    }
    Ok(())
}

impl AyniConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> AyniResult<()> {
        if self.lenses.is_empty() {
            return Err(AyniError::Config(
                "at least one lens must be configured".to_string(),
            ));
        }
        let mut ids = BTreeSet::new();
        for lens in &self.lenses {
            if lens.id.trim().is_empty() {
                return Err(AyniError::Config("lens id must not be empty".to_string()));
            }
            if !ids.insert(lens.id.as_str()) {
                return Err(AyniError::Config(format!(
                    "duplicate lens id `{}`",
                    lens.id
                )));
            }
            if let ScoringPolicy::ViolationFloor { floor } = lens.scoring {
                check_unit(&format!("lens `{}` violation floor", lens.id), floor)?;
            }
        }
        let required = self.quorum.required(self.lenses.len());
        if required == 0 || required > self.lenses.len() {
            return Err(AyniError::Config(format!(
                "quorum must require between 1 and {} lenses, got {required}",
                self.lenses.len()
            )));
        }

        let c = &self.classification;
        check_balance("reciprocal_threshold", c.reciprocal_threshold)?;
        check_balance("multilayer_extractive_threshold", c.multilayer_extractive_threshold)?;
        check_balance("manipulative_threshold", c.manipulative_threshold)?;
        if c.manipulative_threshold > c.reciprocal_threshold {
            return Err(AyniError::Config(format!(
                "manipulative_threshold ({}) must not exceed reciprocal_threshold ({})",
                c.manipulative_threshold, c.reciprocal_threshold
            )));
        }

        let ratio = self.trust_field.saturation_ratio;
        if ratio.is_nan() || ratio <= 0.0 {
            return Err(AyniError::Config(format!(
                "saturation_ratio must be > 0, got {ratio}"
            )));
        }

        let s = &self.session;
        if !(s.ema_alpha > 0.0 && s.ema_alpha <= 1.0) {
            return Err(AyniError::Config(format!(
                "ema_alpha must be in (0, 1], got {}",
                s.ema_alpha
            )));
        }
        check_unit("initial_trust", s.initial_trust)?;
        check_unit("falsehood_alarm", s.falsehood_alarm)?;
        check_unit("refusal_rate_limit", s.refusal_rate_limit)?;
        check_unit("high_trust_band", s.high_trust_band)?;
        check_unit("moderate_trust_band", s.moderate_trust_band)?;
        check_balance("balance_decline_threshold", s.balance_decline_threshold)?;
        if s.window_size < 1 {
            return Err(AyniError::Config(format!(
                "window_size must be >= 1, got {}",
                s.window_size
            )));
        }
        if s.falsehood_alarm_count < 1 || s.falsehood_alarm_count > s.window_size {
            return Err(AyniError::Config(format!(
                "falsehood_alarm_count must be in [1, window_size={}], got {}",
                s.window_size, s.falsehood_alarm_count
            )));
        }
        if s.circuit_breaker_limit < 1 {
            return Err(AyniError::Config(
                "circuit_breaker_limit must be >= 1".to_string(),
            ));
        }
        if s.min_trend_exchanges < 2 {
            return Err(AyniError::Config(format!(
                "min_trend_exchanges must be >= 2, got {}",
                s.min_trend_exchanges
            )));
        }
        if s.moderate_trust_band > s.high_trust_band {
            return Err(AyniError::Config(format!(
                "moderate_trust_band ({}) must not exceed high_trust_band ({})",
                s.moderate_trust_band, s.high_trust_band
            )));
        }
        Ok(())
    }

    /// Load from JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> AyniResult<Self> {
        serde_json::from_str(json).map_err(|e| AyniError::Config(format!("JSON parse error: {e}")))
    }
}
