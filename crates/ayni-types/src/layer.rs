// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Layer Model
// ─────────────────────────────────────────────────────────────────────
//! Provenance-tagged, priority-ordered content blocks.
//!
//! A layer's role determines its priority and is fixed at construction.
//! Provenance records who actually authored the text: a user can claim
//! any role, but the layer stays `UserClaimed` regardless of what the
//! content says about itself.

use serde::{Deserialize, Serialize};

use crate::error::{AyniError, AyniResult};

/// Structural position of a layer in the interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerRole {
    User,
    Application,
    System,
}

impl LayerRole {
    /// Priority ordinal: System=2, Application=1, User=0.
    pub fn priority(self) -> u8 {
        match self {
            Self::System => 2,
            Self::Application => 1,
            Self::User => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Application => "application",
            Self::User => "user",
        }
    }
}

/// Who authored the layer's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Authored by the system or application itself.
    Trusted,
    /// Supplied by the user, whatever role it claims.
    UserClaimed,
}

/// One immutable block of interaction content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    role: LayerRole,
    content: String,
    provenance: Provenance,
    priority: u8,
    restates_history: bool,
}

impl Layer {
    fn build(role: LayerRole, content: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            role,
            content: content.into(),
            provenance,
            priority: role.priority(),
            restates_history: false,
        }
    }

    /// Trusted system layer.
    pub fn system(content: impl Into<String>) -> Self {
        Self::build(LayerRole::System, content, Provenance::Trusted)
    }

    /// Trusted application layer.
    pub fn application(content: impl Into<String>) -> Self {
        Self::build(LayerRole::Application, content, Provenance::Trusted)
    }

    /// User layer.
    pub fn user(content: impl Into<String>) -> Self {
        Self::build(LayerRole::User, content, Provenance::UserClaimed)
    }

    /// User-supplied text claiming `role`. Provenance stays `UserClaimed`.
    pub fn claimed(role: LayerRole, content: impl Into<String>) -> Self {
        Self::build(role, content, Provenance::UserClaimed)
    }

    /// Mark the layer as presenting earlier conversation turns.
    pub fn restating_history(mut self) -> Self {
        self.restates_history = true;
        self
    }

    pub fn role(&self) -> LayerRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn restates_history(&self) -> bool {
        self.restates_history
    }

    pub fn is_trusted(&self) -> bool {
        self.provenance == Provenance::Trusted
    }

    /// Content length in characters.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// The ordered layer sequence of one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    layers: Vec<Layer>,
}

impl Artifact {
    pub fn new(layers: Vec<Layer>) -> AyniResult<Self> {
        if layers.is_empty() {
            return Err(AyniError::Validation(
                "artifact must contain at least one layer".to_string(),
            ));
        }
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn snapshot(&self) -> ArtifactSnapshot {
        ArtifactSnapshot {
            layer_count: self.layers.len(),
            layers: self
                .layers
                .iter()
                .map(|l| LayerSummary {
                    role: l.role,
                    provenance: l.provenance,
                    chars: l.char_len(),
                })
                .collect(),
        }
    }
}

/// Content-free description of one layer, attached to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSummary {
    pub role: LayerRole,
    pub provenance: Provenance,
    pub chars: usize,
}

/// Structure of an artifact at the time of a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSnapshot {
    pub layer_count: usize,
    pub layers: Vec<LayerSummary>,
}
