// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Trust Violations
// ─────────────────────────────────────────────────────────────────────
//! Categorical, non-compensable trust violations.
//!
//! Violations are never averaged, decayed or weighed against scores.
//! The tag set is open: tags this version does not know are kept
//! verbatim as [`TrustViolation::Unrecognized`] so nothing an oracle
//! flags is silently dropped.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bumped whenever a known violation tag is added or renamed.
pub const TRUST_VIOLATION_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TrustViolation {
    /// A lower-priority layer adopts the position of a higher-priority one.
    RoleConfusion,
    /// Low-priority volume overwhelms higher-priority intent.
    ContextSaturation,
    /// A layer claims elevated trust without structural justification.
    AuthorityMasquerade,
    /// A layer misrepresents conversation history it did not originate.
    ProvenanceForgery,
    /// Tag outside the known set, kept verbatim.
    Unrecognized(String),
}

impl TrustViolation {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "role_confusion" => Self::RoleConfusion,
            "context_saturation" => Self::ContextSaturation,
            "authority_masquerade" => Self::AuthorityMasquerade,
            "provenance_forgery" => Self::ProvenanceForgery,
            _ => Self::Unrecognized(tag.trim().to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            Self::RoleConfusion => "role_confusion",
            Self::ContextSaturation => "context_saturation",
            Self::AuthorityMasquerade => "authority_masquerade",
            Self::ProvenanceForgery => "provenance_forgery",
            Self::Unrecognized(tag) => tag,
        }
    }
}

impl fmt::Display for TrustViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl From<String> for TrustViolation {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<TrustViolation> for String {
    fn from(v: TrustViolation) -> Self {
        v.as_tag().to_string()
    }
}
