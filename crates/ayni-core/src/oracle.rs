// ─────────────────────────────────────────────────────────────────────
// Ayni Kernel — Evaluator Oracle Interface
// ─────────────────────────────────────────────────────────────────────
//! The remote judge each lens consults.
//!
//! Transport (HTTP, gRPC, a local model) lives behind this trait; the
//! kernel only sees the request it built and the reply text. Transport
//! failures come back as `LensError::Unavailable` and are never retried
//! here.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;

use ayni_types::{Artifact, LensError};

/// Reply from the oracle before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleReply {
    /// Free-form completion text expected to carry the JSON verdict.
    Completion(String),
    /// The oracle declined to evaluate.
    Refused(String),
}

/// One lens invocation: the full ordered artifact plus the lens instruction.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub lens_id: String,
    pub instruction: String,
    pub artifact: Arc<Artifact>,
}

/// JSON contract appended to every rendered prompt.
pub const RESPONSE_CONTRACT: &str = "\
Respond with a single JSON object and nothing else:
{\"truth\": <0..1>, \"indeterminacy\": <0..1>, \"falsehood\": <0..1>, \
\"reasoning\": \"<short rationale>\", \
\"exchange_type\": \"reciprocal|borderline|manipulative|extractive|generative\", \
\"violations\": [\"role_confusion\" | \"context_saturation\" | \"authority_masquerade\" | \"provenance_forgery\"]}
Truth, indeterminacy and falsehood are independent and need not sum to 1.";

impl OracleRequest {
    /// Canonical prompt text: instruction, tagged layers, response contract.
    ///
    /// Layers are fenced with their role, provenance and priority so the
    /// judge sees the same structure the trust field inspects.
    pub fn render_prompt(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.instruction);
        out.push_str("\n\n");
        for (i, layer) in self.artifact.layers().iter().enumerate() {
            let provenance = if layer.is_trusted() { "trusted" } else { "user_claimed" };
            let _ = writeln!(
                out,
                "<layer index=\"{i}\" role=\"{}\" provenance=\"{provenance}\" priority=\"{}\"{}>",
                layer.role().as_str(),
                layer.priority(),
                if layer.restates_history() { " restates_history=\"true\"" } else { "" },
            );
            out.push_str(layer.content());
            out.push_str("\n</layer>\n");
        }
        out.push('\n');
        out.push_str(RESPONSE_CONTRACT);
        out
    }
}

/// Trait for evaluator oracles.
#[async_trait]
pub trait EvaluatorOracle: Send + Sync {
    async fn evaluate(&self, request: &OracleRequest) -> Result<OracleReply, LensError>;
}

type OracleFn = Box<dyn Fn(&OracleRequest) -> Result<OracleReply, LensError> + Send + Sync>;

/// Oracle backed by a synchronous function.
///
/// Used by host integrations that already hold a blocking client, and
/// by tests to script per-lens replies.
pub struct ExternalOracle {
    reply_fn: OracleFn,
}

impl ExternalOracle {
    pub fn new(
        reply_fn: impl Fn(&OracleRequest) -> Result<OracleReply, LensError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            reply_fn: Box::new(reply_fn),
        }
    }
}

#[async_trait]
impl EvaluatorOracle for ExternalOracle {
    async fn evaluate(&self, request: &OracleRequest) -> Result<OracleReply, LensError> {
        (self.reply_fn)(request)
    }
}
