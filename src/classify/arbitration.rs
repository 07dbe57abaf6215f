//! Optional reconciliation with an external reasoning service.
//!
//! The service only ever raises confidence: an accepted verdict entry is
//! merged with the maximum reducer, and a failed call leaves the heuristic
//! scores untouched.

use super::evidence::{CandidateKey, EvidenceSet};
use super::prompt::{self, ExternalVerdict, SYSTEM_PROMPT};
use super::scorer::CandidateScores;
use crate::heuristics::HeuristicLogger;
use crate::llm::{BackendError, ChatMessage, LLMClient, LLMRequest};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

const ARBITRATION_PHASE: &str = "arbitration";

#[derive(Debug, Clone)]
pub struct ArbitrationConfig {
    pub timeout: Duration,
    /// Delay before the single retry.
    pub retry_backoff: Duration,
    pub threshold: f64,
    pub max_tokens: u32,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_backoff: Duration::from_millis(500),
            threshold: 0.5,
            max_tokens: 1024,
        }
    }
}

/// The reasoning service could not produce a usable verdict. Non-fatal.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ArbitrationUnavailable {
    #[error("arbitration timed out after {timeout_ms}ms ({attempts} attempts)")]
    Timeout { timeout_ms: u64, attempts: u32 },

    #[error("arbitration service failed after {attempts} attempts: {source}")]
    Backend {
        attempts: u32,
        #[source]
        source: BackendError,
    },

    #[error("arbitration response could not be parsed: {message}")]
    Unparsable { message: String },
}

/// Why a verdict entry was ignored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedCandidate {
    pub key: CandidateKey,
    pub confidence: f64,
}

/// Result of merging a verdict into heuristic scores.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub scores: CandidateScores,
    pub accepted: Vec<CandidateKey>,
    pub rejected: Vec<RejectedCandidate>,
    pub reasoning: Option<String>,
}

/// Merges an external verdict into the heuristic scores.
///
/// A verdict entry is accepted when its candidate is already on the
/// heuristic shortlist, or when raw evidence supports it even though its
/// heuristic score is below `threshold`. Accepted entries raise confidence to
/// the maximum of the heuristic and external scores.
pub fn reconcile(
    scores: &CandidateScores,
    evidence: &EvidenceSet,
    verdict: ExternalVerdict,
    threshold: f64,
) -> Reconciliation {
    let mut merged = scores.clone();
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for candidate in verdict.candidates {
        let key = CandidateKey::new(candidate.category, &candidate.name);
        let confidence = if candidate.confidence.is_finite() {
            candidate.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        if scores.is_shortlisted(&key, threshold) || evidence.has_raw(&key) {
            merged.record_external(key.clone(), confidence);
            accepted.push(key);
        } else {
            debug!(candidate = %key, confidence, "Rejecting unsupported external candidate");
            rejected.push(RejectedCandidate { key, confidence });
        }
    }

    Reconciliation {
        scores: merged,
        accepted,
        rejected,
        reasoning: verdict.reasoning.filter(|r| !r.trim().is_empty()),
    }
}

/// Consults the reasoning service with a timeout and one retry.
pub struct Arbiter {
    client: Arc<dyn LLMClient>,
    config: ArbitrationConfig,
    logger: Arc<HeuristicLogger>,
}

impl Arbiter {
    pub fn new(client: Arc<dyn LLMClient>, config: ArbitrationConfig) -> Self {
        Self {
            client,
            config,
            logger: Arc::new(HeuristicLogger::disabled()),
        }
    }

    pub fn with_logger(mut self, logger: Arc<HeuristicLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &ArbitrationConfig {
        &self.config
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    /// Requests a verdict. Transport failures and timeouts are retried once
    /// after the configured backoff; an unparsable answer is not retried.
    pub async fn request_verdict(
        &self,
        evidence: &EvidenceSet,
        scores: &CandidateScores,
    ) -> Result<ExternalVerdict, ArbitrationUnavailable> {
        let request = LLMRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(prompt::build_prompt(evidence, scores, self.config.threshold)),
        ])
        .with_temperature(0.1)
        .with_max_tokens(self.config.max_tokens);

        let mut attempts = 0u32;
        let response = loop {
            attempts += 1;
            let start = Instant::now();

            let failure = match tokio::time::timeout(self.config.timeout, self.client.chat(request.clone())).await {
                Ok(Ok(response)) => {
                    self.logger.log_phase(
                        ARBITRATION_PHASE,
                        &request,
                        &response,
                        start.elapsed().as_millis() as u64,
                    );
                    break response;
                }
                Ok(Err(e)) if attempts < 2 && e.is_transient() => {
                    warn!(client = self.client.name(), error = %e, "Arbitration attempt failed, retrying");
                    None
                }
                Ok(Err(e)) => Some(ArbitrationUnavailable::Backend {
                    attempts,
                    source: e,
                }),
                Err(_) if attempts < 2 => {
                    warn!(
                        client = self.client.name(),
                        timeout_ms = self.config.timeout.as_millis() as u64,
                        "Arbitration attempt timed out, retrying"
                    );
                    None
                }
                Err(_) => Some(ArbitrationUnavailable::Timeout {
                    timeout_ms: self.config.timeout.as_millis() as u64,
                    attempts,
                }),
            };

            match failure {
                Some(err) => return Err(err),
                None => tokio::time::sleep(self.config.retry_backoff).await,
            }
        };

        prompt::parse_verdict(&response.content).map_err(|e| ArbitrationUnavailable::Unparsable {
            message: e.to_string(),
        })
    }

    /// Runs arbitration end to end, returning `Err` when the heuristic
    /// ranking must be used unchanged.
    pub async fn arbitrate(
        &self,
        evidence: &EvidenceSet,
        scores: &CandidateScores,
    ) -> Result<Reconciliation, ArbitrationUnavailable> {
        let verdict = self.request_verdict(evidence, scores).await?;
        let reconciliation = reconcile(scores, evidence, verdict, self.config.threshold);

        info!(
            client = self.client.name(),
            accepted = reconciliation.accepted.len(),
            rejected = reconciliation.rejected.len(),
            "Arbitration completed"
        );

        Ok(reconciliation)
    }
}
