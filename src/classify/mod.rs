//! Technology classification.
//!
//! A classification run walks a project directory, records weighted
//! evidence, scores candidate technologies and optionally asks an external
//! reasoning service to confirm the shortlist. The heuristic result is always
//! available; arbitration can only raise confidence.

pub mod arbitration;
pub mod catalog;
pub mod collector;
pub mod evidence;
pub mod manifests;
pub mod profile;
pub mod prompt;
pub mod scorer;

pub use arbitration::{ArbitrationConfig, ArbitrationUnavailable, Arbiter, Reconciliation};
pub use catalog::SignalCatalog;
pub use collector::{ScanConfig, SignalCollector};
pub use evidence::{CandidateKey, Category, CollectionWarning, EvidenceKind, EvidenceSet};
pub use profile::{DataStoreSelection, ProfileEntry, ProfileSource, TechnologyProfile};
pub use scorer::{CandidateScores, HeuristicScorer};

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot read project root {}: {message}", path.display())]
    Walk { path: PathBuf, message: String },
}

/// Non-fatal problem attached to a classification.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "source", content = "detail", rename_all = "kebab-case")]
pub enum ClassificationWarning {
    #[error(transparent)]
    Collection(CollectionWarning),

    #[error(transparent)]
    Arbitration(ArbitrationUnavailable),
}

/// A profile plus the warnings gathered while producing it.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub profile: TechnologyProfile,
    pub warnings: Vec<ClassificationWarning>,
}

pub struct Classifier {
    collector: SignalCollector,
    scorer: HeuristicScorer,
    arbiter: Option<Arbiter>,
    threshold: f64,
}

impl Classifier {
    pub fn new(scan: ScanConfig, threshold: f64) -> Self {
        Self {
            collector: SignalCollector::new(Arc::new(SignalCatalog::with_defaults())).with_config(scan),
            scorer: HeuristicScorer::new(),
            arbiter: None,
            threshold,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<SignalCatalog>) -> Self {
        let config = self.collector.config().clone();
        self.collector = SignalCollector::new(catalog).with_config(config);
        self
    }

    pub fn with_arbiter(mut self, arbiter: Arbiter) -> Self {
        self.arbiter = Some(arbiter);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn has_arbiter(&self) -> bool {
        self.arbiter.is_some()
    }

    /// Collects evidence only, for callers that want the raw observations.
    pub fn collect(&self, root: &Path) -> Result<EvidenceSet, ClassifyError> {
        self.collector.collect(root)
    }

    pub async fn classify(&self, root: &Path) -> Result<Classification, ClassifyError> {
        let start = Instant::now();
        let evidence = self.collector.collect(root)?;
        let scores = self.scorer.score(&evidence);
        let digest = evidence.digest();

        let mut warnings: Vec<ClassificationWarning> = evidence
            .warnings
            .iter()
            .cloned()
            .map(ClassificationWarning::Collection)
            .collect();

        let profile = match &self.arbiter {
            Some(arbiter) if !scores.is_empty() => match arbiter.arbitrate(&evidence, &scores).await {
                Ok(reconciliation) => {
                    let rationale = reconciliation
                        .reasoning
                        .clone()
                        .unwrap_or_else(|| heuristic_rationale(&scores, self.threshold));
                    TechnologyProfile::from_scores(
                        &reconciliation.scores,
                        ProfileSource::Arbitrated,
                        rationale,
                        digest,
                    )
                }
                Err(e) => {
                    warn!(error = %e, "Arbitration unavailable, using heuristic ranking");
                    warnings.push(ClassificationWarning::Arbitration(e));
                    heuristic_profile(&scores, self.threshold, digest)
                }
            },
            _ => heuristic_profile(&scores, self.threshold, digest),
        };

        info!(
            path = %root.display(),
            entries = profile.entries.len(),
            source = %profile.source,
            confidence = profile.confidence,
            warnings = warnings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Classification completed"
        );

        Ok(Classification { profile, warnings })
    }
}

fn heuristic_profile(scores: &CandidateScores, threshold: f64, digest: String) -> TechnologyProfile {
    TechnologyProfile::from_scores(
        scores,
        ProfileSource::HeuristicOnly,
        heuristic_rationale(scores, threshold),
        digest,
    )
}

fn heuristic_rationale(scores: &CandidateScores, threshold: f64) -> String {
    let shortlist = scores.shortlist(threshold);
    if scores.is_empty() {
        return "No technology signals found.".to_string();
    }
    if shortlist.is_empty() {
        return format!("No candidate reached confidence {:.2}.", threshold);
    }
    let names: Vec<String> = shortlist
        .iter()
        .map(|s| format!("{} {} ({:.2})", s.category, s.name, s.confidence))
        .collect();
    format!("Heuristic evidence supports {}.", names.join(", "))
}
