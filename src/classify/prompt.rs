use super::evidence::{Category, EvidenceSet};
use super::scorer::CandidateScores;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

pub const SYSTEM_PROMPT: &str = "You are a build and infrastructure analyst. You review \
heuristic evidence about a software project and confirm or refine which languages, \
frameworks, data stores, package managers, build tools and CI tools it uses. \
Only name technologies the evidence supports. Respond with JSON only.";

const MAX_PATHS_PER_CANDIDATE: usize = 3;
const MAX_EXTENSIONS: usize = 10;

/// One candidate named by the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictCandidate {
    pub category: Category,
    pub name: String,
    pub confidence: f64,
}

/// Parsed reasoning-service verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalVerdict {
    #[serde(default)]
    pub candidates: Vec<VerdictCandidate>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Renders the evidence summary and shortlist for the reasoning service.
pub fn build_prompt(evidence: &EvidenceSet, scores: &CandidateScores, threshold: f64) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Project scan: {} files walked, {} sampled, {} bytes read.",
        evidence.stats.files_seen, evidence.stats.files_sampled, evidence.stats.bytes_scanned
    );

    let top = evidence.stats.top_extensions(MAX_EXTENSIONS);
    if !top.is_empty() {
        let exts: Vec<String> = top.iter().map(|(ext, n)| format!(".{} ({})", ext, n)).collect();
        let _ = writeln!(prompt, "Most common file types: {}", exts.join(", "));
    }

    let _ = writeln!(prompt, "\nEvidence by candidate:");
    let mut grouped: BTreeMap<(Category, &str), Vec<String>> = BTreeMap::new();
    for item in &evidence.items {
        grouped
            .entry((item.category, item.subject.as_str()))
            .or_default()
            .push(format!("{} {} ({:.2})", item.kind, item.path, item.weight));
    }
    for ((category, subject), mut lines) in grouped {
        lines.sort();
        lines.dedup();
        let shown = lines.len().min(MAX_PATHS_PER_CANDIDATE);
        let more = lines.len() - shown;
        let _ = write!(prompt, "- {} {}: {}", category, subject, lines[..shown].join("; "));
        if more > 0 {
            let _ = write!(prompt, "; +{} more", more);
        }
        prompt.push('\n');
    }

    let _ = writeln!(prompt, "\nHeuristic shortlist (confidence >= {:.2}):", threshold);
    let shortlist = scores.shortlist(threshold);
    if shortlist.is_empty() {
        let _ = writeln!(prompt, "- (empty)");
    }
    for score in shortlist {
        let _ = writeln!(prompt, "- {} {}: {:.2}", score.category, score.name, score.confidence);
    }

    let _ = write!(
        prompt,
        "\nReturn a JSON object of the form:\n\
         {{\"candidates\": [{{\"category\": \"language|framework|data-store|package-manager|build-tool|ci-tool\", \
         \"name\": \"lowercase-name\", \"confidence\": 0.0}}], \"reasoning\": \"one paragraph\"}}\n\
         Use confidences between 0 and 1. Only include candidates backed by the evidence above.\n"
    );

    prompt
}

/// Strips a surrounding markdown code fence, if any.
pub fn extract_json_from_markdown(content: &str) -> &str {
    let trimmed = content.trim();

    if let Some(start_idx) = trimmed.find("```json") {
        let after_fence = &trimmed[start_idx + 7..];
        if let Some(end_idx) = after_fence.find("```") {
            return after_fence[..end_idx].trim();
        }
    }

    if let Some(start_idx) = trimmed.find("```") {
        let after_fence = &trimmed[start_idx + 3..];
        if let Some(end_idx) = after_fence.find("```") {
            return after_fence[..end_idx].trim();
        }
    }

    trimmed
}

pub fn parse_verdict(content: &str) -> Result<ExternalVerdict, serde_json::Error> {
    let mut verdict: ExternalVerdict = serde_json::from_str(extract_json_from_markdown(content))?;
    for candidate in &mut verdict.candidates {
        candidate.name = candidate.name.trim().to_lowercase();
    }
    Ok(verdict)
}
