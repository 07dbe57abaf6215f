//! Evidence to per-candidate confidence.
//!
//! Within a family, a candidate scores the heaviest supporting item plus a
//! small bonus per additional corroborating item, clamped to the family band.
//! Across families and external verdicts the maximum wins. Both reducers are
//! commutative, so scores never depend on evidence order.

use super::evidence::{CandidateKey, Category, EvidenceKind, EvidenceSet};
use serde::Serialize;
use std::collections::BTreeMap;

/// Two confidences closer than this are treated as a tie.
pub const TIE_EPSILON: f64 = 1e-9;

const DEFAULT_CORROBORATION_BONUS: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateScore {
    pub category: Category,
    pub name: String,
    /// Best score contributed by each heuristic family.
    pub families: BTreeMap<EvidenceKind, f64>,
    /// Accepted external score, if arbitration supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<f64>,
    pub confidence: f64,
}

impl CandidateScore {
    fn new(key: &CandidateKey) -> Self {
        Self {
            category: key.category,
            name: key.name.clone(),
            families: BTreeMap::new(),
            external: None,
            confidence: 0.0,
        }
    }

    pub fn key(&self) -> CandidateKey {
        CandidateKey::new(self.category, &self.name)
    }

    /// Highest family score, ignoring any external verdict.
    pub fn heuristic(&self) -> f64 {
        self.families.values().copied().fold(0.0, f64::max)
    }
}

/// Mutually exclusive candidates sharing the top score in one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contest {
    pub category: Category,
    pub candidates: Vec<String>,
    pub confidence: f64,
}

/// Candidate table combining contributions with the maximum reducer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandidateScores {
    entries: BTreeMap<CandidateKey, CandidateScore>,
}

impl CandidateScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: CandidateKey, family: EvidenceKind, score: f64) {
        let entry = self
            .entries
            .entry(key)
            .or_insert_with_key(CandidateScore::new);
        let slot = entry.families.entry(family).or_insert(score);
        *slot = slot.max(score);
        entry.confidence = entry.confidence.max(score);
    }

    pub fn record_external(&mut self, key: CandidateKey, score: f64) {
        let score = score.clamp(0.0, 1.0);
        let entry = self
            .entries
            .entry(key)
            .or_insert_with_key(CandidateScore::new);
        entry.external = Some(entry.external.map_or(score, |s| s.max(score)));
        entry.confidence = entry.confidence.max(score);
    }

    pub fn get(&self, key: &CandidateKey) -> Option<&CandidateScore> {
        self.entries.get(key)
    }

    pub fn confidence(&self, key: &CandidateKey) -> f64 {
        self.get(key).map(|s| s.confidence).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Candidates by category, then confidence descending, then name.
    pub fn ranked(&self) -> Vec<&CandidateScore> {
        let mut ranked: Vec<_> = self.entries.values().collect();
        ranked.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then(b.confidence.total_cmp(&a.confidence))
                .then(a.name.cmp(&b.name))
        });
        ranked
    }

    pub fn in_category(&self, category: Category) -> Vec<&CandidateScore> {
        self.ranked()
            .into_iter()
            .filter(|s| s.category == category)
            .collect()
    }

    /// Candidates at or above `threshold`, ranked.
    pub fn shortlist(&self, threshold: f64) -> Vec<&CandidateScore> {
        self.ranked()
            .into_iter()
            .filter(|s| s.confidence >= threshold)
            .collect()
    }

    pub fn is_shortlisted(&self, key: &CandidateKey, threshold: f64) -> bool {
        self.confidence(key) >= threshold
    }

    /// Top-score ties within exclusive categories.
    pub fn contests(&self) -> Vec<Contest> {
        Category::ALL
            .iter()
            .filter(|c| c.is_exclusive())
            .filter_map(|category| {
                let ranked = self.in_category(*category);
                let top = ranked.first()?.confidence;
                let tied: Vec<String> = ranked
                    .iter()
                    .take_while(|s| (top - s.confidence).abs() < TIE_EPSILON)
                    .map(|s| s.name.clone())
                    .collect();
                (top > 0.0 && tied.len() > 1).then(|| Contest {
                    category: *category,
                    candidates: tied,
                    confidence: top,
                })
            })
            .collect()
    }
}

/// Converts an evidence set into candidate scores.
#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    corroboration_bonus: f64,
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self {
            corroboration_bonus: DEFAULT_CORROBORATION_BONUS,
        }
    }
}

impl HeuristicScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_corroboration_bonus(mut self, bonus: f64) -> Self {
        self.corroboration_bonus = bonus.max(0.0);
        self
    }

    pub fn score(&self, evidence: &EvidenceSet) -> CandidateScores {
        // (max weight, item count) per candidate and family
        let mut tallies: BTreeMap<(CandidateKey, EvidenceKind), (f64, usize)> = BTreeMap::new();
        for item in &evidence.items {
            let tally = tallies.entry((item.key(), item.kind)).or_insert((0.0, 0));
            tally.0 = tally.0.max(item.weight);
            tally.1 += 1;
        }

        let mut scores = CandidateScores::new();
        for ((key, kind), (max_weight, count)) in tallies {
            let bonus = self.corroboration_bonus * (count.saturating_sub(1)) as f64;
            let family_score = kind.band().clamp(max_weight + bonus);
            scores.record(key, kind, family_score);
        }
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::evidence::EvidenceItem;

    fn item(kind: EvidenceKind, category: Category, subject: &str, path: &str, weight: f64) -> EvidenceItem {
        EvidenceItem {
            kind,
            category,
            subject: subject.to_string(),
            path: path.to_string(),
            weight,
        }
    }

    fn set(items: Vec<EvidenceItem>) -> EvidenceSet {
        let mut evidence = EvidenceSet::default();
        for i in items {
            evidence.push(i);
        }
        evidence
    }

    #[test]
    fn test_single_marker_keeps_its_weight() {
        let evidence = set(vec![item(
            EvidenceKind::Marker,
            Category::Language,
            "python",
            "requirements.txt",
            0.4,
        )]);

        let scores = HeuristicScorer::new().score(&evidence);
        let key = CandidateKey::new(Category::Language, "python");
        assert!((scores.confidence(&key) - 0.4).abs() < TIE_EPSILON);
    }

    #[test]
    fn test_corroboration_is_capped_at_band_max() {
        let evidence = set(
            (0..10)
                .map(|i| {
                    item(
                        EvidenceKind::Marker,
                        Category::Language,
                        "python",
                        &format!("svc{}/requirements.txt", i),
                        0.45,
                    )
                })
                .collect(),
        );

        let scores = HeuristicScorer::new().score(&evidence);
        let key = CandidateKey::new(Category::Language, "python");
        assert!((scores.confidence(&key) - 0.5).abs() < TIE_EPSILON);
    }

    #[test]
    fn test_families_combine_by_maximum() {
        let evidence = set(vec![
            item(EvidenceKind::Marker, Category::Framework, "django", "manage.py", 0.4),
            item(EvidenceKind::ContentMatch, Category::Framework, "django", "requirements.txt", 0.75),
        ]);

        let scores = HeuristicScorer::new().score(&evidence);
        let score = scores
            .get(&CandidateKey::new(Category::Framework, "django"))
            .unwrap();
        assert_eq!(score.families.len(), 2);
        assert!((score.confidence - 0.75).abs() < TIE_EPSILON);
        for family_score in score.families.values() {
            assert!(score.confidence >= *family_score);
        }
    }

    #[test]
    fn test_score_is_order_independent() {
        let items = vec![
            item(EvidenceKind::ContentMatch, Category::DataStore, "postgresql", "a.py", 0.6),
            item(EvidenceKind::ContentMatch, Category::DataStore, "postgresql", "b.py", 0.7),
            item(EvidenceKind::Marker, Category::Language, "python", "setup.py", 0.35),
            item(EvidenceKind::ContentMatch, Category::DataStore, "redis", "c.py", 0.6),
            item(EvidenceKind::Marker, Category::Language, "python", "requirements.txt", 0.4),
        ];
        let mut reversed = items.clone();
        reversed.reverse();
        let mut rotated = items.clone();
        rotated.rotate_left(2);

        let scorer = HeuristicScorer::new();
        let baseline = scorer.score(&set(items));
        assert_eq!(baseline, scorer.score(&set(reversed)));
        assert_eq!(baseline, scorer.score(&set(rotated)));
    }

    #[test]
    fn test_external_score_never_lowers_confidence() {
        let mut scores = CandidateScores::new();
        let key = CandidateKey::new(Category::DataStore, "mysql");
        scores.record(key.clone(), EvidenceKind::ContentMatch, 0.7);

        scores.record_external(key.clone(), 0.4);
        assert!((scores.confidence(&key) - 0.7).abs() < TIE_EPSILON);

        scores.record_external(key.clone(), 0.9);
        assert!((scores.confidence(&key) - 0.9).abs() < TIE_EPSILON);
        assert_eq!(scores.get(&key).unwrap().external, Some(0.9));
        assert!((scores.get(&key).unwrap().heuristic() - 0.7).abs() < TIE_EPSILON);
    }

    #[test]
    fn test_shortlist_and_ranking() {
        let mut scores = CandidateScores::new();
        scores.record(CandidateKey::new(Category::DataStore, "redis"), EvidenceKind::ContentMatch, 0.6);
        scores.record(CandidateKey::new(Category::DataStore, "postgresql"), EvidenceKind::ContentMatch, 0.7);
        scores.record(CandidateKey::new(Category::Language, "python"), EvidenceKind::Marker, 0.4);

        let shortlist: Vec<_> = scores.shortlist(0.5).iter().map(|s| s.name.clone()).collect();
        assert_eq!(shortlist, vec!["postgresql", "redis"]);

        let ranked: Vec<_> = scores.ranked().iter().map(|s| s.name.clone()).collect();
        assert_eq!(ranked, vec!["python", "postgresql", "redis"]);
    }

    #[test]
    fn test_tied_data_stores_are_contested() {
        let mut scores = CandidateScores::new();
        scores.record(CandidateKey::new(Category::DataStore, "mongodb"), EvidenceKind::ContentMatch, 0.7);
        scores.record(CandidateKey::new(Category::DataStore, "mysql"), EvidenceKind::ContentMatch, 0.7);
        scores.record(CandidateKey::new(Category::DataStore, "redis"), EvidenceKind::ContentMatch, 0.6);
        scores.record(CandidateKey::new(Category::Language, "go"), EvidenceKind::Marker, 0.5);
        scores.record(CandidateKey::new(Category::Language, "rust"), EvidenceKind::Marker, 0.5);

        let contests = scores.contests();
        assert_eq!(contests.len(), 1);
        assert_eq!(contests[0].category, Category::DataStore);
        assert_eq!(contests[0].candidates, vec!["mongodb", "mysql"]);
    }
}
