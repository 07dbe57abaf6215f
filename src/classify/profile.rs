use super::evidence::Category;
use super::scorer::{CandidateScores, Contest, TIE_EPSILON};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileSource {
    HeuristicOnly,
    Arbitrated,
}

impl fmt::Display for ProfileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileSource::HeuristicOnly => write!(f, "heuristic-only"),
            ProfileSource::Arbitrated => write!(f, "arbitrated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileEntry {
    pub category: Category,
    pub name: String,
    pub confidence: f64,
}

/// Outcome of picking the primary data store from a profile.
#[derive(Debug, Clone, PartialEq)]
pub enum DataStoreSelection {
    Unique(String),
    Ambiguous(Vec<String>),
    None,
}

/// Final classification result consumed by the assembler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnologyProfile {
    /// Ranked by category, then confidence descending.
    pub entries: Vec<ProfileEntry>,
    pub rationale: String,
    /// Mean of the top confidence in each populated category.
    pub confidence: f64,
    pub source: ProfileSource,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contested: Vec<Contest>,
    pub evidence_digest: String,
}

impl TechnologyProfile {
    pub fn from_scores(
        scores: &CandidateScores,
        source: ProfileSource,
        rationale: String,
        evidence_digest: String,
    ) -> Self {
        let entries: Vec<ProfileEntry> = scores
            .ranked()
            .into_iter()
            .filter(|s| s.confidence > 0.0)
            .map(|s| ProfileEntry {
                category: s.category,
                name: s.name.clone(),
                confidence: s.confidence,
            })
            .collect();

        let tops: Vec<f64> = Category::ALL
            .iter()
            .filter_map(|c| entries.iter().find(|e| e.category == *c).map(|e| e.confidence))
            .collect();
        let confidence = if tops.is_empty() {
            0.0
        } else {
            tops.iter().sum::<f64>() / tops.len() as f64
        };

        Self {
            entries,
            rationale,
            confidence,
            source,
            contested: scores.contests(),
            evidence_digest,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_for(&self, category: Category) -> impl Iterator<Item = &ProfileEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    /// Highest-confidence entry in `category`.
    pub fn top(&self, category: Category) -> Option<&ProfileEntry> {
        self.entries_for(category).next()
    }

    pub fn confidence_of(&self, category: Category, name: &str) -> f64 {
        let name = name.to_lowercase();
        self.entries_for(category)
            .find(|e| e.name == name)
            .map(|e| e.confidence)
            .unwrap_or(0.0)
    }

    /// Primary data store at or above `threshold`. Top-score ties are
    /// reported rather than broken.
    pub fn data_store_selection(&self, threshold: f64) -> DataStoreSelection {
        let eligible: Vec<&ProfileEntry> = self
            .entries_for(Category::DataStore)
            .filter(|e| e.confidence >= threshold)
            .collect();

        let Some(first) = eligible.first() else {
            return DataStoreSelection::None;
        };

        let tied: Vec<String> = eligible
            .iter()
            .take_while(|e| (first.confidence - e.confidence).abs() < TIE_EPSILON)
            .map(|e| e.name.clone())
            .collect();

        if tied.len() > 1 {
            DataStoreSelection::Ambiguous(tied)
        } else {
            DataStoreSelection::Unique(first.name.clone())
        }
    }
}
