//! Raw evidence produced by the signal collector.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// What kind of technology a candidate is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Language,
    Framework,
    #[serde(alias = "database", alias = "datastore", alias = "data_store")]
    DataStore,
    #[serde(alias = "package_manager")]
    PackageManager,
    #[serde(alias = "build_tool", alias = "build-system")]
    BuildTool,
    #[serde(alias = "ci_tool", alias = "ci")]
    CiTool,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Language,
        Category::Framework,
        Category::DataStore,
        Category::PackageManager,
        Category::BuildTool,
        Category::CiTool,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Language => "language",
            Category::Framework => "framework",
            Category::DataStore => "data-store",
            Category::PackageManager => "package-manager",
            Category::BuildTool => "build-tool",
            Category::CiTool => "ci-tool",
        }
    }

    /// Categories where a project is expected to settle on a single candidate.
    pub fn is_exclusive(&self) -> bool {
        matches!(self, Category::DataStore)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a candidate technology.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateKey {
    pub category: Category,
    pub name: String,
}

impl CandidateKey {
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into().to_lowercase(),
        }
    }
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.category, self.name)
    }
}

/// Closed confidence interval a rule family may produce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceBand {
    pub min: f64,
    pub max: f64,
}

impl ConfidenceBand {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Rule family that produced an evidence item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvidenceKind {
    Marker,
    ContentMatch,
    DirectoryShape,
}

impl EvidenceKind {
    pub const fn band(&self) -> ConfidenceBand {
        match self {
            EvidenceKind::Marker => ConfidenceBand { min: 0.3, max: 0.5 },
            EvidenceKind::ContentMatch => ConfidenceBand {
                min: 0.5,
                max: 0.75,
            },
            EvidenceKind::DirectoryShape => ConfidenceBand { min: 0.2, max: 0.4 },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::Marker => "marker",
            EvidenceKind::ContentMatch => "content-match",
            EvidenceKind::DirectoryShape => "directory-shape",
        }
    }
}

impl fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of raw observation about project contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub kind: EvidenceKind,
    pub category: Category,
    pub subject: String,
    /// Path relative to the scanned root, `/`-separated.
    pub path: String,
    pub weight: f64,
}

impl EvidenceItem {
    pub fn key(&self) -> CandidateKey {
        CandidateKey::new(self.category, &self.subject)
    }

    fn digest_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{:.4}",
            self.kind, self.category, self.subject, self.path, self.weight
        )
    }
}

/// Soft failures recorded while collecting evidence. Never fatal.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CollectionWarning {
    #[error("skipped unreadable file {}: {message}", path.display())]
    Unreadable { path: PathBuf, message: String },

    #[error("skipped non UTF-8 file {}", path.display())]
    NotUtf8 { path: PathBuf },

    #[error("byte budget of {budget} bytes exhausted, {skipped} files not sampled")]
    ByteBudgetExhausted { budget: usize, skipped: usize },

    #[error("file limit of {limit} reached, walk stopped early")]
    FileLimitReached { limit: usize },

    #[error("directory walk error: {message}")]
    Walk { message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanStats {
    pub files_seen: usize,
    pub files_sampled: usize,
    pub bytes_scanned: usize,
    /// File count per lowercase extension, over every file walked.
    pub extensions: BTreeMap<String, usize>,
}

impl ScanStats {
    /// Most common extensions, highest count first.
    pub fn top_extensions(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut exts: Vec<_> = self
            .extensions
            .iter()
            .map(|(ext, count)| (ext.as_str(), *count))
            .collect();
        exts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        exts.truncate(limit);
        exts
    }
}

/// Everything the collector observed during one classification run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvidenceSet {
    pub items: Vec<EvidenceItem>,
    pub warnings: Vec<CollectionWarning>,
    pub stats: ScanStats,
}

impl EvidenceSet {
    pub fn push(&mut self, item: EvidenceItem) {
        self.items.push(item);
    }

    pub fn warn(&mut self, warning: CollectionWarning) {
        self.warnings.push(warning);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether any raw observation supports `key`, regardless of weight.
    pub fn has_raw(&self, key: &CandidateKey) -> bool {
        self.items.iter().any(|item| item.key() == *key)
    }

    pub fn for_candidate<'a>(
        &'a self,
        key: &'a CandidateKey,
    ) -> impl Iterator<Item = &'a EvidenceItem> + 'a {
        self.items.iter().filter(move |item| item.key() == *key)
    }

    /// SHA-256 over the sorted evidence multiset.
    ///
    /// Independent of collection order, so two runs over unchanged inputs
    /// yield the same digest.
    pub fn digest(&self) -> String {
        let mut lines: Vec<String> = self.items.iter().map(EvidenceItem::digest_line).collect();
        lines.sort();

        let mut hasher = Sha256::new();
        for line in &lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}
