use super::catalog::{self, ContentScope, ShapePattern, SignalCatalog, EXCLUDED_DIRS};
use super::evidence::{CollectionWarning, EvidenceItem, EvidenceKind, EvidenceSet};
use super::manifests::{self, ManifestFormat};
use super::ClassifyError;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Walk and sampling limits for one collection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub max_depth: usize,
    pub max_files: usize,
    /// Total bytes read across all sampled files.
    pub byte_budget: usize,
    /// Bytes read from the head of any single file.
    pub max_file_bytes: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_files: 5000,
            byte_budget: 4 * 1024 * 1024,
            max_file_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SampleKind {
    Manifest,
    Compose,
    Source,
}

#[derive(Debug)]
struct SampleCandidate {
    kind: SampleKind,
    depth: usize,
    rel_path: String,
    abs_path: PathBuf,
    manifest: Option<ManifestFormat>,
}

/// Walks a project tree and turns what it sees into evidence.
///
/// Reads only; unreadable or undecodable files become soft warnings.
pub struct SignalCollector {
    catalog: Arc<SignalCatalog>,
    config: ScanConfig,
}

impl SignalCollector {
    pub fn new(catalog: Arc<SignalCatalog>) -> Self {
        Self {
            catalog,
            config: ScanConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn collect(&self, root: &Path) -> Result<EvidenceSet, ClassifyError> {
        if !root.exists() {
            return Err(ClassifyError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ClassifyError::NotADirectory(root.to_path_buf()));
        }
        std::fs::read_dir(root).map_err(|e| ClassifyError::Walk {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;

        let start = Instant::now();
        info!(
            repo = %root.display(),
            max_depth = self.config.max_depth,
            max_files = self.config.max_files,
            byte_budget = self.config.byte_budget,
            "Collecting evidence"
        );

        let mut evidence = EvidenceSet::default();
        let mut samples = Vec::new();
        let mut directories = BTreeSet::new();

        let walker = WalkBuilder::new(root)
            .max_depth(Some(self.config.max_depth))
            .hidden(false)
            .git_ignore(true)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(|entry| {
                let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
                !(is_dir
                    && entry.depth() > 0
                    && entry
                        .file_name()
                        .to_str()
                        .map(|name| EXCLUDED_DIRS.contains(&name))
                        .unwrap_or(false))
            })
            .build();

        for result in walker {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "Failed to read directory entry");
                    evidence.warn(CollectionWarning::Walk {
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let rel_path = relative_path(root, entry.path());
            let Some(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                directories.insert(rel_path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            if evidence.stats.files_seen >= self.config.max_files {
                warn!(
                    files_seen = evidence.stats.files_seen,
                    max_files = self.config.max_files,
                    "Reached file limit, stopping walk"
                );
                evidence.warn(CollectionWarning::FileLimitReached {
                    limit: self.config.max_files,
                });
                break;
            }
            evidence.stats.files_seen += 1;

            let file_name = entry.file_name().to_string_lossy().to_string();
            let extension = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase());

            if let Some(ext) = &extension {
                *evidence.stats.extensions.entry(ext.clone()).or_insert(0) += 1;
            }

            for rule in self.catalog.markers_for(&file_name) {
                evidence.push(EvidenceItem {
                    kind: EvidenceKind::Marker,
                    category: rule.category,
                    subject: rule.subject.to_string(),
                    path: rel_path.clone(),
                    weight: rule.weight,
                });
            }

            let manifest = ManifestFormat::from_file_name(&file_name);
            let kind = if manifest.is_some() {
                Some(SampleKind::Manifest)
            } else if catalog::is_compose_file(&file_name) {
                Some(SampleKind::Compose)
            } else if extension.as_deref().map(catalog::is_source_extension).unwrap_or(false) {
                Some(SampleKind::Source)
            } else {
                None
            };

            if let Some(kind) = kind {
                samples.push(SampleCandidate {
                    kind,
                    depth: entry.depth(),
                    rel_path,
                    abs_path: entry.path().to_path_buf(),
                    manifest,
                });
            }
        }

        self.apply_shape_rules(&directories, &mut evidence);
        self.sample_contents(samples, &mut evidence);

        info!(
            items = evidence.items.len(),
            files_seen = evidence.stats.files_seen,
            files_sampled = evidence.stats.files_sampled,
            bytes_scanned = evidence.stats.bytes_scanned,
            warnings = evidence.warnings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Evidence collection completed"
        );

        Ok(evidence)
    }

    fn apply_shape_rules(&self, directories: &BTreeSet<String>, evidence: &mut EvidenceSet) {
        for rule in &self.catalog.shapes {
            let path = match rule.pattern {
                ShapePattern::Directory(dir) if directories.contains(dir) => dir.to_string(),
                ShapePattern::ExtensionCensus {
                    extension,
                    min_files,
                } if evidence.stats.extensions.get(extension).copied().unwrap_or(0)
                    >= min_files =>
                {
                    format!("**/*.{}", extension)
                }
                _ => continue,
            };

            evidence.push(EvidenceItem {
                kind: EvidenceKind::DirectoryShape,
                category: rule.category,
                subject: rule.subject.to_string(),
                path,
                weight: rule.weight,
            });
        }
    }

    /// Reads candidates in priority order (manifests, compose files, shallow
    /// sources first) until the byte budget runs out.
    fn sample_contents(&self, mut samples: Vec<SampleCandidate>, evidence: &mut EvidenceSet) {
        samples.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then(a.depth.cmp(&b.depth))
                .then(a.rel_path.cmp(&b.rel_path))
        });

        let mut skipped = 0usize;

        for sample in &samples {
            let remaining = self
                .config
                .byte_budget
                .saturating_sub(evidence.stats.bytes_scanned);
            if remaining == 0 {
                skipped += 1;
                continue;
            }

            let limit = remaining.min(self.config.max_file_bytes);
            let bytes = match read_head(&sample.abs_path, limit) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %sample.rel_path, error = %e, "Skipping unreadable file");
                    evidence.warn(CollectionWarning::Unreadable {
                        path: PathBuf::from(&sample.rel_path),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            evidence.stats.bytes_scanned += bytes.len();

            let Some(text) = decode_utf8(&bytes) else {
                debug!(path = %sample.rel_path, "Skipping non UTF-8 file");
                evidence.warn(CollectionWarning::NotUtf8 {
                    path: PathBuf::from(&sample.rel_path),
                });
                continue;
            };

            evidence.stats.files_sampled += 1;
            self.match_content(sample, text, evidence);
        }

        if skipped > 0 {
            warn!(
                skipped,
                byte_budget = self.config.byte_budget,
                "Byte budget exhausted before all files were sampled"
            );
            evidence.warn(CollectionWarning::ByteBudgetExhausted {
                budget: self.config.byte_budget,
                skipped,
            });
        }
    }

    fn match_content(&self, sample: &SampleCandidate, text: &str, evidence: &mut EvidenceSet) {
        if let Some(format) = sample.manifest {
            match manifests::dependency_names(format, text) {
                Some(names) => {
                    for name in &names {
                        for rule in self.catalog.dependency_rules_for(name) {
                            evidence.push(EvidenceItem {
                                kind: EvidenceKind::ContentMatch,
                                category: rule.category,
                                subject: rule.subject.to_string(),
                                path: sample.rel_path.clone(),
                                weight: rule.weight,
                            });
                        }
                    }
                }
                None => debug!(path = %sample.rel_path, "Manifest did not parse, using text rules only"),
            }
        }

        for rule in &self.catalog.content {
            let in_scope = match rule.scope {
                ContentScope::Any => true,
                ContentScope::Compose => sample.kind == SampleKind::Compose,
                ContentScope::Source => sample.kind == SampleKind::Source,
            };
            if in_scope && rule.pattern.is_match(text) {
                evidence.push(EvidenceItem {
                    kind: EvidenceKind::ContentMatch,
                    category: rule.category,
                    subject: rule.subject.to_string(),
                    path: sample.rel_path.clone(),
                    weight: rule.weight,
                });
            }
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_head(path: &Path, limit: usize) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut buffer = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Accepts a clean UTF-8 prefix cut mid-character by the read limit.
fn decode_utf8(bytes: &[u8]) -> Option<&str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&bytes[..e.valid_up_to()]).ok(),
        Err(_) => None,
    }
}
