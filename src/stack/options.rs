//! Options threaded through one assembly run.

use super::adapter::DataStoreConfig;
use super::service::ResourceHints;
use super::DataStoreKind;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Cache,
    Search,
    Monitoring,
    Ci,
}

impl Feature {
    pub const ALL: [Feature; 4] = [Feature::Cache, Feature::Search, Feature::Monitoring, Feature::Ci];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Cache => "cache",
            Feature::Search => "search",
            Feature::Monitoring => "monitoring",
            Feature::Ci => "ci",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enabled cross-cutting services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeSet<Feature>);

impl FeatureSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Feature::ALL.into_iter().collect()
    }

    /// Parses a comma-separated list such as `cache,search`. Blank input
    /// yields the empty set.
    pub fn parse(list: &str) -> Result<Self, String> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Feature::from_str(s, true).map_err(|_| format!("unknown feature '{}'", s)))
            .collect()
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0.contains(&feature)
    }

    pub fn insert(&mut self, feature: Feature) {
        self.0.insert(feature);
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.0.iter().map(Feature::as_str).collect();
        f.write_str(&names.join(","))
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    #[value(alias = "dev")]
    Development,
    Staging,
    #[value(alias = "prod")]
    Production,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Development => "development",
            Tier::Staging => "staging",
            Tier::Production => "production",
        }
    }

    /// Application replicas for this tier.
    pub fn replicas(&self) -> u32 {
        match self {
            Tier::Development => 1,
            Tier::Staging => 2,
            Tier::Production => 3,
        }
    }

    pub fn restart_policy(&self) -> &'static str {
        match self {
            Tier::Production => "always",
            _ => "unless-stopped",
        }
    }

    pub fn log_level(&self) -> &'static str {
        match self {
            Tier::Development => "debug",
            Tier::Staging | Tier::Production => "info",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Small,
    #[default]
    Medium,
    Large,
}

impl Scale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scale::Small => "small",
            Scale::Medium => "medium",
            Scale::Large => "large",
        }
    }

    /// Resource hints at this scale. Only magnitudes change with scale.
    pub fn resource_hints(&self, replicas: u32) -> ResourceHints {
        let (cpu_request, memory_request, cpu_limit, memory_limit, workers) = match self {
            Scale::Small => ("100m", "128Mi", "500m", "512Mi", 1),
            Scale::Medium => ("250m", "256Mi", "1000m", "1Gi", 2),
            Scale::Large => ("500m", "512Mi", "2000m", "2Gi", 4),
        };
        ResourceHints {
            cpu_request: cpu_request.to_string(),
            memory_request: memory_request.to_string(),
            cpu_limit: cpu_limit.to_string(),
            memory_limit: memory_limit.to_string(),
            replicas,
            workers,
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the assembler needs besides the profile.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyOptions {
    /// Explicit data-store kind; bypasses profile-based selection.
    pub kind_override: Option<DataStoreKind>,
    pub features: FeatureSet,
    pub tier: Tier,
    pub scale: Scale,
    pub data_store: DataStoreConfig,
    pub project_name: String,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            kind_override: None,
            features: [Feature::Cache, Feature::Search].into_iter().collect(),
            tier: Tier::default(),
            scale: Scale::default(),
            data_store: DataStoreConfig::default(),
            project_name: "app".to_string(),
        }
    }
}

impl AssemblyOptions {
    pub fn with_kind(mut self, kind: DataStoreKind) -> Self {
        self.kind_override = Some(kind);
        self
    }

    pub fn with_features(mut self, features: FeatureSet) -> Self {
        self.features = features;
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_list_parsing() {
        let set = FeatureSet::parse(" cache, Monitoring ,,").unwrap();
        assert!(set.contains(Feature::Cache));
        assert!(set.contains(Feature::Monitoring));
        assert!(!set.contains(Feature::Search));
        assert_eq!(set.to_string(), "cache,monitoring");

        assert!(FeatureSet::parse("").unwrap().is_empty());
        assert_eq!(FeatureSet::parse("cache,telemetry").unwrap_err(), "unknown feature 'telemetry'");
    }

    #[test]
    fn test_tier_aliases_and_replicas() {
        assert_eq!(Tier::from_str("prod", true).unwrap(), Tier::Production);
        assert_eq!(Tier::from_str("dev", true).unwrap(), Tier::Development);
        assert_eq!(Tier::Production.replicas(), 3);
        assert_eq!(Tier::Staging.replicas(), 2);
        assert_eq!(Tier::Production.restart_policy(), "always");
    }

    #[test]
    fn test_scale_changes_magnitudes_only() {
        let small = Scale::Small.resource_hints(1);
        let large = Scale::Large.resource_hints(1);
        assert_eq!(small.cpu_request, "100m");
        assert_eq!(large.memory_limit, "2Gi");
        assert_eq!(small.replicas, large.replicas);
    }

    #[test]
    fn test_default_options() {
        let options = AssemblyOptions::default();
        assert_eq!(options.features.to_string(), "cache,search");
        assert_eq!(options.tier, Tier::Development);
        assert_eq!(options.scale, Scale::Medium);
        assert!(options.kind_override.is_none());
    }
}
