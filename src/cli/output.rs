//! Output formatting for profiles, topologies and the adapter listing
//!
//! JSON and YAML are meant for machines, `Human` for terminals. Topologies
//! additionally render as a compose file.

use anyhow::{bail, Context, Result};
use serde::Serialize;

use super::commands::{ManifestFormatArg, ProfileFormatArg};
use crate::classify::{Category, Classification, TechnologyProfile};
use crate::output::{render_compose, Manifest};
use crate::stack::{AdapterRegistry, DataStoreAdapter, DataStoreKind, Topology, VectorCapability};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
    /// Compose file; topologies only.
    Compose,
}

impl From<ProfileFormatArg> for OutputFormat {
    fn from(arg: ProfileFormatArg) -> Self {
        match arg {
            ProfileFormatArg::Json => OutputFormat::Json,
            ProfileFormatArg::Yaml => OutputFormat::Yaml,
            ProfileFormatArg::Human => OutputFormat::Human,
        }
    }
}

impl From<ManifestFormatArg> for OutputFormat {
    fn from(arg: ManifestFormatArg) -> Self {
        match arg {
            ManifestFormatArg::Compose => OutputFormat::Compose,
            ManifestFormatArg::Json => OutputFormat::Json,
            ManifestFormatArg::Human => OutputFormat::Human,
        }
    }
}

/// One row of the `adapters` listing.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterSummary {
    pub kind: DataStoreKind,
    pub default_port: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_ports: Vec<u16>,
    pub image: String,
    pub vector: VectorCapability,
}

impl AdapterSummary {
    pub fn of(adapter: &dyn DataStoreAdapter) -> Self {
        Self {
            kind: adapter.kind(),
            default_port: adapter.default_port(),
            extra_ports: adapter.extra_ports(),
            image: adapter.default_image().to_string(),
            vector: adapter.vector_capability(),
        }
    }

    pub fn list(registry: &AdapterRegistry) -> Vec<Self> {
        registry
            .adapters()
            .iter()
            .map(|adapter| Self::of(adapter.as_ref()))
            .collect()
    }
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_classification(&self, classification: &Classification) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(classification)
                .context("Failed to serialize classification to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(classification)
                .context("Failed to serialize classification to YAML"),
            OutputFormat::Human => Ok(self.classification_human(classification)),
            OutputFormat::Compose => bail!("compose output is only available for topologies"),
        }
    }

    pub fn format_topology(&self, topology: &Topology, profile: Option<&TechnologyProfile>) -> Result<String> {
        match self.format {
            OutputFormat::Compose => render_compose(topology).context("Failed to render compose file"),
            OutputFormat::Json => Manifest::new(topology, profile)
                .to_json()
                .context("Failed to serialize manifest to JSON"),
            OutputFormat::Yaml => serde_yaml::to_string(&Manifest::new(topology, profile))
                .context("Failed to serialize manifest to YAML"),
            OutputFormat::Human => Ok(self.topology_human(topology)),
        }
    }

    pub fn format_adapters(&self, adapters: &[AdapterSummary]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(adapters).context("Failed to serialize adapters to JSON")
            }
            OutputFormat::Yaml => serde_yaml::to_string(adapters).context("Failed to serialize adapters to YAML"),
            OutputFormat::Human | OutputFormat::Compose => Ok(self.adapters_human(adapters)),
        }
    }

    fn classification_human(&self, classification: &Classification) -> String {
        let profile = &classification.profile;
        let mut output = String::new();

        if profile.is_empty() {
            output.push_str("\u{26A0} Technology Profile (nothing detected)\n");
        } else {
            output.push_str(&format!("\u{2713} Technology Profile ({})\n", profile.source));
        }
        output.push_str(RULE);
        output.push_str("\n\n");

        for category in Category::ALL {
            let entries: Vec<_> = profile.entries_for(category).collect();
            if entries.is_empty() {
                continue;
            }
            output.push_str(&format!("{}:\n", category));
            for (i, entry) in entries.iter().enumerate() {
                let connector = if i + 1 == entries.len() { "\u{2514}" } else { "\u{251C}" };
                output.push_str(&format!(
                    "{}\u{2500} {:<20} {:.2}\n",
                    connector, entry.name, entry.confidence
                ));
            }
            output.push('\n');
        }

        output.push_str(&format!("Confidence: {}\n", confidence_bar(profile.confidence)));
        output.push_str(&format!("Rationale: {}\n", profile.rationale));

        if !profile.contested.is_empty() {
            output.push_str("\nTied candidates:\n");
            for contest in &profile.contested {
                output.push_str(&format!(
                    "  - {}: {} at {:.2}\n",
                    contest.category,
                    contest.candidates.join(", "),
                    contest.confidence
                ));
            }
        }

        if !classification.warnings.is_empty() {
            output.push_str("\n\u{26A0} Warnings:\n");
            for warning in &classification.warnings {
                output.push_str(&format!("  - {}\n", warning));
            }
        }

        output.push_str(&format!("\nEvidence digest: {}\n", profile.evidence_digest));
        output
    }

    fn topology_human(&self, topology: &Topology) -> String {
        let connection = &topology.connection;
        let mut output = format!("\u{2713} Stack Topology: {}\n", topology.project_name);
        output.push_str(RULE);
        output.push_str("\n\n");

        output.push_str(&format!(
            "Data Store:   {} ({:?})\n",
            topology.kind, topology.kind_source
        ));
        output.push_str(&format!(
            "Connection:   {}://{}:{}/{} (tls {})\n",
            connection.scheme,
            connection.host,
            connection.port,
            connection.database,
            if connection.tls { "on" } else { "off" }
        ));
        output.push_str(&format!("Vector:       {}\n", topology.vector));
        output.push_str(&format!("Features:     {}\n", topology.features));
        output.push_str(&format!("Tier:         {}\n", topology.tier));
        output.push_str(&format!("Scale:        {}\n\n", topology.scale));

        output.push_str("Services:\n");
        for (i, service) in topology.services.iter().enumerate() {
            let connector = if i + 1 == topology.services.len() { "\u{2514}" } else { "\u{251C}" };
            let ports: Vec<String> = service.ports.iter().map(|p| p.to_string()).collect();
            output.push_str(&format!(
                "{}\u{2500} {:<20} {:<45} {}\n",
                connector,
                service.name,
                service.image,
                ports.join(", ")
            ));
            if !service.depends_on.is_empty() {
                output.push_str(&format!("     depends on: {}\n", service.depends_on.join(", ")));
            }
        }

        let secrets: Vec<&str> = topology.secrets().into_keys().collect();
        if !secrets.is_empty() {
            output.push_str(&format!(
                "\nSecrets: {} (values are written to the env file only)\n",
                secrets.join(", ")
            ));
        }
        output
    }

    fn adapters_human(&self, adapters: &[AdapterSummary]) -> String {
        let mut output = String::from("Registered data-store adapters\n");
        output.push_str(RULE);
        output.push_str("\n\n");
        for adapter in adapters {
            let mut ports = adapter.default_port.to_string();
            for extra in &adapter.extra_ports {
                ports.push_str(&format!(",{}", extra));
            }
            output.push_str(&format!(
                "{:<15} {:<11} {:<55} vector: {}\n",
                adapter.kind.as_str(),
                ports,
                adapter.image,
                adapter.vector
            ));
        }
        output
    }
}

fn confidence_bar(confidence: f64) -> String {
    let clamped = confidence.clamp(0.0, 1.0);
    let filled = (clamped * 10.0) as usize;
    format!(
        "{}{} {}%",
        "\u{2588}".repeat(filled),
        "\u{2591}".repeat(10 - filled),
        (clamped * 100.0).round() as u8
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Classifier, ScanConfig};
    use crate::stack::{AssemblyOptions, StackAssembler};
    use std::sync::Arc;

    async fn classification() -> Classification {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"dependencies": {"express": "^4.18.0"}}"#).unwrap();
        Classifier::new(ScanConfig::default(), 0.5)
            .classify(dir.path())
            .await
            .unwrap()
    }

    fn topology() -> Topology {
        StackAssembler::new(Arc::new(AdapterRegistry::with_defaults()))
            .assemble(None, &AssemblyOptions::default())
            .unwrap()
    }

    #[tokio::test]
    async fn test_classification_formats() {
        let classification = classification().await;

        let json = OutputFormatter::new(OutputFormat::Json)
            .format_classification(&classification)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["profile"]["source"], "heuristic-only");

        let yaml = OutputFormatter::new(OutputFormat::Yaml)
            .format_classification(&classification)
            .unwrap();
        assert!(yaml.contains("heuristic-only"));

        let human = OutputFormatter::new(OutputFormat::Human)
            .format_classification(&classification)
            .unwrap();
        assert!(human.contains("Technology Profile (heuristic-only)"));
        assert!(human.contains("express"));
        assert!(human.contains("Evidence digest:"));

        assert!(OutputFormatter::new(OutputFormat::Compose)
            .format_classification(&classification)
            .is_err());
    }

    #[test]
    fn test_topology_human_hides_secret_values() {
        let topology = topology();
        let human = OutputFormatter::new(OutputFormat::Human)
            .format_topology(&topology, None)
            .unwrap();

        assert!(human.contains("primary-postgresql"));
        assert!(human.contains("postgresql://primary-postgresql:5432/app"));
        assert!(human.contains("DATABASE_URL"));
        for (_, value) in topology.secrets() {
            assert!(!human.contains(value.expose()));
        }
    }

    #[test]
    fn test_topology_compose_and_json() {
        let topology = topology();
        let compose = OutputFormatter::new(OutputFormat::Compose)
            .format_topology(&topology, None)
            .unwrap();
        assert!(compose.contains("services:"));

        let json = OutputFormatter::new(OutputFormat::Json)
            .format_topology(&topology, None)
            .unwrap();
        assert!(json.contains("\"generated_at\""));
    }

    #[test]
    fn test_adapter_listing() {
        let registry = AdapterRegistry::with_defaults();
        let adapters = AdapterSummary::list(&registry);
        assert_eq!(adapters.len(), 6);

        let human = OutputFormatter::new(OutputFormat::Human)
            .format_adapters(&adapters)
            .unwrap();
        assert!(human.contains("clickhouse"));
        assert!(human.contains("8123,9000"));
        assert!(human.contains("pgvector/pgvector:pg16"));
    }

    #[test]
    fn test_confidence_bar() {
        assert_eq!(confidence_bar(0.5), "\u{2588}\u{2588}\u{2588}\u{2588}\u{2588}\u{2591}\u{2591}\u{2591}\u{2591}\u{2591} 50%");
        assert!(confidence_bar(1.7).ends_with("100%"));
    }
}
