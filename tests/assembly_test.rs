//! Assembling topologies from classified projects.

use stacksmith::classify::{Classifier, ScanConfig};
use stacksmith::stack::{
    AdapterRegistry, AssemblyError, AssemblyOptions, DataStoreConfig, DataStoreKind, FeatureSet, KindSource,
    RegistryError, Scale, StackAssembler, Tier, TopologyViolation,
};
use stacksmith::output::{render_compose, render_env_file};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use yare::parameterized;

fn assembler() -> StackAssembler {
    StackAssembler::new(Arc::new(AdapterRegistry::with_defaults()))
}

async fn classify(files: &[(&str, &str)]) -> stacksmith::TechnologyProfile {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(dir.path().join(name), content).unwrap();
    }
    Classifier::new(ScanConfig::default(), 0.5)
        .classify(dir.path())
        .await
        .unwrap()
        .profile
}

#[test]
fn test_unregistered_override_produces_no_topology() {
    let options = AssemblyOptions::default().with_kind(DataStoreKind::parse("cassandra"));
    let result = assembler().assemble(None, &options);

    let err = result.unwrap_err();
    assert!(err.is_kind_not_found());
    match err {
        AssemblyError::Registry(RegistryError::KindNotFound { kind, .. }) => assert_eq!(kind, "cassandra"),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_primary_port_colliding_with_search() {
    let options = AssemblyOptions {
        data_store: DataStoreConfig {
            port: 7700,
            ..DataStoreConfig::default()
        },
        ..AssemblyOptions::default()
    };

    let err = assembler().assemble(None, &options).unwrap_err();
    match &err {
        AssemblyError::Topology(topology) => {
            assert_eq!(
                topology.violations,
                vec![TopologyViolation::PortCollision {
                    port: 7700,
                    services: vec!["primary-postgresql".to_string(), "search".to_string()],
                }]
            );
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(
        err.to_string(),
        "inconsistent topology: port 7700 claimed by two services (primary-postgresql, search)"
    );

    // without search the same port is free
    let options = AssemblyOptions {
        features: FeatureSet::parse("cache").unwrap(),
        ..options
    };
    let topology = assembler().assemble(None, &options).unwrap();
    assert_eq!(topology.primary().unwrap().ports[0].host, Some(7700));
    // in-network clients still reach the container port
    assert!(topology.connection.url.expose().contains("@primary-postgresql:5432/app"));
}

#[tokio::test]
async fn test_classified_project_drives_selection() {
    let profile = classify(&[
        ("requirements.txt", "flask\npymongo\n"),
        ("app.py", "client = MongoClient('mongodb://db:27017/app')\n"),
    ])
    .await;

    let topology = assembler().assemble(Some(&profile), &AssemblyOptions::default()).unwrap();
    assert_eq!(topology.kind, DataStoreKind::MongoDb);
    assert_eq!(topology.kind_source, KindSource::Profile);
    assert_eq!(topology.connection.scheme, "mongodb");
    assert_eq!(topology.service("app").unwrap().image, "python:3.11-slim");

    let options = AssemblyOptions::default().with_kind(DataStoreKind::MySql);
    let topology = assembler().assemble(Some(&profile), &options).unwrap();
    assert_eq!(topology.kind, DataStoreKind::MySql);
    assert_eq!(topology.kind_source, KindSource::Override);
}

#[tokio::test]
async fn test_tied_profile_needs_explicit_kind() {
    let profile = classify(&[
        ("a.py", "PRIMARY = 'postgresql://u:p@db/app'\n"),
        ("b.py", "SECONDARY = 'mysql://u:p@db/app'\n"),
    ])
    .await;

    match assembler().assemble(Some(&profile), &AssemblyOptions::default()) {
        Err(AssemblyError::AmbiguousDataStore { candidates }) => {
            assert_eq!(candidates, vec!["mysql", "postgresql"]);
        }
        other => panic!("expected ambiguity, got {:?}", other.map(|t| t.kind)),
    }

    let options = AssemblyOptions::default().with_kind(DataStoreKind::PostgreSql);
    assert!(assembler().assemble(Some(&profile), &options).is_ok());
}

#[test]
fn test_production_stack_renders() {
    let options = AssemblyOptions {
        project_name: "shop".to_string(),
        ..AssemblyOptions::default()
            .with_features(FeatureSet::all())
            .with_tier(Tier::Production)
            .with_scale(Scale::Medium)
    };
    let topology = assembler().assemble(None, &options).unwrap();

    let compose = render_compose(&topology).unwrap();
    let parsed: serde_yaml::Value = serde_yaml::from_str(&compose).unwrap();
    assert_eq!(parsed["name"], "shop");
    assert_eq!(parsed["services"]["app"]["deploy"]["replicas"], 3);
    assert_eq!(parsed["services"]["grafana"]["ports"][0], "3001:3000");
    assert_eq!(parsed["services"]["gitea"]["ports"][0], "3002:3000");

    let env = render_env_file(&topology);
    for name in topology.secrets().keys() {
        assert!(env.contains(&format!("{}=", name)), "{} missing from env file", name);
        assert!(!compose.contains(topology.secrets()[name].expose()));
    }
}

#[parameterized(
    development = { Tier::Development, 1, "8080:8080" },
    staging = { Tier::Staging, 2, "8080" },
    production = { Tier::Production, 3, "8080" },
)]
fn test_replicated_app_publishes_no_host_port(tier: Tier, replicas: u64, port: &str) {
    let topology = assembler()
        .assemble(None, &AssemblyOptions::default().with_tier(tier))
        .unwrap();

    let compose = render_compose(&topology).unwrap();
    let parsed: serde_yaml::Value = serde_yaml::from_str(&compose).unwrap();
    let app = &parsed["services"]["app"];
    assert_eq!(app["deploy"]["replicas"].as_u64(), Some(replicas));
    assert_eq!(app["ports"][0].as_str(), Some(port));
    // single-instance services keep their host bindings
    assert_eq!(parsed["services"]["search"]["ports"][0].as_str(), Some("7700:7700"));
}
