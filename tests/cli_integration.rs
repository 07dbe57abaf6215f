//! CLI integration tests
//!
//! Run the built binary against temporary projects and check exit codes,
//! stdout and the files it writes.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn stacksmith(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stacksmith"))
        .args(args)
        .env_remove("STACKSMITH_PROVIDER")
        .env_remove("STACKSMITH_DEFAULT_DATA_STORE")
        .env_remove("STACKSMITH_FEATURES")
        .env_remove("STACKSMITH_DB_PASSWORD")
        .env("STACKSMITH_LOG_LEVEL", "error")
        .output()
        .expect("Failed to run stacksmith")
}

fn create_express_repo(dir: &Path) {
    fs::write(
        dir.join("package.json"),
        r#"{"name": "shop", "dependencies": {"express": "^4.18.0", "pg": "^8.11.0"}}"#,
    )
    .unwrap();
    fs::write(
        dir.join("index.js"),
        "const pool = new Pool({ connectionString: 'postgresql://app:app@db:5432/shop' });\n",
    )
    .unwrap();
}

#[test]
fn test_cli_help() {
    let output = stacksmith(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("classify"));
    assert!(stdout.contains("assemble"));
    assert!(stdout.contains("adapters"));
}

#[test]
fn test_adapters_listing() {
    let output = stacksmith(&["adapters", "--format", "json"]);
    assert!(output.status.success());

    let adapters: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let kinds: Vec<&str> = adapters
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["kind"].as_str().unwrap())
        .collect();
    for kind in ["postgresql", "mongodb", "mysql", "clickhouse", "redis", "elasticsearch"] {
        assert!(kinds.contains(&kind), "{} missing from {:?}", kind, kinds);
    }
}

#[test]
fn test_classify_json() {
    let dir = TempDir::new().unwrap();
    create_express_repo(dir.path());

    let output = stacksmith(&["classify", dir.path().to_str().unwrap(), "--format", "json", "--no-llm"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let classification: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(classification["profile"]["source"], "heuristic-only");
    assert!(classification["profile"]["evidence_digest"].as_str().is_some());
}

#[test]
fn test_classify_missing_path_fails() {
    let output = stacksmith(&["classify", "/no/such/project", "--no-llm"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn test_assemble_unregistered_kind() {
    let dir = TempDir::new().unwrap();
    create_express_repo(dir.path());

    let output = stacksmith(&[
        "assemble",
        dir.path().to_str().unwrap(),
        "--kind",
        "cassandra",
        "--no-llm",
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not registered"));
}

#[test]
fn test_assemble_writes_compose_and_env_file() {
    let dir = TempDir::new().unwrap();
    create_express_repo(dir.path());
    let out = TempDir::new().unwrap();
    let compose_path = out.path().join("docker-compose.yml");
    let env_path = out.path().join(".env");

    let output = stacksmith(&[
        "assemble",
        dir.path().to_str().unwrap(),
        "--name",
        "shop",
        "--features",
        "cache",
        "--output",
        compose_path.to_str().unwrap(),
        "--env-file",
        env_path.to_str().unwrap(),
        "--no-llm",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let compose = fs::read_to_string(&compose_path).unwrap();
    assert!(compose.contains("primary-postgresql"));
    assert!(compose.contains("${POSTGRES_PASSWORD}"));

    let env = fs::read_to_string(&env_path).unwrap();
    assert!(env.contains("POSTGRES_PASSWORD="));
    assert!(env.contains("DATABASE_URL="));
}

#[test]
fn test_invalid_feature_is_usage_error() {
    let output = stacksmith(&["assemble", ".", "--features", "telemetry"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown feature 'telemetry'"));
}
