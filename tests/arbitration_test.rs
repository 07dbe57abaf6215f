//! Arbitration against a scripted reasoning service.

use stacksmith::classify::{
    ArbitrationConfig, Arbiter, Category, ClassificationWarning, Classifier, ProfileSource, ScanConfig,
};
use stacksmith::llm::{BackendError, MockLLMClient, MockResponse};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("requirements.txt"), "flask\npymongo\n").unwrap();
    fs::write(
        dir.path().join("app.py"),
        "from pymongo import MongoClient\nclient = MongoClient('mongodb://db:27017/app')\n",
    )
    .unwrap();
    dir
}

fn classifier(client: Arc<MockLLMClient>, timeout: Duration) -> Classifier {
    let arbiter = Arbiter::new(
        client,
        ArbitrationConfig {
            timeout,
            retry_backoff: Duration::from_millis(5),
            ..ArbitrationConfig::default()
        },
    );
    Classifier::new(ScanConfig::default(), 0.5).with_arbiter(arbiter)
}

async fn baseline(dir: &TempDir) -> stacksmith::TechnologyProfile {
    Classifier::new(ScanConfig::default(), 0.5)
        .classify(dir.path())
        .await
        .unwrap()
        .profile
}

#[tokio::test]
async fn test_timed_out_service_matches_heuristic_profile() {
    let dir = project();
    let client = Arc::new(MockLLMClient::new());
    client.add_responses(vec![
        MockResponse::text("{}").delayed(Duration::from_millis(500)),
        MockResponse::text("{}").delayed(Duration::from_millis(500)),
    ]);

    let classification = classifier(client.clone(), Duration::from_millis(20))
        .classify(dir.path())
        .await
        .unwrap();

    assert_eq!(classification.profile, baseline(&dir).await);
    assert_eq!(client.call_count(), 2);
    assert!(classification
        .warnings
        .iter()
        .any(|w| matches!(w, ClassificationWarning::Arbitration(_))));
}

#[tokio::test]
async fn test_transient_failure_then_verdict() {
    let dir = project();
    let client = Arc::new(MockLLMClient::new());
    client.add_responses(vec![
        MockResponse::error(BackendError::TimeoutError { seconds: 1 }),
        MockResponse::text(
            "```json\n{\"candidates\": [{\"category\": \"framework\", \"name\": \"flask\", \"confidence\": 0.95}], \"reasoning\": \"flask app\"}\n```",
        ),
    ]);

    let profile = classifier(client.clone(), Duration::from_secs(1))
        .classify(dir.path())
        .await
        .unwrap()
        .profile;

    assert_eq!(client.call_count(), 2);
    assert_eq!(profile.source, ProfileSource::Arbitrated);
    assert!((profile.confidence_of(Category::Framework, "flask") - 0.95).abs() < 1e-9);
}

#[tokio::test]
async fn test_lower_external_score_never_lowers_confidence() {
    let dir = project();
    let heuristic = baseline(&dir).await;
    let before = heuristic.confidence_of(Category::DataStore, "mongodb");
    assert!(before >= 0.5);

    let client = Arc::new(MockLLMClient::new());
    client.add_response(MockResponse::text(
        r#"{"candidates": [{"category": "data-store", "name": "mongodb", "confidence": 0.1}], "reasoning": "unsure"}"#,
    ));

    let profile = classifier(client, Duration::from_secs(1))
        .classify(dir.path())
        .await
        .unwrap()
        .profile;

    assert!((profile.confidence_of(Category::DataStore, "mongodb") - before).abs() < 1e-9);
}

#[tokio::test]
async fn test_unsupported_candidate_is_rejected() {
    let dir = project();
    let client = Arc::new(MockLLMClient::new());
    client.add_response(MockResponse::text(
        r#"{"candidates": [{"category": "data-store", "name": "cassandra", "confidence": 0.99}], "reasoning": "guess"}"#,
    ));

    let profile = classifier(client, Duration::from_secs(1))
        .classify(dir.path())
        .await
        .unwrap()
        .profile;

    assert_eq!(profile.confidence_of(Category::DataStore, "cassandra"), 0.0);
    assert_eq!(profile.top(Category::DataStore).unwrap().name, "mongodb");
}

#[tokio::test]
async fn test_garbage_response_falls_back_without_retry() {
    let dir = project();
    let client = Arc::new(MockLLMClient::new());
    client.add_responses(vec![
        MockResponse::text("I think it is probably MongoDB."),
        MockResponse::text("{}"),
    ]);

    let classification = classifier(client.clone(), Duration::from_secs(1))
        .classify(dir.path())
        .await
        .unwrap();

    assert_eq!(client.call_count(), 1);
    assert_eq!(classification.profile, baseline(&dir).await);
}
