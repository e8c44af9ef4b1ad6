//! Integration tests for the full request pipeline over a real listener.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use drug_interaction_api::config::Config;
use drug_interaction_api::inference::engine::ModelHandle;
use drug_interaction_api::server::{build_router, AppState};

/// Start a server on an ephemeral port and return its base URL.
async fn spawn_server(config: Config, model: ModelHandle) -> String {
    let state = Arc::new(AppState::new(Arc::new(config), model).unwrap());
    let app = build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn test_sample_queries_over_http() {
    let base = spawn_server(Config::default(), ModelHandle::new()).await;

    let body: Value = reqwest::get(format!("{base}/api/sample_queries"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["complex_examples"][1]["age"], 65);
}

#[tokio::test]
async fn test_missing_model_file_reports_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.model.model_path = dir.path().join("absent.gguf");

    let model = ModelHandle::new();
    let base = spawn_server(config.clone(), model.clone()).await;
    assert!(model.load(config.model.clone()).await.is_err());

    let client = reqwest::Client::new();
    let health: Value = client
        .get(format!("{base}/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["model_loaded"], false);
    assert_eq!(health["status"], "unavailable");

    let response = client
        .post(format!("{base}/api/simple_interaction"))
        .json(&json!({"drug1": "warfarin", "drug2": "aspirin"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
}

/// Loads a placeholder file, which only the stub backend accepts.
#[cfg(not(feature = "llama"))]
#[tokio::test]
async fn test_full_pipeline_with_stub_backend() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("medical-mixtral-q4.gguf");
    std::fs::write(&model_path, b"GGUF").unwrap();

    let mut config = Config::default();
    config.model.model_path = model_path;
    config.server.inference_timeout_secs = 30;

    let model = ModelHandle::new();
    model.set_loading().await;
    let base = spawn_server(config.clone(), model.clone()).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{base}/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["model_loaded"], false);

    model.load(config.model.clone()).await.unwrap();

    let health: Value = client
        .get(format!("{base}/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["model_loaded"], true);
    assert_eq!(health["inference_engine"], "stub");
    assert_eq!(health["quantization"], "Q4");

    let response = tokio::time::timeout(
        Duration::from_secs(30),
        client
            .post(format!("{base}/api/simple_interaction"))
            .json(&json!({"drug1": "warfarin", "drug2": "aspirin"}))
            .send(),
    )
    .await
    .expect("simple interaction timed out")
    .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert!(!body["analysis"].as_str().unwrap().is_empty());
    assert!(body["sections"]["mechanism"].is_string());

    let response = client
        .post(format!("{base}/api/complex_interaction"))
        .json(&json!({
            "medications": ["metformin", "glipizide"],
            "age": 65,
            "conditions": ["type 2 diabetes"],
            "lab_values": {"HbA1c": "8.2%"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    // 2 * 1.5 + 6.5 - 5 = 4.5
    assert_eq!(body["risk_score"], 4.5);
    assert_eq!(body["risk_level"], "Moderate");
}
