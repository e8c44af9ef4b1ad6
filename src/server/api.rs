//! Drug-interaction HTTP API.
//!
//! - POST /api/simple_interaction
//! - POST /api/complex_interaction
//! - GET /api/health
//! - GET /api/sample_queries
//! - GET /metrics
//! - GET / (frontend)

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::{
    self, CaseSections, InteractionSections, RiskLevel, Severity,
};
use crate::inference::engine::{GenerationOutput, GenerationRequest};
use crate::prompt;
use crate::query::{ComplexCaseQuery, SimpleInteractionQuery};
use crate::samples::{self, SampleQueries};
use crate::server::error::ApiError;
use crate::server::AppState;

const FRONTEND_MISSING: &str = "<h1>Frontend not found. Check container build.</h1>";

// ─── Response Types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl From<&GenerationOutput> for Usage {
    fn from(out: &GenerationOutput) -> Self {
        Self {
            prompt_tokens: out.prompt_tokens,
            completion_tokens: out.completion_tokens,
            total_tokens: out.prompt_tokens + out.completion_tokens,
        }
    }
}

/// Two-drug interaction response.
#[derive(Debug, Serialize)]
pub struct SimpleInteractionResponse {
    pub success: bool,
    pub request_id: String,
    pub drug1: String,
    pub drug2: String,
    /// Model output as free text.
    pub analysis: String,
    pub severity: Option<Severity>,
    pub sections: InteractionSections,
    /// Seconds spent in inference.
    pub inference_time: f64,
    pub complexity_level: &'static str,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct PatientSummary {
    pub medications: Vec<String>,
    pub age: u32,
    pub conditions: Vec<String>,
}

/// Patient-case response.
#[derive(Debug, Serialize)]
pub struct ComplexInteractionResponse {
    pub success: bool,
    pub request_id: String,
    pub patient_summary: PatientSummary,
    pub analysis: String,
    pub sections: CaseSections,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub inference_time: f64,
    pub complexity_level: &'static str,
    pub usage: Usage,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub model_type: String,
    pub inference_engine: String,
    pub model_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub uptime_secs: u64,
    pub version: &'static str,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

fn round2(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

/// Engine name reported before a backend has been loaded.
fn configured_engine() -> &'static str {
    if cfg!(feature = "llama") {
        "llama.cpp"
    } else {
        "stub"
    }
}

/// Record the outcome of an interaction request.
fn record<T>(state: &AppState, endpoint: &str, result: &Result<T, ApiError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    state.metrics.observe_request(endpoint, outcome);
    if let Err(e) = result {
        match e {
            ApiError::Validation(_) => warn!(endpoint, "Rejected request: {e}"),
            _ => error!(endpoint, "Request failed: {e}"),
        }
    }
}

pub async fn simple_interaction(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SimpleInteractionQuery>, JsonRejection>,
) -> Result<Json<SimpleInteractionResponse>, ApiError> {
    let result = run_simple(&state, payload).await;
    record(&state, "simple_interaction", &result);
    result.map(Json)
}

async fn run_simple(
    state: &AppState,
    payload: Result<Json<SimpleInteractionQuery>, JsonRejection>,
) -> Result<SimpleInteractionResponse, ApiError> {
    let Json(query) = payload?;
    let query = query.validate()?;
    let request_id = Uuid::new_v4().to_string();

    info!(
        request_id = request_id,
        drug1 = query.drug1,
        drug2 = query.drug2,
        "Simple interaction request"
    );

    let output = state
        .engine
        .generate(GenerationRequest {
            request_id: request_id.clone(),
            prompt: prompt::simple_prompt(&query),
            params: state.config.generation.simple.clone(),
        })
        .await?;
    state
        .metrics
        .observe_inference("simple_interaction", output.elapsed.as_secs_f64());

    let sections = analysis::interaction_sections(&output.text);
    let severity = sections
        .severity
        .as_deref()
        .and_then(analysis::extract_severity);

    Ok(SimpleInteractionResponse {
        success: true,
        request_id,
        drug1: query.drug1,
        drug2: query.drug2,
        severity,
        sections,
        inference_time: round2(output.elapsed.as_secs_f64()),
        complexity_level: "simple",
        usage: Usage::from(&output),
        analysis: output.text,
    })
}

pub async fn complex_interaction(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ComplexCaseQuery>, JsonRejection>,
) -> Result<Json<ComplexInteractionResponse>, ApiError> {
    let result = run_complex(&state, payload).await;
    record(&state, "complex_interaction", &result);
    result.map(Json)
}

async fn run_complex(
    state: &AppState,
    payload: Result<Json<ComplexCaseQuery>, JsonRejection>,
) -> Result<ComplexInteractionResponse, ApiError> {
    let Json(query) = payload?;
    let query = query.validate()?;
    let request_id = Uuid::new_v4().to_string();

    info!(
        request_id = request_id,
        medications = query.medications.len(),
        age = query.age,
        conditions = query.conditions.len(),
        "Complex interaction request"
    );

    let output = state
        .engine
        .generate(GenerationRequest {
            request_id: request_id.clone(),
            prompt: prompt::complex_prompt(&query),
            params: state.config.generation.complex.clone(),
        })
        .await?;
    state
        .metrics
        .observe_inference("complex_interaction", output.elapsed.as_secs_f64());

    let risk = analysis::estimate_risk(query.medications.len(), query.age);

    Ok(ComplexInteractionResponse {
        success: true,
        request_id,
        sections: analysis::case_sections(&output.text),
        risk_score: risk.score,
        risk_level: risk.level,
        inference_time: round2(output.elapsed.as_secs_f64()),
        complexity_level: "complex",
        usage: Usage::from(&output),
        analysis: output.text,
        patient_summary: PatientSummary {
            medications: query.medications,
            age: query.age,
            conditions: query.conditions,
        },
    })
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = state.engine.model().status().await;
    state.metrics.set_model_loaded(status.loaded);

    Json(HealthResponse {
        status: status.status,
        model_loaded: status.loaded,
        model_type: state.config.model.model_type.clone(),
        inference_engine: status
            .engine
            .unwrap_or_else(|| configured_engine().to_string()),
        model_path: state.config.model.model_path.display().to_string(),
        quantization: status.metadata.map(|m| m.quantization),
        error: status.error,
        uptime_secs: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn sample_queries() -> Json<SampleQueries> {
    Json(samples::sample_queries())
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let loaded = state.engine.model().status().await.loaded;
    state.metrics.set_model_loaded(loaded);

    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let path = state.config.frontend.dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => (StatusCode::OK, Html(page)),
        Err(e) => {
            warn!(path = %path.display(), "Frontend not found: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(FRONTEND_MISSING.to_string()))
        }
    }
}
