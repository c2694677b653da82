//! BMI rater endpoints.
//!
//! - `GET/POST /` — local BMI calculation from `input_cm` / `input_kg`
//! - `GET/POST /proxy_example` — same inputs, rated by the third-party
//!   mainframe API and unwrapped from its nested response shape
//!
//! Both respond with the fixed rater field descriptor plus a `calculation`
//! object, so form-rendering clients can treat them identically.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use rater_core::bmi;
use rater_core::config::MainframeConfig;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

#[derive(Clone)]
pub struct RaterState {
    mainframe_base_url: String,
    client: Client,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("mainframe returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("mainframe response missing `human.on_earth.BMI`")]
    MissingPath,
    #[error("mainframe transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub input: bool,
    pub output: bool,
}

#[derive(Debug, Serialize)]
pub struct RaterResponse {
    pub fields: Vec<FieldDescriptor>,
    pub calculation: Value,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

fn rater_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor { name: "input_cm", label: "CM", input: true, output: false },
        FieldDescriptor { name: "input_kg", label: "KG", input: true, output: false },
        FieldDescriptor { name: "output_BMI", label: "BMI", input: false, output: true },
    ]
}

fn read_inputs(body: &Value) -> (f64, f64) {
    let input_cm = bmi::numeric_field(body.get("input_cm"));
    let input_kg = bmi::numeric_field(body.get("input_kg"));
    (input_cm, input_kg)
}

/// Request body for the mainframe rating call. Inputs are truncated to whole
/// units before conversion, matching the upstream contract.
fn mainframe_request(input_cm: f64, input_kg: f64) -> Value {
    json!({
        "nested_object": {
            "another_nested_object": {
                "meters": (input_cm as i64) as f64 / 100.0,
                "grams": (input_kg as i64) * 1000,
            }
        }
    })
}

fn extract_mainframe_bmi(payload: &Value) -> Result<f64, UpstreamError> {
    payload
        .pointer("/human/on_earth/BMI")
        .and_then(Value::as_f64)
        .ok_or(UpstreamError::MissingPath)
}

pub fn router(config: &MainframeConfig) -> Router {
    let state = RaterState {
        mainframe_base_url: config.base_url.trim_end_matches('/').to_string(),
        client: Client::new(),
    };

    Router::new()
        .route("/", get(rater_descriptor).post(rate))
        .route("/proxy_example", get(proxy_descriptor).post(proxy_rate))
        .with_state(state)
}

pub async fn rater_descriptor() -> Json<RaterResponse> {
    Json(RaterResponse { fields: rater_fields(), calculation: json!({ "output_BMI": 0.0 }) })
}

pub async fn rate(Json(body): Json<Value>) -> Json<RaterResponse> {
    let (input_cm, input_kg) = read_inputs(&body);
    let output_bmi = bmi::bmi(input_cm, input_kg);

    Json(RaterResponse {
        fields: rater_fields(),
        calculation: json!({ "output_BMI": output_bmi }),
    })
}

pub async fn proxy_descriptor() -> Json<RaterResponse> {
    Json(RaterResponse { fields: rater_fields(), calculation: json!({}) })
}

pub async fn proxy_rate(
    State(state): State<RaterState>,
    Json(body): Json<Value>,
) -> Result<Json<RaterResponse>, (StatusCode, Json<ApiError>)> {
    let (input_cm, input_kg) = read_inputs(&body);

    let output_bmi =
        fetch_mainframe_bmi(&state, input_cm, input_kg).await.map_err(|error| {
            warn!(event_name = "rater.mainframe_failed", error = %error, "mainframe rating failed");
            (StatusCode::BAD_GATEWAY, Json(ApiError { error: error.to_string() }))
        })?;

    Ok(Json(RaterResponse {
        fields: rater_fields(),
        calculation: json!({ "output_BMI": output_bmi }),
    }))
}

async fn fetch_mainframe_bmi(
    state: &RaterState,
    input_cm: f64,
    input_kg: f64,
) -> Result<f64, UpstreamError> {
    let response = state
        .client
        .post(&state.mainframe_base_url)
        .json(&mainframe_request(input_cm, input_kg))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status { status: status.as_u16(), body });
    }

    let payload: Value = response.json().await?;
    extract_mainframe_bmi(&payload)
}
