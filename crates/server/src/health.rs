//! Liveness and diagnostics endpoints.
//!
//! `/hey` is the operator debug endpoint. It reports which configuration
//! concerns are populated as booleans only; it must never echo environment
//! variables, secrets, or config values.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use rater_core::config::AppConfig;
use secrecy::ExposeSecret;
use serde::Serialize;

#[derive(Clone)]
pub struct DiagnosticsState {
    presence: ConfigPresence,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ConfigPresence {
    pub protosure_host: bool,
    pub protosure_credentials: bool,
    pub widget_ids: bool,
    pub alerts: bool,
    pub mainframe: bool,
}

impl ConfigPresence {
    pub fn from_config(config: &AppConfig) -> Self {
        let protosure = &config.protosure;
        Self {
            protosure_host: !protosure.host.trim().is_empty(),
            protosure_credentials: !protosure.email.trim().is_empty()
                && !protosure.password.expose_secret().is_empty(),
            widget_ids: !protosure.address_widget_id.trim().is_empty()
                && !protosure.first_name_widget_id.trim().is_empty()
                && !protosure.last_name_widget_id.trim().is_empty(),
            alerts: config.alerts.enabled && !config.alerts.recipient.trim().is_empty(),
            mainframe: !config.mainframe.base_url.trim().is_empty(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub checked_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiagnosticsResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub config: ConfigPresence,
}

pub fn router(config: &AppConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/hey", get(diagnostics))
        .with_state(DiagnosticsState { presence: ConfigPresence::from_config(config) })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ready",
        service: "rater-server",
        checked_at: Utc::now().to_rfc3339(),
    })
}

pub async fn diagnostics(State(state): State<DiagnosticsState>) -> Json<DiagnosticsResponse> {
    Json(DiagnosticsResponse {
        service: "rater-server",
        version: env!("CARGO_PKG_VERSION"),
        config: state.presence,
    })
}
