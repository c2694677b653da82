//! Protosure HTTP client: session login and reporting queries.

use async_trait::async_trait;
use rater_core::config::ProtosureConfig;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::query::count_from_rows;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("login rejected with status {status}: {body}")]
    Authentication { status: u16, body: String },
    #[error("report query failed with status {status}: {body}")]
    Query { status: u16, body: String },
    #[error("malformed report response: {0}")]
    MalformedResponse(String),
    #[error("protosure transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

/// An authenticated handle that can run reporting queries.
#[async_trait]
pub trait CrmApi: Send + Sync {
    async fn count_matching(&self, query: &Value) -> Result<u64, CrmError>;
}

/// Produces a fresh authenticated session per webhook invocation.
#[async_trait]
pub trait CrmConnector: Send + Sync {
    async fn login(&self) -> Result<Box<dyn CrmApi>, CrmError>;
}

pub struct ProtosureClient {
    host: String,
    http: Client,
}

impl ProtosureClient {
    /// A fresh client with its own cookie jar; the login cookie is the
    /// session, so clients are never shared across invocations.
    pub fn new(host: impl Into<String>) -> Result<Self, CrmError> {
        let http = Client::builder().cookie_store(true).build()?;
        Ok(Self { host: host.into().trim_end_matches('/').to_string(), http })
    }

    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<ProtosureSession, CrmError> {
        let url = format!("{}/auth/ajax_login/", self.host);
        let response = self
            .http
            .post(&url)
            .json(&json!({ "email": email, "password": password.expose_secret() }))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Authentication { status: status.as_u16(), body });
        }

        debug!(event_name = "protosure.login", host = %self.host, "crm session established");
        Ok(ProtosureSession { host: self.host.clone(), http: self.http.clone() })
    }
}

/// Cookie-authenticated session against one Protosure host. Request-scoped;
/// dropped after the webhook invocation that created it.
pub struct ProtosureSession {
    host: String,
    http: Client,
}

#[async_trait]
impl CrmApi for ProtosureSession {
    async fn count_matching(&self, query: &Value) -> Result<u64, CrmError> {
        let url = format!("{}/api/reports/query/", self.host);
        let response = self.http.post(&url).json(query).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Query { status: status.as_u16(), body });
        }

        let rows: Value = response.json().await?;
        count_from_rows(&rows)
    }
}

/// Production connector wired from configuration.
pub struct ProtosureConnector {
    host: String,
    email: String,
    password: SecretString,
}

impl ProtosureConnector {
    pub fn from_config(config: &ProtosureConfig) -> Self {
        Self {
            host: config.host.clone(),
            email: config.email.clone(),
            password: config.password.clone(),
        }
    }
}

#[async_trait]
impl CrmConnector for ProtosureConnector {
    async fn login(&self) -> Result<Box<dyn CrmApi>, CrmError> {
        let client = ProtosureClient::new(self.host.clone())?;
        let session = client.login(&self.email, &self.password).await?;
        Ok(Box::new(session))
    }
}
