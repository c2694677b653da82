//! Quote-intake webhook and duplicate-detection policy.
//!
//! `POST /on_quote_submit` receives a submitted quote, opens a fresh
//! Protosure session, and runs two duplicate checks: by address ZIP and by
//! first+last name. Each check that finds more than one existing match (the
//! current submission plus at least one prior one) raises an email alert.
//!
//! The checks are best-effort and isolated: a failing ZIP check never
//! suppresses the name check, and each check's outcome is reported
//! separately in the response. Alert delivery failures are logged and
//! discarded; they never fail the webhook.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use rater_core::config::AppConfig;
use rater_core::quote::{Quote, QuoteSubmission};
use rater_mailer::{Alert, AlertSink};
use rater_protosure::{name_count_query, zip_count_query, CrmApi, CrmConnector};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

const ALERT_SUBJECT: &str = "Protosure Alert";

#[derive(Clone)]
pub struct QuoteSubmitState {
    crm_connector: Arc<dyn CrmConnector>,
    alert_sink: Arc<dyn AlertSink>,
    widgets: WidgetIds,
    alert_recipient: String,
}

#[derive(Clone, Debug)]
struct WidgetIds {
    address: String,
    first_name: String,
    last_name: String,
}

#[derive(Debug, Error)]
enum CheckError {
    #[error(transparent)]
    Field(#[from] rater_core::QuoteFieldError),
    #[error(transparent)]
    Crm(#[from] rater_protosure::CrmError),
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckStatus {
    /// At most one matching record exists (this submission).
    Clean,
    /// Duplicates found and an alert was raised.
    Alerted { count: u64 },
    /// The check itself could not complete.
    Failed { message: String },
}

#[derive(Debug, Serialize)]
pub struct CheckOutcome {
    pub check: &'static str,
    #[serde(flatten)]
    pub status: CheckStatus,
}

#[derive(Debug, Serialize)]
pub struct QuoteSubmitResponse {
    pub correlation_id: String,
    pub checks: Vec<CheckOutcome>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(
    crm_connector: Arc<dyn CrmConnector>,
    alert_sink: Arc<dyn AlertSink>,
    config: &AppConfig,
) -> Router {
    let state = QuoteSubmitState {
        crm_connector,
        alert_sink,
        widgets: WidgetIds {
            address: config.protosure.address_widget_id.clone(),
            first_name: config.protosure.first_name_widget_id.clone(),
            last_name: config.protosure.last_name_widget_id.clone(),
        },
        alert_recipient: config.alerts.recipient.clone(),
    };

    Router::new().route("/on_quote_submit", post(on_quote_submit)).with_state(state)
}

pub async fn on_quote_submit(
    State(state): State<QuoteSubmitState>,
    Json(payload): Json<Value>,
) -> Result<Json<QuoteSubmitResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().simple().to_string();

    let submission: QuoteSubmission = serde_json::from_value(payload).map_err(|source| {
        warn!(
            event_name = "quote_submit.invalid_payload",
            correlation_id = %correlation_id,
            error = %source,
            "rejecting quote payload"
        );
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: format!("invalid quote payload: {source}"),
                correlation_id: correlation_id.clone(),
            }),
        )
    })?;

    // Login failure aborts before any duplicate query runs.
    let session = state.crm_connector.login().await.map_err(|source| {
        error!(
            event_name = "quote_submit.login_failed",
            correlation_id = %correlation_id,
            error = %source,
            "crm login failed"
        );
        (
            StatusCode::BAD_GATEWAY,
            Json(ApiError { error: source.to_string(), correlation_id: correlation_id.clone() }),
        )
    })?;

    let quote = &submission.quote;
    let checks = vec![
        CheckOutcome {
            check: "zip",
            status: run_check(&state, session.as_ref(), &correlation_id, "zip", || {
                zip_check_query(quote, &state.widgets)
            })
            .await,
        },
        CheckOutcome {
            check: "name",
            status: run_check(&state, session.as_ref(), &correlation_id, "name", || {
                name_check_query(quote, &state.widgets)
            })
            .await,
        },
    ];

    info!(
        event_name = "quote_submit.completed",
        correlation_id = %correlation_id,
        "duplicate checks completed"
    );
    Ok(Json(QuoteSubmitResponse { correlation_id, checks }))
}

/// A prepared duplicate check: the CRM query to run and the alert body to
/// send if the count exceeds one.
struct PreparedCheck {
    query: Value,
    alert_body: fn(&PreparedCheckContext, u64) -> String,
    context: PreparedCheckContext,
}

#[derive(Debug)]
struct PreparedCheckContext {
    zip: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

fn zip_check_query(quote: &Quote, widgets: &WidgetIds) -> Result<PreparedCheck, CheckError> {
    let zip = quote.zip_code(&widgets.address)?;
    let query = zip_count_query(&widgets.address, &zip);

    Ok(PreparedCheck {
        query,
        alert_body: |context, count| {
            let zip = context.zip.as_deref().unwrap_or_default();
            format!(
                "New quote was submitted with ZIP \"{zip}\".\n\
                 Total quotes with ZIP \"{zip}\" is {count}.\n"
            )
        },
        context: PreparedCheckContext { zip: Some(zip), first_name: None, last_name: None },
    })
}

fn name_check_query(quote: &Quote, widgets: &WidgetIds) -> Result<PreparedCheck, CheckError> {
    let first_name = quote.text_field(&widgets.first_name)?;
    let last_name = quote.text_field(&widgets.last_name)?;
    let query = name_count_query(&widgets.first_name, &first_name, &widgets.last_name, &last_name);

    Ok(PreparedCheck {
        query,
        alert_body: |context, count| {
            let first = context.first_name.as_deref().unwrap_or_default();
            let last = context.last_name.as_deref().unwrap_or_default();
            format!(
                "New quote was submitted with first name \"{first}\" and last name \"{last}\".\n\
                 Total quotes with first name \"{first}\" and last name \"{last}\" is {count}.\n"
            )
        },
        context: PreparedCheckContext {
            zip: None,
            first_name: Some(first_name),
            last_name: Some(last_name),
        },
    })
}

async fn run_check(
    state: &QuoteSubmitState,
    session: &dyn CrmApi,
    correlation_id: &str,
    check: &'static str,
    prepare: impl FnOnce() -> Result<PreparedCheck, CheckError>,
) -> CheckStatus {
    let outcome = async {
        let prepared = prepare()?;
        let count = session.count_matching(&prepared.query).await?;
        Ok::<_, CheckError>((prepared, count))
    }
    .await;

    match outcome {
        Ok((prepared, count)) if count > 1 => {
            let body = (prepared.alert_body)(&prepared.context, count);
            dispatch_alert(state, correlation_id, check, body).await;
            CheckStatus::Alerted { count }
        }
        Ok(_) => CheckStatus::Clean,
        Err(source) => {
            warn!(
                event_name = "quote_submit.check_failed",
                correlation_id = %correlation_id,
                check = check,
                error = %source,
                "duplicate check failed; remaining checks still run"
            );
            CheckStatus::Failed { message: source.to_string() }
        }
    }
}

async fn dispatch_alert(
    state: &QuoteSubmitState,
    correlation_id: &str,
    check: &'static str,
    body: String,
) {
    info!(
        event_name = "quote_submit.duplicate_detected",
        correlation_id = %correlation_id,
        check = check,
        "duplicate detected; raising alert"
    );

    let alert = Alert {
        to: state.alert_recipient.clone(),
        subject: ALERT_SUBJECT.to_string(),
        body,
    };

    // Delivery failure is logged and discarded; the webhook must not fail.
    if let Err(source) = state.alert_sink.send_alert(&alert).await {
        warn!(
            event_name = "quote_submit.alert_send_failed",
            correlation_id = %correlation_id,
            check = check,
            error = %source,
            "alert delivery failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{extract::State, http::StatusCode, Json};
    use rater_mailer::{Alert, AlertSink, MailerError};
    use rater_protosure::{CrmApi, CrmConnector, CrmError};
    use serde_json::{json, Value};

    use super::{on_quote_submit, CheckStatus, QuoteSubmitState, WidgetIds};

    #[derive(Default)]
    struct FakeCrm {
        zip_count: u64,
        name_count: u64,
        fail_zip_query: bool,
        queries: Mutex<Vec<Value>>,
    }

    struct SharedCrm(Arc<FakeCrm>);

    #[async_trait]
    impl CrmApi for SharedCrm {
        async fn count_matching(&self, query: &Value) -> Result<u64, CrmError> {
            self.0.queries.lock().expect("queries lock").push(query.clone());

            let is_zip_query = serde_json::to_string(query).expect("serialize").contains(".zip");
            if is_zip_query && self.0.fail_zip_query {
                return Err(CrmError::Query { status: 500, body: "reporting exploded".to_string() });
            }

            Ok(if is_zip_query { self.0.zip_count } else { self.0.name_count })
        }
    }

    struct FakeConnector {
        api: Arc<FakeCrm>,
    }

    #[async_trait]
    impl CrmConnector for FakeConnector {
        async fn login(&self) -> Result<Box<dyn CrmApi>, CrmError> {
            Ok(Box::new(SharedCrm(self.api.clone())))
        }
    }

    struct RejectedLogin;

    #[async_trait]
    impl CrmConnector for RejectedLogin {
        async fn login(&self) -> Result<Box<dyn CrmApi>, CrmError> {
            Err(CrmError::Authentication { status: 500, body: "Server Error".to_string() })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Alert>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send_alert(&self, alert: &Alert) -> Result<(), MailerError> {
            self.sent.lock().expect("sent lock").push(alert.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AlertSink for FailingSink {
        async fn send_alert(&self, _alert: &Alert) -> Result<(), MailerError> {
            Err(MailerError::Rejected { status: 500, body: "smtp relay down".to_string() })
        }
    }

    fn state(
        connector: Arc<dyn CrmConnector>,
        sink: Arc<dyn AlertSink>,
    ) -> State<QuoteSubmitState> {
        State(QuoteSubmitState {
            crm_connector: connector,
            alert_sink: sink,
            widgets: WidgetIds {
                address: "w-addr".to_string(),
                first_name: "w-first".to_string(),
                last_name: "w-last".to_string(),
            },
            alert_recipient: "alerts@example.com".to_string(),
        })
    }

    fn payload() -> Json<Value> {
        Json(json!({
            "quote": {
                "formData": {
                    "w-addr": { "zip": "94103" },
                    "w-first": "Ada",
                    "w-last": "Lovelace"
                }
            }
        }))
    }

    #[tokio::test]
    async fn unique_submission_raises_no_alerts() {
        let api = Arc::new(FakeCrm { zip_count: 1, name_count: 1, ..FakeCrm::default() });
        let sink = Arc::new(RecordingSink::default());

        let response =
            on_quote_submit(state(Arc::new(FakeConnector { api: api.clone() }), sink.clone()), payload())
                .await
                .expect("webhook should succeed")
                .0;

        assert_eq!(response.checks.len(), 2);
        assert!(response.checks.iter().all(|outcome| outcome.status == CheckStatus::Clean));
        assert!(sink.sent.lock().expect("sent lock").is_empty());
        assert_eq!(api.queries.lock().expect("queries lock").len(), 2);
    }

    #[tokio::test]
    async fn duplicate_zip_raises_one_alert_with_verbatim_values() {
        let api = Arc::new(FakeCrm { zip_count: 3, name_count: 1, ..FakeCrm::default() });
        let sink = Arc::new(RecordingSink::default());

        let response =
            on_quote_submit(state(Arc::new(FakeConnector { api }), sink.clone()), payload())
                .await
                .expect("webhook should succeed")
                .0;

        assert_eq!(response.checks[0].status, CheckStatus::Alerted { count: 3 });
        assert_eq!(response.checks[1].status, CheckStatus::Clean);

        let sent = sink.sent.lock().expect("sent lock");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alerts@example.com");
        assert_eq!(sent[0].subject, "Protosure Alert");
        assert!(sent[0].body.contains("ZIP \"94103\""));
        assert!(sent[0].body.contains("is 3"));
    }

    #[tokio::test]
    async fn duplicate_name_alert_names_both_fields() {
        let api = Arc::new(FakeCrm { zip_count: 0, name_count: 2, ..FakeCrm::default() });
        let sink = Arc::new(RecordingSink::default());

        let response =
            on_quote_submit(state(Arc::new(FakeConnector { api }), sink.clone()), payload())
                .await
                .expect("webhook should succeed")
                .0;

        assert_eq!(response.checks[1].status, CheckStatus::Alerted { count: 2 });

        let sent = sink.sent.lock().expect("sent lock");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("first name \"Ada\""));
        assert!(sent[0].body.contains("last name \"Lovelace\""));
    }

    #[tokio::test]
    async fn missing_name_widget_fails_before_any_name_query() {
        let api = Arc::new(FakeCrm { zip_count: 1, ..FakeCrm::default() });
        let sink = Arc::new(RecordingSink::default());

        let body = Json(json!({
            "quote": { "formData": { "w-addr": { "zip": "94103" }, "w-first": "Ada" } }
        }));
        let response = on_quote_submit(
            state(Arc::new(FakeConnector { api: api.clone() }), sink.clone()),
            body,
        )
        .await
        .expect("webhook should succeed")
        .0;

        assert_eq!(response.checks[0].status, CheckStatus::Clean);
        assert!(matches!(response.checks[1].status, CheckStatus::Failed { .. }));

        // Only the ZIP query went out.
        let queries = api.queries.lock().expect("queries lock");
        assert_eq!(queries.len(), 1);
        assert!(serde_json::to_string(&queries[0]).expect("serialize").contains(".zip"));
        assert!(sink.sent.lock().expect("sent lock").is_empty());
    }

    #[tokio::test]
    async fn zip_check_failure_does_not_suppress_name_check() {
        let api = Arc::new(FakeCrm {
            zip_count: 5,
            name_count: 2,
            fail_zip_query: true,
            ..FakeCrm::default()
        });
        let sink = Arc::new(RecordingSink::default());

        let response = on_quote_submit(
            state(Arc::new(FakeConnector { api: api.clone() }), sink.clone()),
            payload(),
        )
        .await
        .expect("webhook should succeed")
        .0;

        assert!(matches!(response.checks[0].status, CheckStatus::Failed { .. }));
        assert_eq!(response.checks[1].status, CheckStatus::Alerted { count: 2 });
        assert_eq!(api.queries.lock().expect("queries lock").len(), 2);
        assert_eq!(sink.sent.lock().expect("sent lock").len(), 1);
    }

    #[tokio::test]
    async fn rejected_login_aborts_before_any_query() {
        let sink = Arc::new(RecordingSink::default());

        let result = on_quote_submit(state(Arc::new(RejectedLogin), sink.clone()), payload()).await;

        let (status, Json(error)) = result.err().expect("login failure should fail the webhook");
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(error.error.contains("500"));
        assert!(error.error.contains("Server Error"));
        assert!(sink.sent.lock().expect("sent lock").is_empty());
    }

    #[tokio::test]
    async fn failing_alert_sink_never_fails_the_webhook() {
        let api = Arc::new(FakeCrm { zip_count: 4, name_count: 1, ..FakeCrm::default() });

        let response =
            on_quote_submit(state(Arc::new(FakeConnector { api }), Arc::new(FailingSink)), payload())
                .await
                .expect("webhook should succeed despite sink failure")
                .0;

        assert_eq!(response.checks[0].status, CheckStatus::Alerted { count: 4 });
        assert_eq!(response.checks[1].status, CheckStatus::Clean);
    }

    #[tokio::test]
    async fn payload_without_quote_is_a_bad_request() {
        let api = Arc::new(FakeCrm::default());
        let sink = Arc::new(RecordingSink::default());

        let result = on_quote_submit(
            state(Arc::new(FakeConnector { api: api.clone() }), sink),
            Json(json!({ "not_a_quote": true })),
        )
        .await;

        let (status, _) = result.err().expect("invalid payload should be rejected");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(api.queries.lock().expect("queries lock").is_empty());
    }
}
