use std::sync::Arc;

use axum::Router;
use rater_core::config::{AppConfig, ConfigError, LoadOptions};
use rater_mailer::{AlertSink, MailerClient, NoopAlertSink};
use rater_protosure::{CrmConnector, ProtosureConnector};
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub crm_connector: Arc<dyn CrmConnector>,
    pub alert_sink: Arc<dyn AlertSink>,
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, ConfigError> {
    let config = AppConfig::load(options)?;
    Ok(bootstrap_with_config(config))
}

pub fn bootstrap_with_config(config: AppConfig) -> Application {
    let crm_connector: Arc<dyn CrmConnector> =
        Arc::new(ProtosureConnector::from_config(&config.protosure));

    let alert_sink: Arc<dyn AlertSink> = if config.alerts.enabled {
        Arc::new(MailerClient::from_config(&config.alerts))
    } else {
        info!(
            event_name = "system.bootstrap.alerts_disabled",
            "alerts disabled; duplicate findings will be logged only"
        );
        Arc::new(NoopAlertSink)
    };

    Application { config, crm_connector, alert_sink }
}

impl Application {
    pub fn router(&self) -> Router {
        crate::rater::router(&self.config.mainframe)
            .merge(crate::quote_submit::router(
                self.crm_connector.clone(),
                self.alert_sink.clone(),
                &self.config,
            ))
            .merge(crate::health::router(&self.config))
    }
}

#[cfg(test)]
mod tests {
    use rater_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn valid_overrides() -> ConfigOverrides {
        ConfigOverrides {
            protosure_host: Some("https://demo.protosure.io".to_string()),
            protosure_email: Some("bot@example.com".to_string()),
            protosure_password: Some("hunter2".to_string()),
            address_widget_id: Some("w-addr".to_string()),
            first_name_widget_id: Some("w-first".to_string()),
            last_name_widget_id: Some("w-last".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn bootstrap_fails_fast_without_protosure_settings() {
        let result = bootstrap(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            ..LoadOptions::default()
        });

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("protosure.host"));
    }

    #[test]
    fn bootstrap_builds_router_with_valid_overrides() {
        let app = bootstrap(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            overrides: valid_overrides(),
            ..LoadOptions::default()
        })
        .expect("bootstrap should succeed with valid overrides");

        assert!(!app.config.alerts.enabled);
        let _router = app.router();
    }
}
