use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub protosure: ProtosureConfig,
    pub alerts: AlertConfig,
    pub mainframe: MainframeConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct ProtosureConfig {
    pub host: String,
    pub email: String,
    pub password: SecretString,
    pub address_widget_id: String,
    pub first_name_widget_id: String,
    pub last_name_widget_id: String,
}

#[derive(Clone, Debug)]
pub struct AlertConfig {
    pub enabled: bool,
    pub recipient: String,
    pub sender: String,
    pub api_base_url: String,
    pub api_key: SecretString,
}

#[derive(Clone, Debug)]
pub struct MainframeConfig {
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub protosure_host: Option<String>,
    pub protosure_email: Option<String>,
    pub protosure_password: Option<String>,
    pub address_widget_id: Option<String>,
    pub first_name_widget_id: Option<String>,
    pub last_name_widget_id: Option<String>,
    pub alerts_enabled: Option<bool>,
    pub alert_recipient: Option<String>,
    pub alert_api_base_url: Option<String>,
    pub alert_api_key: Option<String>,
    pub mainframe_base_url: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8000 },
            protosure: ProtosureConfig {
                host: String::new(),
                email: String::new(),
                password: String::new().into(),
                address_widget_id: String::new(),
                first_name_widget_id: String::new(),
                last_name_widget_id: String::new(),
            },
            alerts: AlertConfig {
                enabled: false,
                recipient: String::new(),
                sender: "Protosure Bot <bot@api-demo.protosure.io>".to_string(),
                api_base_url: String::new(),
                api_key: String::new().into(),
            },
            mainframe: MainframeConfig {
                base_url: "https://api.enterprise.mainframe.com".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("rater.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(protosure) = patch.protosure {
            if let Some(host) = protosure.host {
                self.protosure.host = host;
            }
            if let Some(email) = protosure.email {
                self.protosure.email = email;
            }
            if let Some(password_value) = protosure.password {
                self.protosure.password = secret_value(password_value);
            }
            if let Some(address_widget_id) = protosure.address_widget_id {
                self.protosure.address_widget_id = address_widget_id;
            }
            if let Some(first_name_widget_id) = protosure.first_name_widget_id {
                self.protosure.first_name_widget_id = first_name_widget_id;
            }
            if let Some(last_name_widget_id) = protosure.last_name_widget_id {
                self.protosure.last_name_widget_id = last_name_widget_id;
            }
        }

        if let Some(alerts) = patch.alerts {
            if let Some(enabled) = alerts.enabled {
                self.alerts.enabled = enabled;
            }
            if let Some(recipient) = alerts.recipient {
                self.alerts.recipient = recipient;
            }
            if let Some(sender) = alerts.sender {
                self.alerts.sender = sender;
            }
            if let Some(api_base_url) = alerts.api_base_url {
                self.alerts.api_base_url = api_base_url;
            }
            if let Some(api_key_value) = alerts.api_key {
                self.alerts.api_key = secret_value(api_key_value);
            }
        }

        if let Some(mainframe) = patch.mainframe {
            if let Some(base_url) = mainframe.base_url {
                self.mainframe.base_url = base_url;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("RATER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("RATER_SERVER_PORT") {
            self.server.port = parse_u16("RATER_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("RATER_PROTOSURE_HOST") {
            self.protosure.host = value;
        }
        if let Some(value) = read_env("RATER_PROTOSURE_EMAIL") {
            self.protosure.email = value;
        }
        if let Some(value) = read_env("RATER_PROTOSURE_PASSWORD") {
            self.protosure.password = secret_value(value);
        }
        if let Some(value) = read_env("RATER_PROTOSURE_ADDRESS_WIDGET_ID") {
            self.protosure.address_widget_id = value;
        }
        if let Some(value) = read_env("RATER_PROTOSURE_FIRST_NAME_WIDGET_ID") {
            self.protosure.first_name_widget_id = value;
        }
        if let Some(value) = read_env("RATER_PROTOSURE_LAST_NAME_WIDGET_ID") {
            self.protosure.last_name_widget_id = value;
        }

        if let Some(value) = read_env("RATER_ALERTS_ENABLED") {
            self.alerts.enabled = parse_bool("RATER_ALERTS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("RATER_ALERTS_RECIPIENT") {
            self.alerts.recipient = value;
        }
        if let Some(value) = read_env("RATER_ALERTS_SENDER") {
            self.alerts.sender = value;
        }
        if let Some(value) = read_env("RATER_ALERTS_API_BASE_URL") {
            self.alerts.api_base_url = value;
        }
        if let Some(value) = read_env("RATER_ALERTS_API_KEY") {
            self.alerts.api_key = secret_value(value);
        }

        if let Some(value) = read_env("RATER_MAINFRAME_BASE_URL") {
            self.mainframe.base_url = value;
        }

        let log_level = read_env("RATER_LOGGING_LEVEL").or_else(|| read_env("RATER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("RATER_LOGGING_FORMAT").or_else(|| read_env("RATER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(host) = overrides.protosure_host {
            self.protosure.host = host;
        }
        if let Some(email) = overrides.protosure_email {
            self.protosure.email = email;
        }
        if let Some(password) = overrides.protosure_password {
            self.protosure.password = secret_value(password);
        }
        if let Some(address_widget_id) = overrides.address_widget_id {
            self.protosure.address_widget_id = address_widget_id;
        }
        if let Some(first_name_widget_id) = overrides.first_name_widget_id {
            self.protosure.first_name_widget_id = first_name_widget_id;
        }
        if let Some(last_name_widget_id) = overrides.last_name_widget_id {
            self.protosure.last_name_widget_id = last_name_widget_id;
        }

        if let Some(enabled) = overrides.alerts_enabled {
            self.alerts.enabled = enabled;
        }
        if let Some(recipient) = overrides.alert_recipient {
            self.alerts.recipient = recipient;
        }
        if let Some(api_base_url) = overrides.alert_api_base_url {
            self.alerts.api_base_url = api_base_url;
        }
        if let Some(api_key) = overrides.alert_api_key {
            self.alerts.api_key = secret_value(api_key);
        }

        if let Some(base_url) = overrides.mainframe_base_url {
            self.mainframe.base_url = base_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_protosure(&self.protosure)?;
        validate_alerts(&self.alerts)?;
        validate_mainframe(&self.mainframe)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("rater.toml"), PathBuf::from("config/rater.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    Ok(())
}

fn validate_protosure(protosure: &ProtosureConfig) -> Result<(), ConfigError> {
    let host = protosure.host.trim();
    if host.is_empty() {
        return Err(ConfigError::Validation(
            "protosure.host is required for the quote-submit webhook".to_string(),
        ));
    }
    if !host.starts_with("http://") && !host.starts_with("https://") {
        return Err(ConfigError::Validation(
            "protosure.host must start with http:// or https://".to_string(),
        ));
    }

    if protosure.email.trim().is_empty() {
        return Err(ConfigError::Validation("protosure.email is required".to_string()));
    }
    if protosure.password.expose_secret().is_empty() {
        return Err(ConfigError::Validation("protosure.password is required".to_string()));
    }

    for (key, value) in [
        ("protosure.address_widget_id", &protosure.address_widget_id),
        ("protosure.first_name_widget_id", &protosure.first_name_widget_id),
        ("protosure.last_name_widget_id", &protosure.last_name_widget_id),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{key} is required")));
        }
    }

    Ok(())
}

fn validate_alerts(alerts: &AlertConfig) -> Result<(), ConfigError> {
    if !alerts.enabled {
        return Ok(());
    }

    if alerts.recipient.trim().is_empty() {
        return Err(ConfigError::Validation(
            "alerts.recipient is required when alerts are enabled".to_string(),
        ));
    }

    let base_url = alerts.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "alerts.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if alerts.api_key.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "alerts.api_key is required when alerts are enabled".to_string(),
        ));
    }

    Ok(())
}

fn validate_mainframe(mainframe: &MainframeConfig) -> Result<(), ConfigError> {
    let base_url = mainframe.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "mainframe.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    protosure: Option<ProtosurePatch>,
    alerts: Option<AlertPatch>,
    mainframe: Option<MainframePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct ProtosurePatch {
    host: Option<String>,
    email: Option<String>,
    password: Option<String>,
    address_widget_id: Option<String>,
    first_name_widget_id: Option<String>,
    last_name_widget_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AlertPatch {
    enabled: Option<bool>,
    recipient: Option<String>,
    sender: Option<String>,
    api_base_url: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MainframePatch {
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
