pub mod bmi;
pub mod config;
pub mod errors;
pub mod quote;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use errors::QuoteFieldError;
pub use quote::{Quote, QuoteSubmission};
