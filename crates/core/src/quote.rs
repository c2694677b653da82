//! Submitted quote payloads and widget field extraction.
//!
//! A quote arrives as `{"quote": {"formData": {...}}}` where `formData` maps
//! widget ids to values. Which widget holds the address and which hold the
//! applicant names is configuration, not schema.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::QuoteFieldError;

#[derive(Clone, Debug, Deserialize)]
pub struct QuoteSubmission {
    pub quote: Quote,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Quote {
    #[serde(rename = "formData")]
    pub form_data: serde_json::Map<String, Value>,
}

impl Quote {
    /// ZIP code from the configured address widget. The widget must exist and
    /// hold an object; a missing or non-string `zip` inside it reads as the
    /// empty string.
    pub fn zip_code(&self, address_widget_id: &str) -> Result<String, QuoteFieldError> {
        let address = match self.form_data.get(address_widget_id) {
            None | Some(Value::Null) => {
                return Err(QuoteFieldError::missing(address_widget_id));
            }
            Some(value) => value,
        };

        let address = address
            .as_object()
            .ok_or_else(|| QuoteFieldError::wrong_shape(address_widget_id, "an address object"))?;

        Ok(address.get("zip").and_then(Value::as_str).unwrap_or_default().to_string())
    }

    /// A required plain-text widget value. No default: a missing widget is an
    /// error, matching the strictness of the name checks.
    pub fn text_field(&self, widget_id: &str) -> Result<String, QuoteFieldError> {
        let value =
            self.form_data.get(widget_id).ok_or_else(|| QuoteFieldError::missing(widget_id))?;

        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| QuoteFieldError::wrong_shape(widget_id, "a text value"))
    }
}
