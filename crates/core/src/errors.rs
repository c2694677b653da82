use thiserror::Error;

/// Failures extracting required widgets from a submitted quote's form data.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QuoteFieldError {
    #[error("widget `{widget_id}` not found in form data")]
    MissingWidget { widget_id: String },
    #[error("widget `{widget_id}` is not {expected}")]
    WrongShape { widget_id: String, expected: &'static str },
}

impl QuoteFieldError {
    pub fn missing(widget_id: impl Into<String>) -> Self {
        Self::MissingWidget { widget_id: widget_id.into() }
    }

    pub fn wrong_shape(widget_id: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongShape { widget_id: widget_id.into(), expected }
    }
}
