use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("unrecognized timestamp: {0}")]
    Unrecognized(String),
}

/// Error body returned by the server on a failed request.
///
/// Either a top-level `message`, or a `response` envelope carrying a single
/// `error` or a map of field name to validation messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ApiErrorResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub errors: Map<String, Value>,
}

impl ApiErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            response: None,
        }
    }

    /// Decodes a raw response body. Bodies that are not the expected JSON
    /// shape decode to an empty body.
    pub fn from_slice(bytes: &[u8]) -> Self {
        serde_json::from_slice(bytes).unwrap_or_default()
    }

    /// Message to show the user: `message`, then `response.error`, then the
    /// first message of the first field error in server order.
    pub fn user_message(&self) -> Option<String> {
        if let Some(message) = non_empty(self.message.as_deref()) {
            return Some(message);
        }
        let response = self.response.as_ref()?;
        if let Some(error) = non_empty(response.error.as_deref()) {
            return Some(error);
        }
        response
            .errors
            .values()
            .next()
            .and_then(first_message)
    }

    pub fn has_field_errors(&self) -> bool {
        self.response
            .as_ref()
            .is_some_and(|response| !response.errors.is_empty())
    }

    pub fn field_errors(&self) -> Vec<(String, Vec<String>)> {
        let Some(response) = self.response.as_ref() else {
            return Vec::new();
        };
        response
            .errors
            .iter()
            .map(|(field, value)| (field.clone(), messages(value)))
            .collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn first_message(value: &Value) -> Option<String> {
    messages(value).into_iter().next()
}

fn messages(value: &Value) -> Vec<String> {
    match value {
        Value::String(text) => vec![text.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
