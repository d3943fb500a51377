//! Typed failures surfaced by the client, decoded once at the HTTP boundary.

use shared::error::ApiErrorBody;
use thiserror::Error;

use crate::api::Endpoint;

pub const UNREACHABLE_MESSAGE: &str = "Unable to reach the server";
pub const UNEXPECTED_RESPONSE_MESSAGE: &str = "Unexpected response from the server";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Auth,
    Validation,
    Remote,
    Decode,
    HistoryFetchInFlight,
    Storage,
}

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("{endpoint}: {message}")]
    Network {
        endpoint: Endpoint,
        message: String,
        timed_out: bool,
    },
    #[error("{endpoint}: authentication failed with status {status}")]
    Auth {
        endpoint: Endpoint,
        status: u16,
        body: ApiErrorBody,
    },
    #[error("{endpoint}: validation failed with status {status}")]
    Validation {
        endpoint: Endpoint,
        status: u16,
        body: ApiErrorBody,
    },
    #[error("{endpoint}: request failed with status {status}")]
    Remote {
        endpoint: Endpoint,
        status: u16,
        body: ApiErrorBody,
    },
    #[error("{endpoint}: unexpected response body: {message}")]
    Decode { endpoint: Endpoint, message: String },
    #[error("a clock history page is already being fetched")]
    HistoryFetchInFlight,
    #[error("session cache failure: {0}")]
    Storage(String),
}

impl ClientError {
    /// Classifies a non-2xx response.
    pub fn from_status(endpoint: Endpoint, status: u16, body: ApiErrorBody) -> Self {
        match status {
            400..=499 if endpoint == Endpoint::Login => Self::Auth {
                endpoint,
                status,
                body,
            },
            401 | 403 => Self::Auth {
                endpoint,
                status,
                body,
            },
            422 => Self::Validation {
                endpoint,
                status,
                body,
            },
            400 if body.has_field_errors() => Self::Validation {
                endpoint,
                status,
                body,
            },
            _ => Self::Remote {
                endpoint,
                status,
                body,
            },
        }
    }

    pub fn from_transport(endpoint: Endpoint, err: &reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode {
                endpoint,
                message: err.to_string(),
            };
        }
        Self::Network {
            endpoint,
            message: err.to_string(),
            timed_out: err.is_timeout(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::HistoryFetchInFlight => ErrorKind::HistoryFetchInFlight,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        match self {
            Self::Network { endpoint, .. }
            | Self::Auth { endpoint, .. }
            | Self::Validation { endpoint, .. }
            | Self::Remote { endpoint, .. }
            | Self::Decode { endpoint, .. } => Some(*endpoint),
            Self::HistoryFetchInFlight | Self::Storage(_) => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. }
            | Self::Validation { status, .. }
            | Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&ApiErrorBody> {
        match self {
            Self::Auth { body, .. } | Self::Validation { body, .. } | Self::Remote { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }

    /// Human-readable message for a failed remote call. `None` for local
    /// failures that never reached the server.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Network { .. } => Some(UNREACHABLE_MESSAGE.to_string()),
            Self::Auth { status, body, .. }
            | Self::Validation { status, body, .. }
            | Self::Remote { status, body, .. } => Some(
                body.user_message()
                    .unwrap_or_else(|| format!("Request failed ({status})")),
            ),
            Self::Decode { .. } => Some(UNEXPECTED_RESPONSE_MESSAGE.to_string()),
            Self::HistoryFetchInFlight | Self::Storage(_) => None,
        }
    }
}
