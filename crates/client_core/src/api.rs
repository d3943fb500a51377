//! HTTP access to the timeclock REST API.

use std::{fmt, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{ClockEvent, ClockStatus, ShiftId, UserProfile},
    error::ApiErrorBody,
    protocol::{
        ClockEventResponse, ClockInRequest, CurrentUserResponse, HistoryQuery, HistoryResponse,
        ClockStatusUpdate, LoginRequest, ShiftQuery, SignUpRequest,
    },
};
use tracing::debug;
use url::Url;

use crate::error::ClientError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Login,
    Register,
    Logout,
    CurrentSession,
    History,
    ClockIn,
    ClockOut,
    ClockStatus,
    UpdateClockStatus,
}

impl Endpoint {
    pub fn method(self) -> Method {
        match self {
            Endpoint::CurrentSession | Endpoint::History | Endpoint::ClockStatus => Method::GET,
            _ => Method::POST,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Login => "/auth/login",
            Endpoint::Register => "/auth/register",
            Endpoint::Logout => "/auth/logout",
            Endpoint::CurrentSession => "/users/me",
            Endpoint::History => "/clock/history",
            Endpoint::ClockIn => "/clock/clock-in",
            Endpoint::ClockOut => "/clock/clock-out",
            Endpoint::ClockStatus | Endpoint::UpdateClockStatus => "/clock",
        }
    }

    /// Failures of a probe are an expected outcome and are never shown to
    /// the user.
    pub fn is_session_probe(self) -> bool {
        self == Endpoint::CurrentSession
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn history_page(&self, query: HistoryQuery) -> Result<Vec<ClockEvent>, ClientError>;
}

#[async_trait]
pub trait TimeclockApi: HistorySource {
    /// Returns the raw session payload of a successful login.
    async fn login(&self, request: &LoginRequest) -> Result<Value, ClientError>;
    async fn register(&self, request: &SignUpRequest) -> Result<(), ClientError>;
    async fn logout(&self) -> Result<(), ClientError>;
    /// `Ok(None)` when the server answers but reports no signed-in user.
    async fn current_user(&self) -> Result<Option<UserProfile>, ClientError>;
    async fn clock_in(
        &self,
        shift_id: ShiftId,
        request: ClockInRequest,
    ) -> Result<ClockEvent, ClientError>;
    async fn clock_out(&self, shift_id: ShiftId) -> Result<ClockEvent, ClientError>;
    async fn clock_status(&self) -> Result<ClockStatus, ClientError>;
    /// Overwrites both flags and returns the status the server kept.
    async fn update_clock_status(&self, update: ClockStatusUpdate) -> Result<ClockStatus, ClientError>;
}

/// [`TimeclockApi`] over HTTP. Session cookies set by the server are kept
/// and sent with every later request.
#[derive(Clone)]
pub struct HttpTimeclockApi {
    http: Client,
    base_url: String,
}

impl HttpTimeclockApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .with_context(|| format!("invalid api base url '{base_url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("api base url must start with http:// or https://: {base_url}");
        }
        let http = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, endpoint: Endpoint) -> RequestBuilder {
        self.http
            .request(endpoint.method(), format!("{}{}", self.base_url, endpoint.path()))
    }

    async fn send(&self, endpoint: Endpoint, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|err| ClientError::from_transport(endpoint, &err))?;
        let status = response.status();
        debug!(%endpoint, status = status.as_u16(), "api: response received");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        Err(ClientError::from_status(
            endpoint,
            status.as_u16(),
            ApiErrorBody::from_slice(&body),
        ))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(endpoint, request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| ClientError::from_transport(endpoint, &err))?;
        serde_json::from_slice(&body).map_err(|err| ClientError::Decode {
            endpoint,
            message: err.to_string(),
        })
    }

    async fn post_shift_event(
        &self,
        endpoint: Endpoint,
        shift_id: ShiftId,
        body: Option<ClockInRequest>,
    ) -> Result<ClockEvent, ClientError> {
        let mut request = self.request(endpoint).query(&ShiftQuery { shift_id });
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response: ClockEventResponse = self.send_json(endpoint, request).await?;
        Ok(response.event)
    }
}

#[async_trait]
impl HistorySource for HttpTimeclockApi {
    async fn history_page(&self, query: HistoryQuery) -> Result<Vec<ClockEvent>, ClientError> {
        let response: HistoryResponse = self
            .send_json(Endpoint::History, self.request(Endpoint::History).query(&query))
            .await?;
        Ok(response.history)
    }
}

#[async_trait]
impl TimeclockApi for HttpTimeclockApi {
    async fn login(&self, request: &LoginRequest) -> Result<Value, ClientError> {
        let response = self
            .send(Endpoint::Login, self.request(Endpoint::Login).json(request))
            .await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| ClientError::from_transport(Endpoint::Login, &err))?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body).map_err(|err| ClientError::Decode {
            endpoint: Endpoint::Login,
            message: err.to_string(),
        })
    }

    async fn register(&self, request: &SignUpRequest) -> Result<(), ClientError> {
        self.send(Endpoint::Register, self.request(Endpoint::Register).json(request))
            .await?;
        Ok(())
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.send(Endpoint::Logout, self.request(Endpoint::Logout))
            .await?;
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<UserProfile>, ClientError> {
        let response: CurrentUserResponse = self
            .send_json(
                Endpoint::CurrentSession,
                self.request(Endpoint::CurrentSession),
            )
            .await?;
        Ok(response.authenticated_user)
    }

    async fn clock_in(
        &self,
        shift_id: ShiftId,
        request: ClockInRequest,
    ) -> Result<ClockEvent, ClientError> {
        self.post_shift_event(Endpoint::ClockIn, shift_id, Some(request))
            .await
    }

    async fn clock_out(&self, shift_id: ShiftId) -> Result<ClockEvent, ClientError> {
        self.post_shift_event(Endpoint::ClockOut, shift_id, None)
            .await
    }

    async fn clock_status(&self) -> Result<ClockStatus, ClientError> {
        self.send_json(Endpoint::ClockStatus, self.request(Endpoint::ClockStatus))
            .await
    }

    async fn update_clock_status(&self, update: ClockStatusUpdate) -> Result<ClockStatus, ClientError> {
        self.send_json(
            Endpoint::UpdateClockStatus,
            self.request(Endpoint::UpdateClockStatus).json(&update),
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
