use serde::{Deserialize, Serialize};

use crate::domain::{ClockEvent, ShiftId, UserProfile};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub remember_me: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUserResponse {
    #[serde(default)]
    pub authenticated_user: Option<UserProfile>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub week_offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<ClockEvent>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShiftQuery {
    pub shift_id: ShiftId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClockInRequest {
    pub code: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockEventResponse {
    pub event: ClockEvent,
}

/// Body of `POST /clock`. The server stores both flags as sent, so callers
/// pass the full status they want.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockStatusUpdate {
    pub clocked: bool,
    pub on_break: bool,
}
