use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TimestampError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(EventId);
id_newtype!(ShiftId);
id_newtype!(TimecardId);
id_newtype!(OrganizationId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockAction {
    ClockIn,
    ClockOut,
    StartBreak,
    EndBreak,
}

impl ClockAction {
    pub fn label(self) -> &'static str {
        match self {
            ClockAction::ClockIn => "Clocked in",
            ClockAction::ClockOut => "Clocked out",
            ClockAction::StartBreak => "Started break",
            ClockAction::EndBreak => "Finished break",
        }
    }
}

/// Profile of a signed-in user as returned by `/users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<OrganizationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<UserId>,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self
                .username
                .clone()
                .or_else(|| self.email.clone())
                .unwrap_or_else(|| format!("user {}", self.id)),
        }
    }
}

/// A single entry of the time clock.
///
/// `time` is the instant the server recorded; the calendar day it falls on
/// depends on the viewer's timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockEvent {
    pub id: EventId,
    #[serde(with = "server_time")]
    pub time: DateTime<Utc>,
    #[serde(alias = "event_type")]
    pub action: ClockAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timecard_id: Option<TimecardId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

impl ClockEvent {
    pub fn date_in<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDate {
        self.time.with_timezone(tz).date_naive()
    }
}

/// Clock and break flags as reported by `/clock`. A flag the server has
/// never set arrives as `null` and reads as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockStatus {
    #[serde(default, deserialize_with = "null_as_false")]
    pub clocked: bool,
    #[serde(default, deserialize_with = "null_as_false")]
    pub on_break: bool,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

const NAIVE_UTC_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses a server timestamp into an instant.
///
/// RFC 3339 values are converted from their offset. Values without an offset
/// are UTC, which is what the server writes.
pub fn parse_server_time(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    let raw = raw.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.with_timezone(&Utc));
    }
    NAIVE_UTC_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TimestampError::Unrecognized(raw.to_string()))
}

pub mod server_time {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_server_time(&raw).map_err(de::Error::custom)
    }
}
