use std::{collections::HashMap, fs, path::Path, time::Duration};

use shared::domain::ShiftId;
use tracing::warn;

use crate::{api::DEFAULT_REQUEST_TIMEOUT, notification::DEFAULT_NOTIFICATION_TIMEOUT};

pub const SETTINGS_FILE: &str = "timeclock.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub session_database_url: String,
    pub notification_timeout: Duration,
    pub shift_id: ShiftId,
    pub clock_in_code: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            session_database_url: "sqlite://./data/timeclock.db".into(),
            notification_timeout: DEFAULT_NOTIFICATION_TIMEOUT,
            shift_id: ShiftId(1),
            clock_in_code: 442,
        }
    }
}

pub fn load_settings() -> ClientSettings {
    let settings = load_settings_from(Path::new(SETTINGS_FILE));
    apply_env_overrides(settings, |name| std::env::var(name).ok())
}

/// Defaults overridden by the flat `key = "value"` entries of `path`, if it
/// exists.
pub fn load_settings_from(path: &Path) -> ClientSettings {
    let mut settings = ClientSettings::default();

    let Ok(raw) = fs::read_to_string(path) else {
        return settings;
    };
    let file_cfg = match toml::from_str::<HashMap<String, String>>(&raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "config: ignoring unreadable settings file");
            return settings;
        }
    };

    for (key, value) in &file_cfg {
        apply_setting(&mut settings, key, value);
    }
    settings
}

/// Applies `TIMECLOCK_API_URL` and `APP__*` variables; later names win.
pub fn apply_env_overrides<F>(mut settings: ClientSettings, lookup: F) -> ClientSettings
where
    F: Fn(&str) -> Option<String>,
{
    const OVERRIDES: &[(&str, &str)] = &[
        ("TIMECLOCK_API_URL", "api_base_url"),
        ("APP__API_BASE_URL", "api_base_url"),
        ("APP__REQUEST_TIMEOUT_SECS", "request_timeout_secs"),
        ("APP__SESSION_DATABASE_URL", "session_database_url"),
        ("APP__NOTIFICATION_TIMEOUT_MS", "notification_timeout_ms"),
        ("APP__SHIFT_ID", "shift_id"),
        ("APP__CLOCK_IN_CODE", "clock_in_code"),
    ];

    for (variable, key) in OVERRIDES {
        if let Some(value) = lookup(variable) {
            apply_setting(&mut settings, key, &value);
        }
    }
    settings
}

fn apply_setting(settings: &mut ClientSettings, key: &str, value: &str) {
    let value = value.trim();
    match key {
        "api_base_url" => settings.api_base_url = value.to_string(),
        "session_database_url" => settings.session_database_url = value.to_string(),
        "request_timeout_secs" => {
            if let Ok(secs) = value.parse::<u64>() {
                settings.request_timeout = Duration::from_secs(secs.max(1));
            }
        }
        "notification_timeout_ms" => {
            if let Ok(millis) = value.parse::<u64>() {
                settings.notification_timeout = Duration::from_millis(millis);
            }
        }
        "shift_id" => {
            if let Ok(id) = value.parse::<i64>() {
                settings.shift_id = ShiftId(id);
            }
        }
        "clock_in_code" => {
            if let Ok(code) = value.parse::<u32>() {
                settings.clock_in_code = code;
            }
        }
        _ => {}
    }
}

/// Normalizes a configured database location into a `sqlite://` URL. The
/// parent directory is created when the database is opened.
pub fn prepare_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return ClientSettings::default().session_database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
