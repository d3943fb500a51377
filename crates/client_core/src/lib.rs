use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::TimeZone;
use serde_json::Value;
use shared::{
    domain::{ClockEvent, ClockStatus, EventId, ShiftId, UserProfile},
    protocol::{ClockInRequest, ClockStatusUpdate, Credentials, LoginRequest, SignUpRequest},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod api;
pub mod config;
pub mod error;
pub mod event_store;
pub mod history;
pub mod notification;
pub mod session;

pub use api::{Endpoint, HistorySource, HttpTimeclockApi, TimeclockApi};
pub use config::ClientSettings;
pub use error::{ClientError, ErrorKind};
pub use event_store::{EventCollection, EventStore, PageTicket};
pub use history::{build_view, build_view_in, DayLabel, HistoryEntry};
pub use notification::{Notification, NotificationRequest, NotificationState};
pub use session::{MissingSessionPersistence, SessionCache, SessionPersistence};

use notification::{intercepted_message, DEFAULT_NOTIFICATION_TIMEOUT};

pub const SIGN_UP_NOTIFICATION: &str = "Check your email to verify your account!";

/// Where the presentation layer should go after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Home,
    Clock,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    SessionChanged(Option<UserProfile>),
    EventsRecorded { ids: Vec<EventId> },
    HistoryReset,
    ClockStatusChanged(ClockStatus),
    NotificationShown(Notification),
    NotificationHidden,
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub shift_id: ShiftId,
    pub clock_in_code: u32,
    pub notification_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            shift_id: ShiftId(1),
            clock_in_code: 442,
            notification_timeout: DEFAULT_NOTIFICATION_TIMEOUT,
        }
    }
}

impl From<&ClientSettings> for ClientOptions {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            shift_id: settings.shift_id,
            clock_in_code: settings.clock_in_code,
            notification_timeout: settings.notification_timeout,
        }
    }
}

struct ClientState {
    session: Option<UserProfile>,
    history: EventStore,
    clock: ClockStatus,
    notification: NotificationState,
}

/// Application state for one signed-in (or anonymous) user plus the actions
/// that change it.
///
/// State is only mutated after the awaited network call of an action has
/// resolved, and the state lock is never held across a network call.
pub struct TimeclockClient {
    api: Arc<dyn TimeclockApi>,
    session_cache: SessionCache,
    options: ClientOptions,
    inner: Mutex<ClientState>,
    events: broadcast::Sender<ClientEvent>,
}

impl TimeclockClient {
    pub fn new(api: Arc<dyn TimeclockApi>) -> Arc<Self> {
        Self::new_with_dependencies(
            api,
            Arc::new(MissingSessionPersistence),
            ClientOptions::default(),
        )
    }

    pub fn new_with_dependencies(
        api: Arc<dyn TimeclockApi>,
        persistence: Arc<dyn SessionPersistence>,
        options: ClientOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            session_cache: SessionCache::new(persistence),
            inner: Mutex::new(ClientState {
                session: None,
                history: EventStore::new(),
                clock: ClockStatus::default(),
                notification: NotificationState::new(options.notification_timeout),
            }),
            options,
            events,
        })
    }

    /// HTTP client for `settings.api_base_url` with the session cached in
    /// `persistence`.
    pub fn from_settings(
        settings: &ClientSettings,
        persistence: Arc<dyn SessionPersistence>,
    ) -> Result<Arc<Self>> {
        let api = HttpTimeclockApi::new(&settings.api_base_url, settings.request_timeout)
            .context("failed to create timeclock api client")?;
        Ok(Self::new_with_dependencies(
            Arc::new(api),
            persistence,
            ClientOptions::from(settings),
        ))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn session(&self) -> Option<UserProfile> {
        self.inner.lock().await.session.clone()
    }

    pub async fn is_signed_in(&self) -> bool {
        self.inner.lock().await.session.is_some()
    }

    pub async fn clock_status(&self) -> ClockStatus {
        self.inner.lock().await.clock
    }

    pub async fn notification(&self) -> Notification {
        self.inner.lock().await.notification.current().clone()
    }

    pub async fn history_cursor(&self) -> u32 {
        self.inner.lock().await.history.cursor()
    }

    pub async fn history_len(&self) -> usize {
        self.inner.lock().await.history.collection().len()
    }

    /// Day-labelled history in the local timezone, rebuilt from the current
    /// events on every call.
    pub async fn history_view(&self) -> Vec<HistoryEntry> {
        let guard = self.inner.lock().await;
        build_view(guard.history.collection())
    }

    pub async fn history_view_in<Tz: TimeZone>(&self, tz: &Tz) -> Vec<HistoryEntry> {
        let guard = self.inner.lock().await;
        build_view_in(guard.history.collection(), tz)
    }

    /// Pre-populates the session from the durable cache without contacting
    /// the server.
    pub async fn restore_session(&self) -> Option<UserProfile> {
        let restored = match self.session_cache.restore().await {
            Ok(restored) => restored,
            Err(err) => {
                warn!(error = %err, "session: failed to read cached user");
                None
            }
        };

        if let Some(user) = &restored {
            info!(user_id = user.id.0, "session: restored cached user");
            self.inner.lock().await.session = Some(user.clone());
            let _ = self
                .events
                .send(ClientEvent::SessionChanged(Some(user.clone())));
        }
        restored
    }

    pub async fn show_notification(&self, request: impl Into<NotificationRequest>) -> Notification {
        let shown = self.inner.lock().await.notification.show(request.into());
        debug!(text = %shown.text, "notification: shown");
        let _ = self
            .events
            .send(ClientEvent::NotificationShown(shown.clone()));
        shown
    }

    pub async fn hide_notification(&self) {
        let was_visible = self.inner.lock().await.notification.hide();
        if was_visible {
            let _ = self.events.send(ClientEvent::NotificationHidden);
        }
    }

    /// On success the session is refreshed from the server before returning.
    /// On failure the session is cleared.
    ///
    /// A successful login still navigates to the clock when the payload
    /// carries no user and the refresh fails; the session then stays unset
    /// until the next probe succeeds.
    pub async fn sign_in(&self, credentials: Credentials) -> Result<Navigation, ClientError> {
        let request = LoginRequest {
            credentials,
            remember_me: true,
        };

        let payload = match self.intercept(self.api.login(&request).await).await {
            Ok(payload) => payload,
            Err(err) => {
                self.clear_session().await;
                return Err(err);
            }
        };

        if let Some(user) = session_user_from_login(&payload) {
            self.set_session(user).await;
        }
        if let Err(err) = self.get_authenticated_user().await {
            warn!(error = %err, "auth: session refresh after sign-in failed");
        }
        info!("auth: signed in");
        Ok(Navigation::Clock)
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> Result<Navigation, ClientError> {
        self.intercept(self.api.register(&request).await).await?;
        info!("auth: registration submitted");
        self.show_notification(SIGN_UP_NOTIFICATION).await;
        Ok(Navigation::Home)
    }

    /// Clears local state whatever the server answers.
    pub async fn sign_out(&self) -> Navigation {
        if let Err(err) = self.intercept(self.api.logout().await).await {
            warn!(error = %err, "auth: remote sign-out failed, clearing local session anyway");
        }
        self.clear_session().await;
        {
            let mut guard = self.inner.lock().await;
            guard.history.reset();
            guard.clock = ClockStatus::default();
        }
        let _ = self.events.send(ClientEvent::HistoryReset);
        info!("auth: signed out");
        Navigation::Home
    }

    /// Session probe. Failures are returned but never notified, and clear
    /// the session.
    pub async fn get_authenticated_user(&self) -> Result<Option<UserProfile>, ClientError> {
        match self.intercept(self.api.current_user().await).await {
            Ok(Some(user)) => {
                self.set_session(user.clone()).await;
                Ok(Some(user))
            }
            Ok(None) => {
                self.clear_session().await;
                Ok(None)
            }
            Err(err) => {
                debug!(error = %err, "auth: session probe failed");
                self.clear_session().await;
                Err(err)
            }
        }
    }

    pub async fn clock_in(&self) -> Result<ClockEvent, ClientError> {
        self.clock_in_with_code(self.options.clock_in_code).await
    }

    pub async fn clock_in_with_code(&self, code: u32) -> Result<ClockEvent, ClientError> {
        let event = self
            .intercept(
                self.api
                    .clock_in(self.options.shift_id, ClockInRequest { code })
                    .await,
            )
            .await?;
        self.apply_clock_event(event, |clock| {
            clock.clocked = true;
        })
        .await
    }

    pub async fn clock_out(&self) -> Result<ClockEvent, ClientError> {
        let event = self
            .intercept(self.api.clock_out(self.options.shift_id).await)
            .await?;
        self.apply_clock_event(event, |clock| {
            clock.clocked = false;
            clock.on_break = false;
        })
        .await
    }

    /// Breaks are status flags on the server, not history events.
    pub async fn start_break(&self) -> Result<ClockStatus, ClientError> {
        self.set_break(true).await
    }

    pub async fn end_break(&self) -> Result<ClockStatus, ClientError> {
        self.set_break(false).await
    }

    pub async fn refresh_clock_status(&self) -> Result<ClockStatus, ClientError> {
        let status = self.intercept(self.api.clock_status().await).await?;
        self.store_clock_status(status).await;
        Ok(status)
    }

    /// Fetches the history page at the cursor and advances past it. A failed
    /// fetch leaves the cursor where it was; an overlapping call fails with
    /// [`ClientError::HistoryFetchInFlight`]. A page that arrives after a
    /// sign-out is discarded and the call returns no events.
    pub async fn load_clock_history(&self) -> Result<Vec<ClockEvent>, ClientError> {
        let ticket = self.inner.lock().await.history.begin_fetch()?;
        debug!(page = ticket.cursor, "history: fetching page");

        let result = self
            .intercept(self.api.history_page(ticket.query()).await)
            .await;

        let mut guard = self.inner.lock().await;
        match result {
            Ok(events) => {
                if guard.history.complete_fetch(ticket, events.clone()).is_none() {
                    return Ok(Vec::new());
                }
                drop(guard);
                let _ = self.events.send(ClientEvent::EventsRecorded {
                    ids: events.iter().map(|event| event.id).collect(),
                });
                Ok(events)
            }
            Err(err) => {
                guard.history.abort_fetch(ticket);
                Err(err)
            }
        }
    }

    /// Posts the interceptor message for a failed call and hands the result
    /// back untouched.
    async fn intercept<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(err) = &result {
            if let Some(text) = intercepted_message(err) {
                self.show_notification(text).await;
            }
        }
        result
    }

    async fn set_break(&self, on_break: bool) -> Result<ClockStatus, ClientError> {
        let update = ClockStatusUpdate {
            clocked: self.inner.lock().await.clock.clocked,
            on_break,
        };
        let status = self
            .intercept(self.api.update_clock_status(update).await)
            .await?;
        info!(
            clocked = status.clocked,
            on_break = status.on_break,
            "clock: break status updated"
        );
        self.store_clock_status(status).await;
        Ok(status)
    }

    async fn store_clock_status(&self, status: ClockStatus) {
        self.inner.lock().await.clock = status;
        let _ = self.events.send(ClientEvent::ClockStatusChanged(status));
    }

    async fn apply_clock_event<F>(&self, event: ClockEvent, update: F) -> Result<ClockEvent, ClientError>
    where
        F: FnOnce(&mut ClockStatus),
    {
        let status = {
            let mut guard = self.inner.lock().await;
            guard.history.record_events([event.clone()]);
            update(&mut guard.clock);
            guard.clock
        };
        info!(
            event_id = event.id.0,
            action = ?event.action,
            clocked = status.clocked,
            on_break = status.on_break,
            "clock: event recorded"
        );
        let _ = self
            .events
            .send(ClientEvent::EventsRecorded { ids: vec![event.id] });
        let _ = self.events.send(ClientEvent::ClockStatusChanged(status));
        Ok(event)
    }

    async fn set_session(&self, user: UserProfile) {
        self.inner.lock().await.session = Some(user.clone());
        if let Err(err) = self.session_cache.store(&user).await {
            warn!(error = %err, "session: failed to cache signed-in user");
        }
        let _ = self.events.send(ClientEvent::SessionChanged(Some(user)));
    }

    async fn clear_session(&self) {
        let had_session = self.inner.lock().await.session.take().is_some();
        if let Err(err) = self.session_cache.erase().await {
            warn!(error = %err, "session: failed to erase cached user");
        }
        if had_session {
            let _ = self.events.send(ClientEvent::SessionChanged(None));
        }
    }
}

/// User embedded in a login payload, either as `authenticated_user` or as the
/// `response.user` envelope.
fn session_user_from_login(payload: &Value) -> Option<UserProfile> {
    payload
        .get("authenticated_user")
        .or_else(|| payload.pointer("/response/user"))
        .filter(|user| !user.is_null())
        .and_then(|user| serde_json::from_value(user.clone()).ok())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
