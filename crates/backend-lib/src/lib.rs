// ============================
// ems-backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the employee-management auth server.

pub mod admin;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod storage;
pub mod validation;

use crate::auth::{JwtSessionIssuer, LoginEvent, LoginGuard, SessionIssuer};
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::storage::AccountStore;
use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Capacity of the login event channel; slow subscribers miss old events
const LOGIN_EVENT_CAPACITY: usize = 64;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Credential verification and lockout guard
    pub guard: Arc<LoginGuard>,
    /// Session token issuer
    pub sessions: Arc<dyn SessionIssuer>,
    /// Account storage backend
    pub store: Arc<dyn AccountStore>,
    /// Settings the server was started with
    pub settings: Arc<Settings>,
    login_events: broadcast::Sender<LoginEvent>,
}

impl AppState {
    /// Create a new application state on the system clock
    pub fn new(store: Arc<dyn AccountStore>, settings: Settings) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    /// Create a new application state on the given clock
    pub fn with_clock(
        store: Arc<dyn AccountStore>,
        settings: Settings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ttl = settings.session.ttl();
        let sessions: Arc<dyn SessionIssuer> = match &settings.session.secret {
            Some(secret) => Arc::new(JwtSessionIssuer::new(
                &SecretString::from(secret.clone()),
                ttl,
                clock.clone(),
            )),
            None => {
                warn!("session.secret is not set; sessions will not survive a restart");
                Arc::new(JwtSessionIssuer::with_ephemeral_key(ttl, clock.clone()))
            },
        };

        let (login_events, _) = broadcast::channel(LOGIN_EVENT_CAPACITY);
        let guard = LoginGuard::new(
            store.clone(),
            sessions.clone(),
            clock,
            settings.lockout.policy(),
        )
        .with_events(login_events.clone());

        Self {
            guard: Arc::new(guard),
            sessions,
            store,
            settings: Arc::new(settings),
            login_events,
        }
    }

    /// Receive an event for every accepted login from now on
    pub fn subscribe_logins(&self) -> broadcast::Receiver<LoginEvent> {
        self.login_events.subscribe()
    }
}
