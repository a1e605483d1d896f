/*
[INPUT]:  Token pairs from the auth endpoint and the refresh task handle
[OUTPUT]: Current bearer token, refresh schedule and diagnostic snapshots
[POS]:    Auth layer - token lifecycle state
[UPDATE]: When changing token storage or refresh scheduling state
*/

use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::types::AuthResponse;

/// Refresh at this fraction of the refresh token lifetime
const REFRESH_DIVISOR: u64 = 10;

/// `refresh_token_expires_in` seconds -> refresh interval
pub fn refresh_interval_for(refresh_token_expires_in: u64) -> Duration {
    Duration::from_millis(refresh_token_expires_in.saturating_mul(1000) / REFRESH_DIVISOR)
}

#[derive(Debug, Default)]
struct TokenState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    refresh_interval: Option<Duration>,
    authenticated_at: Option<DateTime<Utc>>,
    refreshed_at: Option<DateTime<Utc>>,
}

/// Point-in-time copy of the auth state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub refresh_interval: Option<Duration>,
    pub refresh_armed: bool,
    pub authenticated_at: Option<DateTime<Utc>>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Thread-safe token store owning the background refresh task
#[derive(Debug, Default)]
pub struct AuthContext {
    tokens: RwLock<TokenState>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .access_token
            .clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh_token
            .clone()
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refresh_interval
    }

    /// Store a token pair obtained with the API key pair
    pub fn store_authenticated(&self, response: &AuthResponse) -> Duration {
        self.store(response, false)
    }

    /// Store a token pair obtained with the refresh token
    pub fn store_refreshed(&self, response: &AuthResponse) -> Duration {
        self.store(response, true)
    }

    fn store(&self, response: &AuthResponse, refreshed: bool) -> Duration {
        let interval = refresh_interval_for(response.refresh_token_expires_in);
        let mut guard = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        guard.access_token = Some(response.access_token.clone());
        guard.refresh_token = Some(response.refresh_token.clone());
        guard.refresh_interval = Some(interval);
        if refreshed {
            guard.refreshed_at = Some(Utc::now());
        } else {
            guard.authenticated_at = Some(Utc::now());
        }
        interval
    }

    /// Overwrite the access token, leaving refresh state alone
    pub fn set_access_token(&self, token: Option<String>) {
        let mut guard = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        guard.access_token = token;
    }

    /// Forget both tokens and the refresh interval
    pub fn clear(&self) {
        let mut guard = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        guard.access_token = None;
        guard.refresh_token = None;
        guard.refresh_interval = None;
    }

    /// Drop the access token if it is still the one a rejected request used.
    ///
    /// Returns whether the token was cleared. A token that was already
    /// replaced by a concurrent re-authentication is kept.
    pub fn invalidate(&self, rejected: Option<&str>) -> bool {
        let mut guard = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        let matches = match (guard.access_token.as_deref(), rejected) {
            (Some(current), Some(rejected)) => current == rejected,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if matches {
            guard.access_token = None;
        }
        matches
    }

    /// Install a new refresh task, aborting any previous one
    pub fn arm(&self, handle: JoinHandle<()>) {
        let mut guard = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = guard.replace(handle) {
            previous.abort();
        }
    }

    /// Abort the refresh task, if any
    pub fn disarm(&self) {
        let mut guard = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = guard.take() {
            previous.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        let refresh_armed = self.is_armed();
        let guard = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        AuthSnapshot {
            access_token: guard.access_token.clone(),
            refresh_token: guard.refresh_token.clone(),
            refresh_interval: guard.refresh_interval,
            refresh_armed,
            authenticated_at: guard.authenticated_at,
            refreshed_at: guard.refreshed_at,
        }
    }
}

impl Drop for AuthContext {
    fn drop(&mut self) {
        self.disarm();
    }
}
