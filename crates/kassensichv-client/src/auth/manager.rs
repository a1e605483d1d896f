/*
[INPUT]:  API credentials, base request layer and transport
[OUTPUT]: Bearer tokens on outgoing requests, background token refresh
[POS]:    Auth layer - orchestrates authentication lifecycle
[UPDATE]: When auth endpoints, refresh policy or retry rules change
*/

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tokio::sync::Mutex;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};
use url::Url;

use crate::http::{
    BaseLayer, Disposition, KassensichvError, Request, RequestDescriptor, Response, Result, Stage,
    Transport,
};
use crate::types::{AuthRequest, AuthResponse};

use super::{AuthContext, AuthSnapshot, Credentials};

/// Auth endpoint, relative to the base URL
pub const AUTH_PATH: &str = "/auth";

/// Lower bound for the refresh period of degenerate token lifetimes
const MIN_REFRESH_PERIOD: Duration = Duration::from_millis(100);

const MALFORMED_JWT_MARKER: &str = "could not parse jwt";

struct AuthInner {
    credentials: Credentials,
    base: BaseLayer,
    transport: Arc<dyn Transport>,
    auth_url: Url,
    context: AuthContext,
    /// Serializes authenticate/refresh so concurrent callers share one round trip
    auth_lock: Mutex<()>,
    auth_calls: AtomicU64,
    closed: AtomicBool,
}

/// Keeps every outgoing request supplied with a valid bearer token
#[derive(Clone)]
pub struct AuthManager {
    inner: Arc<AuthInner>,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("credentials", &self.inner.credentials)
            .field("auth_url", &self.inner.auth_url.as_str())
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    pub fn new(
        credentials: Credentials,
        base: BaseLayer,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let auth_url = base.resolve_url(AUTH_PATH)?;
        Ok(Self {
            inner: Arc::new(AuthInner {
                credentials,
                base,
                transport,
                auth_url,
                context: AuthContext::new(),
                auth_lock: Mutex::new(()),
                auth_calls: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Exchange the API key pair for a fresh token pair and (re)arm the refresh task
    pub async fn authenticate(&self) -> Result<()> {
        let _guard = self.inner.auth_lock.lock().await;
        self.inner.authenticate_locked().await
    }

    /// Exchange the refresh token for a fresh token pair
    pub async fn refresh(&self) -> Result<()> {
        self.inner.refresh().await.map(|_| ())
    }

    /// Current access token, authenticating first if there is none
    pub async fn access_token(&self) -> Result<String> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(KassensichvError::Closed);
        }
        if let Some(token) = self.inner.context.access_token() {
            return Ok(token);
        }
        self.inner.ensure_authenticated().await
    }

    /// Cancel the refresh task and refuse further requests
    pub fn shutdown(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            self.inner.context.disarm();
            info!("auth manager shut down; token refresh cancelled");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.context.snapshot()
    }

    /// Number of successful and failed calls to the auth endpoint
    pub fn auth_calls(&self) -> u64 {
        self.inner.auth_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn context(&self) -> &AuthContext {
        &self.inner.context
    }

    fn is_auth_endpoint(&self, request: &RequestDescriptor) -> bool {
        request.url.path() == self.inner.auth_url.path()
    }
}

impl AuthInner {
    async fn ensure_authenticated(self: &Arc<Self>) -> Result<String> {
        let _guard = self.auth_lock.lock().await;
        // Another request may have authenticated while we waited for the lock.
        if let Some(token) = self.context.access_token() {
            return Ok(token);
        }
        debug!("fetching fresh access token");
        self.authenticate_locked().await?;
        self.context.access_token().ok_or_else(|| KassensichvError::Authentication {
            status: None,
            message: "auth endpoint returned no access token".to_string(),
        })
    }

    /// Caller must hold `auth_lock`
    async fn authenticate_locked(self: &Arc<Self>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KassensichvError::Closed);
        }
        self.context.disarm();

        let tokens = self.fetch_token(&self.credentials.auth_request()).await?;
        // shutdown() may have run while the auth call was in flight
        if self.closed.load(Ordering::Acquire) {
            return Err(self.discard_after_shutdown());
        }
        let interval = self.context.store_authenticated(&tokens);

        let handle = tokio::spawn(run_refresh_loop(Arc::downgrade(self), interval));
        self.context.arm(handle);
        // closed is set before shutdown() disarms
        if self.closed.load(Ordering::Acquire) {
            return Err(self.discard_after_shutdown());
        }

        info!(
            refresh_interval_secs = interval.as_secs_f64(),
            "authenticated; scheduling token refresh"
        );
        Ok(())
    }

    fn discard_after_shutdown(&self) -> KassensichvError {
        self.context.disarm();
        self.context.clear();
        debug!("discarding token pair fetched during shutdown");
        KassensichvError::Closed
    }

    async fn refresh(&self) -> Result<Duration> {
        let _guard = self.auth_lock.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(KassensichvError::Closed);
        }
        let refresh_token =
            self.context
                .refresh_token()
                .ok_or_else(|| KassensichvError::Authentication {
                    status: None,
                    message: "no refresh token available".to_string(),
                })?;

        let tokens = self
            .fetch_token(&AuthRequest::RefreshToken { refresh_token })
            .await?;
        let interval = self.context.store_refreshed(&tokens);
        debug!(
            refresh_interval_secs = interval.as_secs_f64(),
            "access token refreshed"
        );
        Ok(interval)
    }

    async fn fetch_token(&self, body: &AuthRequest) -> Result<AuthResponse> {
        self.auth_calls.fetch_add(1, Ordering::Relaxed);

        let request = self.base.prepare(Request::post(AUTH_PATH).json(body)?)?;
        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            warn!(
                grant = body.grant(),
                status = response.status.as_u16(),
                "auth endpoint rejected request"
            );
            return Err(KassensichvError::Authentication {
                status: Some(response.status),
                message: response.text(),
            });
        }

        let tokens: AuthResponse = response.json()?;
        debug!(
            grant = body.grant(),
            access_token = %token_preview(&tokens.access_token),
            "fetched fresh access token"
        );
        Ok(tokens)
    }
}

async fn run_refresh_loop(inner: Weak<AuthInner>, mut period: Duration) {
    let mut ticker = refresh_ticker(period);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            debug!("client dropped; stopping token refresh");
            return;
        };
        if inner.closed.load(Ordering::Acquire) {
            debug!("client shut down; stopping token refresh");
            return;
        }
        match inner.refresh().await {
            Err(KassensichvError::Closed) => return,
            Ok(next) if next != period => {
                debug!(
                    refresh_interval_secs = next.as_secs_f64(),
                    "refresh interval changed; rescheduling"
                );
                period = next;
                ticker = refresh_ticker(period);
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "token refresh failed; keeping current token");
            }
        }
    }
}

fn refresh_ticker(period: Duration) -> Interval {
    let period = period.max(MIN_REFRESH_PERIOD);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Whether the server rejected the bearer token of a request
pub fn is_token_rejected(response: &Response) -> bool {
    match response.status {
        StatusCode::UNAUTHORIZED => true,
        StatusCode::BAD_REQUEST => response.text().contains(MALFORMED_JWT_MARKER),
        _ => false,
    }
}

fn token_preview(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{prefix}...")
}

#[async_trait]
impl Stage for AuthManager {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn before_send(&self, request: &mut RequestDescriptor) -> Result<()> {
        if self.is_auth_endpoint(request) {
            return Ok(());
        }
        let token = self.access_token().await?;
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| KassensichvError::InvalidHeader(format!("authorization: {e}")))?;
        request.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    async fn after_receive(
        &self,
        request: &RequestDescriptor,
        response: &Response,
    ) -> Result<Disposition> {
        if self.is_auth_endpoint(request) || !is_token_rejected(response) {
            return Ok(Disposition::Accept);
        }

        let cleared = self.inner.context.invalidate(request.bearer_token());
        warn!(
            status = response.status.as_u16(),
            cleared,
            "access token rejected; re-authenticating and retrying"
        );
        Ok(Disposition::Retry)
    }
}
