/*
[INPUT]:  Signing capability, API credentials and client configuration
[OUTPUT]: Authenticated, transaction-signing request entry point
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing pipeline composition
*/

use std::sync::Arc;

use tracing::debug;

use crate::auth::{AuthManager, AuthSnapshot, Credentials};
use crate::http::{
    BaseLayer, ClientConfig, KassensichvError, Pipeline, ReqwestTransport, Request, Response,
    Result, Transport,
};
use crate::sma::{SignerVersion, SigningAdapter, TransactionSigner};
use crate::tx::TxInterceptor;

/// Main HTTP client for the KassenSichV API
///
/// Requests pass through the transaction interceptor, then the auth manager,
/// then the transport. Clones share one token pair and one refresh task.
#[derive(Debug, Clone)]
pub struct KassensichvClient {
    base: BaseLayer,
    pipeline: Pipeline,
    auth: AuthManager,
    signer: SigningAdapter,
    diagnostics: bool,
}

impl KassensichvClient {
    /// Create a client with default configuration
    pub fn new(
        signer: Arc<dyn TransactionSigner>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Result<Self> {
        Self::with_config(
            signer,
            Credentials::new(api_key, api_secret),
            ClientConfig::default(),
        )
    }

    /// Create a client with custom configuration
    pub fn with_config(
        signer: Arc<dyn TransactionSigner>,
        credentials: Credentials,
        config: ClientConfig,
    ) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Self::with_transport(signer, credentials, config, transport)
    }

    /// Create a client on top of a custom transport
    pub fn with_transport(
        signer: Arc<dyn TransactionSigner>,
        credentials: Credentials,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let base = BaseLayer::new(&config)?;
        let signer = SigningAdapter::new(signer);
        let auth = AuthManager::new(credentials, base.clone(), transport.clone())?;

        let pipeline = Pipeline::new(transport)
            .with_stage(Arc::new(TxInterceptor::new(signer.clone())))
            .with_stage(Arc::new(auth.clone()));

        debug!(base_url = %base.base_url(), "client created");

        Ok(Self {
            base,
            pipeline,
            auth,
            signer,
            diagnostics: config.diagnostics,
        })
    }

    /// Send a request relative to the base URL.
    ///
    /// Non-success statuses left after the auth retry surface as
    /// [`KassensichvError::Http`].
    pub async fn request(&self, request: Request) -> Result<Response> {
        let descriptor = self.base.prepare(request)?;
        let response = self.pipeline.execute(descriptor).await?;
        if !response.is_success() {
            return Err(KassensichvError::http_error(response.status, response.text()));
        }
        Ok(response)
    }

    /// Version of the injected signing module
    pub async fn signer_version(&self) -> Result<SignerVersion> {
        self.signer.version().await
    }

    /// Stop background token refresh; later requests fail with `Closed`
    pub fn shutdown(&self) {
        self.auth.shutdown();
    }

    /// Inspection hooks, present only when enabled in [`ClientConfig`]
    pub fn diagnostics(&self) -> Option<Diagnostics> {
        self.diagnostics.then(|| Diagnostics {
            auth: self.auth.clone(),
        })
    }
}

/// Read and poke at the client's auth state from tests and tooling
#[derive(Debug, Clone)]
pub struct Diagnostics {
    auth: AuthManager,
}

impl Diagnostics {
    pub fn auth_snapshot(&self) -> AuthSnapshot {
        self.auth.snapshot()
    }

    /// Replace the access token, e.g. to simulate a broken or missing token
    pub fn set_access_token(&self, token: Option<String>) {
        self.auth.context().set_access_token(token);
    }

    /// Calls made to the auth endpoint so far
    pub fn auth_calls(&self) -> u64 {
        self.auth.auth_calls()
    }
}
