/*
[INPUT]:  Client configuration and caller requests
[OUTPUT]: Resolved request descriptors with static defaults applied
[POS]:    HTTP layer - base request layer (endpoint, JSON, default headers)
[UPDATE]: When changing default headers or URL resolution
*/

use reqwest::header::{
    ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
use std::time::Duration;
use url::Url;

use crate::http::{KassensichvError, Request, RequestDescriptor, Result};

/// Base URL for the KassenSichV API
pub const DEFAULT_BASE_URL: &str = "https://kassensichv.fiskaly.com/api/v0";

const SDK_NAME: &str = env!("CARGO_PKG_NAME");
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
const SDK_HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");
const JSON_CONTENT_TYPE: &str = "application/json";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Expose [`crate::Diagnostics`] on the client
    pub diagnostics: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            diagnostics: false,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }
}

/// `user-agent` sent with every request
pub fn user_agent() -> String {
    format!("{SDK_NAME}-rust/{SDK_VERSION} ({SDK_HOMEPAGE})")
}

/// Applies the fixed endpoint and headers to every outgoing request.
#[derive(Debug, Clone)]
pub struct BaseLayer {
    base_url: Url,
    default_headers: HeaderMap,
}

impl BaseLayer {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(KassensichvError::Config(format!(
                "base URL cannot be a base: {}",
                config.base_url
            )));
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
        default_headers.insert(USER_AGENT, header_value(&user_agent())?);

        Ok(Self {
            base_url,
            default_headers,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append a relative path (with or without leading slash) to the base URL.
    ///
    /// Unlike [`Url::join`], an absolute path keeps the base path prefix.
    pub fn resolve_url(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let joined = if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        };
        Ok(Url::parse(&joined)?)
    }

    /// Build the descriptor the pipeline stages operate on
    pub fn prepare(&self, request: Request) -> Result<RequestDescriptor> {
        let mut url = self.resolve_url(&request.path)?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }

        let mut descriptor = RequestDescriptor::new(request.method, url);
        descriptor.headers = self.default_headers.clone();

        if let Some(body) = request.body {
            let bytes = serde_json::to_vec(&body)?;
            descriptor
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            descriptor
                .headers
                .insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            descriptor.body = Some(bytes);
        }

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| KassensichvError::InvalidHeader(format!("{name}: {e}")))?;
            descriptor.headers.insert(name, header_value(value)?);
        }

        Ok(descriptor)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| KassensichvError::InvalidHeader(format!("{value}: {e}")))
}
