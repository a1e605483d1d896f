/*
[INPUT]:  Resolved request descriptors
[OUTPUT]: Raw responses (status, headers, body)
[POS]:    HTTP layer - network transport capability
[UPDATE]: When changing connection options or swapping HTTP backends
*/

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::http::{ClientConfig, RequestDescriptor, Response, Result};

/// Sends a fully prepared request over the network.
///
/// Non-success statuses are returned as responses, not errors, so pipeline
/// stages can inspect them.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestDescriptor) -> Result<Response>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self { http_client })
    }

    pub fn from_client(http_client: Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<Response> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = self
            .http_client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        debug!(status = status.as_u16(), bytes = body.len(), "received response");

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
