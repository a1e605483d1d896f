/*
[INPUT]:  Signing module endpoint and transaction payloads
[OUTPUT]: Signed envelopes via JSON-RPC 2.0
[POS]:    Signing layer - remote signing module client
[UPDATE]: When the signing module RPC methods change
*/

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::http::{ClientConfig, KassensichvError, Result};
use crate::types::{JsonRpcRequest, JsonRpcResponse};

use super::{SignedEnvelope, SignerVersion, TransactionSigner};

const SIGN_TRANSACTION_METHOD: &str = "sign-transaction";
const VERSION_METHOD: &str = "version";

/// Signer that talks JSON-RPC to a signing module over HTTP
#[derive(Debug, Clone)]
pub struct RpcTransactionSigner {
    http_client: Client,
    endpoint: Url,
}

impl RpcTransactionSigner {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_config(endpoint, &ClientConfig::default())
    }

    /// Reuses the timeouts of a client configuration
    pub fn with_config(endpoint: &str, config: &ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: Url::parse(endpoint)?,
        })
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T> {
        let request = JsonRpcRequest::new(method, params);
        debug!(method, id = %request.id, "invoking signing module");

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| KassensichvError::signing(format!("signing module unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KassensichvError::signing(format!(
                "signing module answered {status}: {body}"
            )));
        }

        let response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| KassensichvError::signing(format!("invalid JSON-RPC response: {e}")))?;

        if let Some(error) = response.error {
            return Err(KassensichvError::Signing {
                code: Some(error.code),
                message: error.message,
            });
        }

        let result = response
            .result
            .ok_or_else(|| KassensichvError::signing(format!("{method} returned no result")))?;
        serde_json::from_value(result)
            .map_err(|e| KassensichvError::signing(format!("unexpected {method} result: {e}")))
    }
}

#[async_trait]
impl TransactionSigner for RpcTransactionSigner {
    async fn sign_tx(&self, payload: &serde_json::Value) -> Result<SignedEnvelope> {
        self.invoke(SIGN_TRANSACTION_METHOD, vec![payload.clone()])
            .await
    }

    async fn version(&self) -> Result<SignerVersion> {
        self.invoke(VERSION_METHOD, Vec::new()).await
    }
}
