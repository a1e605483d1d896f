/*
[INPUT]:  Unsigned transaction payloads
[OUTPUT]: Signed envelopes from the injected signing capability
[POS]:    Signing layer - signing capability abstraction
[UPDATE]: When adding signer backends or changing envelope format
*/

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{KassensichvError, Result};

/// Transaction payload plus the opaque signed log produced for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub payload: serde_json::Value,
    pub log: serde_json::Value,
}

/// Build information reported by the signing module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignerVersion {
    pub commit_hash: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Trait for transaction signing backends
///
/// Implement this for a native signing module, a remote signer or a test
/// double. Implementations must not retry internally.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Sign a transaction payload
    async fn sign_tx(&self, payload: &serde_json::Value) -> Result<SignedEnvelope>;

    /// Report the signing module version
    async fn version(&self) -> Result<SignerVersion>;
}

/// Adapts an injected [`TransactionSigner`] to the transaction interceptor.
///
/// Every failure surfaces as [`KassensichvError::Signing`].
#[derive(Clone)]
pub struct SigningAdapter {
    signer: Arc<dyn TransactionSigner>,
}

impl std::fmt::Debug for SigningAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningAdapter").finish_non_exhaustive()
    }
}

impl SigningAdapter {
    pub fn new(signer: Arc<dyn TransactionSigner>) -> Self {
        Self { signer }
    }

    pub async fn sign_tx(&self, tss_id: &str, payload: &serde_json::Value) -> Result<SignedEnvelope> {
        debug!(tss_id, "signing transaction");
        self.signer.sign_tx(payload).await.map_err(into_signing_error)
    }

    pub async fn version(&self) -> Result<SignerVersion> {
        self.signer.version().await.map_err(into_signing_error)
    }
}

fn into_signing_error(err: KassensichvError) -> KassensichvError {
    match err {
        KassensichvError::Signing { .. } => err,
        other => KassensichvError::signing(other.to_string()),
    }
}
