/*
[INPUT]:  Transaction payloads
[OUTPUT]: Deterministic base64 signed logs
[POS]:    Signing layer - in-process signer for tests and sandbox use
[UPDATE]: When changing mock log encoding
*/

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::http::Result;

use super::{SignedEnvelope, SignerVersion, TransactionSigner};

/// Mock signer whose log is the base64-encoded JSON of the payload
#[derive(Debug, Clone, Default)]
pub struct MockTransactionSigner {
    signed: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl MockTransactionSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log produced for a payload
    pub fn encode_log(payload: &serde_json::Value) -> Result<String> {
        Ok(BASE64.encode(serde_json::to_vec(payload)?))
    }

    /// Payloads signed so far, oldest first
    pub fn signed_payloads(&self) -> Vec<serde_json::Value> {
        self.signed
            .lock()
            .map(|signed| signed.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TransactionSigner for MockTransactionSigner {
    async fn sign_tx(&self, payload: &serde_json::Value) -> Result<SignedEnvelope> {
        let log = Self::encode_log(payload)?;
        if let Ok(mut signed) = self.signed.lock() {
            signed.push(payload.clone());
        }
        Ok(SignedEnvelope {
            payload: payload.clone(),
            log: serde_json::Value::String(log),
        })
    }

    async fn version(&self) -> Result<SignerVersion> {
        Ok(SignerVersion {
            commit_hash: "mock".to_string(),
            extra: serde_json::Map::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_signer() {
        let signer = MockTransactionSigner::new();
        let payload = serde_json::json!({"foo": "bar"});

        let envelope = signer.sign_tx(&payload).await.unwrap();
        assert_eq!(envelope.payload, payload);

        let decoded = BASE64.decode(envelope.log.as_str().unwrap()).unwrap();
        assert_eq!(decoded, br#"{"foo":"bar"}"#.to_vec());
        assert_eq!(signer.signed_payloads(), vec![payload]);
    }

    #[tokio::test]
    async fn test_mock_version() {
        let version = MockTransactionSigner::new().version().await.unwrap();
        assert!(!version.commit_hash.is_empty());
    }
}
