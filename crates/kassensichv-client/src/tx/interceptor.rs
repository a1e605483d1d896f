/*
[INPUT]:  Outgoing request descriptors and the signing adapter
[OUTPUT]: Transaction upserts rewritten to signed `/log` requests
[POS]:    Transaction layer - transparent signing of transaction payloads
[UPDATE]: When the transaction endpoint layout or envelope format changes
*/

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Method;
use reqwest::header::{CONTENT_LENGTH, HeaderValue};
use tracing::debug;

use crate::http::{KassensichvError, RequestDescriptor, Result, Stage};
use crate::sma::SigningAdapter;

const LOG_SEGMENT: &str = "/log";

fn tx_path_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)^/api/v\d/tss/([^/?]+)/tx/([^/?]+)(?:\?.*)?$").unwrap()
    })
}

/// Whether a request is a transaction upsert that must be signed
pub fn is_tx_upsert(method: &Method, path_and_query: &str) -> bool {
    method.as_str().eq_ignore_ascii_case("PUT") && tx_path_regex().is_match(path_and_query)
}

/// Extract the TSS id from `/api/v<digit>/tss/<tss_id>/tx/<tx_id>`
pub fn parse_tss_id(path_and_query: &str) -> Result<&str> {
    tx_path_regex()
        .captures(path_and_query)
        .and_then(|captures| captures.get(1))
        .map(|tss_id| tss_id.as_str())
        .ok_or_else(|| {
            KassensichvError::MalformedRequest(format!(
                "no TSS id in transaction path {path_and_query}"
            ))
        })
}

/// Insert `/log` between path and query string.
///
/// `/tss/X/tx/Y?rev=1` becomes `/tss/X/tx/Y/log?rev=1`.
pub fn override_tx_path(path_and_query: &str) -> String {
    match path_and_query.split_once('?') {
        Some((path, query)) => format!("{path}{LOG_SEGMENT}?{query}"),
        None => format!("{path_and_query}{LOG_SEGMENT}"),
    }
}

/// Pipeline stage signing transaction upserts before they leave the process
#[derive(Debug, Clone)]
pub struct TxInterceptor {
    signer: SigningAdapter,
}

impl TxInterceptor {
    pub fn new(signer: SigningAdapter) -> Self {
        Self { signer }
    }

    pub fn signer(&self) -> &SigningAdapter {
        &self.signer
    }

    async fn intercept(&self, request: &mut RequestDescriptor, path: &str) -> Result<()> {
        debug!(url = %request.url, "intercepting transaction upsert");

        let tss_id = parse_tss_id(path)?;
        let body = request.body.as_deref().ok_or_else(|| {
            KassensichvError::MalformedRequest(format!("transaction upsert without body: {path}"))
        })?;
        let payload: serde_json::Value =
            serde_json::from_slice(body).map_err(KassensichvError::InvalidPayload)?;

        let envelope = self.signer.sign_tx(tss_id, &payload).await?;
        let content = serde_json::to_vec(&serde_json::json!({
            "payload": payload,
            "log": envelope.log,
        }))?;

        request.set_path_and_query(&override_tx_path(path));
        request
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(content.len()));
        request.body = Some(content);

        debug!(tss_id, url = %request.url, "transaction signed");
        Ok(())
    }
}

#[async_trait]
impl Stage for TxInterceptor {
    fn name(&self) -> &'static str {
        "tx-interceptor"
    }

    async fn before_send(&self, request: &mut RequestDescriptor) -> Result<()> {
        let path = request.path_and_query();
        if !is_tx_upsert(&request.method, &path) {
            return Ok(());
        }
        self.intercept(request, &path).await
    }
}
