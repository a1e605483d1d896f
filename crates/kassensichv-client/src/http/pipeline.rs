/*
[INPUT]:  Ordered request stages and a transport
[OUTPUT]: Final response after pre-send decoration and bounded retry
[POS]:    HTTP layer - request pipeline (before-send / after-receive hooks)
[UPDATE]: When changing stage ordering or retry policy
*/

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::http::{RequestDescriptor, Response, Result, Transport};

/// Retries allowed per logical request when a stage asks for one
pub const MAX_RETRIES: usize = 1;

/// What a stage wants done with a received response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Hand the response back to the caller
    Accept,
    /// Re-run the whole pre-send chain and send again
    Retry,
}

/// A decorating step around the transport.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Mutate the request before it is sent. Errors abort the request.
    async fn before_send(&self, request: &mut RequestDescriptor) -> Result<()>;

    /// Inspect the response to the request exactly as it was sent
    async fn after_receive(
        &self,
        _request: &RequestDescriptor,
        _response: &Response,
    ) -> Result<Disposition> {
        Ok(Disposition::Accept)
    }
}

/// Ordered list of stages wrapped around a transport.
///
/// Stages run `before_send` in insertion order (first = outermost) and
/// `after_receive` in reverse order.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|stage| stage.name()).collect();
        f.debug_struct("Pipeline").field("stages", &names).finish()
    }
}

impl Pipeline {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            stages: Vec::new(),
            transport,
        }
    }

    /// Add a stage inside the ones already registered
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Run the request through every stage and the transport.
    ///
    /// The descriptor keeps the mutations of the first attempt, so a retry
    /// sends the same rewritten request with freshly injected headers.
    pub async fn execute(&self, mut request: RequestDescriptor) -> Result<Response> {
        let mut retries = 0;
        loop {
            for stage in &self.stages {
                stage.before_send(&mut request).await?;
            }

            let response = self.transport.send(&request).await?;

            match self.after_receive(&request, &response).await? {
                Disposition::Retry if retries < MAX_RETRIES => {
                    retries += 1;
                    debug!(
                        url = %request.url,
                        status = response.status.as_u16(),
                        retries,
                        "retrying request"
                    );
                }
                _ => return Ok(response),
            }
        }
    }

    async fn after_receive(
        &self,
        request: &RequestDescriptor,
        response: &Response,
    ) -> Result<Disposition> {
        for stage in self.stages.iter().rev() {
            if stage.after_receive(request, response).await? == Disposition::Retry {
                debug!(stage = stage.name(), "stage requested retry");
                return Ok(Disposition::Retry);
            }
        }
        Ok(Disposition::Accept)
    }
}
