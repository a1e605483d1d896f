/*
[INPUT]:  HTTP client configuration and caller requests
[OUTPUT]: HTTP responses after auth and transaction interception
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding pipeline stages or changing client behavior
*/

pub mod base;
pub mod client;
pub mod error;
pub mod pipeline;
pub mod request;
pub mod transport;

pub use error::{KassensichvError, Result};

pub use base::{BaseLayer, ClientConfig, DEFAULT_BASE_URL, user_agent};
pub use client::{Diagnostics, KassensichvClient};
pub use pipeline::{Disposition, MAX_RETRIES, Pipeline, Stage};
pub use request::{Request, RequestDescriptor, Response};
pub use transport::{ReqwestTransport, Transport};
