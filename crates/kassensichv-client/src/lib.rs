/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public KassenSichV client crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod sma;
pub mod tx;
pub mod types;

// Re-export commonly used types from auth
pub use auth::{AuthManager, AuthSnapshot, Credentials};

// Re-export commonly used types from http
pub use http::{
    ClientConfig,
    Diagnostics,
    KassensichvClient,
    KassensichvError,
    Request,
    Response,
    Result,
};

// Re-export commonly used types from sma
pub use sma::{
    MockTransactionSigner,
    RpcTransactionSigner,
    SignedEnvelope,
    SignerVersion,
    TransactionSigner,
};

pub use tx::override_tx_path;

pub use reqwest::{Method, StatusCode};
