/*
[INPUT]:  API credentials and auth endpoint responses
[OUTPUT]: Bearer tokens, refresh scheduling and auth errors
[POS]:    Auth layer - handles KassenSichV API authentication
[UPDATE]: When auth flow or token refresh policy changes
*/

pub mod context;
pub mod credentials;
pub mod manager;

pub use context::{AuthContext, AuthSnapshot, refresh_interval_for};
pub use credentials::Credentials;
pub use manager::{AUTH_PATH, AuthManager, is_token_rejected};
