/*
[INPUT]:  Auth endpoint schema
[OUTPUT]: Typed request/response bodies for POST /auth
[POS]:    Data layer - authentication wire types
[UPDATE]: When the auth endpoint schema changes
*/

use serde::{Deserialize, Serialize};

/// Body of `POST /auth`: either the API key pair or a refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthRequest {
    ApiKey { api_key: String, api_secret: String },
    RefreshToken { refresh_token: String },
}

impl AuthRequest {
    pub fn grant(&self) -> &'static str {
        match self {
            AuthRequest::ApiKey { .. } => "api_key",
            AuthRequest::RefreshToken { .. } => "refresh_token",
        }
    }
}

/// Token pair returned by `POST /auth`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the refresh token in seconds
    pub refresh_token_expires_in: u64,
}
