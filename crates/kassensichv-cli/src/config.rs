/*
[INPUT]:  YAML configuration file and process environment
[OUTPUT]: Parsed CLI configuration
[POS]:    Configuration layer - client setup
[UPDATE]: When adding new configuration options
*/

use anyhow::{Context, Result, bail};
use kassensichv_client::http::DEFAULT_BASE_URL;
use kassensichv_client::{ClientConfig, Credentials};
use serde::{Deserialize, Serialize};

pub const API_KEY_ENV: &str = "API_KEY";
pub const API_SECRET_ENV: &str = "API_SECRET";
pub const BASE_URL_ENV: &str = "BASE_URL";

/// Top-level configuration for the CLI
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CliConfig {
    /// API key issued for the organization
    #[serde(default)]
    pub api_key: Option<String>,
    /// Secret paired with the API key
    #[serde(default)]
    pub api_secret: Option<String>,
    /// KassenSichV API root, including the version segment
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// JSON-RPC endpoint of the signing module
    #[serde(default)]
    pub signer_url: Option<String>,
    /// Request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl CliConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("read config file {path}"))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document parses as unit, not as an empty mapping
        if content.trim().is_empty() {
            return Ok(Self {
                base_url: default_base_url(),
                ..Self::default()
            });
        }
        serde_yaml::from_str(content).context("parse config yaml")
    }

    /// Let `API_KEY`, `API_SECRET` and `BASE_URL` win over file values
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(API_KEY_ENV) {
            self.api_key = Some(value);
        }
        if let Some(value) = lookup(API_SECRET_ENV) {
            self.api_secret = Some(value);
        }
        if let Some(value) = lookup(BASE_URL_ENV) {
            self.base_url = value;
        }
    }

    pub fn credentials(&self) -> Result<Credentials> {
        let (Some(key), Some(secret)) = (&self.api_key, &self.api_secret) else {
            bail!("api_key and api_secret are required (config file or {API_KEY_ENV}/{API_SECRET_ENV})");
        };
        Ok(Credentials::new(key.clone(), secret.clone()))
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default().with_base_url(self.base_url.clone());
        if let Some(secs) = self.timeout_secs {
            config.timeout = std::time::Duration::from_secs(secs);
        }
        config
    }
}
