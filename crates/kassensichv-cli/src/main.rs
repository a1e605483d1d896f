/*
[INPUT]:  CLI arguments, YAML configuration file, environment overrides
[OUTPUT]: API responses and signer information printed to stdout
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags or subcommands
*/

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use kassensichv_client::{
    KassensichvClient, Method, MockTransactionSigner, Request, RpcTransactionSigner,
    TransactionSigner,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "kassensichv", version, about = "KassenSichV API client")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Sign transactions with the in-process mock signer
    #[arg(long = "mock-signer")]
    mock_signer: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one request through the client
    Request {
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long)]
        path: String,
        /// Query parameter as key=value, repeatable
        #[arg(long = "query", value_name = "KEY=VALUE", value_parser = parse_query_pair)]
        query: Vec<(String, String)>,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
    /// Print the signing module version
    SignerVersion,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let mut config = match &args.config_path {
        Some(path) => load_config(path)?,
        None => CliConfig::from_yaml("")?,
    };
    config.apply_env(|name| std::env::var(name).ok());
    info!(base_url = %config.base_url, mock_signer = args.mock_signer, "configuration loaded");

    let signer = build_signer(&config, args.mock_signer)?;
    let client = KassensichvClient::with_config(
        signer,
        config.credentials()?,
        config.client_config(),
    )
    .context("create client")?;

    let outcome = run(&client, args.command).await;
    client.shutdown();
    outcome
}

async fn run(client: &KassensichvClient, command: Command) -> Result<()> {
    match command {
        Command::Request {
            method,
            path,
            query,
            body,
        } => {
            let request = build_request(&method, &path, query, body.as_deref())?;
            let response = client.request(request).await.context("send request")?;
            println!("{}", response.status);
            println!("{}", response.text());
        }
        Command::SignerVersion => {
            let version = client
                .signer_version()
                .await
                .context("query signer version")?;
            println!("{}", serde_json::to_string_pretty(&version)?);
        }
    }
    Ok(())
}

fn build_signer(config: &CliConfig, mock: bool) -> Result<Arc<dyn TransactionSigner>> {
    if mock {
        return Ok(Arc::new(MockTransactionSigner::new()));
    }
    let url = config
        .signer_url
        .as_deref()
        .context("signer_url is required unless --mock-signer is set")?;
    let signer = RpcTransactionSigner::with_config(url, &config.client_config())
        .context("create signer client")?;
    Ok(Arc::new(signer))
}

fn build_request(
    method: &str,
    path: &str,
    query: Vec<(String, String)>,
    body: Option<&str>,
) -> Result<Request> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method {method}"))?;
    let mut request = Request::new(method, path);
    for (key, value) in query {
        request = request.query(key, value);
    }
    if let Some(body) = body {
        let body: serde_json::Value = serde_json::from_str(body).context("parse --body as JSON")?;
        request = request.body(body);
    }
    Ok(request)
}

fn parse_query_pair(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got {raw}"))?;
    if key.is_empty() {
        return Err(anyhow!("empty query key in {raw}"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: &PathBuf) -> Result<CliConfig> {
    let path_str = path.to_str().context("config path must be valid utf-8")?;
    CliConfig::from_file(path_str).context("load config")
}
