//! Dashboard API command-line client
//!
//! Drives the request pipeline against a configured dashboard API:
//! signs in, issues authenticated requests (renewing the session when the
//! access token expires), and signs out. Responses are printed to stdout as
//! camelCase JSON; logs go to stderr.

mod cli;
mod config;
mod metrics;

use anyhow::{Context, Result};
use api_client::{ApiClient, ApiRequest};
use clap::Parser;
use keycase::Value;
use session_auth::{PersistentStore, TokenStore};
use session_refresh::Navigator;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::HttpTransport;

use crate::cli::{Cli, Command};
use crate::config::Config;

/// A CLI has no pages: "navigating" to the entry point means the user must
/// sign in again.
struct CliNavigator {
    location: Mutex<String>,
}

impl CliNavigator {
    fn new() -> Self {
        Self {
            location: Mutex::new("/".to_string()),
        }
    }
}

impl Navigator for CliNavigator {
    fn current_location(&self) -> String {
        self.location
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn navigate(&self, to: &str) {
        warn!(entry_point = to, "session ended, run `dashboard-api login` to sign in again");
        *self.location.lock().unwrap_or_else(|e| e.into_inner()) = to.to_string();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = if cli.metrics {
        Some(metrics::install_recorder().context("failed to install metrics recorder")?)
    } else {
        None
    };

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    info!(
        base_url = %config.api.base_url,
        timeout_secs = config.api.timeout_secs,
        session_file = %config.storage.session_file.display(),
        "configuration loaded"
    );

    let store = PersistentStore::load(config.storage.session_file.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open session file {}",
                config.storage.session_file.display()
            )
        })?;
    let tokens = Arc::new(TokenStore::new(Arc::new(store)));

    let transport = Arc::new(HttpTransport::new(
        reqwest::Client::new(),
        config.api.base_url.clone(),
        Duration::from_secs(config.api.timeout_secs),
    ));
    let api = ApiClient::new(
        transport,
        tokens,
        Arc::new(CliNavigator::new()),
        config.client_options(),
    );

    let outcome = run(&api, cli.command).await;

    if let Some(handle) = prometheus {
        eprintln!("{}", handle.render());
    }
    outcome
}

async fn run(api: &ApiClient, command: Command) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            let credentials = Value::from(serde_json::json!({
                "username": username,
                "password": password,
            }));
            let response = api.login(credentials).await.context("login failed")?;
            print_json(response.body)
        }
        Command::Request {
            method,
            path,
            data,
            query,
        } => {
            let mut request = ApiRequest::new(method, path);
            if let Some(data) = data {
                request = request.json(Value::from(data));
            }
            if let Some(query) = query {
                request = request.query(Value::from(query));
            }
            match api.send(request).await {
                Ok(response) => print_json(response.body),
                Err(err) => {
                    if let Some(body) = err.body() {
                        print_json(body.clone())?;
                    }
                    Err(err).context("request failed")
                }
            }
        }
        Command::Status => {
            let authenticated = api.tokens().get().await.is_some();
            print_json(Value::from(serde_json::json!({ "authenticated": authenticated })))
        }
        Command::Logout => {
            api.logout().await;
            Ok(())
        }
    }
}

fn print_json(value: Value) -> Result<()> {
    let text = serde_json::to_string_pretty(&value.into_json())?;
    println!("{text}");
    Ok(())
}
