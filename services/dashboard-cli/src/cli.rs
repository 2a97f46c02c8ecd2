//! Command-line argument definitions

use clap::{Parser, Subcommand};
use reqwest::Method;

/// Dashboard API client
#[derive(Parser, Debug)]
#[command(name = "dashboard-api", version, about = "Dashboard API client")]
pub struct Cli {
    /// Config file (falls back to dashboard-api.toml)
    #[arg(long, global = true, env = "CONFIG_PATH", value_name = "PATH")]
    pub config: Option<String>,

    /// Print a Prometheus snapshot of the pipeline counters to stderr on exit
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Sign in and store the issued token pair
    Login { username: String, password: String },
    /// Send a request through the pipeline, renewing the session if needed
    Request {
        /// HTTP method, case-insensitive
        #[arg(value_parser = parse_method)]
        method: Method,
        /// Path relative to the API base URL, e.g. /events/
        path: String,
        /// JSON body, camelCase keys
        #[arg(long, value_name = "JSON", value_parser = parse_json)]
        data: Option<serde_json::Value>,
        /// JSON object of query parameters, camelCase keys
        #[arg(long, value_name = "JSON", value_parser = parse_json)]
        query: Option<serde_json::Value>,
    },
    /// Show whether an access token is stored
    Status,
    /// End the session and wipe stored credentials
    Logout,
}

fn parse_method(s: &str) -> Result<Method, String> {
    Method::from_bytes(s.to_ascii_uppercase().as_bytes()).map_err(|e| format!("{s}: {e}"))
}

fn parse_json(s: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))
}
