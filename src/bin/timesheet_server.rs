//!
//! timesheet server binary
//! -----------------------
//! Command-line entry point for the timesheet HTTP service. Configuration comes
//! from environment variables; a few CLI flags override them.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

fn parse_port_arg(args: &[String], flag: &str) -> Result<Option<u16>> {
    match arg_value(args, flag) {
        Some(v) => Ok(Some(v.parse::<u16>().with_context(|| format!("{} expects a port, got {:?}", flag, v))?)),
        None => Ok(None),
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].as_str());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("timesheet Server\n\nUSAGE:\n  timesheet_server [--http-port N] [--data-file PATH]\n\nOPTIONS:\n  --http-port N       HTTP port (env: TIMESHEET_HTTP_PORT, default 8000)\n  --data-file PATH    JSON snapshot for users and time entries (env: TIMESHEET_DATA_FILE; in-memory when unset)\n\nENVIRONMENT:\n  SECRET_KEY                     token signing key, at least 32 bytes (required)\n  TIMESHEET_BIND                 listen address (default 0.0.0.0)\n  TIMESHEET_TOKEN_TTL_MINUTES    token lifetime (default 30)\n  TIMESHEET_ARGON2_MEMORY_KIB    argon2 memory cost (default 65536)\n  TIMESHEET_ARGON2_TIME_COST     argon2 iterations (default 3)\n  TIMESHEET_ARGON2_PARALLELISM   argon2 lanes (default 4)\n  TIMESHEET_REQUEST_TIMEOUT_SECS per-request timeout (default 10)\n  TIMESHEET_ADMIN_EMAIL / TIMESHEET_ADMIN_PASSWORD / TIMESHEET_ADMIN_USERNAME\n                                 first admin, created when the store is empty\n");
        return Ok(());
    }

    let mut config = timesheet::config::Config::from_env().context("loading configuration")?;

    // CLI arguments override environment
    if let Some(port) = parse_port_arg(&args, "--http-port")? {
        config.http_port = port;
    }
    if let Some(path) = arg_value(&args, "--data-file") {
        config.data_file = Some(PathBuf::from(path));
    }

    println!(
        "timesheet starting: http={}:{}, data_file={}",
        config.bind,
        config.http_port,
        config.data_file.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "<memory>".to_string())
    );
    tracing::info!(
        "Using bind={}, http={}, token_ttl={}s, argon2={:?}",
        config.bind,
        config.http_port,
        config.token_ttl.as_secs(),
        config.hash_cost
    );
    timesheet::server::run(config).await
}
