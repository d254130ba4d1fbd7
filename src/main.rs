//! Stubwire - CLI Entry Point

use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use stubwire::{HttpRequest, RequestMethod, StubServer, StubServerConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "stubwire",
    about = "HTTP stub engine - check stub files and try requests against them",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "stubwire.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Serve one request for this URL (path and query) and print the response
    #[arg(long, value_name = "URL")]
    try_url: Option<String>,

    /// Method for --try-url
    #[arg(long, default_value = "GET", requires = "try_url")]
    try_method: RequestMethod,

    /// Header for --try-url, as NAME:VALUE (repeatable)
    #[arg(long = "try-header", value_name = "NAME:VALUE", requires = "try_url")]
    try_headers: Vec<String>,

    /// Body for --try-url
    #[arg(long, requires = "try_url")]
    try_body: Option<String>,

    /// Write only the resolved response body for --try-url, as raw bytes
    #[arg(long, requires = "try_url")]
    body_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let default_config = include_str!("../demos/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    let config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        StubServerConfig::from_file(&args.config)?
    } else if args.validate || args.try_url.is_some() {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (no mappings)");
        StubServerConfig::default()
    };

    if args.validate {
        println!(
            "Configuration is valid ({} mappings defined)",
            config.mappings.len()
        );
        return Ok(());
    }

    let server: StubServer = config.into_server()?;

    let Some(url) = args.try_url else {
        println!(
            "{} mappings loaded; pass --try-url to serve a request",
            server.list_all_stub_mappings().len()
        );
        return Ok(());
    };

    let mut request = HttpRequest::new(args.try_method, url);
    for header in &args.try_headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("Header must be NAME:VALUE, got {:?}", header))?;
        request = request.with_header(name.trim(), value.trim());
    }
    if let Some(body) = args.try_body {
        request = request.with_body(body);
    }

    let response = server.serve_stub_for(&request);
    if args.body_only {
        match response.body().to_bytes() {
            Some(bytes) => std::io::stdout().write_all(&bytes)?,
            None => info!(body = ?response.body(), "Response body is not held in memory"),
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&response)?);
    }
    if !response.was_configured() {
        std::process::exit(2);
    }
    Ok(())
}
