// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Netsnare CLI
//!
//! Runs one intercepted fetch under a rule-based policy chain.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use netsnare::network::SessionId;
use netsnare::{
    AuthHeaderInjector, ErrorReason, FrameScope, HttpClient, InterceptingClient,
    InterceptionRegistry, NetworkRequest, PolicyChain, PolicyHandler, RegistryConfig, Request,
    RequestLogger, RulePolicy, TransportConfig,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("netsnare=info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    match args[1].as_str() {
        "fetch" => {
            let options = match FetchOptions::parse(&args[2..]) {
                Ok(options) => options,
                Err(e) => {
                    eprintln!("{:#}", e);
                    eprintln!("Usage: netsnare fetch <url> [--block REGEX]... [--mock REGEX=FILE]... [--header NAME:VALUE]... [--timeout SECS]");
                    return ExitCode::from(1);
                }
            };
            match fetch(options).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Fetch failed: {:#}", e);
                    ExitCode::from(1)
                }
            }
        }
        "--help" | "-h" | "help" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "--version" | "-v" | "version" => {
            println!("netsnare {}", netsnare::VERSION);
            ExitCode::SUCCESS
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"Netsnare - Request Interception Registry

USAGE:
    netsnare <COMMAND> [OPTIONS]

COMMANDS:
    fetch <url>     Fetch a URL with every request passing through the registry
    help            Show this help message
    version         Show version information

FETCH OPTIONS:
    --block REGEX         Fail requests whose URL matches
    --mock REGEX=FILE     Answer matching requests with the raw HTTP response in FILE
    --header NAME:VALUE   Add a header to every request
    --timeout SECS        Decision timeout (default 5)

EXAMPLES:
    netsnare fetch https://example.com --header "authorization:Bearer abc"
    netsnare fetch https://example.com/app --mock '/api/config$=config.http'
    RUST_LOG=netsnare=debug netsnare fetch https://example.com --block tracker
"#
    );
}

#[derive(Debug, Default)]
struct FetchOptions {
    url: String,
    blocks: Vec<String>,
    mocks: Vec<(String, PathBuf)>,
    headers: Vec<(String, String)>,
    timeout: Option<u64>,
}

impl FetchOptions {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut options = FetchOptions::default();
        let mut args = args.iter();

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .cloned()
                    .with_context(|| format!("{} needs a value", flag))
            };

            match arg.as_str() {
                "--block" => options.blocks.push(value("--block")?),
                "--mock" => {
                    let entry = value("--mock")?;
                    let (pattern, file) = entry
                        .rsplit_once('=')
                        .with_context(|| format!("--mock expects REGEX=FILE, got '{}'", entry))?;
                    options.mocks.push((pattern.to_string(), PathBuf::from(file)));
                }
                "--header" => {
                    let entry = value("--header")?;
                    let (name, header_value) = entry
                        .split_once(':')
                        .with_context(|| format!("--header expects NAME:VALUE, got '{}'", entry))?;
                    options
                        .headers
                        .push((name.trim().to_string(), header_value.trim().to_string()));
                }
                "--timeout" => {
                    let secs = value("--timeout")?;
                    options.timeout = Some(
                        secs.parse()
                            .with_context(|| format!("--timeout expects seconds, got '{}'", secs))?,
                    );
                }
                flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
                url if options.url.is_empty() => options.url = url.to_string(),
                extra => bail!("Unexpected argument: {}", extra),
            }
        }

        if options.url.is_empty() {
            bail!("Missing <url>");
        }
        Ok(options)
    }
}

async fn fetch(options: FetchOptions) -> anyhow::Result<()> {
    let registry = InterceptionRegistry::new(RegistryConfig::new().id_prefix("cli-"));

    let mut rules = RulePolicy::new();
    for pattern in &options.blocks {
        rules = rules.block(pattern, ErrorReason::BlockedByClient)?;
    }
    for (pattern, file) in &options.mocks {
        let raw = std::fs::read(file)
            .with_context(|| format!("Failed to read mock response {}", file.display()))?;
        rules = rules.mock(pattern, raw)?;
    }

    let mut injector = AuthHeaderInjector::new();
    for (name, value) in &options.headers {
        injector = injector.header(name.as_str(), value.as_str());
    }

    let chain = PolicyChain::new()
        .with(RequestLogger::default())
        .with(injector)
        .with(rules);
    let handler = PolicyHandler::new(chain, registry.clone());

    let session = SessionId::new("cli");
    let frame = FrameScope::new(1, 1, 1);
    registry
        .start_intercepting_requests(session.clone(), vec![frame], &handler)
        .await?;

    let mut config = TransportConfig::for_automation();
    if let Some(secs) = options.timeout {
        config = config.decision_timeout(Duration::from_secs(secs));
    }
    let client = InterceptingClient::new(HttpClient::new()?, registry.clone(), config);

    println!("Fetching: {}", options.url);
    let request = NetworkRequest::navigation(Request::get(&options.url)?, frame.frame_tree_node_id);
    match client.execute(request).await {
        Ok(response) => {
            println!("\n=== Response ===");
            println!("Status: {}", response.status);
            println!("URL: {}", response.url);
            println!("Content-Type: {:?}", response.content_type());
            println!("Size: {} bytes", response.body_len());
            println!("Time: {}ms", response.response_time_ms);
            println!("Mocked: {}", response.mocked);
            println!("Redirected: {}", response.redirected);
        }
        Err(netsnare::Error::Intercepted { id, reason }) => {
            println!("\n[!] Blocked by policy: {:?} (interception {})", reason, id);
        }
        Err(e) => return Err(e.into()),
    }

    registry.stop_intercepting_requests(&session).await?;

    println!("\n=== Registry ===");
    println!("{}", serde_json::to_string_pretty(&registry.stats())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_fetch_options() {
        let options = FetchOptions::parse(&args(&[
            "https://example.com",
            "--block",
            "ads",
            "--mock",
            "/api=1=resp.http",
            "--header",
            "x-a: 1",
            "--timeout",
            "7",
        ]))
        .unwrap();

        assert_eq!(options.url, "https://example.com");
        assert_eq!(options.blocks, vec!["ads"]);
        assert_eq!(options.mocks[0], ("/api=1".to_string(), PathBuf::from("resp.http")));
        assert_eq!(options.headers[0], ("x-a".to_string(), "1".to_string()));
        assert_eq!(options.timeout, Some(7));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(FetchOptions::parse(&args(&[])).is_err());
        assert!(FetchOptions::parse(&args(&["https://a", "--block"])).is_err());
        assert!(FetchOptions::parse(&args(&["https://a", "--header", "novalue"])).is_err());
        assert!(FetchOptions::parse(&args(&["https://a", "--frobnicate"])).is_err());
        assert!(FetchOptions::parse(&args(&["https://a", "https://b"])).is_err());
    }
}
