//! Telemetry relay example
//!
//! Run with: cargo run --example telemetry_server [SOURCE] [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example telemetry_server                          # oscillator on 127.0.0.1:8899
//!   cargo run --example telemetry_server random                   # random integers
//!   cargo run --example telemetry_server stdin 0.0.0.0:9000       # relay typed lines
//!
//! ## Watching
//!
//! With the bundled viewer:
//!   cargo run --example viewer 127.0.0.1:8899
//!
//! From a browser console:
//!   new WebSocket("ws://localhost:8899/ws").onmessage = (e) => console.log(e.data)

use std::net::SocketAddr;

use telemetry_relay::source::{LineSource, Oscillator, RandomSource};
use telemetry_relay::{RelayServer, ServerConfig};

const DEFAULT_PORT: u16 = telemetry_relay::server::config::DEFAULT_PORT;

#[derive(Debug, Clone, Copy)]
enum SourceKind {
    Oscillator,
    Stdin,
    Random,
}

impl SourceKind {
    fn parse(arg: &str) -> Option<Self> {
        match arg {
            "oscillator" | "sim" => Some(Self::Oscillator),
            "stdin" => Some(Self::Stdin),
            "random" => Some(Self::Random),
            _ => None,
        }
    }
}

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8899
/// - "localhost:9000" -> 127.0.0.1:9000
/// - "0.0.0.0" -> 0.0.0.0:8899
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: telemetry_server [SOURCE] [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  SOURCE       oscillator | stdin | random (default: oscillator)");
    eprintln!("  BIND_ADDR    Address to bind to (default: 127.0.0.1:{DEFAULT_PORT})");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RELAY_DROP_POLICY   drop-oldest | drop-newest | disconnect");
}

fn exit_with_usage(message: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!();
    print_usage();
    std::process::exit(1);
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_ok() {
        println!("\nShutting down...");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let kind = match args.get(1) {
        Some(arg) => SourceKind::parse(arg)
            .unwrap_or_else(|| exit_with_usage(&format!("Unknown source: '{}'", arg))),
        None => SourceKind::Oscillator,
    };

    let bind_addr = match args.get(2) {
        Some(addr_str) => parse_bind_addr(addr_str).unwrap_or_else(|e| exit_with_usage(&e)),
        None => SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("telemetry_relay=debug".parse()?)
                .add_directive("telemetry_server=debug".parse()?),
        )
        .init();

    let mut config = ServerConfig::with_addr(bind_addr).path("/ws");
    if let Ok(policy) = std::env::var("RELAY_DROP_POLICY") {
        config = config.drop_policy(policy.parse()?);
    }

    println!("Relaying {:?} samples on ws://{}/ws", kind, config.bind_addr);
    println!("Drop policy: {}", config.session.drop_policy);
    println!();

    let server = RelayServer::new(config);
    let result = match kind {
        SourceKind::Oscillator => server.run_with_source(Oscillator::new(), ctrl_c()).await,
        SourceKind::Stdin => server.run_with_source(LineSource::stdin(), ctrl_c()).await,
        SourceKind::Random => server.run_with_source(RandomSource::new(), ctrl_c()).await,
    };

    if let Err(e) = result {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
