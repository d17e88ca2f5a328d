//! Demo gateway serving capability-gated math tools over stdin/stdout.
//!
//! Each input line is one JSON request envelope; each output line is the
//! matching response. Logs go to stderr.

mod tools;

use std::sync::Arc;

use anyhow::{Context, Result};
use capgate::config::GatewayConfig;
use capgate::kernel::{CallOptions, InvocationGateway, RequestRouter};
use capgate::telemetry::init_tracing;
use capgate::tokens::{TokenCodec, install_global};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Capability-gated tool gateway demo.
#[derive(Debug, Parser)]
#[command(name = "basic-gateway", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve line-delimited JSON requests on stdin, answering on stdout.
    Serve {
        /// Print a demo token to stderr before serving.
        #[arg(long)]
        print_demo_token: bool,
    },
    /// Mint a capability token and print it.
    Mint {
        /// Principal the token speaks for.
        #[arg(long, default_value = "demo")]
        principal: String,
        /// Granted capability pattern; repeat for several.
        #[arg(long = "cap", required = true)]
        capabilities: Vec<String>,
        /// Lifetime in seconds; defaults to CAPGATE_DEFAULT_TTL_SECS.
        #[arg(long, allow_negative_numbers = true)]
        ttl_secs: Option<i64>,
    },
    /// Verify a token and print its claims.
    Verify {
        /// Token to check.
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = GatewayConfig::from_env().context("loading gateway configuration")?;
    init_tracing(config.telemetry())?;
    let codec = install_global(config.codec())?;

    match cli.command {
        Command::Serve { print_demo_token } => serve(&config, codec, print_demo_token).await,
        Command::Mint {
            principal,
            capabilities,
            ttl_secs,
        } => {
            let ttl = ttl_secs.map_or(config.default_ttl(), chrono::Duration::seconds);
            println!("{}", codec.mint(&principal, capabilities, ttl)?);
            Ok(())
        }
        Command::Verify { token } => {
            let claims = codec.verify(&token).context("token rejected")?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
            Ok(())
        }
    }
}

async fn serve(config: &GatewayConfig, codec: Arc<TokenCodec>, print_demo_token: bool) -> Result<()> {
    let registry = Arc::new(tools::demo_registry()?);
    let gateway = InvocationGateway::builder(Arc::clone(&codec), registry)
        .manifest(config.manifest()?)
        .default_timeout(config.call_timeout())
        .build()?;
    let router = RequestRouter::new(Arc::new(gateway));

    if print_demo_token {
        let token = codec.mint("demo", tools::DEMO_CAPABILITIES, config.default_ttl())?;
        eprintln!("demo token: {token}");
    }

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    info!(
        server = router.gateway().manifest().name(),
        tools = router.gateway().discovery().registry().len(),
        "serving requests on stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        let line = tokio::select! {
            () = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let options = CallOptions::new().with_cancellation(shutdown.child_token());
        let response = router.handle_with(line.as_bytes(), options).await;
        stdout.write_all(&response).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!("gateway stopped");
    Ok(())
}
