//! Wallet Gateway CLI Application
//!
//! Runs the HTTP gateway in front of a wallet node.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use wallet_gateway::api::{create_router, ApiState};
use wallet_gateway::backend::{Backends, SandboxNode, UpstreamNode};
use wallet_gateway::config::GatewayConfig;
use wallet_gateway::subscription::{Dispatcher, SubscriptionRegistry};

#[derive(Parser)]
#[command(name = "wallet-gateway")]
#[command(author = "Darshan")]
#[command(version)]
#[command(about = "HTTP API gateway for a cryptocurrency wallet node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Serve {
        /// JSON config file; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve only the public API
        #[arg(long)]
        public_rest: bool,

        /// Accept connections from other hosts
        #[arg(long)]
        non_local: bool,

        /// Origin allowed by CORS when the gateway is not open
        #[arg(long)]
        origin: Option<String>,

        /// Items per history page
        #[arg(long)]
        page_size: Option<usize>,

        /// Deadline for node calls, in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Deadline for each webhook delivery, in seconds
        #[arg(long)]
        webhook_timeout_secs: Option<u64>,

        /// Base URL of the node; an in-memory sandbox is used when absent
        #[arg(short, long)]
        upstream: Option<String>,
    },

    /// Print the effective configuration and exit
    Config {
        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(GatewayConfig::load(path)?),
        None => Ok(GatewayConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { config } => {
            let config = load_config(config.as_ref())?;
            config.validate()?;
            println!("port:               {}", config.port);
            println!("bind:               {}", config.bind_addr());
            println!("origin:             {}", config.origin);
            println!("public REST:        {}", config.mode.public_rest);
            println!("non-local:          {}", config.mode.non_local);
            println!("page size:          {}", config.page_size);
            println!("node timeout:       {}s", config.timeout_secs);
            println!("webhook timeout:    {}s", config.webhook_timeout_secs);
            println!(
                "upstream:           {}",
                config.upstream.as_deref().unwrap_or("(sandbox)")
            );
            Ok(())
        }

        Commands::Serve {
            config,
            port,
            public_rest,
            non_local,
            origin,
            page_size,
            timeout_secs,
            webhook_timeout_secs,
            upstream,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(port) = port {
                config.port = port;
            }
            config.mode.public_rest |= public_rest;
            config.mode.non_local |= non_local;
            if let Some(origin) = origin {
                config.origin = origin;
            }
            if let Some(page_size) = page_size {
                config.page_size = page_size;
            }
            if let Some(secs) = timeout_secs {
                config.timeout_secs = secs;
            }
            if let Some(secs) = webhook_timeout_secs {
                config.webhook_timeout_secs = secs;
            }
            if upstream.is_some() {
                config.upstream = upstream;
            }
            config.validate()?;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(config))
        }
    }
}

async fn serve(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let backends = match config.upstream.as_deref() {
        Some(base) => {
            log::info!("Forwarding to node at {}", base);
            Backends::from_node(Arc::new(UpstreamNode::new(
                base,
                config.collaborator_timeout(),
            )?))
        }
        None => {
            log::warn!("No upstream configured, serving an in-memory sandbox ledger");
            Backends::from_node(Arc::new(SandboxNode::new()))
        }
    };

    // Webhook deliveries flow from the registry to the dispatcher
    let (outbox, queue) = mpsc::unbounded_channel();
    let registry = Arc::new(SubscriptionRegistry::new(outbox));
    let dispatcher = Dispatcher::new(queue, config.webhook_timeout())?;
    tokio::spawn(dispatcher.run());

    let addr = config.bind_addr();
    let mode = config.mode;
    let state = ApiState::new(Arc::new(config), backends, registry);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("🚀 Wallet gateway listening on http://{}", addr);
    println!(
        "   mode: {}{}",
        if mode.public_rest { "public REST" } else { "full" },
        if mode.non_local { ", non-local" } else { "" }
    );
    println!("   GET  /health        - Health check");
    println!("   ...  /api/v1/*      - Wallet API");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            println!("\n📴 Shutting down gateway...");
        })
        .await?;

    Ok(())
}
