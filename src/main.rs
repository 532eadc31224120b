use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rewrite_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use rewrite_proxy::lifecycle::{wait_for_signal, Shutdown};
use rewrite_proxy::observability::{logging, metrics};
use rewrite_proxy::{HttpServer, RouteTable, StartupError};

#[derive(Parser, Debug)]
#[command(name = "rewrite-proxy", version, about = "Path-prefix rewriting reverse proxy")]
struct Args {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Validate the configuration, print the route table and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    if args.check {
        print_routes(&RouteTable::from_config(&config)?);
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rewrite-proxy starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        request_timeout_secs = config.timeouts.request_secs,
        max_tunnels = config.limits.max_tunnels,
        "Listening for connections"
    );

    let server = HttpServer::new(config)?;
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn print_routes(routes: &RouteTable) {
    println!("mode: {:?}", routes.mode());
    for (prefix, target) in routes.routes() {
        println!("  /{prefix}/ -> {target}");
    }
    match routes.default_target() {
        Some(target) => println!("  (default) -> {target}"),
        None => println!("  (default) -> landing page"),
    }
}
