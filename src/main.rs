//! conn-recycler CLI
//!
//! Sends requests through a hyper client wrapped in the recycling layer and
//! reports how each host's latency machine ended up.
//!
//! ```text
//! conn-recycler probe --config recycler.toml -n 50 -j 8 http://a.example/ http://b.example/
//! conn-recycler check-config recycler.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::body::Body;
use clap::{Parser, Subcommand};
use http::{Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::task::JoinSet;
use tower::{Layer, ServiceExt};

use conn_recycler::config::load_config;
use conn_recycler::observability::{logging, metrics};
use conn_recycler::RecycleLayer;

#[derive(Parser)]
#[command(name = "conn-recycler")]
#[command(about = "Latency-aware HTTP connection recycling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send requests through the recycling client and print host states
    Probe {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Requests per URL
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,

        /// Concurrent workers
        #[arg(short = 'j', long, default_value_t = 4)]
        concurrency: usize,

        /// Target URLs
        #[arg(required = true)]
        urls: Vec<Uri>,
    },
    /// Validate a configuration file and print the effective settings
    CheckConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Probe { config, count, concurrency, urls } => {
            probe(&config, count, concurrency, urls).await?;
        }
        Commands::CheckConfig { path } => {
            logging::init("info");
            let config = load_config(&path)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn probe(
    config_path: &Path,
    count: usize,
    concurrency: usize,
    urls: Vec<Uri>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    logging::init(&config.observability.log_level);

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    tracing::info!(
        absolute_threshold = config.latency.absolute_threshold,
        percent_threshold = config.latency.percent_threshold,
        hosts = urls.len(),
        count,
        concurrency,
        "Starting probe"
    );

    let layer = RecycleLayer::new(config.latency.clone())?;
    let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
    let service = layer.layer(client);

    let concurrency = concurrency.max(1);
    let mut workers = JoinSet::new();
    for worker in 0..concurrency {
        let service = service.clone();
        let urls = urls.clone();
        workers.spawn(async move {
            let mut failures = 0usize;
            for _ in (worker..count).step_by(concurrency) {
                for uri in &urls {
                    let request = match Request::get(uri.clone()).body(Body::empty()) {
                        Ok(request) => request,
                        Err(e) => {
                            tracing::error!(uri = %uri, error = %e, "Failed to build request");
                            failures += 1;
                            continue;
                        }
                    };

                    match service.clone().oneshot(request).await {
                        Ok(response) => {
                            let status = response.status();
                            // Drain the body so the connection can return to the pool.
                            if let Err(e) = axum::body::to_bytes(Body::new(response.into_body()), usize::MAX).await {
                                tracing::warn!(uri = %uri, error = %e, "Failed to read response body");
                            }
                            tracing::debug!(uri = %uri, status = %status, "Response received");
                        }
                        Err(e) => {
                            failures += 1;
                            tracing::warn!(uri = %uri, error = %e, "Request failed");
                        }
                    }
                }
            }
            failures
        });
    }

    let mut failures = 0;
    while let Some(result) = workers.join_next().await {
        failures += result?;
    }

    tracing::info!(failures, hosts = layer.registry().len(), "Probe finished");
    println!("{}", serde_json::to_string_pretty(&layer.registry().snapshot())?);
    Ok(())
}
