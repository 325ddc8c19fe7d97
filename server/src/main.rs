use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::Parser;
use config::File;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app::{build_router, AppState, ChainCtx};

mod app;
mod chain;
mod error;
mod wallet;

#[derive(serde::Deserialize, Debug)]
pub struct Conf {
    pub id: String,
    pub log_format: String,
    pub rest_server_port: u16,
    pub allowed_origin: String,
    pub rpc_url: String,
    pub contract_address: String,
    pub private_key: String,
}

#[derive(Parser, Debug)]
#[command(version, about = "Single-endpoint native token faucet")]
struct Args {
    /// Configuration file layered over the embedded defaults
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = config::Config::builder().add_source(File::from_str(
        include_str!("../../config.toml"),
        config::FileFormat::Toml,
    ));
    if let Some(path) = &args.config {
        builder = builder.add_source(File::with_name(path));
    }
    let config: Conf = builder
        .add_source(config::Environment::with_prefix("FAUCET"))
        .build()
        .context("building configuration")?
        .try_deserialize()
        .context("deserializing configuration")?;

    setup_tracing(&config);

    // The secret is deliberately absent from the banner.
    info!(
        id = %config.id,
        port = config.rest_server_port,
        allowed_origin = %config.allowed_origin,
        rpc_url = %config.rpc_url,
        contract = %config.contract_address,
        "starting faucet server"
    );

    let allowed_origin = config
        .allowed_origin
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| {
            warn!("allowed_origin is not a usable header value, serving *");
            HeaderValue::from_static("*")
        });

    let chain = match ChainCtx::from_conf(&config) {
        Ok(chain) => {
            info!(operator = %chain.wallet.address(), "operator wallet ready");
            Ok(chain)
        }
        Err(missing) => {
            // The server still comes up so every claim gets a structured 500
            // instead of a connection refusal.
            error!(
                ?missing,
                "chain configuration missing or invalid, claims will fail"
            );
            Err(missing)
        }
    };

    let router = build_router(Arc::new(AppState {
        allowed_origin,
        chain,
    }));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.rest_server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    info!("shut down");
    Ok(())
}

fn setup_tracing(config: &Conf) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("installing Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl-C received, shutting down");
        }
        _ = terminate => {
            info!("SIGTERM received, shutting down");
        }
    }
}
