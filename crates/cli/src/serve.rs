//! `appforge serve`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use gateway::{Gateway, GatewayConfig, RateLimitConfig, ReqwestFetcher};
use orchestration::Orchestrator;
use server::AppState;
use tokio::net::TcpListener;

#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "APPFORGE_LISTEN", default_value = "127.0.0.1:3000")]
    listen: SocketAddr,

    /// Proxy requests allowed per client per window.
    #[arg(long, env = "APPFORGE_PROXY_MAX_REQUESTS", default_value_t = 100)]
    proxy_max_requests: u32,

    /// Proxy rate-limit window, in seconds.
    #[arg(long, env = "APPFORGE_PROXY_WINDOW_SECS", default_value_t = 60)]
    proxy_window_secs: u64,

    /// Largest relayed response body, in bytes.
    #[arg(long, env = "APPFORGE_PROXY_MAX_BYTES", default_value_t = 5 * 1024 * 1024)]
    proxy_max_bytes: usize,

    /// Deadline for one proxied fetch, in seconds.
    #[arg(long, env = "APPFORGE_PROXY_TIMEOUT_SECS", default_value_t = 10)]
    proxy_timeout_secs: u64,
}

impl ServeArgs {
    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            rate_limit: RateLimitConfig {
                max_requests: self.proxy_max_requests,
                window: Duration::from_secs(self.proxy_window_secs.max(1)),
            },
            max_body_bytes: self.proxy_max_bytes,
            timeout: Duration::from_secs(self.proxy_timeout_secs),
        }
    }
}

pub async fn run(args: ServeArgs, orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    let config = args.gateway_config();
    tracing::info!(
        proxy_max_requests = config.rate_limit.max_requests,
        proxy_window = ?config.rate_limit.window,
        proxy_max_bytes = config.max_body_bytes,
        proxy_timeout = ?config.timeout,
        "starting HTTP edge"
    );

    let gateway = Arc::new(Gateway::new(config, Arc::new(ReqwestFetcher::new()?)));
    let eviction = gateway.limiter().spawn_eviction();

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    let served = server::serve(
        listener,
        AppState::new(orchestrator, gateway),
        shutdown_signal(),
    )
    .await;

    eviction.abort();
    served.context("HTTP edge terminated with an error")?;
    tracing::info!("HTTP edge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
