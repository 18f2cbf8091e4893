use std::convert::Infallible;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use tracing_subscriber::EnvFilter;

use mt_gateway::config::{Config, LogFormat};
use mt_gateway::detect::HeuristicDetector;
use mt_gateway::discovery::StaticOpusRegistry;
use mt_gateway::http::handle_request;
use mt_gateway::runtime::MockRuntime;
use mt_gateway::state::AppState;

fn init_tracing(cfg: &Config) {
    let filter = EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match cfg.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Arc::new(Config::from_env()?);
    init_tracing(&cfg);

    // The real Helsinki-NLP registry client and transformer inference
    // runtime are external collaborators out of scope for this service
    // (spec §1, §6.2); these bundled defaults keep the gateway runnable
    // standalone and are the seam an operator swaps in production.
    let registry = Arc::new(StaticOpusRegistry::default_seed());
    let runtime = Arc::new(MockRuntime::new());
    let detector = Arc::new(HeuristicDetector);

    let state = Arc::new(AppState::build(cfg.clone(), runtime, registry, detector));
    let maintainer = state.spawn_maintainer();

    let addr = cfg
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid BIND_ADDR {:?}: {e}", cfg.bind_addr))?;

    let svc_state = state.clone();
    let make_svc = make_service_fn(move |_conn| {
        let state = svc_state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                async move { handle_request(state, req).await }
            }))
        }
    });

    let server = Server::bind(&addr).serve(make_svc);
    tracing::info!(%addr, "mt-gateway listening");

    let graceful_timeout = cfg.graceful_timeout;
    let server = server.with_graceful_shutdown(async {
        shutdown_signal().await;
        tracing::info!("shutdown signal received, draining inflight requests");
    });

    match tokio::time::timeout(graceful_timeout, server).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(error = %err, "server error"),
        Err(_) => tracing::warn!("graceful timeout elapsed with requests still inflight"),
    }

    maintainer.shutdown().await;
    state.shutdown().await;
    tracing::info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
