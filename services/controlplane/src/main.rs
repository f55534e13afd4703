//! Tenantry control-plane service entry point.
//!
//! # Purpose
//! Wires configuration, observability, the store, the controller manager and
//! the HTTP router, then serves until Ctrl-C.
//!
//! # Notes
//! `run_with_shutdown` takes the shutdown signal as a future so the whole
//! process lifecycle can be exercised from tests.
use anyhow::Context;
use controlplane::app::{AppState, build_router};
use controlplane::config::ControlPlaneConfig;
use controlplane::controllers::Manager;
use controlplane::observability;
use controlplane::store::Client;
use controlplane::store::memory::InMemoryStore;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ControlPlaneConfig::from_env_or_yaml().context("control plane config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: ControlPlaneConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("tenantry-controlplane")?;
    let addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    let client = Client::new(Arc::new(InMemoryStore::new(config.store_config())));
    let stop = CancellationToken::new();

    let manager = Manager::new(client.clone(), config.manager_config());
    let manager_task = tokio::spawn(manager.run(stop.clone()));
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
        stop.clone(),
    ));

    let app = build_router(AppState::new(client).with_shutdown(stop.clone()));
    let signal = {
        let stop = stop.clone();
        async move {
            shutdown.await;
            stop.cancel();
        }
    };
    tracing::info!(%addr, "control plane listening");
    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(signal)
        .await;

    tracing::info!("shutting down");
    stop.cancel();
    let managed = manager_task.await.context("join controller manager")?;
    if let Ok(Err(err)) = metrics_task.await {
        tracing::warn!(error = %err, "metrics listener failed");
    }
    served.context("serve http")?;
    managed
}
