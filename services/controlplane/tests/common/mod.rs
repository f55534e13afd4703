#![allow(dead_code)]

use axum::Router;
use controlplane::app::{AppState, build_router};
use controlplane::controllers::{Manager, ManagerConfig};
use controlplane::store::memory::InMemoryStore;
use controlplane::store::{Client, StoreConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn client_with(config: StoreConfig) -> Client {
    Client::new(Arc::new(InMemoryStore::new(config)))
}

pub fn client() -> Client {
    client_with(StoreConfig::default())
}

pub fn app(client: &Client) -> Router {
    build_router(AppState::new(client.clone()))
}

/// Router and store with the controller manager running against them.
pub struct ControlPlane {
    pub client: Client,
    pub app: Router,
    shutdown: CancellationToken,
    manager: JoinHandle<anyhow::Result<()>>,
}

impl ControlPlane {
    pub fn start() -> Self {
        let client = client();
        let shutdown = CancellationToken::new();
        // Two workers per kind so distinct objects really reconcile concurrently.
        let config = ManagerConfig {
            workers_per_kind: 2,
            requeue_base_delay: Duration::from_millis(10),
            requeue_max_delay: Duration::from_millis(200),
            ..ManagerConfig::default()
        };
        let manager = tokio::spawn(Manager::new(client.clone(), config).run(shutdown.clone()));
        let app = build_router(AppState::new(client.clone()).with_shutdown(shutdown.clone()));
        Self {
            client,
            app,
            shutdown,
            manager,
        }
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.manager
            .await
            .expect("join manager")
            .expect("manager result");
    }
}

/// Polls `check` until it holds, panicking after about five seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {what}");
}
