//! Controller manager.
//!
//! # Purpose
//! Runs every reconciler against the store. One dispatcher consumes the
//! store-wide change feed, keeps the [`TargetIndex`] current, and routes each
//! event to the work queues: objects of a reconciler's own kind are queued
//! directly, events of kinds it watches go through its mapping function.
//! Each kind has its own queue and `workers_per_kind` workers.
//!
//! # Failure handling
//! - A failed reconcile is re-queued with per-key exponential backoff.
//! - A failed mapping is retried in the background with backoff until it
//!   succeeds or the manager stops.
//! - A watch that reports an error or ends is re-established, followed by a
//!   full resync, since events may have been missed.
//! - Every kind is also resynced periodically.
use super::queue::{Backoff, WorkQueue};
use super::{Controller, ReconcileOutcome, TargetIndex, controllers};
use crate::store::{Client, WatchEvent, WatchFilter};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub workers_per_kind: usize,
    pub resync_interval: Duration,
    pub requeue_base_delay: Duration,
    pub requeue_max_delay: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            workers_per_kind: 1,
            resync_interval: Duration::from_secs(300),
            requeue_base_delay: Duration::from_millis(100),
            requeue_max_delay: Duration::from_secs(30),
        }
    }
}

struct Lane {
    controller: Arc<dyn Controller>,
    queue: Arc<WorkQueue>,
    backoff: Backoff,
}

pub struct Manager {
    client: Client,
    index: Arc<TargetIndex>,
    lanes: Vec<Arc<Lane>>,
    config: ManagerConfig,
}

impl Manager {
    pub fn new(client: Client, config: ManagerConfig) -> Self {
        let index = Arc::new(TargetIndex::new());
        let controllers = controllers(&client, &index);
        Self::with_controllers(client, index, controllers, config)
    }

    pub fn with_controllers(
        client: Client,
        index: Arc<TargetIndex>,
        controllers: Vec<Arc<dyn Controller>>,
        config: ManagerConfig,
    ) -> Self {
        let lanes = controllers
            .into_iter()
            .map(|controller| {
                Arc::new(Lane {
                    queue: Arc::new(WorkQueue::new(controller.kind())),
                    backoff: Backoff::new(config.requeue_base_delay, config.requeue_max_delay),
                    controller,
                })
            })
            .collect();
        Self {
            client,
            index,
            lanes,
            config,
        }
    }

    /// Runs until `shutdown` fires. In-flight reconciles are abandoned; every
    /// pass is idempotent, so the next manager picks up where this one left.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let mut workers = JoinSet::new();
        let per_kind = self.config.workers_per_kind.max(1);
        for lane in &self.lanes {
            for _ in 0..per_kind {
                workers.spawn(work(lane.clone()));
            }
        }
        info!(
            kinds = self.lanes.len(),
            workers_per_kind = per_kind,
            "controller manager started"
        );

        self.dispatch(&shutdown).await;

        for lane in &self.lanes {
            lane.queue.shutdown();
        }
        workers.shutdown().await;
        info!("controller manager stopped");
        Ok(())
    }

    async fn dispatch(&self, shutdown: &CancellationToken) {
        let interval = self.config.resync_interval;
        let mut resync = tokio::time::interval_at(Instant::now() + interval, interval);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let watched = tokio::select! {
                _ = shutdown.cancelled() => return,
                watched = self.client.watch(WatchFilter::all(), None) => watched,
            };
            let mut stream = match watched {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(error = %err, "failed to start watch; retrying");
                    if self.pause(shutdown).await {
                        return;
                    }
                    continue;
                }
            };
            self.index.invalidate().await;
            self.resync_all().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = resync.tick() => self.resync_all().await,
                    event = stream.next() => match event {
                        Some(WatchEvent::Error(message)) => {
                            warn!(%message, "watch interrupted; restarting");
                            break;
                        }
                        None => {
                            warn!("watch ended; restarting");
                            break;
                        }
                        Some(event) => self.route(event, shutdown).await,
                    },
                }
            }
            if self.pause(shutdown).await {
                return;
            }
        }
    }

    /// Waits one base delay. Returns `true` if shutdown fired meanwhile.
    async fn pause(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => true,
            _ = tokio::time::sleep(self.config.requeue_base_delay) => false,
        }
    }

    async fn resync_all(&self) {
        for lane in &self.lanes {
            let kind = lane.controller.kind();
            match self.client.store().list(kind, None).await {
                Ok(objects) => {
                    debug!(%kind, count = objects.len(), "resync");
                    for object in objects {
                        lane.queue.add(object.key());
                    }
                }
                Err(err) => warn!(%kind, error = %err, "resync list failed"),
            }
        }
    }

    async fn route(&self, event: WatchEvent, shutdown: &CancellationToken) {
        self.index.observe(&event).await;
        let (Some(kind), Some(object)) = (event.kind(), event.object()) else {
            return;
        };
        for lane in &self.lanes {
            if lane.controller.kind() == kind {
                lane.queue.add(object.key());
            }
            if !lane.controller.watches().contains(&kind) {
                continue;
            }
            match lane.controller.map(&event).await {
                Ok(keys) => {
                    for key in keys {
                        lane.queue.add(key);
                    }
                }
                Err(err) => {
                    record_mapping_error(lane);
                    warn!(
                        controller = %lane.controller.kind(),
                        %kind,
                        error = %err,
                        "mapping watch event failed; retrying"
                    );
                    tokio::spawn(retry_mapping(
                        lane.clone(),
                        event.clone(),
                        shutdown.clone(),
                        self.config.requeue_base_delay,
                        self.config.requeue_max_delay,
                    ));
                }
            }
        }
    }
}

fn record_mapping_error(lane: &Lane) {
    metrics::counter!(
        "tenantry_watch_mapping_errors_total",
        "kind" => lane.controller.kind().as_str()
    )
    .increment(1);
}

async fn retry_mapping(
    lane: Arc<Lane>,
    event: WatchEvent,
    shutdown: CancellationToken,
    base: Duration,
    max: Duration,
) {
    let mut delay = base;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        match lane.controller.map(&event).await {
            Ok(keys) => {
                for key in keys {
                    lane.queue.add(key);
                }
                return;
            }
            Err(err) => {
                record_mapping_error(&lane);
                warn!(controller = %lane.controller.kind(), error = %err, "mapping retry failed");
                delay = delay.saturating_mul(2).min(max);
            }
        }
    }
}

async fn work(lane: Arc<Lane>) {
    let kind = lane.controller.kind().as_str();
    while let Some(key) = lane.queue.get().await {
        let started = Instant::now();
        let result = lane.controller.reconcile(&key).await;
        metrics::histogram!("tenantry_reconcile_duration_seconds", "kind" => kind)
            .record(started.elapsed().as_secs_f64());

        let label = match result {
            Ok(ReconcileOutcome::Done) => {
                lane.backoff.forget(&key);
                "success"
            }
            Ok(ReconcileOutcome::RequeueAfter(delay)) => {
                lane.backoff.forget(&key);
                lane.queue.add_after(key.clone(), delay);
                "requeue"
            }
            Err(err) => {
                let delay = lane.backoff.next_delay(&key);
                warn!(
                    %key,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "reconcile failed; requeueing"
                );
                lane.queue.add_after(key.clone(), delay);
                "error"
            }
        };
        metrics::counter!("tenantry_reconcile_total", "kind" => kind, "result" => label)
            .increment(1);
        lane.queue.done(&key);
    }
}
