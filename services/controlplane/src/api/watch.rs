//! Membership-filtered watch streams, served as server-sent events.
//!
//! # Purpose
//! Bridges a store watch to an SSE response. A forwarding task evaluates each
//! change against the caller's membership and passes on only the objects the
//! caller may see.
//!
//! # Key invariants
//! - An upstream `Error` event is forwarded unfiltered and ends the stream.
//! - The bridge holds at most one undelivered event, so a slow client stalls
//!   the forwarding task instead of buffering without bound. If it stalls long
//!   enough for the store watch to lag, the client receives the lag error and
//!   must re-list.
//! - The forwarding task stops as soon as the client goes away or the
//!   server shuts down.
use crate::api::error::ApiError;
use crate::app::AppState;
use crate::model::Resource;
use crate::store::{WatchEvent, WatchFilter, WatchStream};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use std::convert::Infallible;
use tenantry_authz::{CallerIdentity, Ownable, is_member};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Open a watch on `filter` for objects of type `T` that the caller may see.
///
/// # Errors
/// - `410 Gone` when `since` is older than the retained change window.
pub(crate) async fn watch_visible<T: Resource + Ownable>(
    state: &AppState,
    caller: Option<CallerIdentity>,
    filter: WatchFilter,
    since: Option<u64>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send + use<T>>, ApiError> {
    let upstream = state.client.watch(filter, since).await?;
    let (tx, rx) = mpsc::channel::<WatchEvent>(1);
    tokio::spawn(forward_visible::<T>(
        upstream,
        tx,
        caller,
        state.shutdown.clone(),
    ));

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok(sse_event(&event)), rx))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Relays the events of `upstream` that `caller` may see into `tx` until the
/// client goes away, `stopping` fires, or an `Error` event has been passed on.
async fn forward_visible<T: Resource + Ownable>(
    mut upstream: WatchStream,
    tx: mpsc::Sender<WatchEvent>,
    caller: Option<CallerIdentity>,
    stopping: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = stopping.cancelled() => break,
            _ = tx.closed() => break,
            event = upstream.next() => event,
        };
        let Some(event) = event else {
            break;
        };
        let terminal = matches!(event, WatchEvent::Error(_));
        if !terminal && !visible::<T>(caller.as_ref(), &event) {
            continue;
        }
        let sent = tokio::select! {
            _ = stopping.cancelled() => break,
            sent = tx.send(event) => sent.is_ok(),
        };
        if !sent || terminal {
            break;
        }
    }
    tracing::debug!("watch bridge closed");
}

fn visible<T: Resource + Ownable>(caller: Option<&CallerIdentity>, event: &WatchEvent) -> bool {
    event
        .object()
        .cloned()
        .and_then(T::from_object)
        .is_some_and(|object| is_member(caller, &object))
}

fn sse_event(event: &WatchEvent) -> Event {
    let frame = match serde_json::to_string(event) {
        Ok(data) => Event::default().event(event.event_type()).data(data),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode watch event");
            Event::default()
                .event("ERROR")
                .data("failed to encode watch event")
        }
    };
    match event.resource_version() {
        Some(version) => frame.id(version.to_string()),
        None => frame,
    }
}
