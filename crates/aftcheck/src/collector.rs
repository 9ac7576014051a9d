//! Next-hop counter collection
//!
//! Opens one subscription over every next-hop's `packets-forwarded`
//! counter and merges the notifications received during a bounded window
//! into a [`CounterSnapshot`].
//!
//! A dedicated receiver task reads the response stream and forwards
//! notifications over a bounded queue and the terminal event over a
//! second channel. The collection loop waits on notifications, the
//! terminal event and the window deadline. When the deadline fires the
//! request side is half-closed; targets that never end a half-closed
//! stream get a synthetic end-of-stream after a grace period, so
//! collection always terminates.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SI-4: System Monitoring - Forwarding counter collection
//! - SC-5: Denial of Service Protection - Bounded queue and collection window

use crate::error::Result;
use crate::parser::parse_notification;
use crate::types::CounterSnapshot;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sonic_gnmi::proto::{subscribe_response::Response, subscription_list, SubscriptionMode};
use sonic_gnmi::{
    GnmiError, Notification, Path, PathElem, ResponseStream, SubscribeRequest, Subscriber,
    WILDCARD,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

/// Default capacity of the notification queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default collection window
pub const DEFAULT_COLLECT_DURATION: Duration = Duration::from_secs(20);

/// Default sample interval requested from the target
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Default wait between half-close and the synthetic end-of-stream
pub const DEFAULT_HALF_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Capacity of the terminal event channel: the receiver's own end plus
/// the synthetic one.
const END_CHANNEL_CAPACITY: usize = 2;

/// Subscription mode used for collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectMode {
    /// STREAM subscription sampling every interval until the window ends
    #[default]
    Sample,
    /// ONCE subscription ending at the target's sync response
    Once,
}

/// Path selecting every next-hop counter in every network instance.
///
/// `/network-instances/network-instance[name=*]/afts/next-hops/next-hop[index=*]/state/counters/packets-forwarded`
pub fn counter_path() -> Path {
    Path {
        elem: vec![
            PathElem::new("network-instances"),
            PathElem::new("network-instance").with_key("name", WILDCARD),
            PathElem::new("afts"),
            PathElem::new("next-hops"),
            PathElem::new("next-hop").with_key("index", WILDCARD),
            PathElem::new("state"),
            PathElem::new("counters"),
            PathElem::new("packets-forwarded"),
        ],
        ..Default::default()
    }
}

/// Collection parameters.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub mode: CollectMode,
    pub path: Path,
    pub sample_interval: Duration,
    pub collect_duration: Duration,
    pub half_close_grace: Duration,
    pub queue_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            mode: CollectMode::default(),
            path: counter_path(),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            collect_duration: DEFAULT_COLLECT_DURATION,
            half_close_grace: DEFAULT_HALF_CLOSE_GRACE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Result of one collection pass.
#[derive(Debug)]
pub struct Collection {
    /// Merged counters, partial if `terminal_error` is set
    pub snapshot: CounterSnapshot,
    /// Notifications merged
    pub notifications: usize,
    /// Stream failure that ended collection early
    pub terminal_error: Option<GnmiError>,
    /// True if the target never ended the half-closed stream
    pub forced_eof: bool,
}

impl Collection {
    /// Returns true if the stream ended without a failure.
    pub fn is_complete(&self) -> bool {
        self.terminal_error.is_none()
    }
}

/// How the response stream ended.
#[derive(Debug)]
enum StreamEnd {
    Eof,
    SyntheticEof,
    Error(GnmiError),
}

/// Collects one counter snapshot.
///
/// Failing to open the subscription is returned as an error. A stream
/// failure after that is reported in [`Collection::terminal_error`] along
/// with everything merged before it.
#[instrument(skip_all, fields(mode = ?config.mode))]
pub async fn collect_counters<S>(subscriber: &S, config: &CollectorConfig) -> Result<Collection>
where
    S: Subscriber + ?Sized,
{
    let (list_mode, mode) = match config.mode {
        CollectMode::Sample => (subscription_list::Mode::Stream, SubscriptionMode::Sample),
        CollectMode::Once => (subscription_list::Mode::Once, SubscriptionMode::TargetDefined),
    };
    let request = SubscribeRequest::single(config.path.clone(), list_mode, mode, config.sample_interval);
    let (mut requests, responses) = subscriber.subscribe(request).await?.into_parts();
    info!(
        path = %config.path.display(),
        duration = ?config.collect_duration,
        "Counter subscription opened"
    );

    let (notif_tx, mut notif_rx) = mpsc::channel(config.queue_capacity.max(1));
    let (end_tx, mut end_rx) = mpsc::channel(END_CHANNEL_CAPACITY);
    let receiver = tokio::spawn(receive_notifications(
        responses,
        config.mode,
        notif_tx,
        end_tx.clone(),
    ));

    let deadline = tokio::time::sleep(config.collect_duration);
    tokio::pin!(deadline);
    let mut deadline_fired = false;
    let mut fallback: Option<JoinHandle<()>> = None;

    let mut snapshot = CounterSnapshot::new();
    let mut notifications = 0usize;
    let mut merge = |n: Notification| {
        notifications += 1;
        snapshot.merge_partial(parse_notification(&n));
    };

    let end = loop {
        tokio::select! {
            maybe = notif_rx.recv() => match maybe {
                Some(n) => merge(n),
                // The receiver queues its end event before dropping the sender
                None => break end_rx.try_recv().unwrap_or(StreamEnd::Eof),
            },
            Some(end) = end_rx.recv() => {
                while let Ok(n) = notif_rx.try_recv() {
                    merge(n);
                }
                break end;
            }
            _ = &mut deadline, if !deadline_fired => {
                deadline_fired = true;
                info!("Collection window elapsed, half-closing subscription");
                requests.take();
                let end_tx = end_tx.clone();
                let grace = config.half_close_grace;
                fallback = Some(tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    warn!(grace = ?grace, "Target did not end half-closed stream, injecting EOF");
                    let _ = end_tx.send(StreamEnd::SyntheticEof).await;
                }));
            }
        }
    };

    if let Some(handle) = fallback {
        handle.abort();
    }
    receiver.abort();
    drop(requests);

    let mut forced_eof = false;
    let terminal_error = match end {
        StreamEnd::Eof => {
            debug!("Counter stream ended");
            None
        }
        StreamEnd::SyntheticEof => {
            forced_eof = true;
            None
        }
        StreamEnd::Error(e) if e.is_stream_closed() => {
            debug!(error = %e, "Counter stream closed");
            None
        }
        StreamEnd::Error(e) => {
            warn!(error = %e, "Counter stream terminated, returning partial snapshot");
            Some(e)
        }
    };

    info!(
        notifications,
        indices = snapshot.len(),
        forced_eof,
        "Counter collection finished"
    );
    Ok(Collection {
        snapshot,
        notifications,
        terminal_error,
        forced_eof,
    })
}

async fn receive_notifications(
    mut responses: ResponseStream,
    mode: CollectMode,
    notif_tx: mpsc::Sender<Notification>,
    end_tx: mpsc::Sender<StreamEnd>,
) {
    let end = loop {
        let response = match responses.next().await {
            None => break StreamEnd::Eof,
            Some(Err(status)) => break StreamEnd::Error(GnmiError::from(status)),
            Some(Ok(response)) => response,
        };
        match response.response {
            Some(Response::Update(n)) => {
                if notif_tx.send(n).await.is_err() {
                    return;
                }
            }
            Some(Response::SyncResponse(_)) if mode == CollectMode::Once => break StreamEnd::Eof,
            Some(Response::SyncResponse(_)) => trace!("Sync response on counter stream"),
            Some(Response::Error(e)) => {
                break StreamEnd::Error(GnmiError::Target {
                    code: e.code,
                    message: e.message,
                })
            }
            None => {}
        }
    };
    let _ = end_tx.send(end).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_path() {
        assert_eq!(
            counter_path().display().to_string(),
            "/network-instances/network-instance[name=*]/afts/next-hops/next-hop[index=*]/state/counters/packets-forwarded"
        );
    }

    #[test]
    fn test_default_config() {
        let config = CollectorConfig::default();
        assert_eq!(config.mode, CollectMode::Sample);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.collect_duration, Duration::from_secs(20));
        assert_eq!(config.half_close_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_collect_mode_serde() {
        let mode: CollectMode = serde_json::from_str("\"once\"").unwrap();
        assert_eq!(mode, CollectMode::Once);
        assert_eq!(serde_json::to_string(&CollectMode::Sample).unwrap(), "\"sample\"");
    }
}
