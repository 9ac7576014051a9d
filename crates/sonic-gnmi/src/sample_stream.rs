//! Pull-style access to a SAMPLE subscription.
//!
//! A [`SampleStream`] opens one SAMPLE-mode subscription for a typed leaf
//! and immediately starts a background receiver that appends every
//! decoded value to a buffer. Consumers pace themselves to the sampling
//! cadence with [`SampleStream::next`], which waits one interval plus a
//! fixed tolerance before returning the latest value, or read everything
//! received so far with [`SampleStream::all`].
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SI-4: System Monitoring - Periodic sampling of device state

use crate::client::{Subscriber, Subscription};
use crate::error::{GnmiError, Result};
use crate::proto::{
    subscribe_response::Response, subscription_list, typed_value::Value, Path,
    SubscribeRequest, SubscriptionMode, TypedValue,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

/// Slack added to every [`SampleStream::next`] wait so that the sample for
/// the current interval has arrived.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(5);

/// A typed query for one leaf or subtree.
pub trait LeafQuery: Send + Sync + 'static {
    /// Decoded value type.
    type Value: Clone + Send + 'static;

    /// Path to subscribe to.
    fn path(&self) -> Path;

    /// Decodes one value; `Ok(None)` means present but empty.
    fn decode(&self, value: &TypedValue) -> Result<Option<Self::Value>>;
}

/// One received, decoded value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    /// Full path of the update (notification prefix joined with update path)
    pub path: Path,
    /// Target timestamp in nanoseconds since the epoch
    pub timestamp: i64,
    /// Decoded value
    pub value: T,
}

/// Unsigned integer leaf, such as a counter.
///
/// Accepts native uint/int values, decimal strings, and JSON scalars
/// (JSON_IETF encodes 64-bit integers as strings).
#[derive(Debug, Clone)]
pub struct UintLeaf {
    path: Path,
}

impl UintLeaf {
    /// Creates a query for the leaf at `path`.
    pub fn new(path: Path) -> Self {
        Self { path }
    }
}

impl LeafQuery for UintLeaf {
    type Value = u64;

    fn path(&self) -> Path {
        self.path.clone()
    }

    fn decode(&self, value: &TypedValue) -> Result<Option<u64>> {
        match &value.value {
            None => Ok(None),
            Some(Value::UintVal(v)) => Ok(Some(*v)),
            Some(Value::IntVal(v)) => u64::try_from(*v)
                .map(Some)
                .map_err(|_| GnmiError::Decode(format!("negative counter value {}", v))),
            Some(Value::StringVal(s)) | Some(Value::AsciiVal(s)) => parse_decimal(s).map(Some),
            Some(Value::JsonVal(b)) | Some(Value::JsonIetfVal(b)) => {
                let doc: serde_json::Value = serde_json::from_slice(b)
                    .map_err(|e| GnmiError::Decode(format!("malformed JSON: {}", e)))?;
                match doc {
                    serde_json::Value::Null => Ok(None),
                    serde_json::Value::String(s) => parse_decimal(&s).map(Some),
                    serde_json::Value::Number(n) => n
                        .as_u64()
                        .map(Some)
                        .ok_or_else(|| GnmiError::Decode(format!("not an unsigned integer: {}", n))),
                    other => Err(GnmiError::Decode(format!("not a scalar: {}", other))),
                }
            }
            Some(other) => Err(GnmiError::Decode(format!("unsupported encoding {:?}", other))),
        }
    }
}

fn parse_decimal(s: &str) -> Result<u64> {
    s.trim()
        .parse::<u64>()
        .map_err(|e| GnmiError::Decode(format!("{:?} is not a base-10 u64: {}", s, e)))
}

/// JSON subtree decoded into a serde type.
pub struct JsonLeaf<T> {
    path: Path,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonLeaf<T> {
    /// Creates a query for the subtree at `path`.
    pub fn new(path: Path) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }
}

impl<T> LeafQuery for JsonLeaf<T>
where
    T: DeserializeOwned + Clone + Send + 'static,
{
    type Value = T;

    fn path(&self) -> Path {
        self.path.clone()
    }

    fn decode(&self, value: &TypedValue) -> Result<Option<T>> {
        let Some(bytes) = value.json_bytes() else {
            return match value.value {
                None => Ok(None),
                _ => Err(GnmiError::Decode("value is not JSON encoded".into())),
            };
        };
        let doc: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| GnmiError::Decode(format!("malformed JSON: {}", e)))?;
        if doc.is_null() {
            return Ok(None);
        }
        serde_json::from_value(doc)
            .map(Some)
            .map_err(|e| GnmiError::Decode(e.to_string()))
    }
}

type SampleBuffer<T> = Arc<Mutex<Vec<Sample<T>>>>;

/// Pull interface over a SAMPLE subscription.
pub struct SampleStream<Q: LeafQuery> {
    interval: Duration,
    tolerance: Duration,
    last_next: Instant,
    samples: SampleBuffer<Q::Value>,
    cancel: CancellationToken,
    receiver: Option<JoinHandle<()>>,
}

impl<Q: LeafQuery> SampleStream<Q> {
    /// Opens the subscription and starts the background receiver.
    ///
    /// An error opening the subscription is returned as is; there is no
    /// retry.
    #[instrument(skip_all, fields(interval = ?interval))]
    pub async fn new<S>(subscriber: &S, query: Q, interval: Duration) -> Result<Self>
    where
        S: Subscriber + ?Sized,
    {
        let query_path = query.path();
        let request = SubscribeRequest::single(
            query_path.clone(),
            subscription_list::Mode::Stream,
            SubscriptionMode::Sample,
            interval,
        );
        let subscription = subscriber.subscribe(request).await?;

        let samples: SampleBuffer<Q::Value> = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        let receiver = tokio::spawn(receive_loop(
            subscription,
            query,
            Arc::clone(&samples),
            cancel.clone(),
        ));

        info!(path = %query_path.display(), "Sample stream started");
        Ok(Self {
            interval,
            tolerance: DEFAULT_TOLERANCE,
            last_next: Instant::now(),
            samples,
            cancel,
            receiver: Some(receiver),
        })
    }

    /// Overrides the wait tolerance added to each interval.
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Waits until one interval plus the tolerance has passed since the
    /// previous call, then returns the latest value, if any arrived.
    pub async fn next(&mut self) -> Option<Sample<Q::Value>> {
        let deadline = self.last_next + self.interval + self.tolerance;
        tokio::time::sleep_until(deadline).await;
        self.last_next = Instant::now();
        self.samples.lock().last().cloned()
    }

    /// Calls [`next`](Self::next) `n` times and returns every result in
    /// order, including the empty ones.
    pub async fn nexts(&mut self, n: usize) -> Vec<Option<Sample<Q::Value>>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.next().await);
        }
        out
    }

    /// Returns every value received so far in arrival order.
    pub fn all(&self) -> Vec<Sample<Q::Value>> {
        self.samples.lock().clone()
    }

    /// Returns true while the background receiver is running.
    pub fn is_receiving(&self) -> bool {
        self.receiver.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancels the subscription and waits for the receiver to stop.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.receiver.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Sample stream receiver did not stop cleanly");
            }
        }
        debug!("Sample stream closed");
    }
}

impl<Q: LeafQuery> Drop for SampleStream<Q> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn receive_loop<Q: LeafQuery>(
    mut subscription: Subscription,
    query: Q,
    samples: SampleBuffer<Q::Value>,
    cancel: CancellationToken,
) {
    debug!("Sample receiver running");
    loop {
        let response = tokio::select! {
            _ = cancel.cancelled() => break,
            response = subscription.recv() => response,
        };

        let notification = match response {
            None => {
                debug!("Target ended sample stream");
                break;
            }
            Some(Err(e)) => {
                if !e.is_stream_closed() {
                    warn!(error = %e, "Sample stream terminated");
                }
                break;
            }
            Some(Ok(resp)) => match resp.response {
                Some(Response::Update(n)) => n,
                Some(Response::SyncResponse(_)) => {
                    trace!("Sync response on sample stream");
                    continue;
                }
                Some(Response::Error(e)) => {
                    warn!(code = e.code, message = %e.message, "Target error on sample stream");
                    break;
                }
                None => continue,
            },
        };

        for update in &notification.update {
            let Some(val) = &update.val else {
                trace!("Skipping update without value");
                continue;
            };
            let value = match query.decode(val) {
                Ok(Some(v)) => v,
                Ok(None) => {
                    trace!("Skipping empty value");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to decode sample");
                    continue;
                }
            };
            samples.lock().push(Sample {
                path: Path::join(notification.prefix.as_ref(), update.path.as_ref()),
                timestamp: notification.timestamp,
                value,
            });
        }
    }
    subscription.close_send();
    debug!("Sample receiver stopped");
}
