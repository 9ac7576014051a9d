//! gNMI telemetry client for SONiC tooling
//!
//! This crate opens gNMI Subscribe RPCs against a telemetry target and
//! exposes them in two shapes:
//!
//! - [`Subscription`]: the raw response stream of one RPC, with explicit
//!   half-close, for consumers that drive collection themselves.
//! - [`SampleStream`]: a pull interface over a SAMPLE subscription for a
//!   single typed leaf. A background task buffers every decoded value and
//!   callers read the latest one at the sampling cadence.
//!
//! Both sit on the [`Subscriber`] trait, implemented by [`GnmiClient`] for
//! real targets and by [`testing::MockSubscriber`] for tests.
//!
//! # NIST 800-53 Rev 5 Control Mappings
//!
//! | Control | Description | Implementation |
//! |---------|-------------|----------------|
//! | IA-2 | Identification and Authentication | Username/password call metadata |
//! | SI-4 | System Monitoring | Periodic sampling of device state |
//! | SI-10 | Input Validation | Path parsing and typed value decoding |
//! | SI-11 | Error Handling | Structured error types |
//!
//! # Architecture
//!
//! ```text
//! +--------------+   Subscribe RPC   +-------------+   mpsc/buffer   +-------------+
//! | gNMI target  |------------------>| GnmiClient  |---------------->| SampleStream|
//! | (telemetry)  |<------------------| Subscription|                 | / collector |
//! +--------------+    half-close     +-------------+                 +-------------+
//! ```

pub mod client;
pub mod error;
pub mod path;
pub mod proto;
pub mod sample_stream;
pub mod testing;

pub use client::{GnmiClient, ResponseStream, Subscriber, Subscription, TargetConfig};
pub use error::{GnmiError, Result};
pub use path::{parse_path, WILDCARD};
pub use proto::{Notification, Path, PathElem, SubscribeRequest, SubscribeResponse, TypedValue};
pub use sample_stream::{JsonLeaf, LeafQuery, Sample, SampleStream, UintLeaf, DEFAULT_TOLERANCE};
