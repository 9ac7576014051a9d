//! gNMI protocol messages.
//!
//! Declares the subset of `gnmi.proto` used for subscriptions. Field tags
//! match the upstream definition so the messages are wire compatible with
//! any gNMI target; fields this crate never reads are left out and are
//! skipped by the decoder.

use std::collections::HashMap;

/// gRPC method path of the bidirectional Subscribe RPC.
pub const SUBSCRIBE_METHOD: &str = "/gnmi.gNMI/Subscribe";

/// Value encoding requested from the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Encoding {
    Json = 0,
    Bytes = 1,
    Proto = 2,
    Ascii = 3,
    JsonIetf = 4,
}

/// Per-path subscription mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SubscriptionMode {
    TargetDefined = 0,
    OnChange = 1,
    Sample = 2,
}

/// One element of a structured path.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PathElem {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(map = "string, string", tag = "2")]
    pub key: HashMap<String, String>,
}

impl PathElem {
    /// Creates an element without keys.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: HashMap::new(),
        }
    }

    /// Adds a key to the element.
    pub fn with_key(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.key.insert(key.into(), value.into());
        self
    }
}

/// A structured gNMI path.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Path {
    #[prost(string, tag = "2")]
    pub origin: String,
    #[prost(message, repeated, tag = "3")]
    pub elem: Vec<PathElem>,
    #[prost(string, tag = "4")]
    pub target: String,
}

/// A typed leaf or subtree value.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TypedValue {
    #[prost(oneof = "typed_value::Value", tags = "1, 2, 3, 4, 5, 10, 11, 12, 13, 14")]
    pub value: Option<typed_value::Value>,
}

pub mod typed_value {
    /// The value carried by a [`TypedValue`](super::TypedValue).
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(string, tag = "1")]
        StringVal(String),
        #[prost(int64, tag = "2")]
        IntVal(i64),
        #[prost(uint64, tag = "3")]
        UintVal(u64),
        #[prost(bool, tag = "4")]
        BoolVal(bool),
        #[prost(bytes = "vec", tag = "5")]
        BytesVal(Vec<u8>),
        #[prost(bytes = "vec", tag = "10")]
        JsonVal(Vec<u8>),
        #[prost(bytes = "vec", tag = "11")]
        JsonIetfVal(Vec<u8>),
        #[prost(string, tag = "12")]
        AsciiVal(String),
        #[prost(bytes = "vec", tag = "13")]
        ProtoBytes(Vec<u8>),
        #[prost(double, tag = "14")]
        DoubleVal(f64),
    }
}

impl TypedValue {
    /// Wraps a JSON_IETF document.
    pub fn json_ietf(doc: &serde_json::Value) -> Self {
        Self {
            value: Some(typed_value::Value::JsonIetfVal(doc.to_string().into_bytes())),
        }
    }

    /// Wraps an unsigned integer.
    pub fn uint(v: u64) -> Self {
        Self {
            value: Some(typed_value::Value::UintVal(v)),
        }
    }

    /// Returns the JSON payload bytes, if the value is JSON encoded.
    pub fn json_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            Some(typed_value::Value::JsonIetfVal(b)) | Some(typed_value::Value::JsonVal(b)) => {
                Some(b.as_slice())
            }
            _ => None,
        }
    }
}

/// A single path/value pair inside a notification.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Update {
    #[prost(message, optional, tag = "1")]
    pub path: Option<Path>,
    #[prost(message, optional, tag = "3")]
    pub val: Option<TypedValue>,
    #[prost(uint32, tag = "4")]
    pub duplicates: u32,
}

/// One telemetry push event.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Notification {
    /// Nanoseconds since the Unix epoch.
    #[prost(int64, tag = "1")]
    pub timestamp: i64,
    #[prost(message, optional, tag = "2")]
    pub prefix: Option<Path>,
    #[prost(message, repeated, tag = "4")]
    pub update: Vec<Update>,
    #[prost(message, repeated, tag = "5")]
    pub delete: Vec<Path>,
    #[prost(bool, tag = "6")]
    pub atomic: bool,
}

/// In-band error reported on a subscription.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Error {
    #[prost(uint32, tag = "1")]
    pub code: u32,
    #[prost(string, tag = "2")]
    pub message: String,
}

/// A single subscribed path.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Subscription {
    #[prost(message, optional, tag = "1")]
    pub path: Option<Path>,
    #[prost(enumeration = "SubscriptionMode", tag = "2")]
    pub mode: i32,
    /// Sample interval in nanoseconds.
    #[prost(uint64, tag = "3")]
    pub sample_interval: u64,
    #[prost(bool, tag = "4")]
    pub suppress_redundant: bool,
    #[prost(uint64, tag = "5")]
    pub heartbeat_interval: u64,
}

/// The set of paths requested by one Subscribe RPC.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscriptionList {
    #[prost(message, optional, tag = "1")]
    pub prefix: Option<Path>,
    #[prost(message, repeated, tag = "2")]
    pub subscription: Vec<Subscription>,
    #[prost(enumeration = "subscription_list::Mode", tag = "5")]
    pub mode: i32,
    #[prost(bool, tag = "6")]
    pub allow_aggregation: bool,
    #[prost(enumeration = "Encoding", tag = "8")]
    pub encoding: i32,
    #[prost(bool, tag = "9")]
    pub updates_only: bool,
}

pub mod subscription_list {
    /// Lifetime of the subscription as a whole.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Mode {
        Stream = 0,
        Once = 1,
        Poll = 2,
    }
}

/// Trigger for a POLL subscription.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Poll {}

/// Client to target message on the Subscribe RPC.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscribeRequest {
    #[prost(oneof = "subscribe_request::Request", tags = "1, 3")]
    pub request: Option<subscribe_request::Request>,
}

pub mod subscribe_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Request {
        #[prost(message, tag = "1")]
        Subscribe(super::SubscriptionList),
        #[prost(message, tag = "3")]
        Poll(super::Poll),
    }
}

/// Target to client message on the Subscribe RPC.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscribeResponse {
    #[prost(oneof = "subscribe_response::Response", tags = "1, 3, 4")]
    pub response: Option<subscribe_response::Response>,
}

pub mod subscribe_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Response {
        #[prost(message, tag = "1")]
        Update(super::Notification),
        #[prost(bool, tag = "3")]
        SyncResponse(bool),
        #[prost(message, tag = "4")]
        Error(super::Error),
    }
}

impl SubscribeRequest {
    /// Builds a request subscribing to a single path.
    ///
    /// `sample_interval` only matters for [`SubscriptionMode::Sample`].
    pub fn single(
        path: Path,
        list_mode: subscription_list::Mode,
        mode: SubscriptionMode,
        sample_interval: std::time::Duration,
    ) -> Self {
        let subscription = Subscription {
            path: Some(path),
            mode: mode as i32,
            sample_interval: u64::try_from(sample_interval.as_nanos()).unwrap_or(u64::MAX),
            suppress_redundant: false,
            heartbeat_interval: 0,
        };
        let list = SubscriptionList {
            prefix: None,
            subscription: vec![subscription],
            mode: list_mode as i32,
            allow_aggregation: false,
            encoding: Encoding::JsonIetf as i32,
            updates_only: false,
        };
        Self {
            request: Some(subscribe_request::Request::Subscribe(list)),
        }
    }
}

impl SubscribeResponse {
    /// Wraps a notification.
    pub fn update(notification: Notification) -> Self {
        Self {
            response: Some(subscribe_response::Response::Update(notification)),
        }
    }

    /// The end-of-initial-sync marker.
    pub fn sync() -> Self {
        Self {
            response: Some(subscribe_response::Response::SyncResponse(true)),
        }
    }

    /// An in-band error.
    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self {
            response: Some(subscribe_response::Response::Error(Error {
                code,
                message: message.into(),
            })),
        }
    }
}
