//! Subscribe RPC transport.
//!
//! [`Subscriber`] is the seam between the telemetry consumers and the
//! network: one call opens one bidirectional Subscribe RPC and hands back a
//! [`Subscription`]. [`GnmiClient`] implements it over a tonic channel;
//! tests use [`MockSubscriber`](crate::testing::MockSubscriber).

use crate::error::{GnmiError, Result};
use crate::proto::{SubscribeRequest, SubscribeResponse, SUBSCRIBE_METHOD};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info, instrument};

/// Capacity of the client to target request queue.
const REQUEST_QUEUE_DEPTH: usize = 8;

/// Default connect timeout for gNMI targets
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stream of responses from the target.
pub type ResponseStream = BoxStream<'static, std::result::Result<SubscribeResponse, tonic::Status>>;

/// An open Subscribe RPC.
///
/// The request side stays open until [`Subscription::close_send`] is called
/// or the handle is dropped; closing it is the gNMI half-close.
pub struct Subscription {
    requests: Option<mpsc::Sender<SubscribeRequest>>,
    responses: ResponseStream,
}

impl Subscription {
    /// Creates a subscription from its two halves.
    pub fn new(requests: mpsc::Sender<SubscribeRequest>, responses: ResponseStream) -> Self {
        Self {
            requests: Some(requests),
            responses,
        }
    }

    /// Receives the next response, or `None` once the target ended the stream.
    pub async fn recv(&mut self) -> Option<Result<SubscribeResponse>> {
        self.responses
            .next()
            .await
            .map(|r| r.map_err(GnmiError::from))
    }

    /// Half-closes the request side of the RPC.
    pub fn close_send(&mut self) {
        if self.requests.take().is_some() {
            debug!("Half-closed subscription request stream");
        }
    }

    /// Returns true while the request side is open.
    pub fn is_send_open(&self) -> bool {
        self.requests.is_some()
    }

    /// Splits the handle into its request sender and response stream.
    pub fn into_parts(self) -> (Option<mpsc::Sender<SubscribeRequest>>, ResponseStream) {
        (self.requests, self.responses)
    }
}

/// Opens Subscribe RPCs against a telemetry target.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Opens a subscription and sends `request` as its first message.
    ///
    /// Failing to open the RPC is fatal to the caller; implementations do
    /// not retry.
    async fn subscribe(&self, request: SubscribeRequest) -> Result<Subscription>;
}

/// Connection parameters for a gNMI target.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    /// `host:port` of the gNMI server
    pub address: String,
    /// Optional username sent as call metadata
    pub username: Option<String>,
    /// Optional password sent as call metadata
    pub password: Option<String>,
    /// Channel connect timeout
    pub connect_timeout: Duration,
}

impl TargetConfig {
    /// Creates a config for an address with no credentials.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            username: None,
            password: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn uri(&self) -> String {
        if self.address.contains("://") {
            self.address.clone()
        } else {
            format!("http://{}", self.address)
        }
    }
}

/// gNMI client over a plaintext HTTP/2 channel.
#[derive(Clone)]
pub struct GnmiClient {
    channel: Channel,
    config: TargetConfig,
}

impl GnmiClient {
    /// Connects to the target.
    #[instrument(skip_all, fields(address = %config.address))]
    pub async fn connect(config: TargetConfig) -> Result<Self> {
        let endpoint = Endpoint::from_shared(config.uri())
            .map_err(|e| GnmiError::Connect(format!("invalid address {}: {}", config.address, e)))?
            .connect_timeout(config.connect_timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| GnmiError::Connect(format!("{}: {}", config.address, e)))?;

        info!(address = %config.address, "Connected to gNMI target");
        Ok(Self { channel, config })
    }

    /// Returns the target configuration.
    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    fn insert_credentials<T>(&self, request: &mut tonic::Request<T>) -> Result<()> {
        if let Some(username) = &self.config.username {
            let value: MetadataValue<Ascii> = username
                .parse()
                .map_err(|e| GnmiError::InvalidMetadata(format!("username: {}", e)))?;
            request.metadata_mut().insert("username", value);
        }
        if let Some(password) = &self.config.password {
            let value: MetadataValue<Ascii> = password
                .parse()
                .map_err(|e| GnmiError::InvalidMetadata(format!("password: {}", e)))?;
            request.metadata_mut().insert("password", value);
        }
        Ok(())
    }
}

#[async_trait]
impl Subscriber for GnmiClient {
    #[instrument(skip_all, fields(address = %self.config.address))]
    async fn subscribe(&self, request: SubscribeRequest) -> Result<Subscription> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| GnmiError::Connect(format!("service not ready: {}", e)))?;

        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        tx.send(request).await.map_err(|_| GnmiError::Closed)?;

        let mut outbound = tonic::Request::new(ReceiverStream::new(rx));
        self.insert_credentials(&mut outbound)?;

        let codec: ProstCodec<SubscribeRequest, SubscribeResponse> = ProstCodec::default();
        let response = grpc
            .streaming(outbound, PathAndQuery::from_static(SUBSCRIBE_METHOD), codec)
            .await?;

        debug!("Subscribe RPC established");
        Ok(Subscription::new(tx, response.into_inner().boxed()))
    }
}
