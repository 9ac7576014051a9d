//! In-memory subscriber for tests.
//!
//! [`MockSubscriber`] replays scripted sessions, one per `subscribe` call,
//! and records every request it was sent.

use crate::client::{Subscriber, Subscription};
use crate::error::{GnmiError, Result};
use crate::proto::{Notification, SubscribeRequest, SubscribeResponse};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

type Item = std::result::Result<SubscribeResponse, tonic::Status>;

/// How a scripted session behaves once its responses are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// End the stream (EOF)
    Eof,
    /// Keep the stream open forever, even after a half-close
    Hang,
    /// Keep the stream open until the client half-closes
    OnHalfClose,
}

/// One scripted subscription.
#[derive(Debug, Clone)]
pub struct MockSession {
    responses: Vec<(Duration, Item)>,
    end: SessionEnd,
    refuse: Option<String>,
}

impl MockSession {
    /// Creates an empty session ending with `end`.
    pub fn new(end: SessionEnd) -> Self {
        Self {
            responses: Vec::new(),
            end,
            refuse: None,
        }
    }

    /// A session whose subscribe call fails.
    pub fn refused(reason: impl Into<String>) -> Self {
        Self {
            responses: Vec::new(),
            end: SessionEnd::Eof,
            refuse: Some(reason.into()),
        }
    }

    /// Queues a response delivered immediately.
    pub fn respond(self, response: SubscribeResponse) -> Self {
        self.respond_after(Duration::ZERO, response)
    }

    /// Queues a response delivered after `delay`.
    pub fn respond_after(mut self, delay: Duration, response: SubscribeResponse) -> Self {
        self.responses.push((delay, Ok(response)));
        self
    }

    /// Queues a notification.
    pub fn notify(self, notification: Notification) -> Self {
        self.respond(SubscribeResponse::update(notification))
    }

    /// Queues a transport error; the stream ends after it.
    pub fn fail(mut self, status: tonic::Status) -> Self {
        self.responses.push((Duration::ZERO, Err(status)));
        self
    }
}

/// Scripted [`Subscriber`].
#[derive(Clone, Default)]
pub struct MockSubscriber {
    sessions: Arc<Mutex<VecDeque<MockSession>>>,
    requests: Arc<Mutex<Vec<SubscribeRequest>>>,
}

impl MockSubscriber {
    /// Creates a subscriber with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a session served by the next `subscribe` call.
    pub fn push_session(&self, session: MockSession) -> &Self {
        self.sessions.lock().push_back(session);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<SubscribeRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Subscriber for MockSubscriber {
    async fn subscribe(&self, request: SubscribeRequest) -> Result<Subscription> {
        self.requests.lock().push(request);
        let session = self
            .sessions
            .lock()
            .pop_front()
            .ok_or_else(|| GnmiError::Connect("no scripted session".into()))?;
        if let Some(reason) = session.refuse {
            return Err(GnmiError::Connect(reason));
        }

        let (tx, rx) = mpsc::channel::<SubscribeRequest>(8);

        let scripted = stream::iter(session.responses)
            .then(|(delay, item)| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .boxed();

        let scripted = match session.end {
            SessionEnd::Eof => scripted,
            SessionEnd::Hang => scripted.chain(stream::pending::<Item>()).boxed(),
            SessionEnd::OnHalfClose => scripted
                .chain(stream::unfold(rx, |mut rx| async move {
                    while rx.recv().await.is_some() {}
                    None::<(Item, mpsc::Receiver<SubscribeRequest>)>
                }))
                .boxed(),
        };

        // A gRPC stream ends at its first error.
        let responses = stream::unfold((scripted, false), |(mut inner, failed)| async move {
            if failed {
                return None;
            }
            let item = inner.next().await?;
            let failed = item.is_err();
            Some((item, (inner, failed)))
        })
        .boxed();

        Ok(Subscription::new(tx, responses))
    }
}
