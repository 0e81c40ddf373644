//! FIFO correlation of requests and responses.
//!
//! The wire protocol carries no request identifier: the n-th response
//! answers the n-th request. The queue holds one single-assignment slot per
//! request in send order and completes them strictly front to back. It
//! cannot verify that the peer answered in order; it trusts it to.
//!
//! A caller that stops waiting leaves a void slot behind. The slot still
//! consumes its response, so later requests stay aligned.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{FramelinkError, Result};

/// Sending side of a pending request's slot.
pub(crate) type Completion = oneshot::Sender<Result<Value>>;

/// Awaitable result of one `send`.
///
/// Resolves to the decoded response, or to the failure that ended the
/// request. Dropping it turns the queued slot into a void slot.
#[derive(Debug)]
#[must_use = "a pending request does nothing unless awaited"]
pub struct PendingRequest {
    rx: oneshot::Receiver<Result<Value>>,
}

impl PendingRequest {
    /// Create an unqueued slot; the completion side is pushed later.
    pub(crate) fn channel() -> (Completion, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }
}

impl Future for PendingRequest {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| match result {
            Ok(outcome) => outcome,
            // Slot dropped without completion: the session is gone.
            Err(_) => Err(FramelinkError::ConnectionClosed),
        })
    }
}

/// Ordered completion slots awaiting responses.
#[derive(Debug, Default)]
pub struct PendingRequestQueue {
    slots: VecDeque<Completion>,
}

impl PendingRequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot and return the caller's side of it.
    pub fn enqueue(&mut self) -> PendingRequest {
        let (completion, pending) = PendingRequest::channel();
        self.push(completion);
        pending
    }

    /// Append a slot created elsewhere (the handle creates it at send time).
    pub(crate) fn push(&mut self, completion: Completion) {
        self.slots.push_back(completion);
    }

    /// Complete the oldest slot with a response.
    ///
    /// # Errors
    ///
    /// `Correlation` if nothing is pending (an unsolicited or extra frame).
    pub fn resolve_oldest(&mut self, value: Value) -> Result<()> {
        self.complete_oldest(Ok(value))
    }

    /// Complete the oldest slot with a failure.
    ///
    /// # Errors
    ///
    /// `Correlation` if nothing is pending.
    pub fn reject_oldest(&mut self, reason: FramelinkError) -> Result<()> {
        self.complete_oldest(Err(reason))
    }

    fn complete_oldest(&mut self, outcome: Result<Value>) -> Result<()> {
        let slot = self.slots.pop_front().ok_or(FramelinkError::Correlation)?;

        if slot.send(outcome).is_err() {
            tracing::trace!("Discarded response for abandoned request");
        }
        Ok(())
    }

    /// Fail every pending slot. Returns how many were failed.
    ///
    /// Calling it again on an empty queue is a no-op.
    pub fn drain_all<F>(&mut self, mut reason: F) -> usize
    where
        F: FnMut() -> FramelinkError,
    {
        let count = self.slots.len();
        for slot in self.slots.drain(..) {
            let _ = slot.send(Err(reason()));
        }
        count
    }

    /// Number of slots awaiting a response, void slots included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
