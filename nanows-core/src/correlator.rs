//! Single-slot request/reply correlation.
//!
//! REQ and PAIR sockets keep at most one pending request. A new `send`
//! replaces the slot; the previous `Reply` is abandoned and stays pending
//! forever (it neither resolves nor fails). The next inbound frame on any
//! connection resolves whatever is pending, with no id matching.
//!
//! A second request issued before the first is answered loses the first.
//! `ReplyMatching::Header` together with a request timeout narrows that.

use crate::error::{NanoError, Result};
use crate::payload::Payload;
use futures::channel::oneshot;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::time::Duration;
use tracing::trace;

/// Holds the one pending completion of a socket.
#[derive(Debug)]
pub struct RequestCorrelator {
    enabled: bool,
    pending: Option<oneshot::Sender<Payload>>,
    abandoned: u64,
}

impl RequestCorrelator {
    /// Create a correlator. When `enabled` is false, `begin` hands out nothing.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled,
            pending: None,
            abandoned: 0,
        }
    }

    /// Register a new pending request, abandoning any previous one.
    pub fn begin(&mut self, timeout: Option<Duration>) -> Option<Reply> {
        if !self.enabled {
            return None;
        }

        let (tx, rx) = oneshot::channel();
        if self.pending.replace(tx).is_some() {
            self.abandoned += 1;
            trace!(abandoned = self.abandoned, "pending request overwritten");
        }

        Some(Reply { rx, timeout })
    }

    /// Resolve the pending request, if any, with `payload`.
    ///
    /// Returns true when a waiting request was completed.
    pub fn resolve(&mut self, payload: &Payload) -> bool {
        match self.pending.take() {
            // The caller may have dropped its Reply; that still clears the slot.
            Some(tx) => tx.send(payload.clone()).is_ok(),
            None => false,
        }
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of requests overwritten before a reply arrived.
    #[inline]
    pub const fn abandoned(&self) -> u64 {
        self.abandoned
    }
}

/// Completion of a request sent on a REQ or PAIR socket.
///
/// Await it (or call [`Reply::wait`]) to get the reply payload. Without a
/// request timeout, a reply that never arrives leaves it pending forever.
#[must_use = "a Reply does nothing unless awaited"]
#[derive(Debug)]
pub struct Reply {
    rx: oneshot::Receiver<Payload>,
    timeout: Option<Duration>,
}

impl Reply {
    /// Wait for the reply.
    ///
    /// # Errors
    ///
    /// Returns `NanoError::RequestTimeout` when a request timeout is
    /// configured and elapses first.
    pub async fn wait(self) -> Result<Payload> {
        let rx = self.rx;
        let reply = async move {
            match rx.await {
                Ok(payload) => payload,
                // Abandoned: the slot was overwritten or the socket dropped.
                Err(oneshot::Canceled) => futures::future::pending().await,
            }
        };

        match self.timeout {
            None => Ok(reply.await),
            Some(duration) => crate::timer::timeout(duration, reply)
                .await
                .map_err(|_| NanoError::RequestTimeout(duration)),
        }
    }
}

impl IntoFuture for Reply {
    type Output = Result<Payload>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<Payload>>>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
