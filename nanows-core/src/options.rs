//! Socket configuration options
//!
//! Every socket owns its own `SocketOptions` value; nothing here is
//! process-wide.

use crate::protocol::Protocol;
use std::time::Duration;

/// How inbound frames are matched against the pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMatching {
    /// Any inbound frame resolves the pending request.
    #[default]
    Any,

    /// REQ only: a frame resolves the pending request only if its 4-byte
    /// header equals the socket's correlation seed. Non-matching frames are
    /// still delivered to `data` listeners. Other protocols behave as `Any`.
    Header,
}

/// Socket configuration options.
///
/// # Examples
///
/// ```
/// use nanows_core::options::SocketOptions;
/// use nanows_core::protocol::Protocol;
/// use std::time::Duration;
///
/// let opts = SocketOptions::new(Protocol::Req)
///     .with_debug(true)
///     .with_reconnect_time(Duration::from_millis(250));
/// assert_eq!(opts.reconnect_time, Duration::from_millis(250));
/// ```
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Scalability protocol spoken by the socket. Immutable once the
    /// socket is built.
    pub protocol: Protocol,

    /// Raise lifecycle and frame logs from `trace` to `debug` level.
    ///
    /// Never alters control flow.
    pub debug: bool,

    /// Fixed delay before re-establishing a lost or failed connection.
    /// - Default: 1000ms
    /// - No backoff, no jitter, no retry ceiling
    pub reconnect_time: Duration,

    /// Deliver inbound binary frames as `Payload::Binary` instead of
    /// decoding them to text.
    pub receive_binary: bool,

    /// Convert outbound text payloads to binary frames.
    pub send_binary: bool,

    /// Upper bound on how long a `Reply` waits.
    /// - `None`: wait forever (default)
    /// - `Some(duration)`: fail with `RequestTimeout` after duration
    pub request_timeout: Option<Duration>,

    /// Reply matching discipline for REQ sockets.
    pub reply_matching: ReplyMatching,
}

impl SocketOptions {
    /// Create options for a protocol with default values.
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            debug: false,
            reconnect_time: Duration::from_millis(1000),
            receive_binary: false,
            send_binary: false,
            request_timeout: None,
            reply_matching: ReplyMatching::Any,
        }
    }

    /// Enable or disable debug logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set reconnect delay.
    pub fn with_reconnect_time(mut self, delay: Duration) -> Self {
        self.reconnect_time = delay;
        self
    }

    /// Deliver inbound binary frames as bytes.
    pub fn with_receive_binary(mut self, enabled: bool) -> Self {
        self.receive_binary = enabled;
        self
    }

    /// Send text payloads as binary frames.
    pub fn with_send_binary(mut self, enabled: bool) -> Self {
        self.send_binary = enabled;
        self
    }

    /// Set request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set reply matching discipline.
    pub fn with_reply_matching(mut self, matching: ReplyMatching) -> Self {
        self.reply_matching = matching;
        self
    }
}
