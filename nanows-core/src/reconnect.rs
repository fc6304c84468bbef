//! Reconnection policy with a fixed delay.
//!
//! A connection that drops or fails to establish is retried after the
//! socket's `reconnect_time`, forever, for as long as its address stays
//! registered. There is no backoff, jitter or attempt ceiling; the attempt
//! counter only feeds logs and monitor events.

use crate::options::SocketOptions;
use std::time::Duration;

/// Reconnection state tracker for one address.
///
/// # Example
///
/// ```rust
/// use nanows_core::options::SocketOptions;
/// use nanows_core::protocol::Protocol;
/// use nanows_core::reconnect::ReconnectState;
/// use std::time::Duration;
///
/// let options = SocketOptions::new(Protocol::Bus)
///     .with_reconnect_time(Duration::from_millis(100));
///
/// let mut reconnect = ReconnectState::new(&options);
///
/// // Every attempt waits the same interval
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// assert_eq!(reconnect.next_delay(), Duration::from_millis(100));
/// assert_eq!(reconnect.attempt(), 2);
///
/// // Reset once the connection opens
/// reconnect.reset();
/// assert_eq!(reconnect.attempt(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ReconnectState {
    /// Delay before each attempt
    interval: Duration,
    /// Attempts scheduled since the last successful open
    attempt: u32,
}

impl ReconnectState {
    /// Create a new reconnection state tracker from socket options.
    pub const fn new(options: &SocketOptions) -> Self {
        Self {
            interval: options.reconnect_time,
            attempt: 0,
        }
    }

    /// Get the delay for the next reconnection attempt and count it.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.interval
    }

    /// Reset the attempt counter after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Get the current attempt number.
    #[inline]
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Get the reconnection interval.
    #[inline]
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}
