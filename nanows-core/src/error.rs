//! nanows Error Types
//!
//! Caller-facing failures (`NanoError`) and transport-level failures
//! (`TransportError`) reported by the duplex transport collaborator.
//! Transport failures never reach callers as `NanoError`: they go to
//! `error` listeners or feed the reconnect policy.

use crate::protocol::Protocol;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Main error type for nanows socket operations
#[derive(Error, Debug)]
pub enum NanoError {
    /// Operation that the client role can never perform (e.g. `bind`)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation forbidden by the socket's protocol (e.g. `send` on SUB)
    #[error("{0} socket can not {1}")]
    Role(Protocol, &'static str),

    /// `send` called while no connection is registered
    #[error("Not connected to any endpoint")]
    NotConnected,

    /// The address was disconnected before its connection opened
    #[error("Connect to {0} aborted by disconnect")]
    ConnectAborted(String),

    /// No reply arrived within the configured request timeout
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),
}

/// Result type alias for nanows operations
pub type Result<T> = std::result::Result<T, NanoError>;

impl NanoError {
    /// Create a configuration error with a message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this error is caller misuse, reported synchronously at the
    /// call site.
    #[must_use]
    pub const fn is_misuse(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Role(..) | Self::NotConnected
        )
    }

    /// Check if this is a connection error
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::ConnectAborted(_)
        )
    }
}

/// Errors reported by a transport connection.
///
/// These are non-fatal from the socket's point of view: they reach `error`
/// listeners or feed the reconnect policy, never tear the socket down.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The transport refused to create a connection
    #[error("Connection refused: {0}")]
    Refused(String),

    /// The address could not be understood by the transport
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Operation on a connection that is closing or closed
    #[error("Connection closed")]
    Closed,

    /// Underlying I/O failure
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Anything else the transport wants to report
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a refused error
    pub fn refused(reason: impl Into<String>) -> Self {
        Self::Refused(reason.into())
    }

    /// Create a free-form transport error
    pub fn other(reason: impl Into<String>) -> Self {
        Self::Other(reason.into())
    }
}
