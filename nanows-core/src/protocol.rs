//! Scalability protocol enumeration.
//!
//! This module provides the `Protocol` enum which names the four
//! client-side protocols a socket can speak, and the WebSocket
//! sub-protocol each one negotiates with its peer.

use std::fmt;
use std::str::FromStr;

/// Client-side scalability protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// REQ socket: request/reply client, frames carry a 4-byte correlation header
    Req,

    /// PAIR socket: exclusive duplex peer, one pending request at a time
    Pair,

    /// SUB socket: receive-only fan-in
    Sub,

    /// BUS socket: broadcast to every connected peer
    Bus,
}

impl Protocol {
    /// Get the protocol as a string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Req => "REQ",
            Self::Pair => "PAIR",
            Self::Sub => "SUB",
            Self::Bus => "BUS",
        }
    }

    /// WebSocket sub-protocol offered when opening a connection.
    ///
    /// The name identifies the peer role (a REQ client talks to
    /// `rep.sp.nanomsg.org`, a SUB client to `pub.sp.nanomsg.org`).
    pub fn subprotocol(&self) -> &'static str {
        match self {
            Self::Req => "rep.sp.nanomsg.org",
            Self::Pair => "pair.sp.nanomsg.org",
            Self::Sub => "pub.sp.nanomsg.org",
            Self::Bus => "bus.sp.nanomsg.org",
        }
    }

    /// Whether the protocol allows `send`.
    #[inline]
    pub const fn can_send(&self) -> bool {
        !matches!(self, Self::Sub)
    }

    /// Whether `send` yields a pending reply.
    #[inline]
    pub const fn correlates_replies(&self) -> bool {
        matches!(self, Self::Req | Self::Pair)
    }

    /// Whether frames carry the 4-byte correlation header.
    #[inline]
    pub const fn uses_request_header(&self) -> bool {
        matches!(self, Self::Req)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown protocol name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown protocol: {0} (expected REQ, PAIR, SUB or BUS)")]
pub struct UnknownProtocol(pub String);

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "REQ" => Ok(Self::Req),
            "PAIR" => Ok(Self::Pair),
            "SUB" => Ok(Self::Sub),
            "BUS" => Ok(Self::Bus),
            _ => Err(UnknownProtocol(s.to_string())),
        }
    }
}
