use crate::options::SocketOptions;
use crate::payload::Payload;
use crate::protocol::Protocol;
use bytes::{BufMut, Bytes, BytesMut};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// Length of the REQ correlation header
pub const HEADER_LEN: usize = 4;

/// The 4-byte value prefixed to every REQ frame.
///
/// Generated once per socket from the OS random source. The most
/// significant bit is always set: a REP peer only answers requests whose
/// first header byte has its top bit set.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationSeed([u8; HEADER_LEN]);

impl CorrelationSeed {
    /// Draw a fresh seed from the operating system's secure RNG.
    pub fn generate() -> Self {
        let mut raw = [0u8; HEADER_LEN];
        OsRng.fill_bytes(&mut raw);
        Self::from_bytes(raw)
    }

    /// Build a seed from raw bytes, forcing the top bit.
    pub const fn from_bytes(mut raw: [u8; HEADER_LEN]) -> Self {
        raw[0] |= 0x80;
        Self(raw)
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; HEADER_LEN] {
        &self.0
    }
}

impl fmt::Debug for CorrelationSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationSeed({})", hex::encode(self.0))
    }
}

/// Protocol envelope codec
///
/// REQ:
/// - outbound → `[seed][payload bytes]`, always binary
/// - inbound → first 4 bytes stripped
///
/// PAIR / SUB / BUS:
/// - no header in either direction
#[derive(Debug, Clone)]
pub struct FrameCodec {
    seed: Option<CorrelationSeed>,
    send_binary: bool,
    receive_binary: bool,
}

impl FrameCodec {
    /// Build the codec for a socket. A seed is generated only for REQ.
    #[must_use]
    pub fn new(options: &SocketOptions) -> Self {
        let seed = options
            .protocol
            .uses_request_header()
            .then(CorrelationSeed::generate);
        Self::with_seed(options, seed)
    }

    /// Build the codec with an explicit seed (ignored unless REQ).
    #[must_use]
    pub fn with_seed(options: &SocketOptions, seed: Option<CorrelationSeed>) -> Self {
        Self {
            seed: seed.filter(|_| options.protocol == Protocol::Req),
            send_binary: options.send_binary,
            receive_binary: options.receive_binary,
        }
    }

    #[inline]
    pub const fn seed(&self) -> Option<CorrelationSeed> {
        self.seed
    }

    /// Frame an outbound payload
    pub fn encode(&self, payload: Payload) -> Payload {
        match self.seed {
            Some(seed) => {
                let mut out = BytesMut::with_capacity(HEADER_LEN + payload.len());
                out.put_slice(seed.as_bytes());
                out.put_slice(payload.as_bytes());
                Payload::Binary(out.freeze())
            }
            None => match payload {
                Payload::Text(text) if self.send_binary => {
                    Payload::Binary(Bytes::from(text.into_bytes()))
                }
                other => other,
            },
        }
    }

    /// Unframe an inbound frame into the payload handed to listeners
    pub fn decode(&self, frame: Payload) -> Payload {
        if self.seed.is_some() {
            let mut bytes = frame.into_bytes();
            let _header = bytes.split_to(HEADER_LEN.min(bytes.len()));
            return self.deliver_bytes(bytes);
        }

        match frame {
            Payload::Binary(bytes) => self.deliver_bytes(bytes),
            text => text,
        }
    }

    /// Whether an inbound frame carries this socket's header.
    ///
    /// Sockets without a seed accept everything.
    pub fn header_matches(&self, frame: &Payload) -> bool {
        match self.seed {
            Some(seed) => frame.as_bytes().starts_with(seed.as_bytes()),
            None => true,
        }
    }

    fn deliver_bytes(&self, bytes: Bytes) -> Payload {
        if self.receive_binary {
            Payload::Binary(bytes)
        } else {
            Payload::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}
