//! Message payloads.
//!
//! A duplex message transport carries either text or binary frames; a
//! `Payload` keeps that distinction so the socket can honour the
//! binary/text send and receive modes.

use bytes::Bytes;
use std::borrow::Cow;
use std::fmt;

/// A single message, as sent by the caller or delivered to listeners.
///
/// # Examples
///
/// ```
/// use nanows_core::payload::Payload;
///
/// let text = Payload::from("hello");
/// assert_eq!(text.as_bytes(), b"hello");
/// assert_eq!(text.as_text(), Some("hello"));
///
/// let binary = Payload::from(vec![1u8, 2, 3]);
/// assert!(binary.is_binary());
/// assert_eq!(binary.len(), 3);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame
    Binary(Bytes),
}

impl Payload {
    /// Byte representation of the payload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Text content, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Consume the payload into its byte representation.
    ///
    /// Text is converted without copying.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::from(text.into_bytes()),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Lossy UTF-8 view, used when handing binary frames to text listeners.
    pub fn to_text_lossy(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text),
            Self::Binary(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    #[inline]
    pub const fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Binary(bytes) => f
                .debug_tuple("Binary")
                .field(&hex::encode(bytes))
                .finish(),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Binary(Bytes::from_static(bytes))
    }
}
