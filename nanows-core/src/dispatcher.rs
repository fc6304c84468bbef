//! Listener fan-out for inbound notifications.
//!
//! Listener lists are append-only: no deduplication, no removal. Dispatch
//! is synchronous and follows registration order.

use crate::error::TransportError;
use crate::payload::Payload;
use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Listener categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An inbound payload (after unframing)
    Data,
    /// A connection closed; carries the address
    End,
    /// A transport reported an error
    Error,
}

impl EventKind {
    /// Parse a category name, `None` for anything unknown.
    pub fn parse(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::End => "end",
            Self::Error => "error",
        }
    }
}

impl FromStr for EventKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" => Ok(Self::Data),
            "end" => Ok(Self::End),
            "error" => Ok(Self::Error),
            _ => Err(()),
        }
    }
}

/// What a listener receives.
#[derive(Debug, Clone, Copy)]
pub enum Notification<'a> {
    Data(&'a Payload),
    End(&'a str),
    Error(&'a TransportError),
}

impl Notification<'_> {
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Data(_) => EventKind::Data,
            Self::End(_) => EventKind::End,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// A registered callback.
pub type Listener = Rc<dyn Fn(&Notification<'_>)>;

type ListenerList = SmallVec<[Listener; 2]>;

/// Per-category listener lists.
#[derive(Default)]
pub struct EventDispatcher {
    data: ListenerList,
    end: ListenerList,
    error: ListenerList,
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener to a category.
    pub fn register(&mut self, kind: EventKind, listener: Listener) {
        self.list_mut(kind).push(listener);
    }

    /// Snapshot of the listeners for `kind`, in registration order.
    ///
    /// Callers dispatch from the snapshot so listeners may register more
    /// listeners (or touch the owning socket) while being notified.
    pub fn snapshot(&self, kind: EventKind) -> Vec<Listener> {
        self.list(kind).to_vec()
    }

    pub fn len(&self, kind: EventKind) -> usize {
        self.list(kind).len()
    }

    fn list(&self, kind: EventKind) -> &ListenerList {
        match kind {
            EventKind::Data => &self.data,
            EventKind::End => &self.end,
            EventKind::Error => &self.error,
        }
    }

    fn list_mut(&mut self, kind: EventKind) -> &mut ListenerList {
        match kind {
            EventKind::Data => &mut self.data,
            EventKind::End => &mut self.end,
            EventKind::Error => &mut self.error,
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("data", &self.data.len())
            .field("end", &self.end.len())
            .field("error", &self.error.len())
            .finish()
    }
}

/// Deliver a notification to a listener snapshot.
pub fn notify(listeners: &[Listener], notification: &Notification<'_>) {
    for listener in listeners {
        listener(notification);
    }
}
