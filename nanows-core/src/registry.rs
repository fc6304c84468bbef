//! Address → connection registry.
//!
//! The registry is the single source of truth for "is this address still
//! wanted". An entry exists from `connect` until `disconnect`; while it
//! exists, the reconnect policy keeps re-establishing its transport.
//!
//! Every establishment attempt is stamped with a fresh [`Generation`].
//! Transport events carry the generation they were created under, so an
//! event from a handle that was replaced (or removed and re-added under the
//! same address) can never be mistaken for the current one.

use crate::options::SocketOptions;
use crate::reconnect::ReconnectState;
use futures::channel::oneshot;
use hashbrown::HashMap;
use std::time::Duration;

/// Monotonic stamp identifying one establishment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    #[inline]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Transport link of an entry.
#[derive(Debug)]
pub enum Link<C> {
    /// Desired but no transport (establishing or waiting for a retry)
    Pending,
    /// Transport handle owned by the entry
    Live(C),
}

/// A retry scheduled by [`Registry::schedule_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retry {
    /// Generation the retry must still match when its timer fires
    pub generation: Generation,
    pub delay: Duration,
    pub attempt: u32,
}

#[derive(Debug)]
struct Entry<C> {
    generation: Generation,
    link: Link<C>,
    waiters: Vec<oneshot::Sender<()>>,
    reconnect: ReconnectState,
}

/// Registry of connections keyed by address.
#[derive(Debug)]
pub struct Registry<C> {
    entries: HashMap<String, Entry<C>>,
    next_generation: u64,
    template: ReconnectState,
}

impl<C> Registry<C> {
    #[must_use]
    pub fn new(options: &SocketOptions) -> Self {
        Self {
            entries: HashMap::new(),
            next_generation: 0,
            template: ReconnectState::new(options),
        }
    }

    fn fresh(&mut self) -> Generation {
        self.next_generation += 1;
        Generation(self.next_generation)
    }

    /// Register `address` if absent.
    ///
    /// Returns the generation for the first establishment attempt and a
    /// receiver completed when the address first opens. Returns `None` when
    /// the address is already registered.
    pub fn reserve(&mut self, address: &str) -> Option<(Generation, oneshot::Receiver<()>)> {
        if self.entries.contains_key(address) {
            return None;
        }

        let generation = self.fresh();
        let (tx, rx) = oneshot::channel();
        self.entries.insert(
            address.to_string(),
            Entry {
                generation,
                link: Link::Pending,
                waiters: vec![tx],
                reconnect: self.template.clone(),
            },
        );
        Some((generation, rx))
    }

    /// Hand a freshly created transport to its entry.
    ///
    /// Gives the handle back if the entry is gone or has moved on.
    pub fn attach(&mut self, address: &str, generation: Generation, conn: C) -> Result<(), C> {
        match self.entries.get_mut(address) {
            Some(entry) if entry.generation == generation && matches!(entry.link, Link::Pending) => {
                entry.link = Link::Live(conn);
                Ok(())
            }
            _ => Err(conn),
        }
    }

    /// Whether `generation` is the current attempt for `address`.
    pub fn is_current(&self, address: &str, generation: Generation) -> bool {
        self.entries
            .get(address)
            .is_some_and(|entry| entry.generation == generation)
    }

    /// Whether `address` is waiting for a retry stamped `generation`.
    pub fn awaiting_retry(&self, address: &str, generation: Generation) -> bool {
        self.entries.get(address).is_some_and(|entry| {
            entry.generation == generation && matches!(entry.link, Link::Pending)
        })
    }

    /// Record that the current transport of `address` opened.
    ///
    /// Completes every `connect` waiting on the address and resets the
    /// reconnect counter. Returns false for stale generations.
    pub fn mark_open(&mut self, address: &str, generation: Generation) -> bool {
        let Some(entry) = self.entries.get_mut(address) else {
            return false;
        };
        if entry.generation != generation {
            return false;
        }

        entry.reconnect.reset();
        for waiter in entry.waiters.drain(..) {
            let _ = waiter.send(());
        }
        true
    }

    /// Drop the current transport of `address` and stamp a retry.
    ///
    /// Used both for unexpected closes and synchronous establishment
    /// failures. Returns `None` if the address is gone or `generation` is
    /// stale, i.e. nobody wants it reconnected.
    pub fn schedule_retry(&mut self, address: &str, generation: Generation) -> Option<Retry> {
        let next = Generation(self.next_generation + 1);
        let entry = self.entries.get_mut(address)?;
        if entry.generation != generation {
            return None;
        }

        self.next_generation = next.0;
        entry.generation = next;
        entry.link = Link::Pending;
        let delay = entry.reconnect.next_delay();

        Some(Retry {
            generation: next,
            delay,
            attempt: entry.reconnect.attempt(),
        })
    }

    /// Remove `address`, returning its live transport if it had one.
    ///
    /// Pending `connect` waiters are dropped, which fails them.
    pub fn remove(&mut self, address: &str) -> Option<Link<C>> {
        self.entries.remove(address).map(|entry| entry.link)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.contains_key(address)
    }

    /// Number of registered addresses, live or pending.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries holding a transport handle.
    pub fn live_len(&self) -> usize {
        self.live().count()
    }

    /// Entries holding a transport handle.
    pub fn live(&self) -> impl Iterator<Item = (&str, &C)> {
        self.entries.iter().filter_map(|(address, entry)| match &entry.link {
            Link::Live(conn) => Some((address.as_str(), conn)),
            Link::Pending => None,
        })
    }

    pub fn addresses(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Empty the registry, returning every live transport.
    pub fn drain_live(&mut self) -> Vec<C> {
        self.entries
            .drain()
            .filter_map(|(_, entry)| match entry.link {
                Link::Live(conn) => Some(conn),
                Link::Pending => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Protocol;
    use futures::FutureExt;

    fn registry() -> Registry<&'static str> {
        Registry::new(
            &SocketOptions::new(Protocol::Bus).with_reconnect_time(Duration::from_millis(30)),
        )
    }

    #[test]
    fn test_reserve_is_idempotent_by_address() {
        let mut reg = registry();
        assert!(reg.reserve("wss://a").is_some());
        assert!(reg.reserve("wss://a").is_none());
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.live_len(), 0);
    }

    #[test]
    fn test_attach_and_open_resolves_waiter() {
        let mut reg = registry();
        let (gen, mut rx) = reg.reserve("wss://a").unwrap();

        assert!(reg.attach("wss://a", gen, "conn-1").is_ok());
        assert_eq!(reg.live_len(), 1);
        assert!(rx.try_recv().unwrap().is_none());

        assert!(reg.mark_open("wss://a", gen));
        assert_eq!(rx.now_or_never(), Some(Ok(())));
    }

    #[test]
    fn test_stale_generation_is_rejected() {
        let mut reg = registry();
        let (old, _rx) = reg.reserve("wss://a").unwrap();
        reg.attach("wss://a", old, "conn-1").unwrap();

        let retry = reg.schedule_retry("wss://a", old).unwrap();
        assert!(retry.generation > old);
        assert!(!reg.is_current("wss://a", old));
        assert!(!reg.mark_open("wss://a", old));
        assert_eq!(reg.attach("wss://a", old, "conn-stale"), Err("conn-stale"));
        assert!(reg.schedule_retry("wss://a", old).is_none());
    }

    #[test]
    fn test_remove_then_readd_gets_new_generation() {
        let mut reg = registry();
        let (first, _rx) = reg.reserve("wss://a").unwrap();
        reg.attach("wss://a", first, "conn-1").unwrap();

        assert!(matches!(reg.remove("wss://a"), Some(Link::Live("conn-1"))));
        let (second, _rx) = reg.reserve("wss://a").unwrap();

        assert_ne!(first, second);
        assert!(!reg.is_current("wss://a", first));
        assert!(reg.schedule_retry("wss://a", first).is_none());
    }

    #[test]
    fn test_remove_fails_pending_connect() {
        let mut reg = registry();
        let (_gen, rx) = reg.reserve("wss://a").unwrap();
        reg.remove("wss://a");
        assert!(rx.now_or_never().unwrap().is_err());
    }

    #[test]
    fn test_retry_uses_fixed_delay_and_counts_attempts() {
        let mut reg = registry();
        let (mut gen, _rx) = reg.reserve("wss://a").unwrap();

        for attempt in 1..=3 {
            let retry = reg.schedule_retry("wss://a", gen).unwrap();
            assert_eq!(retry.delay, Duration::from_millis(30));
            assert_eq!(retry.attempt, attempt);
            assert!(reg.awaiting_retry("wss://a", retry.generation));
            gen = retry.generation;
        }

        reg.attach("wss://a", gen, "conn").unwrap();
        assert!(!reg.awaiting_retry("wss://a", gen));
        assert!(reg.mark_open("wss://a", gen));
        assert_eq!(reg.schedule_retry("wss://a", gen).unwrap().attempt, 1);
    }

    #[test]
    fn test_drain_live() {
        let mut reg = registry();
        let (a, _ra) = reg.reserve("wss://a").unwrap();
        let (_b, _rb) = reg.reserve("wss://b").unwrap();
        reg.attach("wss://a", a, "conn-a").unwrap();

        assert_eq!(reg.drain_live(), vec!["conn-a"]);
        assert!(reg.is_empty());
    }
}
