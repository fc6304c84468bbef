//! Deadline timers for reconnect delays and reply timeouts.
//!
//! One background thread keeps every armed deadline in a min-heap and
//! fires each through its own flume channel when it is due. Waiting is
//! `recv_async` on that channel, so the waiting task is woken through the
//! compio runtime's cross-thread notify path and wakes at its own
//! deadline, independent of any other timer pending on the runtime.
//!
//! Dropping a [`sleep`] future drops its receiver; the thread notices the
//! closed channel when the deadline comes up and discards the entry.

use futures::future::{select, Either};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

struct Arm {
    deadline: Instant,
    fire: flume::Sender<()>,
}

impl PartialEq for Arm {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}

impl Eq for Arm {}

impl PartialOrd for Arm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Arm {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline.cmp(&other.deadline)
    }
}

/// Handle to the timer thread, `None` if it could not be started.
fn timer_thread() -> Option<&'static flume::Sender<Arm>> {
    static TIMER: OnceLock<Option<flume::Sender<Arm>>> = OnceLock::new();

    TIMER
        .get_or_init(|| {
            let (tx, rx) = flume::unbounded();
            match thread::Builder::new()
                .name("nanows-timer".into())
                .spawn(move || run_timers(&rx))
            {
                Ok(_) => Some(tx),
                Err(err) => {
                    warn!(error = %err, "timer thread unavailable, using runtime timers");
                    None
                }
            }
        })
        .as_ref()
}

fn run_timers(commands: &flume::Receiver<Arm>) {
    let mut armed: BinaryHeap<Reverse<Arm>> = BinaryHeap::new();

    loop {
        let next = match armed.peek() {
            Some(Reverse(arm)) => commands.recv_deadline(arm.deadline),
            None => commands.recv().map_err(|_| flume::RecvTimeoutError::Disconnected),
        };

        match next {
            Ok(arm) => armed.push(Reverse(arm)),
            Err(flume::RecvTimeoutError::Timeout) => {}
            Err(flume::RecvTimeoutError::Disconnected) => return,
        }

        let now = Instant::now();
        while armed.peek().is_some_and(|Reverse(arm)| arm.deadline <= now) {
            if let Some(Reverse(arm)) = armed.pop() {
                // Receiver gone means the sleep was dropped.
                let _ = arm.fire.send(());
            }
        }
    }
}

/// Wait until `duration` has elapsed.
pub async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }

    let Some(timers) = timer_thread() else {
        compio::time::sleep(duration).await;
        return;
    };

    let (fire, fired) = flume::bounded(1);
    let arm = Arm {
        deadline: Instant::now() + duration,
        fire,
    };
    if timers.send(arm).is_err() {
        compio::time::sleep(duration).await;
        return;
    }

    trace!(?duration, "timer armed");
    let _ = fired.recv_async().await;
}

/// A [`timeout`] ran out before its future completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed(pub Duration);

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deadline of {:?} elapsed", self.0)
    }
}

impl std::error::Error for Elapsed {}

/// Run `future`, giving up after `duration`.
///
/// # Errors
///
/// Returns [`Elapsed`] when the deadline passes first.
pub async fn timeout<F: Future>(duration: Duration, future: F) -> Result<F::Output, Elapsed> {
    let future = pin!(future);
    let deadline = pin!(sleep(duration));

    match select(future, deadline).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(((), _)) => Err(Elapsed(duration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_heap_pops_earliest_first() {
        let (fire, _fired) = flume::bounded(1);
        let now = Instant::now();
        let mut heap = BinaryHeap::new();
        for millis in [300, 10, 100] {
            heap.push(Reverse(Arm {
                deadline: now + Duration::from_millis(millis),
                fire: fire.clone(),
            }));
        }

        let Reverse(first) = heap.pop().unwrap();
        assert_eq!(first.deadline, now + Duration::from_millis(10));
    }

    #[compio::test]
    async fn test_sleep_waits() {
        let start = Instant::now();
        sleep(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[compio::test]
    async fn test_short_sleep_not_held_by_longer_one() {
        let long_done = Rc::new(Cell::new(false));
        let flag = long_done.clone();
        let long = compio::runtime::spawn(async move {
            sleep(Duration::from_millis(500)).await;
            flag.set(true);
        });

        let start = Instant::now();
        sleep(Duration::from_millis(20)).await;
        assert!(start.elapsed() < Duration::from_millis(250));
        assert!(!long_done.get());
        drop(long);
    }

    #[compio::test]
    async fn test_timeout() {
        let quick = timeout(Duration::from_millis(200), async { 7 }).await;
        assert_eq!(quick, Ok(7));

        let stuck = timeout(Duration::from_millis(20), futures::future::pending::<()>()).await;
        assert_eq!(stuck, Err(Elapsed(Duration::from_millis(20))));
    }
}
