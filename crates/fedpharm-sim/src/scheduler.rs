//! Virtual-time timer queue.
//!
//! Every delay in the session (round ticks, upload progress, typing
//! indicators) is a timer in one `TimerQueue`. The queue never sleeps: the
//! owner pops due events up to a target instant and dispatches them one at a
//! time, so a handler that cancels a timer prevents any later firing within
//! the same advance. The tokio runtime maps wall-clock time onto the queue;
//! tests advance it directly.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifies one scheduled timer. A repeating timer keeps its handle across
/// firings until cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(u64);

/// Scheduling surface the state machines are written against.
pub trait Scheduler<T> {
    fn schedule_once(&mut self, delay: Duration, event: T) -> TimerHandle;
    fn schedule_repeating(&mut self, interval: Duration, event: T) -> TimerHandle;
    /// Returns false if the handle was already fired (one-shot) or cancelled.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
}

#[derive(Debug)]
struct Timer<E> {
    key: (Duration, u64),
    event: E,
    repeat: Option<Duration>,
}

#[derive(Debug)]
pub struct TimerQueue<E> {
    now: Duration,
    next_seq: u64,
    next_handle: u64,
    order: BTreeMap<(Duration, u64), TimerHandle>,
    timers: HashMap<TimerHandle, Timer<E>>,
}

impl<E: Clone> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone> TimerQueue<E> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            next_handle: 0,
            order: BTreeMap::new(),
            timers: HashMap::new(),
        }
    }

    /// Virtual time elapsed since the queue was created.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.timers.contains_key(&handle)
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.order.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return the earliest timer due at or before `until`,
    /// moving the clock to its deadline. Repeating timers are re-armed.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerHandle, E)> {
        let (&key, &handle) = self.order.iter().next()?;
        if key.0 > until {
            return None;
        }
        self.order.remove(&key);
        let timer = self.timers.remove(&handle)?;
        self.now = self.now.max(key.0);

        match timer.repeat {
            Some(interval) => {
                let event = timer.event.clone();
                self.arm(handle, key.0 + interval, timer.event, Some(interval));
                Some((handle, event))
            }
            None => Some((handle, timer.event)),
        }
    }

    /// Move the clock forward without firing anything. Callers drain
    /// `pop_due` first; the clock never moves backwards.
    pub fn advance_clock(&mut self, to: Duration) {
        self.now = self.now.max(to);
    }

    /// View this queue as a `Scheduler<T>` for a component whose events are
    /// wrapped into `E` by `wrap`.
    pub fn scoped<F>(&mut self, wrap: F) -> Scoped<'_, E, F> {
        Scoped { queue: self, wrap }
    }

    fn arm(&mut self, handle: TimerHandle, deadline: Duration, event: E, repeat: Option<Duration>) {
        let key = (deadline, self.next_seq);
        self.next_seq += 1;
        self.order.insert(key, handle);
        self.timers.insert(handle, Timer { key, event, repeat });
    }

    fn new_handle(&mut self) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl<E: Clone> Scheduler<E> for TimerQueue<E> {
    fn schedule_once(&mut self, delay: Duration, event: E) -> TimerHandle {
        let handle = self.new_handle();
        let deadline = self.now + delay;
        self.arm(handle, deadline, event, None);
        handle
    }

    fn schedule_repeating(&mut self, interval: Duration, event: E) -> TimerHandle {
        // a zero interval would fire forever within one advance
        let interval = interval.max(Duration::from_millis(1));
        let handle = self.new_handle();
        let deadline = self.now + interval;
        self.arm(handle, deadline, event, Some(interval));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.timers.remove(&handle) {
            Some(timer) => {
                self.order.remove(&timer.key);
                true
            }
            None => false,
        }
    }
}

/// Borrowed adapter returned by [`TimerQueue::scoped`].
pub struct Scoped<'a, E, F> {
    queue: &'a mut TimerQueue<E>,
    wrap: F,
}

impl<'a, T, E, F> Scheduler<T> for Scoped<'a, E, F>
where
    E: Clone,
    F: Fn(T) -> E,
{
    fn schedule_once(&mut self, delay: Duration, event: T) -> TimerHandle {
        let event = (self.wrap)(event);
        self.queue.schedule_once(delay, event)
    }

    fn schedule_repeating(&mut self, interval: Duration, event: T) -> TimerHandle {
        let event = (self.wrap)(event);
        self.queue.schedule_repeating(interval, event)
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.queue.cancel(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(q: &mut TimerQueue<&'static str>, until: Duration) -> Vec<&'static str> {
        let mut fired = Vec::new();
        while let Some((_, ev)) = q.pop_due(until) {
            fired.push(ev);
        }
        q.advance_clock(until);
        fired
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut q = TimerQueue::new();
        q.schedule_once(Duration::from_millis(400), "begin");
        assert!(drain(&mut q, Duration::from_millis(399)).is_empty());
        assert_eq!(drain(&mut q, Duration::from_millis(400)), vec!["begin"]);
        assert!(drain(&mut q, Duration::from_secs(10)).is_empty());
        assert!(q.is_empty());
    }

    #[test]
    fn test_repeating_fires_each_interval() {
        let mut q = TimerQueue::new();
        q.schedule_repeating(Duration::from_millis(150), "tick");
        assert_eq!(drain(&mut q, Duration::from_millis(450)).len(), 3);
        assert_eq!(q.now(), Duration::from_millis(450));
        assert_eq!(q.next_deadline(), Some(Duration::from_millis(600)));
    }

    #[test]
    fn test_cancel_releases_handle() {
        let mut q = TimerQueue::new();
        let h = q.schedule_repeating(Duration::from_millis(100), "tick");
        assert!(q.cancel(h));
        assert!(!q.cancel(h));
        assert!(!q.is_active(h));
        assert!(drain(&mut q, Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_equal_deadlines_fire_in_schedule_order() {
        let mut q = TimerQueue::new();
        q.schedule_once(Duration::from_millis(10), "a");
        q.schedule_once(Duration::from_millis(10), "b");
        q.schedule_once(Duration::from_millis(5), "c");
        assert_eq!(drain(&mut q, Duration::from_millis(10)), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_scoped_wraps_events() {
        #[derive(Debug, Clone, PartialEq)]
        enum Outer {
            Inner(u8),
        }
        let mut q: TimerQueue<Outer> = TimerQueue::new();
        {
            let mut s = q.scoped(Outer::Inner);
            s.schedule_once(Duration::from_millis(1), 7u8);
        }
        assert_eq!(q.pop_due(Duration::from_millis(1)).map(|(_, e)| e), Some(Outer::Inner(7)));
    }
}
