use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
    time::{Duration, Instant},
};

use once_cell::unsync::OnceCell;

use crate::{Clock, SystemClock, TimerHandle};

mod pending;
use pending::*;

/// Registry of armed timers, consulted by the host event loop.
///
/// Clones share the same registry. A scheduler and its timers belong to
/// one thread: the type is neither `Send` nor `Sync`.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerImpl>,
}

struct SchedulerImpl {
    clock: Box<dyn Clock>,
    /// Non-owning references to the active timers, earliest deadline first.
    pending: RefCell<PendingQueue<Weak<TimerHandle>>>,
}

impl Scheduler {
    /// Create a scheduler driven by the operating system's monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Create a scheduler driven by `clock`.
    pub fn with_clock<C>(clock: C) -> Self
    where
        C: Clock + 'static,
    {
        Self {
            inner: Rc::new(SchedulerImpl {
                clock: Box::new(clock),
                pending: Default::default(),
            }),
        }
    }

    /// Current instant of this scheduler's clock.
    pub fn now(&self) -> Instant {
        self.inner.clock.now()
    }

    /// Number of active timers.
    pub fn len(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Returns true when no timer is active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns how long the host may block before the earliest active timer is due.
    ///
    /// Returns [`None`] when no timer is active, i.e. the wait is unbounded.
    /// Nothing is dispatched.
    pub fn next_timeout(&self) -> Option<Duration> {
        let due = self.inner.pending.borrow().next_due()?;

        Some(due.saturating_duration_since(self.now()))
    }

    /// Fire every timer that is due, then returns [`next_timeout`](Self::next_timeout).
    ///
    /// The clock is sampled once per pass. Timers fire in deadline order,
    /// ties in arming order, and each timer fires at most once per pass:
    /// timers armed by callbacks during the pass wait for the next one.
    ///
    /// A panicking callback unwinds out of this call. The timer it belongs
    /// to is left inactive, timers that were not reached stay armed.
    ///
    /// Must not be called from inside a timer callback.
    pub fn check_timeouts(&self) -> Option<Duration> {
        let now = self.now();
        let horizon = self.inner.pending.borrow().next_seq();

        let mut fired = 0usize;

        while let Some(timer) = self.pop_due(now, horizon) {
            fired += 1;
            timer.fire();
        }

        if fired > 0 {
            log::trace!("dispatched {} timers, {} pending", fired, self.len());
        }

        self.next_timeout()
    }

    fn pop_due(&self, now: Instant, horizon: u64) -> Option<Rc<TimerHandle>> {
        loop {
            let entry = self.inner.pending.borrow_mut().pop_due(now, horizon)?;

            if let Some(timer) = entry.payload.upgrade() {
                return Some(timer);
            }

            log::warn!("skip released timer, seq={}", entry.seq);
        }
    }

    /// Insert `timer` due at `due`, returns the arming sequence number.
    pub(crate) fn arm(&self, due: Instant, timer: Weak<TimerHandle>) -> u64 {
        self.inner.pending.borrow_mut().insert(due, timer)
    }

    /// Remove the arming `seq` of a timer due at `due`.
    pub(crate) fn disarm(&self, due: Instant, seq: u64) -> bool {
        self.inner.pending.borrow_mut().remove(due, seq).is_some()
    }

    #[cfg(test)]
    fn pending_order(&self) -> Vec<(Instant, u64)> {
        self.inner
            .pending
            .borrow()
            .iter()
            .map(|entry| (entry.due, entry.seq))
            .collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.len())
            .finish()
    }
}

thread_local! {
    static LOCAL_SCHEDULER: OnceCell<Scheduler> = OnceCell::new();
}

/// Access this thread's default scheduler, creating it on first use.
pub fn local_scheduler() -> Scheduler {
    LOCAL_SCHEDULER.with(|cell| cell.get_or_init(Scheduler::new).clone())
}

/// Install `scheduler` as this thread's default scheduler.
///
/// Fails, handing the scheduler back, if the default scheduler already exists.
pub fn install_local_scheduler(scheduler: Scheduler) -> Result<(), Scheduler> {
    LOCAL_SCHEDULER.with(|cell| cell.set(scheduler))
}

/// Convert a [`Scheduler::next_timeout`] result into a `poll(2)` style timeout.
///
/// `None` maps to `-1`. Partial milliseconds round up, so a host never
/// wakes before the deadline.
pub fn poll_timeout_ms(timeout: Option<Duration>) -> i32 {
    let Some(timeout) = timeout else {
        return -1;
    };

    let mut millis = timeout.as_millis();

    if timeout.subsec_nanos() % 1_000_000 != 0 {
        millis += 1;
    }

    millis.min(i32::MAX as u128) as i32
}
