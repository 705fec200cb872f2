use std::{
    cell::{Cell, RefCell},
    fmt,
    ops::Deref,
    rc::{Rc, Weak},
    time::{Duration, Instant},
};

use crate::{BoundCallback, Callback, Error, Flow, Result, Scheduler};

/// A schedulable timeout owned by application code.
///
/// Dropping a `Timer` stops it, so the scheduler never refers to a
/// released timer. All timer operations live on [`TimerHandle`], which
/// `Timer` dereferences to and which callbacks receive.
pub struct Timer {
    handle: Rc<TimerHandle>,
}

impl Timer {
    /// Create an inactive timer on `scheduler` notifying `callback`.
    pub fn new<C>(scheduler: &Scheduler, callback: C) -> Self
    where
        C: Callback + 'static,
    {
        let callback: Box<dyn Callback> = Box::new(callback);
        let now = scheduler.now();

        let handle = Rc::new_cyclic(|this| TimerHandle {
            scheduler: scheduler.clone(),
            this: this.clone(),
            due: Cell::new(now),
            last_due: Cell::new(now),
            timeout: Cell::new(None),
            armed: Cell::new(None),
            firing: Cell::new(Firing::Idle),
            callback: RefCell::new(callback),
        });

        Self { handle }
    }

    /// Create an inactive timer notifying a closure.
    pub fn from_fn<F>(scheduler: &Scheduler, f: F) -> Self
    where
        F: FnMut(&TimerHandle) -> Flow + 'static,
    {
        Self::new(scheduler, f)
    }

    /// Create an inactive timer that calls `method` on `owner`.
    ///
    /// See [`BoundCallback`].
    pub fn with_method<T>(
        scheduler: &Scheduler,
        owner: &Rc<RefCell<T>>,
        method: fn(&mut T, &TimerHandle) -> Flow,
    ) -> Self
    where
        T: 'static,
    {
        Self::new(scheduler, BoundCallback::new(owner, method))
    }
}

impl Deref for Timer {
    type Target = TimerHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.stop();
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.handle, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Firing {
    Idle,
    Running,
    /// `stop()` was called from the running callback.
    Stopped,
}

/// Resets the firing state even if the callback unwinds.
struct FiringGuard<'a>(&'a Cell<Firing>);

impl Drop for FiringGuard<'_> {
    fn drop(&mut self) {
        self.0.set(Firing::Idle);
    }
}

/// Timer state and operations, shared by [`Timer`] and the callback it drives.
pub struct TimerHandle {
    scheduler: Scheduler,
    this: Weak<TimerHandle>,
    due: Cell<Instant>,
    /// Deadline of the previous firing, the anchor of [`repeat`](Self::repeat).
    last_due: Cell<Instant>,
    timeout: Cell<Option<Duration>>,
    /// Sequence number of the registry entry, `Some` iff active.
    armed: Cell<Option<u64>>,
    firing: Cell<Firing>,
    callback: RefCell<Box<dyn Callback>>,
}

impl TimerHandle {
    /// Start the timer, it times out `timeout` from now.
    ///
    /// An active timer is restarted without an intermediate cancellation.
    /// Called from the timer's own callback after [`stop`](Self::stop),
    /// the new arming is discarded once the callback returns.
    pub fn start(&self, timeout: Duration) -> Result<()> {
        let now = self.scheduler.now();

        let due = now
            .checked_add(timeout)
            .ok_or(Error::InvalidArgument(timeout))?;

        self.disarm();

        self.timeout.set(Some(timeout));
        self.last_due.set(now);
        self.arm(due);

        Ok(())
    }

    /// Restart the timer one previous interval after its previous deadline.
    ///
    /// Anchoring on the deadline instead of the current time keeps a
    /// periodic timer free of drift caused by processing delays.
    pub fn repeat(&self) -> Result<()> {
        let timeout = self
            .timeout
            .get()
            .ok_or(Error::InvalidState("no previous timeout to repeat"))?;

        self.repeat_with(timeout)
    }

    /// Same as [`repeat`](Self::repeat), with a new interval.
    ///
    /// If the computed deadline already passed the timer is due
    /// immediately, and the missed periods are dropped.
    pub fn repeat_with(&self, timeout: Duration) -> Result<()> {
        let due = self
            .last_due
            .get()
            .checked_add(timeout)
            .ok_or(Error::InvalidArgument(timeout))?;

        if self.disarm() {
            log::error!("repeating running timer {:p}", self);
        }

        let now = self.scheduler.now();

        let due = if due < now {
            log::warn!(
                "timer {:p} lagging by {:?}, dropping missed periods",
                self,
                now - due
            );
            now
        } else {
            due
        };

        self.timeout.set(Some(timeout));
        self.last_due.set(due);
        self.arm(due);

        Ok(())
    }

    /// Cancel the timer, no-op if inactive.
    ///
    /// When called from the timer's own callback the timer stays stopped,
    /// whatever the callback does or returns afterwards.
    pub fn stop(&self) {
        if self.firing.get() == Firing::Running {
            self.firing.set(Firing::Stopped);
        }

        self.disarm();
    }

    /// Returns true if the timer is active.
    pub fn is_started(&self) -> bool {
        self.armed.get().is_some()
    }

    /// The most recently used interval, [`None`] if never started.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.get()
    }

    /// Time left until the timer is due, zero if overdue.
    pub fn remaining(&self) -> Result<Duration> {
        if !self.is_started() {
            return Err(Error::InvalidState("timer is not started"));
        }

        Ok(self.due.get().saturating_duration_since(self.scheduler.now()))
    }

    /// Returns true if the timer's deadline is strictly before `other`.
    ///
    /// Only meaningful while the timer is active.
    pub fn is_before(&self, other: Instant) -> bool {
        self.due.get() < other
    }

    /// The deadline of an active timer.
    pub fn due_time(&self) -> Option<Instant> {
        self.armed.get().map(|_| self.due.get())
    }

    fn arm(&self, due: Instant) {
        self.due.set(due);

        let seq = self.scheduler.arm(due, self.this.clone());

        log::trace!("arm timer {:p}, seq={}", self, seq);

        self.armed.set(Some(seq));
    }

    fn disarm(&self) -> bool {
        match self.armed.take() {
            Some(seq) => {
                self.scheduler.disarm(self.due.get(), seq);
                log::trace!("disarm timer {:p}, seq={}", self, seq);
                true
            }
            None => false,
        }
    }

    /// Invoke the callback of a timer the scheduler just popped as due.
    pub(crate) fn fire(&self) {
        self.armed.set(None);
        self.last_due.set(self.due.get());

        self.firing.set(Firing::Running);

        let guard = FiringGuard(&self.firing);

        let flow = self.callback.borrow_mut().on_timeout(self);

        let stopped = self.firing.get() == Firing::Stopped;

        drop(guard);

        if stopped {
            if self.disarm() {
                log::debug!("timer {:p} stopped by its callback, drop re-arm", self);
            }
            return;
        }

        // the callback re-armed the timer itself
        if self.is_started() {
            return;
        }

        if flow == Flow::Continue {
            if let Err(err) = self.repeat() {
                log::error!("rearm timer {:p}: {}", self, err);
            }
        }
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("due", &self.due_time())
            .field("timeout", &self.timeout.get())
            .finish()
    }
}
