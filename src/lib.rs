//! Cooperative, single-threaded timeout scheduling for hand written event loops.
//!
//! Application code creates [`Timer`]s on a [`Scheduler`] and starts them.
//! The host loop asks the scheduler how long it may block, waits for I/O
//! at most that long, then lets the scheduler fire whatever became due.
//!
//! ```
//! use std::{cell::Cell, rc::Rc, time::Duration};
//! use cooptimer::{Flow, ManualClock, Scheduler, Timer};
//!
//! let clock = ManualClock::new();
//! let scheduler = Scheduler::with_clock(clock.clone());
//!
//! let ticks = Rc::new(Cell::new(0));
//! let counter = ticks.clone();
//!
//! let timer = Timer::from_fn(&scheduler, move |_| {
//!     counter.set(counter.get() + 1);
//!
//!     if counter.get() < 3 {
//!         Flow::Continue
//!     } else {
//!         Flow::Cancel
//!     }
//! });
//!
//! timer.start(Duration::from_millis(100))?;
//!
//! while let Some(wait) = scheduler.next_timeout() {
//!     // a real host blocks in poll(2) here, see `poll_timeout_ms`
//!     clock.advance(wait);
//!     scheduler.check_timeouts();
//! }
//!
//! assert_eq!(ticks.get(), 3);
//! assert!(!timer.is_started());
//! # Ok::<(), cooptimer::Error>(())
//! ```

mod errors;
pub use errors::*;

mod clock;
pub use clock::*;

mod scheduler;
pub use scheduler::*;

mod timer;
pub use timer::*;

mod bound;
pub use bound::*;

/// What to do with a timer once its callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Re-arm the timer with its previous interval, see [`TimerHandle::repeat`].
    ///
    /// If the next deadline overflows the monotonic clock, which takes an
    /// interval of centuries, the error is logged and the timer stays
    /// inactive.
    Continue,
    /// Leave the timer inactive.
    Cancel,
}

/// Timeout notification receiver.
pub trait Callback {
    /// Called with the timer that timed out.
    ///
    /// The timer is inactive during the call. The callback may start,
    /// repeat or stop it; an explicit arming takes precedence over the
    /// returned [`Flow`], and an explicit [`stop`](TimerHandle::stop)
    /// takes precedence over everything.
    fn on_timeout(&mut self, timer: &TimerHandle) -> Flow;
}

impl<F> Callback for F
where
    F: FnMut(&TimerHandle) -> Flow,
{
    fn on_timeout(&mut self, timer: &TimerHandle) -> Flow {
        self(timer)
    }
}
