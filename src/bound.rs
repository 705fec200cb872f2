use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use crate::{Callback, Flow, TimerHandle};

/// Forwards timeouts to a method of an owning object.
///
/// The owner doesn't have to implement [`Callback`], and one type can
/// drive several timers through different methods. Only a weak reference
/// to the owner is kept: once the owner is dropped, a pending timeout
/// resolves to [`Flow::Cancel`].
///
/// ```
/// use std::{cell::RefCell, rc::Rc, time::Duration};
/// use cooptimer::{Flow, ManualClock, Scheduler, Timer, TimerHandle};
///
/// struct Session {
///     idle: Option<Timer>,
///     expired: bool,
/// }
///
/// impl Session {
///     fn on_idle(&mut self, _timer: &TimerHandle) -> Flow {
///         self.expired = true;
///         Flow::Cancel
///     }
/// }
///
/// let clock = ManualClock::new();
/// let scheduler = Scheduler::with_clock(clock.clone());
///
/// let session = Rc::new(RefCell::new(Session { idle: None, expired: false }));
/// let idle = Timer::with_method(&scheduler, &session, Session::on_idle);
/// idle.start(Duration::from_secs(30)).unwrap();
/// session.borrow_mut().idle = Some(idle);
///
/// clock.advance(Duration::from_secs(30));
/// scheduler.check_timeouts();
///
/// assert!(session.borrow().expired);
/// ```
pub struct BoundCallback<T> {
    owner: Weak<RefCell<T>>,
    method: fn(&mut T, &TimerHandle) -> Flow,
}

impl<T> BoundCallback<T> {
    pub fn new(owner: &Rc<RefCell<T>>, method: fn(&mut T, &TimerHandle) -> Flow) -> Self {
        Self {
            owner: Rc::downgrade(owner),
            method,
        }
    }
}

impl<T> Callback for BoundCallback<T> {
    fn on_timeout(&mut self, timer: &TimerHandle) -> Flow {
        match self.owner.upgrade() {
            Some(owner) => (self.method)(&mut owner.borrow_mut(), timer),
            None => {
                log::debug!("owner of timer {:p} released, cancel", timer);
                Flow::Cancel
            }
        }
    }
}
