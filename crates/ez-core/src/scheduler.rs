#![forbid(unsafe_code)]

//! Cooperative, single-threaded virtual-time scheduler.
//!
//! [`Scheduler`] is the event loop that delayed sources run on. Time does not
//! pass on its own: the owner calls [`advance()`](Scheduler::advance) (or one
//! of the draining helpers) and every task that has become due runs in order.
//! Tests get fully deterministic timing; an application drives it from its
//! own loop.
//!
//! # Invariants
//!
//! 1. Tasks run in due-time order; ties run in scheduling order.
//! 2. `now()` never moves backwards and, while a task runs, equals that
//!    task's due time.
//! 3. A task scheduled by a running task executes in the same `advance()`
//!    call if it falls due before the target time.
//! 4. No borrow is held while a task runs, so tasks may schedule or cancel.
//!
//! # Example
//!
//! ```
//! use ez_core::scheduler::Scheduler;
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use web_time::Duration;
//!
//! let scheduler = Scheduler::new();
//! let fired = Rc::new(Cell::new(false));
//! let flag = Rc::clone(&fired);
//! scheduler.schedule(Duration::from_millis(5), move || flag.set(true));
//!
//! scheduler.advance(Duration::from_millis(4));
//! assert!(!fired.get());
//! scheduler.advance(Duration::from_millis(1));
//! assert!(fired.get());
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use web_time::Duration;

type Task = Box<dyn FnOnce()>;

/// Queue key: due time, then insertion sequence.
type TaskKey = (Duration, u64);

#[derive(Default)]
struct SchedulerInner {
    now: Duration,
    next_seq: u64,
    queue: BTreeMap<TaskKey, Task>,
}

/// Handle to the shared virtual-time run loop. Clones share the same queue.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("now", &inner.now)
            .field("pending", &inner.queue.len())
            .finish()
    }
}

impl Scheduler {
    /// Create an empty scheduler at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Run `task` once `delay` has elapsed from `now()`.
    pub fn schedule(&self, delay: Duration, task: impl FnOnce() + 'static) -> TaskHandle {
        let mut inner = self.inner.borrow_mut();
        let key = (inner.now.saturating_add(delay), inner.next_seq);
        inner.next_seq += 1;
        inner.queue.insert(key, Box::new(task));
        TaskHandle {
            key,
            scheduler: Rc::downgrade(&self.inner),
        }
    }

    /// Move time forward by `by`, running every task that falls due.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now().saturating_add(by);
        let ran = self.drain(Some(target));
        let mut inner = self.inner.borrow_mut();
        if inner.now < target {
            inner.now = target;
        }
        ran
    }

    /// Run the tasks already due at `now()` without moving time.
    pub fn flush(&self) -> usize {
        self.drain(Some(self.now()))
    }

    /// Run tasks, jumping time forward, until the queue is empty.
    ///
    /// A task that keeps rescheduling itself makes this loop forever.
    pub fn run_until_idle(&self) -> usize {
        self.drain(None)
    }

    fn drain(&self, limit: Option<Duration>) -> usize {
        let mut ran = 0;
        while let Some(task) = self.pop_due(limit) {
            task();
            ran += 1;
        }
        if ran > 0 {
            crate::ez_trace!(message = "scheduler.drain", ran, now_us = saturating_micros(self.now()));
        }
        ran
    }

    fn pop_due(&self, limit: Option<Duration>) -> Option<Task> {
        let mut inner = self.inner.borrow_mut();
        let key = *inner.queue.keys().next()?;
        if limit.is_some_and(|limit| key.0 > limit) {
            return None;
        }
        if key.0 > inner.now {
            inner.now = key.0;
        }
        inner.queue.remove(&key)
    }
}

/// Whole microseconds in `d`, clamped to `u64::MAX`.
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
fn saturating_micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

/// Handle to one scheduled task.
///
/// Dropping the handle leaves the task scheduled; call
/// [`cancel()`](TaskHandle::cancel) to remove it.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    key: TaskKey,
    scheduler: Weak<RefCell<SchedulerInner>>,
}

impl TaskHandle {
    /// Remove the task if it has not run yet. Returns whether it was removed.
    pub fn cancel(&self) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|inner| inner.borrow_mut().queue.remove(&self.key).is_some())
    }

    /// Whether the task is still waiting to run.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|inner| inner.borrow().queue.contains_key(&self.key))
    }

    /// Virtual time at which the task falls due.
    #[must_use]
    pub fn due(&self) -> Duration {
        self.key.0
    }
}
