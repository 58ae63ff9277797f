#![forbid(unsafe_code)]

//! Shared, version-tracked values with change notification.
//!
//! # Design
//!
//! [`Observable<T>`] keeps its value, a version counter and a list of `Weak`
//! subscriber callbacks behind one `Rc<RefCell<..>>`. The strong side of each
//! callback lives in the [`Subscription`] returned to the caller, so dropping
//! the subscription is enough to unsubscribe; dead entries are pruned on the
//! next notification.
//!
//! # Invariants
//!
//! 1. `version()` increments by exactly 1 for every `set()` that changes the
//!    value.
//! 2. Callbacks run after the borrow is released and see the value that was
//!    just stored.
//! 3. Once `complete()` has run, `set()` is ignored, no callback fires again
//!    and `subscribe()` returns a detached guard.
//!
//! # Failure Modes
//!
//! - **Re-entrant writes**: A callback that calls `set()` triggers a nested
//!   notification cycle. Callbacks later in the outer cycle still receive the
//!   outer value, followed by the nested one.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = dyn Fn(&T);

struct ObservableInner<T> {
    value: T,
    version: u64,
    completed: bool,
    subscribers: Vec<Weak<Callback<T>>>,
}

/// A shared value that notifies subscribers when it changes.
///
/// Cloning an `Observable` creates a new handle to the **same** value.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("completed", &inner.completed)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create an observable holding `value` at version 0.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                completed: false,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value for the duration of `f`.
    ///
    /// # Panics
    ///
    /// Panics if `f` calls `set()` on the same observable.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Store `value` and notify subscribers if it differs from the current one.
    pub fn set(&self, value: T) {
        let snapshot = {
            let mut inner = self.inner.borrow_mut();
            if inner.completed || inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
            inner.value.clone()
        };
        self.notify(&snapshot);
    }

    /// Modify a copy of the value in place, then `set()` it.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.get();
        f(&mut next);
        self.set(next);
    }

    /// Number of value-changing writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Register `callback` to run after every change.
    ///
    /// The current value is not replayed. The callback stays registered until
    /// the returned [`Subscription`] is dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        if inner.completed {
            return Subscription::detached();
        }
        let callback: Rc<Callback<T>> = Rc::new(callback);
        inner.subscribers.push(Rc::downgrade(&callback));
        Subscription::new(callback)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Freeze the value and release every subscriber.
    pub fn complete(&self) {
        let released = {
            let mut inner = self.inner.borrow_mut();
            inner.completed = true;
            std::mem::take(&mut inner.subscribers)
        };
        crate::ez_debug!(message = "observable.complete", released = released.len());
        drop(released);
    }

    /// Whether `complete()` has been called.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.inner.borrow().completed
    }

    fn notify(&self, value: &T) {
        let live: Vec<Rc<Callback<T>>> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|weak| weak.strong_count() > 0);
            inner.subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in live {
            if self.is_completed() {
                break;
            }
            callback(value);
        }
    }
}

/// RAII guard keeping a subscriber callback alive.
///
/// Dropping the guard unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    guard: Option<Box<dyn Any>>,
}

impl Subscription {
    /// Keep `guard` alive until the subscription is dropped.
    pub(crate) fn new(guard: impl Any) -> Self {
        Self {
            guard: Some(Box::new(guard)),
        }
    }

    /// A guard attached to nothing, returned by completed sources.
    pub fn detached() -> Self {
        Self { guard: None }
    }

    /// Whether this guard was never attached to a live source.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.guard.is_none()
    }

    /// Explicitly unsubscribe. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("detached", &self.is_detached())
            .finish()
    }
}
