#![forbid(unsafe_code)]

//! Memoized values derived from [`Observable`] dependencies.
//!
//! # Design
//!
//! [`Computed<T>`] wraps a compute function and its cached result in shared,
//! reference-counted storage. When any dependency changes, the cached value is
//! invalidated (marked dirty). Two read modes share that cache:
//!
//! - **Pull**: the next call to [`get()`](Computed::get) recomputes and caches
//!   the result.
//! - **Push**: [`subscribe()`](Computed::subscribe) replays the current value
//!   and, from then on, recomputes eagerly on every dependency change and
//!   forwards the result when it differs from the previous one.
//!
//! # Invariants
//!
//! 1. `get()` always returns a value consistent with the current state of all
//!    dependencies.
//! 2. The compute function is called at most once per dependency change cycle.
//! 3. If no dependency has changed, `get()` returns the cached value in O(1).
//! 4. Version increments by exactly 1 per recomputation.
//! 5. A push subscriber never sees the same value twice in a row.
//!
//! # Failure Modes
//!
//! - **Dependency dropped**: If the source `Observable` is dropped, the
//!   subscription becomes inert. The computed value retains its last cached
//!   result and never becomes dirty again from that source.
//! - **Dependency completed**: Push subscriptions taken after a source
//!   completed are detached and receive nothing, not even the replay.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::observable::{Observable, Subscription};

type Watcher<T> = dyn Fn(&T);

/// Shared interior for [`Computed<T>`].
struct ComputedInner<T> {
    /// The computation function.
    compute: Box<dyn Fn() -> T>,
    /// Whether any dependency has completed.
    completed: Box<dyn Fn() -> bool>,
    /// Cached result (None only before first computation).
    cached: Option<T>,
    /// Whether the cached value is stale.
    dirty: Cell<bool>,
    /// Monotonically increasing version, bumped on each recomputation.
    version: u64,
    /// Push subscribers.
    watchers: Vec<Weak<Watcher<T>>>,
    /// Guards keeping dependency callbacks alive.
    _subscriptions: Vec<Subscription>,
}

impl<T: Clone> ComputedInner<T> {
    fn refresh(&mut self) -> T {
        if self.dirty.get() || self.cached.is_none() {
            self.cached = Some((self.compute)());
            self.dirty.set(false);
            self.version += 1;
        }
        match &self.cached {
            Some(value) => value.clone(),
            None => (self.compute)(),
        }
    }
}

/// A memoized value derived from one or more [`Observable`] dependencies.
///
/// Cloning a `Computed` creates a new handle to the **same** inner state.
pub struct Computed<T> {
    inner: Rc<RefCell<ComputedInner<T>>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Computed")
            .field("cached", &inner.cached)
            .field("dirty", &inner.dirty.get())
            .field("version", &inner.version)
            .field("watchers", &inner.watchers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    fn build(
        compute: Box<dyn Fn() -> T>,
        completed: Box<dyn Fn() -> bool>,
        wire: impl FnOnce(&Weak<RefCell<ComputedInner<T>>>) -> Vec<Subscription>,
    ) -> Self {
        let inner = Rc::new(RefCell::new(ComputedInner {
            compute,
            completed,
            cached: None,
            dirty: Cell::new(true),
            version: 0,
            watchers: Vec::new(),
            _subscriptions: Vec::new(),
        }));
        let subscriptions = wire(&Rc::downgrade(&inner));
        inner.borrow_mut()._subscriptions = subscriptions;
        Self { inner }
    }

    /// Dependency callback: mark dirty, push to watchers if there are any.
    fn on_change<S: 'static>(weak: Weak<RefCell<ComputedInner<T>>>) -> impl Fn(&S) + 'static {
        move |_| {
            if let Some(strong) = weak.upgrade() {
                Self::propagate(&strong);
            }
        }
    }

    fn propagate(inner: &Rc<RefCell<ComputedInner<T>>>) {
        let (value, watchers) = {
            let mut guard = inner.borrow_mut();
            guard.dirty.set(true);
            guard.watchers.retain(|weak| weak.strong_count() > 0);
            if guard.watchers.is_empty() {
                return;
            }
            let previous = guard.cached.clone();
            let value = guard.refresh();
            if previous.as_ref() == Some(&value) {
                return;
            }
            let live: Vec<Rc<Watcher<T>>> =
                guard.watchers.iter().filter_map(Weak::upgrade).collect();
            (value, live)
        };
        for watcher in watchers {
            watcher(&value);
        }
    }

    /// Create a computed value derived from a single observable.
    pub fn from_observable<S: Clone + PartialEq + 'static>(
        source: &Observable<S>,
        map: impl Fn(&S) -> T + 'static,
    ) -> Self {
        let for_compute = source.clone();
        let for_check = source.clone();
        Self::build(
            Box::new(move || for_compute.with(|v| map(v))),
            Box::new(move || for_check.is_completed()),
            |weak| vec![source.subscribe(Self::on_change(weak.clone()))],
        )
    }

    /// Create a computed value derived from two observables.
    pub fn from2<S1, S2>(
        s1: &Observable<S1>,
        s2: &Observable<S2>,
        map: impl Fn(&S1, &S2) -> T + 'static,
    ) -> Self
    where
        S1: Clone + PartialEq + 'static,
        S2: Clone + PartialEq + 'static,
    {
        let (c1, c2) = (s1.clone(), s2.clone());
        let (p1, p2) = (s1.clone(), s2.clone());
        Self::build(
            Box::new(move || c1.with(|v1| c2.with(|v2| map(v1, v2)))),
            Box::new(move || p1.is_completed() || p2.is_completed()),
            |weak| {
                vec![
                    s1.subscribe(Self::on_change(weak.clone())),
                    s2.subscribe(Self::on_change(weak.clone())),
                ]
            },
        )
    }

    /// Create a computed value derived from three observables.
    pub fn from3<S1, S2, S3>(
        s1: &Observable<S1>,
        s2: &Observable<S2>,
        s3: &Observable<S3>,
        map: impl Fn(&S1, &S2, &S3) -> T + 'static,
    ) -> Self
    where
        S1: Clone + PartialEq + 'static,
        S2: Clone + PartialEq + 'static,
        S3: Clone + PartialEq + 'static,
    {
        let (c1, c2, c3) = (s1.clone(), s2.clone(), s3.clone());
        let (p1, p2, p3) = (s1.clone(), s2.clone(), s3.clone());
        Self::build(
            Box::new(move || c1.with(|v1| c2.with(|v2| c3.with(|v3| map(v1, v2, v3))))),
            Box::new(move || p1.is_completed() || p2.is_completed() || p3.is_completed()),
            |weak| {
                vec![
                    s1.subscribe(Self::on_change(weak.clone())),
                    s2.subscribe(Self::on_change(weak.clone())),
                    s3.subscribe(Self::on_change(weak.clone())),
                ]
            },
        )
    }

    /// Create a computed value from a standalone compute function and
    /// pre-built subscriptions.
    ///
    /// The subscriptions are only kept alive; they do not invalidate this
    /// value. Call [`invalidate()`](Self::invalidate) to force a recompute.
    pub fn from_fn(compute: impl Fn() -> T + 'static, subscriptions: Vec<Subscription>) -> Self {
        Self::build(Box::new(compute), Box::new(|| false), |_| subscriptions)
    }

    /// Get the current value, recomputing if any dependency has changed.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow_mut().refresh()
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure re-enters this `Computed`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let mut inner = self.inner.borrow_mut();
        inner.refresh();
        match &inner.cached {
            Some(value) => f(value),
            None => f(&(inner.compute)()),
        }
    }

    /// Receive the current value now and every distinct change afterwards.
    ///
    /// The returned guard keeps this computed value (and its dependency
    /// wiring) alive, so subscribing through a temporary handle works.
    /// Returns a detached guard, without replaying, if a dependency has
    /// already completed.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        if (self.inner.borrow().completed)() {
            return Subscription::detached();
        }
        let current = self.get();
        let callback: Rc<Watcher<T>> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .watchers
            .push(Rc::downgrade(&callback));
        callback(&current);
        Subscription::new((callback, Rc::clone(&self.inner)))
    }

    /// Number of live push subscribers.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.inner
            .borrow()
            .watchers
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Whether the cached value is stale.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.borrow().dirty.get()
    }

    /// Force invalidation of the cached value. The next `get()` will
    /// recompute.
    pub fn invalidate(&self) {
        self.inner.borrow().dirty.set(true);
    }

    /// Current version number. Increments by 1 on each recomputation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }
}
