#![forbid(unsafe_code)]

//! Push-based asynchronous sources.
//!
//! A [`Source`] produces zero or more values followed by at most one terminal
//! notification (error or completion). Production starts when a consumer
//! subscribes and may finish synchronously inside that call, or later from a
//! scheduler task, a [`Resolver`] or any other callback.
//!
//! # Design
//!
//! The producer writes into an [`Emitter`]; the consumer keeps the returned
//! [`SourceGuard`]. Cancelling (or dropping) the guard closes the emitter and
//! runs the producer's [`Teardown`]. A closed emitter drops everything written
//! to it, so a producer that ignores cancellation still cannot reach the
//! consumer.
//!
//! # Invariants
//!
//! 1. At most one terminal notification is delivered.
//! 2. Nothing is delivered after a terminal notification or after the guard
//!    is cancelled.
//! 3. The teardown runs at most once.
//! 4. The observer runs with no borrow held, so it may cancel its own guard
//!    or start new subscriptions.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use web_time::Duration;

use crate::scheduler::{Scheduler, TaskHandle};

/// One event pushed by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<T, E> {
    /// A value.
    Next(T),
    /// Terminal failure.
    Error(E),
    /// Terminal success.
    Complete,
}

impl<T, E> Notification<T, E> {
    /// Whether this notification ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Next(_))
    }
}

type Observer<T, E> = Rc<dyn Fn(Notification<T, E>)>;

struct EmitterShared<T, E> {
    closed: Rc<Cell<bool>>,
    observer: RefCell<Option<Observer<T, E>>>,
}

/// Write side of a subscription, handed to the producer.
///
/// Clones write into the same subscription.
pub struct Emitter<T, E> {
    shared: Rc<EmitterShared<T, E>>,
}

impl<T, E> Clone for Emitter<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T, E> fmt::Debug for Emitter<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T, E> Emitter<T, E> {
    fn new(observer: impl Fn(Notification<T, E>) + 'static) -> Self
    where
        T: 'static,
        E: 'static,
    {
        let observer: Observer<T, E> = Rc::new(observer);
        Self {
            shared: Rc::new(EmitterShared {
                closed: Rc::new(Cell::new(false)),
                observer: RefCell::new(Some(observer)),
            }),
        }
    }

    /// Push a value.
    pub fn next(&self, value: T) {
        self.emit(Notification::Next(value));
    }

    /// Fail the stream.
    pub fn error(&self, error: E) {
        self.emit(Notification::Error(error));
    }

    /// Complete the stream.
    pub fn complete(&self) {
        self.emit(Notification::Complete);
    }

    /// Deliver `notification`, unless the stream is already closed.
    pub fn emit(&self, notification: Notification<T, E>) {
        if self.is_closed() {
            crate::ez_trace!(message = "source.emit_after_close");
            return;
        }
        let observer = if notification.is_terminal() {
            self.shared.closed.set(true);
            self.shared.observer.borrow_mut().take()
        } else {
            self.shared.observer.borrow().clone()
        };
        if let Some(observer) = observer {
            observer(notification);
        }
    }

    /// Whether the stream has terminated or been cancelled.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.get()
    }

    fn close(&self) {
        self.shared.closed.set(true);
        let released = self.shared.observer.borrow_mut().take();
        drop(released);
    }
}

/// Cleanup a producer registers for consumer cancellation.
#[derive(Default)]
pub struct Teardown(Option<Box<dyn FnOnce()>>);

impl Teardown {
    /// Nothing to clean up.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    /// Run `f` when the consumer cancels.
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    fn run(self) {
        if let Some(f) = self.0 {
            f();
        }
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Teardown").field(&self.0.is_some()).finish()
    }
}

/// Consumer-side handle of a running source.
///
/// Dropping the guard cancels the source.
#[must_use = "dropping a SourceGuard cancels the source"]
pub struct SourceGuard {
    closed: Rc<Cell<bool>>,
    cancel: Option<Box<dyn FnOnce()>>,
}

impl SourceGuard {
    /// Stop the source: close the emitter and run its teardown.
    pub fn cancel(mut self) {
        self.cancel_in_place();
    }

    /// Whether the source has terminated or been cancelled.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn cancel_in_place(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.cancel_in_place();
    }
}

impl fmt::Debug for SourceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceGuard")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A producer of values for one subscriber.
pub trait Source: 'static {
    /// Value type.
    type Item: 'static;
    /// Error type.
    type Error: 'static;

    /// Start producing into `emitter`.
    fn produce(self, emitter: Emitter<Self::Item, Self::Error>) -> Teardown;

    /// Start the source, routing every notification to `observer`.
    fn subscribe(
        self,
        observer: impl Fn(Notification<Self::Item, Self::Error>) + 'static,
    ) -> SourceGuard
    where
        Self: Sized,
    {
        let emitter = Emitter::new(observer);
        let closed = Rc::clone(&emitter.shared.closed);
        let handle = emitter.clone();
        let teardown = self.produce(emitter);
        SourceGuard {
            closed,
            cancel: Some(Box::new(move || {
                handle.close();
                teardown.run();
            })),
        }
    }
}

/// Combinators available on every [`Source`].
pub trait SourceExt: Source + Sized {
    /// Transform each value.
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        U: 'static,
        F: Fn(Self::Item) -> U + 'static,
    {
        Map { source: self, f }
    }

    /// Transform the error.
    fn map_err<E2, F>(self, f: F) -> MapErr<Self, F>
    where
        E2: 'static,
        F: Fn(Self::Error) -> E2 + 'static,
    {
        MapErr { source: self, f }
    }

    /// Shift values and completion by `delay` on `scheduler`.
    ///
    /// Errors pass through immediately.
    fn delay(self, scheduler: &Scheduler, delay: Duration) -> Delay<Self> {
        Delay {
            source: self,
            scheduler: scheduler.clone(),
            delay,
        }
    }
}

impl<S: Source> SourceExt for S {}

/// Source built from a closure. See [`from_fn`].
pub struct FromFn<T, E, F> {
    produce: F,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E, F> Source for FromFn<T, E, F>
where
    T: 'static,
    E: 'static,
    F: FnOnce(Emitter<T, E>) -> Teardown + 'static,
{
    type Item = T;
    type Error = E;

    fn produce(self, emitter: Emitter<T, E>) -> Teardown {
        (self.produce)(emitter)
    }
}

/// Source whose production is the closure `produce`.
pub fn from_fn<T, E, F>(produce: F) -> FromFn<T, E, F>
where
    T: 'static,
    E: 'static,
    F: FnOnce(Emitter<T, E>) -> Teardown + 'static,
{
    FromFn {
        produce,
        _marker: PhantomData,
    }
}

/// Emit `value`, then complete.
pub fn of<T: 'static, E: 'static>(value: T) -> impl Source<Item = T, Error = E> {
    from_fn(move |emitter: Emitter<T, E>| {
        emitter.next(value);
        emitter.complete();
        Teardown::none()
    })
}

/// Fail immediately with `error`.
pub fn fail<T: 'static, E: 'static>(error: E) -> impl Source<Item = T, Error = E> {
    from_fn(move |emitter: Emitter<T, E>| {
        emitter.error(error);
        Teardown::none()
    })
}

/// `of` for `Ok`, `fail` for `Err`.
pub fn from_result<T: 'static, E: 'static>(result: Result<T, E>) -> impl Source<Item = T, Error = E> {
    from_fn(move |emitter: Emitter<T, E>| {
        match result {
            Ok(value) => {
                emitter.next(value);
                emitter.complete();
            }
            Err(error) => emitter.error(error),
        }
        Teardown::none()
    })
}

/// Emit every item of `items`, then complete.
pub fn from_iter<I, E>(items: I) -> impl Source<Item = I::Item, Error = E>
where
    I: IntoIterator + 'static,
    I::Item: 'static,
    E: 'static,
{
    from_fn(move |emitter: Emitter<I::Item, E>| {
        for item in items {
            if emitter.is_closed() {
                break;
            }
            emitter.next(item);
        }
        emitter.complete();
        Teardown::none()
    })
}

/// Complete without emitting.
pub fn empty<T: 'static, E: 'static>() -> impl Source<Item = T, Error = E> {
    from_fn(|emitter: Emitter<T, E>| {
        emitter.complete();
        Teardown::none()
    })
}

/// Never emit and never terminate.
pub fn never<T: 'static, E: 'static>() -> impl Source<Item = T, Error = E> {
    from_fn(|_: Emitter<T, E>| Teardown::none())
}

struct DeferredSlot<T, E> {
    emitter: Option<Emitter<T, E>>,
    buffered: Vec<Notification<T, E>>,
    cancelled: bool,
    terminated: bool,
}

/// A source completed later through its [`Resolver`]. See [`deferred`].
pub struct Deferred<T, E> {
    slot: Rc<RefCell<DeferredSlot<T, E>>>,
}

/// Write side of a [`Deferred`] source.
pub struct Resolver<T, E> {
    slot: Rc<RefCell<DeferredSlot<T, E>>>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("Resolver")
            .field("subscribed", &slot.emitter.is_some())
            .field("buffered", &slot.buffered.len())
            .field("cancelled", &slot.cancelled)
            .field("terminated", &slot.terminated)
            .finish()
    }
}

/// A pending source plus the handle that settles it.
///
/// Notifications sent before anyone subscribes are buffered and replayed on
/// subscription.
pub fn deferred<T: 'static, E: 'static>() -> (Deferred<T, E>, Resolver<T, E>) {
    let slot = Rc::new(RefCell::new(DeferredSlot {
        emitter: None,
        buffered: Vec::new(),
        cancelled: false,
        terminated: false,
    }));
    (
        Deferred {
            slot: Rc::clone(&slot),
        },
        Resolver { slot },
    )
}

impl<T: 'static, E: 'static> Source for Deferred<T, E> {
    type Item = T;
    type Error = E;

    fn produce(self, emitter: Emitter<T, E>) -> Teardown {
        let buffered = std::mem::take(&mut self.slot.borrow_mut().buffered);
        for notification in buffered {
            emitter.emit(notification);
        }
        if !emitter.is_closed() {
            self.slot.borrow_mut().emitter = Some(emitter);
        }
        let slot = self.slot;
        Teardown::new(move || {
            let mut slot = slot.borrow_mut();
            slot.cancelled = true;
            slot.emitter = None;
        })
    }
}

impl<T, E> Resolver<T, E> {
    /// Push a value without completing.
    pub fn next(&self, value: T) {
        self.emit(Notification::Next(value));
    }

    /// Push `value`, then complete.
    pub fn resolve(&self, value: T) {
        self.emit(Notification::Next(value));
        self.emit(Notification::Complete);
    }

    /// Fail the source.
    pub fn reject(&self, error: E) {
        self.emit(Notification::Error(error));
    }

    /// Complete without a value.
    pub fn complete(&self) {
        self.emit(Notification::Complete);
    }

    /// Whether the subscriber cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.slot.borrow().cancelled
    }

    /// Whether an error or completion has been sent. Later notifications
    /// are dropped.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.slot.borrow().terminated
    }

    /// Whether a subscriber is currently attached.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.slot.borrow().emitter.is_some()
    }

    fn emit(&self, notification: Notification<T, E>) {
        let terminal = notification.is_terminal();
        let emitter = {
            let mut slot = self.slot.borrow_mut();
            if slot.cancelled || slot.terminated {
                crate::ez_trace!(message = "source.resolver_after_close");
                return;
            }
            slot.terminated = terminal;
            let Some(emitter) = slot.emitter.clone() else {
                slot.buffered.push(notification);
                return;
            };
            emitter
        };
        emitter.emit(notification);
        if terminal {
            self.slot.borrow_mut().emitter = None;
        }
    }
}

/// See [`SourceExt::map`].
pub struct Map<S, F> {
    source: S,
    f: F,
}

impl<S, U, F> Source for Map<S, F>
where
    S: Source,
    U: 'static,
    F: Fn(S::Item) -> U + 'static,
{
    type Item = U;
    type Error = S::Error;

    fn produce(self, emitter: Emitter<U, S::Error>) -> Teardown {
        let f = self.f;
        let guard = self.source.subscribe(move |notification| match notification {
            Notification::Next(value) => emitter.next(f(value)),
            Notification::Error(error) => emitter.error(error),
            Notification::Complete => emitter.complete(),
        });
        Teardown::new(move || guard.cancel())
    }
}

/// See [`SourceExt::map_err`].
pub struct MapErr<S, F> {
    source: S,
    f: F,
}

impl<S, E2, F> Source for MapErr<S, F>
where
    S: Source,
    E2: 'static,
    F: Fn(S::Error) -> E2 + 'static,
{
    type Item = S::Item;
    type Error = E2;

    fn produce(self, emitter: Emitter<S::Item, E2>) -> Teardown {
        let f = self.f;
        let guard = self.source.subscribe(move |notification| match notification {
            Notification::Next(value) => emitter.next(value),
            Notification::Error(error) => emitter.error(f(error)),
            Notification::Complete => emitter.complete(),
        });
        Teardown::new(move || guard.cancel())
    }
}

/// See [`SourceExt::delay`].
pub struct Delay<S> {
    source: S,
    scheduler: Scheduler,
    delay: Duration,
}

impl<S: Source> Source for Delay<S> {
    type Item = S::Item;
    type Error = S::Error;

    fn produce(self, emitter: Emitter<S::Item, S::Error>) -> Teardown {
        let pending: Rc<RefCell<Vec<TaskHandle>>> = Rc::default();
        let scheduled = Rc::clone(&pending);
        let scheduler = self.scheduler;
        let delay = self.delay;
        let guard = self.source.subscribe(move |notification| match notification {
            Notification::Error(error) => emitter.error(error),
            shifted => {
                let downstream = emitter.clone();
                let handle = scheduler.schedule(delay, move || downstream.emit(shifted));
                scheduled.borrow_mut().push(handle);
            }
        });
        Teardown::new(move || {
            guard.cancel();
            let handles = std::mem::take(&mut *pending.borrow_mut());
            for handle in handles {
                handle.cancel();
            }
        })
    }
}
