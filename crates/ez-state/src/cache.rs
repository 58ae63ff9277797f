#![forbid(unsafe_code)]

//! The reactive value cache.
//!
//! # Design
//!
//! An [`EzCache`] owns one [`Observable`] holding the current [`CacheState`].
//! Every operation replaces that record wholesale and every public stream is
//! a [`Computed`] projection of it, so readers see distinct changes only.
//!
//! Each operation kind owns a slot with a ticket counter and the guard of its
//! outstanding source. Starting an operation bumps the ticket and drops the
//! previous guard, which cancels the previous source. Notifications carry the
//! ticket they were issued under; a notification whose ticket is no longer
//! current is discarded, even if its source ignored cancellation.
//!
//! # Invariants
//!
//! 1. At most one source per operation kind is subscribed at a time.
//! 2. Kinds are independent: starting or settling one never touches another
//!    kind's status.
//! 3. A failure never changes the held value.
//! 4. After `next`, `reset`, `reset_state` or `complete`, no earlier source
//!    can publish anything.
//! 5. After `complete`, nothing is published and new operations do not
//!    subscribe their source.
//! 6. No borrow is held while user code runs (sources, error handler,
//!    subscribers), so all of them may call back into the cache.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ez_core::{Computed, Notification, Observable, Source, SourceGuard};

use crate::action::CacheAction;
use crate::config::CacheConfig;
use crate::error::{ErrorHandler, general_error_handler};
use crate::state::{CacheState, OperationStatus};

/// Label used in log events for caches built without a name.
const DEFAULT_NAME: &str = "ez_cache";

#[derive(Default)]
struct OperationSlot {
    ticket: u64,
    guard: Option<SourceGuard>,
}

struct CacheInner<T, E> {
    state: Observable<CacheState<T, E>>,
    slots: RefCell<[OperationSlot; 4]>,
    error_handler: Option<ErrorHandler<E>>,
    name: Option<String>,
}

/// A value plus the status of the load, save, update and delete operations
/// that feed it.
///
/// Clones are handles to the same cache. Dropping the last handle cancels
/// every outstanding source.
pub struct EzCache<T, E> {
    inner: Rc<CacheInner<T, E>>,
}

impl<T, E> Clone for EzCache<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for EzCache<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.inner.slots.borrow();
        let pending: Vec<&str> = CacheAction::ALL
            .iter()
            .filter(|action| slot_is_pending(&slots[action.index()]))
            .map(|action| action.as_str())
            .collect();
        f.debug_struct("EzCache")
            .field("name", &self.inner.label())
            .field("state", &self.inner.state)
            .field("pending", &pending)
            .finish()
    }
}

fn slot_is_pending(slot: &OperationSlot) -> bool {
    slot.guard.as_ref().is_some_and(|guard| !guard.is_closed())
}

impl<T, E> Default for EzCache<T, E>
where
    T: Clone + PartialEq + 'static,
    E: Clone + PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> CacheInner<T, E> {
    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_NAME)
    }
}

impl<T, E> CacheInner<T, E>
where
    T: Clone + PartialEq + 'static,
    E: Clone + PartialEq + 'static,
{
    #[cfg(feature = "tracing")]
    fn log_transition(&self, action: CacheAction, phase: &'static str) {
        tracing::debug!(
            message = "ez_cache.transition",
            cache = self.label(),
            action = action.as_str(),
            label = action.progress_label(),
            phase
        );
    }

    #[cfg(not(feature = "tracing"))]
    fn log_transition(&self, _action: CacheAction, _phase: &'static str) {}

    fn publish(&self, transition: impl FnOnce(CacheState<T, E>) -> CacheState<T, E>) {
        let next = transition(self.state.get());
        self.state.set(next);
    }

    fn is_current(&self, action: CacheAction, ticket: u64) -> bool {
        self.slots.borrow()[action.index()].ticket == ticket
    }

    /// Invalidate the outstanding source of `action` and return its guard.
    fn detach(&self, action: CacheAction) -> (u64, Option<SourceGuard>) {
        let mut slots = self.slots.borrow_mut();
        let slot = &mut slots[action.index()];
        slot.ticket += 1;
        (slot.ticket, slot.guard.take())
    }

    /// Cancel the outstanding source of `action`, if any. Returns the new
    /// ticket.
    fn cancel(&self, action: CacheAction) -> u64 {
        let (ticket, previous) = self.detach(action);
        if let Some(guard) = previous {
            if !guard.is_closed() {
                self.log_transition(action, "cancelled");
            }
            guard.cancel();
        }
        ticket
    }

    fn cancel_all(&self) {
        for action in CacheAction::ALL {
            self.cancel(action);
        }
    }

    fn attach(&self, action: CacheAction, ticket: u64, guard: SourceGuard) {
        let stale = {
            let mut slots = self.slots.borrow_mut();
            let slot = &mut slots[action.index()];
            if slot.ticket == ticket {
                slot.guard = Some(guard);
                None
            } else {
                Some(guard)
            }
        };
        drop(stale);
    }

    fn translate(&self, error: E, action: CacheAction) -> E {
        match &self.error_handler {
            Some(handler) => handler(error, action),
            None => general_error_handler(error, action),
        }
    }

    /// Apply one notification of the source started under `ticket`.
    ///
    /// `Next(None)` marks success without replacing the held value.
    fn settle(&self, action: CacheAction, ticket: u64, notification: Notification<Option<T>, E>) {
        if !self.is_current(action, ticket) {
            self.log_transition(action, "ignored");
            return;
        }
        match notification {
            Notification::Next(value) => {
                self.publish(|state| {
                    let state = state.with_status(action, OperationStatus::succeeded());
                    match value {
                        Some(value) => state.with_value(Some(value)),
                        None => state,
                    }
                });
                self.log_transition(action, "succeeded");
            }
            Notification::Error(error) => {
                let error = self.translate(error, action);
                self.publish(|state| state.with_status(action, OperationStatus::failed(error)));
                self.log_transition(action, "failed");
            }
            // Completion only ends the subscription; the status already
            // reflects the last value or stays in progress if none came.
            Notification::Complete => {}
        }
    }
}

impl<T, E> EzCache<T, E>
where
    T: Clone + PartialEq + 'static,
    E: Clone + PartialEq + 'static,
{
    /// Empty cache with the identity error handler.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(CacheConfig::new())
    }

    /// Cache holding `value`.
    #[must_use]
    pub fn with_initial(value: T) -> Self {
        Self::from_config(CacheConfig::new().with_initial(value))
    }

    /// Empty cache translating source errors through `handler`.
    #[must_use]
    pub fn with_error_handler(handler: impl Fn(E, CacheAction) -> E + 'static) -> Self {
        Self::from_config(CacheConfig::new().with_error_handler(handler))
    }

    /// Cache built from `config`.
    #[must_use]
    pub fn from_config(config: CacheConfig<T, E>) -> Self {
        Self {
            inner: Rc::new(CacheInner {
                state: Observable::new(CacheState::new(config.initial)),
                slots: RefCell::default(),
                error_handler: config.error_handler,
                name: config.name,
            }),
        }
    }

    /// Label given through [`CacheConfig::with_name`].
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    // -- reads ---------------------------------------------------------------

    /// The held value.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.inner.state.with(|state| state.value().cloned())
    }

    /// Stream of the held value; emits only when it changes.
    #[must_use]
    pub fn observe_value(&self) -> Computed<Option<T>> {
        Computed::from_observable(&self.inner.state, |state| state.value().cloned())
    }

    /// Snapshot of the whole state record.
    #[must_use]
    pub fn state(&self) -> CacheState<T, E> {
        self.inner.state.get()
    }

    /// Stream of every published state record.
    #[must_use]
    pub fn observe_state(&self) -> Computed<CacheState<T, E>> {
        Computed::from_observable(&self.inner.state, CacheState::clone)
    }

    /// Whether a source of kind `action` is running.
    #[must_use]
    pub fn in_progress(&self, action: CacheAction) -> Computed<bool> {
        Computed::from_observable(&self.inner.state, move |state| state.in_progress(action))
    }

    /// Whether the last source of kind `action` emitted a value.
    #[must_use]
    pub fn succeeded(&self, action: CacheAction) -> Computed<bool> {
        Computed::from_observable(&self.inner.state, move |state| state.succeeded(action))
    }

    /// Translated error of the last failed source of kind `action`.
    #[must_use]
    pub fn action_error(&self, action: CacheAction) -> Computed<Option<E>> {
        Computed::from_observable(&self.inner.state, move |state| state.error(action).cloned())
    }

    /// First error among load, save, update and delete, in that order.
    #[must_use]
    pub fn error(&self) -> Computed<Option<E>> {
        Computed::from_observable(&self.inner.state, |state| state.first_error().cloned())
    }

    #[must_use]
    pub fn loading(&self) -> Computed<bool> {
        self.in_progress(CacheAction::Load)
    }

    #[must_use]
    pub fn loaded(&self) -> Computed<bool> {
        self.succeeded(CacheAction::Load)
    }

    #[must_use]
    pub fn load_error(&self) -> Computed<Option<E>> {
        self.action_error(CacheAction::Load)
    }

    #[must_use]
    pub fn saving(&self) -> Computed<bool> {
        self.in_progress(CacheAction::Save)
    }

    #[must_use]
    pub fn saved(&self) -> Computed<bool> {
        self.succeeded(CacheAction::Save)
    }

    #[must_use]
    pub fn save_error(&self) -> Computed<Option<E>> {
        self.action_error(CacheAction::Save)
    }

    #[must_use]
    pub fn updating(&self) -> Computed<bool> {
        self.in_progress(CacheAction::Update)
    }

    #[must_use]
    pub fn updated(&self) -> Computed<bool> {
        self.succeeded(CacheAction::Update)
    }

    #[must_use]
    pub fn update_error(&self) -> Computed<Option<E>> {
        self.action_error(CacheAction::Update)
    }

    #[must_use]
    pub fn deleting(&self) -> Computed<bool> {
        self.in_progress(CacheAction::Delete)
    }

    #[must_use]
    pub fn deleted(&self) -> Computed<bool> {
        self.succeeded(CacheAction::Delete)
    }

    #[must_use]
    pub fn delete_error(&self) -> Computed<Option<E>> {
        self.action_error(CacheAction::Delete)
    }

    /// Whether a source of kind `action` is subscribed and has not
    /// terminated.
    #[must_use]
    pub fn is_pending(&self, action: CacheAction) -> bool {
        slot_is_pending(&self.inner.slots.borrow()[action.index()])
    }

    /// Whether [`complete()`](Self::complete) has run.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.inner.state.is_completed()
    }

    // -- operations ----------------------------------------------------------

    /// Fetch the value from `source`.
    pub fn load<S>(&self, source: S)
    where
        S: Source<Item = T, Error = E>,
    {
        self.run(CacheAction::Load, source, Some);
    }

    /// Run `source` as a load, keeping the held value.
    ///
    /// Only the load status changes; useful to refresh a remote copy
    /// without trusting its response.
    pub fn load_ignore_response<S>(&self, source: S)
    where
        S: Source<Error = E>,
    {
        self.run(CacheAction::Load, source, |_| None);
    }

    /// Create the value through `source`, storing what it emits.
    pub fn save<S>(&self, source: S)
    where
        S: Source<Item = T, Error = E>,
    {
        self.run(CacheAction::Save, source, Some);
    }

    /// Create the value through `source`, keeping the held value.
    pub fn save_ignore_response<S>(&self, source: S)
    where
        S: Source<Error = E>,
    {
        self.run(CacheAction::Save, source, |_| None);
    }

    /// Modify the value through `source`, storing what it emits.
    pub fn update<S>(&self, source: S)
    where
        S: Source<Item = T, Error = E>,
    {
        self.run(CacheAction::Update, source, Some);
    }

    /// Modify the value through `source`, keeping the held value.
    pub fn update_ignore_response<S>(&self, source: S)
    where
        S: Source<Error = E>,
    {
        self.run(CacheAction::Update, source, |_| None);
    }

    /// Remove the value through `source`, storing what it emits.
    pub fn delete<S>(&self, source: S)
    where
        S: Source<Item = T, Error = E>,
    {
        self.run(CacheAction::Delete, source, Some);
    }

    /// Remove the value through `source`, keeping the held value.
    pub fn delete_ignore_response<S>(&self, source: S)
    where
        S: Source<Error = E>,
    {
        self.run(CacheAction::Delete, source, |_| None);
    }

    fn run<S, A>(&self, action: CacheAction, source: S, accept: A)
    where
        S: Source<Error = E>,
        A: Fn(S::Item) -> Option<T> + 'static,
    {
        let inner = &self.inner;
        if inner.state.is_completed() {
            inner.log_transition(action, "ignored");
            return;
        }
        let ticket = inner.cancel(action);
        inner.publish(|state| state.with_status(action, OperationStatus::started()));
        inner.log_transition(action, "started");
        // A subscriber may already have replaced this operation.
        if !inner.is_current(action, ticket) {
            return;
        }

        let weak: Weak<CacheInner<T, E>> = Rc::downgrade(inner);
        let guard = source.subscribe(move |notification| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let notification = match notification {
                Notification::Next(item) => Notification::Next(accept(item)),
                Notification::Error(error) => Notification::Error(error),
                Notification::Complete => Notification::Complete,
            };
            inner.settle(action, ticket, notification);
        });
        inner.attach(action, ticket, guard);
    }

    /// Drop the outstanding source of kind `action` without publishing.
    ///
    /// The status keeps whatever was last published; call
    /// [`reset_state()`](Self::reset_state) to clear it.
    pub fn cancel(&self, action: CacheAction) {
        self.inner.cancel(action);
    }

    /// [`cancel()`](Self::cancel) every kind.
    pub fn cancel_all(&self) {
        self.inner.cancel_all();
    }

    /// Store `value` directly, cancelling every pending operation and
    /// clearing every status.
    pub fn next(&self, value: T) {
        self.inner.cancel_all();
        self.inner.state.set(CacheState::new(Some(value)));
    }

    /// Drop the held value, cancelling every pending operation and clearing
    /// every status.
    pub fn reset(&self) {
        self.inner.cancel_all();
        self.inner.state.set(CacheState::new(None));
    }

    /// Clear every status, keeping the held value. Pending operations are
    /// cancelled so a late result cannot bring a status back.
    pub fn reset_state(&self) {
        self.inner.cancel_all();
        self.inner.publish(CacheState::cleared);
    }

    /// Cancel every pending operation and freeze the cache.
    ///
    /// Streams stop emitting, later subscriptions receive nothing and later
    /// operations are ignored. Synchronous reads keep returning the final
    /// state.
    pub fn complete(&self) {
        if self.inner.state.is_completed() {
            return;
        }
        self.inner.cancel_all();
        self.inner.state.complete();
        #[cfg(feature = "tracing")]
        tracing::debug!(message = "ez_cache.complete", cache = self.inner.label());
    }
}
