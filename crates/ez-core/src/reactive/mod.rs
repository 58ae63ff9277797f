#![forbid(unsafe_code)]

//! Reactive data bindings.
//!
//! This module provides change-tracking primitives for state containers:
//!
//! - [`Observable`]: A shared, version-tracked value wrapper with change
//!   notification via subscriber callbacks and a terminal `complete()`.
//! - [`Subscription`]: RAII guard that automatically unsubscribes on drop.
//! - [`Computed`]: A memoized value derived from one or more `Observable`
//!   dependencies, readable lazily (`get()`) or pushed to subscribers with
//!   distinct-until-changed semantics (`subscribe()`).
//!
//! # Architecture
//!
//! `Observable<T>` uses `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Subscribers are stored as `Weak` function pointers and cleaned up lazily
//! during notification. No borrow is held while a callback runs, so callbacks
//! may read or write the observable they were notified by.
//!
//! `Computed<T>` subscribes to its sources via `Observable::subscribe()`,
//! marking itself dirty on change. Without push subscribers recomputation is
//! deferred until `get()`; with push subscribers it happens eagerly so they
//! can be notified.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications).
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 5. `Computed::get()` never returns a stale value.
//! 6. After `Observable::complete()` no callback fires again and new
//!    subscriptions are inert.

pub mod computed;
pub mod observable;

pub use computed::Computed;
pub use observable::{Observable, Subscription};
