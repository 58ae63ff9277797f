#![forbid(unsafe_code)]

//! Error translation.
//!
//! Sources fail with a value of the cache's error type. Before it is stored,
//! that value passes through the cache's handler together with the kind of
//! operation that failed, so callers can normalize or annotate errors in one
//! place.

use std::rc::Rc;

use crate::action::CacheAction;

/// Shared error translation hook.
pub type ErrorHandler<E> = Rc<dyn Fn(E, CacheAction) -> E>;

/// Default handler: stores the error unchanged.
pub fn general_error_handler<E>(error: E, _action: CacheAction) -> E {
    error
}
