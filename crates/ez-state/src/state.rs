#![forbid(unsafe_code)]

//! The immutable state record published by a cache.
//!
//! Every transition builds a fresh [`CacheState`] from the previous one; the
//! record is never mutated once published.

use crate::action::CacheAction;

/// Status of one operation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationStatus<E> {
    /// A source of this kind is subscribed and has not settled.
    pub in_progress: bool,
    /// The most recent source of this kind emitted a value.
    pub succeeded: bool,
    /// Translated error of the most recent failure.
    pub error: Option<E>,
}

impl<E> OperationStatus<E> {
    /// Nothing running, nothing recorded.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            in_progress: false,
            succeeded: false,
            error: None,
        }
    }

    /// A source was just subscribed.
    #[must_use]
    pub const fn started() -> Self {
        Self {
            in_progress: true,
            succeeded: false,
            error: None,
        }
    }

    /// The source emitted a value.
    #[must_use]
    pub const fn succeeded() -> Self {
        Self {
            in_progress: false,
            succeeded: true,
            error: None,
        }
    }

    /// The source failed with the already translated `error`.
    #[must_use]
    pub const fn failed(error: E) -> Self {
        Self {
            in_progress: false,
            succeeded: false,
            error: Some(error),
        }
    }

    /// Whether this status carries no information.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !self.in_progress && !self.succeeded && self.error.is_none()
    }
}

impl<E> Default for OperationStatus<E> {
    fn default() -> Self {
        Self::idle()
    }
}

/// Held value plus the status of every operation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheState<T, E> {
    value: Option<T>,
    statuses: [OperationStatus<E>; 4],
}

impl<T, E> Default for CacheState<T, E> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<T, E> CacheState<T, E> {
    /// A record holding `value` with every operation idle.
    #[must_use]
    pub fn new(value: Option<T>) -> Self {
        Self {
            value,
            statuses: std::array::from_fn(|_| OperationStatus::idle()),
        }
    }

    /// The held value; `None` until something is stored.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Status of `action`.
    #[must_use]
    pub fn status(&self, action: CacheAction) -> &OperationStatus<E> {
        &self.statuses[action.index()]
    }

    /// Shorthand for `status(action).in_progress`.
    #[must_use]
    pub fn in_progress(&self, action: CacheAction) -> bool {
        self.status(action).in_progress
    }

    /// Shorthand for `status(action).succeeded`.
    #[must_use]
    pub fn succeeded(&self, action: CacheAction) -> bool {
        self.status(action).succeeded
    }

    /// Shorthand for `status(action).error`.
    #[must_use]
    pub fn error(&self, action: CacheAction) -> Option<&E> {
        self.status(action).error.as_ref()
    }

    /// First recorded error in load, save, update, delete order.
    #[must_use]
    pub fn first_error(&self) -> Option<&E> {
        self.statuses.iter().find_map(|status| status.error.as_ref())
    }

    /// Whether any operation kind is in progress.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.statuses.iter().any(|status| status.in_progress)
    }

    /// Same record with `action`'s status replaced.
    #[must_use]
    pub fn with_status(mut self, action: CacheAction, status: OperationStatus<E>) -> Self {
        self.statuses[action.index()] = status;
        self
    }

    /// Same record with the held value replaced.
    #[must_use]
    pub fn with_value(mut self, value: Option<T>) -> Self {
        self.value = value;
        self
    }

    /// Same value, every status idle.
    #[must_use]
    pub fn cleared(self) -> Self {
        Self::new(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type State = CacheState<i32, String>;

    #[test]
    fn fresh_record_is_idle() {
        let state = State::default();
        assert_eq!(state.value(), None);
        assert!(CacheAction::ALL.iter().all(|a| state.status(*a).is_idle()));
        assert!(!state.is_busy());
    }

    #[test]
    fn statuses_are_independent() {
        let state = State::new(Some(1))
            .with_status(CacheAction::Load, OperationStatus::succeeded())
            .with_status(CacheAction::Save, OperationStatus::started());

        assert!(state.succeeded(CacheAction::Load));
        assert!(state.in_progress(CacheAction::Save));
        assert!(!state.in_progress(CacheAction::Load));
        assert!(state.is_busy());
    }

    #[test]
    fn first_error_follows_priority() {
        let state = State::default()
            .with_status(CacheAction::Delete, OperationStatus::failed("delete".into()))
            .with_status(CacheAction::Save, OperationStatus::failed("save".into()));
        assert_eq!(state.first_error().map(String::as_str), Some("save"));

        let state = state.with_status(CacheAction::Load, OperationStatus::failed("load".into()));
        assert_eq!(state.first_error().map(String::as_str), Some("load"));
    }

    #[test]
    fn cleared_keeps_value() {
        let state = State::new(Some(9))
            .with_status(CacheAction::Update, OperationStatus::failed("x".into()))
            .cleared();
        assert_eq!(state.value(), Some(&9));
        assert_eq!(state.first_error(), None);
    }
}
