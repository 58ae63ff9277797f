#![forbid(unsafe_code)]

//! Construction options for [`EzCache`].

use std::fmt;
use std::rc::Rc;

use crate::action::CacheAction;
use crate::cache::EzCache;
use crate::error::ErrorHandler;

/// Builder for [`EzCache`].
///
/// ```
/// use ez_state::{CacheConfig, EzCache};
///
/// let cache: EzCache<u32, String> = CacheConfig::new()
///     .with_initial(7)
///     .with_name("counter")
///     .with_error_handler(|e: String, action| format!("{action} failed: {e}"))
///     .build();
/// assert_eq!(cache.value(), Some(7));
/// assert_eq!(cache.name(), Some("counter"));
/// ```
pub struct CacheConfig<T, E> {
    pub(crate) initial: Option<T>,
    pub(crate) error_handler: Option<ErrorHandler<E>>,
    pub(crate) name: Option<String>,
}

impl<T, E> Default for CacheConfig<T, E> {
    fn default() -> Self {
        Self {
            initial: None,
            error_handler: None,
            name: None,
        }
    }
}

impl<T: fmt::Debug, E> fmt::Debug for CacheConfig<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("initial", &self.initial)
            .field("custom_error_handler", &self.error_handler.is_some())
            .field("name", &self.name)
            .finish()
    }
}

impl<T, E> CacheConfig<T, E> {
    /// Empty value, identity error handler, no name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `value` held.
    #[must_use]
    pub fn with_initial(mut self, value: T) -> Self {
        self.initial = Some(value);
        self
    }

    /// Translate source errors with `handler` before storing them.
    #[must_use]
    pub fn with_error_handler(mut self, handler: impl Fn(E, CacheAction) -> E + 'static) -> Self {
        self.error_handler = Some(Rc::new(handler));
        self
    }

    /// Label reported in log events.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl<T, E> CacheConfig<T, E>
where
    T: Clone + PartialEq + 'static,
    E: Clone + PartialEq + 'static,
{
    /// Build the cache.
    #[must_use]
    pub fn build(self) -> EzCache<T, E> {
        EzCache::from_config(self)
    }
}
