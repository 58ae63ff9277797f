#![forbid(unsafe_code)]

//! Reactive value cache.
//!
//! [`EzCache`] holds one value and tracks four asynchronous operations that
//! may replace it: load, save, update and delete. Each operation is started
//! with a [`Source`](ez_core::Source); the cache publishes an in-progress
//! status, subscribes, and records either the emitted value or the
//! (translated) error. Every aspect of the state is exposed both as a
//! synchronous read and as a distinct-until-changed [`Computed`] stream.
//!
//! # Example
//!
//! ```
//! use ez_core::source;
//! use ez_state::EzCache;
//!
//! let cache: EzCache<String, String> = EzCache::new();
//! let loading = cache.loading();
//!
//! let (response, resolver) = source::deferred();
//! cache.load(response);
//! assert!(loading.get());
//!
//! resolver.resolve("hello".to_string());
//! assert!(!loading.get());
//! assert!(cache.loaded().get());
//! assert_eq!(cache.value().as_deref(), Some("hello"));
//! ```
//!
//! [`Computed`]: ez_core::Computed

pub mod action;
pub mod cache;
pub mod config;
pub mod error;
pub mod state;

pub use action::CacheAction;
pub use cache::EzCache;
pub use config::CacheConfig;
pub use error::{ErrorHandler, general_error_handler};
pub use state::{CacheState, OperationStatus};
