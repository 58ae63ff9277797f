#![forbid(unsafe_code)]

//! ez-state public facade crate.
//!
//! Re-exports the reactive core and the value cache under one name.
//!
//! ```
//! use ez::prelude::*;
//!
//! let cache: EzCache<u32, String> = EzCache::with_initial(1);
//! let value = cache.observe_value();
//! cache.save(source::of(2));
//! assert_eq!(value.get(), Some(2));
//! assert!(cache.saved().get());
//! ```

pub use ez_core as core;
pub use ez_state as state;

pub mod prelude {
    pub use ez_core::source;
    pub use ez_core::{
        Computed, Emitter, Notification, Observable, Scheduler, Source, SourceExt, SourceGuard,
        Subscription, TaskHandle, Teardown,
    };
    pub use ez_state::{
        CacheAction, CacheConfig, CacheState, EzCache, OperationStatus, general_error_handler,
    };
}
