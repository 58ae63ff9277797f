#![forbid(unsafe_code)]

//! Core: single-threaded reactive primitives, push-based asynchronous
//! sources and the cooperative scheduler they run on.

pub mod logging;
pub mod reactive;
pub mod scheduler;
pub mod source;

pub use reactive::{Computed, Observable, Subscription};
pub use scheduler::{Scheduler, TaskHandle};
pub use source::{Emitter, Notification, Source, SourceExt, SourceGuard, Teardown};
