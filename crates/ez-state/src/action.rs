#![forbid(unsafe_code)]

//! Operation kinds tracked by a cache.

use std::fmt;

/// One of the four operations an [`EzCache`](crate::EzCache) tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheAction {
    /// Fetch the value.
    Load,
    /// Create the value remotely.
    Save,
    /// Modify the value remotely.
    Update,
    /// Remove the value remotely.
    Delete,
}

impl CacheAction {
    /// All kinds, in error-priority order.
    pub const ALL: [Self; 4] = [Self::Load, Self::Save, Self::Update, Self::Delete];

    /// Stable slot index in `0..4`.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Load => 0,
            Self::Save => 1,
            Self::Update => 2,
            Self::Delete => 3,
        }
    }

    /// Lowercase name (`"load"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Save => "save",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Present participle used while the operation runs (`"loading"`, ...).
    #[must_use]
    pub const fn progress_label(self) -> &'static str {
        match self {
            Self::Load => "loading",
            Self::Save => "saving",
            Self::Update => "updating",
            Self::Delete => "deleting",
        }
    }
}

impl fmt::Display for CacheAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
