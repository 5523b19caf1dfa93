//! Process-wide metadata caches.
//!
//! # Modules
//!
//! - [`accessor`] - Compiled property accessors per entity type
//! - [`ordinal`] - Column ordinals per query text
//!
//! Both caches live in a [`Registry`]. Databases normally share
//! [`Registry::shared`]; tests build isolated ones with [`Registry::new`].

pub mod accessor;
pub mod ordinal;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

pub use accessor::{AccessorCache, AccessorTable};
pub use ordinal::{OrdinalCache, OrdinalTable};

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
}

impl CacheStats {
    /// Get hit count.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get miss count.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of entries built, including ones discarded after a race.
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_build(&self) {
        self.builds.fetch_add(1, Ordering::Relaxed);
    }
}

/// Owner of the accessor and ordinal caches.
#[derive(Default)]
pub struct Registry {
    accessors: AccessorCache,
    ordinals: OrdinalCache,
}

impl Registry {
    /// Create an isolated registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn shared() -> Arc<Registry> {
        static SHARED: OnceLock<Arc<Registry>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(Registry::new())).clone()
    }

    /// Accessor tables by entity type.
    pub fn accessors(&self) -> &AccessorCache {
        &self.accessors
    }

    /// Ordinal tables by query text.
    pub fn ordinals(&self) -> &OrdinalCache {
        &self.ordinals
    }
}
