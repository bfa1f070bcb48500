//! Registry snapshot with atomic reload support.
//!
//! Uses `arc-swap` for lock-free reads and atomic replacement of the
//! whole lookup-table triple. This enables hot page-list
//! reconfiguration during watch mode.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │               RegistryHandle (ArcSwap)                      │
//! │                                                             │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐    │
//! │  │  Request 1  │     │  Request 2  │     │   Watcher   │    │
//! │  └──────┬──────┘     └──────┬──────┘     └──────┬──────┘    │
//! │         │                   │                   │           │
//! │         ▼                   ▼                   ▼           │
//! │      load()              load()            replace()        │
//! │    (lock-free)         (lock-free)     (atomic replace)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A request holds the `Arc<Snapshot>` it loaded for its whole
//! lifetime, so an in-flight request completes against the mapping it
//! started with even if the watcher swaps in a new one mid-request.

use super::Page;
use arc_swap::ArcSwap;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

/// Immutable result of compiling a page list.
///
/// Always replaced as a whole, never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// page name → virtual file name (the build entry map)
    pub input_map: BTreeMap<String, String>,
    /// virtual file name → page
    pub virtual_page_map: BTreeMap<String, Page>,
    /// distinct template paths in use, including the default
    pub template_set: BTreeSet<String>,
}

impl Snapshot {
    /// Look up a page by its virtual file name.
    pub fn page(&self, filename: &str) -> Option<&Page> {
        self.virtual_page_map.get(filename)
    }

    /// Whether the given root-relative path is one of the templates in
    /// use.
    pub fn is_template(&self, path: &str) -> bool {
        self.template_set.contains(path)
    }
}

/// Shared owner of the current snapshot.
#[derive(Debug)]
pub struct RegistryHandle {
    inner: ArcSwap<Snapshot>,
}

impl RegistryHandle {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: ArcSwap::from_pointee(snapshot),
        }
    }

    /// Current snapshot. Thread-safe and wait-free; the returned `Arc`
    /// stays valid across a concurrent `replace`.
    #[inline]
    pub fn load(&self) -> Arc<Snapshot> {
        self.inner.load_full()
    }

    /// Replace the snapshot atomically. Readers that already loaded the
    /// old one are unaffected; new readers see the replacement.
    pub fn replace(&self, snapshot: Snapshot) {
        self.inner.store(Arc::new(snapshot));
    }
}
