//! In-memory mirror of the server-side collections.
//!
//! Each [`Collection`] keeps items in insertion order and identifies them by
//! [`Keyed::key`], so the REST-response path and the push path can both
//! upsert the same item without duplicating it.
//!
//! Invalidation is clear-then-fill: [`Collection::invalidate`] empties the
//! collection and hands out a new generation, and [`Collection::fill`] only
//! accepts a response carrying the current generation. A response for an
//! older invalidation is stale and dropped.

use crate::types::{ActiveGrant, Code, Keyed, ResourceKind, VipPackage};
use std::collections::HashSet;
use std::fmt;

/// Load state of a single collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Never requested; distinct from loaded-but-empty
    Unloaded,
    /// Cleared and waiting for a fetch to land
    Loading,
    Loaded,
    /// The last fetch failed; contents are empty until a retry succeeds
    Failed(String),
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Unloaded => f.write_str("not loaded"),
            LoadState::Loading => f.write_str("loading"),
            LoadState::Loaded => f.write_str("loaded"),
            LoadState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Outcome of applying a fetch response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Applied,
    /// A newer invalidation superseded this fetch
    Stale,
}

/// Undo record for one optimistic upsert.
#[derive(Debug, Clone)]
pub struct Revert<T: Keyed> {
    key: T::Key,
    previous: Option<T>,
    generation: u64,
}

/// An ordered, key-addressed collection of one resource kind.
#[derive(Debug, Clone)]
pub struct Collection<T: Keyed> {
    items: Vec<T>,
    state: LoadState,
    generation: u64,
}

impl<T: Keyed + Clone> Collection<T> {
    pub fn new(state: LoadState) -> Self {
        Self {
            items: Vec::new(),
            state,
            generation: 0,
        }
    }

    /// Wholesale swap; marks the collection loaded.
    pub fn replace_all(&mut self, items: Vec<T>) {
        let mut seen = HashSet::with_capacity(items.len());
        self.items = items
            .into_iter()
            .filter(|item| seen.insert(item.key()))
            .collect();
        self.state = LoadState::Loaded;
    }

    /// Inserts `item`, or overwrites the item with the same key in place.
    ///
    /// Returns the previous value when one was replaced.
    pub fn upsert(&mut self, item: T) -> Option<T> {
        let key = item.key();
        match self.items.iter_mut().find(|existing| existing.key() == key) {
            Some(existing) => Some(std::mem::replace(existing, item)),
            None => {
                self.items.push(item);
                None
            }
        }
    }

    /// Upserts `item` and remembers how to take it back.
    pub fn upsert_revertible(&mut self, item: T) -> Revert<T> {
        let key = item.key();
        let previous = self.upsert(item);
        Revert {
            key,
            previous,
            generation: self.generation,
        }
    }

    /// Restores the item replaced by an optimistic upsert, or removes the one
    /// it inserted. No-op once the collection was invalidated since.
    pub fn revert(&mut self, revert: Revert<T>) -> bool {
        if revert.generation != self.generation {
            return false;
        }
        match revert.previous {
            Some(previous) => {
                self.upsert(previous);
            }
            None => {
                self.remove(&revert.key);
            }
        }
        true
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        let index = self.items.iter().position(|item| &item.key() == key)?;
        Some(self.items.remove(index))
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.items.iter().find(|item| &item.key() == key)
    }

    /// Clears the collection and starts a new fetch generation.
    pub fn invalidate(&mut self) -> u64 {
        self.items.clear();
        self.state = LoadState::Loading;
        self.generation += 1;
        self.generation
    }

    /// Applies a fetch response if it belongs to the current generation.
    pub fn fill(&mut self, generation: u64, items: Vec<T>) -> FillOutcome {
        if generation != self.generation {
            return FillOutcome::Stale;
        }
        self.replace_all(items);
        FillOutcome::Applied
    }

    /// Records a failed fetch if it belongs to the current generation.
    pub fn fail(&mut self, generation: u64, message: impl Into<String>) -> FillOutcome {
        if generation != self.generation {
            return FillOutcome::Stale;
        }
        self.items.clear();
        self.state = LoadState::Failed(message.into());
        FillOutcome::Applied
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The three independent collections mirrored by one editor.
#[derive(Debug, Clone)]
pub struct ResourceStore {
    pub packages: Collection<VipPackage>,
    pub grants: Collection<ActiveGrant>,
    pub codes: Collection<Code>,
    scraping: HashSet<ResourceKind>,
}

impl ResourceStore {
    /// Packages and grants await the initial snapshot; codes are loaded on demand.
    pub fn new() -> Self {
        Self {
            packages: Collection::new(LoadState::Loading),
            grants: Collection::new(LoadState::Loading),
            codes: Collection::new(LoadState::Unloaded),
            scraping: HashSet::new(),
        }
    }

    pub fn state(&self, kind: ResourceKind) -> &LoadState {
        match kind {
            ResourceKind::Packages => self.packages.state(),
            ResourceKind::Grants => self.grants.state(),
            ResourceKind::Codes => self.codes.state(),
        }
    }

    pub fn generation(&self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::Packages => self.packages.generation(),
            ResourceKind::Grants => self.grants.generation(),
            ResourceKind::Codes => self.codes.generation(),
        }
    }

    pub fn invalidate(&mut self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::Packages => self.packages.invalidate(),
            ResourceKind::Grants => self.grants.invalidate(),
            ResourceKind::Codes => self.codes.invalidate(),
        }
    }

    pub fn fail(&mut self, kind: ResourceKind, generation: u64, message: &str) -> FillOutcome {
        match kind {
            ResourceKind::Packages => self.packages.fail(generation, message),
            ResourceKind::Grants => self.grants.fail(generation, message),
            ResourceKind::Codes => self.codes.fail(generation, message),
        }
    }

    /// Marks a server-side scrape of `kind` as in progress.
    pub fn begin_scrape(&mut self, kind: ResourceKind) {
        self.scraping.insert(kind);
    }

    /// Clears the scrape flag, returning whether it was set.
    pub fn finish_scrape(&mut self, kind: ResourceKind) -> bool {
        self.scraping.remove(&kind)
    }

    pub fn is_scraping(&self, kind: ResourceKind) -> bool {
        self.scraping.contains(&kind)
    }

    /// Looks up the package a grant refers to; the reference may dangle.
    pub fn package_for(&self, grant: &ActiveGrant) -> Option<&VipPackage> {
        self.packages.get(&grant.package_name)
    }
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new()
    }
}
