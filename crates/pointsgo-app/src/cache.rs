// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryKey {
    Flights,
}

impl QueryKey {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Flights => "flights",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedQuery<T> {
    value: T,
    stale: bool,
}

/// Last fetched value per query. Owned by whoever runs the queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCache<T> {
    entries: BTreeMap<QueryKey, CachedQuery<T>>,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> QueryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `load` only when the entry is missing or stale. A failed load
    /// keeps the previous (stale) value.
    pub fn fetch<F>(&mut self, key: QueryKey, load: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        let fresh = self.entries.get(&key).is_some_and(|entry| !entry.stale);
        if !fresh {
            let value = load()?;
            self.entries.insert(
                key,
                CachedQuery {
                    value,
                    stale: false,
                },
            );
        }
        self.get(key)
            .ok_or_else(|| anyhow!("{} query has no cached value", key.name()))
    }

    pub fn get(&self, key: QueryKey) -> Option<&T> {
        self.entries.get(&key).map(|entry| &entry.value)
    }

    pub fn invalidate(&mut self, key: QueryKey) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.stale = true;
        }
    }

    pub fn is_stale(&self, key: QueryKey) -> bool {
        self.entries.get(&key).is_none_or(|entry| entry.stale)
    }
}
