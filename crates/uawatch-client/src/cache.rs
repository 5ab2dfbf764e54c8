// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Latest-value cache for subscribed attributes.
//!
//! Entries are keyed by the node's text form and an attribute name. The
//! store is a sharded [`DashMap`] so that a write only locks its own shard;
//! readers of other keys proceed in parallel. The map itself sits behind a
//! [`parking_lot::RwLock`] that upserts and reads take shared, and that only
//! [`ValueCache::reset`] takes exclusively to swap in an empty map. A reset
//! therefore never leaves a partially cleared store: every upsert lands
//! either entirely before the swap (and is discarded) or entirely after it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::client::OpcUaValue;
use crate::types::NodeId;

/// One cached attribute value.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    /// The value.
    pub value: OpcUaValue,
    /// When the value was written into the cache.
    pub observed_at: DateTime<Utc>,
}

type AttributeRecord = HashMap<String, CachedValue>;

// =============================================================================
// ValueCache
// =============================================================================

/// Concurrent map from (node, attribute) to the last observed value.
#[derive(Debug, Default)]
pub struct ValueCache {
    store: RwLock<DashMap<String, AttributeRecord>>,
    miss_reported: AtomicBool,
    stats: CacheStats,
}

impl ValueCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites one attribute value.
    pub fn upsert(&self, node: &NodeId, attribute: &str, value: OpcUaValue) {
        let entry = CachedValue {
            value,
            observed_at: Utc::now(),
        };

        let store = self.store.read();
        store
            .entry(node.to_opc_string())
            .or_default()
            .insert(attribute.to_string(), entry);
        self.stats.upserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the cached value, or `None` if it was not observed since the
    /// last reset.
    pub fn get(&self, node: &NodeId, attribute: &str) -> Option<OpcUaValue> {
        self.get_entry(node, attribute).map(|e| e.value)
    }

    /// Returns the cached value together with its observation time.
    pub fn get_entry(&self, node: &NodeId, attribute: &str) -> Option<CachedValue> {
        self.lookup(&node.to_opc_string(), attribute)
    }

    /// Display-layer lookup by node text.
    ///
    /// Behaves like [`get`](Self::get), but logs the first miss after a hit
    /// so a polling display does not flood the log.
    pub fn read_cached(&self, node: &str, attribute: &str) -> Option<OpcUaValue> {
        let key = node
            .parse::<NodeId>()
            .map(|n| n.to_opc_string())
            .unwrap_or_else(|_| node.trim().to_string());

        match self.lookup(&key, attribute) {
            Some(entry) => {
                self.miss_reported.store(false, Ordering::Relaxed);
                Some(entry.value)
            }
            None => {
                if !self.miss_reported.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        node_id = %key,
                        attribute = attribute,
                        "Attribute not found in value cache"
                    );
                }
                None
            }
        }
    }

    /// Returns a copy of every attribute cached for a node.
    pub fn snapshot(&self, node: &NodeId) -> Option<HashMap<String, CachedValue>> {
        let store = self.store.read();
        let record = store.get(&node.to_opc_string()).map(|r| r.value().clone());
        record
    }

    /// Drops every entry by swapping in an empty store.
    pub fn reset(&self) {
        let cleared = {
            let mut store = self.store.write();
            std::mem::take(&mut *store)
        };
        self.stats.resets.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(nodes = cleared.len(), "Value cache reset");
    }

    /// Returns the number of nodes with at least one cached attribute.
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn lookup(&self, key: &str, attribute: &str) -> Option<CachedValue> {
        let store = self.store.read();
        let found = store.get(key).and_then(|r| r.get(attribute).cloned());
        if found.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }
}

// =============================================================================
// CacheStats
// =============================================================================

/// Counters for cache activity.
#[derive(Debug, Default)]
pub struct CacheStats {
    upserts: AtomicU64,
    resets: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    /// Returns the number of upserts.
    pub fn upserts(&self) -> u64 {
        self.upserts.load(Ordering::Relaxed)
    }

    /// Returns the number of resets.
    pub fn resets(&self) -> u64 {
        self.resets.load(Ordering::Relaxed)
    }

    /// Returns the number of lookups that found a value.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Returns the number of lookups that found nothing.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================
