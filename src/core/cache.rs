//! In-memory cache of parsed device records
//!
//! [`DeviceCache`] wraps any [`DeviceStore`] and keeps recently used records
//! as shared `Arc<DeviceRecord>`s so repeated lookups skip parsing.
//!
//! - **Eviction**: least recently used entry once `capacity` is exceeded.
//!   A capacity of 0 disables caching.
//! - **Invalidation**: every hit re-checks the store's content fingerprint;
//!   a changed fingerprint reloads the record. Saving through the cache
//!   drops the saved device's entry.
//!
//! The cache is owned by its caller; nothing here is global.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::store::{DeviceStore, StoreError};
use crate::entities::device::DeviceRecord;

/// Hit/miss counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries reloaded because the stored content changed
    pub invalidations: u64,
    pub evictions: u64,
}

#[derive(Debug)]
struct CacheEntry {
    device: Arc<DeviceRecord>,
    fingerprint: Option<String>,
    last_used: u64,
}

/// LRU cache of device records in front of a store
#[derive(Debug)]
pub struct DeviceCache<S: DeviceStore> {
    store: S,
    capacity: usize,
    /// Keyed by device id
    entries: HashMap<String, CacheEntry>,
    /// Identifier as requested -> device id
    aliases: HashMap<String, String>,
    clock: u64,
    stats: CacheStats,
}

impl<S: DeviceStore> DeviceCache<S> {
    pub fn new(store: S, capacity: usize) -> Self {
        Self {
            store,
            capacity,
            entries: HashMap::new(),
            aliases: HashMap::new(),
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Get a device, loading it from the store on a miss or after a change
    pub fn get(&mut self, identifier: &str) -> Result<Arc<DeviceRecord>, StoreError> {
        if self.capacity == 0 {
            self.stats.misses += 1;
            return self.store.load(identifier).map(Arc::new);
        }

        self.clock += 1;
        let now = self.clock;

        if let Some(id) = self.aliases.get(identifier).cloned() {
            if self.entries.contains_key(&id) {
                let fingerprint = match self.store.fingerprint(&id) {
                    Ok(fp) => fp,
                    Err(e) => {
                        self.remove(&id);
                        return Err(e);
                    }
                };

                if let Some(entry) = self.entries.get_mut(&id) {
                    if entry.fingerprint == fingerprint {
                        entry.last_used = now;
                        self.stats.hits += 1;
                        return Ok(Arc::clone(&entry.device));
                    }
                }

                log::debug!("cached device {} changed on disk, reloading", id);
                self.stats.invalidations += 1;
                let device = Arc::new(self.store.load(&id)?);
                self.insert(identifier, device.clone(), fingerprint, now);
                return Ok(device);
            }
        }

        self.stats.misses += 1;
        let device = Arc::new(self.store.load(identifier)?);
        let fingerprint = self.store.fingerprint(&device.id().to_string())?;
        self.insert(identifier, device.clone(), fingerprint, now);
        Ok(device)
    }

    fn insert(
        &mut self,
        identifier: &str,
        device: Arc<DeviceRecord>,
        fingerprint: Option<String>,
        now: u64,
    ) {
        let id = device.id().to_string();
        self.aliases.insert(identifier.to_string(), id.clone());
        self.aliases.insert(id.clone(), id.clone());
        self.entries.insert(
            id,
            CacheEntry {
                device,
                fingerprint,
                last_used: now,
            },
        );
        self.evict();
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            log::debug!("evicting {} from device cache", oldest);
            self.remove(&oldest);
            self.stats.evictions += 1;
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        self.aliases.retain(|_, target| target != id);
        self.entries.remove(id).is_some()
    }

    /// Drop a device from the cache; returns true if it was cached
    pub fn invalidate(&mut self, identifier: &str) -> bool {
        match self.aliases.get(identifier).cloned() {
            Some(id) => self.remove(&id),
            None => false,
        }
    }

    /// Save through to the store and drop the stale entry
    pub fn save(&mut self, device: &DeviceRecord) -> Result<(), StoreError> {
        self.store.save(device)?;
        self.remove(&device.id().to_string());
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.aliases.clear();
    }
}
