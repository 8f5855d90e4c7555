// SPDX-License-Identifier: Apache-2.0 OR MIT

//! NAS Registry: a TTL cache in front of `radius_store::NasRepository`.
//!
//! Lookups are strict: when a NAS-Identifier is supplied, only an exact
//! `(ip, identifier)` match is returned — never a fallback to a different
//! identifier at the same source IP, since that would authenticate under
//! the wrong shared secret. Negative results are cached too, so a flood of
//! requests from a spoofed, unregistered source IP does not hammer SQLite.

use dashmap::DashMap;
use radius_store::{Db, NasClient, NasRepository, StoreError};
use std::time::{Duration, Instant};

const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    value: Option<NasClient>,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() < ttl
    }
}

/// Thread-safe, coarsely-invalidated cache over NAS client lookups.
pub struct NasRegistry {
    by_ip_and_identifier: DashMap<(String, String), CacheEntry>,
    by_ip: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl NasRegistry {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            by_ip_and_identifier: DashMap::new(),
            by_ip: DashMap::new(),
            ttl,
        }
    }

    /// Strict lookup: `(ip, identifier)` when `identifier` is given, else
    /// the first active record at `ip`.
    pub fn find(
        &self,
        db: &Db,
        ip_address: &str,
        identifier: Option<&str>,
    ) -> Result<Option<NasClient>, StoreError> {
        match identifier {
            Some(id) => self.find_by_ip_and_identifier(db, ip_address, id),
            None => self.find_by_ip(db, ip_address),
        }
    }

    fn find_by_ip_and_identifier(
        &self,
        db: &Db,
        ip_address: &str,
        identifier: &str,
    ) -> Result<Option<NasClient>, StoreError> {
        let key = (ip_address.to_string(), identifier.to_string());
        if let Some(entry) = self.by_ip_and_identifier.get(&key) {
            if entry.is_fresh(self.ttl) {
                return Ok(entry.value.clone());
            }
        }
        let repo = NasRepository::new(db);
        let found = repo.find_by_ip_and_identifier(ip_address, identifier)?;
        self.by_ip_and_identifier.insert(
            key,
            CacheEntry {
                value: found.clone(),
                inserted_at: Instant::now(),
            },
        );
        Ok(found)
    }

    fn find_by_ip(&self, db: &Db, ip_address: &str) -> Result<Option<NasClient>, StoreError> {
        if let Some(entry) = self.by_ip.get(ip_address) {
            if entry.is_fresh(self.ttl) {
                return Ok(entry.value.clone());
            }
        }
        let repo = NasRepository::new(db);
        let found = repo.find_first_active_by_ip(ip_address)?;
        self.by_ip.insert(
            ip_address.to_string(),
            CacheEntry {
                value: found.clone(),
                inserted_at: Instant::now(),
            },
        );
        Ok(found)
    }

    /// Called by any NAS-client mutation hook: drop every cached entry,
    /// positive or negative.
    pub fn invalidate_all(&self) {
        self.by_ip_and_identifier.clear();
        self.by_ip.clear();
    }
}

impl Default for NasRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_lookup_does_not_fall_back_to_other_identifier() {
        let db = Db::open_in_memory().unwrap();
        {
            let repo = NasRepository::new(&db);
            repo.create("nas-1", "10.0.0.5", b"secret", 1812, 1813).unwrap();
        }
        let registry = NasRegistry::new();
        assert!(registry
            .find(&db, "10.0.0.5", Some("nas-2"))
            .unwrap()
            .is_none());
        assert!(registry
            .find(&db, "10.0.0.5", Some("nas-1"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn negative_result_is_cached() {
        let db = Db::open_in_memory().unwrap();
        let registry = NasRegistry::new();
        assert!(registry.find(&db, "10.0.0.9", None).unwrap().is_none());
        // Second lookup must hit the cache, not the (empty) store again --
        // observable indirectly: inserting a row afterwards should not be
        // seen until invalidate_all() runs.
        {
            let repo = NasRepository::new(&db);
            repo.create("nas-1", "10.0.0.9", b"secret", 1812, 1813).unwrap();
        }
        assert!(registry.find(&db, "10.0.0.9", None).unwrap().is_none());
        registry.invalidate_all();
        assert!(registry.find(&db, "10.0.0.9", None).unwrap().is_some());
    }
}
