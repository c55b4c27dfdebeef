//! In-process cache store for tests and cache-disabled embedding.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use industry_core::{CacheGroup, CacheItem, CacheStats, ClaimRecord, GroupId, Item, StoreError};
use rand::seq::SliceRandom;
use uuid::Uuid;

use super::claim::resolve_claim;
use super::traits::{CacheStore, ClaimOutcome};

#[derive(Debug, Default)]
struct State {
    groups: HashMap<GroupId, CacheGroup>,
    fingerprints: HashMap<String, GroupId>,
    /// Items per group, keyed by item id (UUIDv7, so insertion order).
    items: HashMap<GroupId, BTreeMap<Uuid, CacheItem>>,
    claims: HashMap<String, ClaimRecord>,
}

impl State {
    fn remove_group(&mut self, group_id: GroupId) -> u64 {
        let removed = self
            .items
            .remove(&group_id)
            .map(|items| items.len() as u64)
            .unwrap_or(0);
        if let Some(row) = self.groups.remove(&group_id) {
            self.fingerprints.remove(&row.fingerprint);
        }
        removed
    }

    fn ids_named(&self, group: &str) -> Vec<GroupId> {
        self.groups
            .values()
            .filter(|g| g.group == group)
            .map(|g| g.id)
            .collect()
    }
}

/// Cache store holding everything in memory.
///
/// Same semantics as the LMDB store, nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    state: RwLock<State>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl CacheStore for InMemoryCacheStore {
    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }

    fn find_group_id(
        &self,
        _group: &str,
        fingerprint: &str,
    ) -> Result<Option<GroupId>, StoreError> {
        Ok(self.read()?.fingerprints.get(fingerprint).copied())
    }

    fn sample(&self, group_id: GroupId, limit: usize) -> Result<Vec<Item>, StoreError> {
        let mut stored: Vec<CacheItem> = match self.read()?.items.get(&group_id) {
            Some(items) => items.values().cloned().collect(),
            None => return Ok(Vec::new()),
        };

        stored.shuffle(&mut rand::rng());
        stored.truncate(limit);
        stored.iter().map(CacheItem::decode).collect()
    }

    fn append(
        &self,
        group: &str,
        fingerprint: &str,
        items: &[Item],
    ) -> Result<GroupId, StoreError> {
        let now = Utc::now();
        let mut state = self.write()?;

        let group_id = match state.fingerprints.get(fingerprint).copied() {
            Some(id) => id,
            None => {
                for stale in state.ids_named(group) {
                    let removed = state.remove_group(stale);
                    tracing::info!(group, removed_items = removed, "Superseded stale cache group");
                }

                let row = CacheGroup::new(group, fingerprint);
                let id = row.id;
                state.fingerprints.insert(fingerprint.to_string(), id);
                state.groups.insert(id, row);
                state.items.insert(id, BTreeMap::new());
                id
            }
        };

        let encoded = items
            .iter()
            .map(|item| CacheItem::encode(group_id, item, now))
            .collect::<Result<Vec<_>, _>>()?;

        let bucket = state.items.entry(group_id).or_default();
        for stored in encoded {
            bucket.insert(stored.id, stored);
        }

        Ok(group_id)
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        let mut state = self.write()?;
        state.groups.clear();
        state.fingerprints.clear();
        state.items.clear();
        Ok(())
    }

    fn clear_group(&self, group: &str) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let ids = state.ids_named(group);
        for id in &ids {
            state.remove_group(*id);
        }
        Ok(ids.len() as u64)
    }

    fn list_groups(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .read()?
            .groups
            .values()
            .map(|g| g.group.clone())
            .collect())
    }

    fn groups(&self) -> Result<Vec<CacheGroup>, StoreError> {
        let mut groups: Vec<CacheGroup> = self.read()?.groups.values().cloned().collect();
        groups.sort_by_key(|g| g.id);
        Ok(groups)
    }

    fn item_count(&self, group_id: GroupId) -> Result<u64, StoreError> {
        Ok(self
            .read()?
            .items
            .get(&group_id)
            .map(|items| items.len() as u64)
            .unwrap_or(0))
    }

    fn stats(&self) -> Result<CacheStats, StoreError> {
        let state = self.read()?;
        Ok(CacheStats {
            group_count: state.groups.len() as u64,
            item_count: state.items.values().map(|items| items.len() as u64).sum(),
        })
    }

    fn try_claim(
        &self,
        fingerprint: &str,
        owner: Uuid,
        lease: Duration,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut state = self.write()?;
        let (outcome, record) = resolve_claim(
            state.claims.get(fingerprint),
            fingerprint,
            owner,
            lease,
            Utc::now(),
        );
        if let Some(record) = record {
            state.claims.insert(fingerprint.to_string(), record);
        }
        Ok(outcome)
    }

    fn release_claim(&self, fingerprint: &str, owner: Uuid) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        match state.claims.get(fingerprint) {
            Some(claim) if claim.owner == owner => {
                state.claims.remove(fingerprint);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_supersede_and_count() {
        let store = InMemoryCacheStore::new();
        let old = store
            .append("A", "a.1", &[json!({"n": 1}), json!({"n": 2})])
            .unwrap();
        let new = store.append("A", "a.2", &[json!({"n": 3})]).unwrap();

        assert_ne!(old, new);
        assert_eq!(store.find_group_id("A", "a.1").unwrap(), None);
        assert_eq!(store.item_count(old).unwrap(), 0);
        assert_eq!(
            store.stats().unwrap(),
            CacheStats {
                group_count: 1,
                item_count: 1
            }
        );
    }

    #[test]
    fn test_sample_unknown_group_is_empty() {
        let store = InMemoryCacheStore::new();
        assert!(store.sample(Uuid::now_v7(), 5).unwrap().is_empty());
    }

    #[test]
    fn test_clear_group_and_list() {
        let store = InMemoryCacheStore::new();
        store.append("A", "a.1", &[json!(1)]).unwrap();
        store.append("B", "b.1", &[json!(2)]).unwrap();

        assert_eq!(store.clear_group("A").unwrap(), 1);
        assert_eq!(store.clear_group("A").unwrap(), 0);
        assert_eq!(
            store.list_groups().unwrap(),
            BTreeSet::from(["B".to_string()])
        );
    }

    #[test]
    fn test_claims_are_exclusive() {
        let store = InMemoryCacheStore::new();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let lease = Duration::from_secs(10);

        assert!(store.try_claim("fp", a, lease).unwrap().is_held_by_caller());
        assert!(!store.try_claim("fp", b, lease).unwrap().is_held_by_caller());
        assert!(store.release_claim("fp", a).unwrap());
        assert!(store.try_claim("fp", b, lease).unwrap().is_held_by_caller());
    }
}
