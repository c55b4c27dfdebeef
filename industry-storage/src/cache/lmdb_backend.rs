//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep generated items in a
//! memory-mapped, file-backed environment.
//!
//! # Layout
//!
//! Four named databases live in one environment:
//! - `groups`: group id (16 bytes) → `CacheGroup` JSON
//! - `fingerprints`: fingerprint → group id (unique index)
//! - `items`: [`ItemKey`] (group-prefixed) → `CacheItem` JSON
//! - `claims`: fingerprint → `ClaimRecord` JSON
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions and serializes writers, across threads and
//! processes. Every mutating operation, including the supersede-then-insert
//! of `append` and the cascade of a group delete, runs in a single write
//! transaction.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use industry_core::{
    CacheConfig, CacheGroup, CacheItem, CacheStats, ClaimRecord, GroupId, Item, StoreError,
};
use rand::seq::SliceRandom;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::claim::resolve_claim;
use super::item_key::ItemKey;
use super::traits::{CacheStore, ClaimOutcome};

const GROUPS_DB: &str = "groups";
const FINGERPRINTS_DB: &str = "fingerprints";
const ITEMS_DB: &str = "items";
const CLAIMS_DB: &str = "claims";

fn txn_error(e: heed::Error) -> StoreError {
    StoreError::Transaction {
        reason: e.to_string(),
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization {
        reason: e.to_string(),
    })
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Deserialization {
        reason: e.to_string(),
    })
}

fn decode_group_id(bytes: &[u8]) -> Result<GroupId, StoreError> {
    GroupId::from_slice(bytes).map_err(|e| StoreError::Deserialization {
        reason: format!("invalid group id: {}", e),
    })
}

/// Handles to the four databases.
#[derive(Clone, Copy)]
struct Schema {
    groups: Database<Bytes, Bytes>,
    fingerprints: Database<Bytes, Bytes>,
    items: Database<Bytes, Bytes>,
    claims: Database<Bytes, Bytes>,
}

impl Schema {
    /// Open or create every database in one write transaction.
    fn create(env: &Env) -> Result<Self, StoreError> {
        let schema_error = |e: heed::Error| StoreError::SchemaCreation {
            reason: e.to_string(),
        };

        let mut wtxn = env.write_txn().map_err(schema_error)?;

        let groups = env
            .create_database(&mut wtxn, Some(GROUPS_DB))
            .map_err(schema_error)?;
        let fingerprints = env
            .create_database(&mut wtxn, Some(FINGERPRINTS_DB))
            .map_err(schema_error)?;
        let items = env
            .create_database(&mut wtxn, Some(ITEMS_DB))
            .map_err(schema_error)?;
        let claims = env
            .create_database(&mut wtxn, Some(CLAIMS_DB))
            .map_err(schema_error)?;

        wtxn.commit().map_err(schema_error)?;

        Ok(Self {
            groups,
            fingerprints,
            items,
            claims,
        })
    }
}

/// LMDB-backed cache store.
///
/// The environment is acquired once per store and closed when the last
/// handle is dropped. Share one store (e.g. `Arc<LmdbCacheStore>`) rather
/// than opening the same directory twice in one process.
///
/// # Example
///
/// ```ignore
/// use industry_storage::{CacheStore, LmdbCacheStore};
///
/// let store = LmdbCacheStore::open("/tmp/industry_cache", 64)?;
/// store.append("MenuItemFactory", &fingerprint, &items)?;
/// let group_id = store.find_group_id("MenuItemFactory", &fingerprint)?;
/// ```
pub struct LmdbCacheStore {
    env: Env,
    schema: Schema,
    path: PathBuf,
}

impl LmdbCacheStore {
    /// Open (or create) a store in `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored; created if absent
    /// * `max_size_mb` - Maximum size of the environment in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, StoreError> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per store and never through
        // a second handle from within this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb.saturating_mul(1024 * 1024))
                .max_dbs(4)
                .open(path)
        }
        .map_err(|e| StoreError::EnvOpen {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let schema = Schema::create(&env)?;

        tracing::debug!(path = %path.display(), max_size_mb, "Opened LMDB cache store");

        Ok(Self {
            env,
            schema,
            path: path.to_path_buf(),
        })
    }

    /// Open the store described by a cache config.
    pub fn from_config(config: &CacheConfig) -> Result<Self, StoreError> {
        Self::open(&config.storage_path, config.map_size_mb)
    }

    /// Directory of the LMDB environment.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_txn(&self) -> Result<RoTxn<'_>, StoreError> {
        self.env.read_txn().map_err(txn_error)
    }

    fn write_txn(&self) -> Result<RwTxn<'_>, StoreError> {
        self.env.write_txn().map_err(txn_error)
    }

    fn lookup_fingerprint(
        &self,
        txn: &RoTxn,
        fingerprint: &str,
    ) -> Result<Option<GroupId>, StoreError> {
        match self
            .schema
            .fingerprints
            .get(txn, fingerprint.as_bytes())
            .map_err(txn_error)?
        {
            Some(bytes) => Ok(Some(decode_group_id(bytes)?)),
            None => Ok(None),
        }
    }

    fn all_groups(&self, txn: &RoTxn) -> Result<Vec<CacheGroup>, StoreError> {
        let mut groups = Vec::new();
        for result in self.schema.groups.iter(txn).map_err(txn_error)? {
            let (_, bytes) = result.map_err(txn_error)?;
            groups.push(decode_json::<CacheGroup>(bytes)?);
        }
        Ok(groups)
    }

    /// Collect the keys of every item under a group prefix.
    fn item_keys(&self, txn: &RoTxn, group_id: GroupId) -> Result<Vec<Vec<u8>>, StoreError> {
        let prefix = ItemKey::group_prefix(group_id);
        let mut keys = Vec::new();
        for result in self
            .schema
            .items
            .prefix_iter(txn, &prefix[..])
            .map_err(txn_error)?
        {
            let (key, _) = result.map_err(txn_error)?;
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    fn group_items(&self, txn: &RoTxn, group_id: GroupId) -> Result<Vec<CacheItem>, StoreError> {
        let prefix = ItemKey::group_prefix(group_id);
        let mut items = Vec::new();
        for result in self
            .schema
            .items
            .prefix_iter(txn, &prefix[..])
            .map_err(txn_error)?
        {
            let (_, bytes) = result.map_err(txn_error)?;
            items.push(decode_json::<CacheItem>(bytes)?);
        }
        Ok(items)
    }

    /// Delete a group row, its fingerprint index entry and all of its items.
    ///
    /// Returns the number of items removed.
    fn delete_group(&self, wtxn: &mut RwTxn, group: &CacheGroup) -> Result<u64, StoreError> {
        let keys = self.item_keys(wtxn, group.id)?;

        let mut deleted = 0u64;
        for key in &keys {
            if self.schema.items.delete(wtxn, key).map_err(txn_error)? {
                deleted += 1;
            }
        }

        self.schema
            .fingerprints
            .delete(wtxn, group.fingerprint.as_bytes())
            .map_err(txn_error)?;
        self.schema
            .groups
            .delete(wtxn, group.id.as_bytes())
            .map_err(txn_error)?;

        Ok(deleted)
    }
}

impl CacheStore for LmdbCacheStore {
    fn ensure_schema(&self) -> Result<(), StoreError> {
        Schema::create(&self.env).map(|_| ())
    }

    fn find_group_id(
        &self,
        _group: &str,
        fingerprint: &str,
    ) -> Result<Option<GroupId>, StoreError> {
        let rtxn = self.read_txn()?;
        self.lookup_fingerprint(&rtxn, fingerprint)
    }

    fn sample(&self, group_id: GroupId, limit: usize) -> Result<Vec<Item>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut stored = {
            let rtxn = self.read_txn()?;
            self.group_items(&rtxn, group_id)?
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
        let mut wtxn = self.write_txn()?;

        let group_id = match self.lookup_fingerprint(&wtxn, fingerprint)? {
            Some(id) => id,
            None => {
                let stale: Vec<CacheGroup> = self
                    .all_groups(&wtxn)?
                    .into_iter()
                    .filter(|g| g.group == group)
                    .collect();

                for old in &stale {
                    let removed = self.delete_group(&mut wtxn, old)?;
                    tracing::info!(
                        group,
                        stale_fingerprint = %old.fingerprint,
                        removed_items = removed,
                        "Superseded stale cache group"
                    );
                }

                let row = CacheGroup::new(group, fingerprint);
                self.schema
                    .groups
                    .put(&mut wtxn, row.id.as_bytes(), &encode_json(&row)?)
                    .map_err(txn_error)?;
                self.schema
                    .fingerprints
                    .put(&mut wtxn, fingerprint.as_bytes(), row.id.as_bytes())
                    .map_err(txn_error)?;
                row.id
            }
        };

        for item in items {
            let stored = CacheItem::encode(group_id, item, now)?;
            let key = ItemKey::new(group_id, stored.id).encode();
            self.schema
                .items
                .put(&mut wtxn, &key, &encode_json(&stored)?)
                .map_err(txn_error)?;
        }

        wtxn.commit().map_err(txn_error)?;

        tracing::debug!(group, fingerprint, appended = items.len(), "Appended cache items");
        Ok(group_id)
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        let mut wtxn = self.write_txn()?;
        self.schema.items.clear(&mut wtxn).map_err(txn_error)?;
        self.schema.fingerprints.clear(&mut wtxn).map_err(txn_error)?;
        self.schema.groups.clear(&mut wtxn).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;

        tracing::info!(path = %self.path.display(), "Cleared all cached data");
        Ok(())
    }

    fn clear_group(&self, group: &str) -> Result<u64, StoreError> {
        let mut wtxn = self.write_txn()?;

        let matching: Vec<CacheGroup> = self
            .all_groups(&wtxn)?
            .into_iter()
            .filter(|g| g.group == group)
            .collect();

        for row in &matching {
            self.delete_group(&mut wtxn, row)?;
        }

        wtxn.commit().map_err(txn_error)?;

        tracing::info!(group, removed_groups = matching.len(), "Cleared cache group");
        Ok(matching.len() as u64)
    }

    fn list_groups(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.groups()?.into_iter().map(|g| g.group).collect())
    }

    fn groups(&self) -> Result<Vec<CacheGroup>, StoreError> {
        let rtxn = self.read_txn()?;
        self.all_groups(&rtxn)
    }

    fn item_count(&self, group_id: GroupId) -> Result<u64, StoreError> {
        let rtxn = self.read_txn()?;
        Ok(self.item_keys(&rtxn, group_id)?.len() as u64)
    }

    fn stats(&self) -> Result<CacheStats, StoreError> {
        let rtxn = self.read_txn()?;
        Ok(CacheStats {
            group_count: self.schema.groups.len(&rtxn).map_err(txn_error)?,
            item_count: self.schema.items.len(&rtxn).map_err(txn_error)?,
        })
    }

    fn try_claim(
        &self,
        fingerprint: &str,
        owner: Uuid,
        lease: Duration,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut wtxn = self.write_txn()?;

        let existing = match self
            .schema
            .claims
            .get(&wtxn, fingerprint.as_bytes())
            .map_err(txn_error)?
        {
            Some(bytes) => Some(decode_json::<ClaimRecord>(bytes)?),
            None => None,
        };

        let (outcome, record) =
            resolve_claim(existing.as_ref(), fingerprint, owner, lease, Utc::now());

        if let Some(record) = record {
            self.schema
                .claims
                .put(&mut wtxn, fingerprint.as_bytes(), &encode_json(&record)?)
                .map_err(txn_error)?;
            wtxn.commit().map_err(txn_error)?;
        }

        Ok(outcome)
    }

    fn release_claim(&self, fingerprint: &str, owner: Uuid) -> Result<bool, StoreError> {
        let mut wtxn = self.write_txn()?;

        let held_by_owner = match self
            .schema
            .claims
            .get(&wtxn, fingerprint.as_bytes())
            .map_err(txn_error)?
        {
            Some(bytes) => decode_json::<ClaimRecord>(bytes)?.owner == owner,
            None => false,
        };

        if !held_by_owner {
            return Ok(false);
        }

        self.schema
            .claims
            .delete(&mut wtxn, fingerprint.as_bytes())
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbCacheStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbCacheStore::open(temp_dir.path(), 10).expect("store open should succeed");
        (store, temp_dir)
    }

    fn menu_items(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| json!({"name": format!("Dish {}", i), "description": format!("Tasty {}", i)}))
            .collect()
    }

    #[test]
    fn test_open_creates_directory() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let nested = temp_dir.path().join("nested").join("cache");
        let store = LmdbCacheStore::open(&nested, 10).expect("store open should succeed");
        assert!(nested.is_dir());
        assert_eq!(store.path(), nested.as_path());
    }

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let (store, _temp_dir) = create_test_store();
        store.append("A", "a.1", &menu_items(2)).expect("append should succeed");

        store.ensure_schema().expect("first ensure should succeed");
        store.ensure_schema().expect("second ensure should succeed");

        assert_eq!(store.stats().expect("stats should succeed").item_count, 2);
    }

    #[test]
    fn test_find_group_id_missing() {
        let (store, _temp_dir) = create_test_store();
        assert_eq!(store.find_group_id("A", "a.1").expect("lookup should succeed"), None);
    }

    #[test]
    fn test_find_group_id_keys_on_fingerprint_only() {
        let (store, _temp_dir) = create_test_store();
        let id = store.append("A", "a.1", &menu_items(1)).expect("append should succeed");

        assert_eq!(store.find_group_id("A", "a.1").expect("lookup should succeed"), Some(id));
        assert_eq!(
            store.find_group_id("other", "a.1").expect("lookup should succeed"),
            Some(id)
        );
    }

    #[test]
    fn test_append_then_sample_returns_everything_once() {
        let (store, _temp_dir) = create_test_store();
        let items = menu_items(5);
        let id = store.append("A", "a.1", &items).expect("append should succeed");

        let sampled = store.sample(id, 5).expect("sample should succeed");
        assert_eq!(sampled.len(), 5);

        let expected: HashSet<String> = items.iter().map(|i| i.to_string()).collect();
        let actual: HashSet<String> = sampled.iter().map(|i| i.to_string()).collect();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_sample_respects_limit() {
        let (store, _temp_dir) = create_test_store();
        let id = store.append("A", "a.1", &menu_items(6)).expect("append should succeed");

        let sampled = store.sample(id, 4).expect("sample should succeed");
        assert_eq!(sampled.len(), 4);
        let unique: HashSet<String> = sampled.iter().map(|i| i.to_string()).collect();
        assert_eq!(unique.len(), 4, "sample must not repeat items");
    }

    #[test]
    fn test_sample_short_group_returns_all() {
        let (store, _temp_dir) = create_test_store();
        let id = store.append("A", "a.1", &menu_items(2)).expect("append should succeed");
        assert_eq!(store.sample(id, 10).expect("sample should succeed").len(), 2);
        assert!(store.sample(id, 0).expect("sample should succeed").is_empty());
    }

    #[test]
    fn test_append_is_additive() {
        let (store, _temp_dir) = create_test_store();
        let first = store.append("A", "a.1", &menu_items(2)).expect("append should succeed");
        let second = store.append("A", "a.1", &menu_items(3)).expect("append should succeed");

        assert_eq!(first, second);
        assert_eq!(store.item_count(first).expect("count should succeed"), 5);
        assert_eq!(store.groups().expect("groups should succeed").len(), 1);
    }

    #[test]
    fn test_append_empty_batch_creates_group() {
        let (store, _temp_dir) = create_test_store();
        let id = store.append("A", "a.1", &[]).expect("append should succeed");
        assert_eq!(store.find_group_id("A", "a.1").expect("lookup should succeed"), Some(id));
        assert_eq!(store.item_count(id).expect("count should succeed"), 0);
    }

    #[test]
    fn test_new_fingerprint_supersedes_group() {
        let (store, _temp_dir) = create_test_store();
        let old = store.append("A", "a.1", &menu_items(3)).expect("append should succeed");
        let other = store.append("B", "b.1", &menu_items(2)).expect("append should succeed");

        let new = store.append("A", "a.2", &menu_items(1)).expect("append should succeed");

        assert_ne!(old, new);
        assert_eq!(store.find_group_id("A", "a.1").expect("lookup should succeed"), None);
        assert_eq!(store.item_count(old).expect("count should succeed"), 0);
        assert_eq!(store.item_count(new).expect("count should succeed"), 1);
        assert_eq!(store.item_count(other).expect("count should succeed"), 2);

        let stats = store.stats().expect("stats should succeed");
        assert_eq!(stats.group_count, 2);
        assert_eq!(stats.item_count, 3);
    }

    #[test]
    fn test_clear_group_leaves_other_groups() {
        let (store, _temp_dir) = create_test_store();
        let a = store.append("A", "a.1", &menu_items(2)).expect("append should succeed");
        let b = store.append("B", "b.1", &menu_items(3)).expect("append should succeed");

        assert_eq!(store.clear_group("A").expect("clear should succeed"), 1);

        assert_eq!(store.item_count(a).expect("count should succeed"), 0);
        assert_eq!(store.sample(b, 10).expect("sample should succeed").len(), 3);
        assert_eq!(
            store.list_groups().expect("list should succeed"),
            BTreeSet::from(["B".to_string()])
        );
    }

    #[test]
    fn test_clear_group_absent_is_noop() {
        let (store, _temp_dir) = create_test_store();
        assert_eq!(store.clear_group("nobody").expect("clear should succeed"), 0);
    }

    #[test]
    fn test_clear_all_is_idempotent() {
        let (store, _temp_dir) = create_test_store();
        store.append("A", "a.1", &menu_items(2)).expect("append should succeed");
        store.append("B", "b.1", &menu_items(2)).expect("append should succeed");

        store.clear_all().expect("clear should succeed");
        store.clear_all().expect("second clear should succeed");

        assert_eq!(store.stats().expect("stats should succeed"), CacheStats::default());
        assert!(store.list_groups().expect("list should succeed").is_empty());
    }

    #[test]
    fn test_item_count_is_per_group() {
        let (store, _temp_dir) = create_test_store();
        let a = store.append("A", "a.1", &menu_items(2)).expect("append should succeed");
        let b = store.append("B", "b.1", &menu_items(5)).expect("append should succeed");
        let c = store.append("C", "c.1", &menu_items(1)).expect("append should succeed");

        assert_eq!(store.item_count(a).expect("count should succeed"), 2);
        assert_eq!(store.item_count(b).expect("count should succeed"), 5);
        assert_eq!(store.item_count(c).expect("count should succeed"), 1);

        store.clear_group("B").expect("clear should succeed");
        assert_eq!(store.item_count(a).expect("count should succeed"), 2);
        assert_eq!(store.item_count(c).expect("count should succeed"), 1);
        assert_eq!(store.sample(a, 10).expect("sample should succeed").len(), 2);
    }

    #[test]
    fn test_items_survive_reopen() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let id = {
            let store =
                LmdbCacheStore::open(temp_dir.path(), 10).expect("store open should succeed");
            store.append("A", "a.1", &menu_items(3)).expect("append should succeed")
        };

        let store = LmdbCacheStore::open(temp_dir.path(), 10).expect("store reopen should succeed");
        assert_eq!(store.find_group_id("A", "a.1").expect("lookup should succeed"), Some(id));
        assert_eq!(store.sample(id, 3).expect("sample should succeed").len(), 3);
    }

    #[test]
    fn test_claim_lifecycle() {
        let (store, _temp_dir) = create_test_store();
        let lease = Duration::from_secs(30);
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();

        assert_eq!(
            store.try_claim("fp", first, lease).expect("claim should succeed"),
            ClaimOutcome::Acquired
        );
        assert!(!store
            .try_claim("fp", second, lease)
            .expect("claim should succeed")
            .is_held_by_caller());
        assert_eq!(
            store.try_claim("other", second, lease).expect("claim should succeed"),
            ClaimOutcome::Acquired
        );

        assert!(!store.release_claim("fp", second).expect("release should succeed"));
        assert!(store.release_claim("fp", first).expect("release should succeed"));

        assert_eq!(
            store.try_claim("fp", second, lease).expect("claim should succeed"),
            ClaimOutcome::Acquired
        );
    }

    #[test]
    fn test_expired_claim_is_reclaimed() {
        let (store, _temp_dir) = create_test_store();
        let first = Uuid::now_v7();
        store
            .try_claim("fp", first, Duration::from_millis(1))
            .expect("claim should succeed");
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(
            store
                .try_claim("fp", Uuid::now_v7(), Duration::from_secs(30))
                .expect("claim should succeed"),
            ClaimOutcome::Reclaimed {
                previous_owner: first
            }
        );
    }

    #[test]
    fn test_clear_all_keeps_claims() {
        let (store, _temp_dir) = create_test_store();
        let owner = Uuid::now_v7();
        store
            .try_claim("fp", owner, Duration::from_secs(30))
            .expect("claim should succeed");
        store.clear_all().expect("clear should succeed");
        assert!(store.release_claim("fp", owner).expect("release should succeed"));
    }
}
