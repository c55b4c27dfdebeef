//! Industry Core - Cache Entity Types
//!
//! Pure data structures shared by the store, the orchestrator and the CLI.
//! This crate contains no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod schema;

pub use config::{CacheConfig, CacheStrategy, RawCacheConfig, DEFAULT_MAX_TOP_UP_ROUNDS};
pub use error::{ConfigError, GeneratorError, IndustryError, IndustryResult, StoreError};
pub use fingerprint::{canonical_json, fingerprint};
pub use schema::{FieldDefinition, ObjectSchema};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Cache group identifier. UUIDv7, so ids sort by creation time.
pub type GroupId = Uuid;

/// Cache item identifier. UUIDv7; item order within a group is insertion order.
pub type ItemId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// One generated record. The store never inspects its structure.
pub type Item = serde_json::Value;

/// Generate a new UUIDv7 identifier.
pub fn new_entity_id() -> Uuid {
    Uuid::now_v7()
}

// ============================================================================
// CACHE GROUP
// ============================================================================

/// One cached collection (the "meta" record).
///
/// At most one group exists per `fingerprint`, and at most one per `group`:
/// storing under a new fingerprint for an existing producer supersedes the
/// old group and its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheGroup {
    pub id: GroupId,
    /// Producer name, e.g. a factory identifier. Used only for invalidation.
    pub group: String,
    pub fingerprint: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CacheGroup {
    /// Create a new group row stamped with the current time.
    pub fn new(group: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_entity_id(),
            group: group.into(),
            fingerprint: fingerprint.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// CACHE ITEM
// ============================================================================

/// One persisted record, owned exclusively by its group.
///
/// `content` holds the JSON text exactly as written; items are never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheItem {
    pub id: ItemId,
    pub group_id: GroupId,
    pub content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CacheItem {
    /// Serialize an item for storage under `group_id`.
    pub fn encode(group_id: GroupId, item: &Item, now: Timestamp) -> Result<Self, StoreError> {
        let content = serde_json::to_string(item).map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })?;

        Ok(Self {
            id: new_entity_id(),
            group_id,
            content,
            created_at: now,
            updated_at: now,
        })
    }

    /// Deserialize the stored content.
    pub fn decode(&self) -> Result<Item, StoreError> {
        serde_json::from_str(&self.content).map_err(|e| StoreError::Deserialization {
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// GENERATION CLAIM
// ============================================================================

/// Advisory per-fingerprint claim held while a caller generates.
///
/// Claims are leases: once `expires_at` passes, another caller may take
/// the claim over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub fingerprint: String,
    pub owner: Uuid,
    pub claimed_at: Timestamp,
    pub expires_at: Timestamp,
}

impl ClaimRecord {
    /// Create a claim starting now.
    pub fn new(fingerprint: impl Into<String>, owner: Uuid, lease: Duration) -> Self {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::MAX);
        Self {
            fingerprint: fingerprint.into(),
            owner,
            claimed_at: now,
            expires_at: now.checked_add_signed(lease).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Check if the claim has expired based on current time.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Row counts for the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub group_count: u64,
    pub item_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_encode_decode() {
        let group_id = new_entity_id();
        let item = json!({"name": "Clam Chowder", "price": 12.5, "vegan": false});
        let stored = CacheItem::encode(group_id, &item, Utc::now()).unwrap();

        assert_eq!(stored.group_id, group_id);
        assert_eq!(stored.decode().unwrap(), item);
    }

    #[test]
    fn test_item_decode_corrupt_content() {
        let stored = CacheItem {
            id: new_entity_id(),
            group_id: new_entity_id(),
            content: "{not json".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(
            stored.decode(),
            Err(StoreError::Deserialization { .. })
        ));
    }

    #[test]
    fn test_group_ids_are_unique() {
        let a = CacheGroup::new("MenuItemFactory", "menu_item.aa");
        let b = CacheGroup::new("MenuItemFactory", "menu_item.aa");
        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, a.updated_at);
    }

    #[test]
    fn test_claim_expiry() {
        let claim = ClaimRecord::new("fp", new_entity_id(), Duration::from_secs(60));
        assert!(!claim.is_expired(claim.claimed_at));
        assert!(claim.is_expired(claim.expires_at));
        assert!(claim.is_expired(claim.expires_at + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_claim_with_huge_lease_does_not_overflow() {
        let claim = ClaimRecord::new("fp", new_entity_id(), Duration::from_secs(u64::MAX));
        assert!(!claim.is_expired(Utc::now()));
    }
}
