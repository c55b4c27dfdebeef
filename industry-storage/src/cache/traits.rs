//! Cache store trait.
//!
//! This module defines the operations every cache store must provide. The
//! orchestrator and the admin CLI only talk to a store through this trait.

use std::collections::BTreeSet;
use std::time::Duration;

use industry_core::{CacheGroup, CacheStats, GroupId, Item, StoreError, Timestamp};
use uuid::Uuid;

/// Result of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The claim was free (or already ours) and is now held by the caller.
    Acquired,
    /// The previous holder's lease had expired; the caller took it over.
    Reclaimed { previous_owner: Uuid },
    /// Another caller holds a live claim.
    Held { owner: Uuid, expires_at: Timestamp },
}

impl ClaimOutcome {
    /// Whether the caller now holds the claim.
    pub fn is_held_by_caller(&self) -> bool {
        !matches!(self, ClaimOutcome::Held { .. })
    }
}

/// Durable keyed storage of generated items.
///
/// # Ownership
///
/// A store exclusively owns all persisted state. Implementations must be
/// thread-safe; callers that need a shared instance share the store object
/// (usually behind an `Arc`) rather than opening the backing file twice.
///
/// # Failure
///
/// Any backing-store failure surfaces as a [`StoreError`]. Stores never
/// retry.
pub trait CacheStore: Send + Sync {
    /// Create the backing layout if absent. Safe to call repeatedly.
    fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Find the group id for a fingerprint.
    ///
    /// Lookup keys only on the fingerprint; `group` is accepted for symmetry
    /// with [`append`](Self::append).
    fn find_group_id(&self, group: &str, fingerprint: &str)
        -> Result<Option<GroupId>, StoreError>;

    /// Return up to `limit` items of a group in random order, without
    /// repetition. Fewer stored items than `limit` is not an error.
    fn sample(&self, group_id: GroupId, limit: usize) -> Result<Vec<Item>, StoreError>;

    /// Persist items under `fingerprint`, creating its group if needed.
    ///
    /// Creating a group for a new fingerprint first deletes every existing
    /// group (and its items) registered under the same `group` name. Appending
    /// never updates or removes items of the resolved group.
    fn append(&self, group: &str, fingerprint: &str, items: &[Item])
        -> Result<GroupId, StoreError>;

    /// Delete every item and every group.
    fn clear_all(&self) -> Result<(), StoreError>;

    /// Delete the groups (and their items) registered under `group`.
    ///
    /// Returns the number of groups removed; zero if none matched.
    fn clear_group(&self, group: &str) -> Result<u64, StoreError>;

    /// Distinct group names currently cached.
    fn list_groups(&self) -> Result<BTreeSet<String>, StoreError>;

    /// All group rows.
    fn groups(&self) -> Result<Vec<CacheGroup>, StoreError>;

    /// Number of items stored for a group.
    fn item_count(&self, group_id: GroupId) -> Result<u64, StoreError>;

    /// Row counts for the whole store.
    fn stats(&self) -> Result<CacheStats, StoreError>;

    /// Try to take the generation claim for a fingerprint.
    ///
    /// Insert-if-absent: succeeds when no live claim exists, when the caller
    /// already owns it (the lease is renewed), or when the existing lease
    /// has expired.
    fn try_claim(
        &self,
        fingerprint: &str,
        owner: Uuid,
        lease: Duration,
    ) -> Result<ClaimOutcome, StoreError>;

    /// Release a claim if `owner` still holds it. Returns whether a claim was removed.
    fn release_claim(&self, fingerprint: &str, owner: Uuid) -> Result<bool, StoreError>;
}
