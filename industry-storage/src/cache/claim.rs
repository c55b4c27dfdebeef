//! Per-fingerprint generation claims.
//!
//! A claim is an insert-if-absent row keyed by fingerprint. While one caller
//! holds it, concurrent callers for the same fingerprint wait, then observe
//! whatever the holder persisted. Claims are leases, so a crashed holder
//! cannot block a fingerprint forever.
//!
//! ```text
//! (free) ─── try_claim() ──→ Held(owner) ─── release() / drop ──→ (free)
//!                                │
//!                         lease expires ──→ Reclaimed by next caller
//! ```

use std::time::Duration;

use chrono::Utc;
use industry_core::{new_entity_id, ClaimRecord, StoreError, Timestamp};
use uuid::Uuid;

use super::traits::{CacheStore, ClaimOutcome};

/// Decide a claim attempt against the currently stored record.
///
/// Returns the outcome and, if the caller now holds the claim, the record
/// to write back.
pub(crate) fn resolve_claim(
    existing: Option<&ClaimRecord>,
    fingerprint: &str,
    owner: Uuid,
    lease: Duration,
    now: Timestamp,
) -> (ClaimOutcome, Option<ClaimRecord>) {
    match existing {
        None => (
            ClaimOutcome::Acquired,
            Some(ClaimRecord::new(fingerprint, owner, lease)),
        ),
        Some(current) if current.owner == owner => (
            ClaimOutcome::Acquired,
            Some(ClaimRecord::new(fingerprint, owner, lease)),
        ),
        Some(current) if current.is_expired(now) => (
            ClaimOutcome::Reclaimed {
                previous_owner: current.owner,
            },
            Some(ClaimRecord::new(fingerprint, owner, lease)),
        ),
        Some(current) => (
            ClaimOutcome::Held {
                owner: current.owner,
                expires_at: current.expires_at,
            },
            None,
        ),
    }
}

/// RAII handle on a held claim. Dropping it releases the claim.
pub struct ClaimGuard<'a, S: CacheStore + ?Sized> {
    store: &'a S,
    fingerprint: String,
    owner: Uuid,
    released: bool,
}

impl<'a, S: CacheStore + ?Sized> ClaimGuard<'a, S> {
    /// Block until the claim for `fingerprint` is held by this caller.
    ///
    /// Polls every `poll_interval` while another caller holds a live claim.
    /// There is no separate timeout: the longest wait is bounded by the
    /// holder's lease.
    pub fn acquire(
        store: &'a S,
        fingerprint: &str,
        lease: Duration,
        poll_interval: Duration,
    ) -> Result<Self, StoreError> {
        let owner = new_entity_id();
        let mut waited = false;

        loop {
            match store.try_claim(fingerprint, owner, lease)? {
                ClaimOutcome::Acquired => break,
                ClaimOutcome::Reclaimed { previous_owner } => {
                    tracing::warn!(
                        fingerprint,
                        %previous_owner,
                        "Took over expired generation claim"
                    );
                    break;
                }
                ClaimOutcome::Held {
                    owner: holder,
                    expires_at,
                } => {
                    if !waited {
                        tracing::debug!(
                            fingerprint,
                            %holder,
                            %expires_at,
                            "Waiting for in-flight generation"
                        );
                        waited = true;
                    }
                    std::thread::sleep(poll_interval);
                }
            }
        }

        if waited {
            tracing::debug!(fingerprint, waited_until = %Utc::now(), "Generation claim acquired");
        }

        Ok(Self {
            store,
            fingerprint: fingerprint.to_string(),
            owner,
            released: false,
        })
    }

    /// The owner id recorded in the claim row.
    pub fn owner(&self) -> Uuid {
        self.owner
    }

    /// Release the claim now, surfacing any store error.
    pub fn release(mut self) -> Result<(), StoreError> {
        self.released = true;
        self.store.release_claim(&self.fingerprint, self.owner)?;
        Ok(())
    }
}

impl<S: CacheStore + ?Sized> Drop for ClaimGuard<'_, S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.store.release_claim(&self.fingerprint, self.owner) {
            tracing::warn!(
                fingerprint = %self.fingerprint,
                error = %e,
                "Failed to release generation claim"
            );
        }
    }
}
