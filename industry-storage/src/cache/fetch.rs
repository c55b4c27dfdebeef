//! Fetch orchestrator: cache hit vs. generation.
//!
//! # Strategies
//!
//! - **Recycle**: once a group exists for a fingerprint, serve whatever is
//!   stored, even if short of the requested count. The generator is only
//!   called on a miss.
//! - **Lazy load**: on a partial hit, generate the shortfall (up to
//!   `lazy_load_until` stored items when set) and persist it.
//!
//! # Flow
//!
//! ```text
//! get(group, fp, count, generate)
//!   │
//!   ├─ claim(fp) ── waits while another caller generates for fp
//!   ├─ find_group_id(fp)
//!   │     ├─ miss → generate(count) → append → result
//!   │     └─ hit  → sample(count)            → result
//!   ├─ recycle or have >= count → return result
//!   ├─ needed = limit - have | count - have
//!   └─ generate(remaining)* → append → result ++ batch
//! ```

use std::sync::{Arc, RwLock};

use industry_core::{CacheConfig, CacheStrategy, ConfigError, GeneratorError, Item, StoreError};

use super::claim::ClaimGuard;
use super::traits::CacheStore;

/// Counters for one orchestrator instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Calls served (at least partly) from stored items.
    pub hits: u64,
    /// Calls that found no group and generated the initial batch.
    pub misses: u64,
    /// Lazy-load top-ups that persisted new items.
    pub top_ups: u64,
    /// Generator invocations across all calls.
    pub generator_calls: u64,
}

impl FetchStats {
    /// Fraction of calls served from the store (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Decides when to read from the store and when to call the generator.
///
/// The orchestrator keeps no persistent state of its own. Stores are shared
/// through an `Arc` so several orchestrators (or an admin tool) can use one
/// environment.
pub struct FetchOrchestrator<S: CacheStore> {
    store: Arc<S>,
    config: CacheConfig,
    stats: RwLock<FetchStats>,
}

impl<S: CacheStore> FetchOrchestrator<S> {
    /// Create an orchestrator over `store`.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(store: Arc<S>, config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            stats: RwLock::new(FetchStats::default()),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> FetchStats {
        self.stats.read().map(|s| *s).unwrap_or_default()
    }

    fn record(&self, update: impl FnOnce(&mut FetchStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }

    /// Return `count` items for `fingerprint`, generating as the strategy requires.
    ///
    /// `generate(n)` is asked for `n` items and may return fewer. Its errors
    /// are returned unchanged; store failures and an exhausted top-up are
    /// converted into `E`.
    ///
    /// Callers for the same fingerprint are serialized by a store claim, so
    /// concurrent identical requests generate once.
    pub fn get<F, E>(
        &self,
        group: &str,
        fingerprint: &str,
        count: usize,
        mut generate: F,
    ) -> Result<Vec<Item>, E>
    where
        F: FnMut(usize) -> Result<Vec<Item>, E>,
        E: From<StoreError> + From<GeneratorError>,
    {
        if count == 0 {
            return Ok(Vec::new());
        }

        let claim = ClaimGuard::acquire(
            self.store.as_ref(),
            fingerprint,
            self.config.claim_lease,
            self.config.claim_poll_interval,
        )?;

        let mut result = match self.store.find_group_id(group, fingerprint)? {
            None => {
                tracing::info!(group, fingerprint, count, "Cache miss, generating");
                let batch = generate(count)?;
                self.record(|s| {
                    s.misses += 1;
                    s.generator_calls += 1;
                });
                self.store.append(group, fingerprint, &batch)?;
                batch
            }
            Some(group_id) => {
                let sampled = self.store.sample(group_id, count)?;
                tracing::debug!(group, fingerprint, count, have = sampled.len(), "Cache hit");
                self.record(|s| s.hits += 1);
                sampled
            }
        };

        let have = result.len();
        if have >= count || self.config.strategy == CacheStrategy::Recycle {
            claim.release()?;
            return Ok(result);
        }

        let needed = match self.config.lazy_load_until {
            Some(limit) => usize::try_from(limit)
                .unwrap_or(usize::MAX)
                .saturating_sub(have),
            None => count - have,
        };
        if needed == 0 {
            claim.release()?;
            return Ok(result);
        }

        tracing::info!(group, fingerprint, count, have, needed, "Topping up cached items");
        let batch = self.top_up(needed, &mut generate)?;
        self.store.append(group, fingerprint, &batch)?;
        self.record(|s| s.top_ups += 1);

        claim.release()?;
        result.extend(batch);
        Ok(result)
    }

    /// Call the generator for the shortfall until `needed` items accumulate.
    ///
    /// Bounded by `max_top_up_rounds` when set.
    fn top_up<F, E>(&self, needed: usize, generate: &mut F) -> Result<Vec<Item>, E>
    where
        F: FnMut(usize) -> Result<Vec<Item>, E>,
        E: From<StoreError> + From<GeneratorError>,
    {
        let mut batch: Vec<Item> = Vec::with_capacity(needed);
        let mut rounds: u32 = 0;

        while batch.len() < needed {
            if let Some(max) = self.config.max_top_up_rounds {
                if rounds >= max {
                    return Err(GeneratorError::TopUpExhausted {
                        needed,
                        received: batch.len(),
                        rounds,
                    }
                    .into());
                }
            }

            let remaining = needed - batch.len();
            let produced = generate(remaining)?;
            rounds = rounds.saturating_add(1);
            self.record(|s| s.generator_calls += 1);

            if produced.len() < remaining {
                tracing::debug!(
                    requested = remaining,
                    received = produced.len(),
                    rounds,
                    "Generator returned a short batch"
                );
            }
            batch.extend(produced);
        }

        Ok(batch)
    }
}
