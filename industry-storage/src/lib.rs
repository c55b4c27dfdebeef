//! Industry Storage - Cache Store and Fetch Orchestrator
//!
//! Persists generated items keyed by request fingerprint and decides when
//! the generator has to run. See [`cache`] for the moving parts.

pub mod cache;

pub use cache::{
    CacheStore, ClaimGuard, ClaimOutcome, FetchOrchestrator, FetchStats, InMemoryCacheStore,
    ItemKey, LmdbCacheStore,
};
