//! Generation cache: durable item storage plus the fetch orchestrator.
//!
//! A caller asks for N items identified by a content fingerprint. The
//! [`FetchOrchestrator`] decides whether to serve them from a
//! [`CacheStore`] or to call the (expensive) generator, and persists what
//! the generator returns.
//!
//! # Stores
//!
//! - [`LmdbCacheStore`]: file-backed, shared between processes.
//! - [`InMemoryCacheStore`]: same semantics, process-local.
//!
//! # Concurrency
//!
//! Calls for the same fingerprint take a [`ClaimGuard`] before looking the
//! fingerprint up, so identical concurrent requests converge on the rows
//! written by whichever caller generated first.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(LmdbCacheStore::from_config(&config)?);
//! let orchestrator = FetchOrchestrator::new(store, config)?;
//!
//! let items = orchestrator.get("MenuItemFactory", &fingerprint, 3, |n| {
//!     generator.generate(prompt, &schema, n)
//! })?;
//! ```

pub mod claim;
pub mod fetch;
pub mod item_key;
pub mod lmdb_backend;
pub mod memory;
pub mod traits;

pub use claim::ClaimGuard;
pub use fetch::{FetchOrchestrator, FetchStats};
pub use item_key::ItemKey;
pub use lmdb_backend::LmdbCacheStore;
pub use memory::InMemoryCacheStore;
pub use traits::{CacheStore, ClaimOutcome};
