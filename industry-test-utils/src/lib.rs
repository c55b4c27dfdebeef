//! Industry Test Utilities
//!
//! Shared test infrastructure for the Industry workspace:
//! - A scripted generator standing in for an LLM provider
//! - Proptest strategies for generated records
//! - Fixtures for stores, schemas and menu items
//! - Assertions on cache contents

// Re-export core types for convenience
pub use industry_core::{
    CacheConfig, CacheStrategy, FieldDefinition, GeneratorError, IndustryError, IndustryResult,
    Item, ObjectSchema, StoreError,
};
pub use industry_llm::ItemGenerator;
pub use industry_storage::{CacheStore, InMemoryCacheStore, LmdbCacheStore};

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// SCRIPTED GENERATOR
// ============================================================================

/// How the generator answers a request once its queue is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Return exactly the requested number of menu items.
    Exact,
    /// Return nothing.
    Empty,
    /// Fail with `GeneratorError::Failed`.
    Fail,
}

#[derive(Debug)]
struct Script {
    batches: VecDeque<IndustryResult<Vec<Item>>>,
    requested: Vec<usize>,
    produced: usize,
}

/// Generator that replays queued batches and records every request.
///
/// Each call pops the next queued batch; when the queue is empty it answers
/// according to its [`Fallback`]. An optional delay simulates a slow
/// provider.
#[derive(Debug)]
pub struct ScriptedGenerator {
    model_id: String,
    script: Mutex<Script>,
    fallback: Fallback,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    /// A generator that always returns exactly what is asked for.
    pub fn new() -> Self {
        Self {
            model_id: "scripted".to_string(),
            script: Mutex::new(Script {
                batches: VecDeque::new(),
                requested: Vec::new(),
                produced: 0,
            }),
            fallback: Fallback::Exact,
            delay: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Queue a batch to be returned by a future call.
    pub fn then_return(self, batch: Vec<Item>) -> Self {
        self.push(Ok(batch));
        self
    }

    /// Queue a failure to be returned by a future call.
    pub fn then_fail(self, reason: impl Into<String>) -> Self {
        self.push(Err(GeneratorError::Failed {
            reason: reason.into(),
        }
        .into()));
        self
    }

    fn push(&self, batch: IndustryResult<Vec<Item>>) {
        if let Ok(mut script) = self.script.lock() {
            script.batches.push_back(batch);
        }
    }

    /// Counts passed to every call so far, in order.
    pub fn requested(&self) -> Vec<usize> {
        self.script
            .lock()
            .map(|s| s.requested.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requested().len()
    }

    /// Total records returned so far.
    pub fn produced(&self) -> usize {
        self.script.lock().map(|s| s.produced).unwrap_or_default()
    }

    /// Call the generator directly, outside of any facade.
    pub fn call(&self, count: usize) -> IndustryResult<Vec<Item>> {
        self.generate("", &fixtures::menu_item_schema(), count)
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemGenerator for ScriptedGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn generate(
        &self,
        _prompt: &str,
        _schema: &ObjectSchema,
        count: usize,
    ) -> IndustryResult<Vec<Item>> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let mut script = self.script.lock().map_err(|_| StoreError::LockPoisoned)?;
        script.requested.push(count);
        let call = script.requested.len();

        let batch = match script.batches.pop_front() {
            Some(batch) => batch,
            None => match self.fallback {
                Fallback::Exact => Ok((0..count)
                    .map(|i| fixtures::menu_item(call * 1000 + i))
                    .collect()),
                Fallback::Empty => Ok(Vec::new()),
                Fallback::Fail => Err(GeneratorError::Failed {
                    reason: format!("scripted failure on call {}", call),
                }
                .into()),
            },
        };

        if let Ok(items) = &batch {
            script.produced += items.len();
        }
        batch
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generated records.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    /// A scalar JSON value of the kinds an LLM returns for a field.
    pub fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[a-zA-Z0-9 ,.'-]{0,40}".prop_map(Value::String),
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::Bool),
            (-1.0e6f64..1.0e6f64).prop_map(Value::from),
            Just(Value::Null),
        ]
    }

    /// A record: a mapping of field name to scalar.
    pub fn arb_item() -> impl Strategy<Value = Item> {
        prop::collection::btree_map("[a-z_]{1,12}", arb_scalar(), 1..6)
            .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<_, _>>()))
    }

    /// Records with distinct contents, so set comparisons are exact.
    pub fn arb_items(size: impl Into<prop::collection::SizeRange>) -> impl Strategy<Value = Vec<Item>> {
        prop::collection::vec(arb_item(), size).prop_map(|items| {
            items
                .into_iter()
                .enumerate()
                .map(|(i, mut item)| {
                    if let Value::Object(fields) = &mut item {
                        fields.insert("_seq".to_string(), Value::from(i as u64));
                    }
                    item
                })
                .collect()
        })
    }

    pub fn arb_strategy() -> impl Strategy<Value = CacheStrategy> {
        prop_oneof![Just(CacheStrategy::Recycle), Just(CacheStrategy::LazyLoad)]
    }

    /// A fingerprint in the `<model>.<hex>` shape.
    pub fn arb_fingerprint() -> impl Strategy<Value = String> {
        ("[a-z_]{1,12}", "[0-9a-f]{32}").prop_map(|(model, digest)| format!("{}.{}", model, digest))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    /// A menu item record numbered `n`.
    pub fn menu_item(n: usize) -> Item {
        json!({
            "name": format!("Dish {}", n),
            "description": format!("House special number {}", n),
        })
    }

    /// Menu items numbered `start..start + count`.
    pub fn menu_items(start: usize, count: usize) -> Vec<Item> {
        (start..start + count).map(menu_item).collect()
    }

    /// Schema for the menu item records.
    pub fn menu_item_schema() -> ObjectSchema {
        ObjectSchema::from_fields(
            "menu_item",
            "Items on a seafood restaurant menu",
            vec![
                FieldDefinition::new("name", "The dish name").for_test("Clam Chowder"),
                FieldDefinition::new("description", "A short description of the dish"),
            ],
        )
    }

    /// An LMDB store in a fresh temporary directory.
    ///
    /// Keep the returned `TempDir` alive for as long as the store is used.
    pub fn temp_lmdb_store() -> (LmdbCacheStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbCacheStore::open(temp_dir.path(), 16).expect("store open should succeed");
        (store, temp_dir)
    }

    /// Config pointing at `dir` with fast claim polling.
    pub fn test_config(dir: &std::path::Path) -> CacheConfig {
        CacheConfig::default()
            .with_storage_path(dir)
            .with_claim_timing(Duration::from_secs(30), Duration::from_millis(2))
    }

    pub fn lazy_config(limit: Option<u64>) -> CacheConfig {
        CacheConfig::default()
            .with_strategy(CacheStrategy::LazyLoad)
            .with_lazy_load_until(limit)
            .with_claim_timing(Duration::from_secs(30), Duration::from_millis(2))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on cache contents.

    use super::*;
    use std::collections::BTreeSet;

    fn as_set(items: &[Item]) -> BTreeSet<String> {
        items.iter().map(|i| i.to_string()).collect()
    }

    /// Assert that two item lists hold the same records, in any order.
    #[track_caller]
    pub fn assert_same_items(actual: &[Item], expected: &[Item]) {
        assert_eq!(actual.len(), expected.len(), "item counts differ");
        assert_eq!(as_set(actual), as_set(expected), "item sets differ");
    }

    /// Assert that a list holds no record twice.
    #[track_caller]
    pub fn assert_no_duplicates(items: &[Item]) {
        assert_eq!(as_set(items).len(), items.len(), "items repeat");
    }

    /// Assert that every record in `subset` is in `superset`.
    #[track_caller]
    pub fn assert_subset(subset: &[Item], superset: &[Item]) {
        let superset = as_set(superset);
        for item in subset {
            assert!(superset.contains(&item.to_string()), "unexpected item {}", item);
        }
    }

    /// Assert the number of items stored under a fingerprint.
    #[track_caller]
    pub fn assert_stored<S: CacheStore>(store: &S, fingerprint: &str, expected: u64) {
        let stored = match store.find_group_id("", fingerprint) {
            Ok(Some(group_id)) => store.item_count(group_id).expect("item count should succeed"),
            Ok(None) => 0,
            Err(e) => panic!("lookup failed: {}", e),
        };
        assert_eq!(stored, expected, "stored item count for {}", fingerprint);
    }
}

// ============================================================================
// TESTS
// ============================================================================
