//! Property-Based Tests for the Industry Facade
//!
//! The facade runs against an LMDB store on disk with a scripted generator:
//! - `next_state` cycles through the produced records
//! - a second facade for the same producer reuses the cached records
//! - changing the schema supersedes the producer's cached records

use std::collections::BTreeSet;
use std::sync::Arc;

use industry_core::{CacheConfig, CacheStrategy, FieldDefinition, ObjectSchema};
use industry_llm::Industry;
use industry_storage::{CacheStore, LmdbCacheStore};
use industry_test_utils::assertions::{assert_same_items, assert_stored};
use industry_test_utils::fixtures::{menu_item_schema, temp_lmdb_store};
use industry_test_utils::ScriptedGenerator;
use proptest::prelude::*;

const GROUP: &str = "MenuItemFactory";
const PROMPT: &str = "Items on a seafood restaurant menu";

fn facade(
    generator: &Arc<ScriptedGenerator>,
    store: &Arc<LmdbCacheStore>,
    schema: ObjectSchema,
) -> Industry<Arc<ScriptedGenerator>, LmdbCacheStore> {
    Industry::new(
        Arc::clone(generator),
        Arc::clone(store),
        CacheConfig::default(),
        GROUP,
        PROMPT,
        schema,
    )
}

#[test]
fn test_second_facade_reuses_cached_records() {
    let (store, _temp_dir) = temp_lmdb_store();
    let store = Arc::new(store);
    let generator = Arc::new(ScriptedGenerator::new());

    let mut first = facade(&generator, &store, menu_item_schema()).with_count(3);
    let first_items = first.items().unwrap().to_vec();

    let mut second = facade(&generator, &store, menu_item_schema()).with_count(3);
    let second_items = second.items().unwrap().to_vec();

    assert_same_items(&second_items, &first_items);
    assert_eq!(generator.call_count(), 1);
    assert_stored(store.as_ref(), &first.fingerprint(), 3);
}

#[test]
fn test_schema_change_supersedes_cached_records() {
    let (store, _temp_dir) = temp_lmdb_store();
    let store = Arc::new(store);
    let generator = Arc::new(ScriptedGenerator::new());

    let mut old = facade(&generator, &store, menu_item_schema()).with_count(2);
    old.items().unwrap();

    let changed = ObjectSchema::from_fields(
        "menu_item",
        PROMPT,
        vec![
            FieldDefinition::new("name", "The dish name"),
            FieldDefinition::new("price", "Price in dollars"),
        ],
    );
    let mut new = facade(&generator, &store, changed).with_count(2);
    new.items().unwrap();

    assert_ne!(old.fingerprint(), new.fingerprint());
    assert_eq!(generator.requested(), vec![2, 2]);
    assert_stored(store.as_ref(), &old.fingerprint(), 0);
    assert_eq!(store.list_groups().unwrap(), BTreeSet::from([GROUP.to_string()]));
}

#[test]
fn test_lazy_load_until_caps_growth() {
    let (store, _temp_dir) = temp_lmdb_store();
    let store = Arc::new(store);
    let generator = Arc::new(ScriptedGenerator::new());

    facade(&generator, &store, menu_item_schema())
        .with_count(1)
        .items()
        .unwrap();

    let mut grown = facade(&generator, &store, menu_item_schema())
        .with_count(5)
        .with_strategy(CacheStrategy::LazyLoad)
        .with_lazy_load_until(Some(3));

    assert_eq!(grown.items().unwrap().len(), 3);
    assert_eq!(generator.requested(), vec![1, 2]);
}

#[test]
fn test_empty_generation_is_retried_on_next_state() {
    let (store, _temp_dir) = temp_lmdb_store();
    let store = Arc::new(store);
    let generator = Arc::new(ScriptedGenerator::new().then_return(Vec::new()));
    let mut industry = facade(&generator, &store, menu_item_schema())
        .with_count(2)
        .use_cache(false);

    assert_eq!(industry.next_state().unwrap(), None);

    let state = industry.next_state().unwrap();
    assert!(state.is_some());
    assert_eq!(generator.requested(), vec![2, 2]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: the i-th state is record `i mod n` of the produced records.
    #[test]
    fn prop_next_state_cycles(count in 1usize..6, calls in 1usize..20) {
        let (store, _temp_dir) = temp_lmdb_store();
        let store = Arc::new(store);
        let generator = Arc::new(ScriptedGenerator::new());
        let mut industry = facade(&generator, &store, menu_item_schema()).with_count(count);

        let items = industry.items().unwrap().to_vec();
        for i in 0..calls {
            let state = industry.next_state().unwrap();
            prop_assert_eq!(state.as_ref(), Some(&items[i % items.len()]));
        }
        prop_assert_eq!(generator.call_count(), 1);
    }
}
