//! Per-producer facade over a generator and the generation cache.

use std::sync::Arc;

use industry_core::{
    fingerprint, CacheConfig, CacheStrategy, IndustryResult, Item, ObjectSchema,
};
use industry_storage::{CacheStore, FetchOrchestrator};

use crate::ItemGenerator;

/// Records generated per producer when no count is given.
pub const DEFAULT_COUNT: usize = 1;

/// Generates records for one producer and hands them out one at a time.
///
/// Records are produced once per instance, through the cache when it is
/// enabled, and then reused round-robin by [`next_state`](Self::next_state).
///
/// # Example
///
/// ```ignore
/// let mut industry = Industry::new(generator, store, config, "MenuItemFactory", prompt, schema)
///     .with_count(10);
///
/// for _ in 0..10 {
///     let attributes = industry.next_state()?;
/// }
/// ```
pub struct Industry<G: ItemGenerator, S: CacheStore> {
    generator: G,
    store: Arc<S>,
    config: CacheConfig,
    group: String,
    prompt: String,
    schema: ObjectSchema,
    count: usize,
    test_mode: bool,
    force_generation: bool,
    orchestrator: Option<FetchOrchestrator<S>>,
    data: Option<Vec<Item>>,
    state_index: usize,
}

impl<G: ItemGenerator, S: CacheStore> Industry<G, S> {
    pub fn new(
        generator: G,
        store: Arc<S>,
        config: CacheConfig,
        group: impl Into<String>,
        prompt: impl Into<String>,
        schema: ObjectSchema,
    ) -> Self {
        Self {
            generator,
            store,
            config,
            group: group.into(),
            prompt: prompt.into(),
            schema,
            count: DEFAULT_COUNT,
            test_mode: false,
            force_generation: false,
            orchestrator: None,
            data: None,
            state_index: 0,
        }
    }

    /// Number of records to produce. Zero falls back to the default.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = if count == 0 { DEFAULT_COUNT } else { count };
        self
    }

    /// Turn the cache on or off for this instance.
    pub fn use_cache(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self.orchestrator = None;
        self
    }

    pub fn with_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.config.strategy = strategy;
        self.orchestrator = None;
        self
    }

    pub fn with_lazy_load_until(mut self, limit: Option<u64>) -> Self {
        self.config.lazy_load_until = limit;
        self.orchestrator = None;
        self
    }

    /// In test mode records are built from field test values instead of
    /// being generated, unless generation is forced.
    pub fn test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    pub fn force_generation(mut self, force: bool) -> Self {
        self.force_generation = force;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn schema(&self) -> &ObjectSchema {
        &self.schema
    }

    /// Fingerprint of this producer's request.
    ///
    /// Keyed on the record type, not the generator's model, so switching
    /// models keeps the cached records.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.schema.name, &self.prompt, &self.schema.to_descriptor())
    }

    /// The records for this instance, generating them on first call.
    ///
    /// An empty result is not kept; the next call asks again.
    pub fn items(&mut self) -> IndustryResult<&[Item]> {
        if self.data.as_ref().map_or(true, Vec::is_empty) {
            let generated = self.generate()?;
            self.data = Some(generated);
        }
        Ok(self.data.as_deref().unwrap_or_default())
    }

    /// Next record, wrapping to the first once all have been handed out.
    ///
    /// Returns `None` only when no records exist at all.
    pub fn next_state(&mut self) -> IndustryResult<Option<Item>> {
        if self.test_mode && !self.force_generation {
            return Ok(Some(self.schema.test_item()));
        }

        let index = self.state_index;
        let items = self.items()?;
        if items.is_empty() {
            return Ok(None);
        }

        let index = if index < items.len() { index } else { 0 };
        let item = items[index].clone();
        self.state_index = index + 1;
        Ok(Some(item))
    }

    fn generate(&mut self) -> IndustryResult<Vec<Item>> {
        if !self.config.enabled {
            tracing::debug!(
                group = %self.group,
                count = self.count,
                model = self.generator.model_id(),
                "Cache disabled, generating directly"
            );
            return self
                .generator
                .generate(&self.prompt, &self.schema, self.count);
        }

        let fingerprint = self.fingerprint();
        let orchestrator = match self.orchestrator.take() {
            Some(orchestrator) => orchestrator,
            None => FetchOrchestrator::new(Arc::clone(&self.store), self.config.clone())?,
        };

        let generator = &self.generator;
        let prompt = &self.prompt;
        let schema = &self.schema;
        let result = orchestrator.get(&self.group, &fingerprint, self.count, |needed| {
            generator.generate(prompt, schema, needed)
        });

        self.orchestrator = Some(orchestrator);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use industry_core::{FieldDefinition, GeneratorError, IndustryError};
    use industry_storage::InMemoryCacheStore;
    use serde_json::json;
    use std::sync::Mutex;

    /// Counts calls and numbers its records.
    struct CountingGenerator {
        requests: Mutex<Vec<usize>>,
    }

    impl CountingGenerator {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<usize> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl ItemGenerator for CountingGenerator {
        fn model_id(&self) -> &str {
            "counting"
        }

        fn generate(
            &self,
            _prompt: &str,
            _schema: &ObjectSchema,
            count: usize,
        ) -> IndustryResult<Vec<Item>> {
            let mut requests = self.requests.lock().unwrap();
            requests.push(count);
            let call = requests.len();
            Ok((0..count).map(|i| json!({"call": call, "i": i})).collect())
        }
    }

    struct FailingGenerator;

    impl ItemGenerator for FailingGenerator {
        fn model_id(&self) -> &str {
            "failing"
        }

        fn generate(&self, _: &str, _: &ObjectSchema, _: usize) -> IndustryResult<Vec<Item>> {
            Err(GeneratorError::Failed {
                reason: "provider unavailable".to_string(),
            }
            .into())
        }
    }

    fn schema() -> ObjectSchema {
        ObjectSchema::from_fields(
            "menu_item",
            "Items on a seafood restaurant menu",
            vec![
                FieldDefinition::new("name", "The dish name").for_test("Clam Chowder"),
                FieldDefinition::new("description", "A short description"),
            ],
        )
    }

    fn industry(
        generator: Arc<CountingGenerator>,
        store: Arc<InMemoryCacheStore>,
    ) -> Industry<Arc<CountingGenerator>, InMemoryCacheStore> {
        Industry::new(
            generator,
            store,
            CacheConfig::default(),
            "MenuItemFactory",
            "Items on a seafood restaurant menu",
            schema(),
        )
    }

    #[test]
    fn test_next_state_round_robin() {
        let generator = Arc::new(CountingGenerator::new());
        let mut industry =
            industry(generator.clone(), Arc::new(InMemoryCacheStore::new())).with_count(3);

        let states: Vec<Item> = (0..5)
            .map(|_| industry.next_state().unwrap().unwrap())
            .collect();

        assert_eq!(states[0], states[3]);
        assert_eq!(states[1], states[4]);
        assert_ne!(states[0], states[1]);
        assert_eq!(generator.requests(), vec![3]);
    }

    #[test]
    fn test_cached_records_shared_between_instances() {
        let generator = Arc::new(CountingGenerator::new());
        let store = Arc::new(InMemoryCacheStore::new());

        let first = industry(generator.clone(), store.clone())
            .with_count(2)
            .items()
            .unwrap()
            .len();
        let mut second = industry(generator.clone(), store.clone()).with_count(2);

        assert_eq!(first, 2);
        assert_eq!(second.items().unwrap().len(), 2);
        assert_eq!(generator.requests(), vec![2]);
    }

    #[test]
    fn test_cache_disabled_always_generates() {
        let generator = Arc::new(CountingGenerator::new());
        let store = Arc::new(InMemoryCacheStore::new());

        for _ in 0..2 {
            let mut industry = industry(generator.clone(), store.clone())
                .with_count(2)
                .use_cache(false);
            industry.next_state().unwrap();
        }

        assert_eq!(generator.requests(), vec![2, 2]);
        assert!(store.list_groups().unwrap().is_empty());
    }

    #[test]
    fn test_lazy_load_grows_cache() {
        let generator = Arc::new(CountingGenerator::new());
        let store = Arc::new(InMemoryCacheStore::new());

        industry(generator.clone(), store.clone())
            .with_count(1)
            .items()
            .unwrap();
        let mut bigger = industry(generator.clone(), store.clone())
            .with_count(3)
            .with_strategy(CacheStrategy::LazyLoad);

        assert_eq!(bigger.items().unwrap().len(), 3);
        assert_eq!(generator.requests(), vec![1, 2]);
    }

    #[test]
    fn test_test_mode_skips_generation() {
        let generator = Arc::new(CountingGenerator::new());
        let mut industry =
            industry(generator.clone(), Arc::new(InMemoryCacheStore::new())).test_mode(true);

        assert_eq!(
            industry.next_state().unwrap(),
            Some(json!({"name": "Clam Chowder", "description": "A short description"}))
        );
        assert!(generator.requests().is_empty());

        let mut forced = industry.force_generation(true);
        forced.next_state().unwrap();
        assert_eq!(generator.requests(), vec![1]);
    }

    #[test]
    fn test_generator_error_propagates() {
        let mut industry = Industry::new(
            FailingGenerator,
            Arc::new(InMemoryCacheStore::new()),
            CacheConfig::default(),
            "MenuItemFactory",
            "prompt",
            schema(),
        );

        let err = industry.next_state().unwrap_err();
        assert!(matches!(
            err,
            IndustryError::Generator(GeneratorError::Failed { .. })
        ));
    }

    #[test]
    fn test_fingerprint_ignores_generator_model() {
        let store = Arc::new(InMemoryCacheStore::new());
        let a = industry(Arc::new(CountingGenerator::new()), store.clone());
        let b = Industry::new(
            FailingGenerator,
            store,
            CacheConfig::default(),
            "MenuItemFactory",
            "Items on a seafood restaurant menu",
            schema(),
        );
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert!(a.fingerprint().starts_with("menu_item."));
    }
}
