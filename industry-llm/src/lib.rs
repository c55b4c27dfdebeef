//! Industry LLM - Generator Seam
//!
//! Provider-agnostic trait for whatever produces records (usually an LLM
//! structured-output call) and the [`Industry`] facade that puts the
//! generation cache in front of it.
//!
//! Actual provider implementations are user-supplied.

use industry_core::{IndustryResult, Item, ObjectSchema};

mod industry;

pub use industry::{Industry, DEFAULT_COUNT};

// ============================================================================
// ITEM GENERATOR TRAIT
// ============================================================================

/// Trait for record generators.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// struct OllamaGenerator { /* ... */ }
///
/// impl ItemGenerator for OllamaGenerator {
///     fn model_id(&self) -> &str {
///         "llama3.2"
///     }
///
///     fn generate(&self, prompt: &str, schema: &ObjectSchema, count: usize)
///         -> IndustryResult<Vec<Item>>
///     {
///         // Ask the model for an array of `count` objects shaped like `schema`
///     }
/// }
/// ```
pub trait ItemGenerator: Send + Sync {
    /// Identifier of the backing model, e.g. "llama3.2".
    fn model_id(&self) -> &str;

    /// Produce up to `count` records matching `schema`.
    ///
    /// # Arguments
    /// * `prompt` - What the records are about
    /// * `schema` - Shape of one record
    /// * `count` - Number of records wanted
    ///
    /// # Returns
    /// * `Ok(Vec<Item>)` - Generated records; may be fewer than `count`
    /// * `Err(IndustryError::Generator)` - If generation fails
    fn generate(&self, prompt: &str, schema: &ObjectSchema, count: usize)
        -> IndustryResult<Vec<Item>>;
}

impl<T: ItemGenerator + ?Sized> ItemGenerator for std::sync::Arc<T> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn generate(
        &self,
        prompt: &str,
        schema: &ObjectSchema,
        count: usize,
    ) -> IndustryResult<Vec<Item>> {
        (**self).generate(prompt, schema, count)
    }
}
