//! Endpoint Descriptor Set — Static Candidate Catalog
//!
//! This module defines the ordered list of upstream model endpoints a
//! dispatch may try. The set is read-only and side-effect free: it performs
//! no network calls and answers one question — *which endpoints, in which
//! order, for which mode*.
//!
//! ## Ordering Semantics
//!
//! - **Sequential fallback** walks the list front to back, so index 0 is the
//!   first endpoint tried (fastest-typically-first for the free text tier).
//! - **Parallel race** fires every candidate simultaneously, so ordering is
//!   irrelevant there.
//!
//! Image mode legitimately carries a single premium endpoint with no
//! fallback fan-out: image-capable free-tier endpoints are scarce.
//!
//! The catalog is constructor-injected into the dispatcher rather than held
//! as global state, and can be swapped at runtime via
//! [`Dispatcher::set_endpoints`](super::dispatcher::Dispatcher::set_endpoints).

use super::types::GenerationMode;

// ============================================================================
// Default Catalog
// ============================================================================

/// Free models available on OpenRouter (verified 2026-02, in priority order).
const FREE_TEXT_MODELS: [&str; 6] = [
    "openai/gpt-oss-120b:free", // primary model
    "meta-llama/llama-3.3-70b-instruct:free",
    "deepseek/deepseek-r1-0528:free",
    "mistralai/mistral-small-3.1-24b-instruct:free",
    "google/gemma-3-27b-it:free",
    "meta-llama/llama-3.2-3b-instruct:free",
];

/// The single image-capable endpoint. Premium tier, no fallback.
const IMAGE_MODEL: &str = "openai/gpt-4o";

// ============================================================================
// EndpointDescriptor
// ============================================================================

/// One upstream model endpoint: its wire identifier and its relative
/// priority tier (0 = tried first under sequential fallback).
///
/// Descriptors are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// Model identifier as sent upstream, e.g. `"openai/gpt-4o"`.
    pub id: String,
    /// Relative priority / speed class; lower is tried earlier.
    pub tier: usize,
}

impl EndpointDescriptor {
    pub fn new(id: impl Into<String>, tier: usize) -> Self {
        Self {
            id: id.into(),
            tier,
        }
    }
}

// ============================================================================
// EndpointSet
// ============================================================================

/// The ordered candidate lists for each generation mode.
///
/// # Example
///
/// ```rust
/// use medvision_foundation::dispatch::endpoints::EndpointSet;
/// use medvision_foundation::dispatch::types::GenerationMode;
///
/// let set = EndpointSet::openrouter_free_tier();
/// assert!(set.candidates(GenerationMode::Text).len() > 1);
/// assert_eq!(set.candidates(GenerationMode::Image).len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct EndpointSet {
    text: Vec<EndpointDescriptor>,
    image: Vec<EndpointDescriptor>,
}

impl EndpointSet {
    /// Build a set from explicit candidate lists.
    pub fn new(text: Vec<EndpointDescriptor>, image: Vec<EndpointDescriptor>) -> Self {
        Self { text, image }
    }

    /// The default OpenRouter catalog: six free text models ordered
    /// fastest-typically-first, and one premium image endpoint.
    pub fn openrouter_free_tier() -> Self {
        let text = FREE_TEXT_MODELS
            .iter()
            .enumerate()
            .map(|(tier, id)| EndpointDescriptor::new(*id, tier))
            .collect();
        let image = vec![EndpointDescriptor::new(IMAGE_MODEL, 0)];
        Self { text, image }
    }

    /// The ordered candidate list for a mode.
    pub fn candidates(&self, mode: GenerationMode) -> &[EndpointDescriptor] {
        match mode {
            GenerationMode::Text => &self.text,
            GenerationMode::Image => &self.image,
        }
    }
}

impl Default for EndpointSet {
    fn default() -> Self {
        Self::openrouter_free_tier()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_ordering() {
        let set = EndpointSet::openrouter_free_tier();
        let text = set.candidates(GenerationMode::Text);

        assert_eq!(text.len(), 6);
        assert_eq!(text[0].id, "openai/gpt-oss-120b:free");
        assert_eq!(text[0].tier, 0);

        // Tiers follow list position.
        for (i, endpoint) in text.iter().enumerate() {
            assert_eq!(endpoint.tier, i);
        }
    }

    #[test]
    fn test_image_mode_has_single_premium_candidate() {
        let set = EndpointSet::openrouter_free_tier();
        let image = set.candidates(GenerationMode::Image);

        assert_eq!(image.len(), 1);
        assert_eq!(image[0].id, "openai/gpt-4o");
    }

    #[test]
    fn test_custom_set() {
        let set = EndpointSet::new(
            vec![
                EndpointDescriptor::new("model-a", 0),
                EndpointDescriptor::new("model-b", 1),
            ],
            vec![],
        );
        assert_eq!(set.candidates(GenerationMode::Text).len(), 2);
        assert!(set.candidates(GenerationMode::Image).is_empty());
    }

    #[test]
    fn test_no_duplicate_ids_in_default_catalog() {
        let set = EndpointSet::default();
        let text = set.candidates(GenerationMode::Text);
        for (i, a) in text.iter().enumerate() {
            for b in &text[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }
}
