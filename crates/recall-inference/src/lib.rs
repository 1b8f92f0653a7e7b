//! # recall-inference
//!
//! LLM inference backend abstraction for recall.
//!
//! This crate provides:
//! - The Ollama backend implementing the embedding/generation traits
//! - The bounded retry policy for transient upstream failures
//! - Analysis prompt construction and structured-output validation
//! - A deterministic mock backend (feature `mock`) for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use recall_inference::OllamaBackend;
//! use recall_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaBackend::from_env();
//!     let texts = vec!["Hello".to_string()];
//!     let embeddings = backend.embed_texts(&texts).await.unwrap();
//! }
//! ```

pub mod analysis;
pub mod ollama;
pub mod retry;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use recall_core::*;

pub use analysis::{build_analysis_prompt, generate_analysis, parse_analysis};
pub use ollama::OllamaBackend;
pub use retry::with_retry;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockInferenceBackend;

#[cfg(test)]
mod retry_integration_tests {
    use super::*;
    use recall_core::GenerationBackend;

    const ANALYSIS_JSON: &str = r#"{
        "name": "Two Sum",
        "approachName": "Hash Map",
        "pseudoCode": ["fn twoSum(nums, target)", "scan once"],
        "time": "O(n)",
        "space": "O(n)",
        "tags": ["Array", "Hash Map"],
        "difficulty": "Easy"
    }"#;

    #[tokio::test(start_paused = true)]
    async fn test_generate_analysis_retries_through_transient_failures() {
        let backend = MockInferenceBackend::new()
            .with_fixed_response(ANALYSIS_JSON)
            .with_scripted_failures([
                Error::UpstreamTransient("overloaded".into()),
                Error::UpstreamTransient("overloaded".into()),
            ]);

        let outcome = generate_analysis(&backend, "https://leetcode.com/two-sum", "code")
            .await
            .unwrap();

        assert_eq!(outcome.approach_name, "Hash Map");
        assert_eq!(backend.generate_call_count(), 3);
    }

    #[tokio::test]
    async fn test_generate_analysis_does_not_retry_permanent_failures() {
        let backend = MockInferenceBackend::new()
            .with_fixed_response(ANALYSIS_JSON)
            .with_scripted_failures([Error::UpstreamPermanent("bad request".into())]);

        let result = generate_analysis(&backend, "https://leetcode.com/two-sum", "code").await;

        assert!(result.is_err());
        assert_eq!(backend.generate_call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_analysis_exhausts_retry_budget() {
        let backend = MockInferenceBackend::new()
            .with_fixed_response(ANALYSIS_JSON)
            .with_scripted_failures((0..10).map(|_| Error::UpstreamTransient("down".into())));

        let result = generate_analysis(&backend, "https://leetcode.com/two-sum", "code").await;

        assert!(result.is_err());
        // Initial call plus the three backoff slots, never more.
        assert_eq!(backend.generate_call_count(), 4);
    }
}
