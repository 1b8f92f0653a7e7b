//! Mock inference backend for deterministic testing.
//!
//! Generates deterministic embeddings and scripted responses/failures so
//! retry and orchestration logic can be tested without a live model.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use recall_core::{EmbeddingBackend, Error, GenerationBackend, Result, Vector};

/// Mock inference backend for testing.
#[derive(Clone)]
pub struct MockInferenceBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    scripted_failures: Arc<Mutex<VecDeque<Error>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    fixed_responses: HashMap<String, String>,
    /// Prompts containing the key fail permanently with the given message.
    fixed_failures: HashMap<String, String>,
    default_response: String,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            fixed_responses: HashMap::new(),
            fixed_failures: HashMap::new(),
            default_response: "Mock response".to_string(),
        }
    }
}

impl MockInferenceBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
            scripted_failures: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Set a fixed response for generation requests.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Add a response returned when the prompt contains `needle`.
    pub fn with_response_mapping(
        mut self,
        needle: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .fixed_responses
            .insert(needle.into(), output.into());
        self
    }

    /// Queue errors to be returned by upcoming calls, in order, before any
    /// successful responses.
    pub fn with_scripted_failures(self, failures: impl IntoIterator<Item = Error>) -> Self {
        self.scripted_failures.lock().unwrap().extend(failures);
        self
    }

    /// Fail generation permanently whenever the prompt contains `needle`.
    pub fn with_failure_mapping(
        mut self,
        needle: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .fixed_failures
            .insert(needle.into(), message.into());
        self
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Get number of embed calls.
    pub fn embed_call_count(&self) -> usize {
        self.count_ops("embed")
    }

    /// Get number of generation calls.
    pub fn generate_call_count(&self) -> usize {
        self.count_ops("generate")
    }

    fn count_ops(&self, operation: &str) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn log_call(&self, operation: &str, input: &str) {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
        });
    }

    fn next_failure(&self) -> Option<Error> {
        self.scripted_failures.lock().unwrap().pop_front()
    }

    fn response_for(&self, prompt: &str) -> Result<String> {
        if let Some((_, message)) = self
            .config
            .fixed_failures
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
        {
            return Err(Error::UpstreamPermanent(message.clone()));
        }

        Ok(self
            .config
            .fixed_responses
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_else(|| self.config.default_response.clone()))
    }

    /// Deterministic pseudo-embedding derived from the text bytes.
    fn embed_one(&self, text: &str) -> Vector {
        let seed: u32 = text
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        let values: Vec<f32> = (0..self.config.dimension)
            .map(|i| {
                let x = seed.wrapping_add(i as u32).wrapping_mul(2654435761);
                (x % 1000) as f32 / 1000.0
            })
            .collect();
        Vector::from(values)
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        for text in texts {
            self.log_call("embed", text);
        }
        if let Some(err) = self.next_failure() {
            return Err(err);
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl GenerationBackend for MockInferenceBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.log_call("generate", prompt);
        if let Some(err) = self.next_failure() {
            return Err(err);
        }
        self.response_for(prompt)
    }

    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }

    async fn generate_json(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}
