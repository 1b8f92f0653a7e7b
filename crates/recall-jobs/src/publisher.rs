//! Queue publisher for graph fan-out jobs.
//!
//! After the relational write commits, the analyze path hands a minimal
//! normalized payload to the queue service, which later delivers it
//! (signed) to the graph consumer endpoint. Publishing is fire-and-forget
//! from the caller's perspective: the relational record is already durable,
//! so a publish failure is logged distinctly and never rolled back.

use std::time::Duration;

use reqwest::Client;
use tracing::{error, info};

use recall_core::text::humanize_identifier;
use recall_core::{AnalysisOutcome, Error, JobPayload, ProblemDescriptor, Result};

/// Default timeout for queue publish requests (seconds).
const PUBLISH_TIMEOUT_SECS: u64 = 10;

/// Client for the external queue service's publish API.
#[derive(Clone)]
pub struct QueuePublisher {
    client: Client,
    /// Publish endpoint, already targeting the graph consumer destination.
    publish_url: String,
    /// Bearer token for the queue service.
    token: Option<String>,
}

impl QueuePublisher {
    /// Create a publisher targeting `publish_url`.
    pub fn new(publish_url: impl Into<String>, token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(PUBLISH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            publish_url: publish_url.into(),
            token,
        }
    }

    /// Create from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `QUEUE_PUBLISH_URL` | Queue service publish endpoint (with destination) |
    /// | `QUEUE_TOKEN` | Bearer token for the queue service (optional) |
    pub fn from_env() -> Result<Self> {
        let publish_url = std::env::var("QUEUE_PUBLISH_URL")
            .map_err(|_| Error::Config("QUEUE_PUBLISH_URL is not set".into()))?;
        let token = std::env::var("QUEUE_TOKEN").ok();
        Ok(Self::new(publish_url, token))
    }

    /// Build the minimal normalized fan-out payload for one analysis.
    ///
    /// Normalization happens exactly once here: strings are trimmed, and
    /// machine-cased identifiers from the model (domain, approach name)
    /// become human-readable word-separated form. The consumer never
    /// re-derives naming.
    pub fn payload_for(user_id: &str, url: &str, outcome: &AnalysisOutcome) -> JobPayload {
        let domain = outcome.domain().unwrap_or_default();
        JobPayload {
            user_id: user_id.trim().to_string(),
            problem: ProblemDescriptor {
                url: url.trim().to_string(),
                name: outcome.name.trim().to_string(),
                domain: humanize_identifier(domain),
                approach_name: humanize_identifier(&outcome.approach_name),
            },
        }
    }

    /// Submit a payload to the queue service.
    pub async fn publish(&self, payload: &JobPayload) -> Result<()> {
        let mut request = self.client.post(&self.publish_url).json(payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Request(format!("queue publish failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "queue service returned {status}: {body}"
            )));
        }

        info!(
            subsystem = "jobs",
            component = "queue_publisher",
            op = "publish",
            user_id = %payload.user_id,
            problem_url = %payload.problem.url,
            "Fan-out job published"
        );
        Ok(())
    }

    /// Publish, logging any failure under the publisher's own component so
    /// it is never confused with a relational-write failure.
    pub async fn publish_logged(&self, payload: &JobPayload) {
        if let Err(e) = self.publish(payload).await {
            error!(
                subsystem = "jobs",
                component = "queue_publisher",
                op = "publish",
                user_id = %payload.user_id,
                problem_url = %payload.problem.url,
                error = %e,
                "Fan-out publish failed; relational record remains durable"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::Difficulty;

    fn outcome() -> AnalysisOutcome {
        AnalysisOutcome {
            name: " Two Sum ".to_string(),
            approach_name: "two_pointers".to_string(),
            pseudo_code: vec!["fn twoSum(nums, target)".to_string()],
            time: "O(n)".to_string(),
            space: "O(1)".to_string(),
            tags: vec!["DynamicProgramming".to_string(), "Memoization".to_string()],
            difficulty: Difficulty::Medium,
        }
    }

    #[test]
    fn test_payload_normalizes_machine_cased_identifiers() {
        let payload =
            QueuePublisher::payload_for("u-1", "https://leetcode.com/two-sum", &outcome());

        assert_eq!(payload.problem.domain, "Dynamic Programming");
        assert_eq!(payload.problem.approach_name, "Two Pointers");
    }

    #[test]
    fn test_payload_trims_name_and_url() {
        let payload =
            QueuePublisher::payload_for("u-1", " https://leetcode.com/two-sum ", &outcome());

        assert_eq!(payload.problem.name, "Two Sum");
        assert_eq!(payload.problem.url, "https://leetcode.com/two-sum");
    }

    #[test]
    fn test_payload_leaves_human_readable_strings_alone() {
        let mut o = outcome();
        o.approach_name = "Hash Map O(n)".to_string();
        o.tags[0] = "Array".to_string();

        let payload = QueuePublisher::payload_for("u-1", "https://x", &o);
        assert_eq!(payload.problem.approach_name, "Hash Map O(n)");
        assert_eq!(payload.problem.domain, "Array");
    }
}
