//! # recall-jobs
//!
//! Fan-out job pipeline plumbing for recall:
//! - HMAC-SHA256 delivery-signature verification with current/next key
//!   rotation (the trust boundary of the consumer endpoint)
//! - Fan-out payload schema validation
//! - The queue publisher that hands normalized payloads to the external
//!   queue service after the relational write commits
//!
//! Delivery is at-least-once; consumers stay idempotent through the graph
//! store's natural-key MERGE semantics, not through anything in this crate.

pub mod payload;
pub mod publisher;
pub mod signature;

// Re-export core types
pub use recall_core::*;

pub use payload::validate_payload;
pub use publisher::QueuePublisher;
pub use signature::{SignatureVerifier, SIGNATURE_HEADER};
