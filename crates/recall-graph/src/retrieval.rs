//! Retrieval engine: user-scoped similarity search rendered as prompt
//! context.

use std::collections::HashSet;

use recall_core::defaults::{CONTEXT_PER_KIND, CONTEXT_TOP_K, NO_CONTEXT_SENTINEL};
use recall_core::{ContextHit, EmbeddingBackend, EntityKind, Error, GraphRepository, Result};

fn kind_heading(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Problem => "Relevant Problems:",
        EntityKind::Approach => "Relevant Approaches:",
        EntityKind::Concept => "Relevant Concepts:",
    }
}

/// Render similarity hits as a compact grouped text block.
///
/// Names are deduplicated within each kind (preserving score order) and
/// each kind contributes at most [`CONTEXT_PER_KIND`] entries. Empty input
/// renders the no-match sentinel.
pub fn render_context(hits: &[ContextHit]) -> String {
    let mut sections = Vec::new();

    for kind in [EntityKind::Problem, EntityKind::Approach, EntityKind::Concept] {
        let mut seen = HashSet::new();
        let names: Vec<&str> = hits
            .iter()
            .filter(|h| h.kind == kind)
            .filter(|h| seen.insert(h.name.as_str()))
            .take(CONTEXT_PER_KIND)
            .map(|h| h.name.as_str())
            .collect();

        if !names.is_empty() {
            sections.push(format!("{}\n- {}", kind_heading(kind), names.join("\n- ")));
        }
    }

    if sections.is_empty() {
        NO_CONTEXT_SENTINEL.to_string()
    } else {
        sections.join("\n\n")
    }
}

/// Run the full retrieval pipeline for one chat question: embed the query
/// once, search each entity kind inside the user's subgraph, and render
/// the grouped context block.
///
/// Scoping by ownership is a hard security invariant — the graph queries
/// only traverse edges reachable from `user_id`.
pub async fn retrieve_context(
    embedder: &dyn EmbeddingBackend,
    graph: &dyn GraphRepository,
    user_id: &str,
    query_text: &str,
) -> Result<String> {
    let mut vectors = embedder.embed_texts(&[query_text.to_string()]).await?;
    let query_vec = vectors
        .pop()
        .ok_or_else(|| Error::Embedding("embedding backend returned no vectors".into()))?;

    let hits = graph
        .similar_entities(user_id, &query_vec, CONTEXT_TOP_K)
        .await?;

    Ok(render_context(&hits))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(kind: EntityKind, name: &str, score: f32) -> ContextHit {
        ContextHit {
            kind,
            name: name.to_string(),
            score,
        }
    }

    #[test]
    fn test_render_empty_returns_sentinel() {
        assert_eq!(render_context(&[]), NO_CONTEXT_SENTINEL);
    }

    #[test]
    fn test_render_groups_by_kind() {
        let hits = vec![
            hit(EntityKind::Problem, "Two Sum", 0.9),
            hit(EntityKind::Approach, "Hash Map", 0.8),
            hit(EntityKind::Problem, "Three Sum", 0.7),
            hit(EntityKind::Concept, "Array", 0.6),
        ];

        let rendered = render_context(&hits);
        assert_eq!(
            rendered,
            "Relevant Problems:\n- Two Sum\n- Three Sum\n\n\
             Relevant Approaches:\n- Hash Map\n\n\
             Relevant Concepts:\n- Array"
        );
    }

    #[test]
    fn test_render_dedups_within_kind() {
        let hits = vec![
            hit(EntityKind::Approach, "Two Pointers", 0.9),
            hit(EntityKind::Approach, "Two Pointers", 0.85),
            hit(EntityKind::Approach, "Sliding Window", 0.8),
        ];

        let rendered = render_context(&hits);
        assert_eq!(
            rendered,
            "Relevant Approaches:\n- Two Pointers\n- Sliding Window"
        );
    }

    #[test]
    fn test_render_caps_per_kind() {
        let hits: Vec<ContextHit> = (0..10)
            .map(|i| hit(EntityKind::Concept, &format!("Concept {i}"), 1.0 - i as f32 * 0.05))
            .collect();

        let rendered = render_context(&hits);
        let bullet_count = rendered.matches("- Concept").count();
        assert_eq!(bullet_count, CONTEXT_PER_KIND);
        assert!(rendered.contains("Concept 0"));
        assert!(!rendered.contains("Concept 5"));
    }

    #[test]
    fn test_render_skips_absent_kinds() {
        let hits = vec![hit(EntityKind::Concept, "Graph", 0.5)];
        let rendered = render_context(&hits);
        assert!(!rendered.contains("Relevant Problems"));
        assert!(rendered.starts_with("Relevant Concepts:"));
    }
}
